use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;

use super::*;

#[derive(Default)]
struct Collect {
	seen: Mutex<Vec<RecordSnapshot>>,
}

impl RecordListener for Collect {
	fn committed(&self, snapshot: &RecordSnapshot) {
		self.seen.lock().push(snapshot.clone());
	}
}

#[test]
fn mutation_requires_transaction() {
	let record = Record::builder("r").payload(Payload::filled(2, 0)).build();
	let mut guard = record.lock();
	assert_eq!(
		guard.replace_array(vec![1, 1].into()),
		Err(ProcessError::NoTransaction { record: "r".to_string() })
	);
	assert!(guard.set_timestamp(Utc::now()).is_err());

	guard.begin_transaction();
	guard.replace_array(vec![1, 1].into()).unwrap();
	guard.end_transaction();
	assert_eq!(guard.payload(), &Payload::filled(2, 1));
}

#[test]
fn listeners_see_only_outermost_commit() {
	let record = Record::builder("nested").payload(Payload::Scalar(0.0)).build();
	let collect = Arc::new(Collect::default());
	record.add_listener(collect.clone());

	{
		let mut guard = record.lock();
		guard.begin_transaction();
		guard.replace_payload(Payload::Scalar(1.0)).unwrap();
		guard.begin_transaction();
		guard.replace_payload(Payload::Scalar(2.0)).unwrap();
		guard.end_transaction();
		assert!(collect.seen.lock().is_empty(), "inner end must not publish");
		guard.end_transaction();
	}

	let seen = collect.seen.lock();
	assert_eq!(seen.len(), 1);
	assert_eq!(seen[0].payload, Payload::Scalar(2.0));
	assert_eq!(seen[0].sequence, 1);
	assert_eq!(&*seen[0].name, "nested");
}

#[test]
fn abandoned_transaction_restores_committed_state() {
	let record = Record::builder("abandon").payload(Payload::Scalar(0.0)).build();
	let collect = Arc::new(Collect::default());
	record.add_listener(collect.clone());

	{
		let mut guard = record.lock();
		guard.begin_transaction();
		guard.replace_payload(Payload::Scalar(9.0)).unwrap();
		guard.set_timestamp(Utc::now()).unwrap();
	}

	let guard = record.lock();
	assert!(!guard.in_transaction());
	assert!(collect.seen.lock().is_empty());
	assert_eq!(guard.payload(), &Payload::Scalar(0.0));
	assert_eq!(guard.timestamp(), None);
	assert_eq!(guard.snapshot().sequence, 0);
}

#[test]
fn abandoned_nested_transaction_restores_last_commit() {
	let record = Record::builder("nested_abandon").payload(Payload::Scalar(0.0)).build();
	{
		let mut guard = record.lock();
		guard.begin_transaction();
		guard.replace_payload(Payload::Scalar(1.0)).unwrap();
		guard.end_transaction();
	}
	{
		let mut guard = record.lock();
		guard.begin_transaction();
		guard.begin_transaction();
		guard.replace_array(Arc::from(vec![7_i64; 4])).unwrap();
		guard.end_transaction();
	}

	let snapshot = record.snapshot();
	assert_eq!(snapshot.payload, Payload::Scalar(1.0));
	assert_eq!(snapshot.sequence, 1);
}

#[test]
fn removed_listener_stops_receiving() {
	let record = Record::builder("l").build();
	let collect = Arc::new(Collect::default());
	let id = record.add_listener(collect.clone());
	assert!(record.remove_listener(id));
	assert!(!record.remove_listener(id));

	let mut guard = record.lock();
	guard.begin_transaction();
	guard.end_transaction();
	drop(guard);
	assert!(collect.seen.lock().is_empty());
}

#[test]
fn default_handler_stamps_time() {
	let record = Record::builder("stamp").build();
	let mut guard = record.lock();
	assert!(guard.timestamp().is_none());
	guard.process().unwrap();
	assert!(guard.timestamp().is_some());
}

#[test]
fn closure_handler_sees_payload() {
	let record = Record::builder("cmd")
		.payload(Payload::Command(CommandFields::new("ping", "x")))
		.handler(|cx: &mut ProcessContext<'_>| -> Result<(), ProcessError> {
			let fields = cx.command_mut()?;
			fields.status = format!("{} {}", fields.command, fields.target);
			Ok(())
		})
		.build();

	let mut guard = record.lock();
	guard.begin_transaction();
	guard.process().unwrap();
	guard.end_transaction();
	assert_eq!(guard.payload().as_command().map(|f| f.status.as_str()), Some("ping x"));
}

#[test]
fn command_access_checks_payload_kind() {
	let record = Record::builder("arr").payload(Payload::filled(1, 0)).build();
	let mut guard = record.lock();
	guard.begin_transaction();
	assert_eq!(
		guard.command_mut().map(|_| ()),
		Err(ProcessError::InvalidPayload {
			record: "arr".to_string(),
			expected: PayloadKind::Command,
			found: PayloadKind::Array,
		})
	);
	guard.end_transaction();
}

#[test]
fn try_lock_fails_while_held() {
	let record = Record::builder("busy").build();
	let guard = record.lock();
	assert!(record.try_lock().is_none());
	drop(guard);
	assert!(record.try_lock().is_some());
}

#[test]
fn access_and_trace_level() {
	let record = Record::builder("acl").access(2, "OPS").build();
	assert_eq!(record.access(), &AccessSecurity { level: 2, group: "OPS".into() });
	assert_eq!(Record::builder("d").build().access().group, "DEFAULT");
	record.set_trace_level(3);
	assert_eq!(record.trace_level(), 3);
}

#[test]
fn readers_never_see_mixed_arrays() {
	const LEN: usize = 4096;
	let record = Record::builder("atomic").payload(Payload::filled(LEN, 0)).build();
	let done = Arc::new(AtomicBool::new(false));

	let writer = {
		let record = Arc::clone(&record);
		let done = Arc::clone(&done);
		thread::spawn(move || {
			for value in 1..=500 {
				let data: Arc<[i64]> = vec![value; LEN].into();
				let mut guard = record.lock();
				guard.begin_transaction();
				guard.replace_array(data).unwrap();
				guard.end_transaction();
			}
			done.store(true, Ordering::SeqCst);
		})
	};

	let readers: Vec<_> = (0..3)
		.map(|_| {
			let record = Arc::clone(&record);
			let done = Arc::clone(&done);
			thread::spawn(move || {
				let mut last = 0;
				while !done.load(Ordering::SeqCst) {
					let guard = record.lock();
					let values = guard.payload().as_array().cloned().unwrap();
					drop(guard);
					let first = values[0];
					assert!(values.iter().all(|v| *v == first), "mixed array observed");
					assert!(first >= last, "value went backwards");
					last = first;
					thread::sleep(Duration::from_micros(50));
				}
			})
		})
		.collect();

	writer.join().unwrap();
	for reader in readers {
		reader.join().unwrap();
	}
}
