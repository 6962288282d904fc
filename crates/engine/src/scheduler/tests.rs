use std::sync::atomic::AtomicUsize;
use std::time::Instant;

use cadence_db::{ProcessContext, StampTime};
use cadence_worker::WorkerExit;
use pretty_assertions::assert_eq;

use super::*;
use crate::run_command;

fn wait_for(mut cond: impl FnMut() -> bool) {
	let deadline = Instant::now() + Duration::from_secs(5);
	while !cond() {
		assert!(Instant::now() < deadline, "condition not reached in time");
		std::thread::sleep(Duration::from_millis(1));
	}
}

fn counting_record(name: &str, hits: &Arc<AtomicUsize>) -> Arc<Record> {
	let hits = Arc::clone(hits);
	Record::builder(name)
		.handler(move |_cx: &mut ProcessContext<'_>| -> Result<(), ProcessError> {
			hits.fetch_add(1, Ordering::SeqCst);
			Ok(())
		})
		.build()
}

#[test]
fn add_remove_scenario_statuses() {
	let registry = Registry::new();
	registry.add_record(Record::builder("r1").handler(StampTime).build());
	let scheduler = ProcessRecord::create("sched", Duration::from_millis(5), &registry);
	registry.add_record(Arc::clone(scheduler.record()));

	let record = scheduler.record();
	assert_eq!(run_command(record, "add", "r1").unwrap(), "success");
	assert_eq!(run_command(record, "add", "r1").unwrap(), "r1 already present");
	assert_eq!(run_command(record, "remove", "r2").unwrap(), "r2 not found");
	assert_eq!(run_command(record, "remove", "r1").unwrap(), "success");
	assert_eq!(run_command(record, "add", "nope").unwrap(), "nope not in registry");
	assert_eq!(
		run_command(record, "delete", "r1").unwrap(),
		"delete not a valid command: only add and remove are valid"
	);
	assert_eq!(run_command(record, "add", "sched").unwrap(), "sched cannot process itself");
	assert!(scheduler.work_set().is_empty());
}

#[test]
fn ticks_process_records_until_stopped() {
	let registry = Registry::new();
	let hits = Arc::new(AtomicUsize::new(0));
	registry.add_record(counting_record("r1", &hits));

	let scheduler = ProcessRecord::create("sched", Duration::from_millis(1), &registry);
	assert_eq!(run_command(scheduler.record(), "add", "r1").unwrap(), "success");
	scheduler.start().unwrap();
	wait_for(|| hits.load(Ordering::SeqCst) >= 5);

	assert_eq!(scheduler.stop(), StopOutcome::Stopped(WorkerExit::Stopped));
	let after = hits.load(Ordering::SeqCst);
	std::thread::sleep(Duration::from_millis(10));
	assert_eq!(hits.load(Ordering::SeqCst), after);

	let counts = scheduler.counts();
	assert!(counts.ticks >= 5);
	assert_eq!(counts.processed, after as u64);
	assert_eq!(counts.failures, 0);
	assert_eq!(scheduler.destroy(), StopOutcome::Stopped(WorkerExit::Stopped));
}

#[test]
fn failing_records_do_not_block_later_ones() {
	let registry = Registry::new();
	let hits = Arc::new(AtomicUsize::new(0));
	registry.add_record(Record::builder("fails").handler(|_cx: &mut ProcessContext<'_>| -> Result<(), ProcessError> { Err(ProcessError::failed("bad input")) }).build());
	registry.add_record(Record::builder("panics").handler(|_cx: &mut ProcessContext<'_>| -> Result<(), ProcessError> { panic!("handler blew up") }).build());
	registry.add_record(counting_record("ok", &hits));

	let scheduler = ProcessRecord::create("sched", Duration::from_millis(1), &registry);
	for name in ["fails", "panics", "ok"] {
		assert_eq!(run_command(scheduler.record(), "add", name).unwrap(), "success");
	}
	scheduler.start().unwrap();
	wait_for(|| hits.load(Ordering::SeqCst) >= 3);
	assert_eq!(scheduler.stop(), StopOutcome::Stopped(WorkerExit::Stopped));

	let counts = scheduler.counts();
	assert_eq!(counts.failures, counts.ticks * 2);
	for name in ["fails", "panics", "ok"] {
		let record = registry.find_record(name).unwrap();
		let guard = record.try_lock().expect("record lock released");
		assert!(!guard.in_transaction());
	}
}

#[test]
fn failed_process_still_commits_transaction() {
	let record = Record::builder("fails").handler(|_cx: &mut ProcessContext<'_>| -> Result<(), ProcessError> { Err(ProcessError::failed("nope")) }).build();
	assert_eq!(process_isolated(&record), Err("nope".to_string()));
	assert_eq!(record.snapshot().sequence, 1);
}

#[test]
fn stop_waits_for_tick_in_progress() {
	let registry = Registry::new();
	let (entered_tx, entered_rx) = std::sync::mpsc::channel();
	let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
	registry.add_record(
		Record::builder("slow")
			.handler(move |_cx: &mut ProcessContext<'_>| -> Result<(), ProcessError> {
				let _ = entered_tx.send(());
				let _ = release_rx.recv_timeout(Duration::from_secs(5));
				Ok(())
			})
			.build(),
	);

	let scheduler = Arc::new(ProcessRecord::create("sched", Duration::ZERO, &registry));
	run_command(scheduler.record(), "add", "slow").unwrap();
	scheduler.start().unwrap();
	entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

	let stopper = {
		let scheduler = Arc::clone(&scheduler);
		std::thread::spawn(move || scheduler.stop())
	};
	std::thread::sleep(Duration::from_millis(30));
	assert!(!stopper.is_finished());
	let _ = release_tx.send(());
	assert_eq!(stopper.join().unwrap(), StopOutcome::Stopped(WorkerExit::Stopped));
	drop(release_tx);
}

#[test]
fn commands_apply_while_scheduler_ticks() {
	let registry = Registry::new();
	let hits = Arc::new(AtomicUsize::new(0));
	for i in 0..8 {
		registry.add_record(counting_record(&format!("r{i}"), &hits));
	}
	let scheduler = Arc::new(ProcessRecord::create("sched", Duration::ZERO, &registry));
	scheduler.start().unwrap();

	let writers: Vec<_> = [(0..4, vec![0, 1]), (4..8, vec![4])]
		.into_iter()
		.map(|(adds, removes)| {
			let scheduler = Arc::clone(&scheduler);
			std::thread::spawn(move || {
				for i in adds {
					assert_eq!(run_command(scheduler.record(), "add", &format!("r{i}")).unwrap(), "success");
				}
				for i in removes {
					assert_eq!(run_command(scheduler.record(), "remove", &format!("r{i}")).unwrap(), "success");
				}
			})
		})
		.collect();
	for writer in writers {
		writer.join().unwrap();
	}

	let ticks = scheduler.counts().ticks;
	wait_for(|| scheduler.counts().ticks > ticks + 2);
	assert_eq!(scheduler.stop(), StopOutcome::Stopped(WorkerExit::Stopped));

	let mut names = scheduler.work_set().names();
	names.sort();
	assert_eq!(names, ["r2", "r3", "r5", "r6", "r7"]);
	let counts = scheduler.counts();
	assert_eq!(counts.failures, 0);
	assert!(counts.processed >= 5);
	assert_eq!(counts.processed, hits.load(Ordering::SeqCst) as u64);
}

#[test]
fn negative_delay_falls_back_to_default() {
	assert_eq!(scheduler_delay(-1.0), DEFAULT_SCHEDULER_DELAY);
	assert_eq!(scheduler_delay(0.25), Duration::from_millis(250));
	assert_eq!(scheduler_delay(0.0), Duration::ZERO);
}

#[test]
fn status_registry_tracks_scheduler() {
	let registry = Registry::new();
	let status = WorkerStatusRegistry::new();
	let scheduler = ProcessRecord::create_with_access("sched", Duration::from_millis(1), AccessSecurity { level: 1, group: "OPS".into() }, &registry).with_status(&status);
	assert_eq!(scheduler.record().access().group, "OPS");
	scheduler.start().unwrap();
	wait_for(|| status.snapshots().first().is_some_and(|w| w.ticks > 0));
	scheduler.destroy();
	assert!(status.snapshots().is_empty());
}
