use cadence_db::{ProcessContext, ProcessError};
use cadence_worker::WorkerExit;
use pretty_assertions::assert_eq;

use super::*;

fn wait_for(mut cond: impl FnMut() -> bool) {
	let deadline = Instant::now() + Duration::from_secs(5);
	while !cond() {
		assert!(Instant::now() < deadline, "condition not reached in time");
		std::thread::sleep(Duration::from_millis(1));
	}
}

#[test]
fn publishes_uniform_arrays_of_requested_size() {
	let generator = ArrayGenerator::create("perf", 10, Duration::ZERO);
	assert_eq!(generator.record().lock().payload(), &Payload::filled(10, 0));

	generator.start().unwrap();
	wait_for(|| generator.generated() >= 50);
	assert_eq!(generator.stop(), StopOutcome::Stopped(WorkerExit::Stopped));

	let generated = generator.generated();
	let guard = generator.record().lock();
	let values = guard.payload().as_array().cloned().unwrap();
	assert_eq!(values.len(), 10);
	// The counter starts at 0, so the last array holds generated - 1.
	assert!(values.iter().all(|v| *v == generated as i64 - 1));
	assert!(guard.timestamp().is_some());
	assert_eq!(guard.snapshot().sequence, generated);
}

#[test]
fn reports_throughput_after_an_interval() {
	let generator = ArrayGenerator::create("rate", 10, Duration::ZERO);
	let mut reports = generator.subscribe_reports();
	generator.start().unwrap();

	let deadline = Instant::now() + Duration::from_secs(5);
	while reports.borrow_and_update().is_none() {
		assert!(Instant::now() < deadline, "no throughput report");
		std::thread::sleep(Duration::from_millis(20));
	}
	generator.stop();

	let report = generator.latest_report().unwrap();
	assert!(report.elapsed >= Duration::from_secs(1));
	assert!(report.iterations > 0);
	let expected = report.iterations as f64 / report.elapsed.as_secs_f64();
	assert!((report.iterations_per_sec - expected).abs() < 1e-6);
	assert!((report.elements_per_sec_millions - expected * 10.0 / 1e6).abs() < 1e-9);
}

#[test]
fn failing_handler_ends_worker_and_releases_lock() {
	let record = Record::builder("broken")
		.payload(Payload::filled(4, -1))
		.handler(|_cx: &mut ProcessContext<'_>| -> Result<(), ProcessError> { Err(ProcessError::failed("disk full")) })
		.build();
	let generator = ArrayGenerator::for_record(Arc::clone(&record), 4, Duration::ZERO);
	generator.start().unwrap();

	let exit = generator.worker().wait_exit_timeout(Duration::from_secs(5)).unwrap();
	assert_eq!(exit, WorkerExit::Failed("record broken: publishing generated array failed: disk full".to_string()));
	assert_eq!(generator.generated(), 0);

	let guard = record.try_lock().expect("lock released after failure");
	assert!(!guard.in_transaction());
	assert_eq!(guard.snapshot().sequence, 0, "failed transaction never committed");
	assert_eq!(guard.payload(), &Payload::filled(4, -1));
	assert_eq!(guard.timestamp(), None);
	drop(guard);
	assert_eq!(generator.destroy(), StopOutcome::Stopped(exit));
}

#[test]
fn negative_delay_means_no_sleep() {
	assert_eq!(generator_delay(-0.5), Duration::ZERO);
	assert_eq!(generator_delay(0.01), Duration::from_millis(10));
}
