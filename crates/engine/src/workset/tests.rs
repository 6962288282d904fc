use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use indexmap::IndexSet;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

const NAMES: [&str; 5] = ["a", "b", "c", "d", "e"];

fn registry_with(names: &[&str]) -> Registry {
	let registry = Registry::new();
	for name in names {
		registry.add_record(Record::builder(*name).build());
	}
	registry
}

#[test]
fn duplicate_add_and_absent_remove_leave_set_unchanged() {
	let registry = registry_with(&["r1"]);
	let set = WorkSet::new();

	assert_eq!(set.add("r1", &registry), CommandOutcome::Success);
	assert_eq!(set.add("r1", &registry), CommandOutcome::AlreadyPresent("r1".to_string()));
	assert_eq!(set.names(), vec!["r1".to_string()]);

	assert_eq!(set.remove("r2"), CommandOutcome::NotFound("r2".to_string()));
	assert_eq!(set.len(), 1);

	assert_eq!(set.add("ghost", &registry), CommandOutcome::NotInRegistry("ghost".to_string()));
	assert!(!set.contains("ghost"));

	assert_eq!(set.remove("r1"), CommandOutcome::Success);
	assert!(set.is_empty());
}

#[test]
fn iteration_follows_insertion_order() {
	let registry = registry_with(&NAMES);
	let set = WorkSet::new();
	for name in ["c", "a", "e", "b"] {
		set.add(name, &registry);
	}
	set.remove("a");
	set.add("a", &registry);

	let mut seen = Vec::new();
	set.for_each_locked(|name, record| {
		assert_eq!(name, record.name());
		seen.push(name.to_string());
	});
	assert_eq!(seen, vec!["c", "e", "b", "a"]);
}

#[test]
fn stale_entries_survive_registry_removal() {
	let registry = registry_with(&["gone"]);
	let set = WorkSet::new();
	set.add("gone", &registry);
	assert!(registry.remove_record("gone"));
	assert!(set.contains("gone"));
}

#[derive(Debug, Clone, Copy)]
enum Op {
	Add(usize),
	Remove(usize),
}

fn op() -> impl Strategy<Value = Op> {
	prop_oneof![(0..NAMES.len()).prop_map(Op::Add), (0..NAMES.len()).prop_map(Op::Remove)]
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(64))]

	#[test]
	fn interleaved_ops_match_last_successful_op(ops in proptest::collection::vec(op(), 0..40)) {
		let registry = registry_with(&NAMES);
		let set = Arc::new(WorkSet::new());
		let done = Arc::new(AtomicBool::new(false));

		let ticker = {
			let set = Arc::clone(&set);
			let done = Arc::clone(&done);
			thread::spawn(move || {
				while !done.load(Ordering::SeqCst) {
					let mut previous = Vec::new();
					set.for_each_locked(|name, _| previous.push(name.to_string()));
					let unique: IndexSet<_> = previous.iter().collect();
					assert_eq!(unique.len(), previous.len(), "duplicate entry observed mid-tick");
				}
			})
		};

		let mut model: IndexSet<&str> = IndexSet::new();
		for op in ops {
			match op {
				Op::Add(i) => {
					let expected = if model.insert(NAMES[i]) {
						CommandOutcome::Success
					} else {
						CommandOutcome::AlreadyPresent(NAMES[i].to_string())
					};
					prop_assert_eq!(set.add(NAMES[i], &registry), expected);
				}
				Op::Remove(i) => {
					let expected = if model.shift_remove(NAMES[i]) {
						CommandOutcome::Success
					} else {
						CommandOutcome::NotFound(NAMES[i].to_string())
					};
					prop_assert_eq!(set.remove(NAMES[i]), expected);
				}
			}
		}

		done.store(true, Ordering::SeqCst);
		ticker.join().unwrap();
		let expected: Vec<String> = model.iter().map(|name| name.to_string()).collect();
		prop_assert_eq!(set.names(), expected);
	}
}
