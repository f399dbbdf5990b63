//! Multi-threaded checks of the locking protocol.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use palisade_action_model::test_helpers::RecordingAdder;
use palisade_action_model::{
	AdderError, Catalog, Cleanup, Declaration, FnDependencyFinder, FnLockedAction, LockingActionModel, TypeAdder, TypeName, WithLockedTypes,
};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

fn tn(s: &str) -> TypeName {
	s.parse().unwrap()
}

/// Counts explicit readers and writers per name and fails the test if a
/// removal ever overlaps either.
#[derive(Default)]
struct ExclusionProbe {
	readers: Mutex<FxHashMap<TypeName, usize>>,
	writers: Mutex<FxHashMap<TypeName, usize>>,
	violations: AtomicUsize,
	removals: AtomicUsize,
}

impl ExclusionProbe {
	fn enter_read(&self, name: &TypeName) {
		let writers = self.writers.lock().get(name).copied().unwrap_or(0);
		if writers != 0 {
			self.violations.fetch_add(1, Ordering::SeqCst);
		}
		*self.readers.lock().entry(name.clone()).or_default() += 1;
	}

	fn exit_read(&self, name: &TypeName) {
		*self.readers.lock().entry(name.clone()).or_default() -= 1;
	}
}

impl TypeAdder for ExclusionProbe {
	fn add(&self, _decl: &Declaration) -> Result<(), AdderError> {
		Ok(())
	}

	fn remove(&self, decl: &Declaration) -> Result<bool, AdderError> {
		let name = decl.name();
		{
			let mut writers = self.writers.lock();
			let count = writers.entry(name.clone()).or_default();
			*count += 1;
			if *count != 1 {
				self.violations.fetch_add(1, Ordering::SeqCst);
			}
		}
		if self.readers.lock().get(name).copied().unwrap_or(0) != 0 {
			self.violations.fetch_add(1, Ordering::SeqCst);
		}
		thread::sleep(Duration::from_micros(200));
		*self.writers.lock().entry(name.clone()).or_default() -= 1;
		self.removals.fetch_add(1, Ordering::SeqCst);
		Ok(true)
	}
}

#[test]
fn removal_never_overlaps_readers_or_other_writers() {
	let _ = tracing_subscriber::fmt::try_init();
	let probe = Arc::new(ExclusionProbe::default());
	let model = LockingActionModel::builder(probe.clone()).build().unwrap();
	let names: Vec<TypeName> = (0..4).map(|i| TypeName::new("ns", format!("T{i}"))).collect();

	thread::scope(|s| {
		for worker in 0..6 {
			let model = &model;
			let probe = &probe;
			let names = &names;
			s.spawn(move || {
				for round in 0..300 {
					let name = &names[(worker + round) % names.len()];
					if (worker + round) % 3 == 0 {
						model.maybe_remove(name);
						continue;
					}
					let lock = model.read_lock(name);
					probe.enter_read(name);
					model.add(&Declaration::type_decl(name.clone())).unwrap();
					assert!(model.get_raw(name).is_some(), "{name} evicted while read-locked");
					probe.exit_read(name);
					drop(lock);
				}
			});
		}
	});

	assert_eq!(probe.violations.load(Ordering::SeqCst), 0);
	assert!(probe.removals.load(Ordering::SeqCst) > 0, "stress run never removed anything");
	model.shutdown();
}

fn layered_catalog() -> (Catalog, Vec<TypeName>) {
	// Each Li requires L(i-1); procedures P* require some layer.
	let mut decls = Vec::new();
	for i in 0..5 {
		let mut decl = Declaration::type_decl(TypeName::new("ns", format!("L{i}")));
		if i > 0 {
			decl = decl.with_requires(TypeName::new("ns", format!("L{}", i - 1)));
		}
		decls.push(decl);
	}
	let names = decls.iter().map(|d| d.name().clone()).collect();
	(decls.into_iter().collect(), names)
}

#[test]
fn concurrent_locked_actions_never_observe_missing_dependencies() {
	let _ = tracing_subscriber::fmt::try_init();
	let adder = Arc::new(RecordingAdder::new());
	let (catalog, layers) = layered_catalog();
	let catalog = Arc::new(catalog);
	let model = LockingActionModel::builder(adder.clone()).source(catalog.clone()).build().unwrap();
	let locked = WithLockedTypes::new(Arc::clone(&model));

	let finder = FnDependencyFinder::new(|top: &usize| {
		Ok(vec![Declaration::type_decl(TypeName::new("ns", format!("L{top}"))).with_requires(TypeName::new("ns", format!("L{}", top.saturating_sub(1))))])
	});

	thread::scope(|s| {
		for worker in 0..8usize {
			let locked = &locked;
			let finder = &finder;
			let model = &model;
			let layers = &layers;
			s.spawn(move || {
				for round in 0..100usize {
					let top = (worker * 7 + round) % layers.len();
					let action = FnLockedAction::new("probe", |top: usize, required: Vec<Arc<Declaration>>, cleanup: Cleanup| {
						for layer in &layers[..=top] {
							assert!(model.is_known(layer), "{layer} missing under {} locks", required.len());
						}
						cleanup.run();
						Ok(())
					});
					locked.locked_action(action, top, finder).unwrap();
				}
			});
		}
	});

	// Each cleanup only names its own top layer; the background cascade
	// has to reach everything below it.
	let deadline = std::time::Instant::now() + Duration::from_secs(5);
	while !model.known_names().is_empty() && std::time::Instant::now() < deadline {
		thread::sleep(Duration::from_millis(5));
	}
	assert!(model.known_names().is_empty(), "left behind: {:?}", model.known_names());
	assert!(model.lock_table_len() <= layers.len());

	let report = model.shutdown();
	assert!(!report.budget_exhausted);
}
