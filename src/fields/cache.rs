//! Cross-compilation cache of published field analyses.
//!
//! One [`FieldInfoCache`] outlives individual compilations and is shared
//! between compiler threads. Each class maps to a record whose state moves
//! from absent to published or vetoed; a veto is permanent, everything else
//! may be recomputed. The analyzer itself always runs outside the record
//! lock, so a slow peek never blocks readers of other classes or even a
//! concurrent snapshot of the same class.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::config::AnalysisConfig;
use crate::fields::analyzer::{AnalysisOutcome, FieldAnalyzer};
use crate::fields::info::ClassFieldInfo;
use crate::resolver::{ClassId, Resolver};

/// What the cache currently holds for a class.
#[derive(Clone, Debug)]
pub enum CacheOutcome {
    /// A completed analysis is available.
    Published(Arc<ClassFieldInfo>),
    /// The class is permanently untrusted.
    Vetoed,
    /// No analysis has completed yet.
    Absent,
}

enum RecordState {
    Absent,
    Published(Arc<ClassFieldInfo>),
    Vetoed,
}

struct ClassRecord {
    state: Mutex<RecordState>,
    /// Analysis runs attempted for this class, including aborted ones.
    attempts: AtomicU64,
}

impl ClassRecord {
    fn new() -> Self {
        ClassRecord {
            state: Mutex::new(RecordState::Absent),
            attempts: AtomicU64::new(0),
        }
    }
}

/// Shared, thread-safe store of per-class field analyses.
#[derive(Default)]
pub struct FieldInfoCache {
    classes: DashMap<ClassId, Arc<ClassRecord>>,
}

impl FieldInfoCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        FieldInfoCache::default()
    }

    fn record(&self, class: ClassId) -> Arc<ClassRecord> {
        Arc::clone(
            &self
                .classes
                .entry(class)
                .or_insert_with(|| Arc::new(ClassRecord::new())),
        )
    }

    /// The current state for `class`, without triggering an analysis.
    pub fn snapshot(&self, class: ClassId) -> CacheOutcome {
        let Some(record) = self.classes.get(&class).map(|r| Arc::clone(&r)) else {
            return CacheOutcome::Absent;
        };
        let state = lock!(record.state);
        match &*state {
            RecordState::Absent => CacheOutcome::Absent,
            RecordState::Published(info) => CacheOutcome::Published(Arc::clone(info)),
            RecordState::Vetoed => CacheOutcome::Vetoed,
        }
    }

    /// Returns the published analysis for `class`, running the analyzer if
    /// nothing is cached yet.
    ///
    /// A veto short-circuits every later call. An aborted attempt leaves the
    /// record absent so a later compile retries, and an analysis that proves
    /// nothing publishes nothing. Two racing callers may both analyze; the
    /// last install wins, which is harmless because completed results for the
    /// same class are equal.
    pub fn analyze_or_get<R: Resolver>(
        &self,
        class: ClassId,
        resolver: &R,
        config: &AnalysisConfig,
    ) -> Option<Arc<ClassFieldInfo>> {
        let record = self.record(class);
        match &*lock!(record.state) {
            RecordState::Published(info) => return Some(Arc::clone(info)),
            RecordState::Vetoed => return None,
            RecordState::Absent => {}
        }

        record.attempts.fetch_add(1, Ordering::Relaxed);
        let outcome = FieldAnalyzer::new(resolver, config).analyze(class);

        let mut state = lock!(record.state);
        match outcome {
            AnalysisOutcome::Complete(info) => {
                if info.is_empty() {
                    return None;
                }
                if matches!(&*state, RecordState::Vetoed) {
                    return None;
                }
                let info = Arc::new(info);
                *state = RecordState::Published(Arc::clone(&info));
                Some(info)
            }
            AnalysisOutcome::Vetoed => {
                *state = RecordState::Vetoed;
                None
            }
            AnalysisOutcome::Aborted => match &*state {
                // someone else may have finished while we aborted
                RecordState::Published(info) => Some(Arc::clone(info)),
                _ => None,
            },
        }
    }

    /// Analysis attempts recorded for `class`.
    pub fn attempts(&self, class: ClassId) -> u64 {
        self.classes
            .get(&class)
            .map(|record| record.attempts.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Drops everything cached for `class`, veto included.
    pub fn evict(&self, class: ClassId) {
        self.classes.remove(&class);
    }

    /// Drops every record.
    pub fn clear(&self) {
        self.classes.clear();
    }

    /// Number of classes with a record, in any state.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether no class has a record.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Opcode;
    use crate::fields::info::{FieldKey, FieldLatticeEntry};
    use crate::fields::lattice::FieldValidity;
    use crate::resolver::MethodFlags;
    use crate::test::{
        create_class_initializer, create_field, create_metadata, create_method, create_scanned,
        BytecodeWriter, FixtureResolver,
    };

    fn storing_resolver() -> FixtureResolver {
        let field = {
            let mut field = create_field(1, b"I");
            field.flags = crate::resolver::FieldFlags::PRIVATE
                | crate::resolver::FieldFlags::STATIC
                | crate::resolver::FieldFlags::FINAL;
            field
        };
        let body = BytecodeWriter::new()
            .op(Opcode::Iconst1)
            .op(Opcode::Putstatic)
            .short(4)
            .op(Opcode::Return)
            .finish();
        FixtureResolver::new()
            .with_field(4, field)
            .with_metadata(create_metadata(
                1,
                vec![create_scanned(create_class_initializer(10), body)],
            ))
    }

    fn vetoing_resolver() -> FixtureResolver {
        let mut native = create_method(13, "impl");
        native.flags = MethodFlags::NATIVE;
        FixtureResolver::new().with_metadata(create_metadata(
            1,
            vec![crate::resolver::ScannedMethod {
                descriptor: native,
                body: None,
            }],
        ))
    }

    #[test]
    fn test_publish_then_snapshot_round_trips() {
        let cache = FieldInfoCache::new();
        let resolver = storing_resolver();
        let config = AnalysisConfig::default();

        let published = cache
            .analyze_or_get(ClassId(1), &resolver, &config)
            .unwrap();
        let entry_key = FieldKey {
            class: ClassId(1),
            signature: Arc::from(b"I".as_slice()),
        };
        let entry: &FieldLatticeEntry = published.get(&entry_key).unwrap();
        assert_eq!(entry.type_validity, FieldValidity::InitializedStatically);

        match cache.snapshot(ClassId(1)) {
            CacheOutcome::Published(snapshot) => assert_eq!(*snapshot, *published),
            other => panic!("expected a published snapshot, got {other:?}"),
        }
    }

    #[test]
    fn test_hit_skips_reanalysis() {
        let cache = FieldInfoCache::new();
        let resolver = storing_resolver();
        let config = AnalysisConfig::default();

        let first = cache
            .analyze_or_get(ClassId(1), &resolver, &config)
            .unwrap();
        let second = cache
            .analyze_or_get(ClassId(1), &resolver, &config)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.attempts(ClassId(1)), 1);
    }

    #[test]
    fn test_veto_is_sticky() {
        let cache = FieldInfoCache::new();
        let config = AnalysisConfig::default();

        assert!(cache
            .analyze_or_get(ClassId(1), &vetoing_resolver(), &config)
            .is_none());
        assert!(matches!(cache.snapshot(ClassId(1)), CacheOutcome::Vetoed));

        // even a resolver that would now succeed cannot lift the veto
        assert!(cache
            .analyze_or_get(ClassId(1), &storing_resolver(), &config)
            .is_none());
        assert_eq!(cache.attempts(ClassId(1)), 1);
    }

    #[test]
    fn test_abort_leaves_the_record_retryable() {
        let cache = FieldInfoCache::new();
        let config = AnalysisConfig::default();
        let mut metadata = create_metadata(1, Vec::new());
        metadata.initialized = false;
        let stalled = FixtureResolver::new().with_metadata(metadata);

        assert!(cache.analyze_or_get(ClassId(1), &stalled, &config).is_none());
        assert!(matches!(cache.snapshot(ClassId(1)), CacheOutcome::Absent));
        assert_eq!(cache.attempts(ClassId(1)), 1);

        // the class initialized in the meantime
        assert!(cache
            .analyze_or_get(ClassId(1), &storing_resolver(), &config)
            .is_some());
        assert_eq!(cache.attempts(ClassId(1)), 2);
    }

    #[test]
    fn test_empty_result_publishes_nothing() {
        let cache = FieldInfoCache::new();
        let config = AnalysisConfig::default();
        let resolver =
            FixtureResolver::new().with_metadata(create_metadata(1, Vec::new()));

        assert!(cache.analyze_or_get(ClassId(1), &resolver, &config).is_none());
        assert!(matches!(cache.snapshot(ClassId(1)), CacheOutcome::Absent));
    }

    #[test]
    fn test_evict_forgets_a_veto() {
        let cache = FieldInfoCache::new();
        let config = AnalysisConfig::default();

        cache.analyze_or_get(ClassId(1), &vetoing_resolver(), &config);
        assert!(matches!(cache.snapshot(ClassId(1)), CacheOutcome::Vetoed));

        cache.evict(ClassId(1));
        assert!(matches!(cache.snapshot(ClassId(1)), CacheOutcome::Absent));
        assert!(cache
            .analyze_or_get(ClassId(1), &storing_resolver(), &config)
            .is_some());
    }

    #[test]
    fn test_concurrent_readers_agree() {
        let cache = Arc::new(FieldInfoCache::new());
        let config = AnalysisConfig::default();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let config = config.clone();
                std::thread::spawn(move || {
                    let resolver = storing_resolver();
                    cache
                        .analyze_or_get(ClassId(1), &resolver, &config)
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();
        for pair in results.windows(2) {
            assert_eq!(*pair[0], *pair[1]);
        }
    }
}
