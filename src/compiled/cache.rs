//! Single-flight cache of compiled annotation sets
//!
//! The cache is keyed by (annotation-set identity, canonicalised excluded
//! evidence codes, ontology identity). Concurrent callers for the same key
//! see exactly one build: the first caller compiles while the map is
//! unlocked, everyone else blocks on the build slot and receives the same
//! instance. A failed build releases all waiters with the same failure and
//! leaves no entry behind, so a later call retries.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use tracing::debug;

use crate::{AnnotationSet, CancelToken, CodeSet, Ontology, OntosimError, OntosimResult};

use super::CompiledAnnotationSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    ann_set: u64,
    excluded: CodeSet,
    ontology: u64,
}

enum Slot {
    Building(Arc<BuildSlot>),
    Ready(Arc<CompiledAnnotationSet>),
}

#[derive(Default)]
struct BuildSlot {
    state: Mutex<BuildState>,
    done: Condvar,
}

#[derive(Default)]
enum BuildState {
    #[default]
    Pending,
    Finished(Result<Arc<CompiledAnnotationSet>, String>),
}

/// Cache guaranteeing at most one compiled set (and one concurrent build)
/// per key
#[derive(Default)]
pub struct CompiledCache {
    inner: Mutex<HashMap<CacheKey, Slot>>,
}

impl CompiledCache {
    /// Constructs an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the compiled set for the key, building it if absent
    ///
    /// The excluded-code set is part of the key in its canonical form, so
    /// `"ISS,ISO"` and `"ISO ISS"` hit the same entry. Checks the cancel
    /// token before initiating a build.
    pub fn get_compiled(
        &self,
        set: &Arc<AnnotationSet>,
        excluded: &CodeSet,
        ontology: &Arc<Ontology>,
        cancel: &CancelToken,
    ) -> OntosimResult<Arc<CompiledAnnotationSet>> {
        if cancel.is_cancelled() {
            return Err(OntosimError::Cancelled);
        }

        let key = CacheKey {
            ann_set: set.identity(),
            excluded: excluded.clone(),
            ontology: ontology.identity(),
        };

        let slot = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            match map.get(&key) {
                Some(Slot::Ready(compiled)) => return Ok(Arc::clone(compiled)),
                Some(Slot::Building(build)) => Some(Arc::clone(build)),
                None => {
                    map.insert(key.clone(), Slot::Building(Arc::new(BuildSlot::default())));
                    None
                }
            }
        };

        if let Some(build) = slot {
            return wait_for(&build);
        }

        // This caller owns the build; the map stays unlocked while it runs.
        debug!(
            ann_set = key.ann_set,
            ontology = key.ontology,
            "compiling annotation set"
        );
        let outcome = CompiledAnnotationSet::build(set, excluded, ontology);

        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let build = match map.get(&key) {
            Some(Slot::Building(build)) => Arc::clone(build),
            _ => unreachable!("build slot vanished while building"),
        };

        let result = match outcome {
            Ok(compiled) => {
                let compiled = Arc::new(compiled);
                map.insert(key, Slot::Ready(Arc::clone(&compiled)));
                Ok(compiled)
            }
            Err(error) => {
                // never retain a failed build
                map.remove(&key);
                Err(error.to_string())
            }
        };
        drop(map);

        let mut state = build
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *state = BuildState::Finished(result.clone());
        drop(state);
        build.done.notify_all();

        result.map_err(OntosimError::BuildFailure)
    }

    /// Returns the number of compiled sets currently cached
    pub fn len(&self) -> usize {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    /// Returns `true` if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn wait_for(build: &BuildSlot) -> OntosimResult<Arc<CompiledAnnotationSet>> {
    let mut state = build
        .state
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    loop {
        match &*state {
            BuildState::Pending => {
                state = build
                    .done
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            BuildState::Finished(Ok(compiled)) => return Ok(Arc::clone(compiled)),
            BuildState::Finished(Err(message)) => {
                return Err(OntosimError::BuildFailure(message.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::super::testutil::{seed_annotations, seed_ontology};
    use super::*;

    #[test]
    fn same_key_yields_the_same_instance() {
        let ontology = seed_ontology();
        let set = Arc::new(seed_annotations(Arc::clone(&ontology)));
        let cache = CompiledCache::new();
        let token = CancelToken::new();

        let first = cache
            .get_compiled(&set, &CodeSet::parse("ISS"), &ontology, &token)
            .unwrap();
        let second = cache
            .get_compiled(&set, &CodeSet::parse("ISS"), &ontology, &token)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn different_codes_build_distinct_instances() {
        let ontology = seed_ontology();
        let set = Arc::new(seed_annotations(Arc::clone(&ontology)));
        let cache = CompiledCache::new();
        let token = CancelToken::new();

        let iss = cache
            .get_compiled(&set, &CodeSet::parse("ISS"), &ontology, &token)
            .unwrap();
        let iso = cache
            .get_compiled(&set, &CodeSet::parse("ISO"), &ontology, &token)
            .unwrap();
        assert!(!Arc::ptr_eq(&iss, &iso));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn code_order_does_not_split_the_key() {
        let ontology = seed_ontology();
        let set = Arc::new(seed_annotations(Arc::clone(&ontology)));
        let cache = CompiledCache::new();
        let token = CancelToken::new();

        let a = cache
            .get_compiled(&set, &CodeSet::parse("ISS,ISO"), &ontology, &token)
            .unwrap();
        let b = cache
            .get_compiled(&set, &CodeSet::parse("ISO ISS"), &ontology, &token)
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_callers_share_one_build() {
        let ontology = seed_ontology();
        let set = Arc::new(seed_annotations(Arc::clone(&ontology)));
        let cache = Arc::new(CompiledCache::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let set = Arc::clone(&set);
            let ontology = Arc::clone(&ontology);
            handles.push(thread::spawn(move || {
                let token = CancelToken::new();
                cache
                    .get_compiled(&set, &CodeSet::parse("ISS"), &ontology, &token)
                    .unwrap()
            }));
        }
        let compiled: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for pair in compiled.windows(2) {
            assert!(Arc::ptr_eq(&pair[0], &pair[1]));
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_builds_are_not_cached_and_can_be_retried() {
        let ontology = seed_ontology();
        let foreign = seed_ontology();
        let set = Arc::new(seed_annotations(Arc::clone(&ontology)));
        let cache = CompiledCache::new();
        let token = CancelToken::new();

        // wrong governing ontology: the build fails
        let failure = cache.get_compiled(&set, &CodeSet::default(), &foreign, &token);
        assert!(matches!(failure, Err(OntosimError::BuildFailure(_))));
        assert!(cache.is_empty());

        // the right ontology succeeds afterwards
        let ok = cache.get_compiled(&set, &CodeSet::default(), &ontology, &token);
        assert!(ok.is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cancelled_token_short_circuits_before_building() {
        let ontology = seed_ontology();
        let set = Arc::new(seed_annotations(Arc::clone(&ontology)));
        let cache = CompiledCache::new();
        let token = CancelToken::new();
        token.cancel();

        assert!(matches!(
            cache.get_compiled(&set, &CodeSet::default(), &ontology, &token),
            Err(OntosimError::Cancelled)
        ));
        assert!(cache.is_empty());
    }
}
