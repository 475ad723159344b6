//! Precomputed annotation state and the three ranking measures
//!
//! A [`CompiledAnnotationSet`] is derived from (annotation set, excluded
//! evidence codes, ontology). Construction precomputes, for each annotated
//! object, its directly annotated terms; for each term, the objects
//! annotated to it or any descendant; and for each term, its information
//! content. After construction the compiled set is read-only and safe to
//! share across reader tasks.

use core::fmt::Debug;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::annotations::{ObjectSet, ObjectTable};
use crate::term::{TermIdx, TermSet};
use crate::{AnnotationSet, CodeSet, ObjectIdx, Ontology, OntosimError, OntosimResult};

mod cache;
mod similarity;

pub use cache::CompiledCache;
pub use similarity::{QueryInput, RankedMatch};

/// Read-only compiled state for one (annotation set, evidence filter,
/// ontology) triple
pub struct CompiledAnnotationSet {
    ontology: Arc<Ontology>,
    objects: Arc<ObjectTable>,
    ann_set_identity: u64,
    ontology_identity: u64,
    excluded: CodeSet,
    obj2term: HashMap<ObjectIdx, TermSet>,
    term2obj: HashMap<TermIdx, ObjectSet>,
    term2ic: HashMap<TermIdx, f64>,
    candidates: Vec<ObjectIdx>,
}

impl Debug for CompiledAnnotationSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CompiledAnnotationSet with {} objects and {} terms",
            self.obj2term.len(),
            self.term2obj.len()
        )
    }
}

impl CompiledAnnotationSet {
    /// Applies the evidence filter and precomputes all derived structures
    ///
    /// Fails with [`OntosimError::BuildFailure`] if the annotation set is
    /// not governed by the given ontology.
    pub fn build(
        set: &AnnotationSet,
        excluded: &CodeSet,
        ontology: &Arc<Ontology>,
    ) -> OntosimResult<Self> {
        if set.ontology().identity() != ontology.identity() {
            return Err(OntosimError::BuildFailure(format!(
                "annotation set {} is not governed by ontology {}",
                set.identity(),
                ontology.identity()
            )));
        }

        let started = Instant::now();
        let filtered = set.evidence_filter(excluded);

        let mut obj2term: HashMap<ObjectIdx, TermSet> = HashMap::new();
        for &object in filtered.annotated_objects() {
            let terms: TermSet = filtered
                .annotations_by_object(object)
                .map(|a| a.term())
                .collect();
            obj2term.insert(object, terms);
        }

        // Upward propagation: each annotation contributes its object to
        // every ancestor of its term.
        let mut term2obj: HashMap<TermIdx, ObjectSet> = HashMap::new();
        for annotation in filtered.annotations() {
            for ancestor in ontology.forward_closure(annotation.term()) {
                term2obj
                    .entry(ancestor)
                    .or_default()
                    .insert(annotation.object());
            }
        }

        let mut term2ic: HashMap<TermIdx, f64> = HashMap::with_capacity(term2obj.len());
        for (&term, objects) in &term2obj {
            let namespace = ontology.namespace_of(term);
            let root_support = ontology
                .roots(namespace)
                .first()
                .and_then(|root| term2obj.get(root))
                .map_or(0, ObjectSet::len);
            if root_support == 0 {
                // no support under the namespace root: IC stays undefined
                continue;
            }
            let ic = (root_support as f64 / objects.len() as f64).ln();
            term2ic.insert(term, ic);
        }

        let mut candidates = filtered.annotated_objects().to_vec();
        candidates.sort_unstable();

        debug!(
            objects = obj2term.len(),
            terms = term2obj.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "compiled annotation set"
        );

        Ok(CompiledAnnotationSet {
            ontology: Arc::clone(ontology),
            objects: Arc::clone(set.object_table()),
            ann_set_identity: set.identity(),
            ontology_identity: ontology.identity(),
            excluded: excluded.clone(),
            obj2term,
            term2obj,
            term2ic,
            candidates,
        })
    }

    /// Returns the governing ontology
    pub fn ontology(&self) -> &Arc<Ontology> {
        &self.ontology
    }

    /// Identity of the source annotation set
    pub fn ann_set_identity(&self) -> u64 {
        self.ann_set_identity
    }

    /// Identity of the governing ontology
    pub fn ontology_identity(&self) -> u64 {
        self.ontology_identity
    }

    /// The evidence codes excluded when this set was compiled
    pub fn excluded_codes(&self) -> &CodeSet {
        &self.excluded
    }

    /// Returns the terms directly annotated to an object
    ///
    /// `None` for objects without surviving annotations; no closure
    /// propagation on this side.
    pub fn terms_for_object(&self, object: ObjectIdx) -> Option<&TermSet> {
        self.obj2term.get(&object)
    }

    /// Returns the objects annotated to the term or any of its descendants
    ///
    /// `None` means the term has no support (implicitly empty).
    pub fn objects_for_term(&self, term: TermIdx) -> Option<&ObjectSet> {
        self.term2obj.get(&term)
    }

    /// Returns the information content of a term, or `None` where undefined
    pub fn information_content(&self, term: TermIdx) -> Option<f64> {
        self.term2ic.get(&term).copied()
    }

    /// Every object with at least one surviving annotation, ascending by
    /// dense index
    pub fn candidates(&self) -> &[ObjectIdx] {
        &self.candidates
    }

    /// Resolves an external object id against the compiled object table
    pub fn object_idx(&self, id: &str) -> Option<ObjectIdx> {
        self.objects.get(id)
    }

    /// Returns the external id of an interned object
    pub fn object_id(&self, idx: ObjectIdx) -> &str {
        self.objects.id(idx)
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;

    use crate::{AnnotationSet, AnnotationSetBuilder, Ontology, OntologyBuilder};

    /// The seed ontology: namespace `N` with root A and children B, C
    pub fn seed_ontology() -> Arc<Ontology> {
        let mut builder = OntologyBuilder::new();
        builder.add_term("N:A", "A", "N").unwrap();
        builder.add_term("N:B", "B", "N").unwrap();
        builder.add_term("N:C", "C", "N").unwrap();
        builder.add_parent_link("N:B", "N:A");
        builder.add_parent_link("N:C", "N:A");
        Arc::new(builder.finalize().unwrap())
    }

    /// Annotations o1→B, o2→C, o3→B, o3→C, all with evidence `IDA` except
    /// o2→C which carries `ISS`
    pub fn seed_annotations(ontology: Arc<Ontology>) -> AnnotationSet {
        let mut builder = AnnotationSetBuilder::new(ontology);
        builder.add("o1", "N:B", "IDA", None, Vec::new()).unwrap();
        builder.add("o2", "N:C", "ISS", None, Vec::new()).unwrap();
        builder.add("o3", "N:B", "IDA", None, Vec::new()).unwrap();
        builder.add("o3", "N:C", "IDA", None, Vec::new()).unwrap();
        builder.build()
    }
}
