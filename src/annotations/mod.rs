//! Annotations link external objects to ontology terms
//!
//! An [`AnnotationSet`] is a bag of [`Annotation`] records with fast lookup
//! by object and by term. Sets are immutable once built;
//! [`AnnotationSet::evidence_filter`] derives a new set instead of mutating,
//! which is what makes compiled-set caching sound.

use core::fmt::Debug;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use tracing::debug;

use crate::idxset::IdxSet;
use crate::term::TermIdx;
use crate::{next_identity, Ontology, OntosimError, OntosimResult};

/// Dense index of an annotated object inside its object table
///
/// Objects are interned: equal external ids yield the same index everywhere
/// within an annotation-set family (a set and all sets derived from it by
/// evidence filtering).
#[derive(Copy, Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ObjectIdx {
    inner: u32,
}

impl ObjectIdx {
    fn new(n: usize) -> Self {
        Self {
            inner: u32::try_from(n).expect("more than u32::MAX objects"),
        }
    }

    /// Returns the index as a `usize` for slice addressing
    pub fn to_usize(self) -> usize {
        self.inner as usize
    }
}

impl Debug for ObjectIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectIdx({})", self.inner)
    }
}

impl Display for ObjectIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

/// A sorted set of [`ObjectIdx`]
pub type ObjectSet = IdxSet<ObjectIdx>;

/// Interning table mapping external object ids to dense indices
#[derive(Debug, Default)]
pub(crate) struct ObjectTable {
    ids: Vec<String>,
    lookup: HashMap<String, ObjectIdx>,
}

impl ObjectTable {
    pub fn intern(&mut self, id: &str) -> ObjectIdx {
        if let Some(idx) = self.lookup.get(id) {
            return *idx;
        }
        let idx = ObjectIdx::new(self.ids.len());
        self.ids.push(id.to_string());
        self.lookup.insert(id.to_string(), idx);
        idx
    }

    pub fn get(&self, id: &str) -> Option<ObjectIdx> {
        self.lookup.get(id).copied()
    }

    pub fn id(&self, idx: ObjectIdx) -> &str {
        &self.ids[idx.to_usize()]
    }
}

/// A canonicalised set of evidence codes
///
/// Built from user input like `"ISS, ISO"` or `"ISO ISS"`: split on commas
/// and whitespace, trimmed, deduplicated and sorted, so that the same codes
/// in any spelling compare (and hash) equal. Used both as the evidence
/// filter argument and inside the compiled-set cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CodeSet {
    codes: Vec<String>,
}

impl CodeSet {
    /// Parses a comma- or space-separated list of codes
    ///
    /// The empty string yields the empty set (nothing excluded).
    pub fn parse(raw: &str) -> Self {
        let mut codes: Vec<String> = raw
            .split([',', ' ', '\t'])
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string)
            .collect();
        codes.sort_unstable();
        codes.dedup();
        Self { codes }
    }

    /// Returns `true` if no codes are listed
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Returns `true` if the given code is listed
    pub fn contains(&self, code: &str) -> bool {
        self.codes.binary_search_by(|c| c.as_str().cmp(code)).is_ok()
    }

    /// Returns the codes, sorted ascending
    pub fn codes(&self) -> &[String] {
        &self.codes
    }
}

impl From<&str> for CodeSet {
    fn from(raw: &str) -> Self {
        CodeSet::parse(raw)
    }
}

/// One assertion linking an object to a term, with its evidence
#[derive(Debug, Clone)]
pub struct Annotation {
    object: ObjectIdx,
    term: TermIdx,
    evidence_code: String,
    qualifier: Option<String>,
    attributes: Vec<(String, String)>,
}

impl Annotation {
    /// Returns the annotated object
    pub fn object(&self) -> ObjectIdx {
        self.object
    }

    /// Returns the annotated term
    pub fn term(&self) -> TermIdx {
        self.term
    }

    /// Returns the evidence code, e.g. `IDA` or `ISS`
    pub fn evidence_code(&self) -> &str {
        &self.evidence_code
    }

    /// Returns the qualifier, if the source record carried one
    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    /// Returns the opaque provenance attributes of the source record
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }
}

/// Collects annotation records and freezes them into an [`AnnotationSet`]
#[derive(Debug)]
pub struct AnnotationSetBuilder {
    ontology: Arc<Ontology>,
    objects: ObjectTable,
    annotations: Vec<Annotation>,
}

impl AnnotationSetBuilder {
    /// Constructs a builder for annotations governed by the given ontology
    pub fn new(ontology: Arc<Ontology>) -> Self {
        Self {
            ontology,
            objects: ObjectTable::default(),
            annotations: Vec::new(),
        }
    }

    /// Adds one annotation record
    ///
    /// Fails with [`OntosimError::UnknownTerm`] if the term id is not part
    /// of the governing ontology; an unknown term in the input is a fatal
    /// load error, not something to skip.
    pub fn add(
        &mut self,
        object_id: &str,
        term_id: &str,
        evidence_code: &str,
        qualifier: Option<&str>,
        attributes: Vec<(String, String)>,
    ) -> OntosimResult<()> {
        let term = self
            .ontology
            .term_idx(term_id)
            .ok_or_else(|| OntosimError::UnknownTerm(term_id.to_string()))?;
        let object = self.objects.intern(object_id);
        self.annotations.push(Annotation {
            object,
            term,
            evidence_code: evidence_code.to_string(),
            qualifier: qualifier.map(str::to_string),
            attributes,
        });
        Ok(())
    }

    /// Freezes the collected records into an immutable set
    pub fn build(self) -> AnnotationSet {
        AnnotationSet::from_parts(self.ontology, Arc::new(self.objects), self.annotations)
    }
}

/// An immutable collection of annotations with by-object and by-term indexes
pub struct AnnotationSet {
    ontology: Arc<Ontology>,
    objects: Arc<ObjectTable>,
    annotations: Vec<Annotation>,
    by_object: HashMap<ObjectIdx, Vec<u32>>,
    by_term: HashMap<TermIdx, Vec<u32>>,
    annotated_objects: Vec<ObjectIdx>,
    annotated_terms: Vec<TermIdx>,
    identity: u64,
}

impl Debug for AnnotationSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AnnotationSet with {} annotations on {} objects",
            self.annotations.len(),
            self.annotated_objects.len()
        )
    }
}

impl AnnotationSet {
    fn from_parts(
        ontology: Arc<Ontology>,
        objects: Arc<ObjectTable>,
        annotations: Vec<Annotation>,
    ) -> Self {
        let mut by_object: HashMap<ObjectIdx, Vec<u32>> = HashMap::new();
        let mut by_term: HashMap<TermIdx, Vec<u32>> = HashMap::new();
        let mut annotated_objects = Vec::new();
        let mut annotated_terms = Vec::new();

        for (pos, annotation) in annotations.iter().enumerate() {
            let pos = u32::try_from(pos).expect("more than u32::MAX annotations");
            let per_object = by_object.entry(annotation.object).or_default();
            if per_object.is_empty() {
                annotated_objects.push(annotation.object);
            }
            per_object.push(pos);

            let per_term = by_term.entry(annotation.term).or_default();
            if per_term.is_empty() {
                annotated_terms.push(annotation.term);
            }
            per_term.push(pos);
        }

        AnnotationSet {
            ontology,
            objects,
            annotations,
            by_object,
            by_term,
            annotated_objects,
            annotated_terms,
            identity: next_identity(),
        }
    }

    /// Returns the number of annotations in the set
    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    /// Returns `true` if the set contains no annotations
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Returns the governing ontology
    pub fn ontology(&self) -> &Arc<Ontology> {
        &self.ontology
    }

    /// Process-unique identity used to key the compiled-set cache
    pub fn identity(&self) -> u64 {
        self.identity
    }

    /// Returns all annotations, in insertion order
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Returns the annotations of one object; empty for unknown objects
    pub fn annotations_by_object(
        &self,
        object: ObjectIdx,
    ) -> impl Iterator<Item = &Annotation> + '_ {
        self.by_object
            .get(&object)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|&pos| &self.annotations[pos as usize])
    }

    /// Returns the annotations pinned at one term; empty for unknown terms
    ///
    /// Only direct annotations, no closure propagation.
    pub fn annotations_by_term(&self, term: TermIdx) -> impl Iterator<Item = &Annotation> + '_ {
        self.by_term
            .get(&term)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|&pos| &self.annotations[pos as usize])
    }

    /// Enumerates every object with at least one annotation, each once, in
    /// first-occurrence order
    pub fn annotated_objects(&self) -> &[ObjectIdx] {
        &self.annotated_objects
    }

    /// Enumerates every directly annotated term, each once, in
    /// first-occurrence order
    pub fn annotated_terms(&self) -> &[TermIdx] {
        &self.annotated_terms
    }

    /// Resolves an external object id to its interned index
    pub fn object_idx(&self, id: &str) -> Option<ObjectIdx> {
        self.objects.get(id)
    }

    /// Returns the external id of an interned object
    pub fn object_id(&self, idx: ObjectIdx) -> &str {
        self.objects.id(idx)
    }

    pub(crate) fn object_table(&self) -> &Arc<ObjectTable> {
        &self.objects
    }

    /// Derives a new set containing exactly the annotations whose evidence
    /// code is NOT listed in `excluded`
    ///
    /// The original set is unchanged. The derived set shares the object
    /// table, so object handles stay comparable across the family. Linear in
    /// the number of annotations; insertion order is preserved.
    pub fn evidence_filter(&self, excluded: &CodeSet) -> AnnotationSet {
        let surviving: Vec<Annotation> = self
            .annotations
            .iter()
            .filter(|a| !excluded.contains(&a.evidence_code))
            .cloned()
            .collect();
        debug!(
            before = self.annotations.len(),
            after = surviving.len(),
            "applied evidence filter"
        );
        AnnotationSet::from_parts(
            Arc::clone(&self.ontology),
            Arc::clone(&self.objects),
            surviving,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OntologyBuilder;

    fn small_ontology() -> Arc<Ontology> {
        let mut builder = OntologyBuilder::new();
        builder.add_term("T:a", "a", "bp").unwrap();
        builder.add_term("T:b", "b", "bp").unwrap();
        builder.add_parent_link("T:b", "T:a");
        Arc::new(builder.finalize().unwrap())
    }

    fn sample_set() -> AnnotationSet {
        let ontology = small_ontology();
        let mut builder = AnnotationSetBuilder::new(ontology);
        builder.add("o1", "T:b", "IDA", None, Vec::new()).unwrap();
        builder
            .add("o2", "T:a", "ISS", Some("NOT"), Vec::new())
            .unwrap();
        builder.add("o1", "T:a", "ISS", None, Vec::new()).unwrap();
        builder.build()
    }

    #[test]
    fn indexes_cover_all_annotations() {
        let set = sample_set();
        assert_eq!(set.len(), 3);

        let o1 = set.object_idx("o1").unwrap();
        let terms: Vec<&str> = set
            .annotations_by_object(o1)
            .map(|a| set.ontology().term_id(a.term()))
            .collect();
        assert_eq!(terms, vec!["T:b", "T:a"]);

        let a = set.ontology().term_idx("T:a").unwrap();
        assert_eq!(set.annotations_by_term(a).count(), 2);
    }

    #[test]
    fn unknown_keys_yield_empty_iterators() {
        let mut builder = OntologyBuilder::new();
        builder.add_term("T:a", "a", "bp").unwrap();
        builder.add_term("T:lonely", "lonely", "bp").unwrap();
        let ontology = Arc::new(builder.finalize().unwrap());
        let mut annotations = AnnotationSetBuilder::new(Arc::clone(&ontology));
        annotations.add("o1", "T:a", "IDA", None, Vec::new()).unwrap();
        let set = annotations.build();

        let lonely = ontology.term_idx("T:lonely").unwrap();
        assert_eq!(set.annotations_by_term(lonely).count(), 0);
        assert!(set.object_idx("o2").is_none());
    }

    #[test]
    fn interning_returns_the_same_handle() {
        let set = sample_set();
        let first = set.annotations()[0].object();
        let third = set.annotations()[2].object();
        assert_eq!(first, third);
        assert_eq!(set.object_id(first), "o1");
    }

    #[test]
    fn unknown_term_is_a_fatal_load_error() {
        let ontology = small_ontology();
        let mut builder = AnnotationSetBuilder::new(ontology);
        assert!(matches!(
            builder.add("o1", "T:ghost", "IDA", None, Vec::new()),
            Err(OntosimError::UnknownTerm(_))
        ));
    }

    #[test]
    fn evidence_filter_drops_only_listed_codes() {
        let set = sample_set();
        let filtered = set.evidence_filter(&CodeSet::parse("ISS"));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.annotations()[0].evidence_code(), "IDA");
        // the source set is untouched
        assert_eq!(set.len(), 3);
        // o2 lost its only annotation
        assert_eq!(filtered.annotated_objects().len(), 1);
        // handles stay comparable across the family
        assert_eq!(filtered.object_idx("o1"), set.object_idx("o1"));
    }

    #[test]
    fn empty_exclusion_keeps_everything() {
        let set = sample_set();
        let filtered = set.evidence_filter(&CodeSet::parse(""));
        assert_eq!(filtered.len(), set.len());
        assert_eq!(filtered.annotated_objects(), set.annotated_objects());
    }

    #[test]
    fn code_set_is_order_independent() {
        assert_eq!(CodeSet::parse("ISS,ISO"), CodeSet::parse("ISO ISS"));
        assert_eq!(CodeSet::parse(" ISS , ISS "), CodeSet::parse("ISS"));
        assert!(CodeSet::parse("").is_empty());
        assert!(CodeSet::parse("ISS,ISO").contains("ISO"));
        assert!(!CodeSet::parse("ISS").contains("IDA"));
    }
}
