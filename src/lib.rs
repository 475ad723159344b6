//! Semantic-similarity rankings between ontology-annotated objects
//!
//! `ontosim` takes a DAG ontology (e.g. Gene Ontology, Mammalian Phenotype),
//! a set of annotations linking external objects (genes, genotypes) to
//! ontology terms, and an evidence-code exclusion list, and compiles them
//! into a read-only [`CompiledAnnotationSet`] that answers top-K similarity
//! queries under three measures: Resnik best-match-average, extended Jaccard
//! and extended graph information content.
//!
//! The typical entry point is the [`SearchEngine`] facade, which owns named
//! ontologies and annotation sets, caches compiled sets and formats results:
//!
//! ```
//! use ontosim::{parser, SearchEngine, SearchRequest};
//! use std::sync::Arc;
//!
//! let obo = "\
//! [Term]
//! id: GO:0000001
//! name: root
//! namespace: biological_process
//!
//! [Term]
//! id: GO:0000002
//! name: child
//! namespace: biological_process
//! is_a: GO:0000001 ! root
//! ";
//! let ontology = Arc::new(parser::ontology_from_obo_str(obo).unwrap());
//! let annotations = parser::annotation_set_from_str(
//!     "g1\tGO:0000002\tIDA\n",
//!     Arc::clone(&ontology),
//! )
//! .unwrap();
//!
//! let mut engine = SearchEngine::new();
//! engine.register_annotation_set("geneGO", annotations);
//!
//! let request = SearchRequest {
//!     ann_set: "geneGO".into(),
//!     excluded_codes: String::new(),
//!     query_kind: "object".into(),
//!     query_input: "g1".into(),
//!     namespace: "biological_process".into(),
//!     method: "jaccardExt".into(),
//!     length: 10,
//!     format: "raw".into(),
//! };
//! let outcome = engine.search(&request).unwrap();
//! assert!(matches!(outcome, ontosim::SearchOutput::Raw(_)));
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;

mod annotations;
mod compiled;
mod engine;
mod idxset;
mod ontology;
pub mod parser;
mod term;

pub use annotations::{
    Annotation, AnnotationSet, AnnotationSetBuilder, CodeSet, ObjectIdx, ObjectSet,
};
pub use compiled::{CompiledAnnotationSet, CompiledCache, QueryInput, RankedMatch};
pub use engine::{
    IdentityLabeler, LabelKind, Labeler, Method, QueryKind, RankedEntry, SearchEngine,
    SearchOutput, SearchRequest,
};
pub use idxset::IdxSet;
pub use ontology::{Ontology, OntologyBuilder};
pub use term::{NamespaceIdx, Term, TermIdx, TermSet};

pub(crate) const DEFAULT_NUM_PARENTS: usize = 8;
pub(crate) const DEFAULT_NUM_ROOTS: usize = 2;

/// Errors surfaced by ontology construction, annotation loading and queries
#[derive(Error, Debug)]
pub enum OntosimError {
    /// The requested annotation-set name is not registered
    #[error("unknown annotation set `{0}`")]
    InvalidAnnSet(String),
    /// The similarity method name is not one of `resnikBMA`, `jaccardExt`, `gicExt`
    #[error("unknown similarity method `{0}`")]
    InvalidMethod(String),
    /// The query kind is neither `object` nor `list`
    #[error("query kind must be `object` or `list`, got `{0}`")]
    InvalidQueryKind(String),
    /// The requested result length is negative
    #[error("result length must be non-negative, got {0}")]
    InvalidLength(i64),
    /// The requested namespace does not exist in the governing ontology
    #[error("namespace `{0}` is not part of the ontology")]
    InvalidNamespace(String),
    /// A term id in a `list` query was not found in the ontology
    #[error("unknown query term `{0}`")]
    InvalidQueryTerm(String),
    /// Compiling an annotation set failed; the cause is carried verbatim
    #[error("failed to compile annotation set: {0}")]
    BuildFailure(String),
    /// The query was cancelled through its [`CancelToken`]
    #[error("query was cancelled")]
    Cancelled,
    /// The ontology edge set contains a cycle
    #[error("ontology cycle detected at term `{0}`")]
    CycleDetected(String),
    /// A referenced term id does not exist in the ontology
    #[error("unknown term `{0}`")]
    UnknownTerm(String),
    /// The same term id was added to the ontology twice
    #[error("duplicate term `{0}`")]
    DuplicateTerm(String),
    /// An input file or string could not be parsed
    #[error("malformed record at line {line}: {message}")]
    MalformedRecord {
        /// 1-based line number in the input
        line: usize,
        /// what went wrong
        message: String,
    },
    /// Reading an input file failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias
pub type OntosimResult<T> = Result<T, OntosimError>;

/// Cooperative cancellation handle for similarity queries
///
/// Queries check the token before compiling an annotation set and between
/// per-candidate iterations. Cancellation never leaves partial state in the
/// compiled-set cache.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Returns a fresh, un-cancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of every query holding a clone of this token
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once [`CancelToken::cancel`] has been called
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Hands out process-unique identity stamps for ontologies and annotation
/// sets. Identities key the compiled-set cache.
pub(crate) fn next_identity() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}
