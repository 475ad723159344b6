//! Terms, dense term indices and term sets

use core::fmt::Debug;
use std::fmt::Display;

use crate::idxset::IdxSet;
use crate::Ontology;

pub(crate) mod internal;

/// Dense index of a term inside its [`Ontology`]
///
/// Indices are assigned in insertion order during ontology construction and
/// are the only term handle used in set algebra. The external string id
/// (e.g. `GO:0007612`) is for I/O only.
#[derive(Copy, Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TermIdx {
    inner: u32,
}

impl TermIdx {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            inner: u32::try_from(n).expect("more than u32::MAX terms"),
        }
    }

    /// Returns the index as a `usize` for slice addressing
    pub fn to_usize(self) -> usize {
        self.inner as usize
    }
}

impl Debug for TermIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TermIdx({})", self.inner)
    }
}

impl Display for TermIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

/// Dense index of a namespace inside its [`Ontology`]
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NamespaceIdx {
    inner: u16,
}

impl NamespaceIdx {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            inner: u16::try_from(n).expect("more than u16::MAX namespaces"),
        }
    }

    /// Returns the index as a `usize` for slice addressing
    pub fn to_usize(self) -> usize {
        self.inner as usize
    }
}

/// A sorted set of [`TermIdx`]
pub type TermSet = IdxSet<TermIdx>;

/// Read-only view of a single ontology term
///
/// Obtained from [`Ontology::term`] or [`Ontology::term_by_idx`]. The view
/// borrows the ontology, so closures come back as references into the
/// eagerly materialised closure tables.
#[derive(Copy, Clone, Debug)]
pub struct Term<'a> {
    idx: TermIdx,
    id: &'a str,
    name: &'a str,
    namespace: NamespaceIdx,
    ontology: &'a Ontology,
}

impl<'a> Term<'a> {
    pub(crate) fn new(ontology: &'a Ontology, internal: &'a internal::TermInternal) -> Term<'a> {
        Term {
            idx: internal.idx(),
            id: internal.id(),
            name: internal.name(),
            namespace: internal.namespace(),
            ontology,
        }
    }

    /// Returns the dense index of the term
    pub fn idx(&self) -> TermIdx {
        self.idx
    }

    /// Returns the external string id, e.g. `GO:0007612`
    pub fn id(&self) -> &str {
        self.id
    }

    /// Returns the display name of the term
    pub fn name(&self) -> &str {
        self.name
    }

    /// Returns the dense index of the term's namespace
    pub fn namespace_idx(&self) -> NamespaceIdx {
        self.namespace
    }

    /// Returns the name of the term's namespace
    pub fn namespace(&self) -> &str {
        self.ontology.namespace_name(self.namespace)
    }

    /// Returns the term itself plus all its ancestors
    pub fn forward_closure(&self) -> &'a TermSet {
        self.ontology.forward_closure(self.idx)
    }

    /// Returns the term itself plus all its descendants
    pub fn reverse_closure(&self) -> &'a TermSet {
        self.ontology.reverse_closure(self.idx)
    }
}
