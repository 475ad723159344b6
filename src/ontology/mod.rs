//! The immutable ontology DAG and its builder
//!
//! An [`Ontology`] owns all terms, the namespace registry, the per-namespace
//! root sets and the eagerly materialised forward (ancestors-including-self)
//! and reverse (descendants-including-self) closures. Every similarity query
//! touches the closures, so they are computed once during
//! [`OntologyBuilder::finalize`] and frozen before the ontology is exposed.

use core::fmt::Debug;

use smallvec::SmallVec;
use tracing::debug;

use crate::term::internal::TermInternal;
use crate::term::{NamespaceIdx, Term, TermIdx, TermSet};
use crate::{next_identity, OntosimError, OntosimResult, DEFAULT_NUM_ROOTS};

mod arena;
use arena::Arena;

type Roots = SmallVec<[TermIdx; DEFAULT_NUM_ROOTS]>;

/// An immutable DAG of terms, ready for similarity queries
///
/// Construct through [`OntologyBuilder`] (or [`crate::parser`] for file
/// input). After construction the ontology never changes; any number of
/// reader tasks may share it without locking.
pub struct Ontology {
    arena: Arena,
    namespaces: Vec<String>,
    roots: Vec<Roots>,
    identity: u64,
}

impl Debug for Ontology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Ontology with {} terms in {} namespaces",
            self.arena.len(),
            self.namespaces.len()
        )
    }
}

impl Ontology {
    /// Returns the number of terms in the ontology
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Returns `true` if the ontology does not contain any terms
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Returns the term with the given external id, or `None`
    pub fn term(&self, id: &str) -> Option<Term<'_>> {
        self.arena
            .idx_of(id)
            .map(|idx| Term::new(self, self.arena.get(idx)))
    }

    /// Returns the dense index of the given external id, or `None`
    pub fn term_idx(&self, id: &str) -> Option<TermIdx> {
        self.arena.idx_of(id)
    }

    /// Returns the term at the given dense index
    pub fn term_by_idx(&self, idx: TermIdx) -> Term<'_> {
        Term::new(self, self.arena.get(idx))
    }

    /// Returns the external id of the term at the given dense index
    pub fn term_id(&self, idx: TermIdx) -> &str {
        self.arena.get(idx).id()
    }

    /// Returns an iterator over all terms, in dense-index order
    pub fn terms(&self) -> Terms<'_> {
        Terms {
            inner: self.arena.values().iter(),
            ontology: self,
        }
    }

    /// Resolves a namespace name, or `None` if unknown
    pub fn namespace(&self, name: &str) -> Option<NamespaceIdx> {
        self.namespaces
            .iter()
            .position(|n| n == name)
            .map(NamespaceIdx::new)
    }

    /// Returns the name of a namespace
    pub fn namespace_name(&self, idx: NamespaceIdx) -> &str {
        &self.namespaces[idx.to_usize()]
    }

    /// Returns the names of all namespaces, in registration order
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    /// Returns the roots of a namespace, ordered ascending by dense index
    ///
    /// A root is a term with no parent inside its own namespace. The order
    /// is stable across runs for identical input; the first entry is the
    /// information-content denominator for the namespace.
    pub fn roots(&self, namespace: NamespaceIdx) -> &[TermIdx] {
        &self.roots[namespace.to_usize()]
    }

    /// Returns the term itself plus all its ancestors
    pub fn forward_closure(&self, idx: TermIdx) -> &TermSet {
        self.arena.get(idx).forward_closure()
    }

    /// Returns the term itself plus all its descendants
    pub fn reverse_closure(&self, idx: TermIdx) -> &TermSet {
        self.arena.get(idx).reverse_closure()
    }

    /// Returns the namespace index of the term at the given dense index
    pub fn namespace_of(&self, idx: TermIdx) -> NamespaceIdx {
        self.arena.get(idx).namespace()
    }

    /// Process-unique identity used to key the compiled-set cache
    pub fn identity(&self) -> u64 {
        self.identity
    }
}

/// Collects terms and parent links, then freezes them into an [`Ontology`]
///
/// Parent links may reference terms that have not been added yet; they are
/// resolved during [`OntologyBuilder::finalize`], which also computes both
/// closures and rejects cyclic edge sets.
#[derive(Debug, Default)]
pub struct OntologyBuilder {
    arena: Arena,
    namespaces: Vec<String>,
    links: Vec<(String, String)>,
}

impl OntologyBuilder {
    /// Constructs a new, empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a term and returns its dense index
    ///
    /// Fails with [`OntosimError::DuplicateTerm`] if the id was added before.
    pub fn add_term(&mut self, id: &str, name: &str, namespace: &str) -> OntosimResult<TermIdx> {
        if self.arena.idx_of(id).is_some() {
            return Err(OntosimError::DuplicateTerm(id.to_string()));
        }
        let ns = self.namespace_idx(namespace);
        let idx = self.arena.next_idx();
        let term = TermInternal::new(idx, id.to_string(), name.to_string(), ns);
        Ok(self.arena.insert(id, term))
    }

    /// Records a child → parent link for resolution at finalize time
    pub fn add_parent_link(&mut self, child: &str, parent: &str) {
        self.links.push((child.to_string(), parent.to_string()));
    }

    fn namespace_idx(&mut self, name: &str) -> NamespaceIdx {
        match self.namespaces.iter().position(|n| n == name) {
            Some(pos) => NamespaceIdx::new(pos),
            None => {
                self.namespaces.push(name.to_string());
                NamespaceIdx::new(self.namespaces.len() - 1)
            }
        }
    }

    /// Resolves all links, computes closures and root sets, and freezes the
    /// ontology
    ///
    /// Fails with [`OntosimError::UnknownTerm`] for a link endpoint that was
    /// never added and with [`OntosimError::CycleDetected`] if the edge set
    /// is not acyclic.
    pub fn finalize(mut self) -> OntosimResult<Ontology> {
        for (child, parent) in std::mem::take(&mut self.links) {
            let child_idx = self
                .arena
                .idx_of(&child)
                .ok_or_else(|| OntosimError::UnknownTerm(child.clone()))?;
            let parent_idx = self
                .arena
                .idx_of(&parent)
                .ok_or_else(|| OntosimError::UnknownTerm(parent.clone()))?;
            self.arena.get_mut(child_idx).add_parent(parent_idx);
            self.arena.get_mut(parent_idx).add_child(child_idx);
        }

        let order = self.topological_order()?;
        self.compute_closures(&order);

        let n = self.arena.len();
        let mut roots: Vec<Roots> = vec![Roots::new(); self.namespaces.len()];
        for i in 0..n {
            let term = self.arena.get(TermIdx::new(i));
            let ns = term.namespace();
            // a root is maximal within its own namespace; closures are
            // namespace-restricted, so a parent link into another namespace
            // must not disqualify the term
            if term
                .parents()
                .iter()
                .all(|&parent| self.arena.get(parent).namespace() != ns)
            {
                roots[ns.to_usize()].push(term.idx());
            }
        }

        debug!(
            terms = n,
            namespaces = self.namespaces.len(),
            "ontology finalized"
        );

        Ok(Ontology {
            arena: self.arena,
            namespaces: self.namespaces,
            roots,
            identity: next_identity(),
        })
    }

    /// Kahn traversal over parent → child edges; parents come before their
    /// children in the returned order
    fn topological_order(&self) -> OntosimResult<Vec<TermIdx>> {
        let n = self.arena.len();
        let mut indegree: Vec<usize> = (0..n)
            .map(|i| self.arena.get(TermIdx::new(i)).parents().len())
            .collect();

        let mut queue: Vec<TermIdx> = (0..n)
            .filter(|&i| indegree[i] == 0)
            .map(TermIdx::new)
            .collect();
        let mut order = Vec::with_capacity(n);

        while let Some(idx) = queue.pop() {
            order.push(idx);
            for &child in self.arena.get(idx).children() {
                indegree[child.to_usize()] -= 1;
                if indegree[child.to_usize()] == 0 {
                    queue.push(child);
                }
            }
        }

        if order.len() != n {
            let culprit = (0..n)
                .find(|&i| indegree[i] > 0)
                .map(|i| self.arena.get(TermIdx::new(i)).id().to_string())
                .unwrap_or_default();
            return Err(OntosimError::CycleDetected(culprit));
        }
        Ok(order)
    }

    /// Forward closures accumulate down the topological order, reverse
    /// closures up it. Closures stay restricted to the term's own namespace.
    fn compute_closures(&mut self, order: &[TermIdx]) {
        let n = self.arena.len();

        let mut forward: Vec<TermSet> = vec![TermSet::new(); n];
        for &idx in order {
            let term = self.arena.get(idx);
            let ns = term.namespace();
            let mut closure = TermSet::new();
            for &parent in term.parents() {
                closure = &closure | &forward[parent.to_usize()];
            }
            closure.retain(|t| self.arena.get(t).namespace() == ns);
            closure.insert(idx);
            forward[idx.to_usize()] = closure;
        }

        let mut reverse: Vec<TermSet> = vec![TermSet::new(); n];
        for &idx in order.iter().rev() {
            let term = self.arena.get(idx);
            let ns = term.namespace();
            let mut closure = TermSet::new();
            for &child in term.children() {
                closure = &closure | &reverse[child.to_usize()];
            }
            closure.retain(|t| self.arena.get(t).namespace() == ns);
            closure.insert(idx);
            reverse[idx.to_usize()] = closure;
        }

        for (i, (fwd, rev)) in forward.into_iter().zip(reverse).enumerate() {
            let term = self.arena.get_mut(TermIdx::new(i));
            term.set_forward_closure(fwd);
            term.set_reverse_closure(rev);
        }
    }
}

/// An iterator of [`Term`]s in dense-index order
pub struct Terms<'a> {
    inner: std::slice::Iter<'a, TermInternal>,
    ontology: &'a Ontology,
}

impl<'a> Iterator for Terms<'a> {
    type Item = Term<'a>;
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|term| Term::new(self.ontology, term))
    }
}

impl<'a> IntoIterator for &'a Ontology {
    type Item = Term<'a>;
    type IntoIter = Terms<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.terms()
    }
}
