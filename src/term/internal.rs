use smallvec::SmallVec;

use crate::term::{NamespaceIdx, TermIdx, TermSet};
use crate::DEFAULT_NUM_PARENTS;

/// Owned term record inside the ontology arena
///
/// Parents and children hold direct edges only; the closure fields are
/// filled once during [`crate::OntologyBuilder::finalize`] and never touched
/// again.
#[derive(Clone, Debug)]
pub(crate) struct TermInternal {
    idx: TermIdx,
    id: String,
    name: String,
    namespace: NamespaceIdx,
    parents: SmallVec<[TermIdx; DEFAULT_NUM_PARENTS]>,
    children: SmallVec<[TermIdx; DEFAULT_NUM_PARENTS]>,
    forward_closure: TermSet,
    reverse_closure: TermSet,
}

impl TermInternal {
    pub fn new(idx: TermIdx, id: String, name: String, namespace: NamespaceIdx) -> TermInternal {
        TermInternal {
            idx,
            id,
            name,
            namespace,
            parents: SmallVec::new(),
            children: SmallVec::new(),
            forward_closure: TermSet::new(),
            reverse_closure: TermSet::new(),
        }
    }

    pub fn idx(&self) -> TermIdx {
        self.idx
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> NamespaceIdx {
        self.namespace
    }

    pub fn parents(&self) -> &[TermIdx] {
        &self.parents
    }

    pub fn children(&self) -> &[TermIdx] {
        &self.children
    }

    pub fn add_parent(&mut self, parent: TermIdx) {
        if !self.parents.contains(&parent) {
            self.parents.push(parent);
        }
    }

    pub fn add_child(&mut self, child: TermIdx) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    pub fn forward_closure(&self) -> &TermSet {
        &self.forward_closure
    }

    pub fn reverse_closure(&self) -> &TermSet {
        &self.reverse_closure
    }

    pub fn set_forward_closure(&mut self, closure: TermSet) {
        self.forward_closure = closure;
    }

    pub fn set_reverse_closure(&mut self, closure: TermSet) {
        self.reverse_closure = closure;
    }
}
