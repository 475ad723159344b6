use std::collections::HashMap;

use crate::term::internal::TermInternal;
use crate::term::TermIdx;

/// Owns every term record and the string-id lookup table
///
/// Term indices are positions in the `terms` vector, assigned in insertion
/// order.
#[derive(Debug, Default)]
pub(crate) struct Arena {
    terms: Vec<TermInternal>,
    lookup: HashMap<String, TermIdx>,
}

impl Arena {
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Inserts a term record and returns its fresh index
    ///
    /// Callers must have checked that the id is not present yet.
    pub fn insert(&mut self, id: &str, term: TermInternal) -> TermIdx {
        let idx = term.idx();
        self.lookup.insert(id.to_string(), idx);
        self.terms.push(term);
        idx
    }

    pub fn next_idx(&self) -> TermIdx {
        TermIdx::new(self.terms.len())
    }

    pub fn idx_of(&self, id: &str) -> Option<TermIdx> {
        self.lookup.get(id).copied()
    }

    pub fn get(&self, idx: TermIdx) -> &TermInternal {
        &self.terms[idx.to_usize()]
    }

    pub fn get_mut(&mut self, idx: TermIdx) -> &mut TermInternal {
        &mut self.terms[idx.to_usize()]
    }

    pub fn values(&self) -> &[TermInternal] {
        &self.terms
    }
}
