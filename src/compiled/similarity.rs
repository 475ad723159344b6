//! The three ranking measures over a compiled annotation set
//!
//! All measures share the same frame: normalise the query to a
//! namespace-restricted term set `Q`, walk every annotated object as a
//! candidate, score it, then sort score-descending with ties broken by
//! external object id ascending and truncate to the requested length.
//!
//! Term sets are expanded through the forward closure (self plus ancestors)
//! before intersection and union, and the most informative common ancestor
//! drives the Resnik pairing. Undefined information content counts as 0.

use crate::term::{NamespaceIdx, TermIdx, TermSet};
use crate::{CancelToken, ObjectIdx, OntosimError, OntosimResult};

use super::CompiledAnnotationSet;

/// The query side of a similarity call
#[derive(Debug, Clone)]
pub enum QueryInput {
    /// Rank against the terms annotated to this external object id
    ///
    /// An unknown id is not an error; it behaves like an empty term set and
    /// produces the all-zero ranking.
    Object(String),
    /// Rank against an explicit list of terms
    Terms(Vec<TermIdx>),
}

/// One entry of a ranking: an annotated object and its score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedMatch {
    /// The candidate object
    pub object: ObjectIdx,
    /// The similarity score; higher is more similar
    pub score: f64,
}

impl CompiledAnnotationSet {
    /// Resnik best-match-average ranking
    ///
    /// Every query term is paired with its best-matching candidate term by
    /// most-informative-common-ancestor score; the pairing maxima are
    /// averaged over the query side only.
    pub fn resnik_bma(
        &self,
        query: &QueryInput,
        namespace: &str,
        length: usize,
        cancel: &CancelToken,
    ) -> OntosimResult<Vec<RankedMatch>> {
        let ns = self.resolve_namespace(namespace)?;
        let q = self.query_terms(query, ns);

        let mut scored = Vec::with_capacity(self.candidates().len());
        for &candidate in self.candidates() {
            if cancel.is_cancelled() {
                return Err(OntosimError::Cancelled);
            }
            let score = if q.is_empty() {
                0.0
            } else {
                let cu = self.object_terms_in(candidate, ns);
                if cu.is_empty() {
                    0.0
                } else {
                    let mut total = 0.0;
                    for query_term in &q {
                        let mut best = 0.0f64;
                        for cand_term in &cu {
                            best = best.max(self.mica_score(query_term, cand_term));
                        }
                        total += best;
                    }
                    total / q.len() as f64
                }
            };
            scored.push((candidate, score));
        }
        Ok(self.rank(scored, length))
    }

    /// Extended Jaccard ranking
    ///
    /// Query and candidate term sets are expanded through the forward
    /// closure; the score is the Jaccard coefficient of the expansions,
    /// with `0/0` defined as 0.
    pub fn jaccard_ext(
        &self,
        query: &QueryInput,
        namespace: &str,
        length: usize,
        cancel: &CancelToken,
    ) -> OntosimResult<Vec<RankedMatch>> {
        let ns = self.resolve_namespace(namespace)?;
        let q = self.query_terms(query, ns);
        let qs = self.closure_union(&q);

        let mut scored = Vec::with_capacity(self.candidates().len());
        for &candidate in self.candidates() {
            if cancel.is_cancelled() {
                return Err(OntosimError::Cancelled);
            }
            let cu = self.object_terms_in(candidate, ns);
            let cs = self.closure_union(&cu);
            let union = (&qs | &cs).len();
            let score = if union == 0 {
                0.0
            } else {
                (&qs & &cs).len() as f64 / union as f64
            };
            scored.push((candidate, score));
        }
        Ok(self.rank(scored, length))
    }

    /// Extended graph-information-content ranking
    ///
    /// Like the extended Jaccard, but overlap and total are weighted by the
    /// information content of each term in the expansions.
    pub fn gic_ext(
        &self,
        query: &QueryInput,
        namespace: &str,
        length: usize,
        cancel: &CancelToken,
    ) -> OntosimResult<Vec<RankedMatch>> {
        let ns = self.resolve_namespace(namespace)?;
        let q = self.query_terms(query, ns);
        let qs = self.closure_union(&q);

        let mut scored = Vec::with_capacity(self.candidates().len());
        for &candidate in self.candidates() {
            if cancel.is_cancelled() {
                return Err(OntosimError::Cancelled);
            }
            let cu = self.object_terms_in(candidate, ns);
            let cs = self.closure_union(&cu);
            let total = self.ic_sum(&(&qs | &cs));
            let score = if total == 0.0 {
                0.0
            } else {
                self.ic_sum(&(&qs & &cs)) / total
            };
            scored.push((candidate, score));
        }
        Ok(self.rank(scored, length))
    }

    fn resolve_namespace(&self, name: &str) -> OntosimResult<NamespaceIdx> {
        self.ontology()
            .namespace(name)
            .ok_or_else(|| OntosimError::InvalidNamespace(name.to_string()))
    }

    /// Normalises the query to its namespace-restricted term set
    fn query_terms(&self, query: &QueryInput, namespace: NamespaceIdx) -> TermSet {
        match query {
            QueryInput::Object(id) => match self.object_idx(id) {
                Some(object) => self.object_terms_in(object, namespace),
                None => TermSet::new(),
            },
            QueryInput::Terms(terms) => terms
                .iter()
                .filter(|&&t| self.ontology().namespace_of(t) == namespace)
                .copied()
                .collect(),
        }
    }

    /// The candidate's directly annotated terms, restricted to the namespace
    fn object_terms_in(&self, object: ObjectIdx, namespace: NamespaceIdx) -> TermSet {
        match self.terms_for_object(object) {
            Some(terms) => {
                let mut restricted = terms.clone();
                restricted.retain(|t| self.ontology().namespace_of(t) == namespace);
                restricted
            }
            None => TermSet::new(),
        }
    }

    /// Union of the forward closures of every term in the set
    fn closure_union(&self, terms: &TermSet) -> TermSet {
        let mut union = TermSet::new();
        for term in terms {
            union = &union | self.ontology().forward_closure(term);
        }
        union
    }

    /// Max information content over the common ancestors of two terms
    ///
    /// Undefined information content counts as 0; an empty intersection
    /// scores 0.
    fn mica_score(&self, a: TermIdx, b: TermIdx) -> f64 {
        let common = self.ontology().forward_closure(a) & self.ontology().forward_closure(b);
        let mut best = 0.0f64;
        for term in &common {
            best = best.max(self.information_content(term).unwrap_or(0.0));
        }
        best
    }

    fn ic_sum(&self, terms: &TermSet) -> f64 {
        terms
            .iter()
            .map(|t| self.information_content(t).unwrap_or(0.0))
            .sum()
    }

    /// Sorts score-descending, ties by external object id ascending, and
    /// truncates to the requested length
    fn rank(&self, mut scored: Vec<(ObjectIdx, f64)>, length: usize) -> Vec<RankedMatch> {
        scored.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| self.object_id(a.0).cmp(self.object_id(b.0)))
        });
        scored.truncate(length);
        scored
            .into_iter()
            .map(|(object, score)| RankedMatch { object, score })
            .collect()
    }
}
