//! Output formatters and the labelling seam
//!
//! Formatters are pure functions over the ranked list plus the echoed
//! request parameters. Labels come from a [`Labeler`] collaborator; the
//! label kind is chosen by namespace, because genotype annotation sets live
//! in the phenotype namespace while everything else labels genes.

use serde_json::json;

use super::{RankedEntry, SearchRequest};

/// Namespace whose annotated objects are genotypes rather than genes
pub(crate) const GENOTYPE_NAMESPACE: &str = "MPheno.ontology";

/// The kind of object a label is requested for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    /// A gene id, e.g. `MGI:1918911`
    Gene,
    /// A genotype id
    Genotype,
}

/// Resolves external object ids to display labels
pub trait Labeler: Send + Sync {
    /// Returns the display label for the given id
    fn label(&self, kind: LabelKind, id: &str) -> String;
}

/// Fallback labeller that echoes the id
#[derive(Debug, Default)]
pub struct IdentityLabeler;

impl Labeler for IdentityLabeler {
    fn label(&self, _kind: LabelKind, id: &str) -> String {
        id.to_string()
    }
}

pub(crate) fn label_kind(namespace: &str) -> LabelKind {
    if namespace == GENOTYPE_NAMESPACE {
        LabelKind::Genotype
    } else {
        LabelKind::Gene
    }
}

/// Header line, one `label\t\tscore` line per result, then all result ids
/// on one line separated by single spaces
pub(crate) fn plaintext(
    entries: &[RankedEntry],
    request: &SearchRequest,
    labeler: &dyn Labeler,
) -> String {
    let kind = label_kind(&request.namespace);
    let mut out = format!(
        "{}:Top{}{}results for {}",
        request.namespace, request.length, request.method, request.query_input
    );
    for entry in entries {
        out.push('\n');
        out.push_str(&labeler.label(kind, &entry.id));
        out.push_str("\t\t");
        out.push_str(&entry.score.to_string());
    }
    out.push('\n');
    let ids: Vec<&str> = entries.iter().map(|entry| entry.id.as_str()).collect();
    out.push_str(&ids.join(" "));
    out
}

/// `{"params": {...}, "results": [[label, score], ...]}` with tabs in
/// labels replaced by single spaces
pub(crate) fn to_json(
    entries: &[RankedEntry],
    request: &SearchRequest,
    labeler: &dyn Labeler,
) -> String {
    let kind = label_kind(&request.namespace);
    let results: Vec<serde_json::Value> = entries
        .iter()
        .map(|entry| {
            let label = labeler.label(kind, &entry.id).replace('\t', " ");
            json!([label, entry.score])
        })
        .collect();
    json!({
        "params": {
            "annSet": request.ann_set,
            "excludedCodes": request.excluded_codes,
            "queryKind": request.query_kind,
            "queryInput": request.query_input,
            "namespace": request.namespace,
            "method": request.method,
            "length": request.length,
        },
        "results": results,
    })
    .to_string()
}

/// A two-column table with a `Result | Score` header
pub(crate) fn to_html(
    entries: &[RankedEntry],
    request: &SearchRequest,
    labeler: &dyn Labeler,
) -> String {
    let kind = label_kind(&request.namespace);
    let mut out =
        String::from("<table border=\"1\"><thead><th>Result</th><th>Score</th></thead><tbody>");
    for entry in entries {
        let label = labeler.label(kind, &entry.id).replace('\t', " ");
        out.push_str("<tr><td>");
        out.push_str(&label);
        out.push_str("</td><td>");
        out.push_str(&entry.score.to_string());
        out.push_str("</td></tr>");
    }
    out.push_str("</tbody></table>");
    out
}
