//! Plain-text loaders for ontologies and annotation tables
//!
//! Two input shapes are supported:
//!
//! - An OBO subset for ontologies: `[Term]` stanzas carrying `id`, `name`,
//!   `namespace` and `is_a` lines. Everything else is ignored.
//! - A tab-separated table for annotations: one row per annotation with
//!   columns `object_id`, `term_id`, `evidence_code`, optional `qualifier`
//!   and optional `object_type`. Lines starting with `!` or `#` are
//!   comments.
//!
//! Both loaders exist in string and file flavours; the string flavours are
//! what the tests drive.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::{
    AnnotationSet, AnnotationSetBuilder, Ontology, OntologyBuilder, OntosimError, OntosimResult,
};

/// Parses an OBO-subset document into a frozen [`Ontology`]
///
/// Stanzas without an `id`, `name` and `namespace` are skipped with a
/// warning. Cycles and dangling `is_a` targets surface as errors from
/// [`OntologyBuilder::finalize`].
pub fn ontology_from_obo_str(content: &str) -> OntosimResult<Ontology> {
    let mut builder = OntologyBuilder::new();

    for stanza in content.split("\n\n") {
        let stanza = stanza.trim_start_matches('\n');
        if let Some(body) = stanza.strip_prefix("[Term]\n") {
            if let Some(term) = TermStanza::parse(body) {
                builder.add_term(term.id, term.name, term.namespace)?;
                for parent in term.parents {
                    builder.add_parent_link(term.id, parent);
                }
            } else if !body.trim().is_empty() {
                warn!("skipping incomplete term stanza: {}", body.trim());
            }
        } else if !stanza.trim().is_empty() {
            trace!("ignoring stanza: {}", stanza.trim());
        }
    }

    builder.finalize()
}

/// Reads an OBO-subset file into a frozen [`Ontology`]
pub fn read_obo_file<P: AsRef<Path>>(path: P) -> OntosimResult<Ontology> {
    let content = fs::read_to_string(path)?;
    ontology_from_obo_str(&content)
}

struct TermStanza<'a> {
    id: &'a str,
    name: &'a str,
    namespace: &'a str,
    parents: Vec<&'a str>,
}

impl<'a> TermStanza<'a> {
    fn parse(body: &'a str) -> Option<TermStanza<'a>> {
        let mut id = None;
        let mut name = None;
        let mut namespace = None;
        let mut parents = Vec::new();

        for line in body.lines() {
            match line.split_once(": ") {
                Some(("id", value)) => id = Some(value),
                Some(("name", value)) => name = Some(value),
                Some(("namespace", value)) => namespace = Some(value),
                Some(("is_a", value)) => {
                    // `is_a: GO:0000001 ! root` carries the target before `!`
                    let target = value.split(" !").next().unwrap_or(value).trim();
                    if !target.is_empty() {
                        parents.push(target);
                    }
                }
                _ => (),
            }
        }

        Some(TermStanza {
            id: id?,
            name: name?,
            namespace: namespace?,
            parents,
        })
    }
}

/// Parses a tab-separated annotation table into an [`AnnotationSet`]
///
/// Row layout: `object_id\tterm_id\tevidence_code[\tqualifier[\tobject_type]]`.
/// An empty qualifier column means no qualifier. The `object_type` column is
/// kept in the annotation's attribute bag. An unknown term id is a fatal
/// load error.
pub fn annotation_set_from_str(
    content: &str,
    ontology: Arc<Ontology>,
) -> OntosimResult<AnnotationSet> {
    let mut builder = AnnotationSetBuilder::new(ontology);

    for (number, line) in content.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('!') || line.starts_with('#') {
            continue;
        }
        let mut columns = line.split('\t');
        let object_id = columns.next().filter(|c| !c.is_empty());
        let term_id = columns.next().filter(|c| !c.is_empty());
        let evidence = columns.next().filter(|c| !c.is_empty());
        let (object_id, term_id, evidence) = match (object_id, term_id, evidence) {
            (Some(o), Some(t), Some(e)) => (o, t, e),
            _ => {
                return Err(OntosimError::MalformedRecord {
                    line: number + 1,
                    message: format!("expected object, term and evidence columns in `{line}`"),
                })
            }
        };
        let qualifier = columns.next().filter(|c| !c.is_empty());
        let attributes = match columns.next().filter(|c| !c.is_empty()) {
            Some(object_type) => vec![("objectType".to_string(), object_type.to_string())],
            None => Vec::new(),
        };
        builder.add(object_id, term_id, evidence, qualifier, attributes)?;
    }

    Ok(builder.build())
}

/// Reads a tab-separated annotation file into an [`AnnotationSet`]
pub fn read_annotation_file<P: AsRef<Path>>(
    path: P,
    ontology: Arc<Ontology>,
) -> OntosimResult<AnnotationSet> {
    let content = fs::read_to_string(path)?;
    annotation_set_from_str(&content, ontology)
}
