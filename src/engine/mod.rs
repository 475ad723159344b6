//! The query facade
//!
//! A [`SearchEngine`] owns named ontologies and annotation sets, caches
//! compiled sets and turns one stringly request into a validated similarity
//! query: it resolves the annotation set, canonicalises the evidence codes,
//! parses the query input, dispatches to the chosen measure and hands the
//! ranked list to a formatter. All validation happens before any
//! computation; the caller either gets a result or a structured error.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::compiled::{CompiledCache, QueryInput};
use crate::term::TermIdx;
use crate::{
    AnnotationSet, CancelToken, CodeSet, Ontology, OntosimError, OntosimResult,
};

mod format;
pub use format::{IdentityLabeler, LabelKind, Labeler};

/// The three supported similarity measures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Resnik best-match-average
    ResnikBma,
    /// Extended Jaccard over closure-expanded term sets
    JaccardExt,
    /// Extended graph information content
    GicExt,
}

impl FromStr for Method {
    type Err = OntosimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resnikBMA" => Ok(Method::ResnikBma),
            "jaccardExt" => Ok(Method::JaccardExt),
            "gicExt" => Ok(Method::GicExt),
            other => Err(OntosimError::InvalidMethod(other.to_string())),
        }
    }
}

/// How the query input is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// The input is one annotated-object id
    Object,
    /// The input is a comma- or space-separated list of term ids
    List,
}

impl FromStr for QueryKind {
    type Err = OntosimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "object" => Ok(QueryKind::Object),
            "list" => Ok(QueryKind::List),
            other => Err(OntosimError::InvalidQueryKind(other.to_string())),
        }
    }
}

/// The output rendering of a search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    /// The ranked list itself
    Raw,
    /// Plain text: header, result lines, id line
    Plaintext,
    /// A JSON object with echoed params and `[label, score]` pairs
    Json,
    /// A two-column HTML table
    Html,
}

impl OutputFormat {
    /// Unrecognized format names fall back to the raw ranking
    fn parse(s: &str) -> Self {
        match s {
            "plaintext" => OutputFormat::Plaintext,
            "json" => OutputFormat::Json,
            "html" => OutputFormat::Html,
            _ => OutputFormat::Raw,
        }
    }
}

/// One similarity request, as it arrives from the outside
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Logical name of the annotation set, e.g. `geneGO`
    pub ann_set: String,
    /// Evidence codes to exclude, comma or space separated; empty = none
    pub excluded_codes: String,
    /// `object` or `list`
    pub query_kind: String,
    /// Object id, or comma/space separated term ids
    pub query_input: String,
    /// Ontology namespace the query is scoped to
    pub namespace: String,
    /// `resnikBMA`, `jaccardExt` or `gicExt`
    pub method: String,
    /// Number of results to return; must be non-negative
    pub length: i64,
    /// `raw`, `plaintext`, `json` or `html`
    pub format: String,
}

/// One entry of a facade-level ranking
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    /// External id of the ranked object
    pub id: String,
    /// Similarity score; higher is more similar
    pub score: f64,
}

/// The outcome of a search, raw or rendered
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutput {
    /// The ranked list itself
    Raw(Vec<RankedEntry>),
    /// A formatted rendering of the ranked list
    Rendered(String),
}

/// Facade over named ontologies, annotation sets and the compiled-set cache
pub struct SearchEngine {
    ontologies: HashMap<String, Arc<Ontology>>,
    annotation_sets: HashMap<String, Arc<AnnotationSet>>,
    cache: CompiledCache,
    labeler: Box<dyn Labeler>,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self {
            ontologies: HashMap::new(),
            annotation_sets: HashMap::new(),
            cache: CompiledCache::new(),
            labeler: Box::new(IdentityLabeler),
        }
    }
}

impl SearchEngine {
    /// Constructs an engine with no registered data and the identity
    /// labeller
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the labeller used by the formatters
    pub fn with_labeler(mut self, labeler: Box<dyn Labeler>) -> Self {
        self.labeler = labeler;
        self
    }

    /// Registers an ontology under a logical name
    pub fn register_ontology(&mut self, name: &str, ontology: Arc<Ontology>) {
        self.ontologies.insert(name.to_string(), ontology);
    }

    /// Returns a registered ontology, or `None`
    pub fn ontology(&self, name: &str) -> Option<&Arc<Ontology>> {
        self.ontologies.get(name)
    }

    /// Registers an annotation set under a logical name
    ///
    /// The set's governing ontology is registered implicitly through the
    /// set itself.
    pub fn register_annotation_set(&mut self, name: &str, set: AnnotationSet) {
        self.annotation_sets.insert(name.to_string(), Arc::new(set));
    }

    /// Returns a registered annotation set, or `None`
    pub fn annotation_set(&self, name: &str) -> Option<&Arc<AnnotationSet>> {
        self.annotation_sets.get(name)
    }

    /// Runs a search with a fresh (never cancelled) token
    pub fn search(&self, request: &SearchRequest) -> OntosimResult<SearchOutput> {
        self.search_cancellable(request, &CancelToken::new())
    }

    /// Runs a search that can be aborted through the given token
    pub fn search_cancellable(
        &self,
        request: &SearchRequest,
        cancel: &CancelToken,
    ) -> OntosimResult<SearchOutput> {
        if request.length < 0 {
            return Err(OntosimError::InvalidLength(request.length));
        }
        let length = request.length as usize;
        let method = Method::from_str(&request.method)?;
        let kind = QueryKind::from_str(&request.query_kind)?;

        let set = self
            .annotation_sets
            .get(&request.ann_set)
            .ok_or_else(|| OntosimError::InvalidAnnSet(request.ann_set.clone()))?;
        let ontology = Arc::clone(set.ontology());

        if ontology.namespace(&request.namespace).is_none() {
            return Err(OntosimError::InvalidNamespace(request.namespace.clone()));
        }

        let query = match kind {
            QueryKind::Object => QueryInput::Object(request.query_input.clone()),
            QueryKind::List => QueryInput::Terms(parse_term_list(
                &request.query_input,
                &ontology,
            )?),
        };

        let excluded = CodeSet::parse(&request.excluded_codes);
        let compiled = self
            .cache
            .get_compiled(set, &excluded, &ontology, cancel)?;

        debug!(
            ann_set = %request.ann_set,
            method = %request.method,
            namespace = %request.namespace,
            "running similarity search"
        );

        let ranking = match method {
            Method::ResnikBma => {
                compiled.resnik_bma(&query, &request.namespace, length, cancel)?
            }
            Method::JaccardExt => {
                compiled.jaccard_ext(&query, &request.namespace, length, cancel)?
            }
            Method::GicExt => compiled.gic_ext(&query, &request.namespace, length, cancel)?,
        };

        let entries: Vec<RankedEntry> = ranking
            .iter()
            .map(|m| RankedEntry {
                id: compiled.object_id(m.object).to_string(),
                score: m.score,
            })
            .collect();

        Ok(match OutputFormat::parse(&request.format) {
            OutputFormat::Raw => SearchOutput::Raw(entries),
            OutputFormat::Plaintext => SearchOutput::Rendered(format::plaintext(
                &entries,
                request,
                self.labeler.as_ref(),
            )),
            OutputFormat::Json => SearchOutput::Rendered(format::to_json(
                &entries,
                request,
                self.labeler.as_ref(),
            )),
            OutputFormat::Html => SearchOutput::Rendered(format::to_html(
                &entries,
                request,
                self.labeler.as_ref(),
            )),
        })
    }
}

/// Splits a comma- or space-separated term-id list and resolves every id
///
/// An unknown id is a user input mistake and fails the whole query.
fn parse_term_list(input: &str, ontology: &Ontology) -> OntosimResult<Vec<TermIdx>> {
    let mut terms = Vec::new();
    for id in input.split([',', ' ']).filter(|id| !id.is_empty()) {
        let idx = ontology
            .term_idx(id)
            .ok_or_else(|| OntosimError::InvalidQueryTerm(id.to_string()))?;
        terms.push(idx);
    }
    Ok(terms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiled::testutil::{seed_annotations, seed_ontology};

    fn engine() -> SearchEngine {
        let ontology = seed_ontology();
        let set = seed_annotations(Arc::clone(&ontology));
        let mut engine = SearchEngine::new();
        engine.register_ontology("seed", ontology);
        engine.register_annotation_set("geneGO", set);
        engine
    }

    fn request() -> SearchRequest {
        SearchRequest {
            ann_set: "geneGO".into(),
            excluded_codes: String::new(),
            query_kind: "object".into(),
            query_input: "o1".into(),
            namespace: "N".into(),
            method: "jaccardExt".into(),
            length: 10,
            format: "raw".into(),
        }
    }

    fn raw(output: SearchOutput) -> Vec<RankedEntry> {
        match output {
            SearchOutput::Raw(entries) => entries,
            SearchOutput::Rendered(text) => panic!("expected raw output, got: {text}"),
        }
    }

    fn rendered(output: SearchOutput) -> String {
        match output {
            SearchOutput::Rendered(text) => text,
            SearchOutput::Raw(_) => panic!("expected rendered output"),
        }
    }

    #[test]
    fn object_query_end_to_end() {
        let engine = engine();
        let entries = raw(engine.search(&request()).unwrap());
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["o1", "o3", "o2"]);
        assert!((entries[0].score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn list_query_end_to_end() {
        let engine = engine();
        let mut req = request();
        req.query_kind = "list".into();
        req.query_input = "N:B, N:C".into();
        req.method = "gicExt".into();
        let entries = raw(engine.search(&req).unwrap());
        assert_eq!(entries[0].id, "o3");
        assert!((entries[0].score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn excluded_codes_change_the_ranking() {
        let engine = engine();
        let mut req = request();
        req.excluded_codes = "ISS".into();
        let entries = raw(engine.search(&req).unwrap());
        // o2 lost its only annotation and is no longer a candidate
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.id != "o2"));
    }

    #[test]
    fn unknown_object_probes_harmlessly() {
        let engine = engine();
        let mut req = request();
        req.query_input = "ghost".into();
        let entries = raw(engine.search(&req).unwrap());
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.score == 0.0));
    }

    #[test]
    fn validation_error_kinds() {
        let engine = engine();

        let mut req = request();
        req.ann_set = "nope".into();
        assert!(matches!(
            engine.search(&req),
            Err(OntosimError::InvalidAnnSet(_))
        ));

        let mut req = request();
        req.method = "resnik".into();
        assert!(matches!(
            engine.search(&req),
            Err(OntosimError::InvalidMethod(_))
        ));

        let mut req = request();
        req.query_kind = "thing".into();
        assert!(matches!(
            engine.search(&req),
            Err(OntosimError::InvalidQueryKind(_))
        ));

        let mut req = request();
        req.length = -1;
        assert!(matches!(
            engine.search(&req),
            Err(OntosimError::InvalidLength(-1))
        ));

        let mut req = request();
        req.namespace = "unknown".into();
        assert!(matches!(
            engine.search(&req),
            Err(OntosimError::InvalidNamespace(_))
        ));

        let mut req = request();
        req.query_kind = "list".into();
        req.query_input = "N:B,N:ghost".into();
        assert!(matches!(
            engine.search(&req),
            Err(OntosimError::InvalidQueryTerm(id)) if id == "N:ghost"
        ));
    }

    #[test]
    fn plaintext_output_is_deterministic() {
        let engine = engine();
        let mut req = request();
        req.format = "plaintext".into();
        let first = rendered(engine.search(&req).unwrap());
        let second = rendered(engine.search(&req).unwrap());
        assert_eq!(first, second);

        let mut lines = first.lines();
        assert_eq!(lines.next(), Some("N:Top10jaccardExtresults for o1"));
        assert_eq!(lines.next(), Some("o1\t\t1"));
        // last line lists the result ids separated by single spaces
        assert_eq!(first.lines().last(), Some("o1 o3 o2"));
    }

    #[test]
    fn json_output_carries_params_and_results() {
        let engine = engine();
        let mut req = request();
        req.format = "json".into();
        let text = rendered(engine.search(&req).unwrap());
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["params"]["annSet"], "geneGO");
        assert_eq!(value["params"]["length"], 10);
        let results = value["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0][0], "o1");
        assert_eq!(results[0][1], 1.0);
    }

    #[test]
    fn html_output_is_a_two_column_table() {
        let engine = engine();
        let mut req = request();
        req.format = "html".into();
        req.length = 1;
        let text = rendered(engine.search(&req).unwrap());
        assert!(text.starts_with("<table"));
        assert!(text.contains("<th>Result</th><th>Score</th>"));
        assert!(text.contains("<tr><td>o1</td><td>1</td></tr>"));
        assert!(text.ends_with("</tbody></table>"));
    }

    #[test]
    fn zero_length_still_formats() {
        let engine = engine();
        let mut req = request();
        req.length = 0;
        req.format = "plaintext".into();
        let text = rendered(engine.search(&req).unwrap());
        assert_eq!(text, "N:Top0jaccardExtresults for o1\n");
    }

    #[test]
    fn unknown_format_falls_back_to_raw() {
        let engine = engine();
        let mut req = request();
        req.format = "yaml".into();
        assert!(matches!(
            engine.search(&req).unwrap(),
            SearchOutput::Raw(_)
        ));
    }

    #[test]
    fn genotype_namespace_selects_the_genotype_label_kind() {
        struct KindEcho;
        impl Labeler for KindEcho {
            fn label(&self, kind: LabelKind, id: &str) -> String {
                match kind {
                    LabelKind::Gene => format!("gene:{id}"),
                    LabelKind::Genotype => format!("genotype:{id}"),
                }
            }
        }

        let mut builder = crate::OntologyBuilder::new();
        builder.add_term("MP:1", "root", "MPheno.ontology").unwrap();
        let ontology = Arc::new(builder.finalize().unwrap());
        let mut annotations = crate::AnnotationSetBuilder::new(Arc::clone(&ontology));
        annotations.add("gt1", "MP:1", "IDA", None, Vec::new()).unwrap();

        let mut engine = SearchEngine::new().with_labeler(Box::new(KindEcho));
        engine.register_annotation_set("genotypeMP", annotations.build());

        let req = SearchRequest {
            ann_set: "genotypeMP".into(),
            excluded_codes: String::new(),
            query_kind: "object".into(),
            query_input: "gt1".into(),
            namespace: "MPheno.ontology".into(),
            method: "jaccardExt".into(),
            length: 5,
            format: "plaintext".into(),
        };
        let text = rendered(engine.search(&req).unwrap());
        assert!(text.contains("genotype:gt1"));
    }

    #[test]
    fn cancelled_searches_report_cancelled() {
        let engine = engine();
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(
            engine.search_cancellable(&request(), &token),
            Err(OntosimError::Cancelled)
        ));
    }
}
