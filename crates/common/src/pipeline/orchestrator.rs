//! Search pipeline orchestrator
//!
//! Drives one topic through the linear state machine
//! `Created -> Searching -> (FailedEmpty | Extracting -> Persisting -> Done)`.
//! Stage failures degrade to fewer (or zero) sources; only a failure to store
//! the search request itself is returned to the caller.

use super::delegate::SearchDelegate;
use super::error::StageError;
use super::extractor::SourceExtractor;
use super::probe::{ProbeOutcome, UrlProbe};
use super::validate_topic;
use crate::config::{AppConfig, ProbeMode};
use crate::db::{SearchAggregate, SearchStore};
use crate::errors::Result;
use crate::llm::LlmClient;
use crate::metrics;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Pipeline states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Created,
    Searching,
    Extracting,
    Persisting,
    Done,
    FailedEmpty,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Created => "created",
            PipelineState::Searching => "searching",
            PipelineState::Extracting => "extracting",
            PipelineState::Persisting => "persisting",
            PipelineState::Done => "done",
            PipelineState::FailedEmpty => "failed_empty",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::FailedEmpty)
    }
}

/// URL probing applied to each source before it is stored
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbePolicy {
    pub mode: ProbeMode,
    pub timeout: Duration,
    pub want_pdf_check: bool,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            mode: ProbeMode::Off,
            timeout: Duration::from_secs(3),
            want_pdf_check: false,
        }
    }
}

/// Probe result for one stored source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkCheck {
    pub source_id: i64,
    pub link: String,
    pub outcome: ProbeOutcome,
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRun {
    pub aggregate: SearchAggregate,
    /// Terminal state: `Done` or `FailedEmpty`
    pub state: PipelineState,
    /// Sources produced by extraction, before persistence
    pub extracted: usize,
    /// Sources whose insert failed
    pub persistence_failures: usize,
    /// Filled only when probing is enabled
    pub link_checks: Vec<LinkCheck>,
}

pub struct SearchPipeline {
    delegate: SearchDelegate,
    extractor: SourceExtractor,
    store: Arc<dyn SearchStore>,
    probe: Option<UrlProbe>,
    probe_policy: ProbePolicy,
}

impl SearchPipeline {
    pub fn new(llm: Arc<dyn LlmClient>, store: Arc<dyn SearchStore>) -> Self {
        Self {
            delegate: SearchDelegate::new(llm.clone()),
            extractor: SourceExtractor::new(llm),
            store,
            probe: None,
            probe_policy: ProbePolicy::default(),
        }
    }

    /// Build a pipeline with the probe and debug-dump settings from `config`
    pub fn from_config(
        config: &AppConfig,
        llm: Arc<dyn LlmClient>,
        store: Arc<dyn SearchStore>,
    ) -> Result<Self> {
        let policy = ProbePolicy {
            mode: config.probe.mode,
            timeout: config.probe.timeout(),
            want_pdf_check: config.probe.want_pdf_check,
        };

        Ok(Self::new(llm, store)
            .with_debug_dump(config.pipeline.debug_dump_dir.clone())
            .with_probe(policy)?)
    }

    pub fn with_debug_dump(mut self, dir: Option<PathBuf>) -> Self {
        self.delegate = self.delegate.with_debug_dump(dir.clone());
        self.extractor = self.extractor.with_debug_dump(dir);
        self
    }

    pub fn with_probe(mut self, policy: ProbePolicy) -> Result<Self> {
        self.probe = match policy.mode {
            ProbeMode::Off => None,
            ProbeMode::Annotate => Some(UrlProbe::new()?),
        };
        self.probe_policy = policy;
        Ok(self)
    }

    pub fn store(&self) -> &Arc<dyn SearchStore> {
        &self.store
    }

    /// Run the whole pipeline for `topic`
    ///
    /// The topic is trimmed and validated before anything is stored. Errors are
    /// returned only when validation fails or the search request cannot be
    /// stored; every later failure yields a run with fewer sources.
    pub async fn run_search(&self, topic: &str) -> Result<SearchRun> {
        let topic = validate_topic(topic)?;
        let start = Instant::now();

        let search = self.store.create_search(topic).await?;
        let span = info_span!("search_run", search_id = search.id, topic = %topic);

        let run = self.drive(search).instrument(span).await;

        metrics::record_search_run(
            run.state.as_str(),
            start.elapsed().as_secs_f64(),
            run.aggregate.sources.len(),
        );
        info!(
            search_id = run.aggregate.search.id,
            state = run.state.as_str(),
            extracted = run.extracted,
            persisted = run.aggregate.sources.len(),
            failed = run.persistence_failures,
            latency_ms = start.elapsed().as_millis() as u64,
            "Search run finished"
        );

        Ok(run)
    }

    async fn drive(&self, search: crate::db::models::SearchRequest) -> SearchRun {
        let mut state = PipelineState::Created;
        let topic = search.topic.clone();

        advance(&mut state, PipelineState::Searching);
        let raw = match self.delegate.delegate_search(&topic).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "{}", SearchDelegate::failure_text(&topic, &e));
                advance(&mut state, PipelineState::FailedEmpty);
                return SearchRun {
                    aggregate: SearchAggregate { search, sources: Vec::new() },
                    state,
                    extracted: 0,
                    persistence_failures: 0,
                    link_checks: Vec::new(),
                };
            }
        };

        advance(&mut state, PipelineState::Extracting);
        let extracted = self.extractor.extract_sources(&raw.text, &topic).await;

        advance(&mut state, PipelineState::Persisting);
        let mut sources = Vec::with_capacity(extracted.len());
        let mut link_checks = Vec::new();
        let mut persistence_failures = 0;

        for source in &extracted {
            let outcome = match &self.probe {
                Some(probe) => Some(
                    probe
                        .probe(&source.link, self.probe_policy.timeout, self.probe_policy.want_pdf_check)
                        .await,
                ),
                None => None,
            };

            match self.store.insert_source(search.id, source).await {
                Ok(record) => {
                    if let Some(outcome) = outcome {
                        debug!(link = %record.link, reachable = outcome.reachable, "Source probed");
                        link_checks.push(LinkCheck {
                            source_id: record.id,
                            link: record.link.clone(),
                            outcome,
                        });
                    }
                    sources.push(record);
                }
                Err(e) => {
                    let err = StageError::PersistenceFailure { message: e.to_string() };
                    error!(link = %source.link, error = %err, "Skipping source");
                    metrics::record_sources_dropped("persistence_failure", 1);
                    persistence_failures += 1;
                }
            }
        }

        advance(&mut state, PipelineState::Done);
        SearchRun {
            aggregate: SearchAggregate { search, sources },
            state,
            extracted: extracted.len(),
            persistence_failures,
            link_checks,
        }
    }
}

fn advance(state: &mut PipelineState, next: PipelineState) {
    debug!(from = state.as_str(), to = next.as_str(), "Pipeline transition");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::errors::AppError;
    use crate::llm::{MockLlmClient, MockReply};
    use serde_json::{json, Value};

    fn happy_script(fontes: Value) -> Vec<MockReply> {
        vec![
            MockReply::ToolCall(json!({ "search_term": "termo refinado" })),
            MockReply::Content("resultados em texto livre".to_string()),
            MockReply::Content(json!({ "fontes": fontes }).to_string()),
        ]
    }

    fn pipeline(script: Vec<MockReply>) -> (SearchPipeline, Arc<MockLlmClient>, Arc<MemoryStore>) {
        let llm = Arc::new(MockLlmClient::scripted(script));
        let store = Arc::new(MemoryStore::new());
        (SearchPipeline::new(llm.clone(), store.clone()), llm, store)
    }

    #[tokio::test]
    async fn test_happy_path_persists_in_order() {
        let (pipeline, llm, store) = pipeline(happy_script(json!([
            { "titulo": "Primeira", "link": "https://um.example", "ano_publicacao": "2021" },
            { "titulo": "Falsa", "link": "example.org/fake" },
            { "titulo": "Segunda", "link": "http://dois.example" }
        ])));

        let run = pipeline.run_search("  energia solar  ").await.unwrap();

        assert_eq!(run.state, PipelineState::Done);
        assert_eq!(run.aggregate.search.topic, "energia solar");
        assert_eq!(run.extracted, 2);
        let titles: Vec<_> = run.aggregate.sources.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Primeira", "Segunda"]);
        assert_eq!(run.aggregate.sources[0].publication_year, Some(2021));
        assert_eq!(run.aggregate.sources[1].access_type.as_deref(), Some("Informação online"));
        assert_eq!(llm.call_count(), 3);

        let stored = store.find_search(run.aggregate.search.id).await.unwrap().unwrap();
        assert_eq!(stored, run.aggregate);
    }

    #[tokio::test]
    async fn test_search_failure_keeps_request_without_sources() {
        let (pipeline, llm, store) =
            pipeline(vec![MockReply::NetworkFailure("connection refused".to_string())]);

        let run = pipeline.run_search("astronomia").await.unwrap();

        assert_eq!(run.state, PipelineState::FailedEmpty);
        assert!(run.aggregate.sources.is_empty());
        // Extraction never runs after a failed search
        assert_eq!(llm.call_count(), 1);
        assert_eq!(store.list_searches().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_extraction_is_done_with_no_sources() {
        let (pipeline, _, _) = pipeline(vec![
            MockReply::ToolCall(json!({ "search_term": "x" })),
            MockReply::Content("texto".to_string()),
            MockReply::Content("isto não é JSON".to_string()),
        ]);

        let run = pipeline.run_search("filosofia").await.unwrap();
        assert_eq!(run.state, PipelineState::Done);
        assert!(run.aggregate.sources.is_empty());
    }

    #[tokio::test]
    async fn test_failed_insert_skips_only_that_source() {
        let (pipeline, _, _) = pipeline(happy_script(json!([
            { "titulo": "ok 1", "link": "https://a.example" },
            { "titulo": "x".repeat(600), "link": "https://b.example" },
            { "titulo": "ok 2", "link": "https://c.example" }
        ])));

        let run = pipeline.run_search("história").await.unwrap();

        assert_eq!(run.state, PipelineState::Done);
        assert_eq!(run.extracted, 3);
        assert_eq!(run.persistence_failures, 1);
        let links: Vec<_> = run.aggregate.sources.iter().map(|s| s.link.as_str()).collect();
        assert_eq!(links, vec!["https://a.example", "https://c.example"]);
    }

    #[tokio::test]
    async fn test_short_topic_never_runs() {
        let (pipeline, llm, store) = pipeline(Vec::new());

        let err = pipeline.run_search("  ab ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(llm.call_count(), 0);
        assert!(store.list_searches().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_topic_twice_creates_two_requests() {
        let mut script = happy_script(json!([{ "link": "https://a.example" }]));
        script.extend(happy_script(json!([{ "link": "https://b.example" }])));
        let (pipeline, _, store) = pipeline(script);

        let first = pipeline.run_search("química").await.unwrap();
        let second = pipeline.run_search("química").await.unwrap();

        assert_ne!(first.aggregate.search.id, second.aggregate.search.id);
        assert_eq!(store.list_searches().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_annotate_probe_never_blocks_persistence() {
        let (pipeline, _, _) = pipeline(happy_script(json!([
            { "titulo": "inalcançável", "link": "http://127.0.0.1:1/nada" }
        ])));
        let pipeline = pipeline
            .with_probe(ProbePolicy {
                mode: ProbeMode::Annotate,
                timeout: Duration::from_millis(500),
                want_pdf_check: false,
            })
            .unwrap();

        let run = pipeline.run_search("redes").await.unwrap();

        assert_eq!(run.aggregate.sources.len(), 1);
        assert_eq!(run.link_checks.len(), 1);
        assert!(!run.link_checks[0].outcome.reachable);
        assert_eq!(run.link_checks[0].source_id, run.aggregate.sources[0].id);
    }

    #[test]
    fn test_terminal_states() {
        assert!(PipelineState::Done.is_terminal());
        assert!(PipelineState::FailedEmpty.is_terminal());
        assert!(!PipelineState::Persisting.is_terminal());
    }
}
