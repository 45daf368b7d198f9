//! Extraction stage
//!
//! Turns the free-text search results into validated source records with one
//! JSON-mode call. Parsing is a pure function so every coercion rule can be
//! tested without the service.

use super::delegate::is_search_failure;
use super::error::{Stage, StageError, StageResult};
use super::prompts;
use super::schema::{keys, ExtractionSchema, FieldKind, FieldSpec, EXTRACTION_SCHEMA};
use super::write_debug_dump;
use crate::llm::{CompletionRequest, LlmClient};
use crate::metrics;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Maximum number of sources kept per search
pub const MAX_SOURCES: usize = EXTRACTION_SCHEMA.max_items;

/// A validated source, not yet persisted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedSource {
    pub title: String,
    pub authors: Option<String>,
    pub institution: Option<String>,
    pub publication_year: Option<i32>,
    /// Always starts with `http://` or `https://`
    pub link: String,
    pub access_type: Option<String>,
    pub description: Option<String>,
}

/// Result of parsing one extraction response
#[derive(Debug, Default)]
pub struct ParsedSources {
    pub sources: Vec<ExtractedSource>,
    /// Items rejected for a missing or unusable required field
    pub rejected: Vec<StageError>,
    /// Valid items beyond `MAX_SOURCES`
    pub truncated: usize,
}

pub struct SourceExtractor {
    llm: Arc<dyn LlmClient>,
    dump_dir: Option<PathBuf>,
}

impl SourceExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm, dump_dir: None }
    }

    /// Write the raw JSON content to `<dir>/processed_sources.json`
    pub fn with_debug_dump(mut self, dir: Option<PathBuf>) -> Self {
        self.dump_dir = dir;
        self
    }

    /// Extract sources from `raw_text`. Failures degrade to an empty list.
    pub async fn extract_sources(&self, raw_text: &str, topic: &str) -> Vec<ExtractedSource> {
        if raw_text.trim().is_empty() || is_search_failure(raw_text) {
            debug!(topic, "No usable search results, skipping extraction");
            return Vec::new();
        }

        let start = Instant::now();
        let parsed = match self.request(raw_text, topic).await {
            Ok(content) => parse_sources(&content),
            Err(e) => Err(e),
        };

        match parsed {
            Ok(parsed) => {
                for err in &parsed.rejected {
                    warn!(topic, error = %err, "Dropping extracted item");
                }
                metrics::record_sources_dropped("invalid_link", parsed.rejected.len());
                metrics::record_sources_dropped("over_limit", parsed.truncated);

                info!(
                    topic,
                    schema_version = EXTRACTION_SCHEMA.version,
                    kept = parsed.sources.len(),
                    dropped = parsed.rejected.len(),
                    truncated = parsed.truncated,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Extraction stage complete"
                );
                parsed.sources
            }
            Err(e) => {
                warn!(
                    topic,
                    schema_version = EXTRACTION_SCHEMA.version,
                    error = %e,
                    kind = e.kind(),
                    "Extraction failed, continuing with no sources"
                );
                if matches!(e, StageError::MalformedExtraction { .. }) {
                    metrics::record_sources_dropped("malformed_response", 1);
                }
                Vec::new()
            }
        }
    }

    async fn request(&self, raw_text: &str, topic: &str) -> StageResult<String> {
        let content = self
            .llm
            .complete_json(CompletionRequest::new(
                prompts::extraction_system_prompt(&EXTRACTION_SCHEMA),
                prompts::extraction_user_prompt(topic, raw_text),
            ))
            .await
            .map_err(|e| StageError::upstream(Stage::Extraction, e))?;

        write_debug_dump(self.dump_dir.as_deref(), "processed_sources.json", &content).await;
        Ok(content)
    }
}

/// Parse an extraction response against `EXTRACTION_SCHEMA`
pub fn parse_sources(content: &str) -> StageResult<ParsedSources> {
    parse_with_schema(content, &EXTRACTION_SCHEMA)
}

fn parse_with_schema(content: &str, schema: &ExtractionSchema) -> StageResult<ParsedSources> {
    let value: Value = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| StageError::malformed(format!("invalid JSON: {}", e)))?;

    let root = value
        .as_object()
        .ok_or_else(|| StageError::malformed("top-level value is not an object"))?;

    let items = match root.get(schema.root) {
        None | Some(Value::Null) => return Ok(ParsedSources::default()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(StageError::malformed(format!("`{}` is not an array", schema.root)))
        }
    };

    let mut parsed = ParsedSources::default();
    for (index, item) in items.iter().enumerate() {
        if parsed.sources.len() == schema.max_items {
            parsed.truncated += 1;
            continue;
        }

        let position = parsed.sources.len() + 1;
        match validate_item(index, item, position, schema) {
            Ok(source) => parsed.sources.push(source),
            Err(e) => parsed.rejected.push(e),
        }
    }

    Ok(parsed)
}

fn validate_item(
    index: usize,
    item: &Value,
    position: usize,
    schema: &ExtractionSchema,
) -> StageResult<ExtractedSource> {
    let invalid = |reason: &str| StageError::InvalidSource {
        index,
        reason: reason.to_string(),
    };

    let fields = item.as_object().ok_or_else(|| invalid("item is not an object"))?;

    for spec in schema.fields.iter().filter(|f| f.required) {
        check_required(fields, spec).map_err(|reason| invalid(&reason))?;
    }

    let link = fields
        .get(keys::LINK)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|link| is_valid_link(link))
        .ok_or_else(|| invalid("link does not start with http:// or https://"))?;

    let text = |key: &str| coerce_text(fields.get(key));

    Ok(ExtractedSource {
        title: text(keys::TITLE).unwrap_or_else(|| schema.placeholder_title(position)),
        authors: text(keys::AUTHORS),
        institution: text(keys::INSTITUTION),
        publication_year: fields.get(keys::YEAR).and_then(coerce_year),
        link: link.to_string(),
        access_type: match fields.get(keys::ACCESS_TYPE) {
            None | Some(Value::Null) => schema.default_for(keys::ACCESS_TYPE).map(str::to_string),
            other => coerce_text(other),
        },
        description: text(keys::DESCRIPTION),
    })
}

/// A required field must be present and usable as its kind
fn check_required(fields: &Map<String, Value>, spec: &FieldSpec) -> Result<(), String> {
    let value = match fields.get(spec.key) {
        None | Some(Value::Null) => return Err(format!("{} is missing", spec.key)),
        Some(value) => value,
    };

    match spec.kind {
        FieldKind::Url => match value.as_str().map(str::trim) {
            Some(url) if is_valid_link(url) => Ok(()),
            Some(_) => Err(format!("{} does not start with http:// or https://", spec.key)),
            None => Err(format!("{} is not a string", spec.key)),
        },
        FieldKind::Text if coerce_text(Some(value)).is_none() => Err(format!("{} is empty", spec.key)),
        FieldKind::Year if coerce_year(value).is_none() => Err(format!("{} is not a year", spec.key)),
        FieldKind::Text | FieldKind::Year => Ok(()),
    }
}

/// Links must be absolute http(s) URLs
pub fn is_valid_link(link: &str) -> bool {
    link.starts_with("http://") || link.starts_with("https://")
}

/// Best-effort year coercion; anything unusable becomes `None`
pub fn coerce_year(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).ok()
            } else {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= i32::MIN as f64 && *f <= i32::MAX as f64)
                    .map(|f| f as i32)
            }
        }
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    }
}

fn coerce_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => {
            let parts: Option<Vec<&str>> = items
                .iter()
                .map(|v| v.as_str().map(str::trim))
                .collect();
            parts?
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        }
        _ => return None,
    };

    (!text.is_empty()).then_some(text)
}

/// Remove a surrounding Markdown code fence, if any
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(inner) = inner.strip_suffix("```") else {
        return trimmed;
    };

    // Drop an info string such as `json` on the opening line
    match inner.find('\n') {
        Some(newline) if !inner[..newline].trim().contains(['{', '[']) => inner[newline + 1..].trim(),
        _ => inner.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLlmClient, MockReply, RequestShape};
    use serde_json::json;

    fn parse(value: Value) -> ParsedSources {
        parse_sources(&value.to_string()).unwrap()
    }

    #[test]
    fn test_full_item() {
        let parsed = parse(json!({
            "fontes": [{
                "titulo": " Ownership in Rust ",
                "autores": ["Ana", "Bruno"],
                "instituicao": "Rust Foundation",
                "ano_publicacao": 2021,
                "link": " https://doc.rust-lang.org/book/ ",
                "tipo_acesso": "Documentação",
                "descricao": "Capítulo 4"
            }]
        }));

        assert_eq!(
            parsed.sources,
            vec![ExtractedSource {
                title: "Ownership in Rust".to_string(),
                authors: Some("Ana, Bruno".to_string()),
                institution: Some("Rust Foundation".to_string()),
                publication_year: Some(2021),
                link: "https://doc.rust-lang.org/book/".to_string(),
                access_type: Some("Documentação".to_string()),
                description: Some("Capítulo 4".to_string()),
            }]
        );
    }

    #[test]
    fn test_invalid_links_are_dropped_individually() {
        let parsed = parse(json!({
            "fontes": [
                { "titulo": "a", "link": "example.org/fake" },
                { "titulo": "b", "link": "https://ok.example" },
                { "titulo": "c" },
                { "titulo": "d", "link": 42 },
                "not an object",
                { "titulo": "e", "link": "ftp://files.example" }
            ]
        }));

        assert_eq!(parsed.sources.len(), 1);
        assert_eq!(parsed.sources[0].title, "b");
        let indexes: Vec<usize> = parsed
            .rejected
            .iter()
            .map(|e| match e {
                StageError::InvalidSource { index, .. } => *index,
                other => panic!("unexpected error {:?}", other),
            })
            .collect();
        assert_eq!(indexes, vec![0, 2, 3, 4, 5]);
    }

    #[test]
    fn test_required_fields_follow_schema() {
        const STRICT: ExtractionSchema = ExtractionSchema {
            fields: &[
                FieldSpec { key: keys::TITLE, kind: FieldKind::Text, required: true, default: None, hint: "" },
                FieldSpec { key: keys::YEAR, kind: FieldKind::Year, required: true, default: None, hint: "" },
                FieldSpec { key: keys::LINK, kind: FieldKind::Url, required: true, default: None, hint: "" },
            ],
            ..EXTRACTION_SCHEMA
        };
        let content = json!({
            "fontes": [
                { "titulo": "ok", "ano_publicacao": "2020", "link": "https://a.example" },
                { "titulo": "  ", "ano_publicacao": 2020, "link": "https://b.example" },
                { "titulo": "sem ano", "ano_publicacao": "circa 2020", "link": "https://c.example" },
                { "titulo": "sem link", "ano_publicacao": 2020, "link": null }
            ]
        })
        .to_string();

        let parsed = parse_with_schema(&content, &STRICT).unwrap();
        assert_eq!(parsed.sources.len(), 1);
        assert_eq!(parsed.sources[0].title, "ok");

        let reasons: Vec<String> = parsed.rejected.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            reasons,
            vec![
                "source #1 rejected: titulo is empty",
                "source #2 rejected: ano_publicacao is not a year",
                "source #3 rejected: link is missing",
            ]
        );

        // The default schema only requires the link
        let parsed = parse_sources(&content).unwrap();
        assert_eq!(parsed.sources.len(), 3);
        assert_eq!(parsed.sources[1].title, "Fonte 2");
    }

    #[test]
    fn test_year_coercion() {
        assert_eq!(coerce_year(&json!(2021)), Some(2021));
        assert_eq!(coerce_year(&json!("2021")), Some(2021));
        assert_eq!(coerce_year(&json!(" 1999 ")), Some(1999));
        assert_eq!(coerce_year(&json!(2020.0)), Some(2020));
        assert_eq!(coerce_year(&json!(2020.5)), None);
        assert_eq!(coerce_year(&json!("circa 2020")), None);
        assert_eq!(coerce_year(&json!(null)), None);
        assert_eq!(coerce_year(&json!(10_000_000_000i64)), None);
    }

    #[test]
    fn test_defaults_and_placeholders() {
        let parsed = parse(json!({
            "fontes": [
                { "link": "https://bad" , "titulo": "kept" },
                { "link": "nope" },
                { "link": "https://second.example", "titulo": "   ", "tipo_acesso": null },
                { "link": "https://third.example", "tipo_acesso": "" }
            ]
        }));

        assert_eq!(parsed.sources.len(), 3);
        assert_eq!(parsed.sources[0].access_type.as_deref(), Some("Informação online"));
        // Placeholder numbering follows kept positions
        assert_eq!(parsed.sources[1].title, "Fonte 2");
        assert_eq!(parsed.sources[1].access_type.as_deref(), Some("Informação online"));
        assert_eq!(parsed.sources[2].title, "Fonte 3");
        assert_eq!(parsed.sources[2].access_type, None);
    }

    #[test]
    fn test_text_coercion() {
        assert_eq!(coerce_text(Some(&json!(2021))), Some("2021".to_string()));
        assert_eq!(coerce_text(Some(&json!(true))), Some("true".to_string()));
        assert_eq!(coerce_text(Some(&json!(["a", " ", "b"]))), Some("a, b".to_string()));
        assert_eq!(coerce_text(Some(&json!(["a", 1]))), None);
        assert_eq!(coerce_text(Some(&json!({ "nome": "x" }))), None);
        assert_eq!(coerce_text(None), None);
    }

    #[test]
    fn test_truncated_to_max_sources() {
        let items: Vec<Value> = (0..12)
            .map(|i| json!({ "titulo": format!("t{}", i), "link": format!("https://s{}.example", i) }))
            .collect();
        let parsed = parse(json!({ "fontes": items }));

        assert_eq!(parsed.sources.len(), MAX_SOURCES);
        assert_eq!(parsed.truncated, 4);
        assert_eq!(parsed.sources[7].title, "t7");
    }

    #[test]
    fn test_response_shapes() {
        assert!(parse_sources("{}").unwrap().sources.is_empty());
        assert!(parse_sources(r#"{"fontes": null}"#).unwrap().sources.is_empty());
        assert!(matches!(
            parse_sources(r#"{"fontes": "x"}"#),
            Err(StageError::MalformedExtraction { .. })
        ));
        assert!(matches!(parse_sources("[1, 2]"), Err(StageError::MalformedExtraction { .. })));
        assert!(matches!(parse_sources("not json"), Err(StageError::MalformedExtraction { .. })));
        assert!(matches!(
            parse_sources(r#"{"fontes": []} trailing"#),
            Err(StageError::MalformedExtraction { .. })
        ));
    }

    #[test]
    fn test_code_fence_is_stripped() {
        let fenced = "```json\n{\"fontes\": [{\"link\": \"https://a.example\"}]}\n```";
        assert_eq!(parse_sources(fenced).unwrap().sources.len(), 1);

        let bare = "```{\"fontes\": []}```";
        assert!(parse_sources(bare).unwrap().sources.is_empty());
    }

    #[tokio::test]
    async fn test_short_circuit_without_service_call() {
        let mock = Arc::new(MockLlmClient::scripted([]));
        let extractor = SourceExtractor::new(mock.clone());

        assert!(extractor.extract_sources("   ", "tema").await.is_empty());
        assert!(extractor
            .extract_sources("Erro ao realizar pesquisa para: tema. Detalhes: x", "tema")
            .await
            .is_empty());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_extract_uses_json_mode() {
        let mock = Arc::new(MockLlmClient::scripted([MockReply::Content(
            json!({ "fontes": [{ "titulo": "x", "link": "https://x.example", "ano_publicacao": "2019" }] })
                .to_string(),
        )]));
        let extractor = SourceExtractor::new(mock.clone());

        let sources = extractor.extract_sources("resultados brutos", "economia").await;
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].publication_year, Some(2019));

        let calls = mock.calls();
        assert_eq!(calls[0].shape, RequestShape::Json);
        assert!(calls[0].messages[0].content.contains("\"fontes\""));
        assert!(calls[0].messages[1].content.contains("resultados brutos"));
    }

    #[tokio::test]
    async fn test_service_failure_degrades_to_empty() {
        let mock = Arc::new(MockLlmClient::scripted([MockReply::NetworkFailure("down".to_string())]));
        let extractor = SourceExtractor::new(mock);
        assert!(extractor.extract_sources("resultados", "tema").await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_content_degrades_to_empty() {
        let mock = Arc::new(MockLlmClient::scripted([MockReply::Content("desculpe".to_string())]));
        let extractor = SourceExtractor::new(mock);
        assert!(extractor.extract_sources("resultados", "tema").await.is_empty());
    }
}
