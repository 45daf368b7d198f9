//! Terminal output for search runs and history

use sourcefinder_common::db::models::SourceRecord;
use sourcefinder_common::pipeline::{ContentKind, LinkCheck, PipelineState, ProbeOutcome};
use sourcefinder_common::{SearchAggregate, SearchRun};
use std::fmt::Write;

pub fn render_run(run: &SearchRun) -> String {
    let mut out = String::new();
    let sources = &run.aggregate.sources;

    if run.state == PipelineState::FailedEmpty {
        out.push_str("Não foi possível realizar a pesquisa. Tente novamente em instantes.\n");
        return out;
    }
    if sources.is_empty() {
        out.push_str("Nenhuma fonte encontrada para este tema.\n");
        return out;
    }

    let _ = writeln!(out, "{} fonte(s) encontrada(s) para '{}':\n", sources.len(), run.aggregate.search.topic);
    for (position, source) in sources.iter().enumerate() {
        let check = run.link_checks.iter().find(|c| c.source_id == source.id);
        render_source(&mut out, position + 1, source, check);
    }
    out
}

fn render_source(out: &mut String, position: usize, source: &SourceRecord, check: Option<&LinkCheck>) {
    let _ = writeln!(out, "{}. {}", position, source.title);

    let optional = [
        ("Autores", source.authors.as_deref()),
        ("Instituição", source.institution.as_deref()),
        ("Tipo", source.access_type.as_deref()),
        ("Descrição", source.description.as_deref()),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            let _ = writeln!(out, "   {}: {}", label, value);
        }
    }
    if let Some(year) = source.publication_year {
        let _ = writeln!(out, "   Ano: {}", year);
    }
    let _ = writeln!(out, "   Link: {}", source.link);
    if let Some(check) = check {
        let _ = writeln!(out, "   Verificação: {}", describe_probe(&check.outcome));
    }
    out.push('\n');
}

fn describe_probe(outcome: &ProbeOutcome) -> String {
    let meta = &outcome.metadata;
    if outcome.reachable {
        let status = meta.status_code.map(|s| s.to_string()).unwrap_or_default();
        match meta.kind {
            Some(ContentKind::Pdf) => format!("acessível ({}, PDF)", status),
            _ => format!("acessível ({})", status),
        }
    } else if let Some(error) = meta.error {
        format!("inacessível ({})", error.as_str())
    } else {
        format!(
            "inacessível (HTTP {})",
            meta.status_code.map(|s| s.to_string()).unwrap_or_else(|| "?".to_string())
        )
    }
}

/// Session history, newest first
pub fn render_history(history: &[SearchAggregate]) -> String {
    if history.is_empty() {
        return "Nenhuma pesquisa nesta sessão.\n".to_string();
    }

    let mut out = String::new();
    for entry in history {
        let _ = writeln!(
            out,
            "[{}] {} - {} ({} fonte(s))",
            entry.search.id,
            entry.search.created_at.format("%d/%m/%Y %H:%M"),
            entry.search.topic,
            entry.sources.len()
        );
    }
    out
}
