//! Terminal rendering for answers and health reports

use colored::Colorize;
use std::fmt::Write;

use crate::pipeline::HealthReport;
use crate::telemetry::Degradation;
use crate::types::AnswerResponse;

/// Human-readable answer block
pub fn render_answer(response: &AnswerResponse, show_diagnostics: bool) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", response.answer_text.bold());
    let _ = writeln!(
        out,
        "{} {}",
        "search:".dimmed(),
        response.query_echo.search_phrase
    );
    for predicate in &response.query_echo.filters {
        let value = serde_json::to_string(&predicate.value).unwrap_or_default();
        let _ = writeln!(out, "{} {} = {}", "filter:".dimmed(), predicate.field, value);
    }
    let _ = writeln!(out);

    for (rank, candidate) in response.results.iter().enumerate() {
        let price = candidate
            .price
            .map(|p| format!("${:.2}", p))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:>2}. {} {} {}",
            rank + 1,
            candidate.title.cyan(),
            price.green(),
            format!("[{}]", candidate.item_id).dimmed()
        );
    }

    if show_diagnostics && !response.diagnostics.is_empty() {
        let _ = writeln!(out);
        for event in &response.diagnostics {
            let _ = writeln!(out, "{} {}", "note:".yellow(), describe(event));
        }
    }
    out
}

fn describe(event: &Degradation) -> String {
    match event {
        Degradation::ParseDegraded { reason } => format!("query parsing fell back to raw text ({})", reason),
        Degradation::FilterRejected { field, reason } => format!("dropped {} filter ({})", field, reason),
        Degradation::Widened { dropped, attempts } => {
            let fields: Vec<String> = dropped.iter().map(ToString::to_string).collect();
            format!("relaxed filters [{}] after {} searches", fields.join(", "), attempts)
        }
        Degradation::RerankDegraded { reason } => format!("reranking skipped ({})", reason),
        Degradation::GenerationDegraded { reason } => format!("template answer used ({})", reason),
    }
}

pub fn render_health(report: &HealthReport) -> String {
    let mut out = String::new();
    let store = match (report.items, &report.store_error) {
        (Some(items), _) => format!("{} ({} items)", "ok".green(), items),
        (None, Some(error)) => format!("{} ({})", "unreachable".red(), error),
        (None, None) => "unreachable".red().to_string(),
    };
    let llm = if report.llm_reachable {
        "ok".green()
    } else {
        "unreachable".red()
    };
    let _ = writeln!(out, "vector store [{}]: {}", report.store, store);
    let _ = writeln!(out, "llm [{}]: {}", report.llm, llm);
    out
}
