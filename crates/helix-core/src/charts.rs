//! Chart extraction from answer text, chart data normalization, and
//! mermaid diagram generation.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use helix_protocol::{ChartKind, ChartSpec, Diagram, DiagramKind, Reasoner};
use log::{debug, warn};
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

/// Fenced block the reasoning backend uses to attach a chart spec.
fn chart_block_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"(?s)```chart\s*\n(.*?)\n```").expect("chart block regex"))
}

/// Extract every well-formed chart spec from fenced ```chart blocks.
///
/// Malformed blocks are skipped rather than failing the analysis.
pub fn extract_charts(text: &str) -> Vec<ChartSpec> {
    let mut charts = Vec::new();
    for captures in chart_block_regex().captures_iter(text) {
        let raw = &captures[1];
        match serde_json::from_str::<ChartSpec>(raw) {
            Ok(spec) => charts.push(spec),
            Err(err) => {
                warn!("skipped malformed chart block ({err})");
            }
        }
    }
    debug!("extracted charts (count={})", charts.len());
    charts
}

/// Normalize arbitrary data into a renderable chart spec for the kind.
///
/// Missing or mis-shaped fields are replaced with placeholders so the
/// caller always gets a drawable chart.
pub fn generate_chart(kind: ChartKind, title: &str, data: &Value) -> ChartSpec {
    let data = match kind {
        ChartKind::Bar | ChartKind::Pie => json!({
            "labels": string_array(data, "labels", &["No Data"]),
            "values": number_array(data, "values", &[0.0]),
        }),
        ChartKind::Line | ChartKind::Scatter => json!({
            "x": number_array(data, "x", &[0.0]),
            "y": number_array(data, "y", &[0.0]),
        }),
        ChartKind::Heatmap => json!({
            "x": string_array(data, "x", &["No Data"]),
            "y": string_array(data, "y", &["No Data"]),
            "z": data.get("z").cloned().unwrap_or_else(|| json!([[0.0]])),
        }),
        ChartKind::Radar => json!({
            "categories": string_array(data, "categories", &["No Data"]),
            "values": number_array(data, "values", &[0.0]),
        }),
    };
    ChartSpec {
        kind,
        title: title.to_string(),
        data,
        insights: None,
    }
}

fn string_array(data: &Value, key: &str, fallback: &[&str]) -> Value {
    match data.get(key) {
        Some(Value::Array(items)) if !items.is_empty() => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Value::String(s.clone()),
                    other => Value::String(other.to_string()),
                })
                .collect(),
        ),
        _ => json!(fallback),
    }
}

fn number_array(data: &Value, key: &str, fallback: &[f64]) -> Value {
    match data.get(key) {
        Some(Value::Array(items)) if !items.is_empty() => Value::Array(
            items
                .iter()
                .map(|item| json!(item.as_f64().unwrap_or(0.0)))
                .collect(),
        ),
        _ => json!(fallback),
    }
}

/// Generate a mermaid diagram from a description.
///
/// The reasoning backend may draft the source; when it declines, a
/// built-in template for the kind is used instead.
pub async fn generate_diagram(
    reasoner: &dyn Reasoner,
    description: &str,
    kind: DiagramKind,
) -> Diagram {
    let source = match reasoner.draft_diagram(description, kind).await {
        Ok(Some(drafted)) => clean_mermaid_fences(&drafted),
        Ok(None) => template_source(kind, description),
        Err(err) => {
            warn!("diagram draft failed, using template ({err})");
            template_source(kind, description)
        }
    };
    let render_url = format!("https://mermaid.ink/img/{}", URL_SAFE.encode(&source));
    Diagram {
        kind,
        source,
        description: description.to_string(),
        render_url,
    }
}

/// Remove a ```mermaid fence if the backend wrapped its draft in one.
fn clean_mermaid_fences(source: &str) -> String {
    let trimmed = source.trim();
    let Some(inner) = trimmed
        .strip_prefix("```mermaid")
        .or_else(|| trimmed.strip_prefix("```"))
    else {
        return trimmed.to_string();
    };
    inner.strip_suffix("```").unwrap_or(inner).trim().to_string()
}

/// Built-in mermaid template for a diagram kind.
fn template_source(kind: DiagramKind, description: &str) -> String {
    let label = if description.trim().is_empty() {
        "Process"
    } else {
        description.trim()
    };
    match kind {
        DiagramKind::Flowchart => format!(
            "flowchart TD\n    A[Start] --> B[{label}]\n    B --> C[End]"
        ),
        DiagramKind::Sequence => format!(
            "sequenceDiagram\n    participant A as Caller\n    participant B as System\n    A->>B: {label}\n    B-->>A: Response"
        ),
        DiagramKind::Class => format!(
            "classDiagram\n    class Subject {{\n        +describe() {label}\n    }}"
        ),
    }
}
