//! Chart and diagram value objects produced by an analysis.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Supported chart shapes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    /// Category comparison.
    Bar,
    /// Trend over a continuous axis.
    Line,
    /// Correlation between two variables.
    Scatter,
    /// Composition breakdown.
    Pie,
    /// Matrix of values over two label axes.
    Heatmap,
    /// Multi-dimensional comparison.
    Radar,
}

impl ChartKind {
    /// Return the kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Scatter => "scatter",
            ChartKind::Pie => "pie",
            ChartKind::Heatmap => "heatmap",
            ChartKind::Radar => "radar",
        }
    }

    /// Parse a kind from a lowercase string.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bar" => Some(ChartKind::Bar),
            "line" => Some(ChartKind::Line),
            "scatter" => Some(ChartKind::Scatter),
            "pie" => Some(ChartKind::Pie),
            "heatmap" => Some(ChartKind::Heatmap),
            "radar" => Some(ChartKind::Radar),
            _ => None,
        }
    }
}

/// Chart specification attached to an analysis result.
///
/// The data payload is shaped per kind: `labels`/`values` for bar and pie,
/// `x`/`y` for line and scatter, `z`/`x`/`y` for heatmap, and
/// `categories`/`values` for radar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartSpec {
    /// Chart shape.
    #[serde(rename = "type")]
    pub kind: ChartKind,
    /// Chart title.
    pub title: String,
    /// Data payload shaped per kind.
    pub data: Value,
    /// Optional insight text accompanying the chart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insights: Option<String>,
}

/// Supported diagram flavors for text-to-diagram generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiagramKind {
    /// Directed flowchart.
    Flowchart,
    /// Sequence diagram.
    Sequence,
    /// Class diagram.
    Class,
}

impl DiagramKind {
    /// Return the kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagramKind::Flowchart => "flowchart",
            DiagramKind::Sequence => "sequence",
            DiagramKind::Class => "class",
        }
    }

    /// Parse a kind from a lowercase string, defaulting to flowchart.
    pub fn parse_or_default(value: &str) -> Self {
        match value {
            "sequence" => DiagramKind::Sequence,
            "class" => DiagramKind::Class,
            _ => DiagramKind::Flowchart,
        }
    }
}

/// Generated diagram source plus render metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagram {
    /// Diagram flavor.
    pub kind: DiagramKind,
    /// Mermaid source text.
    pub source: String,
    /// Natural-language description the diagram was generated from.
    pub description: String,
    /// URL rendering the source via mermaid.ink.
    pub render_url: String,
}

#[cfg(test)]
mod tests {
    use super::{ChartKind, ChartSpec, DiagramKind};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn chart_kind_parses_all_wire_names() {
        for name in ["bar", "line", "scatter", "pie", "heatmap", "radar"] {
            let kind = ChartKind::parse(name).expect("kind");
            assert_eq!(kind.as_str(), name);
        }
        assert_eq!(ChartKind::parse("donut"), None);
    }

    #[test]
    fn chart_spec_uses_type_field_on_the_wire() {
        let spec = ChartSpec {
            kind: ChartKind::Bar,
            title: "Expression".to_string(),
            data: json!({ "labels": ["a"], "values": [1] }),
            insights: None,
        };
        let value = serde_json::to_value(&spec).expect("json");
        assert_eq!(value["type"], "bar");
        assert_eq!(value.get("insights"), None);
    }

    #[test]
    fn diagram_kind_falls_back_to_flowchart() {
        assert_eq!(DiagramKind::parse_or_default("sequence"), DiagramKind::Sequence);
        assert_eq!(DiagramKind::parse_or_default("unknown"), DiagramKind::Flowchart);
    }
}
