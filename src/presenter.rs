//! Result presentation — normalizes provider-shaped search results into one
//! canonical record and renders them for display.
//!
//! The remote provider is inconsistent about where it puts fields: a value
//! may carry `summary` at the top level of the record or inside its
//! `attributes`/`properties` mapping. [`SearchRecord::from_value`] is the
//! boundary adapter that absorbs that difference once; downstream code never
//! inspects the raw shape again.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::search::ComprehensiveResults;

/// Display preview length for summaries, in characters.
pub const SUMMARY_PREVIEW_CHARS: usize = 100;

/// Known bad month tokens observed in provider date strings, with their
/// corrections. Applied only at display time.
const MONTH_TOKEN_REPAIRS: &[(&str, &str)] = &[("ity", "Jul")];

/// Canonical internal form of one provider search result.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchRecord {
    pub uuid: Option<String>,
    pub name: Option<String>,
    pub fact: Option<String>,
    pub summary: Option<String>,
    pub entity_type: Option<String>,
    pub labels: Vec<String>,
    pub score: Option<f64>,
    pub valid_at: Option<String>,
    pub invalid_at: Option<String>,
    pub created_at: Option<String>,
    pub attributes: Map<String, Value>,
}

impl SearchRecord {
    /// Adapt a provider value. Every field is tried at the top level of the
    /// record first, then in its attribute mapping.
    pub fn from_value(value: &Value) -> Self {
        let labels = lookup(value, "labels")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let attributes = value
            .get("attributes")
            .or_else(|| value.get("properties"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        Self {
            uuid: lookup_str(value, "uuid"),
            name: lookup_str(value, "name"),
            fact: lookup_str(value, "fact"),
            summary: lookup_str(value, "summary"),
            entity_type: lookup_str(value, "entity_type"),
            labels,
            score: lookup(value, "score").and_then(Value::as_f64),
            valid_at: lookup_str(value, "valid_at"),
            invalid_at: lookup_str(value, "invalid_at"),
            created_at: lookup_str(value, "created_at"),
            attributes,
        }
    }

    /// Textual payload of the record: the fact for edge results, the name
    /// for node results.
    pub fn display_text(&self) -> Option<&str> {
        self.fact.as_deref().or(self.name.as_deref())
    }
}

/// Field access across both provider shapes: top-level key first, then the
/// `attributes`/`properties` mapping.
fn lookup<'a>(value: &'a Value, field: &str) -> Option<&'a Value> {
    if let Some(v) = value.get(field) {
        if !v.is_null() {
            return Some(v);
        }
    }
    for mapping in ["attributes", "properties"] {
        if let Some(v) = value.get(mapping).and_then(|m| m.get(field)) {
            if !v.is_null() {
                return Some(v);
            }
        }
    }
    None
}

fn lookup_str(value: &Value, field: &str) -> Option<String> {
    lookup(value, field).and_then(|v| v.as_str().map(str::to_string))
}

/// Bounded preview of a summary: at most [`SUMMARY_PREVIEW_CHARS`]
/// characters, with an ellipsis when truncated. Display-only — the record
/// itself is never mutated.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    }
}

/// Repair the known malformed month-token pattern in provider date strings.
///
/// This is a tracked workaround for a provider defect, not a date parser.
// TODO: remove once the graph service emits valid month abbreviations.
pub fn repair_month_token(raw: &str) -> String {
    let mut repaired = raw.to_string();
    for (bad, good) in MONTH_TOKEN_REPAIRS {
        if repaired.contains(bad) {
            repaired = repaired.replace(bad, good);
        }
    }
    repaired
}

/// Render fact-shaped results (edges) as a display block.
pub fn format_fact_results(results: &[Value], title: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("{title}:\n"));
    out.push_str(&"=".repeat(50));
    out.push('\n');
    if results.is_empty() {
        out.push_str("no results\n");
        return out;
    }
    for (i, value) in results.iter().enumerate() {
        let record = SearchRecord::from_value(value);
        out.push_str(&format!("\nresult {}:\n", i + 1));
        out.push_str(&format!("  uuid: {}\n", record.uuid.as_deref().unwrap_or("N/A")));
        out.push_str(&format!("  fact: {}\n", record.display_text().unwrap_or("N/A")));
        if let Some(valid_at) = &record.valid_at {
            out.push_str(&format!("  valid from: {}\n", repair_month_token(valid_at)));
        }
        if let Some(invalid_at) = &record.invalid_at {
            out.push_str(&format!("  valid until: {}\n", repair_month_token(invalid_at)));
        }
        out.push_str(&"-".repeat(30));
        out.push('\n');
    }
    out
}

/// Render node-shaped results (entities) as a display block.
pub fn format_node_results(results: &[Value], title: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("{title}:\n"));
    out.push_str(&"=".repeat(50));
    out.push('\n');
    if results.is_empty() {
        out.push_str("no nodes\n");
        return out;
    }
    for (i, value) in results.iter().enumerate() {
        let record = SearchRecord::from_value(value);
        out.push_str(&format!("\nnode {}:\n", i + 1));
        out.push_str(&format!("  uuid: {}\n", record.uuid.as_deref().unwrap_or("N/A")));
        out.push_str(&format!("  name: {}\n", record.name.as_deref().unwrap_or("N/A")));
        out.push_str(&format!(
            "  summary: {}\n",
            preview(record.summary.as_deref().unwrap_or("N/A"), SUMMARY_PREVIEW_CHARS)
        ));
        if !record.labels.is_empty() {
            out.push_str(&format!("  labels: {}\n", record.labels.join(", ")));
        }
        if let Some(created_at) = &record.created_at {
            out.push_str(&format!("  created at: {created_at}\n"));
        }
        if !record.attributes.is_empty() {
            out.push_str("  attributes:\n");
            for (key, value) in &record.attributes {
                out.push_str(&format!("    {key}: {value}\n"));
            }
        }
        out.push_str(&"-".repeat(30));
        out.push('\n');
    }
    out
}

/// Render an aggregate search outcome, section by section.
pub fn format_comprehensive(results: &ComprehensiveResults) -> String {
    let mut out = String::new();
    out.push_str(&"=".repeat(60));
    out.push_str("\ncomprehensive search results\n");
    out.push_str(&"=".repeat(60));
    out.push('\n');
    out.push_str(&format_fact_results(&results.basic, "basic search"));
    out.push_str(&format_node_results(&results.node, "node search"));
    if let Some(center) = &results.center_reranked {
        out.push_str(&format_fact_results(center, "center-node reranked search"));
    }
    out
}
