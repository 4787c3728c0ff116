//! Episode normalization — turns heterogeneous caller content into the
//! canonical record shape the ingestion pipeline submits.
//!
//! Whatever the input looked like, an [`Episode`]'s `body` is a flattened
//! string by the time it reaches the remote call boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Provider-visible source tag for an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeSource {
    /// Free text, passed through unchanged.
    Text,
    /// Structured key/value content, flattened to natural-language text.
    Json,
}

impl EpisodeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EpisodeSource::Text => "text",
            EpisodeSource::Json => "json",
        }
    }
}

/// Content handed to the builder.
#[derive(Debug, Clone)]
pub enum EpisodeContent {
    Text(String),
    Structured(Value),
}

impl EpisodeContent {
    /// Classify an arbitrary JSON value: strings are treated as free text,
    /// everything else as structured content.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(s) => EpisodeContent::Text(s),
            other => EpisodeContent::Structured(other),
        }
    }
}

impl From<&str> for EpisodeContent {
    fn from(s: &str) -> Self {
        EpisodeContent::Text(s.to_string())
    }
}

impl From<String> for EpisodeContent {
    fn from(s: String) -> Self {
        EpisodeContent::Text(s)
    }
}

/// A discrete unit of content ready for submission to the knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub name: String,
    pub body: String,
    pub source: EpisodeSource,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_time: Option<DateTime<Utc>>,
}

impl Episode {
    pub fn with_reference_time(mut self, reference_time: DateTime<Utc>) -> Self {
        self.reference_time = Some(reference_time);
        self
    }
}

/// Builds canonical [`Episode`] records from raw content.
#[derive(Debug, Default)]
pub struct EpisodeBuilder;

impl EpisodeBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build one episode. A missing name is generated from the current
    /// ingestion timestamp.
    pub fn build(
        &self,
        content: EpisodeContent,
        description: impl Into<String>,
        name: Option<String>,
    ) -> Episode {
        let (body, source) = match content {
            EpisodeContent::Text(text) => (text, EpisodeSource::Text),
            EpisodeContent::Structured(value) => (flatten_structured(&value), EpisodeSource::Json),
        };
        Episode {
            name: name.unwrap_or_else(default_name),
            body,
            source,
            description: description.into(),
            reference_time: None,
        }
    }

    /// Build a text episode.
    pub fn text(
        &self,
        content: impl Into<String>,
        description: impl Into<String>,
        name: Option<String>,
    ) -> Episode {
        self.build(EpisodeContent::Text(content.into()), description, name)
    }

    /// Build a structured episode; the value is flattened to text.
    pub fn structured(
        &self,
        value: Value,
        description: impl Into<String>,
        name: Option<String>,
    ) -> Episode {
        self.build(EpisodeContent::Structured(value), description, name)
    }

    /// Build a batch with the shared default naming policy
    /// (`batch_episode_1`, `batch_episode_2`, …).
    pub fn batch(
        &self,
        contents: Vec<EpisodeContent>,
        description: impl Into<String>,
    ) -> Vec<Episode> {
        let description = description.into();
        contents
            .into_iter()
            .enumerate()
            .map(|(i, content)| {
                self.build(
                    content,
                    description.clone(),
                    Some(format!("batch_episode_{}", i + 1)),
                )
            })
            .collect()
    }
}

/// Flatten a structured value to deterministic natural-language text.
///
/// For each key with a non-null value: `<key>是<value>`; sequence items are
/// joined with `、`, clauses with `，`, and the whole string ends with `。`.
/// Key order follows the input's declaration order. Non-object values fall
/// back to their lossless JSON serialization.
pub fn flatten_structured(value: &Value) -> String {
    let Value::Object(map) = value else {
        return value.to_string();
    };

    let mut clauses = Vec::new();
    for (key, v) in map {
        let rendered = match v {
            Value::Null => continue,
            Value::Array(items) => items
                .iter()
                .map(render_scalar)
                .collect::<Vec<_>>()
                .join("、"),
            other => render_scalar(other),
        };
        clauses.push(format!("{key}是{rendered}"));
    }
    format!("{}。", clauses.join("，"))
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn default_name() -> String {
    format!("episode_{}", Utc::now().format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_matches_contract() {
        let value = json!({"name": "A", "skills": ["x", "y"]});
        assert_eq!(flatten_structured(&value), "name是A，skills是x、y。");
    }

    #[test]
    fn flatten_skips_null_values() {
        let value = json!({"name": "王五", "department": null, "experience": "10年"});
        assert_eq!(flatten_structured(&value), "name是王五，experience是10年。");
    }

    #[test]
    fn flatten_preserves_declaration_order() {
        let value: Value =
            serde_json::from_str(r#"{"zeta": 1, "alpha": 2, "mid": 3}"#).unwrap();
        assert_eq!(flatten_structured(&value), "zeta是1，alpha是2，mid是3。");
    }

    #[test]
    fn flatten_renders_numbers_and_bools() {
        let value = json!({"age": 30, "active": true});
        assert_eq!(flatten_structured(&value), "age是30，active是true。");
    }

    #[test]
    fn flatten_is_deterministic() {
        let value = json!({"position": "技术总监", "skills": ["Java", "Python", "团队管理"]});
        let first = flatten_structured(&value);
        let second = flatten_structured(&value);
        assert_eq!(first, second);
        assert_eq!(first, "position是技术总监，skills是Java、Python、团队管理。");
    }

    #[test]
    fn non_object_falls_back_to_json() {
        let value = json!([1, 2, 3]);
        assert_eq!(flatten_structured(&value), "[1,2,3]");
    }

    #[test]
    fn text_content_passes_through() {
        let builder = EpisodeBuilder::new();
        let episode = builder.text("张三是一名软件工程师。", "员工信息", None);
        assert_eq!(episode.body, "张三是一名软件工程师。");
        assert_eq!(episode.source, EpisodeSource::Text);
        assert_eq!(episode.description, "员工信息");
    }

    #[test]
    fn structured_content_is_flattened() {
        let builder = EpisodeBuilder::new();
        let episode = builder.structured(
            json!({"name": "王五", "position": "技术总监"}),
            "员工详细信息",
            Some("王五档案".into()),
        );
        assert_eq!(episode.body, "name是王五，position是技术总监。");
        assert_eq!(episode.source, EpisodeSource::Json);
        assert_eq!(episode.name, "王五档案");
    }

    #[test]
    fn default_name_uses_timestamp_pattern() {
        let builder = EpisodeBuilder::new();
        let episode = builder.text("内容", "描述", None);
        assert!(episode.name.starts_with("episode_"));
        // episode_YYYYMMDD_HHMMSS
        assert_eq!(episode.name.len(), "episode_".len() + 15);
    }

    #[test]
    fn batch_names_are_sequential() {
        let builder = EpisodeBuilder::new();
        let episodes = builder.batch(
            vec![
                "第一条".into(),
                EpisodeContent::Structured(json!({"name": "A"})),
                "第三条".into(),
            ],
            "批量信息",
        );
        let names: Vec<_> = episodes.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["batch_episode_1", "batch_episode_2", "batch_episode_3"]);
        assert_eq!(episodes[1].body, "name是A。");
    }

    #[test]
    fn content_from_value_classifies() {
        assert!(matches!(
            EpisodeContent::from_value(json!("text")),
            EpisodeContent::Text(_)
        ));
        assert!(matches!(
            EpisodeContent::from_value(json!({"k": "v"})),
            EpisodeContent::Structured(_)
        ));
    }

    #[test]
    fn source_serializes_lowercase() {
        assert_eq!(EpisodeSource::Text.as_str(), "text");
        assert_eq!(EpisodeSource::Json.as_str(), "json");
        assert_eq!(
            serde_json::to_string(&EpisodeSource::Json).unwrap(),
            "\"json\""
        );
    }
}
