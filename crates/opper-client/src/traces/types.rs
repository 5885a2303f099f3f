use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One timed unit of work inside a trace.
///
/// `parent_uuid` is a plain identifier; parent/child structure is rebuilt on
/// demand by [`SpanTree`](super::SpanTree).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub uuid: String,
    #[serde(default)]
    pub parent_uuid: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: Option<f64>,
    /// Score in percent (0–100).
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Project a trace belongs to.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectRef {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// One evaluation score attached to a trace.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub score: f64,
    #[serde(default)]
    pub comment: Option<String>,
}

/// An end-to-end execution record. A trace exclusively owns its spans.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub uuid: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default)]
    pub project: Option<ProjectRef>,
    #[serde(default)]
    pub duration_ms: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scores: Vec<Score>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub spans: Vec<Span>,
}

impl Trace {
    /// Mean of all scores, or `None` when the trace has not been scored.
    pub fn average_score(&self) -> Option<f64> {
        if self.scores.is_empty() {
            return None;
        }
        let total: f64 = self.scores.iter().map(|s| s.score).sum();
        Some(total / self.scores.len() as f64)
    }

    /// Project name, empty when the trace has no project.
    pub fn project_name(&self) -> &str {
        self.project.as_ref().map(|p| p.name.as_str()).unwrap_or("")
    }
}

/// Body of `GET /v1/traces`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceListResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub traces: Vec<Trace>,
    #[serde(default)]
    pub cursor: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_with_spans_deserializes_from_api_shape() {
        let trace: Trace = serde_json::from_value(serde_json::json!({
            "uuid": "5b7c1e9e-0000-4000-8000-000000000001",
            "name": "summarize",
            "status": "success",
            "project": {"name": "default", "uuid": null},
            "duration_ms": 1234.5,
            "scores": [{"score": 80.0}, {"score": 60.0, "comment": "meh"}],
            "start_time": "2024-05-01T10:00:00Z",
            "end_time": "2024-05-01T10:00:01.234Z",
            "input": "hello",
            "output": null,
            "spans": [{
                "uuid": "s1",
                "parent_uuid": null,
                "name": "root",
                "input": null,
                "output": "done",
                "start_time": "2024-05-01T10:00:00+00:00",
                "end_time": "2024-05-01T10:00:01Z",
                "duration_ms": 1000.0,
                "score": null,
                "metadata": {"model": "gpt"}
            }]
        }))
        .expect("trace");

        assert_eq!(trace.spans.len(), 1);
        assert_eq!(trace.spans[0].output.as_deref(), Some("done"));
        assert_eq!(trace.spans[0].score, None);
        assert_eq!(trace.project_name(), "default");
        assert_eq!(trace.average_score(), Some(70.0));
        assert!(trace.start_time.is_some());
    }

    #[test]
    fn nulls_and_missing_fields_fall_back_to_defaults() {
        let trace: Trace = serde_json::from_value(serde_json::json!({
            "uuid": "t1",
            "name": null,
            "status": null,
            "scores": null,
            "spans": null
        }))
        .expect("trace");
        assert_eq!(trace.name, "");
        assert!(trace.spans.is_empty());
        assert_eq!(trace.average_score(), None);
        assert_eq!(trace.project_name(), "");
        assert_eq!(trace.duration_ms, None);
    }

    #[test]
    fn list_response_keeps_cursor() {
        let list: TraceListResponse = serde_json::from_str(
            r#"{"traces":[{"uuid":"a"},{"uuid":"b"}],"cursor":"next-page"}"#,
        )
        .expect("list");
        assert_eq!(list.traces.len(), 2);
        assert_eq!(list.cursor.as_deref(), Some("next-page"));
    }
}
