//! Request and response bodies of the analysis backend.

use serde::{Deserialize, Deserializer, Serialize};

use crate::transcript::TranscriptEntry;

#[derive(Debug, Serialize)]
pub struct QuestionsRequest<'a> {
    pub message: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct QuestionsResponse {
    pub list_questions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SaveResponsesRequest<'a> {
    pub messages: &'a [TranscriptEntry],
}

#[derive(Debug, Deserialize)]
pub struct SaveResponsesResponse {
    pub reply: AnalysisReply,
}

/// The classification the backend returns for a finished transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AnalysisReply {
    #[serde(rename = "Polarity", default, deserialize_with = "scalar_text")]
    pub polarity: String,
    #[serde(rename = "Extracted Concern", default, deserialize_with = "scalar_text")]
    pub concern: String,
    #[serde(rename = "Category", default, deserialize_with = "scalar_text")]
    pub category: String,
    #[serde(rename = "Intensity", default, deserialize_with = "scalar_text")]
    pub intensity: String,
    /// Timestamp the backend stamps on each saved analysis.
    #[serde(rename = "time", default)]
    pub recorded_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HelloResponse {
    pub message: String,
}

/// Accepts any JSON value and keeps it as display text: strings verbatim,
/// `null` as empty, everything else in its JSON form.
fn scalar_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_field_names() {
        let body = r#"{"reply":{"Polarity":"Negative","Extracted Concern":"Anxiety","Category":"Stress","Intensity":"High","time":"2024-10-27 10:00:00"}}"#;
        let parsed: SaveResponsesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.reply,
            AnalysisReply {
                polarity: "Negative".into(),
                concern: "Anxiety".into(),
                category: "Stress".into(),
                intensity: "High".into(),
                recorded_at: Some("2024-10-27 10:00:00".into()),
            }
        );
    }

    #[test]
    fn test_reply_non_string_scalars() {
        let body = r#"{"Polarity":"Positive","Extracted Concern":null,"Category":"Happiness","Intensity":7}"#;
        let reply: AnalysisReply = serde_json::from_str(body).unwrap();
        assert_eq!(reply.intensity, "7");
        assert_eq!(reply.concern, "");
        assert_eq!(reply.recorded_at, None);
    }

    #[test]
    fn test_reply_missing_fields_default_to_empty() {
        let reply: AnalysisReply = serde_json::from_str(r#"{"Polarity":"Neutral"}"#).unwrap();
        assert_eq!(reply.polarity, "Neutral");
        assert!(reply.category.is_empty());
        assert!(reply.intensity.is_empty());
    }

    #[test]
    fn test_save_request_body() {
        let messages = vec![TranscriptEntry::bot("How?"), TranscriptEntry::user("Fine")];
        let body = serde_json::to_value(SaveResponsesRequest {
            messages: &messages,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "messages": [
                    { "text": "How?", "type": "bot" },
                    { "text": "Fine", "type": "user" }
                ]
            })
        );
    }
}
