//! Response normalizer — guarantees a well-formed, client-parseable envelope
//! out of whatever text the model returns.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Client-visible action attached to a chat reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

/// The `{reply, action}` envelope shared by the blocking response and the
/// streaming final payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEnvelope {
    pub reply: String,
    pub action: Option<ChatAction>,
}

impl ChatEnvelope {
    /// Plain-text fallback: the raw model output as the reply, no action.
    pub fn plain(reply: impl Into<String>) -> Self {
        ChatEnvelope {
            reply: reply.into(),
            action: None,
        }
    }
}

/// Locates the first top-level JSON object candidate in free text: the span
/// from the first `{` to the last `}`. Returns `None` when no such span exists.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Normalizes a blocking-mode model response into an envelope. Any
/// extraction or parse failure degrades to `{reply: <raw text>, action: null}`.
pub fn normalize_reply(raw: &str) -> ChatEnvelope {
    let Some(candidate) = extract_json_object(raw) else {
        return ChatEnvelope::plain(raw.trim());
    };
    match serde_json::from_str::<ChatEnvelope>(candidate) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("model reply was not a valid envelope ({e}); falling back to plain text");
            ChatEnvelope::plain(raw.trim())
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Job ranking
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedJob {
    pub id: Value,
    #[serde(default)]
    pub match_score: f64,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
struct RankedJobsPayload {
    #[serde(default)]
    ranked_jobs: Vec<RankedJob>,
}

/// Normalizes a ranking-mode model response. On success the ranked entries
/// are returned ordered by `match_score` descending (stable: ties keep the
/// model's order, so re-ranking an already ranked list is a no-op). On any
/// extraction or parse failure the submitted job list is returned unchanged.
pub fn rank_jobs(raw: &str, original_jobs: &[Value]) -> Vec<Value> {
    let fallback = || original_jobs.to_vec();

    let Some(candidate) = extract_json_object(raw) else {
        warn!("ranking reply carried no JSON object; returning jobs unranked");
        return fallback();
    };

    let payload: RankedJobsPayload = match serde_json::from_str(candidate) {
        Ok(p) => p,
        Err(e) => {
            warn!("ranking reply was not valid JSON ({e}); returning jobs unranked");
            return fallback();
        }
    };

    let mut ranked = payload.ranked_jobs;
    ranked.sort_by(|a, b| {
        b.match_score
            .partial_cmp(&a.match_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    ranked
        .into_iter()
        .map(|job| serde_json::to_value(job).unwrap_or(Value::Null))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_json_object_spans_first_brace_to_last() {
        let text = "Here you go: {\"a\": {\"b\": 1}} hope that helps";
        assert_eq!(extract_json_object(text), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn extract_json_object_none_without_braces() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn normalize_reply_parses_valid_envelope() {
        let raw = "Sure!\n{\"reply\": \"On it\", \"action\": {\"type\": \"NAVIGATE\", \"url\": \"/jobs\"}}";
        let envelope = normalize_reply(raw);
        assert_eq!(envelope.reply, "On it");
        assert_eq!(
            envelope.action,
            Some(ChatAction {
                kind: "NAVIGATE".to_string(),
                url: "/jobs".to_string(),
            })
        );
    }

    #[test]
    fn normalize_reply_null_action() {
        let envelope = normalize_reply("{\"reply\": \"hi\", \"action\": null}");
        assert_eq!(envelope, ChatEnvelope::plain("hi"));
    }

    #[test]
    fn normalize_reply_falls_back_to_plain_text() {
        let envelope = normalize_reply("The model just chatted. No JSON at all.");
        assert_eq!(envelope.reply, "The model just chatted. No JSON at all.");
        assert!(envelope.action.is_none());

        let envelope = normalize_reply("{not valid json}");
        assert_eq!(envelope.reply, "{not valid json}");
    }

    #[test]
    fn rank_jobs_sorts_by_score_descending() {
        let raw = r#"{"ranked_jobs": [
            {"id": 1, "match_score": 40, "reason": "weak"},
            {"id": 2, "match_score": 90, "reason": "strong"},
            {"id": 3, "match_score": 70, "reason": "fair"}
        ]}"#;
        let ranked = rank_jobs(raw, &[]);
        let ids: Vec<i64> = ranked.iter().map(|j| j["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn rank_jobs_ties_keep_input_order() {
        let raw = r#"{"ranked_jobs": [
            {"id": "a", "match_score": 50},
            {"id": "b", "match_score": 50},
            {"id": "c", "match_score": 50}
        ]}"#;
        let ranked = rank_jobs(raw, &[]);
        let ids: Vec<&str> = ranked.iter().map(|j| j["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn rank_jobs_is_idempotent() {
        let raw = r#"{"ranked_jobs": [
            {"id": 1, "match_score": 10},
            {"id": 2, "match_score": 99},
            {"id": 3, "match_score": 99}
        ]}"#;
        let once = rank_jobs(raw, &[]);
        let again_raw = json!({ "ranked_jobs": once }).to_string();
        let twice = rank_jobs(&again_raw, &[]);
        assert_eq!(once, twice);
    }

    #[test]
    fn rank_jobs_identity_fallback_on_bad_json() {
        let original = vec![json!({"id": 1, "title": "A"}), json!({"id": 2, "title": "B"})];
        assert_eq!(rank_jobs("not json at all", &original), original);
        assert_eq!(rank_jobs("{broken", &original), original);
    }
}
