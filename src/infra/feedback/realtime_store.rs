// Realtime Database feedback store, spoken to over its REST API.
//
// - POST {base}/feedbacks.json   -> {"name": "<generated key>"}
// - GET  {base}/feedbacks.json   -> {"<key>": {record}, ...} or null
//
// Records carry `createdAt` as epoch milliseconds. Older records may hold the
// body under `message` instead of `text`. Other clients write to the same path,
// so records are read field by field and an unreadable one is skipped, never
// failing the whole listing.

use crate::core::feedback::{
    sort_newest_first, FeedbackEntry, FeedbackStore, NewFeedback, StoreError,
    FEEDBACK_COLLECTION,
};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

fn http_err(e: reqwest::Error) -> StoreError {
    StoreError::Http(e.to_string())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordBody<'a> {
    name: &'a str,
    text: &'a str,
    created_at: i64,
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

pub struct RealtimeDbFeedbackStore {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl RealtimeDbFeedbackStore {
    /// `base_url` is the database URL, e.g. `https://<project>-default-rtdb.firebaseio.com`.
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token,
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/{}.json", self.base_url, FEEDBACK_COLLECTION)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.query(&[("auth", token.as_str())]),
            None => request,
        }
    }

    async fn check_status(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }

    fn string_field(record: &Map<String, Value>, key: &str) -> Option<String> {
        match record.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    // Integer or float milliseconds; anything else sorts as the epoch
    fn created_at_millis(record: &Map<String, Value>) -> i64 {
        match record.get("createdAt") {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse::<f64>().map(|f| f as i64).unwrap_or(0),
            _ => 0,
        }
    }

    fn into_entry(id: String, value: Value) -> Option<FeedbackEntry> {
        let Value::Object(record) = value else {
            tracing::warn!(id = %id, "Skipping feedback record that is not an object");
            return None;
        };

        let created_at = Utc
            .timestamp_millis_opt(Self::created_at_millis(&record))
            .single()
            .unwrap_or_default();

        Some(FeedbackEntry {
            name: Self::string_field(&record, "name").unwrap_or_default(),
            text: Self::string_field(&record, "text")
                .or_else(|| Self::string_field(&record, "message"))
                .unwrap_or_default(),
            id,
            created_at,
        })
    }
}

#[async_trait]
impl FeedbackStore for RealtimeDbFeedbackStore {
    async fn append(&self, feedback: NewFeedback) -> Result<String, StoreError> {
        let body = RecordBody {
            name: &feedback.name,
            text: &feedback.text,
            created_at: feedback.created_at.timestamp_millis(),
        };

        let request = self.authorize(self.client.post(self.collection_url()).json(&body));
        let response = Self::check_status(request.send().await.map_err(http_err)?).await?;
        let pushed: PushResponse = response.json().await.map_err(http_err)?;

        Ok(pushed.name)
    }

    async fn list_recent(&self) -> Result<Vec<FeedbackEntry>, StoreError> {
        let request = self.authorize(self.client.get(self.collection_url()));
        let response = Self::check_status(request.send().await.map_err(http_err)?).await?;
        let raw = response.text().await.map_err(http_err)?;

        // An empty collection comes back as `null`
        let records: Option<HashMap<String, Value>> = serde_json::from_str(&raw)?;

        let mut entries: Vec<FeedbackEntry> = records
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(id, record)| Self::into_entry(id, record))
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        sort_newest_first(&mut entries);

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_append_posts_record_and_returns_key() {
        let server = MockServer::start().await;
        let created_at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

        Mock::given(method("POST"))
            .and(path("/feedbacks.json"))
            .and(query_param("auth", "secret-token"))
            .and(body_json(serde_json::json!({
                "name": "ada",
                "text": "the nav collapses on mobile",
                "createdAt": 1_700_000_000_000i64
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "name": "-Nabc123" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let store = RealtimeDbFeedbackStore::new(server.uri(), Some("secret-token".to_string()));
        let id = store
            .append(NewFeedback {
                name: "ada".to_string(),
                text: "the nav collapses on mobile".to_string(),
                created_at,
            })
            .await
            .unwrap();

        assert_eq!(id, "-Nabc123");
    }

    #[tokio::test]
    async fn test_list_sorts_and_reads_legacy_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feedbacks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "-a": { "name": "old", "text": "first", "createdAt": 1_000 },
                "-b": { "name": "new", "text": "second", "createdAt": 3_000 },
                "-c": { "message": "legacy body", "createdAt": 2_000 }
            })))
            .mount(&server)
            .await;

        let store = RealtimeDbFeedbackStore::new(server.uri(), None);
        let entries = store.list_recent().await.unwrap();

        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["-b", "-c", "-a"]);
        assert_eq!(entries[1].text, "legacy body");
        assert_eq!(entries[1].display_name(), "Anonymous");
    }

    #[tokio::test]
    async fn test_off_shape_records_do_not_break_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feedbacks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "-a": { "name": "ada", "text": "first", "createdAt": 1_000 },
                "-b": { "name": "sam", "text": "float stamp", "createdAt": 1_700_000_000_000.0 },
                "-c": { "name": 42, "text": "numeric name" },
                "-d": "just a string",
                "-e": { "name": ["x"], "text": "odd name", "createdAt": "2000" }
            })))
            .mount(&server)
            .await;

        let store = RealtimeDbFeedbackStore::new(server.uri(), None);
        let entries = store.list_recent().await.unwrap();

        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["-b", "-e", "-a", "-c"]);
        assert_eq!(entries[0].created_at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(entries[1].display_name(), "Anonymous");
        assert_eq!(entries[3].name, "42");
    }

    #[tokio::test]
    async fn test_empty_collection_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&server)
            .await;

        let store = RealtimeDbFeedbackStore::new(server.uri(), None);
        assert!(store.list_recent().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_permission_denied_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({ "error": "Permission denied" })),
            )
            .mount(&server)
            .await;

        let store = RealtimeDbFeedbackStore::new(server.uri(), None);
        let err = store
            .append(NewFeedback {
                name: "ada".to_string(),
                text: "the nav collapses on mobile".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Status { status: 401, .. }));
    }
}
