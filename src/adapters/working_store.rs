//! Working-memory store adapter.
//!
//! `spec.md` §4.1: "Must return messages ordered by timestamp
//! ascending; empty list on unavailability." Unlike the other
//! adapters this contract has no typed-unavailable branch at all —
//! unavailability simply degrades to an empty list, so the trait
//! method is infallible by signature.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use super::WorkingStoreAdapter;
use crate::types::MessageRecord;

#[derive(Debug, Deserialize)]
struct RecentMessagesResponse {
    messages: Vec<MessageRecord>,
}

pub struct HttpWorkingStoreAdapter {
    client: reqwest::Client,
    endpoint: String,
    deadline: Duration,
}

impl HttpWorkingStoreAdapter {
    pub fn new(endpoint: impl Into<String>, deadline: Duration) -> Self {
        Self { client: reqwest::Client::new(), endpoint: endpoint.into(), deadline }
    }

    async fn call(&self, user_id: &str, since_hours: i64) -> Option<Vec<MessageRecord>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("user_id", user_id), ("hours", &since_hours.to_string())])
            .send()
            .await
            .ok()?;

        let parsed: RecentMessagesResponse = response.json().await.ok()?;

        let mut messages = parsed.messages;
        messages.sort_by_key(|m| m.timestamp);
        Some(messages)
    }
}

#[async_trait]
impl WorkingStoreAdapter for HttpWorkingStoreAdapter {
    async fn recent_messages(&self, user_id: &str, since_hours: i64) -> Vec<MessageRecord> {
        match tokio::time::timeout(self.deadline, self.call(user_id, since_hours)).await {
            Ok(Some(messages)) => messages,
            Ok(None) => {
                warn!(user_id, "working store returned an unparseable response");
                Vec::new()
            }
            Err(_) => {
                warn!(user_id, "working store request timed out");
                Vec::new()
            }
        }
    }
}

/// Default adapter when no working-store endpoint is configured:
/// always an empty history, so the resolver treats the caller as a
/// brand-new user (`spec.md` §8 scenario 1).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWorkingStoreAdapter;

#[async_trait]
impl WorkingStoreAdapter for NullWorkingStoreAdapter {
    async fn recent_messages(&self, _user_id: &str, _since_hours: i64) -> Vec<MessageRecord> {
        Vec::new()
    }
}

/// In-memory fixture adapter for tests: holds a fixed set of messages
/// and filters/sorts them the way a real store would.
#[derive(Debug, Default, Clone)]
pub struct FixtureWorkingStoreAdapter {
    messages: Vec<MessageRecord>,
}

impl FixtureWorkingStoreAdapter {
    pub fn new(messages: Vec<MessageRecord>) -> Self {
        Self { messages }
    }
}

#[async_trait]
impl WorkingStoreAdapter for FixtureWorkingStoreAdapter {
    async fn recent_messages(&self, user_id: &str, since_hours: i64) -> Vec<MessageRecord> {
        let cutoff = chrono::Utc::now() - chrono::Duration::hours(since_hours);
        let mut messages: Vec<MessageRecord> = self
            .messages
            .iter()
            .filter(|m| m.user_id == user_id && m.timestamp >= cutoff)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.timestamp);
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageType;

    #[tokio::test]
    async fn null_adapter_returns_empty() {
        let adapter = NullWorkingStoreAdapter;
        assert!(adapter.recent_messages("u1", 24).await.is_empty());
    }

    #[tokio::test]
    async fn fixture_adapter_filters_by_user_and_recency() {
        let now = chrono::Utc::now();
        let messages = vec![
            MessageRecord {
                thread_id: Some("t1".into()),
                user_id: "u1".into(),
                message_type: MessageType::UserInput,
                message_content: "hi".into(),
                timestamp: now - chrono::Duration::hours(1),
            },
            MessageRecord {
                thread_id: Some("t1".into()),
                user_id: "u1".into(),
                message_type: MessageType::UserInput,
                message_content: "old".into(),
                timestamp: now - chrono::Duration::hours(48),
            },
            MessageRecord {
                thread_id: Some("t2".into()),
                user_id: "u2".into(),
                message_type: MessageType::UserInput,
                message_content: "other user".into(),
                timestamp: now,
            },
        ];
        let adapter = FixtureWorkingStoreAdapter::new(messages);
        let recent = adapter.recent_messages("u1", 24).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].message_content, "hi");
    }
}
