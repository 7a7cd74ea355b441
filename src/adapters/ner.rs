//! Named-entity recognition adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{with_deadline, AdapterResult, AdapterUnavailable, NerAdapter};
use crate::types::EntityMap;

/// `spec.md` §6: `{text, entity_types?, threshold?, model_name?}`.
#[derive(Debug, Clone, Serialize)]
struct NerRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    entity_types: Option<&'a [String]>,
}

/// `spec.md` §6: `{success, data?: {entities}, error?}`.
#[derive(Debug, Clone, Deserialize)]
struct NerResponse {
    success: bool,
    data: Option<NerData>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct NerData {
    entities: EntityMap,
}

pub struct HttpNerAdapter {
    client: reqwest::Client,
    endpoint: String,
    deadline: Duration,
}

impl HttpNerAdapter {
    pub fn new(endpoint: impl Into<String>, deadline: Duration) -> Self {
        Self { client: reqwest::Client::new(), endpoint: endpoint.into(), deadline }
    }

    async fn call(&self, text: &str, entity_types: Option<&[String]>) -> AdapterResult<EntityMap> {
        let body = NerRequest { text, entity_types };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterUnavailable::transport(e.to_string()))?;

        let parsed: NerResponse = response
            .json()
            .await
            .map_err(|e| AdapterUnavailable::malformed(e.to_string()))?;

        if !parsed.success {
            return Err(AdapterUnavailable::transport(
                parsed.error.unwrap_or_else(|| "ner service reported failure".to_string()),
            ));
        }

        Ok(parsed.data.ok_or_else(|| AdapterUnavailable::malformed("missing data field"))?.entities)
    }
}

#[async_trait]
impl NerAdapter for HttpNerAdapter {
    async fn extract(&self, text: &str, entity_types: Option<&[String]>) -> AdapterResult<EntityMap> {
        with_deadline(self.deadline, "ner.extract", self.call(text, entity_types)).await
    }
}

/// Default adapter when no NER endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNerAdapter;

#[async_trait]
impl NerAdapter for NullNerAdapter {
    async fn extract(&self, _text: &str, _entity_types: Option<&[String]>) -> AdapterResult<EntityMap> {
        Err(AdapterUnavailable::not_configured("ner"))
    }
}

/// Deterministic in-memory adapter for tests: tags capitalized tokens
/// (other than the first word of the message) as `PERSON`. Never
/// unavailable.
pub struct FixtureNerAdapter;

#[async_trait]
impl NerAdapter for FixtureNerAdapter {
    async fn extract(&self, text: &str, _entity_types: Option<&[String]>) -> AdapterResult<EntityMap> {
        let mut entities = EntityMap::new();
        let words: Vec<&str> = text.split_whitespace().collect();
        for (i, word) in words.iter().enumerate() {
            let trimmed = word.trim_matches(|c: char| !c.is_alphanumeric());
            if i > 0 && trimmed.chars().next().is_some_and(|c| c.is_uppercase()) {
                entities.entry("PERSON".to_string()).or_insert_with(Vec::new).push(trimmed.to_string());
            }
        }
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_adapter_is_unavailable() {
        let adapter = NullNerAdapter;
        assert!(adapter.extract("Alice met Bob", None).await.is_err());
    }

    #[tokio::test]
    async fn fixture_adapter_tags_capitalized_tokens() {
        let adapter = FixtureNerAdapter;
        let entities = adapter.extract("Alice met Bob", None).await.unwrap();
        assert_eq!(entities.get("PERSON").unwrap(), &vec!["Bob".to_string()]);
    }
}
