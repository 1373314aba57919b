//! Best-effort model metadata lookup on Hugging Face

use super::metadata::{RecommendedModel, DEFAULT_RAM_GB, DEFAULT_VRAM_GB, RELEVANT_TAGS};
use crate::config::RecommenderConfig;
use crate::error::{LaimError, Result};
use serde::Deserialize;
use std::time::Duration;

/// One hit of `GET /api/models?search=`
#[derive(Debug, Clone, Deserialize)]
pub struct HubModel {
    #[serde(rename = "modelId", default)]
    pub model_id: String,
    #[serde(default)]
    pub pipeline_tag: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Client for the Hugging Face model search API
pub struct HuggingFaceClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HuggingFaceClient {
    pub fn new(config: &RecommenderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.hf_timeout_seconds))
            .user_agent(format!("laim/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(LaimError::Http)?;
        Ok(Self {
            client,
            endpoint: config.hf_endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// First search hit for `query`, if any
    pub async fn search(&self, query: &str) -> Result<Option<HubModel>> {
        let url = format!("{}/api/models", self.endpoint);
        let response = self
            .client
            .get(&url)
            .query(&[("search", query), ("limit", "1")])
            .send()
            .await
            .map_err(|e| LaimError::BackendUnavailable(format!("Hugging Face search: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LaimError::BackendRejected {
                status: status.as_u16(),
                body: "Hugging Face search failed".to_string(),
            }
            .into());
        }

        let hits: Vec<HubModel> = response
            .json()
            .await
            .map_err(|e| LaimError::BackendProtocol(format!("Hugging Face response: {}", e)))?;
        Ok(hits.into_iter().next())
    }

    /// Describe an installed model that has no curated entry
    ///
    /// Never fails: any lookup problem yields the placeholder tasks and a
    /// description saying the metadata is missing.
    pub async fn enrich(&self, name: &str, placeholder: &RecommendedModel) -> RecommendedModel {
        let query = name.split(':').next().unwrap_or(name);
        let mut model = RecommendedModel {
            name: name.to_string(),
            ..placeholder.clone()
        };

        match self.search(query).await {
            Ok(Some(hit)) => {
                model.tasks = tasks_from_hit(&hit, &placeholder.tasks);
                model.description = format!(
                    "Model '{}' is installed locally. Closest Hugging Face match is '{}'. \
                     Primary tasks: {}. Hardware estimates use the defaults ({} GB VRAM / {} GB RAM).",
                    name,
                    hit.model_id,
                    model.tasks.join(", "),
                    DEFAULT_VRAM_GB,
                    DEFAULT_RAM_GB
                );
                tracing::debug!("Enriched {} from Hugging Face ({})", name, hit.model_id);
            }
            Ok(None) => {
                tracing::warn!("Hugging Face has no match for {}", query);
                model.description = missing_description(name, placeholder);
            }
            Err(e) => {
                tracing::warn!("Hugging Face lookup failed for {}: {:#}", name, e);
                model.description = missing_description(name, placeholder);
            }
        }
        model
    }
}

/// Description used when nothing is known about `name`
pub fn missing_description(name: &str, placeholder: &RecommendedModel) -> String {
    format!(
        "Model '{}' is installed locally, but its metadata is missing. {}",
        name, placeholder.description
    )
}

/// Task list for a search hit: pipeline tag, else relevant tags, else `fallback`
pub fn tasks_from_hit(hit: &HubModel, fallback: &[String]) -> Vec<String> {
    if let Some(pipeline) = hit.pipeline_tag.as_deref().filter(|p| !p.is_empty()) {
        return vec![pipeline.replace('-', " ")];
    }

    let tasks: Vec<String> = hit
        .tags
        .iter()
        .filter(|tag| RELEVANT_TAGS.contains(&tag.to_lowercase().as_str()))
        .cloned()
        .collect();
    if tasks.is_empty() {
        fallback.to_vec()
    } else {
        tasks
    }
}
