//! Hardware-based model recommendations
//!
//! The [`ModelCatalog`] merges the backend's installed models with curated
//! metadata. Installed models without a curated entry get placeholder
//! requirements and, when enabled, tasks looked up on Hugging Face. The
//! catalog is rebuilt only by an explicit [`ModelCatalog::refresh`].

pub mod huggingface;
pub mod metadata;

pub use huggingface::HuggingFaceClient;
pub use metadata::{HardwareSpecs, RecommendedModel};

use crate::backend::Backend;
use crate::config::RecommenderConfig;
use crate::error::{LaimError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

pub const MIN_VRAM_GB: u32 = 1;
pub const MAX_VRAM_GB: u32 = 1024;
pub const MIN_RAM_GB: u32 = 1;
pub const MAX_RAM_GB: u32 = 2048;

/// A validated recommendation query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareQuery {
    pub vram_gb: u32,
    pub ram_gb: u32,
    /// Empty means any task
    pub task: String,
}

fn parse_gb(field: &str, raw: Option<&str>, default: u32, min: u32, max: u32) -> Result<u32> {
    let raw = match raw.map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => raw,
        None => return Ok(default),
    };
    let value: i64 = raw.parse().map_err(|_| {
        LaimError::InvalidRequest(format!("{} must be a valid integer, got {:?}", field, raw))
    })?;
    if value < min as i64 || value > max as i64 {
        return Err(LaimError::InvalidRequest(format!(
            "{} must be between {} and {} GB",
            field, min, max
        ))
        .into());
    }
    Ok(value as u32)
}

impl HardwareQuery {
    /// Build a query from raw query-string values
    ///
    /// Missing values default to 8 GB VRAM and 16 GB RAM.
    ///
    /// # Examples
    ///
    /// ```
    /// use laim::recommend::HardwareQuery;
    ///
    /// let q = HardwareQuery::from_params(Some("12"), None, Some("Code")).unwrap();
    /// assert_eq!((q.vram_gb, q.ram_gb, q.task.as_str()), (12, 16, "code"));
    /// assert!(HardwareQuery::from_params(Some("0"), None, None).is_err());
    /// ```
    pub fn from_params(vram: Option<&str>, ram: Option<&str>, task: Option<&str>) -> Result<Self> {
        Ok(Self {
            vram_gb: parse_gb(
                "vram",
                vram,
                metadata::DEFAULT_VRAM_GB,
                MIN_VRAM_GB,
                MAX_VRAM_GB,
            )?,
            ram_gb: parse_gb("ram", ram, metadata::DEFAULT_RAM_GB, MIN_RAM_GB, MAX_RAM_GB)?,
            task: task.unwrap_or_default().trim().to_lowercase(),
        })
    }
}

/// Shared, explicitly refreshed model catalog
pub struct ModelCatalog {
    backend: Arc<dyn Backend>,
    hub: Option<HuggingFaceClient>,
    models: RwLock<BTreeMap<String, RecommendedModel>>,
}

fn curated() -> BTreeMap<String, RecommendedModel> {
    metadata::known_models()
        .into_iter()
        .map(|m| (m.name.clone(), m))
        .collect()
}

impl ModelCatalog {
    /// Create a catalog holding the curated models until the first refresh
    pub fn new(backend: Arc<dyn Backend>, config: &RecommenderConfig) -> Result<Self> {
        let hub = if config.enrich {
            Some(HuggingFaceClient::new(config)?)
        } else {
            None
        };
        Ok(Self {
            backend,
            hub,
            models: RwLock::new(curated()),
        })
    }

    /// Rebuild the catalog from the backend's installed models
    ///
    /// Falls back to the curated table when the backend cannot be listed.
    /// Returns the number of catalog entries.
    pub async fn refresh(&self) -> usize {
        let installed = match self.backend.list_models().await {
            Ok(tags) => tags,
            Err(e) => {
                tracing::warn!(
                    "Could not list installed models, using the built-in catalog: {:#}",
                    e
                );
                let models = curated();
                let count = models.len();
                *self.models.write().await = models;
                return count;
            }
        };

        let known = curated();
        let placeholder = metadata::placeholder();

        let names: BTreeSet<String> = installed
            .iter()
            .map(|tag| tag.name.strip_suffix(":latest").unwrap_or(&tag.name).to_string())
            .collect();

        let mut models = BTreeMap::new();
        let mut unknown = Vec::new();
        for name in names {
            match known.get(&name) {
                Some(entry) => {
                    models.insert(name, entry.clone());
                }
                None => unknown.push(name),
            }
        }

        let enriched = match &self.hub {
            Some(hub) => {
                futures::future::join_all(unknown.iter().map(|name| hub.enrich(name, &placeholder)))
                    .await
            }
            None => unknown
                .iter()
                .map(|name| RecommendedModel {
                    name: name.clone(),
                    description: huggingface::missing_description(name, &placeholder),
                    ..placeholder.clone()
                })
                .collect(),
        };
        for model in enriched {
            models.insert(model.name.clone(), model);
        }

        let count = models.len();
        tracing::info!("Model catalog rebuilt with {} entries", count);
        *self.models.write().await = models;
        count
    }

    /// Models that fit the hardware and match the task, best first
    pub async fn recommend(&self, query: &HardwareQuery) -> Vec<RecommendedModel> {
        let models = self.models.read().await;
        let mut picks: Vec<RecommendedModel> = models
            .values()
            .filter(|m| m.fits(query.vram_gb, query.ram_gb))
            .filter(|m| query.task.is_empty() || m.supports(&query.task))
            .cloned()
            .collect();
        picks.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
        picks
    }

    /// Sorted unique tasks across the catalog
    pub async fn tasks(&self) -> Vec<String> {
        let models = self.models.read().await;
        models
            .values()
            .flat_map(|m| m.tasks.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.models.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BodyStream, ChatMessage, GenerationOptions, ModelTag};
    use async_trait::async_trait;

    struct ListOnly(Option<Vec<&'static str>>);

    #[async_trait]
    impl Backend for ListOnly {
        async fn generate(&self, _: &str, _: &str, _: &GenerationOptions) -> Result<BodyStream> {
            unimplemented!()
        }

        async fn chat(
            &self,
            _: &str,
            _: &[ChatMessage],
            _: &GenerationOptions,
        ) -> Result<BodyStream> {
            unimplemented!()
        }

        async fn list_models(&self) -> Result<Vec<ModelTag>> {
            match &self.0 {
                Some(names) => Ok(names
                    .iter()
                    .map(|n| ModelTag {
                        name: n.to_string(),
                        size: 0,
                        digest: String::new(),
                        modified_at: String::new(),
                    })
                    .collect()),
                None => Err(LaimError::BackendUnavailable("down".into()).into()),
            }
        }

        async fn pull(&self, _: &str) -> Result<BodyStream> {
            unimplemented!()
        }

        async fn delete(&self, _: &str) -> Result<()> {
            unimplemented!()
        }
    }

    fn catalog(installed: Option<Vec<&'static str>>) -> ModelCatalog {
        let config = RecommenderConfig {
            enrich: false,
            ..RecommenderConfig::default()
        };
        ModelCatalog::new(Arc::new(ListOnly(installed)), &config).unwrap()
    }

    fn names(models: &[RecommendedModel]) -> Vec<&str> {
        models.iter().map(|m| m.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_recommend_sorted_by_score_then_name() {
        let catalog = catalog(None);
        let query = HardwareQuery::from_params(Some("8"), Some("16"), None).unwrap();
        let picks = catalog.recommend(&query).await;
        assert_eq!(
            names(&picks),
            vec!["codellama:7b-code", "mistral", "llama2:7b-chat", "gemma:2b", "tinyllama"]
        );
    }

    #[tokio::test]
    async fn test_recommend_filters_by_task() {
        let catalog = catalog(None);
        let query = HardwareQuery::from_params(Some("64"), Some("64"), Some("CODE")).unwrap();
        assert_eq!(
            names(&catalog.recommend(&query).await),
            vec!["codellama:7b-code", "mistral"]
        );
    }

    #[tokio::test]
    async fn test_refresh_merges_installed_models() {
        let catalog = catalog(Some(vec!["mistral:latest", "phi3:mini", "tinyllama"]));
        assert_eq!(catalog.refresh().await, 3);

        let query = HardwareQuery::from_params(Some("1024"), Some("2048"), None).unwrap();
        let picks = catalog.recommend(&query).await;
        assert_eq!(names(&picks), vec!["mistral", "phi3:mini", "tinyllama"]);

        let phi = &picks[1];
        assert_eq!(phi.hardware_req.min_vram_gb, metadata::DEFAULT_VRAM_GB);
        assert!(phi.description.contains("metadata is missing"));
        assert_eq!(phi.tasks, vec!["chat", "generate", "general"]);
    }

    #[tokio::test]
    async fn test_refresh_with_backend_down_uses_curated_table() {
        let catalog = catalog(None);
        assert_eq!(catalog.refresh().await, 6);
        assert!(catalog.tasks().await.contains(&"programming".to_string()));
    }

    #[tokio::test]
    async fn test_tasks_sorted_unique() {
        let catalog = catalog(Some(vec!["tinyllama", "gemma:2b"]));
        catalog.refresh().await;
        assert_eq!(
            catalog.tasks().await,
            vec!["chat", "experiment", "generate", "summarization"]
        );
    }

    #[test]
    fn test_query_validation() {
        assert!(HardwareQuery::from_params(Some("abc"), None, None).is_err());
        assert!(HardwareQuery::from_params(Some("1025"), None, None).is_err());
        assert!(HardwareQuery::from_params(None, Some("2049"), None).is_err());
        assert!(HardwareQuery::from_params(None, Some("0"), None).is_err());

        let q = HardwareQuery::from_params(None, None, None).unwrap();
        assert_eq!((q.vram_gb, q.ram_gb), (8, 16));
        assert!(q.task.is_empty());
    }
}
