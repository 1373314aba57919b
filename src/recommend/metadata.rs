//! Built-in model metadata

use serde::{Deserialize, Serialize};

/// Hardware floor used for models without known requirements
pub const DEFAULT_VRAM_GB: u32 = 8;
pub const DEFAULT_RAM_GB: u32 = 16;

/// Minimum hardware a model needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareSpecs {
    pub min_vram_gb: u32,
    pub min_ram_gb: u32,
}

/// A catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedModel {
    pub name: String,
    pub description: String,
    pub tasks: Vec<String>,
    pub hardware_req: HardwareSpecs,
    pub score: u32,
}

impl RecommendedModel {
    fn new(
        name: &str,
        description: &str,
        tasks: &[&str],
        min_vram_gb: u32,
        min_ram_gb: u32,
        score: u32,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            tasks: tasks.iter().map(|t| t.to_string()).collect(),
            hardware_req: HardwareSpecs {
                min_vram_gb,
                min_ram_gb,
            },
            score,
        }
    }

    /// Whether the model runs on the given hardware
    pub fn fits(&self, vram_gb: u32, ram_gb: u32) -> bool {
        vram_gb >= self.hardware_req.min_vram_gb && ram_gb >= self.hardware_req.min_ram_gb
    }

    /// Whether any task contains `task` (case-insensitive)
    pub fn supports(&self, task: &str) -> bool {
        let task = task.to_lowercase();
        self.tasks.iter().any(|t| t.to_lowercase().contains(&task))
    }
}

/// Models with curated descriptions and requirements
pub fn known_models() -> Vec<RecommendedModel> {
    vec![
        RecommendedModel::new(
            "tinyllama",
            "A compact language model for constrained machines and quick experiments. Best for simple tasks.",
            &["chat", "summarization", "experiment"],
            2,
            4,
            5,
        ),
        RecommendedModel::new(
            "mistral",
            "Small but strong general purpose model from Mistral AI, tuned for speed.",
            &["chat", "generate", "code", "general"],
            6,
            8,
            8,
        ),
        RecommendedModel::new(
            "llama2:7b-chat",
            "Chat variant of Meta's 7B Llama 2. A solid baseline for conversation.",
            &["chat", "generate", "general"],
            8,
            16,
            7,
        ),
        RecommendedModel::new(
            "codellama:7b-code",
            "Meta model fine-tuned for writing and understanding code.",
            &["code", "generate", "programming"],
            8,
            16,
            9,
        ),
        RecommendedModel::new(
            "gemma:2b",
            "Lightweight open model from Google with good quality for its size.",
            &["chat", "summarization", "generate", "experiment"],
            3,
            6,
            6,
        ),
        RecommendedModel::new(
            "llama2:13b",
            "The 13B Llama 2. Needs substantial resources to run well.",
            &["chat", "generate", "advanced", "general"],
            12,
            32,
            10,
        ),
    ]
}

/// Template for installed models that have no curated entry
pub fn placeholder() -> RecommendedModel {
    RecommendedModel::new(
        "",
        "Generic tasks and default hardware requirements were assigned.",
        &["chat", "generate", "general"],
        DEFAULT_VRAM_GB,
        DEFAULT_RAM_GB,
        6,
    )
}

/// Hugging Face tags that describe what a model can do
pub const RELEVANT_TAGS: &[&str] = &[
    "llama",
    "mistral",
    "gemma",
    "phi",
    "code",
    "chat",
    "instruct",
    "conversation",
    "text-generation",
    "conversational",
    "causal-lm",
    "question-answering",
    "summarization",
    "translation",
    "text2text-generation",
    "fill-mask",
];
