//! Catalog of metered AI models and tools.
//!
//! Each model carries the lowest plan that may use it and its credit rates.
//! Rates are expressed per million tokens so they stay integral.

use serde::Serialize;

use crate::plans::PlanType;
use crate::types::Credits;

/// A chat model the platform can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub provider: &'static str,
    /// Lowest plan tier granted access.
    pub min_plan: PlanType,
    pub credits_per_million_input: Credits,
    pub credits_per_million_output: Credits,
}

/// A non-chat feature billed at a flat credit price per use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToolInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub min_plan: PlanType,
    pub credits_per_use: Credits,
}

const fn model(
    id: &'static str,
    name: &'static str,
    provider: &'static str,
    min_plan: PlanType,
    input: Credits,
    output: Credits,
) -> ModelInfo {
    ModelInfo {
        id,
        name,
        provider,
        min_plan,
        credits_per_million_input: input,
        credits_per_million_output: output,
    }
}

pub const MODELS: &[ModelInfo] = &[
    // Free tier
    model("gpt-3.5-turbo", "GPT-3.5 Turbo", "openai", PlanType::Free, 1_000, 3_000),
    model("claude-3-haiku", "Claude 3 Haiku", "anthropic", PlanType::Free, 500, 2_500),
    model("mistral-7b", "Mistral 7B", "mistral", PlanType::Free, 200, 200),
    model("llama-2-13b", "Llama 2 13B", "meta", PlanType::Free, 300, 300),
    // Lite
    model("gemini-pro", "Gemini Pro", "google", PlanType::Lite, 1_000, 3_000),
    model("mixtral-8x7b", "Mixtral 8x7B", "mistral", PlanType::Lite, 700, 700),
    model("llama-2-70b", "Llama 2 70B", "meta", PlanType::Lite, 900, 900),
    model("openhermes-2.5", "OpenHermes 2.5", "teknium", PlanType::Lite, 300, 300),
    model("nous-hermes-2", "Nous Hermes 2", "nousresearch", PlanType::Lite, 600, 600),
    // Pro
    model("gpt-4", "GPT-4", "openai", PlanType::Pro, 30_000, 60_000),
    model("gpt-4-turbo", "GPT-4 Turbo", "openai", PlanType::Pro, 10_000, 30_000),
    model("claude-3-sonnet", "Claude 3 Sonnet", "anthropic", PlanType::Pro, 6_000, 30_000),
    model("phind-codellama-34b", "Phind CodeLlama 34B", "phind", PlanType::Pro, 800, 800),
    model("deepseek-coder", "DeepSeek Coder", "deepseek", PlanType::Pro, 300, 600),
    // Enterprise
    model("claude-3-opus", "Claude 3 Opus", "anthropic", PlanType::Enterprise, 30_000, 150_000),
    model("claude-2.1", "Claude 2.1", "anthropic", PlanType::Enterprise, 8_000, 24_000),
    model("claude-2", "Claude 2", "anthropic", PlanType::Enterprise, 8_000, 24_000),
    model("gemini-pro-vision", "Gemini Pro Vision", "google", PlanType::Enterprise, 1_000, 3_000),
    model("palm-2", "PaLM 2", "google", PlanType::Enterprise, 1_000, 2_000),
    model("codellama-70b", "CodeLlama 70B", "meta", PlanType::Enterprise, 900, 900),
    model("zephyr-7b", "Zephyr 7B", "huggingface", PlanType::Enterprise, 200, 200),
    model("wizardcoder-33b", "WizardCoder 33B", "wizardlm", PlanType::Enterprise, 800, 800),
    model("mythomist-7b", "MythoMist 7B", "gryphe", PlanType::Enterprise, 200, 200),
    model("cinematika-7b", "Cinematika 7B", "openrouter", PlanType::Enterprise, 200, 200),
    model("neural-chat-7b", "Neural Chat 7B", "intel", PlanType::Enterprise, 200, 200),
];

pub const TOOLS: &[ToolInfo] = &[
    ToolInfo {
        id: "image-generation",
        name: "Image Generation",
        min_plan: PlanType::Free,
        credits_per_use: 135,
    },
    ToolInfo {
        id: "video-transcription",
        name: "Video Transcription",
        min_plan: PlanType::Free,
        credits_per_use: 50,
    },
    ToolInfo {
        id: "voice-generation",
        name: "Voice Generation",
        min_plan: PlanType::Free,
        credits_per_use: 25,
    },
    ToolInfo {
        id: "sound-effects",
        name: "Sound Effects",
        min_plan: PlanType::Free,
        credits_per_use: 15,
    },
];

pub fn find_model(id: &str) -> Option<&'static ModelInfo> {
    MODELS.iter().find(|m| m.id == id)
}

pub fn find_tool(id: &str) -> Option<&'static ToolInfo> {
    TOOLS.iter().find(|t| t.id == id)
}

/// Whether `plan` may use the model with the given id. Unknown models are
/// never allowed.
pub fn is_model_allowed(plan: PlanType, model_id: &str) -> bool {
    find_model(model_id).is_some_and(|m| plan.rank() >= m.min_plan.rank())
}

/// Models accessible on `plan`, in catalog order.
pub fn models_for_plan(plan: PlanType) -> impl Iterator<Item = &'static ModelInfo> {
    MODELS
        .iter()
        .filter(move |m| plan.rank() >= m.min_plan.rank())
}
