//! Prompt Resolution
//!
//! Templates are looked up by slug. Built-in defaults ship with the binary and
//! can be overridden per slug from the configuration file. Placeholders use
//! single braces: `{message}`.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::utils::error::{AppError, AppResult};

pub const ROUTING_SYSTEM: &str = "routing_system";
pub const ROUTING_USER: &str = "routing_user";
pub const REPORT_PLAN_SYSTEM: &str = "report_plan_system";
pub const REPORT_PLAN_USER: &str = "report_plan_user";
pub const DB_COMMAND_SYSTEM: &str = "db_command_system";
pub const DB_COMMAND_USER: &str = "db_command_user";
pub const DB_REFLECTION_SYSTEM: &str = "db_reflection_system";
pub const DB_REFLECTION_USER: &str = "db_reflection_user";
pub const SYNTHESIS_SYSTEM: &str = "synthesis_system";
pub const SYNTHESIS_USER: &str = "synthesis_user";
pub const GENERAL_SYSTEM: &str = "general_system";
pub const REPORT_COMPILE_SYSTEM: &str = "report_compile_system";
pub const REPORT_COMPILE_USER: &str = "report_compile_user";

/// Source of prompt templates.
pub trait PromptResolver: Send + Sync {
    /// Return the template registered under `slug`.
    fn resolve(&self, slug: &str) -> AppResult<String>;
}

/// Built-in templates plus configured overrides.
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    overrides: HashMap<String, String>,
}

impl PromptLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library with configured overrides. Overrides for slugs the pipeline
    /// never asks for are kept but logged.
    pub fn with_overrides(overrides: HashMap<String, String>) -> Self {
        for slug in overrides.keys() {
            if !Self::builtin_slugs().any(|known| known == slug.as_str()) {
                warn!(%slug, "prompt override does not match any known slug");
            }
        }
        Self { overrides }
    }

    /// All slugs with a built-in default.
    pub fn builtin_slugs() -> impl Iterator<Item = &'static str> {
        BUILTIN_PROMPTS.iter().map(|(slug, _)| *slug)
    }
}

impl PromptResolver for PromptLibrary {
    fn resolve(&self, slug: &str) -> AppResult<String> {
        if let Some(template) = self.overrides.get(slug) {
            return Ok(template.clone());
        }
        BUILTIN_PROMPTS
            .iter()
            .find(|(name, _)| *name == slug)
            .map(|(_, template)| (*template).to_string())
            .ok_or_else(|| AppError::not_found(format!("prompt '{}'", slug)))
    }
}

fn placeholder_regex() -> Option<&'static Regex> {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").ok())
        .as_ref()
}

/// Substitute `{name}` placeholders. Unknown placeholders are left intact.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let Some(re) = placeholder_regex() else {
        return template.to_string();
    };
    re.replace_all(template, |caps: &regex::Captures| {
        let name = &caps[1];
        vars.iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| (*value).to_string())
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

const BUILTIN_PROMPTS: &[(&str, &str)] = &[
    (
        ROUTING_SYSTEM,
        "You are Agent M, the routing step of a shrimp-farm operations assistant.\n\n\
Choose the agent that should handle the user message:\n\
- \"database\": the answer needs records from the farm platform (pond KPIs, FCR, SR, ADG, ABW, \
water quality, feed, harvest, alarms, counts, trends, comparisons).\n\
- \"general\": concepts, definitions, SOPs or advice that need no data lookup.\n\n\
Reply with a JSON object holding exactly \"agent\", \"reasoning\" and \"routed_input\". \
\"routed_input\" restates the user's intent clearly for the chosen agent. \
No markdown and no code fences.",
    ),
    (
        ROUTING_USER,
        "User message: {message}\n\nReply with the JSON object only.",
    ),
    (
        REPORT_PLAN_SYSTEM,
        "You are Agent M, planning a multi-section operational report.\n\n\
Split the request into at most 6 sections. Each section gets a short \"title\" and an \
imperative \"instruction\" telling the Database Agent which data to retrieve.\n\n\
Reply with JSON only:\n\
{\"title\": \"...\", \"period\": \"...\", \"format\": \"markdown\", \
\"sections\": [{\"title\": \"...\", \"instruction\": \"...\"}]}",
    ),
    (
        REPORT_PLAN_USER,
        "Request:\n{message}\n\nReply with the plan JSON only.",
    ),
    (
        DB_COMMAND_SYSTEM,
        "You are Agent M, writing one instruction for the Database Agent.\n\
Turn the user's intent into a short imperative command (\"Ambil\", \"Hitung\", \"Tampilkan\") \
naming the metrics, filters and time range to retrieve.\n\
Output only the instruction text, without explanations, markdown or code fences.",
    ),
    (
        DB_COMMAND_USER,
        "User intent:\n{message}\n\nReturn only the instruction text.",
    ),
    (
        DB_REFLECTION_SYSTEM,
        "You are Agent M, repairing a Database Agent instruction that failed.\n\
Read the error and write one corrected imperative instruction that avoids it. \
Keep the user's intent. Output only the instruction text.",
    ),
    (
        DB_REFLECTION_USER,
        "Original question:\n{question}\n\nPlan:\n{plan}\n\n\
Failed instruction:\n{instruction}\n\nError:\n{error}\n\n\
Return only the corrected instruction text.",
    ),
    (
        SYNTHESIS_SYSTEM,
        "You are Agent M, an assistant for shrimp-farm operations.\n\
You receive a user question and raw Database Agent output. Answer from that output only.\n\n\
- Think inside <think>...</think>, then give the final answer outside the tags.\n\
- Never invent numbers that are not in the results.\n\
- Lead with the key figures and include units when known.\n\
- Flag risk signals such as FCR above 1.8, SR below 70% or DO below 4 mg/L.\n\
- If the results are empty or an error, say so plainly and suggest what to check next.\n\
- Answer in Indonesian unless the user writes in another language.",
    ),
    (
        SYNTHESIS_USER,
        "Original question:\n{question}\n\nDatabase results:\n{results}\n\n\
Answer as Agent M.",
    ),
    (
        GENERAL_SYSTEM,
        "Kamu adalah Agent M, asisten AI untuk operasional tambak udang.\n\
Bantu user memahami istilah, SOP, dan rekomendasi praktis. Jawab ringkas dalam bahasa \
Indonesia kecuali diminta lain. Jika pertanyaan butuh data platform, sampaikan bahwa data \
perlu diambil dari database.\n\
Pikirkan dulu di dalam tag <think>...</think>, lalu berikan jawaban final di luar tag.",
    ),
    (
        REPORT_COMPILE_SYSTEM,
        "You are Agent M, assembling an operational report from retrieved sections.\n\
Use only the supplied section data. Reply with JSON only:\n\
{\"report\": {\"title\": \"...\", \"period\": \"...\", \"format\": \"markdown\", \
\"filename\": \"report.md\", \"content\": \"<markdown>\"}}",
    ),
    (
        REPORT_COMPILE_USER,
        "Question:\n{question}\n\nPlan:\n{plan}\n\nSections:\n{sections}\n\n\
Reply with the report JSON only.",
    ),
];
