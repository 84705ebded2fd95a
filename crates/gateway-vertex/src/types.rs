//! Wire types for the Vertex AI adapter: both the Claude-on-Vertex envelope
//! (structurally close to the Anthropic Messages API) and the Gemini
//! `generateContent`/`streamGenerateContent` shape, plus the model-alias
//! tables used to resolve a canonical model name to a Vertex publisher model
//! ID.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Static configuration for the Vertex adapter, independent of any one
/// request or credential.
#[derive(Clone, Debug)]
pub struct VertexConfig {
    /// Region used when a credential doesn't pin one (`global` routes to
    /// `us-central1` on the non-regional host per spec §4.6).
    pub default_region: String,
    /// Base host override (tests, operator-configured proxies). When set,
    /// used verbatim in place of `https://{region}-aiplatform.googleapis.com`.
    pub base_url_override: Option<String>,
    /// Maximum output tokens when the request doesn't specify one.
    pub default_max_tokens: u32,
}

impl Default for VertexConfig {
    fn default() -> Self {
        Self { default_region: "us-central1".into(), base_url_override: None, default_max_tokens: 8192 }
    }
}

/// Which Vertex publisher model family a canonical model name resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexModelFamily {
    /// `publishers/anthropic/models/{id}` — Claude-on-Vertex.
    Anthropic,
    /// `publishers/google/models/{id}` — Gemini.
    Google,
}

/// A Vertex-published model and the family it belongs to.
#[derive(Clone, Debug)]
pub struct VertexModelInfo {
    /// Canonical model ID clients send (e.g. `claude-opus-4-5`).
    pub canonical_id: &'static str,
    /// Vertex publisher model ID (e.g. `claude-opus-4-5@20251101`).
    pub vertex_id: &'static str,
    pub family: VertexModelFamily,
}

/// Known Vertex-published Claude and Gemini models.
pub const VERTEX_MODELS: &[VertexModelInfo] = &[
    VertexModelInfo { canonical_id: "claude-opus-4-5", vertex_id: "claude-opus-4-5@20251101", family: VertexModelFamily::Anthropic },
    VertexModelInfo { canonical_id: "claude-sonnet-4-5", vertex_id: "claude-sonnet-4-5@20250929", family: VertexModelFamily::Anthropic },
    VertexModelInfo { canonical_id: "claude-haiku-4-5", vertex_id: "claude-haiku-4-5@20251001", family: VertexModelFamily::Anthropic },
    VertexModelInfo { canonical_id: "gemini-2.5-pro", vertex_id: "gemini-2.5-pro", family: VertexModelFamily::Google },
    VertexModelInfo { canonical_id: "gemini-2.5-flash", vertex_id: "gemini-2.5-flash", family: VertexModelFamily::Google },
];

/// Default model used when a canonical model name doesn't match any known
/// alias.
pub const DEFAULT_VERTEX_MODEL: &str = "claude-sonnet-4-5";

/// Look up a canonical model name in the alias table, falling back to the
/// documented default.
#[must_use]
pub fn resolve_vertex_model(canonical_model: &str) -> &'static VertexModelInfo {
    VERTEX_MODELS
        .iter()
        .find(|m| m.canonical_id == canonical_model)
        .unwrap_or_else(|| VERTEX_MODELS.iter().find(|m| m.canonical_id == DEFAULT_VERTEX_MODEL).expect("default model present"))
}

/// JSON schema fields Vertex rejects on tool definitions, stripped
/// recursively before sending (distinct from the plain-Gemini set — Vertex's
/// Claude-on-Vertex path additionally dislikes annotation-only fields).
pub const VERTEX_INCOMPATIBLE_SCHEMA_FIELDS: &[&str] = &["$comment", "input_examples"];

/// JSON schema fields the plain Gemini `generateContent` API rejects.
pub const GEMINI_INCOMPATIBLE_SCHEMA_FIELDS: &[&str] = &["additionalProperties", "$schema"];

/// Maximum length of a tool result forwarded to Gemini before truncation.
pub const TOOL_RESULT_MAX_LENGTH: usize = 100_000;

/// The Claude-on-Vertex `rawPredict`/`streamRawPredict` request envelope —
/// structurally the Anthropic Messages API body with `model` dropped in
/// favor of `anthropic_version`, since the model is already selected by the
/// URL path.
#[derive(Clone, Debug, Serialize)]
pub struct VertexClaudeRequest {
    pub anthropic_version: String,
    pub max_tokens: u32,
    pub messages: Vec<gateway_anthropic::types::AnthropicMessageParam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<gateway_anthropic::types::AnthropicTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Vertex-on-Anthropic version string — distinct from Anthropic direct's
/// `anthropic-version` header value.
pub const VERTEX_ANTHROPIC_VERSION: &str = "vertex-2023-10-16";

// ─────────────────────────────────────────────────────────────────────────────
// Gemini request/response types
// ─────────────────────────────────────────────────────────────────────────────

/// One turn of a Gemini conversation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeminiContent {
    pub role: String,
    pub parts: Vec<GeminiPart>,
}

/// A single content part within a Gemini turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeminiPart {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        thought: Option<bool>,
        #[serde(rename = "thoughtSignature", skip_serializing_if = "Option::is_none")]
        thought_signature: Option<String>,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: FunctionCallData,
        #[serde(rename = "thoughtSignature", skip_serializing_if = "Option::is_none")]
        thought_signature: Option<String>,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: FunctionResponseData,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineDataContent,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionCallData {
    pub name: String,
    pub args: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionResponseData {
    pub name: String,
    pub response: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InlineDataContent {
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub data: String,
}

/// A Gemini function declaration (the wire shape of a canonical [`Tool`](gateway_core::tools::Tool)).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeminiTool {
    #[serde(rename = "functionDeclarations")]
    pub function_declarations: Vec<FunctionDeclaration>,
}

/// `systemInstruction` field of a Gemini request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemInstruction {
    pub parts: Vec<GeminiPart>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(rename = "stopSequences", skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

/// A full `generateContent`/`streamGenerateContent` request body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<SystemInstruction>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<GeminiTool>>,
}

/// One SSE chunk of a Gemini streaming response.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct GeminiStreamChunk {
    #[serde(default)]
    pub candidates: Option<Vec<GeminiCandidate>>,
    #[serde(rename = "usageMetadata", default)]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    pub error: Option<GeminiApiError>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GeminiCandidate {
    pub content: Option<GeminiCandidateContent>,
    #[serde(rename = "finishReason")]
    pub finish_reason: Option<String>,
    #[serde(rename = "safetyRatings")]
    pub safety_ratings: Option<Vec<SafetyRating>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GeminiCandidateContent {
    pub parts: Vec<GeminiPart>,
    pub role: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    pub prompt_token_count: u64,
    #[serde(rename = "candidatesTokenCount", default)]
    pub candidates_token_count: u64,
    #[serde(rename = "totalTokenCount", default)]
    pub total_token_count: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GeminiApiError {
    pub code: u32,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SafetyRating {
    pub category: HarmCategory,
    pub probability: HarmProbability,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
    #[serde(other)]
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum HarmProbability {
    #[serde(rename = "NEGLIGIBLE")]
    Negligible,
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "MEDIUM")]
    Medium,
    #[serde(rename = "HIGH")]
    High,
    #[serde(other)]
    Other,
}

/// Response of a `:countTokens` probe.
#[derive(Clone, Debug, Deserialize)]
pub struct CountTokensResponse {
    #[serde(rename = "totalTokens")]
    pub total_tokens: u64,
}
