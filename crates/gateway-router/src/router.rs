//! # Router
//!
//! For each inbound request, decides the `(vendor, wire model id)` to route
//! to: the request path decides which client-facing schema to parse/emit,
//! but the model alias table decides the vendor, except for the Warp-only
//! `/w/` prefix which forces it.

use gateway_core::credential::Vendor;

use crate::models::model_ids;

/// Client-facing request/response schema, selected by path prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientSchema {
    /// `/v1/chat/completions` — OpenAI Chat Completions.
    OpenAiChat,
    /// `/v1/messages` or `/w/v1/messages` — Anthropic Messages.
    AnthropicMessages,
    /// `/v1beta/models/{model}:generateContent` — Gemini, non-streaming.
    GeminiGenerate,
    /// `/v1beta/models/{model}:streamGenerateContent` — Gemini, streaming.
    GeminiStream,
    /// `/w/v1/messages/proto` — Warp's native Protobuf pipeline.
    WarpProto,
}

/// Outcome of matching a request path against the known endpoint table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EndpointMatch {
    /// Schema to parse the request body / emit the response as.
    pub schema: ClientSchema,
    /// `Some(Vendor::Warp)` when the path's `/w/` prefix forces the Warp
    /// backend regardless of what the model alias table would otherwise
    /// pick; `None` lets model resolution decide the vendor.
    pub forced_vendor: Option<Vendor>,
}

/// Match an inbound request path against the gateway's known endpoints.
///
/// Returns `None` for anything not in the client-facing surface (those
/// paths are handled by the server's health/metrics/operator routes, not
/// the router).
#[must_use]
pub fn resolve_endpoint(path: &str) -> Option<EndpointMatch> {
    let (forced_vendor, rest) = match path.strip_prefix("/w/") {
        Some(rest) => (Some(Vendor::Warp), rest),
        None => (None, path.trim_start_matches('/')),
    };

    let schema = match rest {
        "v1/chat/completions" | "/v1/chat/completions" => ClientSchema::OpenAiChat,
        "v1/messages" | "/v1/messages" => ClientSchema::AnthropicMessages,
        "v1/messages/proto" | "/v1/messages/proto" => ClientSchema::WarpProto,
        other => {
            let other = other.trim_start_matches('/');
            if let Some(model_part) = other.strip_prefix("v1beta/models/") {
                if model_part.ends_with(":streamGenerateContent") {
                    ClientSchema::GeminiStream
                } else if model_part.ends_with(":generateContent") {
                    ClientSchema::GeminiGenerate
                } else {
                    return None;
                }
            } else {
                return None;
            }
        }
    };

    // `/w/v1/messages/proto` only makes sense with the Warp backend; the
    // other `/w/` endpoints reuse the Anthropic/OpenAI client schemas with
    // Warp forced as the backend vendor.
    if schema == ClientSchema::WarpProto && forced_vendor.is_none() {
        return None;
    }

    Some(EndpointMatch { schema, forced_vendor })
}

/// A resolved route: which vendor serves the request, and the wire model ID
/// to send upstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelRoute {
    /// Vendor to dispatch to.
    pub vendor: Vendor,
    /// Model ID as the vendor's wire protocol expects it.
    pub wire_model_id: String,
}

/// One row of the alias table: a client-facing model name and its wire ID
/// on each vendor that serves it.
struct AliasRow {
    alias: &'static str,
    anthropic: Option<&'static str>,
    vertex: Option<&'static str>,
}

const ALIAS_TABLE: &[AliasRow] = &[
    AliasRow {
        alias: model_ids::ALIAS_SONNET_4_5,
        anthropic: Some(model_ids::ANTHROPIC_SONNET_4_5),
        vertex: None,
    },
    AliasRow {
        alias: model_ids::ALIAS_OPUS_4_5,
        anthropic: None,
        vertex: Some(model_ids::VERTEX_OPUS_4_5),
    },
    AliasRow {
        alias: model_ids::ALIAS_HAIKU_4_5,
        anthropic: Some(model_ids::ANTHROPIC_HAIKU_4_5),
        vertex: None,
    },
    AliasRow {
        alias: model_ids::ALIAS_GEMINI_2_5_PRO,
        anthropic: None,
        vertex: Some(model_ids::VERTEX_GEMINI_2_5_PRO),
    },
    AliasRow {
        alias: model_ids::ALIAS_GEMINI_2_5_FLASH,
        anthropic: None,
        vertex: Some(model_ids::VERTEX_GEMINI_2_5_FLASH),
    },
];

fn lookup_alias(model: &str) -> Option<&'static AliasRow> {
    ALIAS_TABLE.iter().find(|row| row.alias == model)
}

/// Substring patterns checked, in order, for Warp's fuzzy model match.
const WARP_FUZZY_PATTERNS: &[(&str, &str)] = &[
    ("opus", model_ids::ANTHROPIC_OPUS_4_5),
    ("sonnet", model_ids::ANTHROPIC_SONNET_4_5),
    ("haiku", model_ids::ANTHROPIC_HAIKU_4_5),
    ("gemini", model_ids::VERTEX_GEMINI_2_5_FLASH),
    ("gpt", model_ids::WARP_GPT_4_1),
];

fn warp_wire_id(model: &str) -> &'static str {
    let lower = model.to_ascii_lowercase();
    WARP_FUZZY_PATTERNS
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map_or(model_ids::WARP_DEFAULT, |(_, wire_id)| *wire_id)
}

/// Resolve a client-supplied model string to a vendor and wire ID.
///
/// `forced_vendor` comes from [`resolve_endpoint`] (the `/w/` prefix); when
/// set, it overrides whatever vendor the alias table would otherwise pick.
/// `is_gemini_schema` additionally biases the fallback default toward the
/// Gemini wire shape on Vertex, since a `generateContent` request with an
/// unrecognized model must still resolve to a Gemini model, not a Claude one.
#[must_use]
pub fn resolve_model(model: &str, forced_vendor: Option<Vendor>, is_gemini_schema: bool) -> ModelRoute {
    if forced_vendor == Some(Vendor::Warp) {
        return ModelRoute { vendor: Vendor::Warp, wire_model_id: warp_wire_id(model).to_string() };
    }

    if let Some(row) = lookup_alias(model) {
        if let Some(vendor) = forced_vendor {
            let wire_model_id = match vendor {
                Vendor::Anthropic => row.anthropic.or(row.vertex),
                Vendor::Vertex => row.vertex.or(row.anthropic),
                Vendor::Warp => None,
            };
            if let Some(id) = wire_model_id {
                return ModelRoute { vendor, wire_model_id: id.to_string() };
            }
        }
        if let Some(id) = row.anthropic {
            return ModelRoute { vendor: Vendor::Anthropic, wire_model_id: id.to_string() };
        }
        if let Some(id) = row.vertex {
            return ModelRoute { vendor: Vendor::Vertex, wire_model_id: id.to_string() };
        }
    }

    // Unrecognized model: fall back to a documented default per vendor.
    match forced_vendor {
        Some(Vendor::Anthropic) => {
            ModelRoute { vendor: Vendor::Anthropic, wire_model_id: model_ids::ANTHROPIC_DEFAULT.to_string() }
        }
        Some(Vendor::Vertex) | None if is_gemini_schema => ModelRoute {
            vendor: Vendor::Vertex,
            wire_model_id: model_ids::VERTEX_GEMINI_DEFAULT.to_string(),
        },
        Some(Vendor::Vertex) => {
            ModelRoute { vendor: Vendor::Vertex, wire_model_id: model_ids::VERTEX_DEFAULT.to_string() }
        }
        Some(Vendor::Warp) | None => {
            ModelRoute { vendor: Vendor::Anthropic, wire_model_id: model_ids::ANTHROPIC_DEFAULT.to_string() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── resolve_endpoint ──────────────────────────────────────────────

    #[test]
    fn openai_chat_endpoint() {
        let m = resolve_endpoint("/v1/chat/completions").unwrap();
        assert_eq!(m.schema, ClientSchema::OpenAiChat);
        assert_eq!(m.forced_vendor, None);
    }

    #[test]
    fn anthropic_messages_endpoint() {
        let m = resolve_endpoint("/v1/messages").unwrap();
        assert_eq!(m.schema, ClientSchema::AnthropicMessages);
        assert_eq!(m.forced_vendor, None);
    }

    #[test]
    fn warp_messages_endpoint_forces_warp() {
        let m = resolve_endpoint("/w/v1/messages").unwrap();
        assert_eq!(m.schema, ClientSchema::AnthropicMessages);
        assert_eq!(m.forced_vendor, Some(Vendor::Warp));
    }

    #[test]
    fn warp_chat_endpoint_forces_warp() {
        let m = resolve_endpoint("/w/v1/chat/completions").unwrap();
        assert_eq!(m.schema, ClientSchema::OpenAiChat);
        assert_eq!(m.forced_vendor, Some(Vendor::Warp));
    }

    #[test]
    fn warp_proto_endpoint() {
        let m = resolve_endpoint("/w/v1/messages/proto").unwrap();
        assert_eq!(m.schema, ClientSchema::WarpProto);
        assert_eq!(m.forced_vendor, Some(Vendor::Warp));
    }

    #[test]
    fn proto_endpoint_without_warp_prefix_is_unknown() {
        assert!(resolve_endpoint("/v1/messages/proto").is_none());
    }

    #[test]
    fn gemini_generate_endpoint() {
        let m = resolve_endpoint("/v1beta/models/gemini-2.5-pro:generateContent").unwrap();
        assert_eq!(m.schema, ClientSchema::GeminiGenerate);
    }

    #[test]
    fn gemini_stream_endpoint() {
        let m = resolve_endpoint("/v1beta/models/gemini-2.5-flash:streamGenerateContent").unwrap();
        assert_eq!(m.schema, ClientSchema::GeminiStream);
    }

    #[test]
    fn unknown_path_is_none() {
        assert!(resolve_endpoint("/api/anthropic/credentials").is_none());
        assert!(resolve_endpoint("/health").is_none());
    }

    // ── resolve_model ─────────────────────────────────────────────────

    #[test]
    fn sonnet_alias_resolves_to_anthropic_direct() {
        let route = resolve_model(model_ids::ALIAS_SONNET_4_5, None, false);
        assert_eq!(route.vendor, Vendor::Anthropic);
        assert_eq!(route.wire_model_id, model_ids::ANTHROPIC_SONNET_4_5);
    }

    #[test]
    fn opus_4_5_alias_resolves_to_vertex() {
        let route = resolve_model(model_ids::ALIAS_OPUS_4_5, None, false);
        assert_eq!(route.vendor, Vendor::Vertex);
        assert_eq!(route.wire_model_id, model_ids::VERTEX_OPUS_4_5);
    }

    #[test]
    fn gemini_alias_resolves_to_vertex() {
        let route = resolve_model(model_ids::ALIAS_GEMINI_2_5_PRO, None, true);
        assert_eq!(route.vendor, Vendor::Vertex);
        assert_eq!(route.wire_model_id, model_ids::VERTEX_GEMINI_2_5_PRO);
    }

    #[test]
    fn unknown_model_falls_back_to_anthropic_default() {
        let route = resolve_model("some-unheard-of-model", None, false);
        assert_eq!(route.vendor, Vendor::Anthropic);
        assert_eq!(route.wire_model_id, model_ids::ANTHROPIC_DEFAULT);
    }

    #[test]
    fn unknown_model_on_gemini_schema_falls_back_to_gemini_default() {
        let route = resolve_model("some-unheard-of-model", None, true);
        assert_eq!(route.vendor, Vendor::Vertex);
        assert_eq!(route.wire_model_id, model_ids::VERTEX_GEMINI_DEFAULT);
    }

    #[test]
    fn warp_prefix_forces_warp_even_for_a_vertex_only_alias() {
        let route = resolve_model(model_ids::ALIAS_OPUS_4_5, Some(Vendor::Warp), false);
        assert_eq!(route.vendor, Vendor::Warp);
    }

    #[test]
    fn warp_fuzzy_match_sonnet() {
        let route = resolve_model("claude-sonnet-unknown-variant", Some(Vendor::Warp), false);
        assert_eq!(route.vendor, Vendor::Warp);
        assert_eq!(route.wire_model_id, model_ids::ANTHROPIC_SONNET_4_5);
    }

    #[test]
    fn warp_fuzzy_match_gpt() {
        let route = resolve_model("gpt-4", Some(Vendor::Warp), false);
        assert_eq!(route.vendor, Vendor::Warp);
        assert_eq!(route.wire_model_id, model_ids::WARP_GPT_4_1);
    }

    #[test]
    fn warp_fuzzy_match_gemini() {
        let route = resolve_model("gemini-whatever", Some(Vendor::Warp), false);
        assert_eq!(route.wire_model_id, model_ids::VERTEX_GEMINI_2_5_FLASH);
    }

    #[test]
    fn warp_unmatched_falls_back_to_default() {
        let route = resolve_model("totally-unknown", Some(Vendor::Warp), false);
        assert_eq!(route.vendor, Vendor::Warp);
        assert_eq!(route.wire_model_id, model_ids::WARP_DEFAULT);
    }
}
