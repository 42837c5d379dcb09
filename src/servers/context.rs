use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{LedgerError, Result};
use crate::mcp::{decode_args, tool_schema, Content, McpServer, ToolDef, ToolOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContextType {
    Conversation,
    System,
    Knowledge,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContextSegment {
    content: String,
    context_type: ContextType,
    added: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextVersion {
    id: usize,
    label: String,
    created: DateTime<Utc>,
    segment_count: usize,
    total_chars: usize,
    #[serde(skip)]
    segments: Vec<ContextSegment>,
}

/// In-memory, per-process context state. Nothing persists beyond the
/// versions recorded here.
#[derive(Debug, Default)]
struct ContextState {
    segments: Vec<ContextSegment>,
    versions: Vec<ContextVersion>,
    next_version_id: usize,
}

impl ContextState {
    fn total_chars(&self) -> usize {
        self.segments.iter().map(|s| s.content.chars().count()).sum()
    }
}

type Shared = Arc<Mutex<ContextState>>;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AddContextArgs {
    content: String,
    context_type: ContextType,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SummarizeArgs {
    /// Per-segment character budget for the summary, default 200.
    max_chars: Option<usize>,
    /// Replace the live context with the summary instead of just returning it.
    apply: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct OptimizeArgs {
    /// Total character budget; oldest conversation segments are dropped
    /// first, system and knowledge segments are kept.
    target_chars: usize,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CreateVersionArgs {
    label: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RestoreVersionArgs {
    version_id: usize,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct NoArgs {}

/// Head-and-tail extract of one segment, deterministic by construction.
fn summarize_segment(content: &str, max_chars: usize) -> String {
    let chars: Vec<char> = content.chars().collect();
    if chars.len() <= max_chars {
        return content.to_string();
    }
    let half = max_chars / 2;
    let head: String = chars[..half].iter().collect();
    let tail: String = chars[chars.len() - half..].iter().collect();
    format!("{} … {}", head.trim_end(), tail.trim_start())
}

fn ok_json(payload: serde_json::Value) -> Result<ToolOutput> {
    Ok(ToolOutput::success(vec![Content::json(&payload)?]))
}

/// Builds the Context Manager tool server.
pub fn build_server() -> McpServer {
    let mut server = McpServer::new("context-manager", env!("CARGO_PKG_VERSION"))
        .with_instructions(
            "Manages an opaque text context: add, summarize, clean, optimize, \
             snapshot and restore. State lives in this process only.",
        );
    let state: Shared = Arc::new(Mutex::new(ContextState::default()));

    let s = Arc::clone(&state);
    server.tools.register(ToolDef {
        name: "add_context".to_string(),
        description: "Append a context segment of a given type".to_string(),
        input_schema: tool_schema::<AddContextArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&s);
            async move {
                let args: AddContextArgs = decode_args(args)?;
                if args.content.trim().is_empty() {
                    return Err(LedgerError::Validation("content must not be empty".to_string()));
                }
                let mut state = state.lock().await;
                state.segments.push(ContextSegment {
                    content: args.content,
                    context_type: args.context_type,
                    added: Utc::now(),
                });
                let total = state.total_chars();
                ok_json(serde_json::json!({
                    "success": true,
                    "segmentCount": state.segments.len(),
                    "totalChars": total,
                }))
            }
            .boxed()
        }),
    });

    let s = Arc::clone(&state);
    server.tools.register(ToolDef {
        name: "summarize_context".to_string(),
        description: "Produce a head-and-tail summary, optionally replacing the context"
            .to_string(),
        input_schema: tool_schema::<SummarizeArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&s);
            async move {
                let args: SummarizeArgs = decode_args(args)?;
                let max_chars = args.max_chars.unwrap_or(200);
                let mut state = state.lock().await;
                let summary: Vec<String> = state
                    .segments
                    .iter()
                    .map(|segment| summarize_segment(&segment.content, max_chars))
                    .collect();
                let combined = summary.join("\n");
                if args.apply.unwrap_or(false) {
                    state.segments = vec![ContextSegment {
                        content: combined.clone(),
                        context_type: ContextType::Mixed,
                        added: Utc::now(),
                    }];
                }
                ok_json(serde_json::json!({ "success": true, "summary": combined }))
            }
            .boxed()
        }),
    });

    let s = Arc::clone(&state);
    server.tools.register(ToolDef {
        name: "clean_context".to_string(),
        description: "Drop duplicate segments and collapse whitespace".to_string(),
        input_schema: tool_schema::<NoArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&s);
            async move {
                let _: NoArgs = decode_args(args)?;
                let mut state = state.lock().await;
                let before = state.segments.len();
                let mut seen = std::collections::HashSet::new();
                state.segments.retain_mut(|segment| {
                    segment.content = segment.content.split_whitespace().collect::<Vec<_>>().join(" ");
                    seen.insert(segment.content.clone())
                });
                let removed = before - state.segments.len();
                ok_json(serde_json::json!({
                    "success": true,
                    "removedSegments": removed,
                    "segmentCount": state.segments.len(),
                }))
            }
            .boxed()
        }),
    });

    let s = Arc::clone(&state);
    server.tools.register(ToolDef {
        name: "optimize_context".to_string(),
        description: "Trim oldest conversation segments to a character budget".to_string(),
        input_schema: tool_schema::<OptimizeArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&s);
            async move {
                let args: OptimizeArgs = decode_args(args)?;
                let mut state = state.lock().await;
                let mut dropped = 0usize;
                while state.total_chars() > args.target_chars {
                    let Some(position) = state
                        .segments
                        .iter()
                        .position(|s| s.context_type == ContextType::Conversation)
                    else {
                        break;
                    };
                    state.segments.remove(position);
                    dropped += 1;
                }
                let total = state.total_chars();
                ok_json(serde_json::json!({
                    "success": true,
                    "droppedSegments": dropped,
                    "totalChars": total,
                }))
            }
            .boxed()
        }),
    });

    let s = Arc::clone(&state);
    server.tools.register(ToolDef {
        name: "create_context_version".to_string(),
        description: "Snapshot the current context".to_string(),
        input_schema: tool_schema::<CreateVersionArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&s);
            async move {
                let args: CreateVersionArgs = decode_args(args)?;
                let mut state = state.lock().await;
                state.next_version_id += 1;
                let id = state.next_version_id;
                let version = ContextVersion {
                    id,
                    label: args.label.unwrap_or_else(|| format!("version-{}", id)),
                    created: Utc::now(),
                    segment_count: state.segments.len(),
                    total_chars: state.total_chars(),
                    segments: state.segments.clone(),
                };
                state.versions.push(version);
                ok_json(serde_json::json!({ "success": true, "versionId": id }))
            }
            .boxed()
        }),
    });

    let s = Arc::clone(&state);
    server.tools.register(ToolDef {
        name: "restore_context_version".to_string(),
        description: "Replace the live context with a snapshot".to_string(),
        input_schema: tool_schema::<RestoreVersionArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&s);
            async move {
                let args: RestoreVersionArgs = decode_args(args)?;
                let mut state = state.lock().await;
                let segments = state
                    .versions
                    .iter()
                    .find(|v| v.id == args.version_id)
                    .map(|v| v.segments.clone())
                    .ok_or_else(|| {
                        LedgerError::NotFound(format!(
                            "context version {} not found",
                            args.version_id
                        ))
                    })?;
                state.segments = segments;
                ok_json(serde_json::json!({
                    "success": true,
                    "versionId": args.version_id,
                    "segmentCount": state.segments.len(),
                }))
            }
            .boxed()
        }),
    });

    let s = Arc::clone(&state);
    server.tools.register(ToolDef {
        name: "list_context_versions".to_string(),
        description: "List recorded snapshots".to_string(),
        input_schema: tool_schema::<NoArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&s);
            async move {
                let _: NoArgs = decode_args(args)?;
                let state = state.lock().await;
                ok_json(serde_json::json!({
                    "success": true,
                    "count": state.versions.len(),
                    "versions": state.versions,
                }))
            }
            .boxed()
        }),
    });

    let s = Arc::clone(&state);
    server.tools.register(ToolDef {
        name: "get_context_metrics".to_string(),
        description: "Segment, character and version counts by context type".to_string(),
        input_schema: tool_schema::<NoArgs>(),
        handler: Arc::new(move |args| {
            let state = Arc::clone(&s);
            async move {
                let _: NoArgs = decode_args(args)?;
                let state = state.lock().await;
                let count_of = |t: ContextType| {
                    state.segments.iter().filter(|s| s.context_type == t).count()
                };
                ok_json(serde_json::json!({
                    "success": true,
                    "segmentCount": state.segments.len(),
                    "totalChars": state.total_chars(),
                    "byType": {
                        "conversation": count_of(ContextType::Conversation),
                        "system": count_of(ContextType::System),
                        "knowledge": count_of(ContextType::Knowledge),
                        "mixed": count_of(ContextType::Mixed),
                    },
                    "versionCount": state.versions.len(),
                }))
            }
            .boxed()
        }),
    });

    server
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn call(server: &McpServer, name: &str, args: serde_json::Value) -> serde_json::Value {
        let output = server.tools.call(name, args).await.unwrap();
        assert!(!output.is_error, "{:?}", output.content);
        match &output.content[0] {
            Content::Text { text } => serde_json::from_str(text).unwrap(),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_add_version_restore_cycle() {
        let server = build_server();
        call(
            &server,
            "add_context",
            serde_json::json!({"content": "alpha", "contextType": "conversation"}),
        )
        .await;
        let version = call(&server, "create_context_version", serde_json::json!({})).await;
        let version_id = version["versionId"].as_u64().unwrap();

        call(
            &server,
            "add_context",
            serde_json::json!({"content": "beta", "contextType": "knowledge"}),
        )
        .await;
        let metrics = call(&server, "get_context_metrics", serde_json::json!({})).await;
        assert_eq!(metrics["segmentCount"], 2);

        let restored = call(
            &server,
            "restore_context_version",
            serde_json::json!({"versionId": version_id}),
        )
        .await;
        assert_eq!(restored["segmentCount"], 1);
    }

    #[tokio::test]
    async fn test_restore_unknown_version_is_not_found() {
        let server = build_server();
        let output = server
            .tools
            .call("restore_context_version", serde_json::json!({"versionId": 42}))
            .await
            .unwrap();
        assert!(output.is_error);
        match &output.content[0] {
            Content::Text { text } => assert!(text.starts_with("NotFound:")),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clean_deduplicates_and_collapses_whitespace() {
        let server = build_server();
        for content in ["a   b", "a b", "c"] {
            call(
                &server,
                "add_context",
                serde_json::json!({"content": content, "contextType": "mixed"}),
            )
            .await;
        }
        let cleaned = call(&server, "clean_context", serde_json::json!({})).await;
        assert_eq!(cleaned["removedSegments"], 1);
        assert_eq!(cleaned["segmentCount"], 2);
    }

    #[tokio::test]
    async fn test_optimize_drops_conversation_first() {
        let server = build_server();
        call(
            &server,
            "add_context",
            serde_json::json!({"content": "x".repeat(100), "contextType": "conversation"}),
        )
        .await;
        call(
            &server,
            "add_context",
            serde_json::json!({"content": "y".repeat(100), "contextType": "system"}),
        )
        .await;
        let optimized = call(
            &server,
            "optimize_context",
            serde_json::json!({"targetChars": 100}),
        )
        .await;
        assert_eq!(optimized["droppedSegments"], 1);
        let metrics = call(&server, "get_context_metrics", serde_json::json!({})).await;
        assert_eq!(metrics["byType"]["system"], 1);
        assert_eq!(metrics["byType"]["conversation"], 0);
    }

    #[test]
    fn test_summarize_segment_keeps_short_text() {
        assert_eq!(summarize_segment("short", 10), "short");
        let long = "a".repeat(50) + &"b".repeat(50);
        let summary = summarize_segment(&long, 20);
        assert!(summary.contains('…'));
        assert!(summary.len() < long.len());
    }
}
