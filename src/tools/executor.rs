//! 工具执行器
//!
//! 持有 ToolRegistry，execute(tool_name, args) 调用注册表并把任何 ToolError 转为 ToolResult::Failure，
//! 这里是调度失败不再向上抛出的边界；每次调用输出结构化审计日志（JSON）。

use std::time::Instant;

use serde_json::Value;

use crate::core::ErrorKind;
use crate::tools::ToolRegistry;

/// 工具调用结果：{ok: true, text} | {ok: false, kind, message}
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResult {
    Success { text: String },
    Failure { kind: ErrorKind, message: String },
}

impl ToolResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, ToolResult::Success { .. })
    }

    pub fn to_json(&self) -> Value {
        match self {
            ToolResult::Success { text } => serde_json::json!({ "ok": true, "text": text }),
            ToolResult::Failure { kind, message } => serde_json::json!({
                "ok": false,
                "kind": kind,
                "message": message,
            }),
        }
    }
}

/// 工具执行器：注册表之上的失败收敛与审计
pub struct ToolExecutor {
    registry: ToolRegistry,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// 执行指定工具；永不返回 Err，失败以 ToolResult::Failure 表示
    pub async fn execute(&self, tool_name: &str, args: Value) -> ToolResult {
        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = match self.registry.execute(tool_name, args).await {
            Ok(text) => ToolResult::Success { text },
            Err(e) => ToolResult::Failure {
                kind: e.kind(),
                message: e.to_string(),
            },
        };

        let kind = match &result {
            ToolResult::Success { .. } => None,
            ToolResult::Failure { kind, .. } => Some(kind.as_str()),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": result.is_ok(),
            "kind": kind,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        if result.is_ok() {
            tracing::info!(audit = %audit, "tool");
        } else {
            tracing::warn!(audit = %audit, "tool");
        }
        result
    }

}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
