//! 控制循环过程事件：用于 CLI / 前端展示步数、思考、工具调用与观察

use serde::Serialize;

use crate::core::ErrorKind;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactEvent {
    /// 步数更新（即将执行第 step + 1 步）
    StepUpdate { step: usize, max_steps: usize },
    /// 模型给出的 thought
    Thought { text: String },
    /// 调用工具
    ToolCall {
        tool: String,
        args: serde_json::Value,
    },
    /// 本轮写入历史的 observation
    Observation { tool: String, preview: String },
    /// 工具执行失败（仍会作为 observation 继续循环）
    ToolFailure {
        tool: String,
        kind: ErrorKind,
        reason: String,
    },
    /// 模型调用 finish
    Finished { summary: String },
    /// 致命错误
    Error { text: String },
}
