//! 步骤历史：每轮 Plan/Act 追加一条 HistoryEntry（thought / action / observation）
//!
//! 只追加不修改；Planner 只读取最近 N 条拼入 user 消息，防止上下文无限增长。

use serde::{Deserialize, Serialize};

/// 单轮记录（不可变）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub thought: String,
    /// 序列化后的动作 JSON
    pub action: String,
    pub observation: String,
}

impl HistoryEntry {
    pub fn new(
        thought: impl Into<String>,
        action: impl Into<String>,
        observation: impl Into<String>,
    ) -> Self {
        Self {
            thought: thought.into(),
            action: action.into(),
            observation: observation.into(),
        }
    }
}

/// 取最近 window 条
pub fn bounded_tail(history: &[HistoryEntry], window: usize) -> &[HistoryEntry] {
    let start = history.len().saturating_sub(window);
    &history[start..]
}

/// 渲染为 Prompt 片段：每条一组 Thought / Action / Observation
pub fn to_prompt_section(entries: &[HistoryEntry]) -> String {
    let mut s = String::new();
    for h in entries {
        s.push_str(&format!(
            "\nThought: {}\nAction: {}\nObservation: {}",
            h.thought, h.action, h.observation
        ));
    }
    s
}
