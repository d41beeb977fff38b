//! Planner：构造 prompt、调用 LLM、把原始输出解析为 Decision
//!
//! 解析分两段，最多两次尝试，没有其它重试：
//! 1. 严格：查找 ```json 围栏块并解析其内容；
//! 2. 回退：取原文第一个 '{' 到最后一个 '}'（含）解析。
//! 两段都失败则返回 Unparseable(原文)，由控制循环转为致命的 ModelOutputParse。

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::history::{bounded_tail, to_prompt_section};
use crate::memory::{HistoryEntry, Message};

/// 解析尝试次数（严格 + 回退）
pub const PARSE_STAGES: usize = 2;

/// 模型可选的四种动作（{"name": ..., "args": {...}}）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "args", rename_all = "snake_case")]
pub enum ToolAction {
    ReadFile {
        path: String,
    },
    WriteFile {
        path: String,
        content: String,
    },
    ExecuteCommand {
        cmd: String,
        #[serde(default, deserialize_with = "null_as_empty")]
        args: Vec<String>,
    },
    Finish {
        summary: String,
    },
}

/// args 缺省或为 null 都视为空参数列表
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl ToolAction {
    pub fn name(&self) -> &'static str {
        match self {
            ToolAction::ReadFile { .. } => "read_file",
            ToolAction::WriteFile { .. } => "write_file",
            ToolAction::ExecuteCommand { .. } => "execute_command",
            ToolAction::Finish { .. } => "finish",
        }
    }

    /// 序列化为历史中记录的 action 字符串
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.name().to_string())
    }
}

/// 一次规划结果：思考 + 动作
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub thought: String,
    pub action: ToolAction,
}

/// 解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Parsed(Decision),
    Unparseable(String),
}

fn json_fence() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)```json\s*(.*?)```").ok())
        .as_ref()
}

fn code_fence() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[a-zA-Z]*\n(.*?)```").ok())
        .as_ref()
}

/// 两段式解析模型输出
pub fn parse_decision(raw: &str) -> ParseOutcome {
    // 严格：```json 围栏
    if let Some(caps) = json_fence().and_then(|re| re.captures(raw)) {
        let body = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        if let Ok(decision) = serde_json::from_str::<Decision>(body) {
            return ParseOutcome::Parsed(decision);
        }
    }
    // 回退：首个 '{' 到最后一个 '}'
    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if end > start {
            if let Ok(decision) = serde_json::from_str::<Decision>(&raw[start..=end]) {
                return ParseOutcome::Parsed(decision);
            }
        }
    }
    ParseOutcome::Unparseable(raw.to_string())
}

/// 若内容包在 ```lang 围栏里则只取围栏内部，否则原样返回
pub fn extract_code(text: &str) -> &str {
    code_fence()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text)
}

/// 默认 system prompt：目标、四种动作、严格 JSON 格式、只用相对路径
pub fn default_system_prompt() -> String {
    [
        "You are a minimal coding agent following a ReAct loop (Thought -> Action -> Observation).",
        "Goal: build small frontend apps (vanilla HTML/CSS/JS) inside the workspace.",
        "You can ONLY use these actions: read_file(path), write_file(path, content), execute_command(cmd, args), finish(summary).",
        "Always use RELATIVE paths (e.g., index.html, main.js, styles.css) under the workspace root.",
        "Output STRICT JSON with keys thought and action; action has name and args. Example: {\"thought\":\"...\",\"action\":{\"name\":\"write_file\",\"args\":{\"path\":\"index.html\",\"content\":\"<html>...\"}}}.",
        "Use minimal, working code (no frameworks).",
        "Stop by returning action name 'finish' with a short summary when the goal appears satisfied.",
    ]
    .join("\n")
}

/// Planner：持有 LLM、system prompt 与历史窗口大小
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    history_window: usize,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: impl Into<String>, history_window: usize) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
            history_window,
        }
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    /// system + user（目标与最近 history_window 条历史）
    pub fn build_messages(&self, goal: &str, history: &[HistoryEntry]) -> Vec<Message> {
        let tail = bounded_tail(history, self.history_window);
        let user = format!(
            "Goal: {}\nHistory:{}\nNow produce the next JSON decision.",
            goal,
            to_prompt_section(tail)
        );
        vec![Message::system(self.system_prompt.clone()), Message::user(user)]
    }

    /// 返回模型原始输出
    pub async fn plan(&self, goal: &str, history: &[HistoryEntry]) -> Result<String, AgentError> {
        let messages = self.build_messages(goal, history);
        self.llm.complete(&messages).await.map_err(AgentError::Llm)
    }

    /// 规划并解析；两段都失败返回 ModelOutputParse
    pub async fn propose(&self, goal: &str, history: &[HistoryEntry]) -> Result<Decision, AgentError> {
        let raw = self.plan(goal, history).await?;
        tracing::debug!(raw = %raw, "model output");
        match parse_decision(&raw) {
            ParseOutcome::Parsed(decision) => Ok(decision),
            ParseOutcome::Unparseable(raw) => Err(AgentError::ModelOutputParse { raw }),
        }
    }
}
