//! Plan / Act 主循环
//!
//! Planning：把目标与最近历史交给 Planner，得到 Decision（解析失败直接终止本次运行）；
//! Acting：通过 ToolExecutor 执行动作，任何工具失败都变成 observation 字符串；
//! 每轮恰好追加一条 HistoryEntry，步数 +1，然后重新计算终止条件（finish 或步数用尽）。
//! 可选 cancel_token 只在 Planning 开始时检查；可选 event_tx 推送 ReactEvent。

use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::core::{AgentError, AgentState, Termination};
use crate::memory::HistoryEntry;
use crate::react::planner::{extract_code, PARSE_STAGES};
use crate::react::{Planner, ReactEvent, ToolAction};
use crate::tools::{ToolExecutor, ToolResult};

/// 默认最大步数
pub const DEFAULT_MAX_STEPS: usize = 10;
/// execute_command 结果写入 observation 的最大字符数
const EXEC_OBSERVATION_CHARS: usize = 200;
/// 传给工具的基准目录
const WORKSPACE_BASE: &str = ".";

/// 一次运行的结果
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub termination: Termination,
    pub state: AgentState,
}

/// 单步中止：携带未被修改的状态（步数、历史保持中止前的样子）
#[derive(Debug, Error)]
#[error("{error}")]
pub struct StepAbort {
    pub state: AgentState,
    #[source]
    pub error: AgentError,
}

/// 控制器：独占 Planner 与 ToolExecutor，顺序执行 Plan / Act
pub struct AgentController {
    planner: Planner,
    executor: ToolExecutor,
    max_steps: usize,
    cancel_token: Option<CancellationToken>,
    event_tx: Option<UnboundedSender<ReactEvent>>,
}

impl AgentController {
    pub fn new(planner: Planner, executor: ToolExecutor, max_steps: usize) -> Self {
        Self {
            planner,
            executor,
            max_steps,
            cancel_token: None,
            event_tx: None,
        }
    }

    /// 设置取消令牌
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// 设置事件推送通道
    pub fn with_event_tx(mut self, tx: UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// 决策方累计 token 用量：(prompt, completion, total)
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.planner.token_usage()
    }

    fn send_event(&self, ev: ReactEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }

    /// 从初始状态跑到终止；只有模型输出无法解析或 LLM 调用失败时返回 Err
    pub async fn run(&self, goal: &str) -> Result<RunOutcome, AgentError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("agent_run", run_id = %run_id);
        async move {
            tracing::info!(goal = %goal, max_steps = self.max_steps, "run started");
            let mut state = AgentState::new(goal, self.max_steps);
            while !state.done {
                state = self.step(state).await.map_err(|abort| {
                    tracing::warn!(
                        steps = abort.state.step,
                        history = abort.state.history.len(),
                        error = %abort.error,
                        "run aborted"
                    );
                    abort.error
                })?;
            }
            let termination = state
                .termination
                .clone()
                .unwrap_or(Termination::MaxStepsExceeded);
            tracing::info!(
                steps = state.step,
                history = state.history.len(),
                termination = ?termination,
                "run finished"
            );
            Ok::<_, AgentError>(RunOutcome {
                run_id,
                termination,
                state,
            })
        }
        .instrument(span)
        .await
    }

    /// 执行一轮 Plan + Act；已终止的状态原样返回，规划失败时原状态随错误一起返回
    pub async fn step(&self, state: AgentState) -> Result<AgentState, StepAbort> {
        if state.done {
            return Ok(state);
        }
        if self.cancel_token.as_ref().is_some_and(|t| t.is_cancelled()) {
            tracing::info!(step = state.step, "run cancelled");
            return Ok(state.terminate(Termination::Cancelled));
        }

        self.send_event(ReactEvent::StepUpdate {
            step: state.step,
            max_steps: state.max_steps,
        });
        let proposed = self.planner.propose(&state.goal, &state.history).await;
        let decision = match proposed {
            Ok(d) => d,
            Err(error) => {
                if matches!(error, AgentError::ModelOutputParse { .. }) {
                    tracing::error!(step = state.step, stages = PARSE_STAGES, "model output unparseable");
                }
                self.send_event(ReactEvent::Error {
                    text: error.to_string(),
                });
                return Err(StepAbort { state, error });
            }
        };
        tracing::info!(step = state.step + 1, thought = %decision.thought, action = decision.action.name(), "plan");
        self.send_event(ReactEvent::Thought {
            text: decision.thought.clone(),
        });

        let state = state.begin_acting();
        let (observation, finish_summary) = self.act(&decision.action).await;
        tracing::info!(step = state.step + 1, observation = %observation, "observe");

        let entry = HistoryEntry::new(
            decision.thought,
            decision.action.to_json_string(),
            observation,
        );
        Ok(state.record(entry, finish_summary))
    }

    /// 执行动作，返回 (observation, finish 摘要)
    async fn act(&self, action: &ToolAction) -> (String, Option<String>) {
        let (tool, args) = match action {
            ToolAction::Finish { summary } => {
                self.send_event(ReactEvent::Finished {
                    summary: summary.clone(),
                });
                return (format!("finish: {summary}"), Some(summary.clone()));
            }
            ToolAction::ReadFile { path } => {
                ("read_file", json!({ "path": path, "base": WORKSPACE_BASE }))
            }
            ToolAction::WriteFile { path, content } => (
                "write_file",
                json!({ "path": path, "content": extract_code(content), "base": WORKSPACE_BASE }),
            ),
            ToolAction::ExecuteCommand { cmd, args } => (
                "execute_command",
                json!({ "cmd": cmd, "args": args, "base": WORKSPACE_BASE }),
            ),
        };

        self.send_event(ReactEvent::ToolCall {
            tool: tool.to_string(),
            args: args.clone(),
        });
        let written_chars = args
            .get("content")
            .and_then(|c| c.as_str())
            .map(|c| c.chars().count());

        let observation = match self.executor.execute(tool, args).await {
            ToolResult::Success { text } => match action {
                ToolAction::ReadFile { path } => {
                    format!("read {} ({} chars)", path, text.chars().count())
                }
                ToolAction::WriteFile { path, .. } => {
                    format!("wrote {} ({} chars)", path, written_chars.unwrap_or(0))
                }
                ToolAction::ExecuteCommand { cmd, .. } => {
                    let head: String = text.chars().take(EXEC_OBSERVATION_CHARS).collect();
                    format!("exec {cmd}: {head}")
                }
                ToolAction::Finish { .. } => text,
            },
            ToolResult::Failure { kind, message } => {
                self.send_event(ReactEvent::ToolFailure {
                    tool: tool.to_string(),
                    kind,
                    reason: message.clone(),
                });
                format!("error: {kind}: {message}")
            }
        };

        self.send_event(ReactEvent::Observation {
            tool: tool.to_string(),
            preview: observation.clone(),
        });
        (observation, None)
    }
}
