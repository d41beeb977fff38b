//! 运行状态：AgentState 与阶段 / 终止原因
//!
//! 状态只由 AgentController 在两轮之间修改；状态迁移写成纯函数（State, Step) -> State，便于单测。

use serde::Serialize;

use crate::memory::HistoryEntry;

/// 控制循环阶段：Planning -> Acting -> (Planning | Terminated)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AgentPhase {
    Planning,
    Acting,
    Terminated,
}

/// 终止原因
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Termination {
    /// 模型给出 finish
    Finished { summary: String },
    /// 步数用尽且没有 finish（设计内的正常终止，不是错误）
    MaxStepsExceeded,
    /// 取消令牌在 Planning 开始时已触发
    Cancelled,
}

/// 单次运行的状态
#[derive(Clone, Debug, Serialize)]
pub struct AgentState {
    pub goal: String,
    pub step: usize,
    pub max_steps: usize,
    pub done: bool,
    pub phase: AgentPhase,
    pub history: Vec<HistoryEntry>,
    pub termination: Option<Termination>,
}

impl AgentState {
    pub fn new(goal: impl Into<String>, max_steps: usize) -> Self {
        let mut state = Self {
            goal: goal.into(),
            step: 0,
            max_steps,
            done: false,
            phase: AgentPhase::Planning,
            history: Vec::new(),
            termination: None,
        };
        // max_steps = 0 时一步都不执行
        if max_steps == 0 {
            state = state.terminate(Termination::MaxStepsExceeded);
        }
        state
    }

    pub fn begin_acting(mut self) -> Self {
        if !self.done {
            self.phase = AgentPhase::Acting;
        }
        self
    }

    /// 记录一轮结果：追加恰好一条历史、步数 +1、重新计算终止条件。
    /// 已终止的状态原样返回（步数冻结）。
    pub fn record(mut self, entry: HistoryEntry, finish_summary: Option<String>) -> Self {
        if self.done {
            return self;
        }
        self.history.push(entry);
        self.step += 1;
        if let Some(summary) = finish_summary {
            return self.terminate(Termination::Finished { summary });
        }
        if self.step >= self.max_steps {
            return self.terminate(Termination::MaxStepsExceeded);
        }
        self.phase = AgentPhase::Planning;
        self
    }

    pub fn terminate(mut self, reason: Termination) -> Self {
        if self.done {
            return self;
        }
        self.done = true;
        self.phase = AgentPhase::Terminated;
        self.termination = Some(reason);
        self
    }
}
