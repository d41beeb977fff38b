//! 认知层：Planner（prompt 构造与两段式解析）、Plan / Act 控制循环、过程事件

pub mod events;
pub mod loop_;
pub mod planner;

pub use events::ReactEvent;
pub use loop_::{AgentController, RunOutcome, StepAbort, DEFAULT_MAX_STEPS};
pub use planner::{
    default_system_prompt, extract_code, parse_decision, Decision, ParseOutcome, Planner,
    ToolAction,
};
