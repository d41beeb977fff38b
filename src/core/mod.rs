//! 核心类型：错误分类、运行状态

pub mod error;
pub mod state;

pub use error::{AgentError, ErrorKind, ToolError};
pub use state::{AgentPhase, AgentState, Termination};
