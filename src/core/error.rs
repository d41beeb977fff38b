//! 错误类型
//!
//! ToolError：沙箱 / 执行器 / 注册表内部的失败，在 ToolExecutor 边界转为 ToolResult::Failure；
//! AgentError：控制循环级错误，只有模型输出解析失败与 LLM 调用失败会终止一次运行。

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 工具调用失败的类别（随 ToolResult::Failure 返回给调用方）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    PathEscape,
    HiddenFileRejected,
    FileTooLarge,
    CommandNotAllowed,
    CommandTimeout,
    InvalidArguments,
    ToolNotFound,
    Io,
    ExecutionFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PathEscape => "PathEscape",
            ErrorKind::HiddenFileRejected => "HiddenFileRejected",
            ErrorKind::FileTooLarge => "FileTooLarge",
            ErrorKind::CommandNotAllowed => "CommandNotAllowed",
            ErrorKind::CommandTimeout => "CommandTimeout",
            ErrorKind::InvalidArguments => "InvalidArguments",
            ErrorKind::ToolNotFound => "ToolNotFound",
            ErrorKind::Io => "Io",
            ErrorKind::ExecutionFailed => "ExecutionFailed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 工具层错误：路径逃逸、隐藏文件、超限、命令不在白名单、超时、参数错误、未知工具等
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Path escapes workspace: {0}")]
    PathEscape(String),

    #[error("Hidden files are not allowed: {0}")]
    HiddenFileRejected(String),

    #[error("File too large: {size} bytes (max: {limit})")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Command not allowed: {0}")]
    CommandNotAllowed(String),

    #[error("Command timed out after {timeout_ms}ms; partial output: {partial}")]
    CommandTimeout { timeout_ms: u64, partial: String },

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::PathEscape(_) => ErrorKind::PathEscape,
            ToolError::HiddenFileRejected(_) => ErrorKind::HiddenFileRejected,
            ToolError::FileTooLarge { .. } => ErrorKind::FileTooLarge,
            ToolError::CommandNotAllowed(_) => ErrorKind::CommandNotAllowed,
            ToolError::CommandTimeout { .. } => ErrorKind::CommandTimeout,
            ToolError::InvalidArguments(_) => ErrorKind::InvalidArguments,
            ToolError::ToolNotFound(_) => ErrorKind::ToolNotFound,
            ToolError::Io(_) => ErrorKind::Io,
            ToolError::ExecutionFailed(_) => ErrorKind::ExecutionFailed,
        }
    }
}

impl From<std::io::Error> for ToolError {
    fn from(e: std::io::Error) -> Self {
        ToolError::Io(e.to_string())
    }
}

/// 控制循环错误：ModelOutputParse / Llm 会直接返回给 run() 的调用方
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Failed to parse model output: {raw}")]
    ModelOutputParse { raw: String },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Config error: {0}")]
    Config(String),
}
