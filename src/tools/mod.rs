//! 工具网关：沙箱路径校验、命令执行、注册表与执行器

pub mod executor;
pub mod filesystem;
pub mod registry;
pub mod sandbox;
pub mod shell;

pub use executor::{ToolExecutor, ToolResult};
pub use filesystem::{ReadFileTool, WriteFileTool, DEFAULT_MAX_FILE_BYTES};
pub use registry::{Tool, ToolRegistry};
pub use sandbox::{ResolvedPath, WorkspaceSandbox};
pub use shell::{
    CommandExecutor, CommandOutput, ExecuteCommandTool, DEFAULT_ALLOWED_COMMANDS,
    DEFAULT_EXEC_TIMEOUT_MS, DEFAULT_OUTPUT_TAIL_BYTES,
};
