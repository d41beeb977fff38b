//! 沙箱文件读写工具
//!
//! read_file / write_file 只接受 WorkspaceSandbox 产出的 ResolvedPath；
//! 大小上限在此检查：读前看 metadata，写前看编码后的字节数，超限不做任何写入。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::ToolError;
use crate::tools::registry::{parse_args, schema_of};
use crate::tools::{ResolvedPath, Tool, WorkspaceSandbox};

/// 默认单文件上限 256 KiB
pub const DEFAULT_MAX_FILE_BYTES: u64 = 256 * 1024;

/// 读取文本文件；超过 max_bytes 返回 FileTooLarge
pub async fn read_text(path: &ResolvedPath, max_bytes: u64) -> Result<String, ToolError> {
    let meta = tokio::fs::metadata(path.as_path())
        .await
        .map_err(|e| ToolError::Io(format!("{}: {}", path, e)))?;
    if meta.len() > max_bytes {
        return Err(ToolError::FileTooLarge {
            size: meta.len(),
            limit: max_bytes,
        });
    }
    tokio::fs::read_to_string(path.as_path())
        .await
        .map_err(|e| ToolError::Io(format!("{}: {}", path, e)))
}

/// 写入文本文件，自动创建父目录；先检查大小，超限时不创建目录也不写文件
pub async fn write_text(path: &ResolvedPath, content: &str, max_bytes: u64) -> Result<(), ToolError> {
    let size = content.len() as u64;
    if size > max_bytes {
        return Err(ToolError::FileTooLarge {
            size,
            limit: max_bytes,
        });
    }
    if let Some(parent) = path.as_path().parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path.as_path(), content)
        .await
        .map_err(|e| ToolError::Io(format!("{}: {}", path, e)))
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadFileArgs {
    /// 工作区内的相对路径
    #[schemars(length(min = 1))]
    pub path: String,
    /// 可选基准目录
    pub base: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteFileArgs {
    #[schemars(length(min = 1))]
    pub path: String,
    pub content: String,
    pub base: Option<String>,
}

/// read_file：返回文件全文
pub struct ReadFileTool {
    sandbox: Arc<WorkspaceSandbox>,
    max_file_bytes: u64,
}

impl ReadFileTool {
    pub fn new(sandbox: Arc<WorkspaceSandbox>, max_file_bytes: u64) -> Self {
        Self {
            sandbox,
            max_file_bytes,
        }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a text file within the workspace. Args: {\"path\": \"relative path\", \"base\": \"optional base dir\"}"
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<ReadFileArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: ReadFileArgs = parse_args(args)?;
        let path = self.sandbox.to_safe_path(&args.path, args.base.as_deref())?;
        tracing::info!(path = %path, "read_file tool execute");
        read_text(&path, self.max_file_bytes).await
    }
}

/// write_file：创建或覆盖文件
pub struct WriteFileTool {
    sandbox: Arc<WorkspaceSandbox>,
    max_file_bytes: u64,
}

impl WriteFileTool {
    pub fn new(sandbox: Arc<WorkspaceSandbox>, max_file_bytes: u64) -> Self {
        Self {
            sandbox,
            max_file_bytes,
        }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Create or overwrite a text file within the workspace. Args: {\"path\": \"relative path\", \"content\": \"text\"}"
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<WriteFileArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: WriteFileArgs = parse_args(args)?;
        let path = self.sandbox.to_safe_path(&args.path, args.base.as_deref())?;
        tracing::info!(path = %path, bytes = args.content.len(), "write_file tool execute");
        write_text(&path, &args.content, self.max_file_bytes).await?;
        Ok(format!("wrote {}", args.path))
    }
}
