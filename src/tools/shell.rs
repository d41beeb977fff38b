//! 命令执行器：白名单命令，在沙箱目录内直接 spawn（不经过 sh -c）
//!
//! stdout / stderr 边读边写入尾部缓冲（只保留最后 N 字节）；墙钟超时从 spawn 开始计时，
//! 到期直接 SIGKILL，结果 exit_code 为 None。非零退出码是正常结果，不是错误。

use std::collections::HashSet;
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::core::ToolError;
use crate::tools::registry::{parse_args, schema_of};
use crate::tools::{ResolvedPath, Tool, WorkspaceSandbox};

/// 允许执行的命令（部署时决定，运行期不可修改）
pub const DEFAULT_ALLOWED_COMMANDS: &[&str] = &["node", "npm", "npx"];
/// 默认超时 30s
pub const DEFAULT_EXEC_TIMEOUT_MS: u64 = 30_000;
/// stdout / stderr 各保留的尾部字节数
pub const DEFAULT_OUTPUT_TAIL_BYTES: usize = 4000;
/// 进程被杀后等待管道读完的时间（孙进程可能仍持有管道）
const DRAIN_GRACE: Duration = Duration::from_millis(200);
const READ_CHUNK: usize = 8 * 1024;

/// 只保留最后 limit 字节的缓冲区
#[derive(Debug)]
pub struct TailBuffer {
    buf: VecDeque<u8>,
    limit: usize,
}

impl TailBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(limit.min(READ_CHUNK)),
            limit,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        if chunk.len() >= self.limit {
            self.buf.clear();
            self.buf.extend(&chunk[chunk.len() - self.limit..]);
            return;
        }
        self.buf.extend(chunk);
        let overflow = self.buf.len().saturating_sub(self.limit);
        self.buf.drain(..overflow);
    }

    /// 转为字符串；跳过开头被截断的 UTF-8 续字节，保证结果不超过 limit 字节
    pub fn to_string_lossy(&self) -> String {
        let bytes: Vec<u8> = self.buf.iter().copied().collect();
        let start = bytes
            .iter()
            .position(|b| (b & 0b1100_0000) != 0b1000_0000)
            .unwrap_or(bytes.len());
        let mut text = String::from_utf8_lossy(&bytes[start..]).into_owned();
        // 非法字节被替换为 U+FFFD（3 字节），解码后可能变长，按字符边界从头部再裁一次
        if text.len() > self.limit {
            let mut cut = text.len() - self.limit;
            while !text.is_char_boundary(cut) {
                cut += 1;
            }
            text.drain(..cut);
        }
        text
    }
}

/// 一次命令执行的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// 被超时杀掉或被信号终止时为 None
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip)]
    pub timed_out: bool,
}

/// 命令执行器：白名单、超时、输出尾部截断
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    allowed_commands: HashSet<String>,
    timeout: Duration,
    tail_bytes: usize,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(
            DEFAULT_ALLOWED_COMMANDS.iter().copied(),
            DEFAULT_EXEC_TIMEOUT_MS,
            DEFAULT_OUTPUT_TAIL_BYTES,
        )
    }
}

impl CommandExecutor {
    pub fn new<I, S>(allowed_commands: I, timeout_ms: u64, tail_bytes: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_commands: allowed_commands.into_iter().map(Into::into).collect(),
            timeout: Duration::from_millis(timeout_ms),
            tail_bytes,
        }
    }

    pub fn is_allowed(&self, cmd: &str) -> bool {
        self.allowed_commands.contains(cmd)
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// 在 cwd 下执行命令；只有白名单拒绝与 spawn / wait 失败会返回 Err
    pub async fn run(
        &self,
        cmd: &str,
        args: &[String],
        cwd: &ResolvedPath,
    ) -> Result<CommandOutput, ToolError> {
        if !self.is_allowed(cmd) {
            return Err(ToolError::CommandNotAllowed(cmd.to_string()));
        }

        tracing::info!(cmd = %cmd, args = ?args, cwd = %cwd, "execute_command spawn");
        let started = Instant::now();
        let mut child = Command::new(cmd)
            .args(args)
            .current_dir(cwd.as_path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::ExecutionFailed(format!("failed to spawn {cmd}: {e}")))?;

        let stdout = Arc::new(Mutex::new(TailBuffer::new(self.tail_bytes)));
        let stderr = Arc::new(Mutex::new(TailBuffer::new(self.tail_bytes)));
        let stdout_task = child
            .stdout
            .take()
            .map(|pipe| tokio::spawn(capture(pipe, stdout.clone())));
        let stderr_task = child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(capture(pipe, stderr.clone())));

        // 正常退出时 timeout 的计时器随 future 一起丢弃
        let waited = tokio::time::timeout(self.timeout, child.wait()).await;
        let (code, timed_out) = match waited {
            Ok(status) => {
                let status = status
                    .map_err(|e| ToolError::ExecutionFailed(format!("failed to wait for {cmd}: {e}")))?;
                (status.code(), false)
            }
            Err(_) => {
                tracing::warn!(
                    cmd = %cmd,
                    timeout_ms = self.timeout_ms(),
                    "execute_command timed out, killing"
                );
                if let Err(e) = child.kill().await {
                    tracing::warn!(cmd = %cmd, error = %e, "kill failed");
                }
                (None, true)
            }
        };

        finish_capture(stdout_task).await;
        finish_capture(stderr_task).await;

        let output = CommandOutput {
            code,
            stdout: snapshot(&stdout),
            stderr: snapshot(&stderr),
            timed_out,
        };
        tracing::info!(
            cmd = %cmd,
            code = ?output.code,
            timed_out,
            duration_ms = started.elapsed().as_millis() as u64,
            "execute_command finished"
        );
        Ok(output)
    }
}

async fn capture<R: AsyncRead + Unpin>(mut pipe: R, sink: Arc<Mutex<TailBuffer>>) {
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => sink
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(&chunk[..n]),
        }
    }
}

async fn finish_capture(task: Option<JoinHandle<()>>) {
    if let Some(mut handle) = task {
        if tokio::time::timeout(DRAIN_GRACE, &mut handle).await.is_err() {
            handle.abort();
        }
    }
}

fn snapshot(buf: &Mutex<TailBuffer>) -> String {
    buf.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .to_string_lossy()
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteCommandArgs {
    /// 命令名，必须在白名单内
    #[schemars(length(min = 1))]
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// 工作目录（相对工作区）
    pub base: Option<String>,
}

/// execute_command：返回 {"code", "stdout", "stderr"} JSON 文本；超时转为 CommandTimeout
pub struct ExecuteCommandTool {
    sandbox: Arc<WorkspaceSandbox>,
    executor: CommandExecutor,
}

impl ExecuteCommandTool {
    pub fn new(sandbox: Arc<WorkspaceSandbox>, executor: CommandExecutor) -> Self {
        Self { sandbox, executor }
    }
}

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn name(&self) -> &str {
        "execute_command"
    }

    fn description(&self) -> &str {
        "Run an allowed command with arguments in the workspace. Args: {\"cmd\": \"node\", \"args\": [\"main.js\"]}"
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<ExecuteCommandArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: ExecuteCommandArgs = parse_args(args)?;
        // 白名单先于目录解析，拒绝时不触碰文件系统
        if !self.executor.is_allowed(&args.cmd) {
            return Err(ToolError::CommandNotAllowed(args.cmd));
        }
        let cwd = self.sandbox.resolve_base(args.base.as_deref())?;
        let output = self.executor.run(&args.cmd, &args.args, &cwd).await?;
        let text = serde_json::to_string(&output)
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        if output.timed_out {
            return Err(ToolError::CommandTimeout {
                timeout_ms: self.executor.timeout_ms(),
                partial: text,
            });
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn workspace() -> (tempfile::TempDir, Arc<WorkspaceSandbox>) {
        let dir = tempfile::Builder::new().prefix("warden-sh").tempdir().unwrap();
        let sandbox = Arc::new(WorkspaceSandbox::new(dir.path()).unwrap());
        (dir, sandbox)
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_tail_buffer_keeps_last_bytes() {
        let mut tail = TailBuffer::new(5);
        tail.push(b"abc");
        tail.push(b"defg");
        assert_eq!(tail.to_string_lossy(), "cdefg");
        tail.push(b"0123456789");
        assert_eq!(tail.to_string_lossy(), "56789");
    }

    #[test]
    fn test_tail_buffer_skips_split_char() {
        let mut tail = TailBuffer::new(4);
        // "é" 为两字节，截断后只剩续字节，应被跳过
        tail.push("aéxyz".as_bytes());
        let s = tail.to_string_lossy();
        assert_eq!(s, "xyz");
        assert!(s.len() <= 4);
    }

    #[test]
    fn test_tail_buffer_invalid_bytes_stay_within_limit() {
        let mut tail = TailBuffer::new(100);
        tail.push(&[0xFF; 500]);
        let s = tail.to_string_lossy();
        assert!(s.len() <= 100, "{} bytes", s.len());
        assert!(s.chars().all(|c| c == char::REPLACEMENT_CHARACTER));
        assert_eq!(s.chars().count(), 33);

        let mut mixed = TailBuffer::new(8);
        mixed.push(b"ok\xFE\xFEdone");
        let s = mixed.to_string_lossy();
        assert!(s.len() <= 8, "{s:?}");
        assert!(s.ends_with("done"));
    }

    #[tokio::test]
    async fn test_disallowed_command_rejected() {
        let (_dir, sb) = workspace();
        let exec = CommandExecutor::default();
        let cwd = sb.resolve_base(None).unwrap();
        let err = exec
            .run("rm", &["-rf".to_string(), "/".to_string()], &cwd)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::CommandNotAllowed(cmd) if cmd == "rm"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_not_an_error() {
        let (_dir, sb) = workspace();
        let exec = CommandExecutor::new(["sh"], 5_000, 4000);
        let cwd = sb.resolve_base(None).unwrap();
        let out = exec
            .run("sh", &sh("echo out; echo err 1>&2; exit 3"), &cwd)
            .await
            .unwrap();
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
        assert!(!out.timed_out);
    }

    #[tokio::test]
    async fn test_runs_in_workspace_dir() {
        let (dir, sb) = workspace();
        std::fs::create_dir_all(dir.path().join("app")).unwrap();
        std::fs::write(dir.path().join("app/marker.txt"), "").unwrap();
        let exec = CommandExecutor::new(["ls"], 5_000, 4000);
        let cwd = sb.resolve_base(Some("app")).unwrap();
        let out = exec.run("ls", &[], &cwd).await.unwrap();
        assert_eq!(out.code, Some(0));
        assert!(out.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_output_truncated_to_tail() {
        let (_dir, sb) = workspace();
        let exec = CommandExecutor::new(["sh"], 5_000, 100);
        let cwd = sb.resolve_base(None).unwrap();
        let script = "i=0; while [ $i -lt 500 ]; do echo line$i; i=$((i+1)); done; echo END";
        let out = exec.run("sh", &sh(script), &cwd).await.unwrap();
        assert!(out.stdout.len() <= 100);
        assert!(out.stdout.ends_with("END\n"));
        assert!(!out.stdout.contains("line0\n"));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let (_dir, sb) = workspace();
        let exec = CommandExecutor::new(["sleep"], 300, 100);
        let cwd = sb.resolve_base(None).unwrap();
        let started = Instant::now();
        let out = exec.run("sleep", &["5".to_string()], &cwd).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(out.timed_out);
        assert_eq!(out.code, None);
        assert!(out.stdout.len() <= 100 && out.stderr.len() <= 100);
    }

    #[tokio::test]
    async fn test_tool_reports_timeout_with_partial_output() {
        let (_dir, sb) = workspace();
        let tool = ExecuteCommandTool::new(sb, CommandExecutor::new(["sh"], 300, 100));
        let err = tool
            .execute(json!({"cmd": "sh", "args": ["-c", "echo started; exec sleep 5"]}))
            .await
            .unwrap_err();
        match err {
            ToolError::CommandTimeout { timeout_ms, partial } => {
                assert_eq!(timeout_ms, 300);
                let v: Value = serde_json::from_str(&partial).unwrap();
                assert_eq!(v["code"], Value::Null);
                assert_eq!(v["stdout"], "started\n");
            }
            other => panic!("expected CommandTimeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_tool_result_json_and_default_args() {
        let (_dir, sb) = workspace();
        let tool = ExecuteCommandTool::new(sb, CommandExecutor::new(["pwd"], 5_000, 4000));
        let text = tool.execute(json!({"cmd": "pwd"})).await.unwrap();
        let v: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["code"], 0);
        assert!(v.get("timed_out").is_none());
    }

    #[tokio::test]
    async fn test_tool_rejects_escaping_base() {
        let (_dir, sb) = workspace();
        let tool = ExecuteCommandTool::new(sb, CommandExecutor::new(["pwd"], 5_000, 4000));
        let err = tool
            .execute(json!({"cmd": "pwd", "base": "../.."}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PathEscape(_)));
    }
}
