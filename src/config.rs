//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WARDEN__*` 覆盖（双下划线表示嵌套，如 `WARDEN__AGENT__MAX_STEPS=5`），
//! 最后叠加扁平变量 WORKSPACE_ROOT / EXEC_TIMEOUT_MS / MAX_FILE_BYTES / OPENAI_MODEL / OPENAI_BASE_URL / OPENAI_API_KEY。
//! 命令白名单不在配置中，见 tools::shell::DEFAULT_ALLOWED_COMMANDS。

use std::path::PathBuf;

use serde::Deserialize;

use crate::react::DEFAULT_MAX_STEPS;
use crate::tools::{DEFAULT_EXEC_TIMEOUT_MS, DEFAULT_MAX_FILE_BYTES, DEFAULT_OUTPUT_TAIL_BYTES};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub agent: AgentSection,
    pub tools: ToolsSection,
    pub llm: LlmSection,
}

/// [app] 段：沙箱根目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub workspace_root: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("workspace"),
        }
    }
}

/// [agent] 段：最大步数、送入 prompt 的历史条数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_steps: usize,
    pub history_window: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            history_window: 8,
        }
    }
}

/// [tools] 段：命令超时、文件大小上限、输出尾部字节数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    pub exec_timeout_ms: u64,
    pub max_file_bytes: u64,
    pub output_tail_bytes: usize,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            exec_timeout_ms: DEFAULT_EXEC_TIMEOUT_MS,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            output_tail_bytes: DEFAULT_OUTPUT_TAIL_BYTES,
        }
    }
}

/// [llm] 段：模型名、可选 base_url、temperature、是否请求 JSON 输出；api_key 通常来自 OPENAI_API_KEY
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub json_mode: bool,
    pub api_key: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            temperature: 0.0,
            json_mode: true,
            api_key: None,
        }
    }
}

/// 从 config 目录加载配置，环境变量 WARDEN__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 叠加环境变量 WARDEN__*，再叠加扁平环境变量
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "default"] {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WARDEN")
            .separator("__")
            .try_parsing(true),
    );

    let mut cfg: AppConfig = builder.build()?.try_deserialize()?;
    apply_flat_env(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

/// 扁平环境变量覆盖；lookup 便于测试时注入
pub fn apply_flat_env<F>(cfg: &mut AppConfig, lookup: F) -> Result<(), config::ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(root) = lookup("WORKSPACE_ROOT") {
        cfg.app.workspace_root = PathBuf::from(root);
    }
    if let Some(ms) = lookup("EXEC_TIMEOUT_MS") {
        cfg.tools.exec_timeout_ms = parse_number("EXEC_TIMEOUT_MS", &ms)?;
    }
    if let Some(bytes) = lookup("MAX_FILE_BYTES") {
        cfg.tools.max_file_bytes = parse_number("MAX_FILE_BYTES", &bytes)?;
    }
    if let Some(model) = lookup("OPENAI_MODEL") {
        cfg.llm.model = model;
    }
    if let Some(url) = lookup("OPENAI_BASE_URL") {
        cfg.llm.base_url = Some(url);
    }
    if let Some(key) = lookup("OPENAI_API_KEY") {
        cfg.llm.api_key = Some(key);
    }
    Ok(())
}

fn parse_number(key: &str, raw: &str) -> Result<u64, config::ConfigError> {
    raw.trim()
        .parse()
        .map_err(|e| config::ConfigError::Message(format!("{key}={raw}: {e}")))
}
