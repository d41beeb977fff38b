//! Agent 组装
//!
//! build_registry 按配置注册 read_file / write_file / execute_command；
//! build_controller 把 LLM、Planner、ToolExecutor 组装成 AgentController。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::AgentError;
use crate::llm::{LlmClient, OpenAiClient};
use crate::react::{default_system_prompt, AgentController, Planner};
use crate::tools::{
    CommandExecutor, ExecuteCommandTool, ReadFileTool, ToolExecutor, ToolRegistry,
    WorkspaceSandbox, WriteFileTool, DEFAULT_ALLOWED_COMMANDS,
};

/// 创建沙箱并注册三个工具；工作区目录不存在时先创建
pub fn build_registry(cfg: &AppConfig) -> Result<ToolRegistry, AgentError> {
    std::fs::create_dir_all(&cfg.app.workspace_root).map_err(|e| {
        AgentError::Config(format!(
            "cannot create workspace {}: {e}",
            cfg.app.workspace_root.display()
        ))
    })?;
    let sandbox = Arc::new(
        WorkspaceSandbox::new(&cfg.app.workspace_root)
            .map_err(|e| AgentError::Config(e.to_string()))?,
    );
    tracing::info!(root = %sandbox.root().display(), "workspace sandbox ready");

    let executor = CommandExecutor::new(
        DEFAULT_ALLOWED_COMMANDS.iter().copied(),
        cfg.tools.exec_timeout_ms,
        cfg.tools.output_tail_bytes,
    );

    let mut tools = ToolRegistry::new();
    tools.register(ReadFileTool::new(sandbox.clone(), cfg.tools.max_file_bytes));
    tools.register(WriteFileTool::new(sandbox.clone(), cfg.tools.max_file_bytes));
    tools.register(ExecuteCommandTool::new(sandbox, executor));
    Ok(tools)
}

/// 由配置创建 OpenAI 兼容客户端；没有 api_key（OPENAI_API_KEY）时直接报错
pub fn create_llm_from_config(cfg: &AppConfig) -> Result<Arc<dyn LlmClient>, AgentError> {
    let api_key = cfg
        .llm
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| AgentError::Config("OPENAI_API_KEY is required".to_string()))?;
    Ok(Arc::new(
        OpenAiClient::new(cfg.llm.base_url.as_deref(), &cfg.llm.model, api_key)
            .with_temperature(cfg.llm.temperature)
            .with_json_mode(cfg.llm.json_mode),
    ))
}

/// 组装控制器
pub fn build_controller(
    cfg: &AppConfig,
    llm: Arc<dyn LlmClient>,
) -> Result<AgentController, AgentError> {
    let registry = build_registry(cfg)?;
    let planner = Planner::new(llm, default_system_prompt(), cfg.agent.history_window);
    Ok(AgentController::new(
        planner,
        ToolExecutor::new(registry),
        cfg.agent.max_steps,
    ))
}
