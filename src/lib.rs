//! Warden - 沙箱化工具网关与 Plan / Act 智能体循环
//!
//! 模块划分：
//! - **agent**: 按配置组装工具注册表与控制器
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类、运行状态
//! - **llm**: 决策方客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 对话消息、步骤历史
//! - **observability**: tracing 初始化
//! - **react**: Planner、两段式输出解析、Plan / Act 控制循环
//! - **tools**: 工作区沙箱、命令执行器、注册表与执行器

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;

pub use react::{AgentController, RunOutcome};
