//! Warden 命令行入口
//!
//! 初始化日志、加载配置、组装控制器，对 --goal 跑一次 Plan / Act 循环，并把过程事件打印到 stdout。

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use warden::agent::{build_controller, create_llm_from_config};
use warden::config::load_config;
use warden::core::Termination;
use warden::react::ReactEvent;

#[derive(Debug, Parser)]
#[command(name = "warden", about = "Sandboxed coding agent (plan/act loop)")]
struct Cli {
    /// 要完成的目标，如 "build a todo app"
    #[arg(long)]
    goal: String,

    /// 最大步数（覆盖配置）
    #[arg(long)]
    max_steps: Option<usize>,

    /// 工作区根目录（覆盖配置与 WORKSPACE_ROOT）
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// 额外的配置文件
    #[arg(long)]
    config: Option<PathBuf>,
}

fn print_event(ev: &ReactEvent) {
    match ev {
        ReactEvent::StepUpdate { step, max_steps } => {
            println!("\nStep {}/{} - proposing next action", step + 1, max_steps)
        }
        ReactEvent::Thought { text } => println!("Thought: {text}"),
        ReactEvent::ToolCall { tool, args } => println!("Action: {tool} {args}"),
        ReactEvent::Observation { preview, .. } => println!("Observation: {preview}"),
        ReactEvent::ToolFailure { .. } => {}
        ReactEvent::Finished { summary } => println!("Finish: {summary}"),
        ReactEvent::Error { text } => eprintln!("Error: {text}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warden::observability::init();
    let cli = Cli::parse();

    let mut cfg = load_config(cli.config.clone()).context("Failed to load config")?;
    if let Some(n) = cli.max_steps {
        cfg.agent.max_steps = n;
    }
    if let Some(ws) = cli.workspace {
        cfg.app.workspace_root = ws;
    }

    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(ev) = event_rx.recv().await {
            print_event(&ev);
        }
    });

    let llm = create_llm_from_config(&cfg).context("Failed to create LLM client")?;
    let controller = build_controller(&cfg, llm)
        .context("Failed to create agent")?
        .with_event_tx(event_tx);

    println!("Goal: {}", cli.goal);
    let result = controller.run(&cli.goal).await;
    let (prompt_tokens, completion_tokens, total_tokens) = controller.token_usage();
    drop(controller);
    let _ = printer.await;

    let outcome = result.context("Agent run aborted")?;
    match &outcome.termination {
        Termination::Finished { summary } => println!("\nDone: {summary}"),
        Termination::MaxStepsExceeded => println!("\nStopped: step budget exhausted"),
        Termination::Cancelled => println!("\nStopped: cancelled"),
    }
    println!(
        "Steps: {} History entries: {}",
        outcome.state.step,
        outcome.state.history.len()
    );
    println!(
        "Tokens: prompt {} completion {} total {}",
        prompt_tokens, completion_tokens, total_tokens
    );
    Ok(())
}
