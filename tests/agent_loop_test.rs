//! 控制循环集成测试：脚本化 LLM + 临时工作区，走完整的 build_controller 装配路径

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use warden::agent::build_controller;
    use warden::config::AppConfig;
    use warden::core::{AgentError, Termination};
    use warden::llm::MockLlmClient;

    fn decision(thought: &str, action: serde_json::Value) -> String {
        serde_json::json!({ "thought": thought, "action": action }).to_string()
    }

    fn config(dir: &tempfile::TempDir, max_steps: usize) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.app.workspace_root = dir.path().join("playground");
        cfg.agent.max_steps = max_steps;
        cfg.tools.max_file_bytes = 1024;
        cfg
    }

    #[tokio::test]
    async fn test_build_page_then_finish() {
        let dir = tempfile::tempdir().unwrap();
        let html = "<!doctype html>\n<h1>Todo</h1>\n";
        let llm = Arc::new(MockLlmClient::scripted([
            decision(
                "create the page",
                serde_json::json!({"name": "write_file", "args": {"path": "index.html", "content": format!("```html\n{html}```")}}),
            ),
            decision(
                "check it",
                serde_json::json!({"name": "read_file", "args": {"path": "index.html"}}),
            ),
            decision(
                "done",
                serde_json::json!({"name": "finish", "args": {"summary": "todo page created"}}),
            ),
        ]));
        let controller = build_controller(&config(&dir, 10), llm.clone()).unwrap();

        let outcome = controller.run("build a todo page").await.unwrap();
        assert_eq!(
            outcome.termination,
            Termination::Finished {
                summary: "todo page created".into()
            }
        );
        assert_eq!(outcome.state.history.len(), 3);
        let written = std::fs::read_to_string(dir.path().join("playground/index.html")).unwrap();
        assert_eq!(written, html);
        let n = html.chars().count();
        assert_eq!(
            outcome.state.history[1].observation,
            format!("read index.html ({n} chars)")
        );

        // 第三次规划时 prompt 中应包含前两轮历史
        let third = llm.call(2).unwrap();
        assert!(third[1].content.contains("Thought: create the page"));
        assert!(third[1].content.contains("Observation: read index.html"));
    }

    #[tokio::test]
    async fn test_sandbox_violations_are_observations() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::scripted([
            decision("escape", serde_json::json!({"name": "read_file", "args": {"path": "../../etc/passwd"}})),
            decision("secrets", serde_json::json!({"name": "write_file", "args": {"path": ".env", "content": "KEY=1"}})),
            decision("big", serde_json::json!({"name": "write_file", "args": {"path": "big.txt", "content": "x".repeat(2048)}})),
            decision("rm", serde_json::json!({"name": "execute_command", "args": {"cmd": "rm", "args": ["-rf", "/"]}})),
            decision("empty", serde_json::json!({"name": "read_file", "args": {"path": ""}})),
            decision("stop", serde_json::json!({"name": "finish", "args": {"summary": "gave up"}})),
        ]));
        let controller = build_controller(&config(&dir, 10), llm).unwrap();

        let outcome = controller.run("misbehave").await.unwrap();
        let obs: Vec<&str> = outcome
            .state
            .history
            .iter()
            .map(|h| h.observation.as_str())
            .collect();
        assert!(obs[0].starts_with("error: PathEscape"), "{}", obs[0]);
        assert!(obs[1].starts_with("error: HiddenFileRejected"), "{}", obs[1]);
        assert!(obs[2].starts_with("error: FileTooLarge"), "{}", obs[2]);
        assert!(obs[3].starts_with("error: CommandNotAllowed"), "{}", obs[3]);
        assert!(obs[4].starts_with("error: InvalidArguments"), "{}", obs[4]);
        assert_eq!(obs[5], "finish: gave up");
        assert!(!dir.path().join("playground/.env").exists());
        assert!(!dir.path().join("playground/big.txt").exists());
    }

    #[tokio::test]
    async fn test_budget_of_three_without_finish() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::scripted([decision(
            "keep looking",
            serde_json::json!({"name": "read_file", "args": {"path": "nothing.txt"}}),
        )]));
        let controller = build_controller(&config(&dir, 3), llm.clone()).unwrap();

        let outcome = controller.run("never finish").await.unwrap();
        assert_eq!(outcome.termination, Termination::MaxStepsExceeded);
        assert_eq!(outcome.state.step, 3);
        assert_eq!(outcome.state.history.len(), 3);
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_prose_output_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::scripted([
            "I would start by creating an index file.",
        ]));
        let controller = build_controller(&config(&dir, 10), llm).unwrap();

        match controller.run("anything").await {
            Err(AgentError::ModelOutputParse { raw }) => {
                assert_eq!(raw, "I would start by creating an index file.")
            }
            other => panic!("expected ModelOutputParse, got {other:?}"),
        }
    }
}
