//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册与查找；
//! 注册时把参数 JSON Schema 编译为 jsonschema::Validator，execute 前校验参数，
//! 失败返回 InvalidArguments，未知工具返回 ToolNotFound。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use jsonschema::{validator_for, Validator};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::ToolError;

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（read_file / write_file / execute_command）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认空对象，表示不限参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行工具（参数已通过 schema 校验）
    async fn execute(&self, args: Value) -> Result<String, ToolError>;
}

/// 由参数结构体生成 JSON Schema
pub fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| serde_json::json!({}))
}

/// 将已校验的 JSON 参数反序列化为强类型结构体
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// 编译参数 schema
pub fn compile_schema(schema: &Value) -> Result<Validator, String> {
    validator_for(schema).map_err(|err| format!("invalid schema: {err}"))
}

/// 校验参数，所有错误以 "; " 连接
pub fn check_args(validator: &Validator, args: &Value) -> Result<(), String> {
    if validator.is_valid(args) {
        return Ok(());
    }
    let messages = validator
        .iter_errors(args)
        .map(|err| err.to_string())
        .collect::<Vec<_>>();
    Err(messages.join("; "))
}

/// 已注册的工具及其编译后的参数校验器；schema 本身无效时保留编译错误
struct RegisteredTool {
    tool: Arc<dyn Tool>,
    validator: Result<Validator, String>,
}

/// 工具注册表：按名称存储 Arc<dyn Tool>
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        let validator = compile_schema(&tool.parameters_schema());
        if let Err(e) = &validator {
            tracing::warn!(tool = %name, error = %e, "tool schema rejected, calls will fail");
        }
        self.tools.insert(
            name,
            RegisteredTool {
                tool: Arc::new(tool),
                validator,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|entry| entry.tool.clone())
    }

    /// 校验参数后调用；工具内部错误原样以 ToolError 返回，由 ToolExecutor 转为 ToolResult
    pub async fn execute(&self, name: &str, args: Value) -> Result<String, ToolError> {
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::ToolNotFound(name.to_string()))?;
        let validator = entry
            .validator
            .as_ref()
            .map_err(|e| ToolError::InvalidArguments(e.clone()))?;
        check_args(validator, &args).map_err(ToolError::InvalidArguments)?;
        entry.tool.execute(args).await
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// 返回全部工具的 name / description / parameters，可注入 prompt 或由传输层对外暴露
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .tool_names()
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|entry| {
                serde_json::json!({
                    "name": entry.tool.name(),
                    "description": entry.tool.description(),
                    "parameters": entry.tool.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize, JsonSchema)]
    struct EchoArgs {
        #[schemars(length(min = 1))]
        text: String,
        #[serde(default)]
        tags: Vec<String>,
        note: Option<String>,
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo text"
        }

        fn parameters_schema(&self) -> Value {
            schema_of::<EchoArgs>()
        }

        async fn execute(&self, args: Value) -> Result<String, ToolError> {
            let args: EchoArgs = parse_args(args)?;
            Ok(format!("{}{}", args.text, args.tags.join(",")))
        }
    }

    #[tokio::test]
    async fn test_dispatch_valid_args() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let out = registry
            .execute("echo", json!({"text": "hi", "tags": ["a", "b"]}))
            .await
            .unwrap();
        assert_eq!(out, "hia,b");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry.execute("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::ToolNotFound(name) if name == "nope"));
    }

    #[tokio::test]
    async fn test_invalid_args_rejected_before_dispatch() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        for bad in [
            json!({}),
            json!({"text": 3}),
            json!({"text": ""}),
            json!({"text": "x", "tags": [1]}),
            json!("not an object"),
        ] {
            let err = registry.execute("echo", bad.clone()).await.unwrap_err();
            assert!(
                matches!(err, ToolError::InvalidArguments(_)),
                "{bad} -> {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_optional_field_accepts_null() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let out = registry
            .execute("echo", json!({"text": "hi", "note": null}))
            .await
            .unwrap();
        assert_eq!(out, "hi");
    }

    #[test]
    fn test_validate_closed_object() {
        let validator = compile_schema(&json!({
            "type": "object",
            "properties": {"a": {"type": "integer"}},
            "additionalProperties": false
        }))
        .unwrap();
        assert!(check_args(&validator, &json!({"a": 1})).is_ok());
        assert!(check_args(&validator, &json!({"a": 1.5})).is_err());
        assert!(check_args(&validator, &json!({"b": 1})).is_err());
    }

    #[test]
    fn test_check_args_reports_every_error() {
        let validator = compile_schema(&schema_of::<EchoArgs>()).unwrap();
        let err = check_args(&validator, &json!({"text": "", "tags": [1]})).unwrap_err();
        assert_eq!(err.split("; ").count(), 2, "{err}");
    }

    struct BrokenSchemaTool;

    #[async_trait]
    impl Tool for BrokenSchemaTool {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Schema that does not compile"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": 12})
        }

        async fn execute(&self, _args: Value) -> Result<String, ToolError> {
            Ok("ran".to_string())
        }
    }

    #[tokio::test]
    async fn test_broken_schema_never_dispatches() {
        let mut registry = ToolRegistry::new();
        registry.register(BrokenSchemaTool);
        let err = registry.execute("broken", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(msg) if msg.starts_with("invalid schema")));
    }

    #[test]
    fn test_schema_json_lists_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let schema: Value = serde_json::from_str(&registry.to_schema_json()).unwrap();
        assert_eq!(schema[0]["name"], "echo");
        assert_eq!(schema[0]["parameters"]["required"], json!(["text"]));
    }
}
