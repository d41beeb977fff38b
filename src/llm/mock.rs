//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序返回预设回复，用完后重复最后一条；记录每次收到的消息，便于断言 prompt 内容。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::Message;

const DEFAULT_REPLY: &str =
    r#"{"thought": "nothing to do", "action": {"name": "finish", "args": {"summary": "mock finished"}}}"#;

/// Mock 客户端：脚本化回复
#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn scripted<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// 已收到的调用次数
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// 第 i 次调用收到的消息
    pub fn call(&self, i: usize) -> Option<Vec<Message>> {
        self.calls.lock().ok().and_then(|c| c.get(i).cloned())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        self.calls
            .lock()
            .map_err(|e| e.to_string())?
            .push(messages.to_vec());

        let next = self.replies.lock().map_err(|e| e.to_string())?.pop_front();
        let mut last = self.last.lock().map_err(|e| e.to_string())?;
        let reply = match next {
            Some(r) => {
                *last = Some(r.clone());
                r
            }
            None => last.clone().unwrap_or_else(|| DEFAULT_REPLY.to_string()),
        };
        Ok(reply)
    }
}
