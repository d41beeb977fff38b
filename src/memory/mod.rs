//! 记忆层：发给 LLM 的对话消息、单次运行内的步骤历史

pub mod conversation;
pub mod history;

pub use conversation::{Message, Role};
pub use history::{bounded_tail, HistoryEntry};
