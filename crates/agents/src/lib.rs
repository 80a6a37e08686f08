//! Agent building blocks: the chat-completion provider, the tool registry and
//! the function-calling loop that ties them together.

pub mod buffer;
pub mod model;
pub mod prompt;
pub mod providers;
pub mod runner;
pub mod tool_registry;

pub use {
    buffer::ConversationBuffer,
    model::{CompletionResponse, LlmProvider, ToolCall, Usage},
    providers::AzureOpenAiProvider,
    runner::{AgentRunResult, AgentStep, ITERATION_LIMIT_ANSWER, run_agent_loop},
    tool_registry::{AgentTool, ToolRegistry},
};
