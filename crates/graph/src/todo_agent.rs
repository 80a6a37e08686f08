//! Smart To-Do assistant: a tool-calling agent over the user's To-Do lists.

use std::{sync::Arc, time::Duration};

use {
    assistant_agents::{ITERATION_LIMIT_ANSWER, LlmProvider, run_agent_loop},
    assistant_common::AssistantError,
    assistant_memory::{ConversationMemory, Module},
    chrono::Local,
    serde_json::json,
    tracing::{debug, warn},
};

use crate::{todo::TodoClient, tools::todo_tools};

pub const WELCOME: &str = r#"📝 **Selamat datang di Smart To-Do Assistant!**

Saya adalah asisten AI dengan akses langsung ke Microsoft To-Do Anda. Saya bisa:

**📋 Melihat & Menganalisis:**
• "Tampilkan semua task saya"
• "Task apa yang deadline hari ini?"
• "Ada berapa task yang belum selesai?"
• "Analisis produktivitas minggu ini"
• "Task mana yang overdue?"

**➕ Membuat Task Baru:**
• "Buatkan task: Review laporan keuangan"
• "Tambah task meeting client besok jam 2"
• "Buat reminder call vendor deadline 5 September"

**✅ Menyelesaikan Task:**
• "Tandai task 'Meeting pagi' selesai"
• "Complete task review document"

**✏️ Update Task:**
• "Ubah deadline task meeting jadi besok"
• "Update deskripsi task review"

**🔍 Cari Task:**
• "Cari task tentang client"
• "Ada task apa yang berisi kata 'report'?"

Tanyakan apa saja - saya akan mengakses data To-Do Anda secara real-time! 🚀"#;

pub const NOT_LOGGED_IN: &str = "❌ **Belum login ke Microsoft To-Do.**\n\nSilakan login terlebih dahulu dengan klik tombol '🔑 Login ke Microsoft'.";

const MAX_ITERATIONS: usize = 10;
const MAX_EXECUTION: Duration = Duration::from_secs(60);
const MEMORY_CONTEXT_TOKENS: usize = 600;

pub fn system_prompt(current_date: &str) -> String {
    format!(
        "You are a Smart Microsoft To-Do Assistant with direct access to Microsoft Graph API.

Current Date: {current_date}
User Timezone: Asia/Jakarta

IMPORTANT INSTRUCTIONS:
1. When user asks about tasks, use get_all_tasks for comprehensive overview
2. Always get list IDs first using get_all_lists before creating/updating tasks
3. For searches, use search_tasks to find tasks by title
4. Be proactive - if user wants to complete a task but didn't provide IDs, search for it first
5. Format dates as YYYY-MM-DD when creating/updating tasks
6. Provide helpful, actionable responses in Indonesian"
    )
}

/// The user turn, prefixed with earlier to-do conversation when there is any.
pub fn agent_input(query: &str, history: &str) -> String {
    if history.is_empty() {
        return query.to_string();
    }
    format!(
        "Previous conversation context:\n{history}\n\nCurrent user query: {query}\n\nConsider the conversation history when responding. User might reference previous discussions."
    )
}

fn error_message(e: &anyhow::Error) -> String {
    let text = e.to_string();
    let lower = text.to_lowercase();
    if AssistantError::is_auth(e) || lower.contains("authentication") || lower.contains("401") {
        format!("❌ **Authentication Error:** {text}\n\nSilakan coba login ulang.")
    } else {
        format!("❌ **Error:** {text}\n\nCoba refresh atau login ulang jika masalah berlanjut.")
    }
}

pub struct TodoAssistant {
    llm: Arc<dyn LlmProvider>,
    todo: Arc<TodoClient>,
    memory: Option<Arc<ConversationMemory>>,
}

impl TodoAssistant {
    pub fn new(llm: Arc<dyn LlmProvider>, todo: Arc<TodoClient>, memory: Option<Arc<ConversationMemory>>) -> Self {
        Self { llm, todo, memory }
    }

    pub fn todo(&self) -> &Arc<TodoClient> {
        &self.todo
    }

    pub async fn query(&self, user_id: &str, query: &str) -> String {
        if query.trim().is_empty() {
            return WELCOME.into();
        }
        if !self.todo.graph().session().is_authenticated(user_id).await {
            return NOT_LOGGED_IN.into();
        }
        match self.run(user_id, query).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(user_id, error = %e, "to-do query failed");
                error_message(&e)
            },
        }
    }

    async fn run(&self, user_id: &str, query: &str) -> anyhow::Result<String> {
        let history = match &self.memory {
            Some(memory) => {
                memory
                    .conversation_context(user_id, MEMORY_CONTEXT_TOKENS, Module::Todo)
                    .await
            },
            None => String::new(),
        };
        if !history.is_empty() {
            debug!(user_id, "using to-do conversation history");
        }

        let prompt = system_prompt(&Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
        let input = agent_input(query, &history);
        let tools = todo_tools(Arc::clone(&self.todo), user_id);

        let run = run_agent_loop(Arc::clone(&self.llm), &tools, &prompt, &[], &input, MAX_ITERATIONS);
        let (answer, steps) = match tokio::time::timeout(MAX_EXECUTION, run).await {
            Ok(result) => {
                let result = result?;
                (result.text, result.steps.len())
            },
            Err(_) => {
                warn!(user_id, "to-do agent timed out");
                (ITERATION_LIMIT_ANSWER.to_string(), 0)
            },
        };

        if let Some(memory) = &self.memory {
            memory.add_message(user_id, "user", query, None, Module::Todo).await;
            memory
                .add_message(
                    user_id,
                    "assistant",
                    &answer,
                    Some(json!({"type": "todo_agent", "tools_used": steps})),
                    Module::Todo,
                )
                .await;
        }
        Ok(answer)
    }

    /// Suggestions based on the user's open tasks as of today.
    pub async fn suggestions(&self, user_id: &str) -> String {
        self.todo
            .smart_suggestions(user_id, Local::now().date_naive())
            .await
    }

    pub async fn login_status(&self, user_id: &str) -> String {
        self.todo.login_status(user_id).await
    }
}
