//! Natural-language project questions answered by a Planner tool-calling agent.

use std::sync::Arc;

use {
    assistant_agents::{LlmProvider, run_agent_loop},
    assistant_common::AssistantError,
    assistant_memory::{ConversationMemory, Module},
    chrono::{SecondsFormat, Utc},
    serde_json::json,
    tracing::{info, warn},
};

use crate::{planner::Planner, tools::planner_tools};

pub const NOT_LOGGED_IN: &str =
    "🔒 Anda belum login ke Microsoft. Silakan login terlebih dahulu untuk mengakses data project.";
pub const AUTH_ERROR: &str = "🔒 Authentication error. Silakan login kembali.";
const FALLBACK_ANSWER: &str = "Maaf, saya tidak bisa memproses permintaan Anda.";

const MAX_ITERATIONS: usize = 10;
const MEMORY_CONTEXT_TOKENS: usize = 600;

const PERSONA: &str = "You are Smart Project Assistant - an intelligent, friendly Microsoft Planner assistant with personality and memory.

PERSONALITY & INTERACTION:
- You are professional yet warm and personable
- You remember user's name and previous conversations
- You can handle casual chat, greetings, and general questions
- You build rapport while staying focused on helping with project management
- Use natural, conversational Indonesian language
- Show enthusiasm when appropriate with emojis (but don't overuse them)

PRIMARY MISSION: Microsoft Planner Project Management
You have DIRECT ACCESS to Graph API for real-time project data analysis.
";

const HISTORY_GUIDANCE: &str = "IMPORTANT: Use this context to:
- Remember the user's name if they introduced themselves
- Reference previous discussions about projects
- Build on earlier conversations naturally
- Show continuity in your assistance
";

const GUIDELINES: &str = r#"RESPONSE GUIDELINES:

1. For GENERAL QUESTIONS (greetings, introductions, casual chat):
   - Respond warmly and naturally
   - If user introduces their name, remember it and use it
   - Examples:
     * "Hai" → "Halo! Senang bisa membantu Anda. 😊 Saya Smart Project Assistant, siap membantu mengelola project Anda di Microsoft Planner. Ada yang bisa saya bantu hari ini?"
     * "Nama saya [X]" → "Senang berkenalan dengan Anda, [X]! 😊 Saya di sini untuk membantu mengelola project Anda. Ingat, One Team One Solution! Ada project yang ingin kita review bersama?"
     * "Apa kabar?" → "Kabar baik! Saya siap membantu Anda mengoptimalkan project management. 😊 Bagaimana dengan project Anda hari ini?"

2. For OFF-TOPIC QUESTIONS (not related to project management):
   - Answer briefly and politely
   - Gently redirect to your primary function
   - Example: "Itu pertanyaan menarik! Tapi keahlian utama saya adalah project management di Microsoft Planner. 😊 Ingat, One Team One Solution! Ada project yang ingin kita bahas? Saya bisa bantu analisis progress, cek task overdue, atau bandingkan beberapa project."

3. For PROJECT-RELATED QUESTIONS:
   - Use the Graph API tools to get real-time data
   - Provide detailed, actionable insights
   - Highlight issues and opportunities proactively

AVAILABLE GRAPH API TOOLS:
1. graph_get_all_plans() - Get ALL plans from all groups
2. graph_get_user_groups() - Get user's Microsoft 365 groups
3. graph_get_plans_from_group(group_id) - Get plans from specific group
4. graph_get_plan_tasks(plan_id) - Get tasks from a plan
5. graph_get_plan_buckets(plan_id) - Get buckets (task categories) from a plan
6. graph_get_task_details(task_id) - Get detailed info about specific task

PROJECT QUERY APPROACH:
1. Understand what user is asking
2. Determine if tools are needed (for project data) or just conversation
3. If tools needed: Call appropriate Graph API tools
4. Analyze data intelligently
5. Provide clear, actionable answer

EXAMPLES:

Query: "Hai, nama saya Budi"
Response: "Halo Budi! Senang berkenalan dengan Anda. 😊 Saya Smart Project Assistant, siap membantu mengelola project Anda di Microsoft Planner. Ingat, One Team One Solution! Ada project yang ingin kita review hari ini?"
[NO TOOLS NEEDED]

Query: "Gimana cuaca hari ini?"
Response: "Saya tidak punya akses ke data cuaca, tapi saya ahli dalam project management! 😊 Ingat, One Team One Solution! Bagaimana kalau kita fokus ke project Anda? Ada yang perlu di-review?"
[NO TOOLS NEEDED]

Query: "List all my projects"
Response: [CALL graph_get_all_plans() → Analyze → Present nicely]
[TOOLS NEEDED]

Query: "Progress project Website gimana?"
Response: [CALL graph_get_all_plans() → Find "Website" → CALL graph_get_plan_tasks() → Calculate progress → Report]
[TOOLS NEEDED]

Query: "Ada task yang overdue ga?"
Response: [CALL graph_get_all_plans() → For each plan CALL graph_get_plan_tasks() → Filter overdue → List them]
[TOOLS NEEDED]
"#;

const REMEMBER: &str = r#"- Be FLEXIBLE with project/task names (handle typos, variations)
- Always check if data retrieval was successful (check "success": true in JSON)
- If project not found, list available projects
- Provide actionable insights, not just raw data
- Use natural, conversational Indonesian
- Highlight urgent issues with appropriate emojis (⚠ 🔴 ⏰)
- Show enthusiasm for good progress with positive emojis (✅ 🎉 👍)
- Be accurate with numbers and dates
- Reference user's name if you know it
- Build rapport while staying helpful

REMEMBER: You're not just a data retriever - you're an intelligent assistant who:
- Builds relationships through memory and personality
- Understands context from conversation history
- Provides strategic insights, not just information
- Guides users to better project management
- Represents "One Team One Solution" spirit

Now process the user's query intelligently!
"#;

/// System prompt for one project question. `history` is the formatted
/// project conversation, empty when there is none.
pub fn system_prompt(user_query: &str, history: &str, now: &str) -> String {
    let mut prompt = format!("{PERSONA}\nUser Query: \"{user_query}\"\n");
    if !history.is_empty() {
        prompt.push_str(&format!("\nCONVERSATION HISTORY:\n{history}\n\n{HISTORY_GUIDANCE}"));
    }
    prompt.push_str(&format!(
        "\n\n{GUIDELINES}\nCRITICAL GUIDELINES:\n- Current datetime for overdue calculation: {now}\n{REMEMBER}"
    ));
    prompt
}

pub struct ProjectAssistant {
    llm: Arc<dyn LlmProvider>,
    planner: Arc<Planner>,
    memory: Option<Arc<ConversationMemory>>,
}

impl ProjectAssistant {
    pub fn new(llm: Arc<dyn LlmProvider>, planner: Arc<Planner>, memory: Option<Arc<ConversationMemory>>) -> Self {
        Self { llm, planner, memory }
    }

    pub fn planner(&self) -> &Arc<Planner> {
        &self.planner
    }

    /// Answer a project question for `user_id`. Never fails: problems are
    /// reported in the returned text.
    pub async fn query(&self, user_id: &str, query: &str) -> String {
        if !self.planner.graph().session().is_authenticated(user_id).await {
            return NOT_LOGGED_IN.into();
        }
        match self.run(user_id, query).await {
            Ok(answer) => answer,
            Err(e) if AssistantError::is_auth(&e) || e.to_string().to_lowercase().contains("authentication") => {
                warn!(user_id, error = %e, "project query lost authentication");
                AUTH_ERROR.into()
            },
            Err(e) => {
                warn!(user_id, error = %e, "project query failed");
                format!("❌ Error: {e}")
            },
        }
    }

    async fn run(&self, user_id: &str, query: &str) -> anyhow::Result<String> {
        let history = match &self.memory {
            Some(memory) => {
                memory
                    .conversation_context(user_id, MEMORY_CONTEXT_TOKENS, Module::Project)
                    .await
            },
            None => String::new(),
        };
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false);
        let prompt = system_prompt(query, &history, &now);
        let tools = planner_tools(Arc::clone(&self.planner), user_id);

        let result = run_agent_loop(Arc::clone(&self.llm), &tools, &prompt, &[], query, MAX_ITERATIONS).await?;
        info!(user_id, tool_calls = result.tool_calls_made, "project query answered");
        let answer = if result.text.trim().is_empty() {
            FALLBACK_ANSWER.to_string()
        } else {
            result.text
        };

        if let Some(memory) = &self.memory {
            memory.add_message(user_id, "user", query, None, Module::Project).await;
            memory
                .add_message(
                    user_id,
                    "assistant",
                    &answer,
                    Some(json!({"type": "dynamic_project_query"})),
                    Module::Project,
                )
                .await;
        }
        Ok(answer)
    }
}
