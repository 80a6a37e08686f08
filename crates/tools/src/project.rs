use std::sync::Arc;

use {
    assistant_agents::AgentTool,
    assistant_graph::ProjectAssistant,
    async_trait::async_trait,
    serde_json::{Value, json},
};

/// Delegates any Planner question to the project agent for one user.
pub struct ProjectQueryTool {
    assistant: Arc<ProjectAssistant>,
    user_id: String,
}

impl ProjectQueryTool {
    pub fn new(assistant: Arc<ProjectAssistant>, user_id: impl Into<String>) -> Self {
        Self {
            assistant,
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl AgentTool for ProjectQueryTool {
    fn name(&self) -> &str {
        "intelligent_project_query"
    }

    fn description(&self) -> &str {
        "DYNAMIC PROJECT TOOL: Use this for ANY question about Microsoft Planner projects. The tool uses AI to \
         dynamically access Graph API and retrieve exactly what's needed to answer the question. Works for: \
         listing projects, checking progress, finding tasks, comparing projects, analyzing data, etc. \
         REQUIRES USER LOGIN."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The user's full natural language query about projects, tasks, or anything related to Microsoft Planner"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let query = params
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("missing 'query' parameter"))?;
        Ok(Value::String(self.assistant.query(&self.user_id, query).await))
    }
}
