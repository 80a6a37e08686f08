//! Tools of the top-level internal assistant.
//!
//! `qna_internal` answers from internal documents, `intelligent_project_query`
//! hands Planner questions to the project agent, `fetch_template` signs a
//! temporary download link and `notify` posts to a webhook. Tools whose
//! backend is not configured are left out of the registry.

pub mod notify;
pub mod project;
pub mod qna;
pub mod template;

use std::sync::Arc;

use {
    assistant_agents::ToolRegistry,
    assistant_graph::ProjectAssistant,
    assistant_rag::{BlobStore, RagService},
};

pub use {
    notify::Notifier,
    project::ProjectQueryTool,
    qna::QnaTool,
    template::{FetchTemplateTool, fetch_template},
};

/// Backends available to the assistant tools.
#[derive(Clone, Default)]
pub struct ToolBackends {
    pub rag: Option<Arc<RagService>>,
    pub projects: Option<Arc<ProjectAssistant>>,
    pub blobs: Option<Arc<dyn BlobStore>>,
    pub webhook_url: Option<String>,
    /// Microsoft account the project tool acts for. Defaults to the chat user.
    pub project_user: Option<String>,
}

/// Registry for one user's chat turn.
pub fn assistant_tools(backends: &ToolBackends, user_id: &str) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    if let Some(rag) = &backends.rag {
        registry.register(Box::new(QnaTool::new(Arc::clone(rag), user_id)));
    }
    if let Some(projects) = &backends.projects {
        let project_user = backends.project_user.as_deref().unwrap_or(user_id);
        registry.register(Box::new(ProjectQueryTool::new(Arc::clone(projects), project_user)));
    }
    if let Some(blobs) = &backends.blobs {
        registry.register(Box::new(FetchTemplateTool::new(Arc::clone(blobs))));
    }
    registry.register(Box::new(Notifier::new(backends.webhook_url.clone())));
    registry
}
