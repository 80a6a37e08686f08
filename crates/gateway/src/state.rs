use std::sync::Arc;

use {
    assistant_agents::{AzureOpenAiProvider, ConversationBuffer, LlmProvider},
    assistant_config::AssistantConfig,
    assistant_graph::{GRAPH_BASE_URL, GraphClient, Planner, ProjectAssistant, TodoAssistant, TodoClient},
    assistant_memory::ConversationMemory,
    assistant_oauth::{DelegatedSession, PLANNER, TODO, TokenStore, load_oauth_config},
    assistant_rag::{
        AzureBlobStore, AzureEmbeddingProvider, AzureLayoutAnalyzer, BlobStore, DocumentManager,
        EmbeddingProvider, Indexer, QdrantStore, RagService, VectorStore,
    },
    assistant_tools::ToolBackends,
    tracing::{info, warn},
};

use crate::error::{ApiError, ApiResult};

/// Account used by the browser login endpoints and the HTTP project/To-Do
/// routes.
pub const SESSION_USER: &str = "current_user";

const CHAT_BUFFER_MESSAGES: usize = 20;

/// Backends the gateway is built from. Optional pieces switch their routes
/// off when missing.
pub struct Services {
    pub llm: Arc<dyn LlmProvider>,
    pub memory: Option<Arc<ConversationMemory>>,
    pub rag: Option<Arc<RagService>>,
    pub documents: Option<Arc<DocumentManager>>,
    pub blobs: Option<Arc<dyn BlobStore>>,
    pub webhook_url: Option<String>,
    pub graph_base_url: String,
    pub default_prefix: String,
    pub debug: bool,
}

impl Services {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            memory: None,
            rag: None,
            documents: None,
            blobs: None,
            webhook_url: None,
            graph_base_url: GRAPH_BASE_URL.into(),
            default_prefix: "sop/".into(),
            debug: false,
        }
    }
}

/// Shared state behind every route.
pub struct GatewayState {
    pub version: String,
    pub debug: bool,
    pub default_prefix: String,
    pub llm: Arc<dyn LlmProvider>,
    pub memory: Option<Arc<ConversationMemory>>,
    pub documents: Option<Arc<DocumentManager>>,
    pub tools: ToolBackends,
    pub planner_session: Arc<DelegatedSession>,
    pub todo_session: Arc<DelegatedSession>,
    pub projects: Arc<ProjectAssistant>,
    pub todo: Arc<TodoAssistant>,
    pub conversations: ConversationBuffer,
}

impl GatewayState {
    pub fn new(
        services: Services,
        planner_session: Arc<DelegatedSession>,
        todo_session: Arc<DelegatedSession>,
    ) -> Arc<Self> {
        let graph = |session: &Arc<DelegatedSession>| {
            Arc::new(GraphClient::new(Arc::clone(session)).with_base_url(services.graph_base_url.clone()))
        };
        let planner = Arc::new(Planner::new(graph(&planner_session)));
        let todo_client = Arc::new(TodoClient::new(graph(&todo_session)));

        let projects = Arc::new(ProjectAssistant::new(
            Arc::clone(&services.llm),
            planner,
            services.memory.clone(),
        ));
        let todo = Arc::new(TodoAssistant::new(
            Arc::clone(&services.llm),
            todo_client,
            services.memory.clone(),
        ));

        let tools = ToolBackends {
            rag: services.rag,
            projects: Some(Arc::clone(&projects)),
            blobs: services.blobs,
            webhook_url: services.webhook_url,
            project_user: Some(SESSION_USER.into()),
        };

        Arc::new(Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            debug: services.debug,
            default_prefix: services.default_prefix,
            llm: services.llm,
            memory: services.memory,
            documents: services.documents,
            tools,
            planner_session,
            todo_session,
            projects,
            todo,
            conversations: ConversationBuffer::new(CHAT_BUFFER_MESSAGES),
        })
    }

    /// Wire the Azure, Qdrant and Microsoft identity backends from config.
    ///
    /// Only the chat model is mandatory. Everything else is logged and left
    /// out when it is not configured.
    pub async fn from_config(config: &AssistantConfig) -> anyhow::Result<Arc<Self>> {
        let llm: Arc<dyn LlmProvider> = Arc::new(AzureOpenAiProvider::from_config(&config.azure_openai)?);
        let memory = assistant_memory::initialize(config).await;

        let embedder: Option<Arc<dyn EmbeddingProvider>> =
            match AzureEmbeddingProvider::from_config(&config.azure_openai) {
                Ok(e) => Some(Arc::new(e)),
                Err(e) => {
                    warn!(error = %e, "embeddings disabled");
                    None
                },
            };
        let store: Option<Arc<dyn VectorStore>> = match QdrantStore::from_config(&config.qdrant) {
            Ok(s) => Some(Arc::new(s)),
            Err(e) => {
                warn!(error = %e, "vector store disabled");
                None
            },
        };
        let blobs: Option<Arc<dyn BlobStore>> = match AzureBlobStore::from_config(&config.blob) {
            Ok(b) => Some(Arc::new(b)),
            Err(e) => {
                warn!(error = %e, "blob storage disabled");
                None
            },
        };
        let analyzer = match AzureLayoutAnalyzer::from_config(&config.docint) {
            Ok(a) => Some(Arc::new(a)),
            Err(e) => {
                warn!(error = %e, "document analysis disabled");
                None
            },
        };

        let rag = match (&embedder, &store) {
            (Some(embedder), Some(store)) => Some(Arc::new(
                RagService::new(Arc::clone(embedder), Arc::clone(store), Arc::clone(&llm), memory.clone())
                    .with_max_docs(config.rag.max_docs),
            )),
            _ => None,
        };
        let documents = match (&blobs, analyzer, &embedder, &store) {
            (Some(blobs), Some(analyzer), Some(embedder), Some(store)) => {
                let indexer = Indexer::new(Arc::clone(blobs), analyzer, Arc::clone(embedder), Arc::clone(store));
                Some(Arc::new(
                    DocumentManager::new(Arc::new(indexer)).with_vector_size(config.qdrant.vector_size),
                ))
            },
            _ => None,
        };

        if !config.identity.is_configured() {
            warn!("MS_CLIENT_ID or TENANT_ID is not set, Microsoft login will fail");
        }
        let tokens = TokenStore::new();
        let session = |provider: &str| -> anyhow::Result<Arc<DelegatedSession>> {
            let oauth = load_oauth_config(provider, &config.identity)
                .ok_or_else(|| anyhow::anyhow!("no OAuth configuration for {provider}"))?;
            Ok(Arc::new(DelegatedSession::new(provider, oauth).with_store(tokens.clone())))
        };
        let planner_session = session(PLANNER)?;
        let todo_session = session(TODO)?;

        info!(
            memory = memory.is_some(),
            rag = rag.is_some(),
            documents = documents.is_some(),
            "backends initialised"
        );

        let services = Services {
            llm,
            memory,
            rag,
            documents,
            blobs,
            webhook_url: config.notify.webhook_url.clone(),
            graph_base_url: GRAPH_BASE_URL.into(),
            default_prefix: config.rag.default_prefix.clone(),
            debug: config.server.debug,
        };
        Ok(Self::new(services, planner_session, todo_session))
    }

    pub fn memory(&self) -> ApiResult<&Arc<ConversationMemory>> {
        self.memory
            .as_ref()
            .ok_or_else(|| ApiError::unavailable("Memory system not available"))
    }

    pub fn documents(&self) -> ApiResult<&Arc<DocumentManager>> {
        self.documents
            .as_ref()
            .ok_or_else(|| ApiError::unavailable("Document management not available"))
    }
}
