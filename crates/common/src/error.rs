/// Errors that cross crate boundaries and need to be told apart by callers
/// (mostly the HTTP layer, which maps them to status codes).
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// A cloud service the operation depends on has no configuration.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// No delegated Microsoft token for this user, or it could not be refreshed.
    #[error("not authenticated with Microsoft")]
    NotAuthenticated,

    #[error("HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T, E = AssistantError> = std::result::Result<T, E>;

impl AssistantError {
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    /// True when the error chain contains an authentication failure, either
    /// typed or reported by Graph as a 401.
    pub fn is_auth(err: &anyhow::Error) -> bool {
        err.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<AssistantError>(),
                Some(AssistantError::NotAuthenticated)
                    | Some(AssistantError::Upstream { status: 401, .. })
            )
        })
    }
}
