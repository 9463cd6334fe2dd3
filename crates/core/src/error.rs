/// Result alias that carries the custom [`PhysicalMediaError`] type.
pub type Result<T> = std::result::Result<T, PhysicalMediaError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum PhysicalMediaError {
    /// Free-form message for failures that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration could not be parsed.
    #[error("invalid configuration json: {0}")]
    Json(#[from] serde_json::Error),
    /// Configuration parsed but carries values the viewer cannot run with.
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Apply(#[from] ApplyError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl PhysicalMediaError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for PhysicalMediaError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PhysicalMediaError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

/// Failure of one texture fetch, tagged by the pipeline stage that failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("failed to retrieve album art from `{uri}`: {reason}")]
    TransportFailed { uri: String, reason: String },
    #[error("failed to decode album art from `{uri}`: {reason}")]
    DecodeFailed { uri: String, reason: String },
    #[error("failed to generate texture from album art `{uri}`: {reason}")]
    TextureGenerationFailed { uri: String, reason: String },
    /// The fetch was superseded by a newer request. Not a user-facing failure.
    #[error("fetch of `{uri}` was cancelled")]
    Cancelled { uri: String },
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    /// The part's material does not expose the requested parameter schema.
    #[error("material {index} on part `{part}` does not support parameter `{parameter}`")]
    UnsupportedMaterial {
        part: String,
        index: usize,
        parameter: String,
    },
    #[error("no part named `{0}` below the target entity")]
    PartNotFound(String),
    /// Every binding was skipped; the restyle did not touch a single material.
    #[error("no material accepted the requested bindings")]
    NothingApplied,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("failed to load entity `{name}`: {reason}")]
    EntityLoadFailed { name: String, reason: String },
    #[error("entity `{0}` is not loaded")]
    EntityMissing(String),
}
