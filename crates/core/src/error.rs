use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Domain-wide error taxonomy. Input/domain variants map to 4xx at the
/// edge (§6/§7); infrastructure variants map to 503; `Invariant` is a
/// programming bug and should never be constructed from reachable code.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("campaign not found")]
    CampaignNotFound,

    #[error("campaign has not started")]
    CampaignNotStarted,

    #[error("campaign has ended")]
    CampaignEnded,

    #[error("product not found")]
    ProductNotFound,

    #[error("price {price} is below minimum {min_price}")]
    PriceTooLow { price: f64, min_price: f64 },

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("email already registered")]
    EmailTaken,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("admin privileges required")]
    AdminRequired,

    #[error("user is disabled")]
    UserDisabled,

    #[error("distributed lock not acquired")]
    LockNotAcquired,

    #[error("optimistic concurrency conflict")]
    ConcurrencyConflict,

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("cache backend error: {0}")]
    Cache(String),

    #[error("durable store error: {0}")]
    Store(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    /// Whether this error originates from infrastructure rather than
    /// caller input — used by the edge layer to pick 503 vs 4xx.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, EngineError::Cache(_) | EngineError::Store(_))
    }
}
