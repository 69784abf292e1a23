use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("schema migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("invalid period '{0}', expected one of: today, yesterday, current_week, last_7_days")]
    InvalidPeriod(String),

    #[error("no observations stored, cannot seed backfill")]
    NoData,

    #[error("no observed descriptions to draw synthetic weather from")]
    EmptyVocabulary,

    #[error("invalid backfill settings: {0}")]
    InvalidSettings(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("no match for '{0}'")]
    NotFound(String),
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Malformed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
