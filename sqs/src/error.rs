use serde::{Deserialize, Serialize};

pub type Result<T, E = SqsError> = std::result::Result<T, E>;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SqsError {
    /// Key absent from the store, an expected outcome
    #[error("data not found")]
    DataNotFound,
    /// Stored value present but undecodable
    #[error("data broken, key: {key}, {reason}")]
    DataBroken { key: String, reason: String },
    #[error("user not found")]
    UserNotFound,
    #[error("queue not found")]
    QueueNotFound,
    #[error("duplicate queue")]
    DuplicateQueue,
    #[error("can not create more queue")]
    CanNotCreateMoreQueue,
    /// Allocated message id range with end < begin
    #[error("message id range broken: end({end}) < begin({begin})")]
    BrokenRange { begin: i64, end: i64 },
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid token")]
    InvalidToken,
    #[error("invalid argument, {0}")]
    InvalidArgument(String),
    #[error("internal error, {0}")]
    Internal(String),
}

impl SqsError {
    #[inline]
    pub fn data_broken<K: Into<String>, E: ToString>(key: K, e: E) -> Self {
        SqsError::DataBroken { key: key.into(), reason: e.to_string() }
    }

    #[inline]
    pub fn internal<E: ToString>(e: E) -> Self {
        SqsError::Internal(e.to_string())
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, SqsError::DataNotFound)
    }

    /// Stable numeric code carried in the HTTP response envelope.
    #[inline]
    pub fn code(&self) -> u16 {
        match self {
            SqsError::DataNotFound => 1001,
            SqsError::DataBroken { .. } => 1002,
            SqsError::UserNotFound => 1003,
            SqsError::QueueNotFound => 1004,
            SqsError::DuplicateQueue => 1005,
            SqsError::CanNotCreateMoreQueue => 1006,
            SqsError::BrokenRange { .. } => 1007,
            SqsError::Unauthorized => 1008,
            SqsError::InvalidToken => 1009,
            SqsError::InvalidArgument(_) => 1010,
            SqsError::Internal(_) => 1500,
        }
    }

    /// HTTP status the API answers with for this error.
    #[inline]
    pub fn status(&self) -> u16 {
        match self {
            SqsError::DataNotFound | SqsError::UserNotFound | SqsError::QueueNotFound => 404,
            SqsError::DuplicateQueue => 409,
            SqsError::CanNotCreateMoreQueue => 403,
            SqsError::Unauthorized | SqsError::InvalidToken => 401,
            SqsError::InvalidArgument(_) => 400,
            SqsError::DataBroken { .. } | SqsError::BrokenRange { .. } | SqsError::Internal(_) => 500,
        }
    }
}

impl From<serde_json::Error> for SqsError {
    #[inline]
    fn from(e: serde_json::Error) -> Self {
        SqsError::Internal(e.to_string())
    }
}

impl From<sled::Error> for SqsError {
    #[inline]
    fn from(e: sled::Error) -> Self {
        SqsError::Internal(format!("sled, {e}"))
    }
}

impl From<redis::RedisError> for SqsError {
    #[inline]
    fn from(e: redis::RedisError) -> Self {
        SqsError::Internal(format!("redis, {e}"))
    }
}
