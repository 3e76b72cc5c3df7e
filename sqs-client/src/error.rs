pub type Result<T, E = ClientError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Queue operation attempted before a successful `apply_node`
    #[error("queue client is not registered, apply for a node first")]
    Unregistered,
    #[error("queue name can not be empty")]
    EmptyQueueName,
    #[error("http, {0}")]
    Http(#[from] reqwest::Error),
    #[error("{op} failed, status: {status}, {message}")]
    Status { op: &'static str, status: u16, message: String },
    #[error("failed to register for a serving node, {0}")]
    Registration(String),
    #[error("message id range broken: end({end}) < begin({begin})")]
    BrokenRange { begin: i64, end: i64 },
    #[error("message handler, {0}")]
    Handler(String),
}

impl ClientError {
    #[inline]
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
