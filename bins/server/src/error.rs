use firehose_api::FirehoseError;
use gateway::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}")]
    Startup(#[from] FirehoseError),

    #[error("{0}")]
    Gateway(#[from] GatewayError),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}

impl ServerError {
    pub fn invalid(detail: impl Into<String>) -> Self {
        ServerError::Config { context: "validate", detail: detail.into() }
    }
}
