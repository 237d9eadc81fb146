use stream_api::StreamError;

#[derive(Debug, thiserror::Error)]
pub enum ShimError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}")]
    Stream(#[from] StreamError),

    #[error("api: {0}")]
    Api(String),

    #[error("output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}
