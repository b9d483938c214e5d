use http::header::InvalidHeaderName;
use tonic::metadata::errors::InvalidMetadataKey;
use tracing_subscriber::filter::ParseError;

#[derive(thiserror::Error)]
pub enum Error {
    #[error("invalid header name: {0}")]
    InvalidHeaderName(#[from] InvalidHeaderName),
    #[error("invalid metadata key: {0}")]
    InvalidMetadataKey(#[from] InvalidMetadataKey),
    #[error("invalid log filter: {0}")]
    InvalidLogFilter(#[from] ParseError),
    #[error("failed to install subscriber: {0}")]
    Subscriber(String),
    #[error("unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),
}

crate::impl_debug!(Error);
crate::impl_classifiable!(Error);
