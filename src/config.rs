use bon::Builder;
use http::HeaderName;
use serde::Deserialize;

use crate::Result;
use crate::logging::LogEvents;

pub const DEFAULT_REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Builder, Deserialize)]
pub struct InterceptorConfig {
    /// Header / metadata key carrying the per-call correlation id
    #[builder(into, default = String::from(DEFAULT_REQUEST_ID_HEADER))]
    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,

    #[builder(default)]
    #[serde(default)]
    pub log_events: LogEvents,

    /// `EnvFilter` directives, e.g. "info,grpc_interceptors=debug"
    #[builder(into, default = String::from("info"))]
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    #[builder(default)]
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl InterceptorConfig {
    pub(crate) fn request_id_header_name(&self) -> Result<HeaderName> {
        Ok(HeaderName::try_from(self.request_id_header.as_str())?)
    }
}

fn default_request_id_header() -> String {
    DEFAULT_REQUEST_ID_HEADER.to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}
