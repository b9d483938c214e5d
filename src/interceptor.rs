use std::fmt;

use tonic::metadata::{Ascii, MetadataKey, MetadataValue};
use tonic::service::Interceptor;
use uuid::Uuid;

use crate::Result;
use crate::config::InterceptorConfig;

/// Correlation id attached to every call and to the log records it emits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accepts an id received from the caller; empty values are ignored.
    pub(crate) fn from_value(value: &str) -> Option<Self> {
        (!value.is_empty()).then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

/// Ensures every request carries a request id, both in its metadata and as
/// a [`RequestId`] extension for handlers.
///
/// A valid id sent by the caller is kept; otherwise a fresh one is minted.
/// Works on the server (`with_interceptor`) as well as on client channels,
/// where it propagates the id to the remote side.
#[derive(Clone)]
pub struct RequestIdInterceptor {
    key: MetadataKey<Ascii>,
}

impl RequestIdInterceptor {
    pub fn new(config: &InterceptorConfig) -> Result<Self> {
        let key = MetadataKey::from_bytes(config.request_id_header.as_bytes())?;
        Ok(Self { key })
    }
}

impl Default for RequestIdInterceptor {
    fn default() -> Self {
        Self {
            key: MetadataKey::from_static(crate::config::DEFAULT_REQUEST_ID_HEADER),
        }
    }
}

impl Interceptor for RequestIdInterceptor {
    fn call(
        &mut self,
        mut req: tonic::Request<()>,
    ) -> tonic::Result<tonic::Request<()>> {
        let existing = req
            .metadata()
            .get(&self.key)
            .and_then(|v| v.to_str().ok())
            .and_then(RequestId::from_value);

        let id = match existing {
            Some(id) => id,
            None => {
                let id = RequestId::new();
                // A UUID is always valid ASCII
                if let Ok(value) = MetadataValue::try_from(id.as_str()) {
                    req.metadata_mut().insert(self.key.clone(), value);
                }
                id
            }
        };
        req.extensions_mut().insert(id);
        Ok(req)
    }
}
