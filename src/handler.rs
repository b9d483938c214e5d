use std::fmt::Debug;
use std::future::Future;

use tonic::{Request, Response, Status};
use tracing::{Instrument, info_span};

use crate::classify::to_status_named;
use crate::config::InterceptorConfig;
use crate::interceptor::RequestId;
use crate::logging::{LogEvent, LogEvents};

/// Wraps service method bodies so that their failures leave the process as
/// classified gRPC statuses.
///
/// Handlers may fail with any error convertible into [`anyhow::Error`];
/// classification happens exactly once, on the way out.
///
/// ```ignore
/// async fn reserve(&self, req: Request<ReserveRequest>) -> Result<Response<ReserveReply>, Status> {
///     self.calls.unary(req, |req| self.do_reserve(req)).await
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallHandler {
    events: LogEvents,
}

impl CallHandler {
    pub fn new(config: &InterceptorConfig) -> Self {
        Self {
            events: config.log_events,
        }
    }

    pub async fn unary<Req, Resp, E, F, Fut>(
        &self,
        mut request: Request<Req>,
        handler: F,
    ) -> Result<Response<Resp>, Status>
    where
        Req: Debug,
        Resp: Debug,
        F: FnOnce(Request<Req>) -> Fut,
        Fut: Future<Output = Result<Response<Resp>, E>>,
        E: Into<anyhow::Error>,
    {
        let request_id = attach_request_id(&mut request);
        let span = info_span!("call", request_id = %request_id);

        async move {
            if self.events.contains(LogEvent::PayloadReceived) {
                tracing::debug!(grpc.request.content = ?request.get_ref(), "payload received");
            }

            match handler(request).await {
                Ok(response) => {
                    if self.events.contains(LogEvent::PayloadSent) {
                        tracing::debug!(grpc.response.content = ?response.get_ref(), "payload sent");
                    }
                    Ok(response)
                }
                Err(err) => {
                    let error_type = std::any::type_name::<E>();
                    let err: anyhow::Error = err.into();
                    let status = to_status_named(&err, error_type);
                    tracing::debug!(
                        error_type,
                        grpc.code = ?status.code(),
                        "unary call failed"
                    );
                    Err(status)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Streaming counterpart of [`unary`](Self::unary). Every stream gets a
    /// fresh request id, replacing any set upstream. Payloads are not
    /// logged; a failure to set up the stream is logged at error level.
    pub async fn streaming<Req, Resp, E, F, Fut>(
        &self,
        mut request: Request<Req>,
        handler: F,
    ) -> Result<Response<Resp>, Status>
    where
        F: FnOnce(Request<Req>) -> Fut,
        Fut: Future<Output = Result<Response<Resp>, E>>,
        E: Into<anyhow::Error>,
    {
        let request_id = RequestId::new();
        request.extensions_mut().insert(request_id.clone());
        let span = info_span!("call", request_id = %request_id);

        async move {
            match handler(request).await {
                Ok(response) => Ok(response),
                Err(err) => {
                    let error_type = std::any::type_name::<E>();
                    let err: anyhow::Error = err.into();
                    tracing::error!(error = %format!("{err:#}"), "Error: {err}");
                    Err(to_status_named(&err, error_type))
                }
            }
        }
        .instrument(span)
        .await
    }
}

/// Returns the id set by `RequestIdInterceptor`, or attaches a fresh one
/// so handlers can always find it in the extensions.
fn attach_request_id<T>(request: &mut Request<T>) -> RequestId {
    if let Some(id) = request.extensions().get::<RequestId>() {
        return id.clone();
    }
    let id = RequestId::new();
    request.extensions_mut().insert(id.clone());
    id
}
