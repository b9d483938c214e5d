//! Tower middleware that logs the lifecycle of every gRPC call.
//!
//! Sits at the HTTP/2 level, so it sees unary and streaming calls alike.
//! The status code is read from the `grpc-status` header, which tonic sets
//! on trailers-only (error) responses; anything else is reported as `OK`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use http::{HeaderName, HeaderValue};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tonic::Code;
use tower::{Layer, Service};
use tracing::{Instrument, info_span};

use super::{LogEvent, LogEvents, Side};
use crate::Result;
use crate::config::InterceptorConfig;
use crate::interceptor::RequestId;

const GRPC_STATUS: &str = "grpc-status";

// ---------------------------------------------------------------------------
// CallLogLayer
// ---------------------------------------------------------------------------

/// Layer for `tonic::transport::Server::builder().layer(..)` or for a client
/// `Channel` wrapped with `tower::ServiceBuilder`.
#[derive(Debug, Clone)]
pub struct CallLogLayer {
    header: HeaderName,
    events: LogEvents,
    side: Side,
}

impl CallLogLayer {
    pub fn new(config: &InterceptorConfig, side: Side) -> Result<Self> {
        Ok(Self {
            header: config.request_id_header_name()?,
            events: config.log_events,
            side,
        })
    }

    pub fn server() -> Self {
        Self {
            header: HeaderName::from_static(crate::config::DEFAULT_REQUEST_ID_HEADER),
            events: LogEvents::default(),
            side: Side::Server,
        }
    }

    pub fn client() -> Self {
        Self {
            side: Side::Client,
            ..Self::server()
        }
    }
}

impl<S> Layer<S> for CallLogLayer {
    type Service = CallLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CallLogService {
            inner,
            header: self.header.clone(),
            events: self.events,
            side: self.side,
        }
    }
}

// ---------------------------------------------------------------------------
// CallLogService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CallLogService<S> {
    inner: S,
    header: HeaderName,
    events: LogEvents,
    side: Side,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for CallLogService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: fmt::Display + 'static,
    ReqBody: 'static,
    ResBody: 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future =
        Pin<Box<dyn Future<Output = std::result::Result<S::Response, S::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: http::Request<ReqBody>) -> Self::Future {
        let request_id = ensure_request_id(&self.header, req.headers_mut());
        let (service, method) = split_path(req.uri().path());

        let span = info_span!(
            "grpc",
            request_id = %request_id,
            grpc.component = self.side.component(),
            grpc.service = %service,
            grpc.method = %method,
        );

        let header = self.header.clone();
        let events = self.events;
        let side = self.side;
        let fut = self.inner.call(req);

        Box::pin(
            async move {
                let start = Instant::now();
                if events.contains(LogEvent::StartCall) {
                    let start_time = OffsetDateTime::now_utc()
                        .format(&Rfc3339)
                        .unwrap_or_default();
                    log_at!(side.start_level(), grpc.start_time = %start_time, "started call");
                }

                let result = fut.await;
                let time_ms = start.elapsed().as_secs_f64() * 1000.0;

                match result {
                    Ok(mut response) => {
                        if events.contains(LogEvent::FinishCall) {
                            let code = response_code(response.headers());
                            log_at!(
                                side.code_to_level(code),
                                grpc.code = ?code,
                                grpc.time_ms = time_ms,
                                "finished call"
                            );
                        }
                        if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
                            response.headers_mut().entry(header).or_insert(value);
                        }
                        Ok(response)
                    }
                    Err(err) => {
                        if events.contains(LogEvent::FinishCall) {
                            tracing::error!(
                                error = %err,
                                grpc.time_ms = time_ms,
                                "finished call"
                            );
                        }
                        Err(err)
                    }
                }
            }
            .instrument(span),
        )
    }
}

/// Reads the request id header, minting and inserting one when missing.
fn ensure_request_id(header: &HeaderName, headers: &mut http::HeaderMap) -> RequestId {
    if let Some(id) = headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .and_then(RequestId::from_value)
    {
        return id;
    }
    let id = RequestId::new();
    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        headers.insert(header.clone(), value);
    }
    id
}

/// Splits `/package.Service/Method` into its service and method parts.
fn split_path(path: &str) -> (String, String) {
    match path.trim_start_matches('/').split_once('/') {
        Some((service, method)) => (service.to_string(), method.to_string()),
        None => ("unknown".to_string(), path.to_string()),
    }
}

fn response_code(headers: &http::HeaderMap) -> Code {
    headers
        .get(GRPC_STATUS)
        .map(|v| Code::from_bytes(v.as_bytes()))
        .unwrap_or(Code::Ok)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
