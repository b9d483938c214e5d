//! Maps application failures onto the small set of gRPC status codes a
//! caller gets to see.
//!
//! The decision is, in order: an error that already is a [`Status`] passes
//! through, a cancellation or deadline sentinel anywhere in the cause chain
//! wins, then the flattened message is matched against a fixed list of
//! substrings, and anything left over becomes `INTERNAL` with the raw text.

use std::borrow::Cow;
use std::fmt;

use tonic::{Code, Status};

mod chain;
mod rules;

pub use chain::{
    Classifiable, ContextError, Links, MAX_CHAIN_DEPTH, flatten_links,
};

/// Which branch of the taxonomy produced a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The error already carried a gRPC status.
    Passthrough,
    Canceled,
    DeadlineExceeded,
    Unavailable,
    Precondition,
    Exhausted,
    InvalidInput,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Passthrough => "passthrough",
            ErrorKind::Canceled => "transport-cancellation",
            ErrorKind::DeadlineExceeded => "transport-deadline",
            ErrorKind::Unavailable => "infrastructure-unavailable",
            ErrorKind::Precondition => "business-precondition-violation",
            ErrorKind::Exhausted => "business-resource-exhaustion",
            ErrorKind::InvalidInput => "input-validation-failure",
            ErrorKind::Internal => "unclassified-internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classification: the code and message sent to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    code: Code,
    message: Cow<'static, str>,
    kind: ErrorKind,
}

impl Classified {
    const fn fixed(code: Code, message: &'static str, kind: ErrorKind) -> Self {
        Self {
            code,
            message: Cow::Borrowed(message),
            kind,
        }
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn into_status(self) -> Status {
        Status::new(self.code, self.message)
    }
}

impl From<ContextError> for Classified {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Canceled => Classified::fixed(
                Code::Cancelled,
                "request was canceled",
                ErrorKind::Canceled,
            ),
            ContextError::DeadlineExceeded => Classified::fixed(
                Code::DeadlineExceeded,
                "request deadline exceeded",
                ErrorKind::DeadlineExceeded,
            ),
        }
    }
}

impl From<Classified> for Status {
    fn from(classified: Classified) -> Self {
        classified.into_status()
    }
}

/// Classifies a failed call's error.
///
/// Never fails: every input ends up with exactly one code. Errors that reach
/// the message rules are logged once at debug level.
pub fn classify<E>(err: &E) -> Classified
where
    E: Classifiable + ?Sized,
{
    if let Some(status) = chain::find_status(err.links()) {
        return Classified {
            code: status.code(),
            message: Cow::Owned(status.message().to_owned()),
            kind: ErrorKind::Passthrough,
        };
    }
    classify_unstructured(err, std::any::type_name::<E>())
}

/// Like [`classify`], but an error that already carries a [`Status`] is
/// returned as that exact status, details and metadata included.
pub fn to_status<E>(err: &E) -> Status
where
    E: Classifiable + ?Sized,
{
    to_status_named(err, std::any::type_name::<E>())
}

/// [`to_status`] for callers that have already erased the concrete error
/// type; `error_type` is what the diagnostic event reports.
pub(crate) fn to_status_named<E>(err: &E, error_type: &'static str) -> Status
where
    E: Classifiable + ?Sized,
{
    match chain::find_status(err.links()) {
        Some(status) => status.clone(),
        None => classify_unstructured(err, error_type).into_status(),
    }
}

fn classify_unstructured<E>(err: &E, error_type: &'static str) -> Classified
where
    E: Classifiable + ?Sized,
{
    if let Some(sentinel) = err.links().find_map(chain::sentinel) {
        return sentinel.into();
    }

    let text = err.flatten();
    tracing::debug!(
        error_type,
        error_msg = %text,
        "converting error to gRPC status"
    );

    match rules::first_match(&text) {
        Some(rule) => Classified::fixed(rule.code, rule.message, rule.kind),
        None => Classified {
            code: Code::Internal,
            message: Cow::Owned(text),
            kind: ErrorKind::Internal,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as StdError;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct Layer(&'static str, #[source] Box<dyn StdError + Send + Sync>);

    crate::impl_classifiable!(Layer);

    fn nest(inner: impl StdError + Send + Sync + 'static) -> Layer {
        Layer("repository", Box::new(inner))
    }

    fn assert_classified(c: Classified, code: Code, message: &str) {
        assert_eq!(c.code(), code);
        assert_eq!(c.message(), message);
    }

    #[test]
    fn canceled_sentinel_deep_in_chain() {
        let err = Layer(
            "handler",
            Box::new(Layer("service", Box::new(nest(ContextError::Canceled)))),
        );
        assert_eq!(err.links().count(), 4);
        assert_classified(classify(&err), Code::Cancelled, "request was canceled");
    }

    #[test]
    fn deadline_sentinel_beats_message_rules() {
        #[derive(Debug, thiserror::Error)]
        #[error("seat lock")]
        struct Opaque(#[source] ContextError);

        // The flattened text mentions a connection failure, but the chain
        // carries a deadline sentinel.
        let err = Layer("connection refused", Box::new(Opaque(ContextError::DeadlineExceeded)));
        let c = classify(&err);
        assert_classified(c.clone(), Code::DeadlineExceeded, "request deadline exceeded");
        assert_eq!(c.kind(), ErrorKind::DeadlineExceeded);
    }

    #[test]
    fn uuid_syntax_error() {
        let c = classify("pq: invalid input syntax for type uuid: \"xyz\"");
        assert_classified(c, Code::InvalidArgument, "invalid UUID format");
    }

    #[test]
    fn sold_out_class() {
        let c = classify("economy class is sold out for flight 42");
        assert_classified(c, Code::ResourceExhausted, "seats are not available");
    }

    #[test]
    fn unknown_error_passes_text_through_as_internal() {
        let c = classify("unexpected nil pointer at line 88");
        assert_classified(c.clone(), Code::Internal, "unexpected nil pointer at line 88");
        assert_eq!(c.kind(), ErrorKind::Internal);
    }

    #[test]
    fn empty_message_is_internal_and_empty() {
        assert_classified(classify(""), Code::Internal, "");
    }

    #[test]
    fn bad_driver_connection() {
        let c = classify("driver: bad connection");
        assert_classified(c, Code::Unavailable, "database connection unavailable");
    }

    #[test]
    fn cancellation_text_wins_over_connection_text() {
        let c = classify("context canceled: dial tcp 10.0.0.1:5432: connection refused");
        assert_classified(c, Code::Cancelled, "request was canceled");
    }

    #[test]
    fn status_passes_through_unchanged() {
        let status = Status::failed_precondition("seat map locked");
        let c = classify(&status);
        assert_classified(c.clone(), Code::FailedPrecondition, "seat map locked");
        assert_eq!(c.kind(), ErrorKind::Passthrough);

        // A status whose text would otherwise match a rule is not reclassified.
        let status = Status::internal("booking already expired");
        assert_classified(classify(&status), Code::Internal, "booking already expired");
    }

    #[test]
    fn wrapped_status_is_found_in_chain() {
        let err = nest(Status::not_found("flight 42"));
        assert_classified(classify(&err), Code::NotFound, "flight 42");
    }

    #[test]
    fn classification_is_idempotent() {
        for text in [
            "broken pipe",
            "reservation max retry exceeded after 3 attempts",
            "booking release max retry exceeded",
            "business class is not available for sale",
            "context deadline exceeded",
            "disk full",
        ] {
            let first = classify(text);
            let again = classify(&first.clone().into_status());
            assert_eq!(again.code(), first.code());
            assert_eq!(again.message(), first.message());
        }
    }

    #[test]
    fn to_status_keeps_original_status_metadata() {
        let mut metadata = tonic::metadata::MetadataMap::new();
        metadata.insert("x-fare-version", "2".parse().unwrap());
        let status =
            Status::with_metadata(Code::FailedPrecondition, "fare changed", metadata);

        let out = to_status(&nest(status));
        assert_eq!(out.code(), Code::FailedPrecondition);
        assert_eq!(out.message(), "fare changed");
        assert_eq!(out.metadata().get("x-fare-version").unwrap().to_str().unwrap(), "2");
    }

    #[test]
    fn kind_names_follow_taxonomy() {
        assert_eq!(ErrorKind::Exhausted.to_string(), "business-resource-exhaustion");
        assert_eq!(ErrorKind::InvalidInput.as_str(), "input-validation-failure");
    }
}
