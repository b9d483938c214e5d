use std::error::Error as StdError;

use grpc_interceptors::{
    Classifiable, ContextError, ErrorKind, classify, impl_classifiable,
    to_status,
};
use proptest::prelude::*;
use tonic::{Code, Status};

#[derive(Debug, thiserror::Error)]
#[error("{context}")]
struct Wrapped {
    context: String,
    #[source]
    source: Box<dyn StdError + Send + Sync>,
}

impl_classifiable!(Wrapped);

fn wrap(context: &str, source: impl StdError + Send + Sync + 'static) -> Wrapped {
    Wrapped {
        context: context.to_string(),
        source: Box::new(source),
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct Leaf(String);

impl_classifiable!(Leaf);

#[test]
fn canceled_sentinel_at_depth_three() {
    let err = wrap(
        "reserve seat",
        wrap("lock row", wrap("select for update", ContextError::Canceled)),
    );
    let c = classify(&err);
    assert_eq!(c.code(), Code::Cancelled);
    assert_eq!(c.message(), "request was canceled");
}

#[test]
fn deadline_sentinel_without_matching_text() {
    // tokio's Elapsed displays as "deadline has elapsed", which no message
    // rule knows about.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let elapsed = rt
        .block_on(async {
            tokio::time::timeout(
                std::time::Duration::from_millis(1),
                std::future::pending::<()>(),
            )
            .await
        })
        .unwrap_err();

    let err = wrap("fetch inventory", elapsed);
    assert!(!err.flatten().contains("context deadline exceeded"));
    let c = classify(&err);
    assert_eq!(c.code(), Code::DeadlineExceeded);
    assert_eq!(c.message(), "request deadline exceeded");
}

#[test]
fn message_rules_cover_every_code() {
    let cases = [
        ("context canceled", Code::Cancelled, "request was canceled"),
        (
            "context deadline exceeded",
            Code::DeadlineExceeded,
            "request deadline exceeded",
        ),
        (
            "dial tcp 10.0.0.7:5432: connection refused",
            Code::Unavailable,
            "database connection unavailable",
        ),
        (
            "read tcp: connection reset by peer",
            Code::Unavailable,
            "database connection unavailable",
        ),
        (
            "write: broken pipe",
            Code::Unavailable,
            "database connection unavailable",
        ),
        (
            "booking already expired",
            Code::FailedPrecondition,
            "booking already expired",
        ),
        (
            "reservation max retry exceeded",
            Code::ResourceExhausted,
            "reservation max retry exceeded",
        ),
        (
            "booking release max retry exceeded",
            Code::ResourceExhausted,
            "booking release max retry exceeded",
        ),
        (
            "no seat available in row 12",
            Code::ResourceExhausted,
            "seats are not available",
        ),
        (
            "first class is not available for sale",
            Code::FailedPrecondition,
            "class is not available for sale",
        ),
        (
            "pq: invalid input syntax for type uuid: \"xyz\"",
            Code::InvalidArgument,
            "invalid UUID format",
        ),
    ];

    for (text, code, message) in cases {
        let c = classify(&Leaf(text.to_string()));
        assert_eq!(c.code(), code, "{text}");
        assert_eq!(c.message(), message, "{text}");
    }
}

#[test]
fn text_from_inner_causes_is_matched() {
    let err = wrap("reserve seat", Leaf("economy class is sold out".into()));
    let c = classify(&err);
    assert_eq!(c.code(), Code::ResourceExhausted);
    assert_eq!(c.kind(), ErrorKind::Exhausted);
}

#[test]
fn internal_message_is_the_flattened_text() {
    let err = wrap("reserve seat", Leaf("unexpected nil pointer at line 88".into()));
    let c = classify(&err);
    assert_eq!(c.code(), Code::Internal);
    assert_eq!(c.message(), "reserve seat: unexpected nil pointer at line 88");
}

#[test]
fn unrelated_connection_reset_is_still_unavailable() {
    // Substring matching is kept exact, even when the text is incidental.
    let c = classify("audit log: last line was 'connection reset'");
    assert_eq!(c.code(), Code::Unavailable);
}

#[test]
fn boxed_dyn_errors_are_classifiable() {
    let err: Box<dyn StdError + Send + Sync> = Box::new(Leaf("broken pipe".into()));
    assert_eq!(classify(&*err).code(), Code::Unavailable);

    let err: Box<dyn StdError> = Box::new(ContextError::DeadlineExceeded);
    assert_eq!(classify(&*err).code(), Code::DeadlineExceeded);
}

#[test]
fn io_errors_are_classifiable() {
    let err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
    assert_eq!(classify(&err).code(), Code::Unavailable);
    assert_eq!(to_status(&err).message(), "database connection unavailable");
}

proptest! {
    #[test]
    fn never_produces_ok(text in ".*") {
        let c = classify(text.as_str());
        prop_assert_ne!(c.code(), Code::Ok);
    }

    #[test]
    fn unmatched_text_is_passed_through(text in "[a-z ]{0,40}") {
        let c = classify(text.as_str());
        if c.kind() == ErrorKind::Internal {
            prop_assert_eq!(c.message(), text.as_str());
        }
    }

    #[test]
    fn reclassifying_a_status_is_a_no_op(text in ".*") {
        let first = classify(text.as_str());
        let status: Status = first.clone().into();
        let again = classify(&status);
        prop_assert_eq!(again.code(), first.code());
        prop_assert_eq!(again.message(), first.message());
    }

    #[test]
    fn sentinels_win_over_any_text(text in ".*", canceled in any::<bool>()) {
        let sentinel = if canceled {
            ContextError::Canceled
        } else {
            ContextError::DeadlineExceeded
        };
        let c = classify(&wrap(&text, sentinel));
        let expected = if canceled { Code::Cancelled } else { Code::DeadlineExceeded };
        prop_assert_eq!(c.code(), expected);
    }
}
