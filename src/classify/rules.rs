use tonic::Code;

use super::ErrorKind;

/// A message rule: if the flattened text contains any of `needles`, the
/// error is reported as (`code`, `message`).
#[derive(Debug)]
pub(crate) struct Rule {
    pub needles: &'static [&'static str],
    pub code: Code,
    pub message: &'static str,
    pub kind: ErrorKind,
}

impl Rule {
    pub fn matches(&self, text: &str) -> bool {
        self.needles.iter().any(|needle| text.contains(needle))
    }
}

/// Evaluated top to bottom, first match wins. Cancellation and deadline
/// must stay ahead of the connection rules.
pub(crate) static RULES: &[Rule] = &[
    Rule {
        needles: &["context canceled"],
        code: Code::Cancelled,
        message: "request was canceled",
        kind: ErrorKind::Canceled,
    },
    Rule {
        needles: &["context deadline exceeded"],
        code: Code::DeadlineExceeded,
        message: "request deadline exceeded",
        kind: ErrorKind::DeadlineExceeded,
    },
    // Database connectivity
    Rule {
        needles: &[
            "driver: bad connection",
            "connection refused",
            "connection reset",
            "broken pipe",
        ],
        code: Code::Unavailable,
        message: "database connection unavailable",
        kind: ErrorKind::Unavailable,
    },
    // Booking
    Rule {
        needles: &["booking already expired"],
        code: Code::FailedPrecondition,
        message: "booking already expired",
        kind: ErrorKind::Precondition,
    },
    Rule {
        needles: &["reservation max retry exceeded"],
        code: Code::ResourceExhausted,
        message: "reservation max retry exceeded",
        kind: ErrorKind::Exhausted,
    },
    Rule {
        needles: &["booking release max retry exceeded"],
        code: Code::ResourceExhausted,
        message: "booking release max retry exceeded",
        kind: ErrorKind::Exhausted,
    },
    // Seat availability
    Rule {
        needles: &["class is sold out", "no seat available"],
        code: Code::ResourceExhausted,
        message: "seats are not available",
        kind: ErrorKind::Exhausted,
    },
    Rule {
        needles: &["class is not available for sale"],
        code: Code::FailedPrecondition,
        message: "class is not available for sale",
        kind: ErrorKind::Precondition,
    },
    // PostgreSQL
    Rule {
        needles: &["invalid input syntax for type uuid"],
        code: Code::InvalidArgument,
        message: "invalid UUID format",
        kind: ErrorKind::InvalidInput,
    },
];

pub(crate) fn first_match(text: &str) -> Option<&'static Rule> {
    RULES.iter().find(|rule| rule.matches(text))
}
