use std::error::Error as StdError;

use tokio::task::JoinError;
use tokio::time::error::Elapsed;
use tonic::Status;

/// Upper bound on how many causes are inspected. Guards against cyclic or
/// pathologically deep `source()` implementations.
pub const MAX_CHAIN_DEPTH: usize = 64;

/// An error that can be mapped onto a gRPC status.
///
/// Error-backed kinds expose their cause chain through [`links`], text-only
/// kinds return [`Links::empty`] and override [`flatten`].
///
/// [`links`]: Classifiable::links
/// [`flatten`]: Classifiable::flatten
pub trait Classifiable {
    /// The error itself followed by each `source()`, outermost first.
    fn links(&self) -> Links<'_>;

    /// Textual form used by the message rules and the INTERNAL fallback.
    fn flatten(&self) -> String {
        flatten_links(self.links())
    }
}

/// Iterator over an error's cause chain, bounded by [`MAX_CHAIN_DEPTH`].
#[derive(Clone)]
pub struct Links<'a> {
    next: Option<&'a (dyn StdError + 'static)>,
    remaining: usize,
}

impl<'a> Links<'a> {
    pub fn new(root: &'a (dyn StdError + 'static)) -> Self {
        Self {
            next: Some(root),
            remaining: MAX_CHAIN_DEPTH,
        }
    }

    pub fn empty() -> Self {
        Self {
            next: None,
            remaining: 0,
        }
    }
}

impl<'a> Iterator for Links<'a> {
    type Item = &'a (dyn StdError + 'static);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next.take()?;
        self.remaining -= 1;
        self.next = current.source();
        Some(current)
    }
}

/// Joins the outermost message with every cause whose text is not already
/// part of it, separated by `": "`.
pub fn flatten_links(links: Links<'_>) -> String {
    let mut text = String::new();
    for (depth, link) in links.enumerate() {
        let part = link.to_string();
        if depth == 0 {
            text = part;
        } else if !part.is_empty() && !text.contains(&part) {
            text.push_str(": ");
            text.push_str(&part);
        }
    }
    text
}

/// Well-known infrastructure conditions recognised by identity rather than
/// by message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Matches a single link against the known sentinels.
pub(crate) fn sentinel(link: &(dyn StdError + 'static)) -> Option<ContextError> {
    if let Some(err) = link.downcast_ref::<ContextError>() {
        return Some(*err);
    }
    if link.is::<Elapsed>() {
        return Some(ContextError::DeadlineExceeded);
    }
    if let Some(err) = link.downcast_ref::<JoinError>()
        && err.is_cancelled()
    {
        return Some(ContextError::Canceled);
    }
    None
}

/// First link that already is a gRPC status.
pub(crate) fn find_status<'a>(mut links: Links<'a>) -> Option<&'a Status> {
    links.find_map(|link| link.downcast_ref::<Status>())
}

impl Classifiable for dyn StdError + 'static {
    fn links(&self) -> Links<'_> {
        Links::new(self)
    }
}

impl Classifiable for dyn StdError + Send + Sync + 'static {
    fn links(&self) -> Links<'_> {
        Links::new(self)
    }
}

impl Classifiable for anyhow::Error {
    fn links(&self) -> Links<'_> {
        let root: &(dyn StdError + 'static) = &**self;
        Links::new(root)
    }
}

impl Classifiable for str {
    fn links(&self) -> Links<'_> {
        Links::empty()
    }

    fn flatten(&self) -> String {
        self.to_owned()
    }
}

impl Classifiable for String {
    fn links(&self) -> Links<'_> {
        Links::empty()
    }

    fn flatten(&self) -> String {
        self.clone()
    }
}

crate::impl_classifiable!(ContextError);
crate::impl_classifiable!(Status);
crate::impl_classifiable!(std::io::Error);
crate::impl_classifiable!(Elapsed);
crate::impl_classifiable!(JoinError);
