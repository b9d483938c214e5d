pub use classify::{
    Classifiable, Classified, ContextError, ErrorKind, Links, classify,
    to_status,
};
pub use config::{InterceptorConfig, LogFormat};
pub use error::Error;
pub use handler::CallHandler;
pub use interceptor::{RequestId, RequestIdInterceptor};
pub use logging::{CallLogLayer, CallLogService, LogEvent, LogEvents, Side};

pub mod classify;
mod config;
mod error;
mod handler;
mod interceptor;
pub mod logging;

pub type Result<T> = std::result::Result<T, error::Error>;

pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}

#[macro_export]
macro_rules! impl_debug {
    ($type:ident) => {
        use $crate::error_chain_fmt;
        impl std::fmt::Debug for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                error_chain_fmt(self, f)
            }
        }
    };
}

/// Lets an error type take part in status classification through its
/// `Display` text and `source()` chain.
#[macro_export]
macro_rules! impl_classifiable {
    ($type:ty) => {
        impl $crate::Classifiable for $type {
            fn links(&self) -> $crate::Links<'_> {
                $crate::Links::new(self)
            }
        }
    };
}
