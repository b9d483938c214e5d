//! Call lifecycle logging on top of `tracing`.
//!
//! [`CallLogLayer`] records when a call starts and finishes, [`init`]
//! installs the process-wide subscriber those records go to.

use serde::Deserialize;
use tonic::Code;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::Result;
use crate::config::{InterceptorConfig, LogFormat};
use crate::error::Error;

/// `tracing` only accepts constant levels, this picks the macro at runtime.
macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {{
        let level: ::tracing::Level = $level;
        if level == ::tracing::Level::ERROR {
            ::tracing::error!($($arg)+)
        } else if level == ::tracing::Level::WARN {
            ::tracing::warn!($($arg)+)
        } else if level == ::tracing::Level::INFO {
            ::tracing::info!($($arg)+)
        } else if level == ::tracing::Level::DEBUG {
            ::tracing::debug!($($arg)+)
        } else {
            ::tracing::trace!($($arg)+)
        }
    }};
}
pub(crate) use log_at;

mod layer;

pub use layer::{CallLogLayer, CallLogService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEvent {
    StartCall,
    PayloadReceived,
    PayloadSent,
    FinishCall,
}

impl LogEvent {
    fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Set of lifecycle events that get logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "Vec<LogEvent>")]
pub struct LogEvents(u8);

impl LogEvents {
    pub const NONE: LogEvents = LogEvents(0);
    pub const ALL: LogEvents = LogEvents(0b1111);

    pub fn contains(self, event: LogEvent) -> bool {
        self.0 & event.bit() != 0
    }

    #[must_use]
    pub fn with(self, event: LogEvent) -> Self {
        LogEvents(self.0 | event.bit())
    }
}

impl Default for LogEvents {
    fn default() -> Self {
        LogEvents::ALL
    }
}

impl FromIterator<LogEvent> for LogEvents {
    fn from_iter<I: IntoIterator<Item = LogEvent>>(iter: I) -> Self {
        iter.into_iter().fold(LogEvents::NONE, LogEvents::with)
    }
}

impl From<Vec<LogEvent>> for LogEvents {
    fn from(events: Vec<LogEvent>) -> Self {
        events.into_iter().collect()
    }
}

/// Which end of the call is being logged. Client and server rate the same
/// code differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Server,
    Client,
}

impl Side {
    pub fn component(self) -> &'static str {
        match self {
            Side::Server => "server",
            Side::Client => "client",
        }
    }

    pub fn code_to_level(self, code: Code) -> Level {
        match self {
            Side::Server => server_code_to_level(code),
            Side::Client => client_code_to_level(code),
        }
    }

    pub(crate) fn start_level(self) -> Level {
        match self {
            Side::Server => Level::INFO,
            Side::Client => Level::DEBUG,
        }
    }
}

pub fn server_code_to_level(code: Code) -> Level {
    match code {
        Code::Ok
        | Code::NotFound
        | Code::Cancelled
        | Code::AlreadyExists
        | Code::InvalidArgument
        | Code::Unauthenticated => Level::INFO,

        Code::DeadlineExceeded
        | Code::PermissionDenied
        | Code::ResourceExhausted
        | Code::FailedPrecondition
        | Code::Aborted
        | Code::OutOfRange
        | Code::Unavailable => Level::WARN,

        Code::Unknown | Code::Unimplemented | Code::Internal | Code::DataLoss => {
            Level::ERROR
        }
    }
}

pub fn client_code_to_level(code: Code) -> Level {
    match code {
        Code::Ok
        | Code::Cancelled
        | Code::InvalidArgument
        | Code::NotFound
        | Code::AlreadyExists
        | Code::ResourceExhausted
        | Code::FailedPrecondition
        | Code::Aborted
        | Code::OutOfRange => Level::DEBUG,

        Code::Unknown
        | Code::DeadlineExceeded
        | Code::PermissionDenied
        | Code::Unauthenticated => Level::INFO,

        Code::Unimplemented | Code::Internal | Code::Unavailable | Code::DataLoss => {
            Level::WARN
        }
    }
}

/// Installs the global `tracing` subscriber.
///
/// Returns an error instead of panicking when the filter does not parse or
/// a subscriber is already installed.
pub fn init(config: &InterceptorConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_filter)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match config.log_format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
    installed.map_err(|e| Error::Subscriber(e.to_string()))
}
