//! Diagnostic sink shared by every component
//!
//! Components log through `tracing`. Which subscriber receives those events is
//! decided by the [`Diagnostics`] value handed to the enumerator and copied
//! into every device handle, rather than by a process-wide global. The default
//! drops everything.

use tracing::Dispatch;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Where warnings and errors from enumeration and device handles go
#[derive(Debug, Clone, Default)]
pub enum Diagnostics {
    /// Use whatever dispatcher is current for the calling thread
    Inherit,
    /// Drop every event
    #[default]
    Discard,
    /// Route events to this dispatcher
    Sink(Dispatch),
}

impl Diagnostics {
    /// Run `f` with this sink as the current dispatcher
    pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        match self {
            Diagnostics::Inherit => f(),
            Diagnostics::Discard => tracing::dispatcher::with_default(&Dispatch::none(), f),
            Diagnostics::Sink(dispatch) => tracing::dispatcher::with_default(dispatch, f),
        }
    }
}

impl From<Dispatch> for Diagnostics {
    fn from(dispatch: Dispatch) -> Self {
        Diagnostics::Sink(dispatch)
    }
}

fn parse_filter(level: &str) -> crate::Result<EnvFilter> {
    EnvFilter::try_new(level).map_err(|e| crate::Error::Config(format!("Invalid log filter: {}", e)))
}

/// Check that `level` is a usable filter: a bare level or `RUST_LOG`-style
/// directives such as `hid=debug,warn`
pub fn validate_filter(level: &str) -> crate::Result<()> {
    parse_filter(level).map(|_| ())
}

/// Build a stderr sink filtered by `RUST_LOG`, falling back to `default_level`
///
/// The dispatcher is returned rather than installed globally.
pub fn diagnostic_sink(default_level: &str) -> crate::Result<Dispatch> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse_filter(default_level)?,
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr));

    Ok(Dispatch::new(subscriber))
}

/// Build a sink writing plain text to `writer`, filtered by `level` only
pub fn diagnostic_sink_with_writer<W>(level: &str, writer: W) -> crate::Result<Dispatch>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = parse_filter(level)?;

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false));

    Ok(Dispatch::new(subscriber))
}
