//! Service-level audit loggers.
//!
//! HTTP traffic goes through `tracing`; services additionally write audit
//! lines (status transitions, automatic rewrites, deletions) through a `slog`
//! logger tagged with their component name.

use slog::{o, Discard, Drain, Logger};
use slog_async::Async;
use slog_term::{FullFormat, PlainDecorator, TermDecorator};

/// Configuration for setting up the logger
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub async_buffer_size: usize,
    pub use_color: bool,
    /// Drop every record. Used by tests and tools that only need `tracing`.
    pub silent: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            async_buffer_size: 1024,
            use_color: true,
            silent: false,
        }
    }
}

impl LoggerConfig {
    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::default()
        }
    }
}

/// Sets up a logger with configurable options
pub fn setup_logger(config: LoggerConfig) -> Logger {
    let root_values = o!("service" => "expedition-api", "version" => env!("CARGO_PKG_VERSION"));

    if config.silent {
        return Logger::root(Discard, root_values);
    }

    if config.use_color {
        let decorator = TermDecorator::new().force_color().build();
        let drain = FullFormat::new(decorator).build().fuse();
        let drain = Async::new(drain)
            .chan_size(config.async_buffer_size)
            .build()
            .fuse();
        Logger::root(drain, root_values)
    } else {
        let decorator = PlainDecorator::new(std::io::stdout());
        let drain = FullFormat::new(decorator).build().fuse();
        let drain = Async::new(drain)
            .chan_size(config.async_buffer_size)
            .build()
            .fuse();
        Logger::root(drain, root_values)
    }
}

/// Child logger for one service component.
pub fn component_logger(base: &Logger, component: &'static str) -> Logger {
    base.new(o!("component" => component))
}
