//! Error types for the relay binary.

/// Top-level error for the relay binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: tempo_core::ConfigError,
    },

    /// The clock could not be constructed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying adapter error.
        #[from]
        source: tempo_core::AdapterError,
    },

    /// The server failed to start, serve, or stop.
    #[error("server error: {source}")]
    Server {
        /// The underlying startup error.
        #[from]
        source: tempo_server::StartupError,
    },

    /// Installing a signal handler failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
