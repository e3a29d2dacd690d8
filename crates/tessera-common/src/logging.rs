//! Diagnostic logging setup
//!
//! tessera crates emit their own diagnostics through `tracing`. Applications
//! either install their own subscriber or call [`init`] once at startup:
//! - Minimum level from options, falling back to `RUST_LOG`, then `info`
//! - Output to stderr so it never mixes with stream log files
//! - Error cause-chain formatting for structured fields

use tracing_subscriber::{fmt, EnvFilter};

/// Default filter directive when neither options nor `RUST_LOG` set one
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Diagnostic level accepted by [`LogOptions`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl DiagnosticLevel {
    /// Parse a level name, case-insensitive
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Filter directive for this level
    pub fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Subscriber options
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Minimum level; `None` defers to `RUST_LOG`
    pub level: Option<DiagnosticLevel>,
    /// Emit ANSI colours
    pub ansi: bool,
    /// Include the event target (module path)
    pub with_target: bool,
}

/// Build the env filter for the given options
pub fn build_filter(options: &LogOptions) -> EnvFilter {
    match options.level {
        Some(level) => EnvFilter::new(level.as_directive()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
    }
}

/// Install a global fmt subscriber
///
/// Returns `false` when a global subscriber was already installed, which is
/// the normal case in test binaries and embedding applications.
pub fn init(options: LogOptions) -> bool {
    let filter = build_filter(&options);
    let directive = filter.to_string();
    let installed = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(options.ansi)
        .with_target(options.with_target)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(filter = %directive, "diagnostic logging initialized");
    }
    installed
}

/// Format an error with its cause chain
pub fn format_error(error: &dyn std::error::Error) -> String {
    const MAX_DEPTH: usize = 10;

    let mut rendered = error.to_string();
    let mut source = error.source();
    let mut depth = 1;
    while let Some(cause) = source {
        if depth >= MAX_DEPTH {
            break;
        }
        rendered.push_str(" Caused by: ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
        depth += 1;
    }
    rendered
}
