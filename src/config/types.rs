use serde::Deserialize;

// -------------------------------------------------------------------------------------------------
// ---- LogLevel -----------------------------------------------------------------------------------

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

// -------------------------------------------------------------------------------------------------
// ---- NegotiationPolicy --------------------------------------------------------------------------

/// What to do when the client itself sends an SSLRequest. Either way the
/// session ends; the difference is whether the client is told 'N' first.
#[derive(clap::ValueEnum, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NegotiationPolicy {
    RejectSilently,
    #[default]
    RejectWithDeclineByte,
}

impl NegotiationPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            NegotiationPolicy::RejectSilently => "reject-silently",
            NegotiationPolicy::RejectWithDeclineByte => "reject-with-decline-byte",
        }
    }
}

// -------------------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------
