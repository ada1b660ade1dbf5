use netloc_core::CoreError;
use thiserror::Error;

/// Failures talking to the host: spawning tools, reading their output,
/// or fetching over HTTP.
///
/// Never crosses into `netloc-core` as-is; the providers convert it into
/// the query or mutation flavour of [`CoreError`] at the trait boundary.
#[derive(Debug, Error)]
pub enum SystemError {
    // ── Processes ───────────────────────────────────────────────────
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{program} timed out after {timeout_secs}s")]
    Timeout { program: String, timeout_secs: u64 },

    #[error("Unexpected output from {program}: {message}")]
    Parse { program: String, message: String },

    // ── HTTP ────────────────────────────────────────────────────────
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SystemError {
    pub(crate) fn parse(program: &str, message: impl Into<String>) -> Self {
        Self::Parse {
            program: program.to_owned(),
            message: message.into(),
        }
    }

    pub fn into_query(self, query: &str) -> CoreError {
        CoreError::query(query, self)
    }

    pub fn into_mutation(self, setting: &str) -> CoreError {
        CoreError::mutation(setting, self)
    }
}
