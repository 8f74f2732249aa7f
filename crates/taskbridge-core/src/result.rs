use serde::Serialize;
use std::time::Duration;

/// Maximum characters of data/error echoed into log summaries.
const SUMMARY_LIMIT: usize = 120;

/// Outcome of one capability invocation.
///
/// Exactly one of `data` / `error` is populated; the only way to build a
/// result is through [`AgentResult::success`] or [`AgentResult::failure`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentResult {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    duration_ms: u64,
}

impl AgentResult {
    /// A successful invocation that produced `data`.
    pub fn success(data: serde_json::Value, duration: Duration) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            duration_ms: saturating_millis(duration),
        }
    }

    /// A failed invocation.
    pub fn failure(error: impl Into<String>, duration: Duration) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            duration_ms: saturating_millis(duration),
        }
    }

    /// Same outcome, with the duration replaced.
    ///
    /// The worker measures wall-clock time itself and stamps it over whatever
    /// the capability reported.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = saturating_millis(duration);
        self
    }

    /// Whether the invocation succeeded.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Produced data, on success.
    pub fn data(&self) -> Option<&serde_json::Value> {
        self.data.as_ref()
    }

    /// Error description, on failure.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Wall-clock duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Consume the result, yielding the data on success or the error text.
    pub fn into_outcome(self) -> Result<serde_json::Value, String> {
        match (self.data, self.error) {
            (Some(data), None) => Ok(data),
            (_, Some(error)) => Err(error),
            (None, None) => Err("result carried neither data nor error".to_string()),
        }
    }

    /// Short one-line rendering for log events.
    pub fn summary(&self) -> String {
        let text = match (&self.data, &self.error) {
            (Some(data), _) => data.to_string(),
            (_, Some(error)) => error.clone(),
            _ => String::new(),
        };
        truncate(&text, SUMMARY_LIMIT)
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(limit).collect();
        out.push('…');
        out
    }
}

/// Whole milliseconds in `duration`, clamped to `u64::MAX`.
fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
