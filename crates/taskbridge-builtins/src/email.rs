use crate::fields::{optional_str, required_str};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Instant;
use taskbridge_agents::Capability;
use taskbridge_core::{AgentResult, Context, Task};
use tracing::debug;

/// Prepares application emails.
///
/// The agent only produces drafts (`sent` is always `false`); it needs an
/// SMTP host to be considered ready, so without one it registers as
/// unavailable.
///
/// Payload: `to` (required), `subject` (optional), `body` (optional when a
/// `cover_letter` result is in the context).
#[derive(Debug, Default)]
pub struct EmailAgent {
    smtp_host: Option<String>,
}

impl EmailAgent {
    pub fn new(smtp_host: Option<String>) -> Self {
        Self {
            smtp_host: smtp_host.filter(|h| !h.trim().is_empty()),
        }
    }

    pub fn smtp_host(&self) -> Option<&str> {
        self.smtp_host.as_deref()
    }

    fn compose(&self, ctx: &Context) -> Result<Value, String> {
        let host = self
            .smtp_host
            .as_deref()
            .ok_or_else(|| "no SMTP host configured".to_string())?;
        let to = required_str(ctx.payload(), "to")?;
        if !to.contains('@') {
            return Err(format!("invalid recipient address '{to}'"));
        }
        let subject = optional_str(ctx.payload(), "subject").unwrap_or("Job application");

        let body = ctx
            .dependency("cover_letter")
            .and_then(|c| c["letter"].as_str())
            .or_else(|| optional_str(ctx.payload(), "body"))
            .ok_or_else(|| "no body given and no cover letter in context".to_string())?;

        debug!(to, subject, smtp_host = host, "Email draft prepared");
        Ok(json!({
            "to": to,
            "subject": subject,
            "body": body,
            "smtp_host": host,
            "sent": false,
        }))
    }
}

#[async_trait]
impl Capability for EmailAgent {
    fn name(&self) -> &str {
        "email"
    }

    async fn execute(&self, ctx: &Context) -> AgentResult {
        let start = Instant::now();
        match self.compose(ctx) {
            Ok(data) => AgentResult::success(data, start.elapsed()),
            Err(e) => AgentResult::failure(e, start.elapsed()),
        }
    }

    async fn self_test(&self) -> bool {
        let probe = Context::new(Task::new(
            "email",
            json!({"to": "probe@example.invalid", "body": "probe"}),
        ));
        self.compose(&probe).is_ok()
    }

    fn readiness(&self) -> Result<(), String> {
        match self.smtp_host {
            Some(_) => Ok(()),
            None => Err("SMTP host not configured".into()),
        }
    }
}
