use crate::fields::{keywords, optional_str, required_str};
use async_trait::async_trait;
use serde_json::json;
use std::time::{Duration, Instant};
use taskbridge_agents::Capability;
use taskbridge_core::{AgentResult, Context, Task};

/// Tailors a resume to a job description.
///
/// Payload: `resume` (required), `job_description` (optional). Output:
/// `tailored_resume`, `matched_keywords`, `missing_keywords`.
#[derive(Debug, Default)]
pub struct ResumeAgent;

impl ResumeAgent {
    pub fn new() -> Self {
        Self
    }

    fn tailor(&self, ctx: &Context) -> Result<serde_json::Value, String> {
        let resume = required_str(ctx.payload(), "resume")?;
        let job_keywords = optional_str(ctx.payload(), "job_description")
            .map(keywords)
            .unwrap_or_default();

        let resume_lower = resume.to_lowercase();
        let (matched, missing): (Vec<String>, Vec<String>) = job_keywords
            .into_iter()
            .partition(|kw| resume_lower.contains(kw.as_str()));

        let mut tailored = resume.trim().to_string();
        if !matched.is_empty() {
            tailored.push_str("\n\nKey skills: ");
            tailored.push_str(&matched.join(", "));
        }

        Ok(json!({
            "tailored_resume": tailored,
            "matched_keywords": matched,
            "missing_keywords": missing,
        }))
    }
}

#[async_trait]
impl Capability for ResumeAgent {
    fn name(&self) -> &str {
        "resume"
    }

    async fn execute(&self, ctx: &Context) -> AgentResult {
        let start = Instant::now();
        match self.tailor(ctx) {
            Ok(data) => AgentResult::success(data, start.elapsed()),
            Err(e) => AgentResult::failure(e, start.elapsed()),
        }
    }

    async fn self_test(&self) -> bool {
        let probe = Context::new(Task::new(
            "resume",
            json!({"resume": "Rust developer", "job_description": "Senior Rust developer"}),
        ));
        self.tailor(&probe)
            .map(|v| v["matched_keywords"] == json!(["rust", "developer"]))
            .unwrap_or(false)
    }
}
