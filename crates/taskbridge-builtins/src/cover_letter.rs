use crate::fields::{optional_str, required_str};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Instant;
use taskbridge_agents::Capability;
use taskbridge_core::{AgentResult, Context, Task};

/// Drafts a cover letter.
///
/// Payload: `company` (required), `role` (optional). Reads the
/// `applicant` parameter and, when present, the `resume` agent's matched
/// keywords from the context.
#[derive(Debug, Default)]
pub struct CoverLetterAgent;

impl CoverLetterAgent {
    pub fn new() -> Self {
        Self
    }

    fn draft(&self, ctx: &Context) -> Result<Value, String> {
        let company = required_str(ctx.payload(), "company")?;
        let role = optional_str(ctx.payload(), "role").unwrap_or("the open position");
        let applicant = ctx
            .param("applicant")
            .and_then(Value::as_str)
            .unwrap_or("the applicant");

        let skills: Vec<&str> = ctx
            .dependency("resume")
            .and_then(|r| r["matched_keywords"].as_array())
            .map(|kws| kws.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut letter = format!("Dear {company} hiring team,\n\nI am writing to apply for {role}.");
        if !skills.is_empty() {
            letter.push_str(&format!(
                " My background in {} matches what you are looking for.",
                skills.join(", ")
            ));
        }
        letter.push_str(&format!("\n\nSincerely,\n{applicant}"));

        Ok(json!({
            "letter": letter,
            "company": company,
            "used_resume": !skills.is_empty(),
        }))
    }
}

#[async_trait]
impl Capability for CoverLetterAgent {
    fn name(&self) -> &str {
        "cover_letter"
    }

    async fn execute(&self, ctx: &Context) -> AgentResult {
        let start = Instant::now();
        match self.draft(ctx) {
            Ok(data) => AgentResult::success(data, start.elapsed()),
            Err(e) => AgentResult::failure(e, start.elapsed()),
        }
    }

    async fn self_test(&self) -> bool {
        let probe = Context::new(Task::new("cover_letter", json!({"company": "Probe Inc"})));
        self.draft(&probe).is_ok()
    }
}
