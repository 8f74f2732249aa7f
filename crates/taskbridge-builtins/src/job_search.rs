use crate::fields::{keywords, optional_str, required_str};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Instant;
use taskbridge_agents::Capability;
use taskbridge_core::{AgentResult, Context, Task};

/// A job posting known to the search agent.
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub title: &'static str,
    pub company: &'static str,
    pub location: &'static str,
    pub tags: &'static [&'static str],
}

const LISTINGS: &[Listing] = &[
    Listing {
        title: "Senior Rust Engineer",
        company: "Ferrous Systems Co",
        location: "Remote",
        tags: &["rust", "tokio", "distributed"],
    },
    Listing {
        title: "Backend Developer",
        company: "Acme Payments",
        location: "Berlin",
        tags: &["rust", "postgres", "kafka"],
    },
    Listing {
        title: "Platform Engineer",
        company: "Cloudy Corp",
        location: "Remote",
        tags: &["kubernetes", "terraform", "golang"],
    },
    Listing {
        title: "Frontend Engineer",
        company: "Pixel Labs",
        location: "Lisbon",
        tags: &["typescript", "react", "design"],
    },
    Listing {
        title: "Data Engineer",
        company: "Acme Payments",
        location: "Berlin",
        tags: &["python", "spark", "kafka"],
    },
];

/// Searches a fixed set of job listings.
///
/// Payload: `query` (required), `location` (optional, case-insensitive).
/// A listing matches when any query keyword appears in its title or tags.
#[derive(Debug, Default)]
pub struct JobSearchAgent;

impl JobSearchAgent {
    pub fn new() -> Self {
        Self
    }

    fn search(&self, ctx: &Context) -> Result<Value, String> {
        let query = required_str(ctx.payload(), "query")?;
        let location = optional_str(ctx.payload(), "location").map(str::to_lowercase);
        let terms = keywords(query);
        if terms.is_empty() {
            return Err(format!("query '{query}' has no searchable keywords"));
        }

        let results: Vec<&Listing> = LISTINGS
            .iter()
            .filter(|l| {
                location
                    .as_deref()
                    .map_or(true, |loc| l.location.to_lowercase() == loc)
            })
            .filter(|l| {
                let title = l.title.to_lowercase();
                terms
                    .iter()
                    .any(|t| title.contains(t.as_str()) || l.tags.contains(&t.as_str()))
            })
            .collect();

        Ok(json!({
            "query": query,
            "count": results.len(),
            "results": results,
        }))
    }
}

#[async_trait]
impl Capability for JobSearchAgent {
    fn name(&self) -> &str {
        "job_search"
    }

    async fn execute(&self, ctx: &Context) -> AgentResult {
        let start = Instant::now();
        match self.search(ctx) {
            Ok(data) => AgentResult::success(data, start.elapsed()),
            Err(e) => AgentResult::failure(e, start.elapsed()),
        }
    }

    async fn self_test(&self) -> bool {
        let probe = Context::new(Task::new("job_search", json!({"query": "rust"})));
        self.search(&probe)
            .map(|v| v["count"].as_u64().unwrap_or(0) > 0)
            .unwrap_or(false)
    }
}
