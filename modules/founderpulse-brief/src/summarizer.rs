use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result as AnyResult;
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use ai_client::{ChatAgent, Claude, OpenAi};
use founderpulse_common::Config;

use crate::retrieval::RetrievalChunk;

/// Character budget per map-pass group. Groups are summarized independently,
/// then merged by one reduce pass per model.
const GROUP_CHAR_BUDGET: usize = 12_000;

/// Bound on one model's whole map-reduce pass.
const MODEL_TIMEOUT: Duration = Duration::from_secs(180);

const MAP_SYSTEM_PROMPT: &str = "You summarize a founder's or company's recent \
social posts. Write a tight markdown digest of the given excerpts: key \
announcements, themes, and notable changes. No preamble.";

const REDUCE_SYSTEM_PROMPT: &str = "You merge partial digests of the same \
entity's social activity into one coherent markdown summary. Deduplicate, \
keep the strongest points, no preamble.";

/// One model's result: a summary or an explicit failure marker. The map
/// never silently omits a configured model, so callers can tell "no
/// content" apart from "model failed".
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModelOutcome {
    Ok { summary: String },
    Error { message: String },
}

/// Route a model identifier to its provider client.
pub fn agent_for_model(model: &str, config: &Config) -> Arc<dyn ChatAgent> {
    if model.starts_with("claude") {
        Arc::new(Claude::new(&config.anthropic_api_key, model))
    } else {
        Arc::new(OpenAi::new(&config.openai_api_key, model))
    }
}

/// Runs one independent map-reduce summarization pass per configured model
/// and assembles the per-model result map.
pub struct Summarizer {
    agents: Vec<Arc<dyn ChatAgent>>,
    model_timeout: Duration,
}

impl Summarizer {
    pub fn new(agents: Vec<Arc<dyn ChatAgent>>) -> Self {
        Self {
            agents,
            model_timeout: MODEL_TIMEOUT,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let agents = config
            .summary_models
            .iter()
            .map(|model| agent_for_model(model, config))
            .collect();
        Self::new(agents)
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    /// Summarize the chunk set once per model. Models run concurrently; a
    /// failure or timeout in one pass becomes that model's error marker and
    /// never aborts the others. Waits for every pass to settle.
    pub async fn summarize(&self, chunks: &[RetrievalChunk]) -> BTreeMap<String, ModelOutcome> {
        let groups = group_chunks(chunks, GROUP_CHAR_BUDGET);

        let passes = self.agents.iter().map(|agent| {
            let groups = groups.clone();
            async move {
                let model = agent.model().to_string();
                let outcome = match tokio::time::timeout(
                    self.model_timeout,
                    map_reduce(agent.as_ref(), &groups),
                )
                .await
                {
                    Ok(Ok(summary)) => {
                        info!(model = %model, "Summarization pass complete");
                        ModelOutcome::Ok { summary }
                    }
                    Ok(Err(e)) => {
                        warn!(model = %model, error = %e, "Summarization pass failed");
                        ModelOutcome::Error {
                            message: e.to_string(),
                        }
                    }
                    Err(_) => {
                        warn!(model = %model, "Summarization pass timed out");
                        ModelOutcome::Error {
                            message: format!("timed out after {:?}", self.model_timeout),
                        }
                    }
                };
                (model, outcome)
            }
        });

        join_all(passes).await.into_iter().collect()
    }
}

/// One map-reduce pass: summarize each group, then merge the partials.
/// A single group skips the reduce call.
async fn map_reduce(agent: &dyn ChatAgent, groups: &[String]) -> AnyResult<String> {
    if groups.is_empty() {
        return Ok("No activity in this period.".to_string());
    }

    let mut partials = Vec::with_capacity(groups.len());
    for group in groups {
        let partial = agent.chat_completion(MAP_SYSTEM_PROMPT, group).await?;
        partials.push(partial);
    }

    if partials.len() == 1 {
        return Ok(partials.remove(0));
    }

    agent
        .chat_completion(REDUCE_SYSTEM_PROMPT, &partials.join("\n\n---\n\n"))
        .await
}

/// Pack chunks into groups under a character budget, preserving retrieval
/// order so the highest-scoring context leads each group.
fn group_chunks(chunks: &[RetrievalChunk], budget: usize) -> Vec<String> {
    let mut groups: Vec<String> = Vec::new();
    let mut current = String::new();

    for chunk in chunks {
        let entry = format!("[{}]\n{}\n\n", chunk.source_url, chunk.text);
        if !current.is_empty() && current.len() + entry.len() > budget {
            groups.push(std::mem::take(&mut current));
        }
        current.push_str(&entry);
    }
    if !current.is_empty() {
        groups.push(current);
    }

    groups
}
