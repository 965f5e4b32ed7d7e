pub mod outline;

use log::{ info, warn };
use serde::{ Deserialize, Serialize };
use std::fmt;
use std::str::FromStr;

use crate::config::prompt::{
    PromptConfig,
    NODE_DETAILS_TEMPLATE,
    ROADMAP_SUBTREE_TEMPLATE,
    ROADMAP_TEMPLATE,
};
use crate::error::{ AgentError, AgentResult };
use crate::llm::GenerationOptions;
use crate::llm::chat::ChatClient;
use crate::models::roadmap::Roadmap;
use self::outline::{ clean_outline, parse_outline, LayoutOptions };

const ROADMAP_OPTIONS: GenerationOptions = GenerationOptions {
    max_tokens: Some(300),
    temperature: Some(0.6),
};
const SUBTREE_OPTIONS: GenerationOptions = GenerationOptions {
    max_tokens: Some(400),
    temperature: Some(0.6),
};
const DETAILS_OPTIONS: GenerationOptions = GenerationOptions {
    max_tokens: Some(500),
    temperature: Some(0.7),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Hours,
    Days,
    Weeks,
    Months,
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
            TimeUnit::Weeks => "weeks",
            TimeUnit::Months => "months",
        };
        f.write_str(s)
    }
}

impl FromStr for TimeUnit {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hour" | "hours" => Ok(TimeUnit::Hours),
            "day" | "days" => Ok(TimeUnit::Days),
            "week" | "weeks" => Ok(TimeUnit::Weeks),
            "month" | "months" => Ok(TimeUnit::Months),
            other => Err(AgentError::InvalidInput(format!("unknown time unit '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadmapRequest {
    pub topic: String,
    pub time: u32,
    pub unit: TimeUnit,
}

/// Which expansion level a sub-roadmap belongs to; only affects node ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    Subtree,
    Nested,
}

impl Expansion {
    fn id_prefix(self) -> &'static str {
        match self {
            Expansion::Subtree => "subtree",
            Expansion::Nested => "nested-subtree",
        }
    }
}

fn require(field: &str, value: &str) -> AgentResult<()> {
    if value.trim().is_empty() {
        return Err(AgentError::InvalidInput(format!("{} is required", field)));
    }
    Ok(())
}

pub async fn generate_roadmap(
    client: &dyn ChatClient,
    prompts: &PromptConfig,
    request: &RoadmapRequest
) -> AgentResult<Roadmap> {
    require("topic", &request.topic)?;
    if request.time == 0 {
        return Err(AgentError::InvalidInput("time must be greater than zero".into()));
    }

    let time = request.time.to_string();
    let unit = request.unit.to_string();
    let prompt = prompts.render(ROADMAP_TEMPLATE, &[
        ("topic", request.topic.trim()),
        ("time", &time),
        ("unit", &unit),
    ])?;

    info!("Generating roadmap for '{}' over {} {}", request.topic, time, unit);
    let text = client.complete(&prompt, &ROADMAP_OPTIONS).await?.response;
    let graph = parse_outline(&clean_outline(&text), &LayoutOptions::main_roadmap());
    if graph.is_empty() {
        warn!("Roadmap reply for '{}' contained no outline lines", request.topic);
    }

    Ok(Roadmap {
        title: request.topic.trim().to_string(),
        outline: text,
        graph,
    })
}

/// Breaks one roadmap node down into its own outline. `context` is the
/// outline text the node came from.
pub async fn expand_node(
    client: &dyn ChatClient,
    prompts: &PromptConfig,
    label: &str,
    topic: &str,
    context: &str,
    expansion: Expansion
) -> AgentResult<Roadmap> {
    require("label", label)?;
    require("topic", topic)?;

    let prompt = prompts.render(ROADMAP_SUBTREE_TEMPLATE, &[
        ("label", label.trim()),
        ("topic", topic.trim()),
        ("context", context.trim()),
    ])?;

    info!("Expanding roadmap node '{}' ({:?})", label, expansion);
    let text = client.complete(&prompt, &SUBTREE_OPTIONS).await?.response;
    let graph = parse_outline(
        &clean_outline(&text),
        &LayoutOptions::subtree(expansion.id_prefix())
    );
    if graph.is_empty() {
        warn!("Expansion of '{}' contained no outline lines", label);
    }

    Ok(Roadmap {
        title: label.trim().to_string(),
        outline: text,
        graph,
    })
}

pub async fn node_details(
    client: &dyn ChatClient,
    prompts: &PromptConfig,
    label: &str,
    topic: &str,
    context: &str
) -> AgentResult<String> {
    require("label", label)?;
    require("topic", topic)?;

    let prompt = prompts.render(NODE_DETAILS_TEMPLATE, &[
        ("label", label.trim()),
        ("topic", topic.trim()),
        ("context", context.trim()),
    ])?;
    Ok(client.complete(&prompt, &DETAILS_OPTIONS).await?.response)
}
