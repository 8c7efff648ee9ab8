//! Scripted sessions for the command line.
//!
//! A checkout script is a TOML file describing a project, the first checkout
//! request and a list of steps. Replaying it drives a
//! [`CheckoutNavigationController`] and records every decision and output.
//!
//! ```toml
//! initial_url = "https://www.kickstarter.com/projects/creator/a-project/pledge/new"
//!
//! [project]
//! id = 1
//! name = "A Project"
//! url = "https://www.kickstarter.com/projects/creator/a-project"
//!
//! [[statuses]]
//! state = "successful"
//!
//! [[step]]
//! kind = "navigate"
//! url = "https://www.kickstarter.com/projects/creator/a-project/pledge"
//! method = "POST"
//! trigger = "form_submitted"
//! ```
use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::analytics::{Properties, RecordingTracker};
use crate::checkout::{
    ApiPreparer, CheckoutEnvelope, CheckoutNavigationController, CheckoutOutput, CheckoutRef,
    CheckoutSettings, CheckoutStatusPoller, HttpMethod, InterceptDecision, NavigationRequest,
    NavigationTrigger, PollError, Project, Reward,
};
use crate::discovery::{flatten_groups, group_categories, Category, DiscoveryFilter};
use crate::util::{parse_web_url, UrlError};

/// Maximum script or catalog size (1MB).
const MAX_INPUT_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} exceeds 1MB limit")]
    TooLarge(String),

    #[error("Invalid checkout script: {0}")]
    Script(#[from] toml::de::Error),

    #[error("Invalid category catalog: {0}")]
    Catalog(#[from] serde_json::Error),

    #[error("Invalid URL in script: {0}")]
    Url(#[from] UrlError),

    #[error("Unknown filter selection '{0}'")]
    UnknownSelection(String),
}

fn read_limited(path: &Path) -> Result<String, ScriptError> {
    let io_err = |source| ScriptError::Io {
        path: path.display().to_string(),
        source,
    };
    let metadata = std::fs::metadata(path).map_err(io_err)?;
    if metadata.len() > MAX_INPUT_SIZE {
        return Err(ScriptError::TooLarge(path.display().to_string()));
    }
    std::fs::read_to_string(path).map_err(io_err)
}

// ============================================================================
// Checkout Scripts
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptProject {
    pub id: u64,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub is_backing: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ScriptReward {
    pub id: u64,
    pub minimum: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptStep {
    /// The web view attempts a navigation.
    Navigate {
        url: String,
        #[serde(default)]
        method: HttpMethod,
        #[serde(default)]
        trigger: NavigationTrigger,
        #[serde(default)]
        prepared: bool,
    },
    /// The user finished signing in.
    Login { token: String },
    Cancel,
    AcknowledgeFailure,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutScript {
    pub initial_url: String,
    #[serde(default)]
    pub apple_pay: bool,
    pub project: ScriptProject,
    #[serde(default)]
    pub reward: ScriptReward,
    /// Responses handed out, in order, to racing status checks.
    #[serde(default)]
    pub statuses: Vec<CheckoutEnvelope>,
    #[serde(default, rename = "step")]
    pub steps: Vec<ScriptStep>,
}

impl CheckoutScript {
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        Self::parse(&read_limited(path)?)
    }

    pub fn parse(content: &str) -> Result<Self, ScriptError> {
        Ok(toml::from_str(content)?)
    }
}

/// One line of replay output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReplayEntry {
    Decision {
        url: String,
        decision: InterceptDecision,
    },
    Output {
        output: CheckoutOutput,
    },
    Tracked {
        name: String,
        properties: Properties,
    },
}

impl ReplayEntry {
    fn output(output: CheckoutOutput) -> Self {
        ReplayEntry::Output { output }
    }
}

/// Status poller answering from the script's `statuses` list.
struct ScriptedStatuses {
    responses: Mutex<VecDeque<CheckoutEnvelope>>,
}

#[async_trait]
impl CheckoutStatusPoller for ScriptedStatuses {
    async fn fetch_status(&self, checkout: &CheckoutRef) -> Result<CheckoutEnvelope, PollError> {
        let next = self
            .responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        next.ok_or_else(|| {
            PollError::Transport(format!("no scripted status for checkout {}", checkout.id))
        })
    }
}

/// Runs `script` through a fresh controller. Racing polls wait for their
/// configured delay before the next step runs.
pub async fn replay_checkout(
    script: CheckoutScript,
    settings: CheckoutSettings,
    client_id: &str,
) -> Result<Vec<ReplayEntry>, ScriptError> {
    let project = Project {
        id: script.project.id,
        name: script.project.name,
        web_url: parse_web_url(&script.project.url)?,
        is_backing: script.project.is_backing,
    };
    let initial = NavigationRequest::get(parse_web_url(&script.initial_url)?);
    let reward = Reward {
        id: script.reward.id,
        minimum: script.reward.minimum,
    };

    let tracker = Arc::new(RecordingTracker::new());
    let statuses = Arc::new(ScriptedStatuses {
        responses: Mutex::new(script.statuses.into()),
    });
    let (event_tx, mut event_rx) = mpsc::channel(8);
    let mut controller = CheckoutNavigationController::new(
        settings,
        Box::new(ApiPreparer::new(client_id)),
        tracker.clone(),
    )
    .with_status_poller(statuses, event_tx);

    controller.configure(initial, project, reward, script.apple_pay);
    let mut entries: Vec<ReplayEntry> = controller
        .view_ready()
        .into_iter()
        .map(ReplayEntry::output)
        .collect();

    for step in script.steps {
        match step {
            ScriptStep::Navigate {
                url,
                method,
                trigger,
                prepared,
            } => {
                let decision = controller.classify_raw(&url, method, prepared, trigger);
                let polling = matches!(decision, InterceptDecision::PollStatus(_));
                entries.push(ReplayEntry::Decision { url, decision });

                if polling {
                    if let Some(event) = event_rx.recv().await {
                        entries.extend(controller.handle_event(event).map(ReplayEntry::output));
                    }
                }
            }
            ScriptStep::Login { token } => {
                entries.extend(
                    controller
                        .user_session_started(SecretString::from(token))
                        .into_iter()
                        .map(ReplayEntry::output),
                );
            }
            ScriptStep::Cancel => {
                entries.push(ReplayEntry::output(controller.cancel_button_tapped()));
            }
            ScriptStep::AcknowledgeFailure => {
                entries.push(ReplayEntry::output(controller.failure_alert_button_tapped()));
            }
        }
    }

    entries.extend(tracker.events().into_iter().map(|e| ReplayEntry::Tracked {
        name: e.name,
        properties: e.properties,
    }));
    Ok(entries)
}

// ============================================================================
// Category Catalogs
// ============================================================================

/// Loads a JSON array of categories.
pub fn load_catalog(path: &Path) -> Result<Vec<Category>, ScriptError> {
    Ok(serde_json::from_str(&read_limited(path)?)?)
}

/// Parses a `--selected` value: a shortcut name or a category id from the
/// catalog.
pub fn parse_selection(value: &str, catalog: &[Category]) -> Result<DiscoveryFilter, ScriptError> {
    let filter = match value.trim().to_ascii_lowercase().as_str() {
        "all" | "all-projects" => DiscoveryFilter::AllProjects,
        "staff-picks" => DiscoveryFilter::StaffPicks,
        "starred" => DiscoveryFilter::Starred,
        "recommended" => DiscoveryFilter::Recommended,
        "social" => DiscoveryFilter::Social,
        other => {
            let id: u64 = other
                .parse()
                .map_err(|_| ScriptError::UnknownSelection(value.to_owned()))?;
            let groups = group_categories(catalog);
            let category = flatten_groups(&groups)
                .find(|c| c.id == id)
                .ok_or_else(|| ScriptError::UnknownSelection(value.to_owned()))?;
            DiscoveryFilter::Category(category.clone())
        }
    };
    Ok(filter)
}
