//! Delayed status checks for "racing" checkouts.
//!
//! A checkout races when the web flow redirects to the thanks page before the
//! payment processor has confirmed the pledge. The host is then told to wait
//! and the status is fetched from the API after a short delay, repeating while
//! the checkout is still being processed.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

/// Processing state reported by the checkout API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    Authorizing,
    Verifying,
    Successful,
    Failed,
}

impl CheckoutState {
    /// Still being processed; worth asking again.
    pub fn is_pending(self) -> bool {
        matches!(self, CheckoutState::Authorizing | CheckoutState::Verifying)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutEnvelope {
    pub state: CheckoutState,
    #[serde(default)]
    pub state_reason: String,
}

/// The checkout being polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRef {
    pub id: u64,
    /// Thanks page URL with the racing flag removed.
    pub url: Url,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    /// The status request itself failed.
    #[error("Could not check the status of your pledge: {0}")]
    Transport(String),
    #[error("Your pledge is still being processed after {0} checks. Please check back later.")]
    StillProcessing(u32),
}

/// Fetches the processing state of a checkout.
#[async_trait]
pub trait CheckoutStatusPoller: Send + Sync {
    async fn fetch_status(&self, checkout: &CheckoutRef) -> Result<CheckoutEnvelope, PollError>;
}

/// Delivered to the host's event loop when a poll finishes.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutEvent {
    StatusResolved {
        generation: u64,
        result: Result<CheckoutEnvelope, PollError>,
    },
}

/// Owns the single outstanding status poll of a checkout session.
///
/// Starting a new poll aborts the previous one. Dropping the `RacingPoll`
/// aborts the outstanding task, so a torn-down screen never hears back.
#[derive(Debug, Default)]
pub struct RacingPoll {
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl RacingPoll {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel-and-replace: schedules a poll, returning its generation.
    ///
    /// Outside a tokio runtime nothing is scheduled and `None` is returned.
    pub fn start(
        &mut self,
        poller: Arc<dyn CheckoutStatusPoller>,
        checkout: CheckoutRef,
        delay: Duration,
        max_attempts: u32,
        event_tx: mpsc::Sender<CheckoutEvent>,
    ) -> Option<u64> {
        self.cancel();
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!(checkout_id = checkout.id, error = %e, "No runtime for racing checkout poll");
                return None;
            }
        };
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;

        tracing::debug!(
            checkout_id = checkout.id,
            generation,
            delay_ms = delay.as_millis() as u64,
            "Scheduling racing checkout poll"
        );

        self.handle = Some(runtime.spawn(async move {
            let result = poll_until_settled(poller.as_ref(), &checkout, delay, max_attempts).await;
            if let Err(e) = event_tx
                .send(CheckoutEvent::StatusResolved { generation, result })
                .await
            {
                tracing::debug!(error = %e, "Poll result dropped, receiver is gone");
            }
        }));

        Some(generation)
    }

    /// Aborts the outstanding poll, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Whether a result tagged with `generation` belongs to the live poll.
    pub fn is_current(&self, generation: u64) -> bool {
        self.handle.is_some() && generation == self.generation
    }

    /// Marks the live poll as consumed once its result was handled.
    pub fn finish(&mut self, generation: u64) {
        if generation == self.generation {
            self.handle = None;
        }
    }
}

impl Drop for RacingPoll {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn poll_until_settled(
    poller: &dyn CheckoutStatusPoller,
    checkout: &CheckoutRef,
    delay: Duration,
    max_attempts: u32,
) -> Result<CheckoutEnvelope, PollError> {
    let attempts = max_attempts.max(1);
    for attempt in 1..=attempts {
        tokio::time::sleep(delay).await;

        match poller.fetch_status(checkout).await {
            Ok(envelope) if envelope.state.is_pending() => {
                tracing::debug!(
                    checkout_id = checkout.id,
                    attempt,
                    state = ?envelope.state,
                    "Checkout still processing"
                );
            }
            other => return other,
        }
    }

    tracing::warn!(checkout_id = checkout.id, attempts, "Racing checkout never settled");
    Err(PollError::StillProcessing(attempts))
}
