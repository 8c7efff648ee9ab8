use secrecy::SecretString;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

use super::poller::{CheckoutEvent, CheckoutRef, CheckoutState, CheckoutStatusPoller, RacingPoll};
use super::request::{HttpMethod, NavigationRequest, NavigationTrigger, RequestPreparer};
use super::route::{CheckoutPage, ProjectPage, Route, Router};
use crate::analytics::{properties, EventTracker};
use crate::config::CheckoutConfig;
use crate::util::{ensure_web_scheme, parse_web_url, query_flag, UrlError};

// ============================================================================
// Domain Types
// ============================================================================

/// The project being pledged to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: u64,
    pub name: String,
    /// Public web URL of the project; pledge pages live under it.
    pub web_url: Url,
    /// Whether the current user already backs the project.
    pub is_backing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reward {
    pub id: u64,
    pub minimum: u32,
}

/// Where a checkout session is, as seen through the pages it loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutPhase {
    #[default]
    Loading,
    ShowingForm,
    Submitting,
    AwaitingRedirect,
    Racing,
    Done,
}

/// What to do with one navigation attempt. Exactly one per classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum InterceptDecision {
    /// Let the web view load the request itself.
    Allow,
    /// Cancel this load and load the prepared copy instead.
    LoadPrepared(NavigationRequest),
    Dismiss,
    OpenModal(NavigationRequest),
    OpenExternalBrowser(Url),
    OpenLogin,
    /// Show the native thanks screen instead of the web one.
    GoToThanks,
    /// A status poll was scheduled; its result arrives as a [`CheckoutEvent`].
    PollStatus(Duration),
}

impl InterceptDecision {
    /// The boolean answer the web view delegate hands back.
    pub fn should_start_load(&self) -> bool {
        matches!(self, InterceptDecision::Allow)
    }
}

/// Outputs produced outside of navigation classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CheckoutOutput {
    LoadRequest(NavigationRequest),
    SetStripeAppleMerchantIdentifier(String),
    SetStripePublishableKey(String),
    CloseLogin,
    GoToThanks,
    ShowAlert(String),
    PopViewController,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PledgeContext {
    NewPledge,
    ManageReward,
}

impl PledgeContext {
    fn as_str(self) -> &'static str {
        match self {
            PledgeContext::NewPledge => "new_pledge",
            PledgeContext::ManageReward => "manage_reward",
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Parsed form of [`CheckoutConfig`].
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub web_base: Url,
    pub stripe_channel: Url,
    pub stripe_publishable_key: String,
    pub apple_merchant_identifier: String,
    pub racing_poll_delay: Duration,
    pub racing_max_attempts: u32,
}

impl CheckoutSettings {
    pub fn from_config(config: &CheckoutConfig) -> Result<Self, UrlError> {
        Ok(Self {
            web_base: parse_web_url(&config.web_base_url)?,
            stripe_channel: parse_web_url(&config.stripe_channel_url)?,
            stripe_publishable_key: config.stripe_publishable_key.clone(),
            apple_merchant_identifier: config.apple_merchant_identifier.clone(),
            racing_poll_delay: config.racing_poll_delay(),
            racing_max_attempts: config.racing_max_attempts,
        })
    }
}

// ============================================================================
// Controller
// ============================================================================

/// State of one configured checkout.
struct Session {
    router: Router,
    project: Project,
    reward: Reward,
    apple_pay_capable: bool,
    initial_request: NavigationRequest,
    phase: CheckoutPhase,
    /// Last request handed to the web view; replayed after a login interrupt.
    pending_request: Option<NavigationRequest>,
}

impl Session {
    fn pledge_context(&self) -> PledgeContext {
        if self.project.is_backing {
            PledgeContext::ManageReward
        } else {
            PledgeContext::NewPledge
        }
    }
}

struct StatusPolling {
    poller: Arc<dyn CheckoutStatusPoller>,
    event_tx: mpsc::Sender<CheckoutEvent>,
}

/// Decides, for every navigation of the checkout web view, whether the web
/// view may load it or the app should take over.
///
/// Lifecycle: [`configure`](Self::configure) once, [`view_ready`](Self::view_ready)
/// once, then [`classify`](Self::classify) per navigation attempt.
pub struct CheckoutNavigationController {
    settings: CheckoutSettings,
    preparer: Box<dyn RequestPreparer>,
    tracker: Arc<dyn EventTracker>,
    polling: Option<StatusPolling>,
    racing: RacingPoll,
    session: Option<Session>,
}

impl CheckoutNavigationController {
    pub fn new(
        settings: CheckoutSettings,
        preparer: Box<dyn RequestPreparer>,
        tracker: Arc<dyn EventTracker>,
    ) -> Self {
        Self {
            settings,
            preparer,
            tracker,
            polling: None,
            racing: RacingPoll::new(),
            session: None,
        }
    }

    /// Enables racing status checks. Without a poller, or when classifying
    /// outside a tokio runtime, racing thanks pages still yield
    /// [`InterceptDecision::PollStatus`] but nothing is scheduled.
    pub fn with_status_poller(
        mut self,
        poller: Arc<dyn CheckoutStatusPoller>,
        event_tx: mpsc::Sender<CheckoutEvent>,
    ) -> Self {
        self.polling = Some(StatusPolling { poller, event_tx });
        self
    }

    pub fn configure(
        &mut self,
        initial_request: NavigationRequest,
        project: Project,
        reward: Reward,
        apple_pay_capable: bool,
    ) {
        self.racing.cancel();
        let router = Router::new(
            project.web_url.clone(),
            self.settings.web_base.clone(),
            self.settings.stripe_channel.clone(),
        );
        tracing::debug!(project_id = project.id, url = %initial_request.url, "Checkout configured");
        self.session = Some(Session {
            router,
            project,
            reward,
            apple_pay_capable,
            initial_request,
            phase: CheckoutPhase::Loading,
            pending_request: None,
        });
    }

    /// Current phase. `Loading` before configuration.
    pub fn phase(&self) -> CheckoutPhase {
        self.session
            .as_ref()
            .map(|s| s.phase)
            .unwrap_or_default()
    }

    /// First load, plus payment sheet setup for Apple Pay capable devices.
    pub fn view_ready(&mut self) -> Vec<CheckoutOutput> {
        let Some(session) = self.session.as_mut() else {
            tracing::warn!("view_ready called before configure");
            return Vec::new();
        };

        let initial = if self.preparer.is_prepared(&session.initial_request) {
            session.initial_request.clone()
        } else {
            self.preparer.prepare(&session.initial_request)
        };
        session.pending_request = Some(initial.clone());

        let mut outputs = vec![CheckoutOutput::LoadRequest(initial)];
        if session.apple_pay_capable {
            outputs.push(CheckoutOutput::SetStripeAppleMerchantIdentifier(
                self.settings.apple_merchant_identifier.clone(),
            ));
            outputs.push(CheckoutOutput::SetStripePublishableKey(
                self.settings.stripe_publishable_key.clone(),
            ));
        }
        outputs
    }

    /// Classifies a raw URL string. Unparseable or non-web URLs are left to
    /// the web view.
    pub fn classify_raw(
        &mut self,
        raw_url: &str,
        method: HttpMethod,
        prepared: bool,
        trigger: NavigationTrigger,
    ) -> InterceptDecision {
        match parse_web_url(raw_url) {
            Ok(url) => self.classify(
                &NavigationRequest {
                    url,
                    method,
                    prepared,
                },
                trigger,
            ),
            Err(e) => {
                tracing::warn!(url = raw_url, error = %e, "Unroutable navigation, allowing");
                InterceptDecision::Allow
            }
        }
    }

    /// Decides what happens to one navigation attempt.
    pub fn classify(
        &mut self,
        request: &NavigationRequest,
        trigger: NavigationTrigger,
    ) -> InterceptDecision {
        let Some(session) = self.session.as_mut() else {
            tracing::warn!(url = %request.url, "Navigation before configure, allowing");
            return InterceptDecision::Allow;
        };
        if ensure_web_scheme(&request.url).is_err() {
            return InterceptDecision::Allow;
        }

        let route = session.router.route(&request.url);
        let prepared = self.preparer.is_prepared(request);
        let link_clicked = trigger == NavigationTrigger::LinkClicked;

        let decision = match route {
            Some(Route::StripeChannel) => InterceptDecision::Allow,

            Some(Route::Checkout {
                id,
                page: CheckoutPage::Thanks { racing: true },
            }) => {
                session.phase = CheckoutPhase::Racing;
                let mut url = request.url.clone();
                url.set_query(None);
                if let Some(polling) = &self.polling {
                    self.racing.start(
                        Arc::clone(&polling.poller),
                        CheckoutRef { id, url },
                        self.settings.racing_poll_delay,
                        self.settings.racing_max_attempts,
                        polling.event_tx.clone(),
                    );
                }
                tracing::info!(checkout_id = id, "Checkout is racing, polling for status");
                InterceptDecision::PollStatus(self.settings.racing_poll_delay)
            }

            Some(Route::Checkout {
                id,
                page: CheckoutPage::Thanks { racing: false },
            }) => {
                session.phase = CheckoutPhase::Done;
                self.racing.cancel();
                tracing::info!(checkout_id = id, "Checkout finished");
                InterceptDecision::GoToThanks
            }

            Some(Route::Signup) => {
                tracing::info!("Checkout interrupted for login");
                InterceptDecision::OpenLogin
            }

            Some(Route::Project(ProjectPage::Root)) => {
                track_cancel(self.tracker.as_ref(), session);
                InterceptDecision::Dismiss
            }

            Some(Route::Project(ProjectPage::PledgeNew))
                if session.phase != CheckoutPhase::Loading =>
            {
                tracing::info!("Reward selection requested, leaving checkout");
                InterceptDecision::Dismiss
            }

            Some(_) if link_clicked && query_flag(&request.url, "modal") => {
                InterceptDecision::OpenModal(self.preparer.prepare(request))
            }

            None if link_clicked => InterceptDecision::OpenExternalBrowser(request.url.clone()),

            route if prepared => {
                if let Some(route) = route {
                    advance_on_load(session, &route);
                }
                InterceptDecision::Allow
            }

            route => {
                if route.is_some_and(|r| r.is_submission()) {
                    session.phase = CheckoutPhase::Submitting;
                }
                let prepared = self.preparer.prepare(request);
                session.pending_request = Some(prepared.clone());
                InterceptDecision::LoadPrepared(prepared)
            }
        };

        tracing::debug!(
            url = %request.url,
            ?trigger,
            prepared,
            phase = ?session.phase,
            decision = ?decision,
            "Classified navigation"
        );
        decision
    }

    /// The user signed in after [`InterceptDecision::OpenLogin`]. Closes the
    /// login screen and retries the interrupted request with the new session.
    pub fn user_session_started(&mut self, oauth_token: SecretString) -> Vec<CheckoutOutput> {
        self.preparer.session_started(oauth_token);

        let mut outputs = vec![CheckoutOutput::CloseLogin];
        let retry = self
            .session
            .as_ref()
            .and_then(|s| s.pending_request.as_ref())
            .map(|pending| self.preparer.prepare(pending));
        if let (Some(session), Some(retry)) = (self.session.as_mut(), retry) {
            session.pending_request = Some(retry.clone());
            outputs.push(CheckoutOutput::LoadRequest(retry));
        }
        outputs
    }

    /// Applies a finished status poll. Results of superseded polls are ignored.
    pub fn handle_event(&mut self, event: CheckoutEvent) -> Option<CheckoutOutput> {
        let CheckoutEvent::StatusResolved { generation, result } = event;
        if !self.racing.is_current(generation) {
            tracing::debug!(generation, "Ignoring stale poll result");
            return None;
        }
        self.racing.finish(generation);

        match result {
            Ok(envelope) if envelope.state == CheckoutState::Successful => {
                if let Some(session) = self.session.as_mut() {
                    session.phase = CheckoutPhase::Done;
                }
                tracing::info!("Racing checkout succeeded");
                Some(CheckoutOutput::GoToThanks)
            }
            Ok(envelope) if envelope.state.is_pending() => {
                // The poll task only reports settled states
                None
            }
            Ok(envelope) => {
                tracing::warn!(reason = %envelope.state_reason, "Racing checkout failed");
                Some(CheckoutOutput::ShowAlert(envelope.state_reason))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Racing checkout status unavailable");
                Some(CheckoutOutput::ShowAlert(e.to_string()))
            }
        }
    }

    pub fn cancel_button_tapped(&mut self) -> CheckoutOutput {
        self.racing.cancel();
        if let Some(session) = &self.session {
            track_cancel(self.tracker.as_ref(), session);
        }
        CheckoutOutput::PopViewController
    }

    pub fn failure_alert_button_tapped(&mut self) -> CheckoutOutput {
        CheckoutOutput::PopViewController
    }
}

/// Phase changes for requests the web view is allowed to load.
fn advance_on_load(session: &mut Session, route: &Route) {
    let next = if route.is_form() {
        CheckoutPhase::ShowingForm
    } else if route.is_submission() {
        CheckoutPhase::AwaitingRedirect
    } else {
        return;
    };

    if next != session.phase {
        tracing::debug!(from = ?session.phase, to = ?next, "Checkout phase changed");
        session.phase = next;
    }
}

fn track_cancel(tracker: &dyn EventTracker, session: &Session) {
    let props = || {
        properties([
            ("pledge_context", Value::from(session.pledge_context().as_str())),
            ("project_pid", json!(session.project.id)),
            ("reward_id", json!(session.reward.id)),
        ])
    };
    tracker.track("Checkout Cancel", props());
    // Deprecated name, still consumed by older dashboards
    tracker.track("Canceled Checkout", props());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::RecordingTracker;
    use crate::checkout::poller::{CheckoutEnvelope, PollError};
    use crate::checkout::request::ApiPreparer;

    const PROJECT: &str = "https://www.kickstarter.com/projects/creator/a-project";

    fn settings() -> CheckoutSettings {
        CheckoutSettings::from_config(&CheckoutConfig {
            stripe_publishable_key: "pk_test".into(),
            ..CheckoutConfig::default()
        })
        .unwrap()
    }

    fn project() -> Project {
        Project {
            id: 1,
            name: "A Project".into(),
            web_url: Url::parse(PROJECT).unwrap(),
            is_backing: false,
        }
    }

    fn get(s: &str) -> NavigationRequest {
        NavigationRequest::get(Url::parse(s).unwrap())
    }

    fn controller(tracker: Arc<RecordingTracker>) -> CheckoutNavigationController {
        let mut controller =
            CheckoutNavigationController::new(settings(), Box::new(ApiPreparer::new("")), tracker);
        let initial = get("https://www.kickstarter.com/checkouts/1/payments/new");
        controller.configure(
            ApiPreparer::new("").prepare(&initial),
            project(),
            Reward { id: 2, minimum: 1 },
            false,
        );
        controller
    }

    #[test]
    fn test_unconfigured_allows() {
        let mut controller = CheckoutNavigationController::new(
            settings(),
            Box::new(ApiPreparer::new("")),
            Arc::new(RecordingTracker::new()),
        );
        assert_eq!(
            controller.classify(&get(PROJECT), NavigationTrigger::Other),
            InterceptDecision::Allow
        );
        assert!(controller.view_ready().is_empty());
    }

    #[test]
    fn test_malformed_raw_url_allows() {
        let mut controller = controller(Arc::new(RecordingTracker::new()));
        let decision =
            controller.classify_raw("http://[::1", HttpMethod::Get, false, NavigationTrigger::Other);
        assert_eq!(decision, InterceptDecision::Allow);
        let decision =
            controller.classify_raw("about:blank", HttpMethod::Get, false, NavigationTrigger::Other);
        assert_eq!(decision, InterceptDecision::Allow);
    }

    #[test]
    fn test_unprepared_unknown_url_is_reissued_prepared() {
        let mut controller = controller(Arc::new(RecordingTracker::new()));
        let request = get("https://www.kickstarter.com/somewhere/else");

        match controller.classify(&request, NavigationTrigger::Other) {
            InterceptDecision::LoadPrepared(reissued) => {
                assert!(reissued.prepared);
                assert_eq!(reissued.url, request.url);
            }
            other => panic!("Expected LoadPrepared, got {:?}", other),
        }
    }

    #[test]
    fn test_phase_walks_through_pledge() {
        let mut controller = controller(Arc::new(RecordingTracker::new()));
        let preparer = ApiPreparer::new("");
        assert_eq!(controller.phase(), CheckoutPhase::Loading);

        let form = get("https://www.kickstarter.com/checkouts/1/payments/new");
        controller.classify(&preparer.prepare(&form), NavigationTrigger::Other);
        assert_eq!(controller.phase(), CheckoutPhase::ShowingForm);

        let submit = NavigationRequest::post(
            Url::parse("https://www.kickstarter.com/checkouts/1/payments").unwrap(),
        );
        controller.classify(&submit, NavigationTrigger::FormSubmitted);
        assert_eq!(controller.phase(), CheckoutPhase::Submitting);

        controller.classify(&preparer.prepare(&submit), NavigationTrigger::Other);
        assert_eq!(controller.phase(), CheckoutPhase::AwaitingRedirect);

        let thanks = get(&format!("{}/checkouts/1/thanks", PROJECT));
        assert_eq!(
            controller.classify(&thanks, NavigationTrigger::Other),
            InterceptDecision::GoToThanks
        );
        assert_eq!(controller.phase(), CheckoutPhase::Done);
    }

    #[test]
    fn test_racing_without_poller_still_reports_delay() {
        let mut controller = controller(Arc::new(RecordingTracker::new()));
        let racing = get(&format!("{}/checkouts/1/thanks?racing=1", PROJECT));

        assert_eq!(
            controller.classify(&racing, NavigationTrigger::Other),
            InterceptDecision::PollStatus(Duration::from_secs(1))
        );
        assert_eq!(controller.phase(), CheckoutPhase::Racing);
    }

    struct SettledPoller;

    #[async_trait::async_trait]
    impl CheckoutStatusPoller for SettledPoller {
        async fn fetch_status(&self, _: &CheckoutRef) -> Result<CheckoutEnvelope, PollError> {
            Ok(CheckoutEnvelope {
                state: CheckoutState::Successful,
                state_reason: String::new(),
            })
        }
    }

    #[test]
    fn test_racing_outside_runtime_does_not_panic() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut controller = controller(Arc::new(RecordingTracker::new()))
            .with_status_poller(Arc::new(SettledPoller), tx);
        let racing = get(&format!("{}/checkouts/1/thanks?racing=1", PROJECT));

        assert_eq!(
            controller.classify(&racing, NavigationTrigger::Other),
            InterceptDecision::PollStatus(Duration::from_secs(1))
        );
        assert_eq!(controller.phase(), CheckoutPhase::Racing);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stripe_channel_always_allowed() {
        let mut controller = controller(Arc::new(RecordingTracker::new()));
        let stripe = get("https://js.stripe.com/v2/channel.html");
        for trigger in [
            NavigationTrigger::Other,
            NavigationTrigger::LinkClicked,
            NavigationTrigger::FormSubmitted,
        ] {
            assert_eq!(controller.classify(&stripe, trigger), InterceptDecision::Allow);
        }
    }

    #[test]
    fn test_prepared_reclassification_is_stable() {
        let mut controller = controller(Arc::new(RecordingTracker::new()));
        let edit = ApiPreparer::new("").prepare(&get(&format!("{}/pledge/edit", PROJECT)));

        let first = controller.classify(&edit, NavigationTrigger::Other);
        let second = controller.classify(&edit, NavigationTrigger::Other);
        assert_eq!(first, second);
        assert!(first.should_start_load());
    }

    #[test]
    fn test_pledge_new_allowed_while_loading() {
        let mut controller = controller(Arc::new(RecordingTracker::new()));
        let new_pledge = ApiPreparer::new("").prepare(&get(&format!("{}/pledge/new", PROJECT)));

        assert_eq!(
            controller.classify(&new_pledge, NavigationTrigger::Other),
            InterceptDecision::Allow
        );
        assert_eq!(controller.phase(), CheckoutPhase::ShowingForm);
        assert_eq!(
            controller.classify(&new_pledge, NavigationTrigger::Other),
            InterceptDecision::Dismiss
        );
    }

    #[test]
    fn test_cancel_tracks_manage_context_for_backers() {
        let tracker = Arc::new(RecordingTracker::new());
        let mut controller = controller(tracker.clone());
        controller.configure(
            get(PROJECT),
            Project {
                is_backing: true,
                ..project()
            },
            Reward { id: 2, minimum: 1 },
            false,
        );

        assert_eq!(controller.cancel_button_tapped(), CheckoutOutput::PopViewController);
        assert_eq!(
            tracker.property("pledge_context"),
            vec![json!("manage_reward"), json!("manage_reward")]
        );
    }

    #[test]
    fn test_stale_event_is_ignored() {
        let mut controller = controller(Arc::new(RecordingTracker::new()));
        let event = CheckoutEvent::StatusResolved {
            generation: 7,
            result: Err(PollError::Transport("boom".into())),
        };
        assert_eq!(controller.handle_event(event), None);
    }

    #[test]
    fn test_decision_serializes_tagged() {
        let value = serde_json::to_value(InterceptDecision::OpenLogin).unwrap();
        assert_eq!(value, json!({"type": "open_login"}));
    }
}
