//! Navigation interception for the web-based pledge checkout.
//!
//! The checkout runs in a web view. Every navigation the web view wants to
//! perform is passed to [`CheckoutNavigationController::classify`], which
//! either lets it through or turns it into a native action.
//!
//! - [`request`] - Navigation requests and the preparer that stamps them
//! - [`route`] - URL matching against the project and site paths
//! - [`poller`] - Delayed status checks for racing checkouts
//! - [`controller`] - The classifier and its phase cursor
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use crowdflow::analytics::LogTracker;
//! use crowdflow::checkout::{
//!     ApiPreparer, CheckoutNavigationController, CheckoutSettings, InterceptDecision,
//!     NavigationRequest, NavigationTrigger, Project, Reward,
//! };
//! use crowdflow::config::CheckoutConfig;
//! use url::Url;
//!
//! let settings = CheckoutSettings::from_config(&CheckoutConfig::default()).unwrap();
//! let mut controller = CheckoutNavigationController::new(
//!     settings,
//!     Box::new(ApiPreparer::new("client")),
//!     Arc::new(LogTracker),
//! );
//! let project_url = Url::parse("https://www.kickstarter.com/projects/creator/a-project").unwrap();
//! controller.configure(
//!     NavigationRequest::get(project_url.join("a-project/pledge/new").unwrap()),
//!     Project { id: 1, name: "A Project".into(), web_url: project_url.clone(), is_backing: false },
//!     Reward { id: 2, minimum: 10 },
//!     false,
//! );
//!
//! let decision = controller.classify(&NavigationRequest::get(project_url), NavigationTrigger::LinkClicked);
//! assert_eq!(decision, InterceptDecision::Dismiss);
//! ```

pub mod controller;
pub mod poller;
pub mod request;
pub mod route;

pub use controller::{
    CheckoutNavigationController, CheckoutOutput, CheckoutPhase, CheckoutSettings,
    InterceptDecision, Project, Reward,
};
pub use poller::{
    CheckoutEnvelope, CheckoutEvent, CheckoutRef, CheckoutState, CheckoutStatusPoller, PollError,
    RacingPoll,
};
pub use request::{
    without_credentials, ApiPreparer, HttpMethod, NavigationRequest, NavigationTrigger,
    RequestPreparer,
};
pub use route::{CheckoutPage, ProjectPage, Route, Router};
