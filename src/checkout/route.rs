use serde::Serialize;
use url::Url;

use crate::util::{query_flag, same_resource, segments_under};

/// Pages under a project's web URL that the checkout flow knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectPage {
    /// The project page itself.
    Root,
    /// `POST /pledge`: reward and shipping form submission.
    Pledge,
    PledgeNew,
    PledgeEdit,
    /// Cancellation confirmation form.
    PledgeDestroy,
    PledgeChangeMethod,
    /// Fine print pages, shown as modals when tagged `modal=true`.
    PledgeBigPrint,
}

/// Pages under `/checkouts/:id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutPage {
    /// `POST /checkouts/:id/payments`: pay with a new card.
    Payments,
    PaymentsNew,
    /// Pay with a stored card.
    UseStoredCard,
    Thanks { racing: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Project(ProjectPage),
    Checkout { id: u64, page: CheckoutPage },
    Signup,
    StripeChannel,
}

impl Route {
    /// Pages that present a form to the user.
    pub fn is_form(&self) -> bool {
        matches!(
            self,
            Route::Project(
                ProjectPage::PledgeNew
                    | ProjectPage::PledgeEdit
                    | ProjectPage::PledgeDestroy
                    | ProjectPage::PledgeChangeMethod
            ) | Route::Checkout {
                page: CheckoutPage::PaymentsNew,
                ..
            }
        )
    }

    /// Pages that receive a pledge or payment submission.
    pub fn is_submission(&self) -> bool {
        matches!(
            self,
            Route::Project(ProjectPage::Pledge)
                | Route::Checkout {
                    page: CheckoutPage::Payments | CheckoutPage::UseStoredCard,
                    ..
                }
        )
    }
}

/// Maps navigation URLs to [`Route`]s for one project.
#[derive(Debug, Clone)]
pub struct Router {
    project_url: Url,
    web_base: Url,
    stripe_channel: Url,
}

impl Router {
    pub fn new(project_url: Url, web_base: Url, stripe_channel: Url) -> Self {
        Self {
            project_url,
            web_base,
            stripe_channel,
        }
    }

    pub fn project_url(&self) -> &Url {
        &self.project_url
    }

    /// Returns `None` for anything the checkout flow does not recognise.
    pub fn route(&self, url: &Url) -> Option<Route> {
        if same_resource(url, &self.stripe_channel) {
            return Some(Route::StripeChannel);
        }

        if let Some(route) = self.checkout_route(url) {
            return Some(route);
        }

        if let Some(segments) = segments_under(url, &self.project_url) {
            return project_page(&segments).map(Route::Project);
        }

        match segments_under(url, &self.web_base).as_deref() {
            Some(["signup"]) => Some(Route::Signup),
            _ => None,
        }
    }

    /// `/checkouts/:id/...` may sit under the site root or under the project.
    fn checkout_route(&self, url: &Url) -> Option<Route> {
        let segments = segments_under(url, &self.web_base)?;
        let start = segments.iter().position(|s| *s == "checkouts")?;
        let (id, rest) = match &segments[start + 1..] {
            [id, rest @ ..] => (id.parse::<u64>().ok()?, rest),
            [] => return None,
        };

        let page = match rest {
            ["payments"] => CheckoutPage::Payments,
            ["payments", "new"] => CheckoutPage::PaymentsNew,
            ["payments", "use_stored_card"] => CheckoutPage::UseStoredCard,
            ["thanks"] => CheckoutPage::Thanks {
                racing: query_flag(url, "racing"),
            },
            _ => return None,
        };

        Some(Route::Checkout { id, page })
    }
}

fn project_page(segments: &[&str]) -> Option<ProjectPage> {
    match segments {
        [] => Some(ProjectPage::Root),
        ["pledge"] => Some(ProjectPage::Pledge),
        ["pledge", "new"] => Some(ProjectPage::PledgeNew),
        ["pledge", "edit"] => Some(ProjectPage::PledgeEdit),
        ["pledge", "destroy"] => Some(ProjectPage::PledgeDestroy),
        ["pledge", "change_method"] => Some(ProjectPage::PledgeChangeMethod),
        ["pledge", "big_print"] => Some(ProjectPage::PledgeBigPrint),
        _ => None,
    }
}
