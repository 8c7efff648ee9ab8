use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

/// HTTP method of a navigation. Web views only ever navigate with these two.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// What made the web view start a navigation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationTrigger {
    #[default]
    Other,
    LinkClicked,
    FormSubmitted,
}

/// A navigation the web view is about to perform.
///
/// `prepared` is set once the request has been stamped by a
/// [`RequestPreparer`]; only prepared requests are ever loaded natively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationRequest {
    pub url: Url,
    pub method: HttpMethod,
    pub prepared: bool,
}

impl NavigationRequest {
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: HttpMethod::Get,
            prepared: false,
        }
    }

    pub fn post(url: Url) -> Self {
        Self {
            url,
            method: HttpMethod::Post,
            prepared: false,
        }
    }
}

/// Stamps requests so the classifier can tell which ones it already cleared.
pub trait RequestPreparer: Send + Sync {
    /// Returns a copy of `request` that is safe to load natively.
    fn prepare(&self, request: &NavigationRequest) -> NavigationRequest;

    fn is_prepared(&self, request: &NavigationRequest) -> bool {
        request.prepared
    }

    /// Called once the user signs in mid-checkout. Later preparations carry
    /// the new session.
    fn session_started(&mut self, _oauth_token: SecretString) {}
}

/// Default preparer: appends the API `client_id` and, when signed in, the
/// session `oauth_token` to the query, then marks the request prepared.
///
/// Preparing an already prepared request is a no-op on the query.
pub struct ApiPreparer {
    client_id: String,
    oauth_token: Option<SecretString>,
}

impl ApiPreparer {
    const CLIENT_ID: &'static str = "client_id";
    const OAUTH_TOKEN: &'static str = "oauth_token";

    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            oauth_token: None,
        }
    }

    pub fn with_session(mut self, oauth_token: SecretString) -> Self {
        self.oauth_token = Some(oauth_token);
        self
    }

    pub fn is_signed_in(&self) -> bool {
        self.oauth_token.is_some()
    }
}

impl std::fmt::Debug for ApiPreparer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiPreparer")
            .field("client_id", &self.client_id)
            .field("oauth_token", &self.oauth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl RequestPreparer for ApiPreparer {
    fn prepare(&self, request: &NavigationRequest) -> NavigationRequest {
        let mut url = request.url.clone();

        // Drop stale credentials so re-preparing after sign-in swaps the token
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != Self::CLIENT_ID && k != Self::OAUTH_TOKEN)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        {
            let mut query = url.query_pairs_mut();
            query.clear();
            query.extend_pairs(kept.iter());
            if !self.client_id.is_empty() {
                query.append_pair(Self::CLIENT_ID, &self.client_id);
            }
            if let Some(token) = &self.oauth_token {
                query.append_pair(Self::OAUTH_TOKEN, token.expose_secret());
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        NavigationRequest {
            url,
            method: request.method,
            prepared: true,
        }
    }

    fn session_started(&mut self, oauth_token: SecretString) {
        self.oauth_token = Some(oauth_token);
    }
}

/// Strips the credentials [`ApiPreparer`] adds, for display and comparison.
pub fn without_credentials(url: &Url) -> Url {
    let mut clean = url.clone();
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != ApiPreparer::CLIENT_ID && k != ApiPreparer::OAUTH_TOKEN)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        clean.set_query(None);
    } else {
        clean.query_pairs_mut().clear().extend_pairs(kept.iter());
    }
    clean
}
