//! Sign-in state: exchanging authorization codes, keeping the bearer token,
//! and signing out.

pub mod marker;
pub mod oauth;
pub mod store;

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::{ApiError, Backend, RelationshipStage, User};

pub use marker::{MarkerError, SessionMarker, SessionState};
pub use store::{KeyringTokenStore, MemoryTokenStore, TokenStore, TokenStoreError};

const CODE_REUSED_HINT: &str = "expired or already been used";

#[derive(Debug)]
pub enum AuthError {
    /// No bearer token is available for an authenticated call.
    NotAuthenticated,
    /// The authorization code was already exchanged or has expired.
    CodeReused(String),
    /// The backend refused the code exchange.
    Rejected(String),
    /// A successful exchange without a user or token in it.
    InvalidResponse,
    Api(ApiError),
    Store(TokenStoreError),
    Marker(MarkerError),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::NotAuthenticated => {
                f.write_str("Not logged in. Run `rapport login` first.")
            }
            AuthError::CodeReused(detail) => write!(
                f,
                "{detail}. Start a fresh sign-in with `rapport login`."
            ),
            AuthError::Rejected(detail) => f.write_str(detail),
            AuthError::InvalidResponse => f.write_str("Invalid response data"),
            AuthError::Api(err) => write!(f, "{err}"),
            AuthError::Store(err) => write!(f, "{err}"),
            AuthError::Marker(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AuthError::Api(err) => Some(err),
            AuthError::Store(err) => Some(err),
            AuthError::Marker(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        AuthError::Api(err)
    }
}

impl From<TokenStoreError> for AuthError {
    fn from(err: TokenStoreError) -> Self {
        AuthError::Store(err)
    }
}

impl From<MarkerError> for AuthError {
    fn from(err: MarkerError) -> Self {
        AuthError::Marker(err)
    }
}

/// Anything that can hand out the bearer token for the next request.
pub trait Credentials: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    /// The backend reported failure but still returned a usable session.
    pub recovered: bool,
}

pub struct AuthManager {
    backend: Arc<dyn Backend>,
    tokens: Arc<dyn TokenStore>,
    marker: SessionMarker,
    account: String,
    redirect_uri: String,
    env_token: Option<String>,
}

impl AuthManager {
    /// `account` names the backend (its origin); tokens and the marker are
    /// scoped to it.
    pub fn new(
        backend: Arc<dyn Backend>,
        tokens: Arc<dyn TokenStore>,
        marker: SessionMarker,
        account: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            tokens,
            marker,
            account: account.into(),
            redirect_uri: redirect_uri.into(),
            env_token: None,
        }
    }

    pub fn with_env_token(mut self, token: Option<String>) -> Self {
        self.env_token = token;
        self
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub async fn login(&self, code: &str) -> Result<LoginOutcome, AuthError> {
        let exchange = self.backend.exchange_code(code, &self.redirect_uri).await?;
        let status = exchange.status;
        let body = exchange.body;

        if !status.is_success() {
            let detail = body.detail_text();
            if let (Some(user), Some(token)) = (body.user, body.access_token) {
                warn!(%status, detail = detail.as_deref().unwrap_or(""), "Login reported failure but returned a user; keeping the session");
                return self.establish(user, &token, true);
            }
            let detail = detail
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| "Login failed".to_string());
            debug!(%status, %detail, "Authorization code exchange rejected");
            if detail.contains(CODE_REUSED_HINT) {
                return Err(AuthError::CodeReused(detail));
            }
            return Err(AuthError::Rejected(detail));
        }

        match (body.user, body.access_token) {
            (Some(user), Some(token)) if !token.trim().is_empty() => {
                self.establish(user, &token, false)
            }
            _ => Err(AuthError::InvalidResponse),
        }
    }

    fn establish(
        &self,
        user: User,
        token: &str,
        recovered: bool,
    ) -> Result<LoginOutcome, AuthError> {
        self.tokens.set(&self.account, token)?;
        self.marker.save(&SessionState {
            logged_in: true,
            backend: self.account.clone(),
            user: Some(user.clone()),
        })?;
        info!(email = %user.email, backend = %self.account, "Signed in");
        Ok(LoginOutcome { user, recovered })
    }

    /// Forgets the token and the marker. Safe to call when signed out.
    /// Both are always cleared; the first failure is reported.
    pub fn logout(&self) -> Result<bool, AuthError> {
        let token = self.tokens.clear(&self.account);
        let marker = self.marker.clear();
        if let Err(err) = &token {
            warn!(error = %err, backend = %self.account, "Could not remove the stored token");
        }
        let had_token = token?;
        let had_marker = marker?;
        info!(backend = %self.account, "Signed out");
        Ok(had_token || had_marker)
    }

    /// The environment override wins over the stored token.
    pub fn token(&self) -> Result<Option<String>, AuthError> {
        if let Some(token) = &self.env_token {
            return Ok(Some(token.clone()));
        }
        Ok(self.tokens.get(&self.account)?)
    }

    pub fn require_token(&self) -> Result<String, AuthError> {
        self.token()?.ok_or(AuthError::NotAuthenticated)
    }

    /// Signed in means a marker for this backend plus a token; an
    /// environment token alone also counts.
    pub fn is_logged_in(&self) -> Result<bool, AuthError> {
        if self.env_token.is_some() {
            return Ok(true);
        }
        let marked = self.marker.load_for(&self.account)?.is_some();
        Ok(marked && self.tokens.get(&self.account)?.is_some())
    }

    pub fn current_user(&self) -> Result<Option<User>, AuthError> {
        Ok(self
            .marker
            .load_for(&self.account)?
            .and_then(|state| state.user))
    }

    pub async fn update_stage(&self, stage: RelationshipStage) -> Result<Option<User>, AuthError> {
        let token = self.require_token()?;
        let returned = self.backend.update_relationship(&token, stage).await?;
        let Some(mut state) = self.marker.load_for(&self.account)? else {
            return Ok(returned);
        };
        let user = match (returned, state.user.take()) {
            (Some(user), _) => Some(user),
            (None, Some(mut stored)) => {
                stored.relationship_stage = Some(stage);
                Some(stored)
            }
            (None, None) => None,
        };
        state.user = user.clone();
        self.marker.save(&state)?;
        info!(%stage, "Relationship stage updated");
        Ok(user)
    }
}

impl Credentials for AuthManager {
    fn bearer_token(&self) -> Option<String> {
        match self.token() {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "Could not read the stored token");
                None
            }
        }
    }
}
