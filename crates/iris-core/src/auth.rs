//! Identity and authentication.
//!
//! An absent identity means the user is a guest: their session lives only in
//! local persistence. Signed-in users get server-side history keyed by id.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::persistence::{get_json, set_json, KeyValueStore, StoreError, IDENTITY_KEY};

/// Prefix the provider puts in front of its error messages.
pub const PROVIDER_PREFIX: &str = "Iris";

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Iris: {0} is required")]
    MissingField(&'static str),

    #[error("Iris: {0}")]
    Rejected(String),

    #[error("Iris: network error ({0})")]
    Transport(String),

    #[error("Iris: could not save identity ({0})")]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Message for inline display, without the provider prefix.
    pub fn user_message(&self) -> String {
        strip_provider_prefix(&self.to_string(), PROVIDER_PREFIX).to_string()
    }
}

/// Drop a leading `"{provider}: "` from `message`.
pub fn strip_provider_prefix<'a>(message: &'a str, provider: &str) -> &'a str {
    message
        .strip_prefix(provider)
        .and_then(|rest| rest.strip_prefix(':'))
        .map(str::trim_start)
        .unwrap_or(message)
}

/// Authentication capability.
pub trait AuthProvider: Send + Sync {
    /// The currently signed-in user, or `None` for a guest.
    fn observe_identity(&self) -> Option<UserIdentity>;

    fn sign_in(&self, username: &str, password: &str) -> Result<UserIdentity, AuthError>;

    fn sign_up(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<UserIdentity, AuthError>;

    fn sign_out(&self) -> Result<(), AuthError>;
}

fn require(value: &str, field: &'static str) -> Result<(), AuthError> {
    if value.trim().is_empty() {
        return Err(AuthError::MissingField(field));
    }
    Ok(())
}

/// Provider backed by the service's `/api/auth` endpoints.
///
/// The identity blob is cached in the key-value store so the next start
/// observes the same user without a round trip.
pub struct HttpAuthProvider {
    agent: ureq::Agent,
    base_url: String,
    store: Arc<dyn KeyValueStore>,
}

impl HttpAuthProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
        }
    }

    fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> Result<UserIdentity, AuthError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.agent.post(&url).send_form(fields).map_err(|e| {
            match crate::backend::map_ureq_error(e) {
                crate::backend::BackendError::Status { detail, .. } => AuthError::Rejected(detail),
                other => AuthError::Transport(other.to_string()),
            }
        })?;

        let identity: UserIdentity = response
            .into_json()
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        set_json(self.store.as_ref(), IDENTITY_KEY, &identity)?;
        log::info!("Signed in as {} ({})", identity.username, identity.id);
        Ok(identity)
    }
}

impl AuthProvider for HttpAuthProvider {
    fn observe_identity(&self) -> Option<UserIdentity> {
        match get_json(self.store.as_ref(), IDENTITY_KEY) {
            Ok(identity) => identity,
            Err(e) => {
                log::warn!("Ignoring unreadable identity blob: {}", e);
                None
            }
        }
    }

    fn sign_in(&self, username: &str, password: &str) -> Result<UserIdentity, AuthError> {
        require(username, "Username")?;
        require(password, "Password")?;
        self.post_form(
            "/api/auth/login",
            &[("username", username), ("password", password)],
        )
    }

    fn sign_up(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<UserIdentity, AuthError> {
        require(username, "Username")?;
        require(password, "Password")?;

        let mut fields = vec![("username", username), ("password", password)];
        if let Some(email) = email.filter(|e| !e.trim().is_empty()) {
            fields.push(("email", email));
        }
        self.post_form("/api/auth/register", &fields)
    }

    fn sign_out(&self) -> Result<(), AuthError> {
        self.store.remove(IDENTITY_KEY)?;
        log::info!("Signed out");
        Ok(())
    }
}
