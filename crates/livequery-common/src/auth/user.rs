//! Current user lookup
//!
//! The session controller consults a [`UserProvider`] when it constructs a
//! client, so the connect handshake can carry the signed-in user's session
//! token. The token is captured once per construction; a login or logout
//! after that point only takes effect on the next client.

use async_trait::async_trait;
use parking_lot::RwLock;

/// Snapshot of the signed-in user at client construction time
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CurrentUser {
    session_token: Option<String>,
}

impl CurrentUser {
    /// A user without a session token
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A user carrying a session token
    pub fn with_session_token(token: impl Into<String>) -> Self {
        Self {
            session_token: Some(token.into()),
        }
    }

    /// The session token, if the user has one
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    /// Consume the user and take the session token
    pub fn into_session_token(self) -> Option<String> {
        self.session_token
    }
}

/// Source of the active user
#[async_trait]
pub trait UserProvider: Send + Sync {
    /// The active user, or `None` when nobody is signed in
    async fn current_user(&self) -> Option<CurrentUser>;
}

/// Provider backed by an in-memory slot.
///
/// Useful for applications that manage sessions themselves and for tests.
#[derive(Debug, Default)]
pub struct StaticUserProvider {
    user: RwLock<Option<CurrentUser>>,
}

impl StaticUserProvider {
    /// Provider with nobody signed in
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Provider with a signed-in user holding the given session token
    pub fn signed_in(token: impl Into<String>) -> Self {
        Self {
            user: RwLock::new(Some(CurrentUser::with_session_token(token))),
        }
    }

    /// Replace the active user
    pub fn set_user(&self, user: Option<CurrentUser>) {
        *self.user.write() = user;
    }
}

#[async_trait]
impl UserProvider for StaticUserProvider {
    async fn current_user(&self) -> Option<CurrentUser> {
        self.user.read().clone()
    }
}
