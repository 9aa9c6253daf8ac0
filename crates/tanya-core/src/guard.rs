//! Route guard for views that require a signed-in user.
//!
//! While the initial auth resolution is pending the guard asks the shell to
//! keep showing a loading state; once settled it either admits the user or
//! redirects to the login view with a single informational notice. The
//! notice is suppressed when the user is already on the login view, so
//! redirect loops do not stack duplicates.

use std::sync::Arc;

use crate::auth::AuthState;
use crate::notify::{Notice, Notifier};

/// Notice shown when a guest is sent to the login view.
pub const LOGIN_REQUIRED_NOTICE: &str = "Silakan login terlebih dahulu untuk memulai chat.";

/// The views the guard distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Landing,
    Login,
    Chat,
}

/// Outcome of a guard check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Identity still resolving; keep the loading presentation.
    Loading,
    /// Signed in; proceed to the protected view.
    Allow,
    /// Guest; navigate to the login view.
    RedirectToLogin,
}

/// Decides access to protected views.
pub struct RouteGuard {
    notifier: Arc<dyn Notifier>,
}

impl RouteGuard {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Evaluates access for the given auth state and current route.
    pub fn check(&self, auth: &AuthState, current: Route) -> RouteDecision {
        if auth.loading {
            return RouteDecision::Loading;
        }
        if auth.is_logged_in() {
            return RouteDecision::Allow;
        }
        if current != Route::Login {
            self.notifier.notify(Notice::info(LOGIN_REQUIRED_NOTICE));
        }
        tracing::debug!(?current, "guest redirected to login");
        RouteDecision::RedirectToLogin
    }
}
