//! Lab-staff authentication.
//!
//! Sign-in validates the form locally, exchanges it for a bearer token, and
//! installs token and user into the explicit `Session`. On startup
//! `bootstrap` confirms a persisted token against the profile endpoint.
//! Only lab staff may use this client; any other role is signed out.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::models::{AuthUser, UserRole};
use crate::notify::NoticeBoard;
use crate::session::{Session, SessionError, SessionStore};

const MAX_PASSWORD_CHARS: usize = 50;

static EMAIL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

/// Credentials as typed on the sign-in screen.
#[derive(Clone, Serialize)]
pub struct SignInForm {
    pub email: String,
    password: String,
}

impl SignInForm {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.trim().to_string(),
            password: password.to_string(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Field name → message for every invalid field.
    pub fn validate(&self) -> Result<(), BTreeMap<&'static str, &'static str>> {
        let mut errors = BTreeMap::new();

        if self.email.is_empty() {
            errors.insert("email", "Email is required");
        } else if !EMAIL_PATTERN
            .as_ref()
            .is_some_and(|re| re.is_match(&self.email))
        {
            errors.insert("email", "Please enter a valid email address");
        }

        let chars = self.password.chars().count();
        if chars == 0 {
            errors.insert("password", "Password is required");
        } else if chars > MAX_PASSWORD_CHARS {
            errors.insert("password", "Password must be less than 50 characters");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl std::fmt::Debug for SignInForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignInForm")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What a successful sign-in hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct SignInGrant {
    pub token: String,
    pub user: AuthUser,
}

/// Auth endpoints, split from the request gateway so tests can fake them.
pub trait AuthApi: Send + Sync {
    fn sign_in(&self, form: &SignInForm) -> Result<SignInGrant, GatewayError>;
    /// Profile of whoever the current session credential belongs to.
    fn profile(&self) -> Result<AuthUser, GatewayError>;
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Sign-in form has invalid fields")]
    InvalidForm(BTreeMap<&'static str, &'static str>),

    #[error("This client is for lab staff only")]
    RoleNotPermitted(UserRole),

    #[error("Not signed in")]
    SignedOut,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Validate, sign in, persist the token and install it in the session.
pub fn sign_in(
    api: &dyn AuthApi,
    session: &Session,
    store: &SessionStore,
    notices: &NoticeBoard,
    form: &SignInForm,
) -> Result<AuthUser, AuthError> {
    form.validate().map_err(AuthError::InvalidForm)?;

    let grant = match api.sign_in(form) {
        Ok(grant) => grant,
        Err(err) => {
            tracing::warn!(error = %err, "Sign-in rejected");
            notices.error(err.user_message());
            return Err(err.into());
        }
    };

    if grant.user.user_role != UserRole::LabStaff {
        tracing::warn!(role = %grant.user.user_role, "Sign-in refused for role");
        notices.error(AuthError::RoleNotPermitted(grant.user.user_role).to_string());
        return Err(AuthError::RoleNotPermitted(grant.user.user_role));
    }

    store.save_token(&grant.token)?;
    session.establish(&grant.token, grant.user.clone())?;
    notices.success("Sign In Complete");
    tracing::info!(user_id = %grant.user.id, "Signed in");
    Ok(grant.user)
}

/// Confirm the session's token against the profile endpoint.
///
/// A rejected token or a non lab-staff profile signs the session out and
/// deletes the persisted credential. Transport failures leave both alone so
/// the next start can try again.
pub fn bootstrap(
    api: &dyn AuthApi,
    session: &Session,
    store: &SessionStore,
) -> Result<AuthUser, AuthError> {
    if !session.has_credential() {
        return Err(AuthError::SignedOut);
    }

    let user = match api.profile() {
        Ok(user) => user,
        Err(GatewayError::Unauthorized) => {
            tracing::info!("Persisted credential rejected, signing out");
            logout(session, store)?;
            return Err(AuthError::Gateway(GatewayError::Unauthorized));
        }
        Err(err) => return Err(err.into()),
    };

    if user.user_role != UserRole::LabStaff {
        logout(session, store)?;
        return Err(AuthError::RoleNotPermitted(user.user_role));
    }

    session.set_user(user.clone())?;
    tracing::info!(user_id = %user.id, "Session restored");
    Ok(user)
}

pub fn logout(session: &Session, store: &SessionStore) -> Result<(), AuthError> {
    session.clear();
    store.clear()?;
    tracing::info!("Signed out");
    Ok(())
}
