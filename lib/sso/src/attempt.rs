//! Login attempt tracking.
//!
//! Each request in a login flow carries a [`LoginAttempt`] whose stage only
//! moves forward:
//!
//! ```text
//! Init -> Authorizing -> CallbackReceived -> [StateVerified] -> TokenExchanged
//!      -> IdentityResolved -> {UserFound | UserAutoRegistered} -> Delivered
//! ```
//!
//! `get_sso_id` skips from `IdentityResolved` straight to `Delivered`, and
//! every non-terminal stage may drop to `Failed`.

use crate::platform::Platform;
use fedgate_core::{LoginAttemptId, Result};
use std::fmt;

/// Progress of a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginStage {
    Init,
    Authorizing,
    CallbackReceived,
    StateVerified,
    TokenExchanged,
    IdentityResolved,
    UserFound,
    UserAutoRegistered,
    Delivered,
    Failed,
}

impl LoginStage {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Authorizing => "authorizing",
            Self::CallbackReceived => "callback_received",
            Self::StateVerified => "state_verified",
            Self::TokenExchanged => "token_exchanged",
            Self::IdentityResolved => "identity_resolved",
            Self::UserFound => "user_found",
            Self::UserAutoRegistered => "user_auto_registered",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }

    /// Returns true for stages with no outgoing transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }

    /// Returns true if `next` may directly follow this stage.
    #[must_use]
    pub fn can_advance_to(&self, next: LoginStage) -> bool {
        use LoginStage::*;
        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Init, Authorizing)
                | (Authorizing, CallbackReceived)
                | (CallbackReceived, StateVerified | TokenExchanged)
                | (StateVerified, TokenExchanged)
                | (TokenExchanged, IdentityResolved)
                | (IdentityResolved, UserFound | UserAutoRegistered | Delivered)
                | (UserFound | UserAutoRegistered, Delivered)
        )
    }
}

impl fmt::Display for LoginStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for a transition the state machine does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: LoginStage,
    pub to: LoginStage,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal login stage transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// One login attempt, from redirect to delivery.
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    id: LoginAttemptId,
    platform: Platform,
    stage: LoginStage,
}

impl LoginAttempt {
    /// Starts an attempt at the redirect request.
    #[must_use]
    pub fn begin(platform: Platform) -> Self {
        Self {
            id: LoginAttemptId::new(),
            platform,
            stage: LoginStage::Init,
        }
    }

    /// Picks an attempt up at the provider's callback.
    ///
    /// The redirect ran in an earlier request, so the attempt starts at
    /// `CallbackReceived`.
    #[must_use]
    pub fn from_callback(platform: Platform) -> Self {
        let attempt = Self {
            id: LoginAttemptId::new(),
            platform,
            stage: LoginStage::CallbackReceived,
        };
        attempt.log();
        attempt
    }

    #[must_use]
    pub fn id(&self) -> LoginAttemptId {
        self.id
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    #[must_use]
    pub fn stage(&self) -> LoginStage {
        self.stage
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns `IllegalTransition` and leaves the stage unchanged when `next`
    /// cannot follow the current stage.
    pub fn advance(&mut self, next: LoginStage) -> Result<(), IllegalTransition> {
        if !self.stage.can_advance_to(next) {
            return Err(IllegalTransition {
                from: self.stage,
                to: next,
            }
            .into());
        }
        self.stage = next;
        self.log();
        Ok(())
    }

    /// Marks the attempt failed. A no-op once terminal.
    pub fn fail(&mut self, error: &dyn fmt::Display) {
        if self.stage.is_terminal() {
            return;
        }
        let from = self.stage;
        self.stage = LoginStage::Failed;
        tracing::warn!(
            attempt = %self.id,
            platform = %self.platform,
            from = %from,
            error = %error,
            "sso login failed"
        );
    }

    fn log(&self) {
        tracing::debug!(
            attempt = %self.id,
            platform = %self.platform,
            stage = %self.stage,
            "sso login stage"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LoginStage::*;

    #[test]
    fn token_flow_with_state_check() {
        let mut attempt = LoginAttempt::begin(Platform::Oidc);
        for stage in [
            Authorizing,
            CallbackReceived,
            StateVerified,
            TokenExchanged,
            IdentityResolved,
            UserAutoRegistered,
            Delivered,
        ] {
            attempt.advance(stage).expect("legal transition");
        }
        assert_eq!(attempt.stage(), Delivered);
    }

    #[test]
    fn native_flow_skips_state_check() {
        let mut attempt = LoginAttempt::from_callback(Platform::Github);
        attempt.advance(TokenExchanged).expect("legal");
        attempt.advance(IdentityResolved).expect("legal");
        attempt.advance(UserFound).expect("legal");
        attempt.advance(Delivered).expect("legal");
    }

    #[test]
    fn sso_id_flow_skips_user_stages() {
        let mut attempt = LoginAttempt::from_callback(Platform::Google);
        attempt.advance(TokenExchanged).expect("legal");
        attempt.advance(IdentityResolved).expect("legal");
        attempt.advance(Delivered).expect("legal");
    }

    #[test]
    fn rejects_skipping_token_exchange() {
        let mut attempt = LoginAttempt::from_callback(Platform::Github);
        let err = attempt.advance(IdentityResolved).unwrap_err();
        assert_eq!(
            err.current_context(),
            &IllegalTransition {
                from: CallbackReceived,
                to: IdentityResolved
            }
        );
        assert_eq!(attempt.stage(), CallbackReceived);
    }

    #[test]
    fn terminal_stages_are_final() {
        let mut attempt = LoginAttempt::begin(Platform::Github);
        attempt.fail(&"boom");
        assert_eq!(attempt.stage(), Failed);
        assert!(attempt.advance(Authorizing).is_err());
        assert!(attempt.advance(Failed).is_err());

        assert!(!Delivered.can_advance_to(Failed));
    }

    #[test]
    fn any_live_stage_can_fail() {
        for stage in [Init, Authorizing, CallbackReceived, StateVerified, TokenExchanged, IdentityResolved, UserFound, UserAutoRegistered] {
            assert!(stage.can_advance_to(Failed), "{stage}");
        }
    }
}
