use crate::capture::domain::authorization::{AuthorizationState, PermissionProvider};

/// Outcome of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionCheck {
    Resolved(AuthorizationState),
    /// A prompt is outstanding; the decision callback will fire later.
    Pending,
}

/// Queries and, when needed, requests camera authorization.
///
/// Once a decision is known it is cached and never re-queried.
pub struct PermissionGate {
    provider: Box<dyn PermissionProvider>,
    state: AuthorizationState,
    requested: bool,
}

impl PermissionGate {
    pub fn new(provider: Box<dyn PermissionProvider>) -> Self {
        Self {
            provider,
            state: AuthorizationState::Undetermined,
            requested: false,
        }
    }

    pub fn state(&self) -> AuthorizationState {
        self.state
    }

    /// Checks authorization. When the platform has not asked yet, issues a
    /// single request and returns [`PermissionCheck::Pending`]; `on_decision`
    /// is then invoked with the outcome (from whatever thread the platform
    /// uses). The caller must feed that outcome back through [`Self::resolve`].
    pub fn check_permission(
        &mut self,
        on_decision: impl FnOnce(AuthorizationState) + Send + 'static,
    ) -> PermissionCheck {
        if self.state.is_resolved() {
            return PermissionCheck::Resolved(self.state);
        }
        if self.requested {
            return PermissionCheck::Pending;
        }

        match self.provider.authorization_status() {
            AuthorizationState::Undetermined => {
                self.requested = true;
                log::info!("Camera permission undetermined, requesting access");
                self.provider.request_access(Box::new(move |granted| {
                    on_decision(AuthorizationState::from_decision(granted))
                }));
                PermissionCheck::Pending
            }
            resolved => {
                self.state = resolved;
                PermissionCheck::Resolved(resolved)
            }
        }
    }

    /// Records the decision delivered by the platform. Ignored once resolved.
    pub fn resolve(&mut self, decision: AuthorizationState) -> AuthorizationState {
        if !self.state.is_resolved() && decision.is_resolved() {
            log::info!("Camera permission resolved: {decision:?}");
            self.state = decision;
        }
        self.state
    }
}
