/// Camera-use authorization as reported by the platform.
///
/// `Undetermined` resolves once, to either `Authorized` or `Denied`, and
/// never changes again for the lifetime of the capture object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationState {
    Undetermined,
    Authorized,
    Denied,
}

impl AuthorizationState {
    pub fn from_decision(granted: bool) -> Self {
        if granted {
            Self::Authorized
        } else {
            Self::Denied
        }
    }

    pub fn is_resolved(self) -> bool {
        self != Self::Undetermined
    }
}

/// Called with the user's decision. May run on any thread.
pub type AccessCompletion = Box<dyn FnOnce(bool) + Send>;

/// Platform permission subsystem.
pub trait PermissionProvider: Send {
    fn authorization_status(&self) -> AuthorizationState;

    /// Asks the user for access. The completion fires later, possibly on
    /// another thread, possibly never (if the prompt is abandoned).
    fn request_access(&mut self, completion: AccessCompletion);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_decision() {
        assert_eq!(AuthorizationState::from_decision(true), AuthorizationState::Authorized);
        assert_eq!(AuthorizationState::from_decision(false), AuthorizationState::Denied);
    }

    #[test]
    fn test_only_undetermined_is_unresolved() {
        assert!(!AuthorizationState::Undetermined.is_resolved());
        assert!(AuthorizationState::Authorized.is_resolved());
        assert!(AuthorizationState::Denied.is_resolved());
    }
}
