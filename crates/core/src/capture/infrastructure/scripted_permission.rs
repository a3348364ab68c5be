use std::sync::{Arc, Mutex, PoisonError};

use crate::capture::domain::authorization::{
    AccessCompletion, AuthorizationState, PermissionProvider,
};

/// Permission provider with a predetermined answer.
///
/// Stands in for the platform permission subsystem in tests and in the CLI,
/// where there is no OS prompt to show.
pub struct ScriptedPermission {
    status: AuthorizationState,
    answer: Answer,
}

enum Answer {
    Immediately(bool),
    Prompt(PromptHandle),
}

/// Control side of a pending prompt created by [`ScriptedPermission::prompt`].
#[derive(Clone, Default)]
pub struct PromptHandle {
    inner: Arc<Mutex<PromptState>>,
}

#[derive(Default)]
struct PromptState {
    completion: Option<AccessCompletion>,
    requests: usize,
}

impl ScriptedPermission {
    pub fn authorized() -> Self {
        Self {
            status: AuthorizationState::Authorized,
            answer: Answer::Immediately(true),
        }
    }

    pub fn denied() -> Self {
        Self {
            status: AuthorizationState::Denied,
            answer: Answer::Immediately(false),
        }
    }

    /// Reports `Undetermined`; the request is answered with `granted` as soon
    /// as it is made.
    pub fn answering(granted: bool) -> Self {
        Self {
            status: AuthorizationState::Undetermined,
            answer: Answer::Immediately(granted),
        }
    }

    /// Reports `Undetermined`; the request stays open until the returned
    /// handle answers it.
    pub fn prompt() -> (Self, PromptHandle) {
        let handle = PromptHandle::default();
        (
            Self {
                status: AuthorizationState::Undetermined,
                answer: Answer::Prompt(handle.clone()),
            },
            handle,
        )
    }
}

impl PermissionProvider for ScriptedPermission {
    fn authorization_status(&self) -> AuthorizationState {
        self.status
    }

    fn request_access(&mut self, completion: AccessCompletion) {
        match &self.answer {
            Answer::Immediately(granted) => completion(*granted),
            Answer::Prompt(handle) => {
                let mut state = handle.lock();
                state.requests += 1;
                state.completion = Some(completion);
            }
        }
    }
}

impl PromptHandle {
    fn lock(&self) -> std::sync::MutexGuard<'_, PromptState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delivers the user's decision. Returns `false` if nothing was pending.
    pub fn answer(&self, granted: bool) -> bool {
        // Take the completion first so it runs without the lock held.
        let completion = self.lock().completion.take();
        match completion {
            Some(completion) => {
                completion(granted);
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.lock().completion.is_some()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn capture_answer() -> (Arc<Mutex<Option<bool>>>, AccessCompletion) {
        let slot = Arc::new(Mutex::new(None));
        let sink = slot.clone();
        (slot, Box::new(move |granted| *sink.lock().unwrap() = Some(granted)))
    }

    #[test]
    fn test_fixed_statuses() {
        assert_eq!(
            ScriptedPermission::authorized().authorization_status(),
            AuthorizationState::Authorized
        );
        assert_eq!(
            ScriptedPermission::denied().authorization_status(),
            AuthorizationState::Denied
        );
        assert_eq!(
            ScriptedPermission::answering(true).authorization_status(),
            AuthorizationState::Undetermined
        );
    }

    #[test]
    fn test_answering_completes_inside_request() {
        let mut provider = ScriptedPermission::answering(false);
        let (slot, completion) = capture_answer();
        provider.request_access(completion);
        assert_eq!(*slot.lock().unwrap(), Some(false));
    }

    #[test]
    fn test_prompt_waits_for_answer() {
        let (mut provider, prompt) = ScriptedPermission::prompt();
        let (slot, completion) = capture_answer();

        provider.request_access(completion);
        assert!(prompt.is_pending());
        assert_eq!(*slot.lock().unwrap(), None);

        assert!(prompt.answer(true));
        assert_eq!(*slot.lock().unwrap(), Some(true));
        assert!(!prompt.is_pending());
        assert!(!prompt.answer(true));
    }

    #[test]
    fn test_prompt_answer_from_other_thread() {
        let (mut provider, prompt) = ScriptedPermission::prompt();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        provider.request_access(Box::new(move |granted| flag.store(granted, Ordering::SeqCst)));

        std::thread::spawn(move || prompt.answer(true)).join().unwrap();

        assert!(fired.load(Ordering::SeqCst));
    }
}
