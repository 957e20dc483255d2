use serde::{Deserialize, Serialize};

use crate::model::{ModuleId, SessionCode};

/// Furthest slide position the facilitator has approved for participants,
/// per session and module.
///
/// The allowed index never decreases: a new value is only ever taken from
/// [`NavigationState::propose`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationState {
    session_code: SessionCode,
    module_id: ModuleId,
    allowed_index: u32,
}

impl NavigationState {
    #[must_use]
    pub fn from_persisted(session_code: SessionCode, module_id: ModuleId, allowed_index: u32) -> Self {
        Self {
            session_code,
            module_id,
            allowed_index,
        }
    }

    #[must_use]
    pub fn session_code(&self) -> &SessionCode {
        &self.session_code
    }

    #[must_use]
    pub fn module_id(&self) -> ModuleId {
        self.module_id
    }

    #[must_use]
    pub fn allowed_index(&self) -> u32 {
        self.allowed_index
    }

    /// Value the allowed index would take after observing `new_index`, if
    /// that raises it.
    #[must_use]
    pub fn propose(&self, new_index: u32) -> Option<u32> {
        (new_index > self.allowed_index).then_some(new_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposals_track_running_maximum() {
        let code = SessionCode::new("ABCD").unwrap();
        let mut stored = 0;
        let mut running = 0;
        for observed in [2, 0, 5, 2, 4, 5, 7, 1] {
            let state = NavigationState::from_persisted(code.clone(), ModuleId::new(1), stored);
            let proposed = state.propose(observed);
            assert_eq!(proposed.is_some(), observed > running);
            stored = proposed.unwrap_or(stored);
            running = running.max(observed);
            assert_eq!(stored, running);
        }
    }

    #[test]
    fn propose_is_none_when_not_higher() {
        let nav = NavigationState::from_persisted(
            SessionCode::new("ABCD").unwrap(),
            ModuleId::new(1),
            5,
        );
        assert_eq!(nav.propose(2), None);
        assert_eq!(nav.propose(5), None);
        assert_eq!(nav.propose(6), Some(6));
    }
}
