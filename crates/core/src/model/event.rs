use serde::{Deserialize, Serialize};

use crate::model::{ModuleId, PresentationMode, SessionCode, SubmoduleId};

/// Events fanned out to every peer connected to a session.
///
/// On the wire an event is `{"event": "<name>", "payload": {...}}`.
/// Delivery is at-most-once and unordered, so receivers must treat
/// permission updates as a max-merge and position updates as
/// last-arrival-wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "payload",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum SyncEvent {
    /// The stored allowed index for a module was raised.
    ModuleAdvance {
        module_id: ModuleId,
        allowed_index: u32,
    },
    /// Facilitator steered everyone to a slide.
    Navigate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        module_id: Option<ModuleId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionCode>,
        submodule_index: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        submodule_id: Option<SubmoduleId>,
    },
    /// Participants jump to a slide regardless of their gate.
    ForceSync {
        module_id: ModuleId,
        target_index: u32,
    },
    ModeChanged {
        mode: PresentationMode,
    },
    SessionEnded,
}

impl SyncEvent {
    /// Wire name of the event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::ModuleAdvance { .. } => "module-advance",
            SyncEvent::Navigate { .. } => "navigate",
            SyncEvent::ForceSync { .. } => "force-sync",
            SyncEvent::ModeChanged { .. } => "mode-changed",
            SyncEvent::SessionEnded => "session-ended",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn advance_event_wire_shape() {
        let event = SyncEvent::ModuleAdvance {
            module_id: ModuleId::new(7),
            allowed_index: 3,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"event": "module-advance", "payload": {"moduleId": 7, "allowedIndex": 3}})
        );
        assert_eq!(event.name(), "module-advance");
    }

    #[test]
    fn navigate_omits_absent_targets() {
        let event = SyncEvent::Navigate {
            module_id: None,
            session_id: Some(SessionCode::new("ROOM42").unwrap()),
            submodule_index: 2,
            submodule_id: None,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"event": "navigate", "payload": {"sessionId": "ROOM42", "submoduleIndex": 2}})
        );
    }

    #[test]
    fn parses_force_sync_from_wire() {
        let event: SyncEvent = serde_json::from_value(json!({
            "event": "force-sync",
            "payload": {"moduleId": 1, "targetIndex": 5}
        }))
        .unwrap();
        assert_eq!(
            event,
            SyncEvent::ForceSync {
                module_id: ModuleId::new(1),
                target_index: 5
            }
        );
    }

    #[test]
    fn session_ended_has_no_payload() {
        let value = serde_json::to_value(SyncEvent::SessionEnded).unwrap();
        assert_eq!(value, json!({"event": "session-ended"}));
    }
}
