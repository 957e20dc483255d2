//! Per-client navigation state for a mounted presentation.
//!
//! A [`ClientNavigationView`] reconciles three independent update sources
//! into one view: direct navigation events, advance events and periodic
//! polls of the authoritative allowed index. Two disciplines apply:
//!
//! - permission (`known_allowed_index`) only ever moves up, through
//!   [`ClientNavigationView::apply_observed_allowed_index`];
//! - position (`current_index`) is overwritten by whatever facilitator
//!   instruction arrives last.

use thiserror::Error;

use crate::model::{GateClass, ModuleId, SessionCode, SyncEvent, TemplateKind};

/// Who is looking at the presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Facilitator,
    Participant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateState {
    /// "Next" is permitted.
    Free,
    /// Waiting for the facilitator to open a quiz or poll.
    Gated,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum NavigationError {
    #[error("waiting for the facilitator to continue")]
    Gated,

    #[error("already on the last slide")]
    AtEnd,

    #[error("already on the first slide")]
    AtStart,

    #[error("module outline is empty")]
    EmptyOutline,
}

/// Effect of feeding an event into the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Event was for another module/session or does not apply to this role.
    Ignored,
    /// Event applied but changed nothing (duplicate or stale).
    Unchanged,
    /// Current slide moved.
    Moved { from: u32, to: u32 },
    /// Known allowed index was raised.
    AllowedRaised { from: u32, to: u32 },
    /// The session was closed by the facilitator.
    SessionEnded,
}

/// Result of a permitted "Next".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextStep {
    pub new_index: u32,
    /// The facilitator must also raise the stored allowed index.
    pub advance_gate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientNavigationView {
    role: Role,
    session_code: SessionCode,
    module_id: ModuleId,
    outline: Vec<TemplateKind>,
    current_index: u32,
    known_allowed_index: u32,
    submodule_completed: bool,
}

impl ClientNavigationView {
    /// Mount a view at `initial_index` with no known permission.
    ///
    /// The caller is expected to poll the authoritative allowed index right
    /// after mounting and feed it to [`Self::apply_observed_allowed_index`].
    ///
    /// # Errors
    ///
    /// Returns `NavigationError::EmptyOutline` for a module without slides.
    pub fn mount(
        role: Role,
        session_code: SessionCode,
        module_id: ModuleId,
        outline: Vec<TemplateKind>,
        initial_index: u32,
    ) -> Result<Self, NavigationError> {
        if outline.is_empty() || u32::try_from(outline.len()).is_err() {
            return Err(NavigationError::EmptyOutline);
        }
        let mut view = Self {
            role,
            session_code,
            module_id,
            outline,
            current_index: 0,
            known_allowed_index: 0,
            submodule_completed: false,
        };
        view.current_index = view.clamp(initial_index);
        Ok(view)
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
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
    pub fn outline(&self) -> &[TemplateKind] {
        &self.outline
    }

    #[must_use]
    pub fn current_index(&self) -> u32 {
        self.current_index
    }

    #[must_use]
    pub fn known_allowed_index(&self) -> u32 {
        self.known_allowed_index
    }

    #[must_use]
    pub fn submodule_completed(&self) -> bool {
        self.submodule_completed
    }

    #[must_use]
    pub fn current_template(&self) -> TemplateKind {
        self.template_at(self.current_index)
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.current_index == self.last_index()
    }

    /// Gate decision for the current slide.
    ///
    /// Participants are gated on a blocking slide until the known allowed
    /// index moves past it. The facilitator is never gated.
    #[must_use]
    pub fn gate_state(&self) -> GateState {
        if self.role == Role::Facilitator {
            return GateState::Free;
        }
        match self.current_template().classify() {
            GateClass::NonBlocking => GateState::Free,
            GateClass::Blocking if self.known_allowed_index > self.current_index => GateState::Free,
            GateClass::Blocking => GateState::Gated,
        }
    }

    #[must_use]
    pub fn blocked_on_gate(&self) -> bool {
        self.gate_state() == GateState::Gated
    }

    /// Whether the "Next" control should be enabled.
    #[must_use]
    pub fn can_advance(&self) -> bool {
        !self.is_last() && !self.blocked_on_gate()
    }

    /// Single entry point for permission updates from broadcasts and polls.
    ///
    /// Returns the previous value when the known allowed index was raised.
    pub fn apply_observed_allowed_index(&mut self, observed: u32) -> Option<u32> {
        if observed > self.known_allowed_index {
            let previous = self.known_allowed_index;
            self.known_allowed_index = observed;
            Some(previous)
        } else {
            None
        }
    }

    /// Feed a broadcast event into the view.
    pub fn apply_event(&mut self, event: &SyncEvent) -> EventOutcome {
        match event {
            SyncEvent::ModuleAdvance {
                module_id,
                allowed_index,
            } => {
                if *module_id != self.module_id {
                    return EventOutcome::Ignored;
                }
                match self.apply_observed_allowed_index(*allowed_index) {
                    Some(from) => EventOutcome::AllowedRaised {
                        from,
                        to: self.known_allowed_index,
                    },
                    None => EventOutcome::Unchanged,
                }
            }
            SyncEvent::Navigate {
                module_id,
                session_id,
                submodule_index,
                ..
            } => {
                let targets_us = match (module_id, session_id) {
                    (Some(module_id), _) => *module_id == self.module_id,
                    (None, Some(session_id)) => *session_id == self.session_code,
                    (None, None) => false,
                };
                if !targets_us {
                    return EventOutcome::Ignored;
                }
                self.submodule_completed = false;
                self.move_to(*submodule_index)
            }
            SyncEvent::ForceSync {
                module_id,
                target_index,
            } => {
                if *module_id != self.module_id || self.role == Role::Facilitator {
                    return EventOutcome::Ignored;
                }
                self.move_to(*target_index)
            }
            SyncEvent::ModeChanged { .. } => EventOutcome::Ignored,
            SyncEvent::SessionEnded => EventOutcome::SessionEnded,
        }
    }

    /// User-initiated "Next".
    ///
    /// # Errors
    ///
    /// Returns `NavigationError::Gated` while waiting on the facilitator and
    /// `NavigationError::AtEnd` on the last slide.
    pub fn next(&mut self) -> Result<NextStep, NavigationError> {
        if self.is_last() {
            return Err(NavigationError::AtEnd);
        }
        if self.blocked_on_gate() {
            return Err(NavigationError::Gated);
        }
        self.current_index += 1;
        self.submodule_completed = false;
        Ok(NextStep {
            new_index: self.current_index,
            advance_gate: self.role == Role::Facilitator,
        })
    }

    /// User-initiated "Previous". Moving back never crosses a gate.
    ///
    /// # Errors
    ///
    /// Returns `NavigationError::AtStart` on the first slide.
    pub fn previous(&mut self) -> Result<u32, NavigationError> {
        if self.current_index == 0 {
            return Err(NavigationError::AtStart);
        }
        self.current_index -= 1;
        self.submodule_completed = false;
        Ok(self.current_index)
    }

    /// Mark the current slide as done locally (quiz answered, poll voted).
    pub fn mark_completed(&mut self) {
        self.submodule_completed = true;
    }

    fn move_to(&mut self, index: u32) -> EventOutcome {
        let target = self.clamp(index);
        if target == self.current_index {
            return EventOutcome::Unchanged;
        }
        let from = self.current_index;
        self.current_index = target;
        self.submodule_completed = false;
        EventOutcome::Moved { from, to: target }
    }

    fn last_index(&self) -> u32 {
        u32::try_from(self.outline.len().saturating_sub(1)).unwrap_or(u32::MAX)
    }

    fn clamp(&self, index: u32) -> u32 {
        index.min(self.last_index())
    }

    fn template_at(&self, index: u32) -> TemplateKind {
        let pos = usize::try_from(index).unwrap_or(usize::MAX);
        self.outline
            .get(pos)
            .or_else(|| self.outline.last())
            .copied()
            .unwrap_or(TemplateKind::Content)
    }
}
