use compagnon_core::model::TemplateKind;
use compagnon_core::presentation::{GateState, Role};
use services::ViewSnapshot;

pub const WAITING_FOR_FACILITATOR: &str = "waiting for facilitator";

/// What the participant is expected to do on a slide.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interaction {
    Read,
    Watch,
    Answer,
    Vote,
    Contribute,
    Draw,
    Rate,
}

/// Display-ready state of the current slide.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlideVm {
    pub position: String,
    pub kind_label: &'static str,
    pub interaction: Interaction,
    pub status: Option<&'static str>,
    pub can_previous: bool,
    pub can_next: bool,
    pub completed: bool,
}

/// Build the view model for a controller snapshot of a `total`-slide module.
#[must_use]
pub fn map_slide(snapshot: &ViewSnapshot, total: usize) -> SlideVm {
    let (kind_label, interaction) = describe(snapshot.template);
    let gated = snapshot.gate == GateState::Gated;
    let status = if snapshot.session_ended {
        Some("session ended")
    } else if gated {
        Some(WAITING_FOR_FACILITATOR)
    } else if snapshot.role == Role::Facilitator && snapshot.template.is_blocking() {
        Some("participants wait here until you continue")
    } else {
        None
    };

    SlideVm {
        position: format!("{} / {}", snapshot.current_index.saturating_add(1), total),
        kind_label,
        interaction,
        status,
        can_previous: !snapshot.session_ended && snapshot.current_index > 0,
        can_next: !snapshot.session_ended && !snapshot.is_last && !gated,
        completed: snapshot.completed,
    }
}

fn describe(template: TemplateKind) -> (&'static str, Interaction) {
    match template {
        TemplateKind::Title => ("Title", Interaction::Read),
        TemplateKind::Content => ("Content", Interaction::Read),
        TemplateKind::Media => ("Media", Interaction::Watch),
        TemplateKind::Video => ("Video", Interaction::Watch),
        TemplateKind::Quiz => ("Quiz", Interaction::Answer),
        TemplateKind::Poll => ("Poll", Interaction::Vote),
        TemplateKind::Wordcloud => ("Word cloud", Interaction::Contribute),
        TemplateKind::Whiteboard => ("Whiteboard", Interaction::Draw),
        TemplateKind::Feedback => ("Feedback", Interaction::Rate),
        TemplateKind::Summary => ("Summary", Interaction::Read),
    }
}
