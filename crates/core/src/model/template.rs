use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Template a submodule is rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Title,
    Content,
    Media,
    Video,
    Quiz,
    Poll,
    Wordcloud,
    Whiteboard,
    Feedback,
    Summary,
}

/// Whether a template halts participant advancement until the facilitator
/// approves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateClass {
    Blocking,
    NonBlocking,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 10] = [
        TemplateKind::Title,
        TemplateKind::Content,
        TemplateKind::Media,
        TemplateKind::Video,
        TemplateKind::Quiz,
        TemplateKind::Poll,
        TemplateKind::Wordcloud,
        TemplateKind::Whiteboard,
        TemplateKind::Feedback,
        TemplateKind::Summary,
    ];

    /// Stable lowercase name used in storage and on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateKind::Title => "title",
            TemplateKind::Content => "content",
            TemplateKind::Media => "media",
            TemplateKind::Video => "video",
            TemplateKind::Quiz => "quiz",
            TemplateKind::Poll => "poll",
            TemplateKind::Wordcloud => "wordcloud",
            TemplateKind::Whiteboard => "whiteboard",
            TemplateKind::Feedback => "feedback",
            TemplateKind::Summary => "summary",
        }
    }

    /// Static blocking lookup: quizzes and polls hold participants back.
    #[must_use]
    pub fn classify(self) -> GateClass {
        match self {
            TemplateKind::Quiz | TemplateKind::Poll => GateClass::Blocking,
            TemplateKind::Title
            | TemplateKind::Content
            | TemplateKind::Media
            | TemplateKind::Video
            | TemplateKind::Wordcloud
            | TemplateKind::Whiteboard
            | TemplateKind::Feedback
            | TemplateKind::Summary => GateClass::NonBlocking,
        }
    }

    #[must_use]
    pub fn is_blocking(self) -> bool {
        self.classify() == GateClass::Blocking
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown template type: {0}")]
pub struct UnknownTemplate(pub String);

impl FromStr for TemplateKind {
    type Err = UnknownTemplate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        TemplateKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| UnknownTemplate(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_quiz_and_poll_block() {
        let blocking: Vec<_> = TemplateKind::ALL
            .into_iter()
            .filter(|kind| kind.is_blocking())
            .collect();
        assert_eq!(blocking, vec![TemplateKind::Quiz, TemplateKind::Poll]);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Quiz".parse::<TemplateKind>().unwrap(), TemplateKind::Quiz);
        assert_eq!(
            " wordcloud ".parse::<TemplateKind>().unwrap(),
            TemplateKind::Wordcloud
        );
    }

    #[test]
    fn unknown_template_is_an_error() {
        let err = "carousel".parse::<TemplateKind>().unwrap_err();
        assert_eq!(err, UnknownTemplate("carousel".into()));
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for kind in TemplateKind::ALL {
            assert_eq!(kind.as_str().parse::<TemplateKind>().unwrap(), kind);
        }
    }
}
