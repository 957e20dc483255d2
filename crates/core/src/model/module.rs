use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ModuleId, SubmoduleId, TemplateKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModuleError {
    #[error("module title cannot be empty")]
    EmptyTitle,

    #[error("module must contain at least one submodule")]
    NoSubmodules,

    #[error("too many submodules: {len}")]
    TooManySubmodules { len: usize },

    #[error("duplicate submodule id {0}")]
    DuplicateSubmodule(SubmoduleId),
}

/// A single slide inside a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submodule {
    pub id: SubmoduleId,
    pub title: String,
    pub template: TemplateKind,
    /// Estimated time on this slide, in seconds.
    pub duration_secs: u32,
}

impl Submodule {
    #[must_use]
    pub fn new(
        id: SubmoduleId,
        title: impl Into<String>,
        template: TemplateKind,
        duration_secs: u32,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            template,
            duration_secs,
        }
    }
}

/// Ordered sequence of slides.
///
/// Submodule order is the navigation order; index 0 is the first slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    id: ModuleId,
    title: String,
    submodules: Vec<Submodule>,
}

impl Module {
    /// Build a validated module.
    ///
    /// # Errors
    ///
    /// Returns `ModuleError` if the title is blank, the submodule list is
    /// empty or too long to index with `u32`, or submodule ids repeat.
    pub fn new(
        id: ModuleId,
        title: impl Into<String>,
        submodules: Vec<Submodule>,
    ) -> Result<Self, ModuleError> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(ModuleError::EmptyTitle);
        }
        if submodules.is_empty() {
            return Err(ModuleError::NoSubmodules);
        }
        if u32::try_from(submodules.len()).is_err() {
            return Err(ModuleError::TooManySubmodules {
                len: submodules.len(),
            });
        }
        for (pos, sub) in submodules.iter().enumerate() {
            if submodules[..pos].iter().any(|other| other.id == sub.id) {
                return Err(ModuleError::DuplicateSubmodule(sub.id));
            }
        }

        Ok(Self {
            id,
            title,
            submodules,
        })
    }

    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn submodules(&self) -> &[Submodule] {
        &self.submodules
    }

    #[must_use]
    pub fn submodule(&self, index: u32) -> Option<&Submodule> {
        self.submodules.get(usize::try_from(index).ok()?)
    }

    /// Template kinds in navigation order.
    #[must_use]
    pub fn outline(&self) -> Vec<TemplateKind> {
        self.submodules.iter().map(|sub| sub.template).collect()
    }

    /// Sum of the per-slide duration estimates.
    #[must_use]
    pub fn estimated_duration_secs(&self) -> u64 {
        self.submodules
            .iter()
            .map(|sub| u64::from(sub.duration_secs))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slide(id: u64, template: TemplateKind) -> Submodule {
        Submodule::new(SubmoduleId::new(id), format!("Slide {id}"), template, 60)
    }

    #[test]
    fn outline_preserves_order() {
        let module = Module::new(
            ModuleId::new(1),
            "Intro",
            vec![
                slide(10, TemplateKind::Title),
                slide(11, TemplateKind::Quiz),
                slide(12, TemplateKind::Summary),
            ],
        )
        .unwrap();

        assert_eq!(
            module.outline(),
            vec![TemplateKind::Title, TemplateKind::Quiz, TemplateKind::Summary]
        );
        assert_eq!(module.submodule(1).unwrap().id, SubmoduleId::new(11));
        assert!(module.submodule(3).is_none());
        assert_eq!(module.estimated_duration_secs(), 180);
    }

    #[test]
    fn rejects_empty_module() {
        let err = Module::new(ModuleId::new(1), "Intro", Vec::new()).unwrap_err();
        assert_eq!(err, ModuleError::NoSubmodules);
    }

    #[test]
    fn rejects_blank_title() {
        let err = Module::new(ModuleId::new(1), "  ", vec![slide(1, TemplateKind::Title)])
            .unwrap_err();
        assert_eq!(err, ModuleError::EmptyTitle);
    }

    #[test]
    fn rejects_duplicate_submodule_ids() {
        let err = Module::new(
            ModuleId::new(1),
            "Intro",
            vec![slide(1, TemplateKind::Title), slide(1, TemplateKind::Poll)],
        )
        .unwrap_err();
        assert_eq!(err, ModuleError::DuplicateSubmodule(SubmoduleId::new(1)));
    }
}
