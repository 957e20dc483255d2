mod event;
mod ids;
mod module;
mod navigation;
mod session;
mod template;
mod theme;

pub use event::SyncEvent;
pub use ids::{
    ModuleId, ParseIdError, SESSION_CODE_ALPHABET, SESSION_CODE_LEN, SessionCode,
    SessionCodeError, SubmoduleId,
};
pub use module::{Module, ModuleError, Submodule};
pub use navigation::NavigationState;
pub use session::{PresentationMode, Session, SessionError, SessionPosition};
pub use template::{GateClass, TemplateKind, UnknownTemplate};
pub use theme::{Theme, ThemeDraft, ThemeError};
