use async_trait::async_trait;
use compagnon_core::model::{ModuleId, SessionCode};

use crate::error::BackendError;
use crate::navigation_gate::{AdvanceOutcome, NavigationGate};

/// Authoritative navigation store as seen from a presentation view.
///
/// Implemented in-process by [`NavigationGate`] and over HTTP by the
/// client crate.
#[async_trait]
pub trait NavigationBackend: Send + Sync {
    async fn fetch_allowed_index(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
    ) -> Result<u32, BackendError>;

    async fn advance(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
        new_index: u32,
    ) -> Result<AdvanceOutcome, BackendError>;
}

#[async_trait]
impl NavigationBackend for NavigationGate {
    async fn fetch_allowed_index(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
    ) -> Result<u32, BackendError> {
        Ok(self.allowed_index(code, module_id).await?)
    }

    async fn advance(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
        new_index: u32,
    ) -> Result<AdvanceOutcome, BackendError> {
        Ok(NavigationGate::advance(self, code, module_id, new_index).await?)
    }
}
