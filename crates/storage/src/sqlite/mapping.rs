use compagnon_core::model::{ModuleId, PresentationMode, SessionCode, SubmoduleId, TemplateKind};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn module_id_from_i64(v: i64) -> Result<ModuleId, StorageError> {
    Ok(ModuleId::new(i64_to_u64("module_id", v)?))
}

pub(crate) fn submodule_id_from_i64(v: i64) -> Result<SubmoduleId, StorageError> {
    Ok(SubmoduleId::new(i64_to_u64("submodule_id", v)?))
}

pub(crate) fn module_id_to_i64(id: ModuleId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("module_id overflow".into()))
}

pub(crate) fn submodule_id_to_i64(id: SubmoduleId) -> Result<i64, StorageError> {
    i64::try_from(id.value())
        .map_err(|_| StorageError::Serialization("submodule_id overflow".into()))
}

pub(crate) fn index_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn session_code_from_str(s: &str) -> Result<SessionCode, StorageError> {
    SessionCode::new(s).map_err(ser)
}

pub(crate) fn parse_template(s: &str) -> Result<TemplateKind, StorageError> {
    s.parse::<TemplateKind>().map_err(ser)
}

pub(crate) fn parse_mode(s: &str) -> Result<PresentationMode, StorageError> {
    s.parse::<PresentationMode>().map_err(ser)
}
