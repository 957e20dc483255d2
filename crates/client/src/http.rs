use async_trait::async_trait;
use compagnon_core::model::{ModuleId, PresentationMode, SessionCode, SubmoduleId};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use services::{AdvanceOutcome, BackendError, ModuleOutline, NavigationBackend};
use tracing::debug;
use url::Url;

use crate::error::ClientError;

/// Session fields the client cares about.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub code: SessionCode,
    pub module_ids: Vec<ModuleId>,
    pub mode: PresentationMode,
    pub active: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AllowedIndexBody {
    allowed_index: u32,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NavigateBody {
    submodule_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    submodule_id: Option<SubmoduleId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    module_id: Option<ModuleId>,
}

/// JSON client for the presentation server.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    base: Url,
    http: Client,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Returns `ClientError` if `server` is not an `http(s)` URL or the HTTP
    /// client cannot be built.
    pub fn new(server: &str) -> Result<Self, ClientError> {
        let mut base = Url::parse(server.trim())?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ClientError::UnsupportedScheme(base.scheme().to_string()));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = Client::builder().build()?;
        Ok(Self { base, http })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base.join(path)?)
    }

    fn module_endpoint(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
        action: &str,
    ) -> Result<Url, ClientError> {
        self.endpoint(&format!("api/sessions/{code}/modules/{module_id}/{action}"))
    }

    /// # Errors
    ///
    /// Returns `ClientError` on transport failures or non-success statuses.
    pub async fn session(&self, code: &SessionCode) -> Result<SessionInfo, ClientError> {
        let url = self.endpoint(&format!("api/sessions/{code}"))?;
        read_json(self.http.get(url).send().await?).await
    }

    /// # Errors
    ///
    /// Returns `ClientError` on transport failures or non-success statuses.
    pub async fn start_session(
        &self,
        module_ids: &[ModuleId],
        mode: PresentationMode,
    ) -> Result<SessionInfo, ClientError> {
        let url = self.endpoint("api/sessions")?;
        let body = json!({ "moduleIds": module_ids, "mode": mode });
        read_json(self.http.post(url).json(&body).send().await?).await
    }

    /// # Errors
    ///
    /// Returns `ClientError` on transport failures or non-success statuses.
    pub async fn end_session(&self, code: &SessionCode) -> Result<SessionInfo, ClientError> {
        let url = self.endpoint(&format!("api/sessions/{code}/end"))?;
        read_json(self.http.post(url).send().await?).await
    }

    /// # Errors
    ///
    /// Returns `ClientError` on transport failures or non-success statuses.
    pub async fn outline(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
    ) -> Result<ModuleOutline, ClientError> {
        let url = self.module_endpoint(code, module_id, "outline")?;
        read_json(self.http.get(url).send().await?).await
    }

    /// # Errors
    ///
    /// Returns `ClientError` on transport failures or non-success statuses.
    pub async fn allowed_index(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
    ) -> Result<u32, ClientError> {
        let url = self.module_endpoint(code, module_id, "allowed-index")?;
        let body: AllowedIndexBody = read_json(self.http.get(url).send().await?).await?;
        Ok(body.allowed_index)
    }

    /// # Errors
    ///
    /// Returns `ClientError` on transport failures or non-success statuses.
    pub async fn advance(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
        new_index: u32,
    ) -> Result<AdvanceOutcome, ClientError> {
        let url = self.module_endpoint(code, module_id, "advance")?;
        let response = self
            .http
            .post(url)
            .json(&json!({ "newIndex": new_index }))
            .send()
            .await?;
        read_json(response).await
    }

    /// # Errors
    ///
    /// Returns `ClientError` on transport failures or non-success statuses.
    pub async fn force_sync(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
        target_index: u32,
    ) -> Result<(), ClientError> {
        let url = self.module_endpoint(code, module_id, "force-sync")?;
        let response = self
            .http
            .post(url)
            .json(&json!({ "targetIndex": target_index }))
            .send()
            .await?;
        check(response).await.map(drop)
    }

    /// # Errors
    ///
    /// Returns `ClientError` on transport failures or non-success statuses.
    pub async fn navigate(
        &self,
        code: &SessionCode,
        module_id: Option<ModuleId>,
        submodule_index: u32,
        submodule_id: Option<SubmoduleId>,
    ) -> Result<(), ClientError> {
        let url = self.endpoint(&format!("api/sessions/{code}/navigate"))?;
        let body = NavigateBody {
            submodule_index,
            submodule_id,
            module_id,
        };
        check(self.http.post(url).json(&body).send().await?)
            .await
            .map(drop)
    }
}

#[async_trait]
impl NavigationBackend for HttpBackend {
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
        Ok(HttpBackend::advance(self, code, module_id, new_index).await?)
    }
}

async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    debug!(status = status.as_u16(), error = %message, "request rejected");
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    Ok(check(response).await?.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code() -> SessionCode {
        SessionCode::new("ABCD23").unwrap()
    }

    #[test]
    fn base_url_gains_a_trailing_slash() {
        let backend = HttpBackend::new("http://localhost:8080/compagnon").unwrap();
        assert_eq!(backend.base_url().as_str(), "http://localhost:8080/compagnon/");
        let url = backend
            .module_endpoint(&code(), ModuleId::new(4), "advance")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/compagnon/api/sessions/ABCD23/modules/4/advance"
        );
    }

    #[test]
    fn rejects_non_http_schemes() {
        let err = HttpBackend::new("ftp://example.com").unwrap_err();
        assert!(matches!(err, ClientError::UnsupportedScheme(scheme) if scheme == "ftp"));
        assert!(matches!(
            HttpBackend::new("not a url").unwrap_err(),
            ClientError::InvalidUrl(_)
        ));
    }

    #[test]
    fn status_errors_become_rejections() {
        let err = BackendError::from(ClientError::Status {
            status: 409,
            message: "session ABCD23 has already ended".into(),
        });
        assert!(matches!(err, BackendError::Rejected { status: 409, .. }));
    }
}
