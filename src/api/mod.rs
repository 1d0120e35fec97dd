//! Remote resource client: envelope unwrapping, status mapping and auth header injection
//! over an injectable [`Transport`].

pub mod envelope;
pub mod error;
pub mod transport;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

use crate::ui::{Notice, Notifier};
pub use envelope::{Envelope, Page, UnreadCount};
pub use error::ApiError;
pub use transport::{Body, HttpTransport, Request, Response, Transport, TransportError};

pub mod endpoints {
    pub const AUTH_LOGIN: &str = "/api/v1/auth/login";
    pub const AUTH_REGISTER: &str = "/api/v1/auth/register";
    pub const AUTH_LOGOUT: &str = "/api/v1/auth/logout";
    pub const AUTH_ME: &str = "/api/v1/auth/me";
    pub const AUTH_VALIDATE: &str = "/api/v1/auth/validate";
    pub const AUTH_CHANGE_PASSWORD: &str = "/api/v1/auth/change-password";
    pub const USER_PROFILE: &str = "/api/v1/users/profile";
}

type TokenSource = Arc<dyn Fn() -> Option<String> + Send + Sync>;
type UnauthorizedHandler = Arc<dyn Fn() + Send + Sync>;

pub struct ApiClient {
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    token_source: Option<TokenSource>,
    on_unauthorized: Option<UnauthorizedHandler>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            transport,
            notifier,
            token_source: None,
            on_unauthorized: None,
        }
    }

    /// Supplies the bearer token attached to every request.
    pub fn with_token_source(mut self, source: impl Fn() -> Option<String> + Send + Sync + 'static) -> Self {
        self.token_source = Some(Arc::new(source));
        self
    }

    /// Called on every 401 before the failure propagates.
    pub fn on_unauthorized(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_unauthorized = Some(Arc::new(handler));
        self
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(String, String)]) -> Result<T, ApiError> {
        let mut request = Request::new(Method::GET, path);
        request.query = query.to_vec();
        self.call(request).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.call(json_request(Method::POST, path, body)?).await
    }

    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.call(Request::new(Method::POST, path)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.call(json_request(Method::PUT, path, body)?).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.call(json_request(Method::PATCH, path, body)?).await
    }

    pub async fn patch_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.call(Request::new(Method::PATCH, path)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.call(Request::new(Method::DELETE, path)).await
    }

    /// POST a file as the multipart field `file`.
    pub async fn upload<T: DeserializeOwned>(&self, path: &str, file_name: &str, bytes: Vec<u8>) -> Result<T, ApiError> {
        let mut request = Request::new(Method::POST, path);
        request.body = Body::File {
            field: "file".to_string(),
            file_name: file_name.to_string(),
            bytes,
        };
        self.call(request).await
    }

    /// GET a raw (non-enveloped) resource and write it to `dest`.
    pub async fn download(&self, path: &str, dest: &Path) -> Result<(), ApiError> {
        let response = self.execute(Request::new(Method::GET, path)).await?;
        if let Err(e) = tokio::fs::write(dest, &response.body).await {
            let err = ApiError::Io(format!("Failed to write {}: {}", dest.display(), e));
            self.report(&err);
            return Err(err);
        }
        log::info!("Downloaded {} to {}", path, dest.display());
        Ok(())
    }

    async fn call<T: DeserializeOwned>(&self, request: Request) -> Result<T, ApiError> {
        let path = request.path.clone();
        let response = self.execute(request).await?;
        let result = Envelope::parse(&response.body).and_then(Envelope::into_data::<T>);
        if let Err(err) = &result {
            log::warn!("{} returned an unusable envelope: {}", path, err);
            self.report(err);
        }
        result
    }

    /// Send and map transport failures and non-2xx statuses to errors.
    async fn execute(&self, mut request: Request) -> Result<Response, ApiError> {
        request.bearer = self.token_source.as_ref().and_then(|source| source());
        let method = request.method.clone();
        let path = request.path.clone();

        let response = match self.transport.send(request).await {
            Ok(r) => r,
            Err(e) => {
                log::warn!("{} {} got no response: {}", method, path, e);
                let err = ApiError::Network(e.0);
                self.report(&err);
                return Err(err);
            }
        };

        if response.is_success() {
            return Ok(response);
        }

        let err = ApiError::from_status(response.status, &response.body);
        log::warn!("{} {} failed: {}", method, path, err);
        if err == ApiError::Unauthorized {
            if let Some(handler) = &self.on_unauthorized {
                handler();
            }
        }
        self.report(&err);
        Err(err)
    }

    fn report(&self, err: &ApiError) {
        self.notifier.notify(Notice::error(err.user_message()));
    }
}

fn json_request<B: Serialize + ?Sized>(method: Method, path: &str, body: &B) -> Result<Request, ApiError> {
    let value = serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))?;
    let mut request = Request::new(method, path);
    request.body = Body::Json(value);
    Ok(request)
}
