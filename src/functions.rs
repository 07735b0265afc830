//! Server-side callable endpoints used instead of direct writes.

use crate::error::FunctionError;
use crate::models::Role;
use futures_util::future::LocalBoxFuture;
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SendMessageRequest {
    #[serde(rename = "senderId")]
    pub sender_id: String,
    #[serde(rename = "receiverId")]
    pub receiver_id: String,
    #[serde(rename = "messageText")]
    pub message_text: String,
}

/// The client mints `session_id` and `token`; the endpoint writes the
/// session record only once the credentials and role check out.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DoctorLoginRequest {
    pub email: String,
    /// SHA-256 hex of the password.
    pub password: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub token: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DoctorProfile {
    pub id: String,
    pub firstname: String,
    pub surname: String,
    pub email: String,
    #[serde(default)]
    pub specialization: Option<String>,
    pub role: Role,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DoctorLoginResponse {
    pub success: bool,
    pub user: DoctorProfile,
    /// Server-assigned expiry of the written session record.
    #[serde(rename = "expiresAt", default)]
    pub expires_at: Option<i64>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub trait CloudFunctions {
    fn send_message<'a>(&'a self, request: &'a SendMessageRequest)
        -> LocalBoxFuture<'a, Result<(), FunctionError>>;

    fn doctor_login<'a>(
        &'a self,
        request: &'a DoctorLoginRequest,
    ) -> LocalBoxFuture<'a, Result<DoctorLoginResponse, FunctionError>>;
}

/// JSON-over-HTTPS POST client for the deployed endpoints.
pub struct HttpFunctions {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFunctions {
    pub fn new(base_url: &str) -> Self {
        HttpFunctions {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, name: &str, body: &B) -> Result<R, FunctionError> {
        let url = self.endpoint(name);
        debug!("[Functions] POST {}", url);
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or(text);
            return Err(FunctionError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        serde_json::from_str(&text).map_err(|e| FunctionError::Malformed(e.to_string()))
    }
}

impl CloudFunctions for HttpFunctions {
    fn send_message<'a>(&'a self, request: &'a SendMessageRequest) -> LocalBoxFuture<'a, Result<(), FunctionError>> {
        Box::pin(async move {
            let _: serde_json::Value = self.post("sendMessage", request).await?;
            Ok(())
        })
    }

    fn doctor_login<'a>(
        &'a self,
        request: &'a DoctorLoginRequest,
    ) -> LocalBoxFuture<'a, Result<DoctorLoginResponse, FunctionError>> {
        Box::pin(async move {
            let response: DoctorLoginResponse = self.post("doctorLogin", request).await?;
            if !response.success {
                return Err(FunctionError::Malformed(
                    "doctorLogin answered without success".to_string(),
                ));
            }
            Ok(response)
        })
    }
}
