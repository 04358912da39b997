use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::platform::{Channel, Message, User};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected status: {0}")]
    Status(u16),
    #[error("api error: {message} (HTTP {status})")]
    Api { status: u16, message: String },
    #[error("login did not return a token (multi-factor authentication is not supported)")]
    MissingToken,
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let url = format!("{}/auth/login", self.base_url);
        let payload = json!({
            "login": email,
            "password": password,
            "undelete": false,
        });
        let result: LoginResult = self.send(self.http.post(url).json(&payload)).await?;
        result.token.filter(|token| !token.is_empty()).ok_or(ApiError::MissingToken)
    }

    pub async fn current_user(&self, token: &str) -> Result<User, ApiError> {
        let url = format!("{}/users/@me", self.base_url);
        self.send(self.http.get(url).header(AUTHORIZATION, token)).await
    }

    pub async fn user_channels(&self, token: &str) -> Result<Vec<Channel>, ApiError> {
        let url = format!("{}/users/@me/channels", self.base_url);
        self.send(self.http.get(url).header(AUTHORIZATION, token)).await
    }

    pub async fn channel_messages(
        &self,
        token: &str,
        channel_id: &str,
        limit: u8,
    ) -> Result<Vec<Message>, ApiError> {
        let url = format!("{}/channels/{}/messages", self.base_url, channel_id);
        let request = self
            .http
            .get(url)
            .header(AUTHORIZATION, token)
            .query(&[("limit", limit.to_string())]);
        self.send(request).await
    }

    pub async fn send_message(
        &self,
        token: &str,
        channel_id: &str,
        content: &str,
    ) -> Result<Message, ApiError> {
        let url = format!("{}/channels/{}/messages", self.base_url, channel_id);
        let payload = json!({ "content": content, "tts": false });
        self.send(self.http.post(url).header(AUTHORIZATION, token).json(&payload))
            .await
    }

    pub async fn ack_message(
        &self,
        token: &str,
        channel_id: &str,
        message_id: &str,
        previous: Option<&str>,
    ) -> Result<Option<String>, ApiError> {
        let url = format!(
            "{}/channels/{}/messages/{}/ack",
            self.base_url, channel_id, message_id
        );
        let payload = json!({ "token": previous });
        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, token)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(error_from_body(status.as_u16(), &body));
        }
        if body.trim().is_empty() {
            return Ok(None);
        }
        let result: AckResult = serde_json::from_str(&body)?;
        Ok(result.token)
    }

    pub async fn gateway_url(&self) -> Result<String, ApiError> {
        let url = format!("{}/gateway", self.base_url);
        let result: GatewayResult = self.send(self.http.get(url)).await?;
        Ok(result.url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "api response");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_body(status.as_u16(), &body));
        }
        Ok(response.json().await?)
    }
}

fn error_from_body(status: u16, body: &str) -> ApiError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: Some(message),
        }) if !message.is_empty() => ApiError::Api { status, message },
        _ => ApiError::Status(status),
    }
}

#[derive(Debug, Deserialize)]
struct LoginResult {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AckResult {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayResult {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_message_is_kept() {
        let error = error_from_body(401, r#"{"message": "401: Unauthorized", "code": 0}"#);
        match error {
            ApiError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "401: Unauthorized");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unparsable_body_falls_back_to_status() {
        let error = error_from_body(502, "<html>bad gateway</html>");
        assert!(matches!(error, ApiError::Status(502)));
    }

    #[test]
    fn base_url_is_normalized() {
        let client = ApiClient::new("https://example.test/api/v9/".to_string());
        assert_eq!(client.base_url, "https://example.test/api/v9");
    }
}
