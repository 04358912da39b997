use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::api::ApiClient;
use crate::config::Config;
use crate::platform::{AckToken, Authenticator, Channel, Message, Platform, PlatformError, User};
use crate::realtime::Gateway;

pub struct DiscordAuthenticator {
    api: ApiClient,
    gateway_url: Option<String>,
}

impl DiscordAuthenticator {
    pub fn new(config: &Config) -> Self {
        Self {
            api: ApiClient::new(config.api_base_url.clone()),
            gateway_url: config.gateway_url.clone(),
        }
    }

    fn session(&self, token: String) -> DiscordSession {
        DiscordSession {
            api: self.api.clone(),
            token,
            gateway_url: self.gateway_url.clone(),
            gateway: None,
        }
    }
}

#[async_trait]
impl Authenticator for DiscordAuthenticator {
    type Session = DiscordSession;

    async fn authenticate_with_token(&self, token: &str) -> Result<DiscordSession, PlatformError> {
        Ok(self.session(token.trim().to_string()))
    }

    async fn authenticate_with_login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<DiscordSession, PlatformError> {
        let token = self.api.login(email, password).await?;
        debug!("login accepted");
        Ok(self.session(token))
    }
}

pub struct DiscordSession {
    api: ApiClient,
    token: String,
    gateway_url: Option<String>,
    gateway: Option<Gateway>,
}

#[async_trait]
impl Platform for DiscordSession {
    fn token(&self) -> &str {
        &self.token
    }

    async fn current_user(&self) -> Result<User, PlatformError> {
        Ok(self.api.current_user(&self.token).await?)
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, PlatformError> {
        Ok(self.api.user_channels(&self.token).await?)
    }

    async fn fetch_history(&self, channel_id: &str, limit: u8) -> Result<Vec<Message>, PlatformError> {
        Ok(self.api.channel_messages(&self.token, channel_id, limit).await?)
    }

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<(), PlatformError> {
        let message = self.api.send_message(&self.token, channel_id, text).await?;
        debug!(message_id = %message.id, "message sent");
        Ok(())
    }

    async fn acknowledge(
        &self,
        channel_id: &str,
        message_id: &str,
        previous: Option<&AckToken>,
    ) -> Result<Option<AckToken>, PlatformError> {
        let cursor = self
            .api
            .ack_message(
                &self.token,
                channel_id,
                message_id,
                previous.map(|token| token.0.as_str()),
            )
            .await?;
        Ok(cursor.map(AckToken))
    }

    async fn open(&mut self) -> Result<mpsc::UnboundedReceiver<Message>, PlatformError> {
        if let Some(mut previous) = self.gateway.take() {
            previous.close().await;
        }
        let url = match &self.gateway_url {
            Some(url) => url.clone(),
            None => self.api.gateway_url().await?,
        };
        let (gateway, receiver) = Gateway::connect(&url, &self.token).await?;
        self.gateway = Some(gateway);
        Ok(receiver)
    }

    async fn close(&mut self) -> Result<(), PlatformError> {
        if let Some(mut gateway) = self.gateway.take() {
            gateway.close().await;
            debug!("gateway closed");
        }
        Ok(())
    }
}
