//! Capability set of the chat platform plus the records it hands back.
//!
//! The transcript engine, channel selector and session factory only talk to
//! these traits; the Discord implementation lives in `discord.rs`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::api::ApiError;
use crate::realtime::GatewayError;

/// Discord channel type for a one-to-one direct message.
pub const DIRECT_MESSAGE_KIND: u8 = 1;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("gateway connection closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub global_name: Option<String>,
}

impl User {
    pub fn display_name(&self) -> String {
        if let Some(name) = self.global_name.as_deref().filter(|name| !name.trim().is_empty()) {
            return name.to_string();
        }
        match self.discriminator.as_deref() {
            Some(tag) if !tag.is_empty() && tag != "0" => format!("{}#{}", self.username, tag),
            _ => self.username.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub recipients: Vec<User>,
}

impl Channel {
    pub fn is_direct_message(&self) -> bool {
        self.kind == DIRECT_MESSAGE_KIND
    }

    /// Recipient display names joined by spaces, `self_id` left out.
    pub fn recipient_names(&self, self_id: Option<&str>) -> String {
        let names: Vec<String> = self
            .recipients
            .iter()
            .filter(|user| Some(user.id.as_str()) != self_id)
            .map(User::display_name)
            .collect();
        names.join(" ").trim().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    pub author: User,
    #[serde(default)]
    pub content: String,
    pub timestamp: String,
    #[serde(default)]
    pub mentions: Vec<User>,
}

/// Server-issued "last read" cursor; opaque to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AckToken(pub String);

#[async_trait]
pub trait Platform: Send + Sync {
    fn token(&self) -> &str;

    async fn current_user(&self) -> Result<User, PlatformError>;

    async fn list_channels(&self) -> Result<Vec<Channel>, PlatformError>;

    /// Most recent messages of a channel, newest first.
    async fn fetch_history(&self, channel_id: &str, limit: u8) -> Result<Vec<Message>, PlatformError>;

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<(), PlatformError>;

    async fn acknowledge(
        &self,
        channel_id: &str,
        message_id: &str,
        previous: Option<&AckToken>,
    ) -> Result<Option<AckToken>, PlatformError>;

    /// Opens the real-time connection. Every message created on the account
    /// is forwarded on the returned receiver until the connection ends.
    async fn open(&mut self) -> Result<mpsc::UnboundedReceiver<Message>, PlatformError>;

    async fn close(&mut self) -> Result<(), PlatformError>;
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    type Session: Platform;

    async fn authenticate_with_token(&self, token: &str) -> Result<Self::Session, PlatformError>;

    async fn authenticate_with_login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Self::Session, PlatformError>;
}
