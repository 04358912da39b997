//! In-memory platform used by unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::api::ApiError;
use crate::platform::{AckToken, Authenticator, Channel, Message, Platform, PlatformError, User};

pub fn user(id: &str, username: &str) -> User {
    User {
        id: id.to_string(),
        username: username.to_string(),
        discriminator: Some("0".to_string()),
        global_name: None,
    }
}

pub fn dm(id: &str, recipient: &str) -> Channel {
    Channel {
        id: id.to_string(),
        kind: crate::platform::DIRECT_MESSAGE_KIND,
        recipients: vec![user(&format!("u-{recipient}"), recipient)],
    }
}

pub fn message(id: &str, channel_id: &str, author: &str, content: &str, minute: u32) -> Message {
    Message {
        id: id.to_string(),
        channel_id: channel_id.to_string(),
        author: user(&format!("u-{author}"), author),
        content: content.to_string(),
        timestamp: format!("2024-05-01T10:{minute:02}:00.000000+00:00"),
        mentions: Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckCall {
    pub channel_id: String,
    pub message_id: String,
    pub previous: Option<AckToken>,
}

#[derive(Default)]
pub struct MockPlatform {
    pub token: String,
    pub me: Option<User>,
    pub channels: Vec<Channel>,
    pub history: Vec<Message>,
    pub fail_history: bool,
    pub fail_send: bool,
    pub history_requests: Mutex<Vec<(String, u8)>>,
    pub sent: Mutex<Vec<(String, String)>>,
    pub acks: Mutex<Vec<AckCall>>,
    pub inbound: Option<mpsc::UnboundedReceiver<Message>>,
    pub close_calls: usize,
    pub fail_close: bool,
}

impl MockPlatform {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: token.to_string(),
            me: Some(user("u-me", "me")),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("sent lock").clone()
    }

    pub fn acks(&self) -> Vec<AckCall> {
        self.acks.lock().expect("ack lock").clone()
    }
}

fn rejected(status: u16) -> PlatformError {
    PlatformError::Api(ApiError::Status(status))
}

#[async_trait]
impl Platform for MockPlatform {
    fn token(&self) -> &str {
        &self.token
    }

    async fn current_user(&self) -> Result<User, PlatformError> {
        self.me.clone().ok_or_else(|| rejected(401))
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, PlatformError> {
        Ok(self.channels.clone())
    }

    async fn fetch_history(&self, channel_id: &str, limit: u8) -> Result<Vec<Message>, PlatformError> {
        self.history_requests
            .lock()
            .expect("history lock")
            .push((channel_id.to_string(), limit));
        if self.fail_history {
            return Err(rejected(500));
        }
        Ok(self.history.clone())
    }

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<(), PlatformError> {
        self.sent
            .lock()
            .expect("sent lock")
            .push((channel_id.to_string(), text.to_string()));
        if self.fail_send {
            return Err(rejected(403));
        }
        Ok(())
    }

    async fn acknowledge(
        &self,
        channel_id: &str,
        message_id: &str,
        previous: Option<&AckToken>,
    ) -> Result<Option<AckToken>, PlatformError> {
        let mut acks = self.acks.lock().expect("ack lock");
        acks.push(AckCall {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
            previous: previous.cloned(),
        });
        Ok(Some(AckToken(format!("cursor-{}", acks.len()))))
    }

    async fn open(&mut self) -> Result<mpsc::UnboundedReceiver<Message>, PlatformError> {
        self.inbound.take().ok_or(PlatformError::Closed)
    }

    async fn close(&mut self) -> Result<(), PlatformError> {
        self.close_calls += 1;
        if self.fail_close {
            return Err(PlatformError::Closed);
        }
        Ok(())
    }
}

/// Hands out mock sessions; a login yields `login_token`.
pub struct MockAuthenticator {
    pub login_token: String,
    pub reject_login: bool,
    pub valid: bool,
}

#[async_trait]
impl Authenticator for MockAuthenticator {
    type Session = MockPlatform;

    async fn authenticate_with_token(&self, token: &str) -> Result<MockPlatform, PlatformError> {
        let mut platform = MockPlatform::with_token(token);
        if !self.valid {
            platform.me = None;
        }
        Ok(platform)
    }

    async fn authenticate_with_login(
        &self,
        _email: &str,
        _password: &str,
    ) -> Result<MockPlatform, PlatformError> {
        if self.reject_login {
            return Err(rejected(400));
        }
        self.authenticate_with_token(&self.login_token).await
    }
}
