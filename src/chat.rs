//! Transcript engine for one direct-message channel.
//!
//! [`ChatSession`] owns every piece of mutable chat state: the transcript,
//! the acknowledgement cursor and the lifecycle state. Inbound messages and
//! submitted input reach it as [`ChatEvent`]s from a single update loop, so
//! mutations are applied strictly one after another.

use tracing::{debug, info};

use crate::error::ChordError;
use crate::platform::{AckToken, Channel, Message, Platform};
use crate::transcript::Transcript;

/// Largest history page the platform serves in one request.
pub const HISTORY_LIMIT: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    Loading,
    Live,
    Closed,
}

#[derive(Debug)]
pub enum ChatEvent {
    Inbound(Message),
    Submit(String),
}

/// What applying an event did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Appended { seq: u64 },
    Sent,
    Ignored,
}

pub struct ChatSession<'a, P: Platform> {
    platform: &'a P,
    channel: Option<Channel>,
    transcript: Transcript,
    cursor: Option<AckToken>,
    state: ChatState,
}

impl<'a, P: Platform> ChatSession<'a, P> {
    pub fn new(platform: &'a P) -> Self {
        Self {
            platform,
            channel: None,
            transcript: Transcript::default(),
            cursor: None,
            state: ChatState::Idle,
        }
    }

    /// Loads the most recent history of `channel` and goes live.
    pub async fn select(&mut self, channel: Channel) -> Result<(), ChordError> {
        if self.state != ChatState::Idle {
            return Err(ChordError::Selection("a channel is already open".to_string()));
        }
        self.state = ChatState::Loading;
        debug!(channel = %channel.id, "loading history");

        let history = match self.platform.fetch_history(&channel.id, HISTORY_LIMIT).await {
            Ok(history) => history,
            Err(error) => {
                self.state = ChatState::Closed;
                return Err(ChordError::Fetch(error));
            }
        };

        self.transcript = Transcript::from_history(history);
        self.channel = Some(channel);
        self.state = ChatState::Live;
        info!(posts = self.transcript.len(), "channel live");
        Ok(())
    }

    pub async fn apply(&mut self, event: ChatEvent) -> Result<Applied, ChordError> {
        if self.state != ChatState::Live {
            return Ok(Applied::Ignored);
        }
        match event {
            ChatEvent::Inbound(message) => self.receive(message).await,
            ChatEvent::Submit(text) => self.submit(&text).await,
        }
    }

    async fn receive(&mut self, message: Message) -> Result<Applied, ChordError> {
        let Some(channel) = self.channel.as_ref() else {
            return Ok(Applied::Ignored);
        };
        if message.channel_id != channel.id {
            return Ok(Applied::Ignored);
        }

        let Some(post) = self.transcript.push(&message) else {
            debug!(message_id = %message.id, "duplicate message dropped");
            return Ok(Applied::Ignored);
        };
        let seq = post.seq;

        let cursor = self
            .platform
            .acknowledge(&channel.id, &message.id, self.cursor.as_ref())
            .await
            .map_err(ChordError::platform("failed to acknowledge message"))?;
        self.cursor = cursor;
        Ok(Applied::Appended { seq })
    }

    async fn submit(&mut self, text: &str) -> Result<Applied, ChordError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Applied::Ignored);
        }
        let Some(channel) = self.channel.as_ref() else {
            return Ok(Applied::Ignored);
        };

        // The post shows up once the gateway echoes it back.
        if let Err(error) = self.platform.send_message(&channel.id, text).await {
            self.state = ChatState::Closed;
            return Err(ChordError::Send(error));
        }
        Ok(Applied::Sent)
    }

    /// Stops accepting events. The owner of the platform handle closes it.
    pub fn close(&mut self) {
        self.state = ChatState::Closed;
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn cursor(&self) -> Option<&AckToken> {
        self.cursor.as_ref()
    }
}
