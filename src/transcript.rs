use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Local};
use regex::{Captures, Regex};

use crate::platform::{Message, User};

/// Matches `<@123>` and the legacy nickname form `<@!123>`.
static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?(\d+)>").expect("valid mention regex"));

const UNKNOWN_TIME: &str = "--:--";

/// One displayable chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub seq: u64,
    pub message_id: String,
    pub author: String,
    pub body: String,
    pub time: String,
}

impl Post {
    pub fn from_message(seq: u64, message: &Message) -> Self {
        Self {
            seq,
            message_id: message.id.clone(),
            author: message.author.display_name(),
            body: replace_mentions(&message.content, &message.mentions),
            time: format_time_of_day(&message.timestamp),
        }
    }
}

pub fn replace_mentions(content: &str, mentions: &[User]) -> String {
    MENTION_RE
        .replace_all(content, |caps: &Captures| {
            match mentions.iter().find(|user| user.id == caps[1]) {
                Some(user) => format!("@{}", user.display_name()),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// `HH:MM` in local time, or `--:--` when the timestamp does not parse.
pub fn format_time_of_day(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|time| time.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|_| UNKNOWN_TIME.to_string())
}

/// Ordered, de-duplicated posts of the active channel.
#[derive(Debug, Default)]
pub struct Transcript {
    posts: Vec<Post>,
    seen: HashSet<String>,
    last_seq: u64,
}

impl Transcript {
    /// Builds the transcript from a history page delivered newest first; the
    /// oldest message gets sequence number 1.
    pub fn from_history(messages: Vec<Message>) -> Self {
        let mut transcript = Self::default();
        for message in messages.iter().rev() {
            transcript.push(message);
        }
        transcript
    }

    /// Appends a message after every existing post. Returns `None` when the
    /// message is already part of the transcript.
    pub fn push(&mut self, message: &Message) -> Option<&Post> {
        if !self.seen.insert(message.id.clone()) {
            return None;
        }
        self.last_seq += 1;
        self.posts.push(Post::from_message(self.last_seq, message));
        self.posts.last()
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }
}
