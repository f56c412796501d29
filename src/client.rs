use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

/// A message read from a chat, reduced to the fields the scan needs.
///
/// Media-only posts carry no `text`; anonymous channel posts carry no
/// sender. Both are valid records, not errors.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Numeric sender id, absent for anonymous posts
    pub sender_id: Option<i64>,
    /// Display name of the sender
    pub sender_name: Option<String>,
    /// Public @handle of the sender, if they have one
    pub sender_handle: Option<String>,
    /// Message body, absent for media-only messages
    pub text: Option<String>,
    /// When the message was posted (UTC)
    pub timestamp: DateTime<Utc>,
}

/// Failures at the platform client boundary.
///
/// Adapters map their library-specific errors into this type so the
/// collector can decide between skipping a chat and retrying it.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("chat <<{0}>> not found (make sure you are a member of the chat/channel)")]
    ChatNotFound(String),

    #[error("transient scan failure: {0}")]
    Transient(String),
}

/// The three capabilities the scan needs from a messaging platform.
///
/// Kept deliberately narrow so tests can substitute an in-memory fake for
/// the real Telegram connection.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Opaque resolved chat handle, consumed by `messages_since`.
    type Chat: Send + Sync;

    /// Resolve a configured chat reference (handle or numeric id) to a
    /// concrete chat.
    async fn resolve_chat(&self, reference: &str) -> Result<Self::Chat, ClientError>;

    /// Stream messages newest-first, ending at the first message older
    /// than `since`. The time bound is enforced by the adapter.
    fn messages_since(
        &self,
        chat: &Self::Chat,
        since: DateTime<Utc>,
    ) -> BoxStream<'static, Result<ChatMessage, ClientError>>;
}

#[cfg(test)]
pub mod fake {
    //! In-memory `ChatClient` used by collector and aggregator tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::Duration;
    use futures::StreamExt;

    use super::*;

    /// Fixture chat histories keyed by reference, with optional scripted
    /// transient failures on resolution or partway through a stream.
    #[derive(Default)]
    pub struct FakeClient {
        chats: HashMap<String, Vec<ChatMessage>>,
        failures_left: Mutex<HashMap<String, usize>>,
        stream_failures: Mutex<HashMap<String, StreamFailure>>,
        resolve_calls: Mutex<HashMap<String, usize>>,
    }

    struct StreamFailure {
        after: usize,
        remaining: usize,
    }

    impl FakeClient {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a chat with its history, newest message first.
        pub fn with_chat(mut self, reference: &str, history: Vec<ChatMessage>) -> Self {
            self.chats.insert(reference.to_string(), history);
            self
        }

        /// The next `count` history streams of `reference` fail transiently
        /// after yielding `after` messages.
        pub fn failing_mid_stream(self, reference: &str, after: usize, count: usize) -> Self {
            self.stream_failures.lock().unwrap().insert(
                reference.to_string(),
                StreamFailure {
                    after,
                    remaining: count,
                },
            );
            self
        }

        /// The next `count` resolutions of `reference` fail transiently.
        pub fn failing(self, reference: &str, count: usize) -> Self {
            self.failures_left
                .lock()
                .unwrap()
                .insert(reference.to_string(), count);
            self
        }

        /// How many times `reference` was resolved (or attempted).
        pub fn resolve_count(&self, reference: &str) -> usize {
            self.resolve_calls
                .lock()
                .unwrap()
                .get(reference)
                .copied()
                .unwrap_or(0)
        }
    }

    #[async_trait]
    impl ChatClient for FakeClient {
        type Chat = String;

        async fn resolve_chat(&self, reference: &str) -> Result<String, ClientError> {
            *self
                .resolve_calls
                .lock()
                .unwrap()
                .entry(reference.to_string())
                .or_insert(0) += 1;

            if let Some(left) = self.failures_left.lock().unwrap().get_mut(reference) {
                if *left > 0 {
                    *left -= 1;
                    return Err(ClientError::Transient("simulated network failure".into()));
                }
            }

            if self.chats.contains_key(reference) {
                Ok(reference.to_string())
            } else {
                Err(ClientError::ChatNotFound(reference.to_string()))
            }
        }

        fn messages_since(
            &self,
            chat: &String,
            since: DateTime<Utc>,
        ) -> BoxStream<'static, Result<ChatMessage, ClientError>> {
            let mut history: Vec<Result<ChatMessage, ClientError>> = self
                .chats
                .get(chat)
                .map(|msgs| {
                    msgs.iter()
                        .take_while(|m| m.timestamp >= since)
                        .cloned()
                        .map(Ok)
                        .collect()
                })
                .unwrap_or_default();

            if let Some(failure) = self.stream_failures.lock().unwrap().get_mut(chat) {
                if failure.remaining > 0 {
                    failure.remaining -= 1;
                    history.truncate(failure.after);
                    history.push(Err(ClientError::Transient(
                        "simulated mid-stream failure".into(),
                    )));
                }
            }

            futures::stream::iter(history).boxed()
        }
    }

    /// Message posted `minutes_ago` minutes before now.
    pub fn msg(sender_id: Option<i64>, text: Option<&str>, minutes_ago: i64) -> ChatMessage {
        ChatMessage {
            sender_id,
            sender_name: sender_id.map(|id| format!("User {id}")),
            sender_handle: sender_id.map(|id| format!("user{id}")),
            text: text.map(|t| t.to_string()),
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
        }
    }
}
