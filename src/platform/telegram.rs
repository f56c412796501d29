use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use grammers_client::session::Session;
use grammers_client::types::{Chat, Message};
use grammers_client::{Client, Config, InitParams};
use tracing::info;

use crate::client::{ChatClient, ChatMessage, ClientError};
use crate::config::TelegramConfig;

/// Telegram adapter over grammers, backed by a stored user session.
pub struct TelegramClient {
    client: Client,
    session_file: PathBuf,
}

impl TelegramClient {
    /// Connect with the stored session. Interactive sign-in is out of
    /// scope: an unauthorized session is a fatal configuration problem.
    pub async fn connect(config: &TelegramConfig) -> Result<Self> {
        let session = Session::load_file_or_create(&config.session_file).with_context(|| {
            format!(
                "Failed to load session file: {}",
                config.session_file.display()
            )
        })?;

        let client = Client::connect(Config {
            session,
            api_id: config.api_id,
            api_hash: config.api_hash.clone(),
            params: InitParams::default(),
        })
        .await
        .context("Failed to connect to Telegram")?;

        if !client
            .is_authorized()
            .await
            .context("Failed to check session authorization")?
        {
            anyhow::bail!(
                "Session {} is not authorized; sign the account in once to create it",
                config.session_file.display()
            );
        }

        info!("Connected to Telegram");
        Ok(Self {
            client,
            session_file: config.session_file.clone(),
        })
    }

    /// Persist the session and drop the connection.
    pub fn disconnect(self) -> Result<()> {
        self.client
            .session()
            .save_to_file(&self.session_file)
            .with_context(|| {
                format!("Failed to save session to {}", self.session_file.display())
            })?;
        Ok(())
    }

    /// Numeric references are looked up in the account's dialog list (an
    /// id alone is not resolvable over MTProto without its access hash).
    async fn find_dialog(&self, id: i64, reference: &str) -> Result<Chat, ClientError> {
        let bare = bare_chat_id(id);
        let mut dialogs = self.client.iter_dialogs();
        loop {
            match dialogs.next().await {
                Ok(Some(dialog)) => {
                    let chat = dialog.chat();
                    if chat.id() == id || chat.id() == bare {
                        return Ok(chat.clone());
                    }
                }
                Ok(None) => return Err(ClientError::ChatNotFound(reference.to_string())),
                Err(e) => return Err(ClientError::Transient(e.to_string())),
            }
        }
    }
}

#[async_trait]
impl ChatClient for TelegramClient {
    type Chat = Chat;

    async fn resolve_chat(&self, reference: &str) -> Result<Chat, ClientError> {
        if let Ok(id) = reference.parse::<i64>() {
            return self.find_dialog(id, reference).await;
        }

        let username = reference.trim_start_matches('@');
        match self.client.resolve_username(username).await {
            Ok(Some(chat)) => Ok(chat),
            Ok(None) => Err(ClientError::ChatNotFound(reference.to_string())),
            Err(e) => {
                let detail = e.to_string();
                if detail.contains("USERNAME_NOT_OCCUPIED") || detail.contains("USERNAME_INVALID")
                {
                    Err(ClientError::ChatNotFound(reference.to_string()))
                } else {
                    Err(ClientError::Transient(detail))
                }
            }
        }
    }

    fn messages_since(
        &self,
        chat: &Chat,
        since: DateTime<Utc>,
    ) -> BoxStream<'static, Result<ChatMessage, ClientError>> {
        // History arrives newest-first; stop at the first message that
        // falls out of the window
        let iter = self.client.iter_messages(chat.pack());
        futures::stream::unfold(iter, move |mut iter| async move {
            match iter.next().await {
                Ok(Some(message)) if message.date() >= since => {
                    Some((Ok(convert(&message)), iter))
                }
                Ok(_) => None,
                Err(e) => Some((Err(ClientError::Transient(e.to_string())), iter)),
            }
        })
        .boxed()
    }
}

fn convert(message: &Message) -> ChatMessage {
    let sender = message.sender();
    let text = message.text();
    ChatMessage {
        sender_id: sender.as_ref().map(|s| s.id()),
        sender_name: sender
            .as_ref()
            .map(|s| s.name().to_string())
            .filter(|n| !n.is_empty()),
        sender_handle: sender
            .as_ref()
            .and_then(|s| s.username().map(str::to_string)),
        text: if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        },
        timestamp: message.date(),
    }
}

/// Configured lists sometimes carry Bot-API style ids (`-100` prefix for
/// channels, bare negation for small groups); grammers dialogs use the
/// bare positive id.
fn bare_chat_id(id: i64) -> i64 {
    if id >= 0 {
        return id;
    }
    let digits = id.unsigned_abs().to_string();
    if let Some(stripped) = digits.strip_prefix("100") {
        if let Ok(bare) = stripped.parse() {
            return bare;
        }
    }
    id.unsigned_abs() as i64
}
