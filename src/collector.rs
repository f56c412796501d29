use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use regex::{Regex, RegexBuilder};
use tracing::{debug, info, warn};

use crate::client::{ChatClient, ChatMessage, ClientError};
use crate::config::RetryConfig;

/// Case-insensitive "any keyword present" matcher.
///
/// All keywords are escaped and folded into a single alternation compiled
/// once per keyword set, so per-message work does not grow with the number
/// of keywords.
pub struct KeywordMatcher {
    pattern: Option<Regex>,
}

impl KeywordMatcher {
    pub fn new(keywords: &[String]) -> Result<Self> {
        let keywords: Vec<&str> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            return Ok(Self { pattern: None });
        }
        let alternation = keywords
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = RegexBuilder::new(&alternation)
            .case_insensitive(true)
            .build()
            .context("Failed to compile keyword pattern")?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    /// Substring search anywhere in the text. An empty keyword set matches
    /// nothing.
    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.is_match(text))
    }
}

#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub per_user_dedup: bool,
    pub newest_first: bool,
    pub retry: RetryConfig,
}

/// Result of scanning one chat: accepted messages in output order plus the
/// senders they came from.
#[derive(Debug, Default)]
pub struct CollectOutcome {
    pub messages: Vec<ChatMessage>,
    pub accepted_senders: HashSet<i64>,
}

/// Scan one chat for keyword matches since `since`.
///
/// The whole scan (resolution + iteration) is retried on transient
/// failures, up to `retry.max_attempts` with the configured delay between
/// attempts. An unresolvable chat is not retried. Either way a failed chat
/// contributes an empty result; it never aborts the run.
pub async fn collect<C: ChatClient>(
    client: &C,
    chat_ref: &str,
    matcher: &KeywordMatcher,
    since: DateTime<Utc>,
    prior_accepted: &HashSet<i64>,
    opts: &CollectOptions,
) -> CollectOutcome {
    let max_attempts = opts.retry.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match scan_once(client, chat_ref, matcher, since, prior_accepted, opts).await {
            Ok(outcome) => {
                info!(
                    "Found {} matching messages on <<{}>>",
                    outcome.messages.len(),
                    chat_ref
                );
                return outcome;
            }
            Err(ClientError::ChatNotFound(reference)) => {
                warn!(
                    "Chat <<{}>> not found, skipping. Make sure you're a member of the chat/channel.",
                    reference
                );
                return CollectOutcome::default();
            }
            Err(e) => {
                warn!(
                    "Scan of <<{}>> failed (attempt {}/{}): {}",
                    chat_ref, attempt, max_attempts, e
                );
                if attempt < max_attempts && !opts.retry.delay().is_zero() {
                    tokio::time::sleep(opts.retry.delay()).await;
                }
            }
        }
    }

    warn!(
        "Giving up on <<{}>> after {} attempts; it contributes no messages",
        chat_ref, max_attempts
    );
    CollectOutcome::default()
}

/// One scan attempt. Accept state is local to the attempt so a mid-stream
/// failure cannot leak partial results into a retry or into the run's
/// dedup set.
async fn scan_once<C: ChatClient>(
    client: &C,
    chat_ref: &str,
    matcher: &KeywordMatcher,
    since: DateTime<Utc>,
    prior_accepted: &HashSet<i64>,
    opts: &CollectOptions,
) -> Result<CollectOutcome, ClientError> {
    let chat = client.resolve_chat(chat_ref).await?;

    let mut messages = Vec::new();
    let mut accepted_senders = HashSet::new();
    let mut seen = 0usize;

    let mut stream = client.messages_since(&chat, since);
    while let Some(item) = stream.next().await {
        let message = item?;
        seen += 1;

        // Media-only messages have no text and can never match
        let Some(text) = message.text.as_deref() else {
            continue;
        };

        if opts.per_user_dedup {
            match message.sender_id {
                None => continue,
                Some(id) if prior_accepted.contains(&id) || accepted_senders.contains(&id) => {
                    continue
                }
                Some(_) => {}
            }
        }

        if matcher.is_match(text) {
            if let Some(id) = message.sender_id {
                accepted_senders.insert(id);
            }
            messages.push(message);
        }
    }
    debug!("Scanned {} messages on <<{}>>", seen, chat_ref);

    // Iteration is newest-first; flip for chronological output
    if !opts.newest_first {
        messages.reverse();
    }

    Ok(CollectOutcome {
        messages,
        accepted_senders,
    })
}
