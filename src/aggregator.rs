use std::collections::HashSet;

use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::info;

use crate::client::{ChatClient, ChatMessage};
use crate::collector::{collect, CollectOptions, KeywordMatcher};
use crate::config::{RetryConfig, ScanConfig};

/// Drives per-chat collection across the configured chat list, in order.
///
/// Chats are scanned strictly sequentially: with cross-chat dedup on, the
/// accepted-sender set from earlier chats is threaded into later ones, so
/// list order defines precedence.
pub struct Scanner<C> {
    client: C,
    scan: ScanConfig,
    retry: RetryConfig,
}

impl<C: ChatClient> Scanner<C> {
    pub fn new(client: C, scan: ScanConfig, retry: RetryConfig) -> Self {
        Self {
            client,
            scan,
            retry,
        }
    }

    /// Hand the client back, e.g. for a clean disconnect after the run.
    pub fn into_client(self) -> C {
        self.client
    }

    /// Scan every chat and return all accepted messages. One chat failing
    /// (or all of them) is not an error; the result may be empty.
    pub async fn run(&self, chat_refs: &[String], keywords: &[String]) -> Result<Vec<ChatMessage>> {
        let matcher = KeywordMatcher::new(keywords)?;
        let opts = CollectOptions {
            per_user_dedup: self.scan.per_user_dedup,
            newest_first: self.scan.newest_first,
            retry: self.retry.clone(),
        };

        // The window is fixed at scan start, not re-evaluated per chat
        let since = Utc::now() - Duration::hours(self.scan.lookback_hours);
        info!(
            "Retrieving messages since {} ({} hour lookback)",
            since.format("%Y-%m-%d %H:%M:%S UTC"),
            self.scan.lookback_hours
        );

        let mut all_messages = Vec::new();
        let mut accepted_senders: HashSet<i64> = HashSet::new();
        let no_prior = HashSet::new();

        for chat_ref in chat_refs {
            let prior = if self.scan.cross_chat_dedup {
                &accepted_senders
            } else {
                &no_prior
            };

            let outcome = collect(&self.client, chat_ref, &matcher, since, prior, &opts).await;

            if self.scan.cross_chat_dedup {
                accepted_senders.extend(outcome.accepted_senders);
            }
            all_messages.extend(outcome.messages);
        }

        if all_messages.is_empty() {
            info!(
                "No matching messages found in the last {} hours",
                self.scan.lookback_hours
            );
        } else {
            info!("Collected {} messages in total", all_messages.len());
        }

        Ok(all_messages)
    }
}
