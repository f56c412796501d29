use std::path::Path;

use anyhow::{Context, Result};

use crate::client::ChatMessage;
use crate::collector::KeywordMatcher;
use crate::extract;

const DIVIDER: &str =
    "------------------------------------------------------------";

/// Render one block per accepted message: who sent it, the long numeric
/// tokens in the body, and the lines that matched a keyword.
pub fn render(messages: &[ChatMessage], matcher: &KeywordMatcher) -> String {
    let mut out = String::new();
    for message in messages {
        let name = message.sender_name.as_deref().unwrap_or("(unknown)");
        let id = message
            .sender_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "(none)".to_string());
        let handle = message
            .sender_handle
            .as_deref()
            .map(|h| format!("@{h}"))
            .unwrap_or_else(|| "(none)".to_string());

        out.push_str(&format!("Sender: {name}\n"));
        out.push_str(&format!("Id:     {id}\n"));
        out.push_str(&format!("Handle: {handle}\n"));

        let body = message.text.as_deref().unwrap_or_default();
        let numbers = extract::long_numbers(body);
        if numbers.is_empty() {
            out.push_str("Numbers: (none)\n");
        } else {
            out.push_str(&format!("Numbers: {}\n", numbers.join(", ")));
        }

        out.push_str("Matched lines:\n");
        for line in extract::matching_lines(body, matcher) {
            out.push_str(&format!("    {line}\n"));
        }

        out.push_str(DIVIDER);
        out.push('\n');
    }
    out
}

pub fn write_report(
    path: &Path,
    messages: &[ChatMessage],
    matcher: &KeywordMatcher,
) -> Result<()> {
    let content = render(messages, matcher);
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    Ok(())
}
