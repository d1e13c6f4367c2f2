//! Map provider answers back to the canonical response.
//!
//! OpenAI bodies already have the canonical shape and never pass through
//! here; only Anthropic answers are rebuilt.

use super::anthropic_types::{MessagesResponse, ResponseContentBlock};
use super::relay_types::ChatResponse;
use crate::error::{RelayError, Result};

/// Wrap the first content block's text into a single-choice response.
///
/// An empty `content` array or a non-text first block has no canonical
/// rendering and is reported as an error.
pub fn anthropic_to_relay(resp: &MessagesResponse) -> Result<ChatResponse> {
    match resp.content.first() {
        Some(ResponseContentBlock::Text { text }) => Ok(ChatResponse::from_text(text.clone())),
        Some(ResponseContentBlock::Other) => Err(RelayError::translation(
            "Provider response's first content block is not text",
        )),
        None => Err(RelayError::translation(
            "Provider response contained no content blocks",
        )),
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
