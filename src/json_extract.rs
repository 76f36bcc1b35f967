//! Pulls a JSON value out of a model's free-form markdown reply.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

fn tagged_block() -> &'static Regex {
    static TAGGED: OnceLock<Regex> = OnceLock::new();
    TAGGED.get_or_init(|| {
        Regex::new(r"(?is)```json\s*(.*?)\s*```").expect("tagged block pattern is valid")
    })
}

fn plain_block() -> &'static Regex {
    static PLAIN: OnceLock<Regex> = OnceLock::new();
    PLAIN.get_or_init(|| Regex::new(r"(?s)```\s*(.*?)\s*```").expect("plain block pattern is valid"))
}

fn brace_span() -> &'static Regex {
    static BRACES: OnceLock<Regex> = OnceLock::new();
    BRACES.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("brace span pattern is valid"))
}

/// Parses the first ```` ```json ```` block, else the first untagged fence,
/// else the widest `{...}` span.
///
/// Returns `None` when nothing parses. A fenced block that is present but
/// malformed is not retried against the brace fallback.
pub fn extract_json(text: &str) -> Option<Value> {
    let fenced = tagged_block()
        .captures(text)
        .or_else(|| plain_block().captures(text));
    let candidate = match fenced {
        Some(captures) => captures.get(1)?.as_str().trim(),
        None => brace_span().find(text)?.as_str(),
    };

    match serde_json::from_str(candidate) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "model reply did not contain parseable JSON");
            None
        }
    }
}
