//! Page scripts evaluated inside the IDE's web UI.
//!
//! Each script file holds a single function expression. The Rust side only
//! ever passes data to it as one JSON-encoded argument, so user text never
//! gets spliced into script source.

use serde_json::{Value, json};

/// Bumped whenever a script's argument or return shape changes
pub const SCRIPT_VERSION: u32 = 3;

/// Containers that host the agent chat, most specific first
pub const CHAT_SCOPES: &[&str] = &[
    ".jetski-chat-input",
    ".jetski-input",
    ".agent-chat-input",
    ".aichat-input",
    "#chat",
    ".interactive-input-part",
    ".interactive-input-editor",
    ".chat-input-editor",
    ".chat-widget",
    ".interactive-session",
    "[class*=\"chat-input\"]",
    "[id*=\"chat\"]",
    "[class*=\"chat\"]",
];

/// Containers whose bounding box makes a useful screenshot, most specific first
pub const CHAT_REGION_SCOPES: &[&str] = &[
    ".jetski-chat",
    ".agent-panel",
    ".interactive-session",
    ".chat-widget",
    "[class*=\"agent-chat\"]",
    "[class*=\"chat-view\"]",
    "#chat",
    "[id*=\"chat\"]",
    "[class*=\"chat\"]",
];

/// Ancestors reported above a matched region element
pub const MAX_REGION_ANCESTORS: usize = 8;

const INJECT_CHAT: &str = include_str!("inject_chat.js");
const PROBE_STATE: &str = include_str!("probe_state.js");
const PROBE_REGION: &str = include_str!("probe_region.js");

fn invoke(body: &str, args: Value) -> String {
    format!("({})({})", body.trim(), args)
}

/// Locate the chat input, insert `text` and submit it.
///
/// Resolves to `{found, strategy, insertion, submission}` or
/// `{found: false, error, inputs}`.
pub fn inject_chat(text: &str, settle_ms: u64) -> String {
    invoke(
        INJECT_CHAT,
        json!({ "text": text, "settleMs": settle_ms, "scopes": CHAT_SCOPES }),
    )
}

/// Report `{hasChat, hasStop, hasSend, inputDisabled}` for the chat UI
pub fn probe_state() -> String {
    invoke(PROBE_STATE, json!({ "scopes": CHAT_SCOPES }))
}

/// Report the first visible chat container with its ancestor boxes:
/// `{found, selector, chain, body}`
pub fn probe_region() -> String {
    invoke(
        PROBE_REGION,
        json!({ "scopes": CHAT_REGION_SCOPES, "maxAncestors": MAX_REGION_ANCESTORS }),
    )
}
