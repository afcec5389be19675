//! DevTools target directory (`GET /json`)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::{AutomationError, Result};

/// Kind of debuggable surface reported by the directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Page,
    Iframe,
    Webview,
    Other,
}

impl TargetKind {
    fn from_type(raw: &str) -> Self {
        match raw {
            "page" => TargetKind::Page,
            "iframe" => TargetKind::Iframe,
            "webview" => TargetKind::Webview,
            _ => TargetKind::Other,
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetKind::Page => "page",
            TargetKind::Iframe => "iframe",
            TargetKind::Webview => "webview",
            TargetKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Raw entry as returned by the directory endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTarget {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub target_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    pub web_socket_debugger_url: Option<String>,
}

/// Snapshot of one debuggable surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugTarget {
    pub id: String,
    pub kind: TargetKind,
    pub title: String,
    pub url: String,
    pub debugger_endpoint: Option<String>,
}

impl DebugTarget {
    /// Whether this target can host the chat UI at all
    pub fn is_candidate(&self) -> bool {
        matches!(
            self.kind,
            TargetKind::Page | TargetKind::Iframe | TargetKind::Webview
        ) && self
            .debugger_endpoint
            .as_deref()
            .is_some_and(|ep| !ep.trim().is_empty())
            && !is_devtools_url(&self.url)
    }

    /// `[kind] title` prefix used in diagnostic lines
    pub fn label(&self) -> String {
        let title = if self.title.is_empty() {
            self.url.as_str()
        } else {
            self.title.as_str()
        };
        format!("[{}] {}", self.kind, title)
    }
}

impl From<RawTarget> for DebugTarget {
    fn from(raw: RawTarget) -> Self {
        Self {
            kind: TargetKind::from_type(&raw.target_type),
            id: raw.id,
            title: raw.title,
            url: raw.url,
            debugger_endpoint: raw.web_socket_debugger_url,
        }
    }
}

fn is_devtools_url(url: &str) -> bool {
    url.starts_with("devtools://") || url.starts_with("chrome-devtools://")
}

/// Keep the targets that can host the chat, in directory order
pub fn filter_candidates(raw: Vec<RawTarget>) -> Vec<DebugTarget> {
    raw.into_iter()
        .map(DebugTarget::from)
        .filter(DebugTarget::is_candidate)
        .collect()
}

/// Every target in the directory, unfiltered
pub async fn list_all(port: u16) -> Result<Vec<DebugTarget>> {
    Ok(fetch_directory(port)
        .await?
        .into_iter()
        .map(DebugTarget::from)
        .collect())
}

/// Candidate surfaces on `127.0.0.1:<port>`, in directory order
pub async fn list_candidates(port: u16) -> Result<Vec<DebugTarget>> {
    let raw = fetch_directory(port).await?;
    let total = raw.len();
    let candidates = filter_candidates(raw);
    info!(
        port,
        total,
        candidates = candidates.len(),
        "Listed DevTools targets"
    );
    Ok(candidates)
}

async fn fetch_directory(port: u16) -> Result<Vec<RawTarget>> {
    let url = format!("http://127.0.0.1:{}/json", port);
    debug!("Fetching target directory from {}", url);

    let unavailable = |reason: String| AutomationError::DirectoryUnavailable { port, reason };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| unavailable(e.to_string()))?;

    let body = client
        .get(&url)
        .send()
        .await
        .map_err(|e| unavailable(e.to_string()))?
        .text()
        .await
        .map_err(|e| unavailable(e.to_string()))?;

    serde_json::from_str(&body).map_err(|e| unavailable(format!("malformed target list: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Vec<RawTarget> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_devtools_pages_are_excluded() {
        let raw = parse(json!([
            {"id": "a", "type": "page", "title": "DevTools", "url": "devtools://x",
             "webSocketDebuggerUrl": "ws://a"},
            {"id": "b", "type": "page", "title": "IDE", "url": "http://y",
             "webSocketDebuggerUrl": "ws://y"}
        ]));

        let candidates = filter_candidates(raw);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "b");
        assert_eq!(candidates[0].debugger_endpoint.as_deref(), Some("ws://y"));
    }

    #[test]
    fn test_kind_and_endpoint_filter() {
        let raw = parse(json!([
            {"id": "sw", "type": "service_worker", "title": "sw", "url": "http://sw",
             "webSocketDebuggerUrl": "ws://sw"},
            {"id": "noep", "type": "page", "title": "busy", "url": "http://busy"},
            {"id": "empty", "type": "iframe", "title": "blank", "url": "http://e",
             "webSocketDebuggerUrl": ""},
            {"id": "frame", "type": "iframe", "title": "chat", "url": "vscode-webview://f",
             "webSocketDebuggerUrl": "ws://f"},
            {"id": "wv", "type": "webview", "title": "panel", "url": "vscode-webview://w",
             "webSocketDebuggerUrl": "ws://w"}
        ]));

        let ids: Vec<String> = filter_candidates(raw).into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["frame".to_string(), "wv".to_string()]);
    }

    #[test]
    fn test_directory_order_preserved() {
        let raw = parse(json!([
            {"id": "3", "type": "page", "title": "c", "url": "http://c", "webSocketDebuggerUrl": "ws://c"},
            {"id": "1", "type": "page", "title": "a", "url": "http://a", "webSocketDebuggerUrl": "ws://a"},
            {"id": "2", "type": "page", "title": "b", "url": "http://b", "webSocketDebuggerUrl": "ws://b"}
        ]));
        let ids: Vec<String> = filter_candidates(raw).into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
    }

    #[test]
    fn test_label_falls_back_to_url() {
        let target = DebugTarget {
            id: "x".into(),
            kind: TargetKind::Webview,
            title: String::new(),
            url: "vscode-webview://chat".into(),
            debugger_endpoint: None,
        };
        assert_eq!(target.label(), "[webview] vscode-webview://chat");
    }

    #[tokio::test]
    async fn test_unreachable_port_is_directory_unavailable() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = list_candidates(port).await.unwrap_err();
        match err {
            AutomationError::DirectoryUnavailable { port: p, .. } => assert_eq!(p, port),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
