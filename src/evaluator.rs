//! Page-level capabilities layered over a protocol [`Connection`]

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::errors::{AutomationError, Result};
use crate::protocol::Connection;

/// Rectangle in page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Key event phases accepted by `Input.dispatchKeyEvent`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyEventType {
    KeyDown,
    Char,
    KeyUp,
}

/// Evaluates scripts and issues input / capture commands on one target
pub struct RemoteEvaluator<'a> {
    conn: &'a Connection,
}

impl<'a> RemoteEvaluator<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Run `script` in the page and return its value.
    ///
    /// A script that throws (or whose promise rejects) yields
    /// [`AutomationError::Evaluation`], never a value.
    pub async fn evaluate(&self, script: &str, await_promise: bool) -> Result<Value> {
        let result = self
            .conn
            .send(
                "Runtime.evaluate",
                json!({
                    "expression": script,
                    "returnByValue": true,
                    "awaitPromise": await_promise,
                }),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let description = details
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(Value::as_str)
                .or_else(|| details.get("text").and_then(Value::as_str))
                .unwrap_or("unknown exception")
                .to_string();
            debug!(url = self.conn.url(), "script threw: {}", description);
            return Err(AutomationError::Evaluation { description });
        }

        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Dispatch a single key event through the input domain, bypassing page
    /// script handlers
    pub async fn dispatch_key_event(
        &self,
        event_type: KeyEventType,
        key: &str,
        code: &str,
        key_code: u32,
        text: Option<&str>,
    ) -> Result<()> {
        let mut params = json!({
            "type": event_type,
            "key": key,
            "code": code,
            "windowsVirtualKeyCode": key_code,
            "nativeVirtualKeyCode": key_code,
        });
        if let Some(text) = text {
            params["text"] = json!(text);
            params["unmodifiedText"] = json!(text);
        }
        self.conn.send("Input.dispatchKeyEvent", params).await?;
        Ok(())
    }

    /// Press and release Enter at the protocol level
    pub async fn press_enter(&self) -> Result<()> {
        self.dispatch_key_event(KeyEventType::KeyDown, "Enter", "Enter", 13, None)
            .await?;
        self.dispatch_key_event(KeyEventType::Char, "Enter", "Enter", 13, Some("\r"))
            .await?;
        self.dispatch_key_event(KeyEventType::KeyUp, "Enter", "Enter", 13, None)
            .await
    }

    /// Capture `region` as JPEG and return the decoded bytes
    pub async fn capture_screenshot(&self, region: ScreenshotRegion, quality: u8) -> Result<Vec<u8>> {
        let result = self
            .conn
            .send(
                "Page.captureScreenshot",
                json!({
                    "format": "jpeg",
                    "quality": quality,
                    "clip": {
                        "x": region.x,
                        "y": region.y,
                        "width": region.width,
                        "height": region.height,
                        "scale": 1,
                    },
                }),
            )
            .await?;

        let data = result.get("data").and_then(Value::as_str).ok_or_else(|| {
            AutomationError::InvalidResponse(
                "Page.captureScreenshot returned no 'data' field".to_string(),
            )
        })?;

        B64.decode(data).map_err(|e| {
            AutomationError::InvalidResponse(format!("screenshot is not valid base64: {}", e))
        })
    }
}
