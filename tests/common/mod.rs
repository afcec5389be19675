// Mock DevTools endpoint for integration tests
//
// Serves `/json` with a scripted target list and answers protocol commands on
// `/devtools/page/:id` through a per-target responder.

#![allow(dead_code)]

pub mod browser;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use chatprobe::Config;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// What a mock target does with one command
pub enum Reply {
    Result(Value),
    Error(String),
    /// Never answer, so the client times out
    Silent,
}

pub type Responder = Arc<dyn Fn(&str, &Value) -> Reply + Send + Sync>;

/// Which page script a `Runtime.evaluate` call carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Inject,
    State,
    Region,
    Other,
}

pub fn script_of(params: &Value) -> Script {
    let expression = params["expression"].as_str().unwrap_or_default();
    if expression.contains("settleMs") {
        Script::Inject
    } else if expression.contains("maxAncestors") {
        Script::Region
    } else if expression.contains("scopes") {
        Script::State
    } else {
        Script::Other
    }
}

/// `Runtime.evaluate` result carrying a by-value return
pub fn evaluated(value: Value) -> Reply {
    Reply::Result(json!({ "result": { "type": "object", "value": value } }))
}

/// `Runtime.evaluate` result for a script that threw
pub fn threw(description: &str) -> Reply {
    Reply::Result(json!({
        "result": { "type": "object", "subtype": "error" },
        "exceptionDetails": {
            "text": "Uncaught",
            "exception": { "description": description }
        }
    }))
}

pub struct MockTarget {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub url: String,
    /// `None` publishes the target without a debugger endpoint
    pub responder: Option<Responder>,
}

impl MockTarget {
    pub fn page(id: &str, title: &str, responder: Responder) -> Self {
        Self {
            id: id.to_string(),
            kind: "page".to_string(),
            title: title.to_string(),
            url: format!("vscode-file://vscode-app/{}.html", id),
            responder: Some(responder),
        }
    }

    pub fn of_kind(mut self, kind: &str) -> Self {
        self.kind = kind.to_string();
        self
    }

    pub fn at_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }
}

/// One protocol command as received by the mock
#[derive(Debug, Clone)]
pub struct Call {
    pub target: String,
    pub method: String,
    pub script: Option<Script>,
}

struct MockState {
    port: u16,
    targets: Vec<MockTarget>,
    calls: Mutex<Vec<Call>>,
}

pub struct MockDevTools {
    pub port: u16,
    state: Arc<MockState>,
}

impl MockDevTools {
    pub async fn start(targets: Vec<MockTarget>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock DevTools endpoint");
        let port = listener.local_addr().unwrap().port();

        let state = Arc::new(MockState {
            port,
            targets,
            calls: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/json", get(list_targets))
            .route("/devtools/page/:id", get(upgrade))
            .with_state(Arc::clone(&state));

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Mock server failed");
        });

        Self { port, state }
    }

    /// Config pointing at this mock with test-friendly timings
    pub fn config(&self) -> Config {
        Config {
            port: self.port,
            command_timeout_ms: 500,
            poll_interval_ms: 10,
            settle_delay_ms: 0,
            ..Config::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.calls.lock().unwrap().clone()
    }

    /// Target ids in the order they first received a command
    pub fn visited(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for call in self.calls() {
            if !seen.contains(&call.target) {
                seen.push(call.target);
            }
        }
        seen
    }
}

async fn list_targets(State(state): State<Arc<MockState>>) -> impl IntoResponse {
    let listing: Vec<Value> = state
        .targets
        .iter()
        .map(|t| {
            let mut entry = json!({
                "id": t.id,
                "type": t.kind,
                "title": t.title,
                "url": t.url,
            });
            if t.responder.is_some() {
                entry["webSocketDebuggerUrl"] =
                    json!(format!("ws://127.0.0.1:{}/devtools/page/{}", state.port, t.id));
            }
            entry
        })
        .collect();
    Json(listing)
}

async fn upgrade(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(state): State<Arc<MockState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, id, state))
}

async fn serve_socket(mut socket: WebSocket, id: String, state: Arc<MockState>) {
    let Some(responder) = state
        .targets
        .iter()
        .find(|t| t.id == id)
        .and_then(|t| t.responder.clone())
    else {
        return;
    };

    while let Some(Ok(msg)) = socket.recv().await {
        let Message::Text(text) = msg else { continue };
        let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) else {
            continue;
        };
        let method = frame["method"].as_str().unwrap_or_default().to_string();
        let params = frame.get("params").cloned().unwrap_or(Value::Null);

        state.calls.lock().unwrap().push(Call {
            target: id.clone(),
            method: method.clone(),
            script: (method == "Runtime.evaluate").then(|| script_of(&params)),
        });

        let out = match (*responder)(&method, &params) {
            Reply::Result(result) => json!({ "id": frame["id"], "result": result }),
            Reply::Error(message) => {
                json!({ "id": frame["id"], "error": { "code": -32000, "message": message } })
            }
            Reply::Silent => continue,
        };
        if socket.send(Message::Text(out.to_string())).await.is_err() {
            break;
        }
    }
}

/// A chat page: accepts injection, reports `states` in order (the last one
/// repeats), exposes `region` and returns `jpeg` from screenshots
pub struct ChatPage {
    pub injection: Value,
    pub states: Vec<Value>,
    pub region: Value,
    pub jpeg: Vec<u8>,
}

impl Default for ChatPage {
    fn default() -> Self {
        Self {
            injection: json!({
                "found": true,
                "strategy": "chat-textarea:.chat-widget textarea",
                "insertion": "native",
                "submission": "button"
            }),
            states: vec![idle_state()],
            region: json!({
                "found": true,
                "selector": ".chat-widget",
                "chain": [{ "x": 900, "y": 0, "width": 380, "height": 760 }],
                "body": { "x": 0, "y": 0, "width": 1280, "height": 800 }
            }),
            jpeg: vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xFF, 0xD9],
        }
    }
}

impl ChatPage {
    pub fn responder(self) -> Responder {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.jpeg);
        let states = Mutex::new(VecDeque::from(self.states));

        Arc::new(move |method: &str, params: &Value| match method {
            "Runtime.evaluate" => match script_of(params) {
                Script::Inject => evaluated(self.injection.clone()),
                Script::Region => evaluated(self.region.clone()),
                Script::State => {
                    let mut states = states.lock().unwrap();
                    let next = if states.len() > 1 {
                        states.pop_front()
                    } else {
                        states.front().cloned()
                    };
                    evaluated(next.unwrap_or_else(no_chat_state))
                }
                Script::Other => evaluated(Value::Null),
            },
            "Input.dispatchKeyEvent" => Reply::Result(json!({})),
            "Page.captureScreenshot" => Reply::Result(json!({ "data": encoded })),
            other => Reply::Error(format!("'{}' wasn't found", other)),
        })
    }
}

/// A page without any chat UI
pub fn blank_page() -> Responder {
    Arc::new(|method: &str, params: &Value| match method {
        "Runtime.evaluate" => match script_of(params) {
            Script::Inject => evaluated(json!({
                "found": false,
                "error": "no chat input matched",
                "inputs": ["input.search-box[Search]"]
            })),
            Script::State => evaluated(no_chat_state()),
            Script::Region => evaluated(json!({
                "found": false,
                "chain": [],
                "body": { "x": 0, "y": 0, "width": 1280, "height": 800 }
            })),
            Script::Other => evaluated(Value::Null),
        },
        _ => Reply::Result(json!({})),
    })
}

pub fn idle_state() -> Value {
    json!({ "hasChat": true, "hasStop": false, "hasSend": true, "inputDisabled": false })
}

pub fn generating_state() -> Value {
    json!({ "hasChat": true, "hasStop": true, "hasSend": false, "inputDisabled": true })
}

pub fn no_chat_state() -> Value {
    json!({ "hasChat": false, "hasStop": false, "hasSend": false, "inputDisabled": false })
}

/// A port nothing listens on
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
