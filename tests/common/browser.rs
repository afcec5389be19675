// Headless Chrome with a remote debugging port, for running the page scripts
// against a real DOM
//
// The binary comes from TEST_BROWSER_BIN, else the first Chrome or Chromium
// found on PATH. Without one, `launch` returns `None` and the caller skips.

use chatprobe::Config;
use chatprobe::evaluator::RemoteEvaluator;
use chatprobe::protocol::Connection;
use chatprobe::targets;
use serde_json::Value;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

const BROWSER_BINARIES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

fn find_binary() -> Option<String> {
    if let Ok(bin) = std::env::var("TEST_BROWSER_BIN") {
        if !bin.is_empty() {
            return Some(bin);
        }
    }
    BROWSER_BINARIES
        .iter()
        .find(|bin| {
            Command::new(bin)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .is_ok_and(|s| s.success())
        })
        .map(|bin| bin.to_string())
}

pub struct HeadlessChrome {
    child: Child,
    _profile: tempfile::TempDir,
    pub port: u16,
}

impl HeadlessChrome {
    /// Start the browser on a blank page, or `None` if none is installed
    pub async fn launch() -> Option<Self> {
        let Some(binary) = find_binary() else {
            eprintln!("Skipping: no Chrome or Chromium found (set TEST_BROWSER_BIN)");
            return None;
        };

        let profile = tempfile::tempdir().expect("Failed to create browser profile dir");
        let port = super::unused_port();
        let child = Command::new(&binary)
            .args([
                "--headless=new",
                "--disable-gpu",
                "--no-sandbox",
                "--no-first-run",
                "--no-default-browser-check",
                "--window-size=1280,800",
            ])
            .arg(format!("--remote-debugging-port={}", port))
            .arg(format!("--user-data-dir={}", profile.path().display()))
            .arg("about:blank")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to launch browser");

        let chrome = Self {
            child,
            _profile: profile,
            port,
        };
        for _ in 0..100 {
            if let Ok(pages) = targets::list_candidates(port).await {
                if !pages.is_empty() {
                    return Some(chrome);
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("{} never exposed a page on port {}", binary, port);
    }

    pub fn config(&self) -> Config {
        Config {
            port: self.port,
            command_timeout_ms: 5000,
            poll_interval_ms: 50,
            settle_delay_ms: 50,
            ..Config::default()
        }
    }

    /// Connection to the blank page
    pub async fn connect(&self) -> Connection {
        let page = targets::list_candidates(self.port)
            .await
            .unwrap()
            .into_iter()
            .next()
            .expect("browser has no page");
        Connection::connect(
            page.debugger_endpoint.as_deref().unwrap(),
            Duration::from_secs(5),
        )
        .await
        .unwrap()
    }

    /// Evaluate `script` in the page and return its value
    pub async fn eval(&self, script: &str) -> Value {
        let conn = self.connect().await;
        let value = RemoteEvaluator::new(&conn)
            .evaluate(script, true)
            .await
            .unwrap();
        conn.close().await;
        value
    }

    /// Replace the page body with `html`
    pub async fn load(&self, html: &str) {
        let script = format!(
            "document.body.innerHTML = {}; true",
            serde_json::to_string(html).unwrap()
        );
        self.eval(&script).await;
    }
}

impl Drop for HeadlessChrome {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
