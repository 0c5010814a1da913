//! Local HTTP server for tests
//!
//! Serves a small site with a navigation bar, a search box and a results
//! page so guidance can be exercised in Chrome without external websites.
//!
//! Each server instance runs on a random available port.

use std::net::SocketAddr;
use tokio::sync::oneshot;
use warp::Filter;

const HOME: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <title>Guide Test Home</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
</head>
<body>
    <nav>
        <a href="/settings">Settings</a>
        <a href="/billing">Billing</a>
        <button id="hidden-action" style="display:none">Hidden action</button>
    </nav>
    <input id="q" type="search" placeholder="Search the site">
    <p>Plenty of text so the page can scroll.</p>
    <div style="height: 2000px"></div>
    <script>
        document.getElementById("q").addEventListener("keydown", (e) => {
            if (e.key === "Enter") {
                location.href = "/results?q=" + encodeURIComponent(e.target.value);
            }
        });
    </script>
</body>
</html>"#;

fn simple_page(title: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><title>{title}</title></head>
<body>
    <h1>{title}</h1>
    <p><a href="/">Back to Home</a></p>
</body>
</html>"#
    )
}

/// Test server that serves simple HTML pages
pub struct TestServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestServer {
    /// Start a new test server on a random available port
    pub async fn start() -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let index = warp::path::end().map(|| warp::reply::html(HOME));
        let settings = warp::path("settings").map(|| warp::reply::html(simple_page("Settings")));
        let billing = warp::path("billing").map(|| warp::reply::html(simple_page("Billing")));
        let results = warp::path("results").map(|| warp::reply::html(simple_page("Results")));

        let routes = index.or(settings).or(billing).or(results);

        // Bind to random port
        let (addr, server) =
            warp::serve(routes).bind_with_graceful_shutdown(([127, 0, 0, 1], 0), async {
                shutdown_rx.await.ok();
            });

        tokio::spawn(server);

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Base URL for this server (e.g., "http://127.0.0.1:12345")
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Wait for the server to be ready by making a test request
    pub async fn wait_ready(&self) -> anyhow::Result<()> {
        let url = self.url();
        let max_attempts = 10;

        for attempt in 1..=max_attempts {
            match reqwest::get(&url).await {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    println!("Attempt {}: server returned status {}", attempt, response.status());
                }
                Err(e) => {
                    println!("Attempt {}: server not ready - {}", attempt, e);
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            }
        }

        anyhow::bail!("Server did not become ready after {} attempts", max_attempts)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
