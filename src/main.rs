use anyhow::Context;
use clap::Parser;
use guide_webdriver::agent::{AgentConfig, AgentLoop, HttpPlanner};
use guide_webdriver::browser::{ChromeDriver, ChromePage, ConnectionMode};
use guide_webdriver::config::EngineConfig;
use guide_webdriver::engine::GuideEngine;
use guide_webdriver::protocol;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::Mutex;
use warp::Filter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 9670)]
    port: u16,

    /// Path to a Chrome executable
    #[arg(long)]
    chrome_path: Option<String>,

    /// Run Chrome without a window
    #[arg(long)]
    headless: bool,

    /// Disable Chrome's sandbox (some Linux containers need this)
    #[arg(long)]
    no_sandbox: bool,

    /// Attach to a Chrome already listening on this debug port
    #[arg(long)]
    debug_port: Option<u16>,

    /// JSON engine configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Page to open before serving
    #[arg(short, long)]
    url: Option<String>,

    /// Run the planner-driven agent once for this goal, then exit
    #[arg(long)]
    agent_goal: Option<String>,

    /// Planner base URL used by --agent-goal
    #[arg(long, default_value = "http://localhost:3000")]
    planner_url: String,

    /// Model name forwarded to the planner
    #[arg(long)]
    model: Option<String>,
}

// Shared state
struct AppState {
    driver: Mutex<ChromeDriver>,
    engine: GuideEngine<ChromePage>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path).await?,
        None => EngineConfig::default(),
    };

    let mode = match args.debug_port {
        Some(port) => ConnectionMode::DebugPort(port),
        None => ConnectionMode::Sandboxed {
            chrome_path: args.chrome_path.clone(),
            no_sandbox: args.no_sandbox,
            headless: args.headless,
        },
    };
    let driver = ChromeDriver::new(mode).await?;
    if let Some(url) = &args.url {
        driver.navigate(url).await?;
    }

    let page = Arc::new(driver.guide_page().await?);
    let engine = GuideEngine::new(page, config);

    if let Some(goal) = &args.agent_goal {
        return run_agent(driver, engine, goal, &args).await;
    }

    serve(
        Arc::new(AppState {
            driver: Mutex::new(driver),
            engine,
        }),
        args.port,
    )
    .await
}

async fn run_agent(
    driver: ChromeDriver,
    engine: GuideEngine<ChromePage>,
    goal: &str,
    args: &Args,
) -> anyhow::Result<()> {
    let planner = HttpPlanner::new(&args.planner_url)?;
    let mut config = AgentConfig::default();
    if let Some(model) = &args.model {
        config.model = model.clone();
    }

    let agent = AgentLoop::new(Arc::new(engine), planner, config);

    // Ctrl-C stops the loop before its next step
    let stop = agent.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Stop requested");
            stop.store(true, Ordering::SeqCst);
        }
    });

    let report = agent.run(goal).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    driver.close().await?;
    Ok(())
}

async fn serve(state: Arc<AppState>, port: u16) -> anyhow::Result<()> {
    log::info!("Starting guide server on port {}", port);

    let with_state = {
        let state = state.clone();
        warp::any().map(move || state.clone())
    };

    let health = warp::path("health")
        .and(warp::get())
        .and(with_state.clone())
        .and_then(handle_health);

    let message = warp::path("message")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state)
        .and_then(handle_message);

    let routes = health.or(message);

    // Bind manually to handle "port in use" error gracefully
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Port {} is already in use or unavailable", port))?;

    log::info!("Listening on http://{}", addr);
    warp::serve(routes)
        .run_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
        .await;
    Ok(())
}

async fn handle_health(state: Arc<AppState>) -> Result<impl warp::Reply, warp::Rejection> {
    let alive = state.driver.lock().await.is_alive().await;
    Ok(warp::reply::json(&serde_json::json!({
        "status": if alive { "ok" } else { "browser-unavailable" },
    })))
}

async fn handle_message(
    message: serde_json::Value,
    state: Arc<AppState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    log::debug!("Received message: {}", message);
    let response = protocol::handle_value(&state.engine, &message).await;
    Ok(warp::reply::json(&response))
}
