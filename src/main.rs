use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use page_port::mock::{Fixture, MemoryBrowser, MemoryElement};
use step_engine::RunOptions;
use tabweaver_adapters::{script, CommandAdapter, McpAdapter};

use tabweaver_cli::bootstrap::{build_agent, Agent};
use tabweaver_cli::config::AgentConfig;
use tabweaver_cli::server::{serve, AppState};

#[derive(Parser)]
#[command(name = "tabweaver", version, about = "Workspace-scoped browser automation agent")]
struct Cli {
    /// Path to a JSON configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the WebSocket + MCP demo server against the in-memory engine.
    Serve {
        #[arg(long, default_value_t = 8931)]
        port: u16,
    },
    /// Compile a script file to steps and run it.
    Script { file: PathBuf },
    /// Run a canned step list and print the results.
    Demo,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn demo_browser() -> Arc<MemoryBrowser> {
    let browser = MemoryBrowser::new();
    browser.add_fixture(
        "https://demo.tabweaver.local/form",
        Fixture::new("Demo Form")
            .with_element(MemoryElement::new("button", "button", "Save"))
            .with_element(MemoryElement::new("input", "textbox", "Name"))
            .with_element(
                MemoryElement::new("select", "combobox", "Color").with_value("red"),
            ),
    );
    browser
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = AgentConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Serve { port } => {
            let agent = build_agent(&config, demo_browser());
            let state = Arc::new(AppState {
                command: CommandAdapter::new(Arc::clone(&agent.deps), Arc::clone(&agent.ctx)),
                mcp: McpAdapter::new(Arc::clone(&agent.deps), Arc::clone(&agent.ctx)),
            });
            serve(state, port).await
        }

        Command::Script { file } => {
            let source = std::fs::read_to_string(&file)
                .with_context(|| format!("reading script {}", file.display()))?;
            let steps = script::compile(&source).map_err(|err| anyhow::anyhow!("{err}"))?;
            let agent = build_agent(&config, demo_browser());
            let outcome = run_on_default_workspace(&agent, steps).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.ok {
                std::process::exit(1);
            }
            Ok(())
        }

        Command::Demo => {
            let source = "goto https://demo.tabweaver.local/form\nsnapshot\n";
            let steps = script::compile(source).map_err(|err| anyhow::anyhow!("{err}"))?;
            let agent = build_agent(&config, demo_browser());
            let outcome = run_on_default_workspace(&agent, steps).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
    }
}

async fn run_on_default_workspace(
    agent: &Agent,
    steps: Vec<step_engine::Step>,
) -> anyhow::Result<step_engine::RunOutcome> {
    let workspace = agent
        .ctx
        .resolve_workspace(&agent.deps, None)
        .await
        .map_err(|err| anyhow::anyhow!("{err}"))?;
    agent
        .deps
        .runner
        .run_steps(&workspace, steps, RunOptions::default())
        .await
        .map_err(|err| anyhow::anyhow!("{err}"))
}
