mod cli;

use anyhow::Result;
use clap::Parser;
use console::style;
use shellm_core::config::{FileConfig, Settings};
use shellm_core::llm::{HttpClient, LlmConfig};
use shellm_core::render::ConsoleRenderer;
use shellm_core::storage::SessionStore;
use shellm_core::{Session, ShellProxy};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", style("shellm:").red().bold(), e);
            1
        }
    };
    std::process::exit(code);
}

async fn run() -> Result<i32> {
    let cli = cli::Cli::parse();
    let file = FileConfig::load()?;
    let settings = Settings::resolve(cli.overrides(), file, std::env::var("SHELL").ok());

    shellm_core::logger::init(settings.data_dir.clone());
    let store = SessionStore::new(settings.sessions_dir())?;

    if let Some(cli::Command::Sessions) = cli.command {
        print_sessions(&store);
        return Ok(0);
    }

    let session = match cli.resume.as_deref() {
        Some("latest") => store
            .load_latest()
            .unwrap_or_else(|| Session::new(&settings.model, &settings.system_prompt)),
        Some(id) => store.load(id)?,
        None => Session::new(&settings.model, &settings.system_prompt),
    };

    let client = Arc::new(HttpClient::new(LlmConfig {
        base_url: settings.base_url.clone(),
        model: settings.model.clone(),
        api_key: settings.api_key.clone(),
        temperature: settings.temperature,
    })?);
    let renderer = Arc::new(ConsoleRenderer::new());

    println!(
        "{} {} {}",
        style("shellm").magenta().bold(),
        style(&settings.model).dim(),
        style("(ESC ESC for AI mode)").dim()
    );

    let proxy = ShellProxy::new(settings, client, renderer, session, store)?;
    proxy.run().await
}

fn print_sessions(store: &SessionStore) {
    let sessions = store.list();
    if sessions.is_empty() {
        println!("No stored sessions.");
        return;
    }
    println!(
        "{:<14} {:<10} {:>8}  {:<20} {}",
        style("ID").bold(),
        style("MODEL").bold(),
        style("MSGS").bold(),
        style("UPDATED").bold(),
        style("TITLE").bold()
    );
    for s in sessions {
        println!(
            "{:<14} {:<10} {:>8}  {:<20} {}",
            s.id,
            s.model,
            s.message_count,
            s.updated_at.format("%Y-%m-%d %H:%M:%S"),
            s.title
        );
    }
}
