use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::*;
use threatchat_core::format::{inline_lines, FragmentStyle};
use threatchat_core::view::safe_link;
use threatchat_core::{ChatBackend, Config, HttpBackend};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;

/// Environment variable holding the log filter
const LOG_ENV: &str = "THREATCHAT_LOG";

#[derive(Parser)]
#[command(name = "threatchat")]
#[command(about = "Chat with a cyber threat intelligence assistant")]
struct Cli {
    /// Backend base URL (overrides THREATCHAT_URL and the config file)
    #[arg(short, long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// Your question
        question: String,
    },
    /// Ask the backend to forget the conversation
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = init_logging() {
        eprintln!("logging disabled: {}", e);
    }

    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("could not load config, using defaults: {}", e);
        Config::new()
    });
    let base_url = cli.url.unwrap_or_else(|| config.resolved_base_url());
    let backend = HttpBackend::new(&base_url, config.request_timeout())?;
    log::info!("using backend {}", backend.base_url());

    match cli.command {
        Some(Commands::Ask { question }) => ask_once(&backend, &question).await,
        Some(Commands::Reset) => {
            println!("{}", reset_once(&backend, &config.reset_greeting).await);
            Ok(())
        }
        None => run_tui(&config, Arc::new(backend), base_url).await,
    }
}

/// Log to a file; stderr belongs to the terminal UI.
fn init_logging() -> Result<()> {
    let dir = Config::config_dir()?;
    std::fs::create_dir_all(&dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("threatchat.log"))?;

    env_logger::Builder::from_env(env_logger::Env::new().filter_or(LOG_ENV, "info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()?;
    Ok(())
}

async fn run_tui(config: &Config, backend: Arc<dyn ChatBackend>, base_url: String) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();
    let mut app = App::new(config, backend, base_url);

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event).await?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}

/// Forget the backend conversation. Failures are logged, never fatal; the
/// greeting to show is returned either way.
async fn reset_once<'a>(backend: &dyn ChatBackend, greeting: &'a str) -> &'a str {
    if let Err(e) = backend.reset().await {
        log::warn!("reset request failed: {}", e);
    }
    greeting
}

async fn ask_once(backend: &HttpBackend, question: &str) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        return Err(anyhow!("question is empty"));
    }

    println!("{} {}", "👤".bold(), question.cyan());
    // anyhow reports the failure from main
    let response = backend.ask(question).await?;

    println!("{}", "🤖".bold());
    for fragments in inline_lines(&response.answer) {
        let line: String = fragments
            .into_iter()
            .map(|f| match f.style {
                FragmentStyle::Plain => f.text.normal().to_string(),
                FragmentStyle::Bold => f.text.bold().to_string(),
                FragmentStyle::Code => f.text.green().to_string(),
            })
            .collect();
        println!("  {}", line);
    }

    if !response.sources.is_empty() {
        println!("\n{}", format!("📄 {} source(s)", response.sources.len()).bold().magenta());
        for source in &response.sources {
            println!("  • {} {}", source.name.bold(), source.kind.dimmed());
            if let Some(url) = safe_link(source) {
                println!("    {}", url.underline().cyan());
            }
            println!("    {}", format!("{}…", source.snippet).italic().dimmed());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use threatchat_core::{ChatError, ChatResponse, ChatResult};

    struct DownBackend {
        resets: AtomicUsize,
    }

    #[async_trait]
    impl ChatBackend for DownBackend {
        async fn ask(&self, _question: &str) -> ChatResult<ChatResponse> {
            Err(ChatError::Interrupted("offline".to_string()))
        }

        async fn reset(&self) -> ChatResult<()> {
            self.resets.fetch_add(1, Ordering::SeqCst);
            Err(ChatError::Status {
                status: 500,
                message: Some("backend down".to_string()),
            })
        }
    }

    #[tokio::test]
    async fn test_reset_command_shows_greeting_when_backend_fails() {
        let backend = DownBackend {
            resets: AtomicUsize::new(0),
        };
        let config = Config::new();

        let shown = reset_once(&backend, &config.reset_greeting).await;
        assert_eq!(shown, config.reset_greeting);
        assert_eq!(backend.resets.load(Ordering::SeqCst), 1);
    }
}
