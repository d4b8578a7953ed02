use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::{cursor, execute};
use futures::StreamExt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use rill::backend::HttpBackend;
use rill::config::Config;
use rill::display;
use rill::keybindings::KeybindingRegistry;
use rill::model::{Selection, StatusFilter};
use rill::session::{Dispatch, Session, SessionEvent, SessionOptions};

/// Width used when stdout is not a terminal.
const FALLBACK_WIDTH: usize = 100;

#[derive(Parser, Debug)]
#[command(name = "rill", about = "Command-line client for a self-hosted feed reader")]
struct Args {
    /// Server base URL (overrides the config file)
    #[arg(long, global = true, value_name = "URL")]
    server: Option<String>,

    /// Config file (default: ~/.config/rill/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print folders and feeds with counters
    Tree {
        #[arg(long, value_enum)]
        filter: Option<FilterArg>,
    },
    /// Print items for a feed, a folder or everything
    Items {
        #[command(flatten)]
        target: Target,
        #[arg(long, value_enum)]
        filter: Option<FilterArg>,
        #[arg(long)]
        search: Option<String>,
        /// Number of pages to fetch
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Refresh every feed and wait until the server is done
    Refresh,
    /// Mark everything in a feed, a folder or everywhere as read
    MarkRead {
        #[command(flatten)]
        target: Target,
    },
    /// Interactive key-driven browsing (default)
    Browse,
}

#[derive(clap::Args, Debug)]
struct Target {
    #[arg(long, conflicts_with = "folder")]
    feed: Option<i64>,
    #[arg(long)]
    folder: Option<i64>,
}

impl Target {
    fn selection(&self) -> Option<Selection> {
        match (self.feed, self.folder) {
            (Some(id), _) => Some(Selection::Feed(id)),
            (None, Some(id)) => Some(Selection::Folder(id)),
            (None, None) => None,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FilterArg {
    All,
    Unread,
    Starred,
}

impl From<FilterArg> for StatusFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::All => Self::All,
            FilterArg::Unread => Self::Unread,
            FilterArg::Starred => Self::Starred,
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config.clone().or_else(Config::default_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(server) = &args.server {
        config.server_url = server.clone();
    }
    Ok(config)
}

async fn connect(config: &Config) -> Result<Session> {
    let base = config.server_base().context("Invalid server URL")?;
    let backend = HttpBackend::new(base, config.request_timeout())
        .context("Failed to create HTTP client")?;
    let mut session = Session::new(Arc::new(backend), SessionOptions::from(config));
    session.start().await;
    session
        .settle()
        .await
        .with_context(|| format!("Failed to load state from {}", config.server_url))?;
    Ok(session)
}

fn terminal_width() -> usize {
    terminal::size().map_or(FALLBACK_WIDTH, |(w, _)| usize::from(w))
}

/// Point the session at `target`, or at all feeds when nothing is selected.
fn select_target(session: &mut Session, target: &Target) {
    match target.selection() {
        Some(selection) => session.select_feed(Some(selection)),
        None if session.feed_selected().is_none() => session.select_feed(Some(Selection::AllFeeds)),
        None => {}
    }
}

fn print_items(session: &Session, width: usize) {
    for item in session.items() {
        let feed = session.store().feed(item.feed_id);
        let selected = session.item_selected() == Some(item.id);
        println!("{}", display::item_line(item, feed, selected, width));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let width = terminal_width();

    match args.command.unwrap_or(Command::Browse) {
        Command::Tree { filter } => {
            let mut session = connect(&config).await?;
            if let Some(filter) = filter {
                session.set_filter(filter.into());
                session.settle().await?;
            }
            for line in display::tree_lines(&session, width) {
                println!("{}", line);
            }
        }
        Command::Items {
            target,
            filter,
            search,
            pages,
        } => {
            let mut session = connect(&config).await?;
            select_target(&mut session, &target);
            if let Some(filter) = filter {
                session.set_filter(filter.into());
            }
            if let Some(search) = search {
                session.set_search(search);
            }
            session.settle().await?;
            for _ in 1..pages {
                if !session.has_more_items() {
                    break;
                }
                session.load_more_items();
                session.settle().await?;
            }
            print_items(&session, width);
            if session.has_more_items() {
                println!("(more available, use --pages)");
            }
        }
        Command::Refresh => {
            let mut session = connect(&config).await?;
            session.fetch_all_feeds();
            session.settle().await.context("Refresh failed")?;
            println!("Refresh complete. {}", session.window_title());
            for (feed_id, error) in session.feed_errors() {
                let title = session
                    .store()
                    .feed(*feed_id)
                    .map_or_else(|| feed_id.to_string(), |f| f.title.clone());
                println!("  {}: {}", display::sanitize(&title), display::sanitize(error));
            }
        }
        Command::MarkRead { target } => {
            let mut session = connect(&config).await?;
            select_target(&mut session, &target);
            session.settle().await?;
            session.mark_items_read();
            session.settle().await.context("Mark read failed")?;
            println!("Marked read. {}", session.window_title());
        }
        Command::Browse => {
            let mut session = connect(&config).await?;
            let mut registry = KeybindingRegistry::new();
            for warning in registry.apply_overrides(&config.keybindings) {
                tracing::warn!("{}", warning);
            }
            browse(&mut session, &registry).await?;
        }
    }
    Ok(())
}

// ============================================================================
// Browse loop
// ============================================================================

enum Input {
    Key(KeyEvent),
    Task(SessionEvent),
    Tick,
    Other,
    Closed,
}

/// Raw-mode loop: keys become actions, task events update the session, and
/// the status line is redrawn after each input.
async fn browse(session: &mut Session, registry: &KeybindingRegistry) -> Result<()> {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = terminal::disable_raw_mode();
        original_hook(info);
    }));

    terminal::enable_raw_mode().context("Failed to enable raw mode")?;
    let result = browse_loop(session, registry).await;
    terminal::disable_raw_mode().context("Failed to restore terminal")?;
    println!();
    result
}

async fn browse_loop(session: &mut Session, registry: &KeybindingRegistry) -> Result<()> {
    let mut stdout = io::stdout();
    let mut keys = EventStream::new();
    // Typed search text while the search prompt is open.
    let mut search: Option<String> = None;

    if session.feed_selected().is_none() {
        session.select_feed(Some(Selection::AllFeeds));
    }

    loop {
        let line = match &search {
            Some(text) => format!("/{}", text),
            None => display::status_line(session, terminal_width()),
        };
        execute!(
            stdout,
            cursor::MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(line)
        )?;
        stdout.flush()?;

        let deadline = session.next_deadline();
        let sleep = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        let input = tokio::select! {
            maybe = keys.next() => match maybe {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => Input::Key(key),
                Some(Ok(_)) => Input::Other,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Terminal input error");
                    Input::Closed
                }
                None => Input::Closed,
            },
            Some(event) = session.next_event() => Input::Task(event),
            _ = sleep => Input::Tick,
        };

        match input {
            Input::Closed => break,
            Input::Other => {}
            Input::Tick => session.tick(),
            Input::Task(event) => {
                if let Err(e) = session.handle_event(event) {
                    notice(&mut stdout, &format!("Error: {}", e))?;
                }
            }
            Input::Key(key) => {
                if let Some(text) = search.as_mut() {
                    match key.code {
                        KeyCode::Enter | KeyCode::Esc => search = None,
                        KeyCode::Backspace => {
                            text.pop();
                            session.set_search(text.clone());
                        }
                        KeyCode::Char(c) => {
                            text.push(c);
                            session.set_search(text.clone());
                        }
                        _ => {}
                    }
                    continue;
                }
                let Some(action) = registry.action_for_key(key.code, key.modifiers) else {
                    continue;
                };
                match session.dispatch(action) {
                    Dispatch::Quit => break,
                    Dispatch::FocusSearch => search = Some(session.search().to_string()),
                    Dispatch::OpenLink(link) => open_link(&mut stdout, &link)?,
                    Dispatch::Scroll(_) | Dispatch::Handled | Dispatch::Ignored => {}
                }
            }
        }
    }
    Ok(())
}

/// Print a message on its own line above the status line.
fn notice(stdout: &mut io::Stdout, message: &str) -> Result<()> {
    execute!(
        stdout,
        cursor::MoveToColumn(0),
        Clear(ClearType::CurrentLine),
        Print(display::sanitize(message)),
        Print("\r\n")
    )?;
    Ok(())
}

/// Open `link` in a browser; only http(s) links are handed to the system.
fn open_link(stdout: &mut io::Stdout, link: &str) -> Result<()> {
    let allowed = url::Url::parse(link).is_ok_and(|u| matches!(u.scheme(), "http" | "https"));
    if !allowed {
        return notice(stdout, &format!("Refusing to open {}", link));
    }
    if let Err(e) = open::that(link) {
        return notice(stdout, &format!("Failed to open browser: {}", e));
    }
    notice(stdout, link)
}
