//! newsroom CLI - date policies, article text and query sync from the shell.

use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::fmt::WriteStyle;
use log::{LevelFilter, debug};
use newsroom_core::config::DEFAULT_NAMESPACE;
use newsroom_core::{
    AppPaths, ClientConfig, DateFormatter, FixedClock, History, LiveUpdates, MemoryHistory,
    NewsItem, PushChannel, QueryUpdateSet, char_count, extract_text, sync_query_params,
    word_count,
};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, Receiver};

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = RuntimeContext::new(cli.common.clone())?;
    ctx.init_logging()?;
    debug!("config loaded from {}", ctx.paths.global_config.display());

    match cli.command {
        Command::Date(args) => handle_date(&ctx, args),
        Command::Agenda(args) => handle_agenda(&ctx, args),
        Command::Text { file } => handle_text(file),
        Command::Words(args) => handle_words(&ctx, args),
        Command::Query(args) => handle_query(&ctx, args),
        Command::Listen => handle_listen(&ctx),
        Command::Config { command } => handle_config(&ctx, command),
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Format dates, extract article text and drive query/live-update sync.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[arg(long, global = true)]
    json: bool,
    #[arg(long = "no-color", global = true)]
    no_color: bool,
    /// Freeze "now" at this date (any accepted date form)
    #[arg(long, value_name = "DATETIME", global = true, env = "NEWSROOM_NOW")]
    now: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render a date under a policy
    Date(DateArgs),
    /// Label an agenda event
    Agenda(AgendaArgs),
    /// Extract plain text from HTML (file or stdin)
    Text { file: Option<PathBuf> },
    /// Count words of an item (JSON file or stdin)
    Words(WordsArgs),
    /// Apply query parameter updates to a URL
    Query(QueryArgs),
    /// Read push payloads from stdin and print dispatched events
    Listen,
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DatePolicy {
    Short,
    Full,
    Locale,
    Input,
    Time,
    Date,
    Week,
    Month,
    Coverage,
    Today,
    Past,
}

#[derive(Debug, Args)]
struct DateArgs {
    #[arg(value_enum)]
    policy: DatePolicy,
    value: String,
}

#[derive(Debug, Args)]
struct AgendaArgs {
    start: String,
    end: String,
    /// Date the event is listed under, in the date policy
    #[arg(long)]
    group: Option<String>,
}

#[derive(Debug, Args)]
struct WordsArgs {
    file: Option<PathBuf>,
    /// Treat the input as an HTML body rather than a JSON item
    #[arg(long)]
    html: bool,
    /// Also print the character count
    #[arg(long)]
    chars: bool,
}

#[derive(Debug, Args)]
struct QueryArgs {
    /// Current location, e.g. "/wire?q=news"
    url: String,
    /// Updates as key=value; "key=" or "key" removes the key
    updates: Vec<String>,
    /// JSON state attached to the history entry
    #[arg(long)]
    state: Option<String>,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print a configuration value
    Get {
        key: String,
        #[arg(long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
    },
    /// Print the global config path
    Path,
    /// Overwrite the global config with defaults
    Reset,
}

struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: ClientConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let paths = AppPaths::discover(common.config.clone()).map_err(|e| anyhow!("{e}"))?;
        ClientConfig::ensure_default(&paths.global_config).map_err(|e| anyhow!("{e}"))?;
        let config = ClientConfig::load(&paths).map_err(|e| anyhow!("{e}"))?;
        Ok(Self {
            common,
            paths,
            config,
        })
    }

    fn init_logging(&self) -> Result<()> {
        if self.common.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(());
        }

        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

        builder.filter_level(self.effective_log_level());

        if self.common.no_color || env::var_os("NO_COLOR").is_some() {
            builder.write_style(WriteStyle::Never);
        } else {
            builder.write_style(WriteStyle::Auto);
        }

        builder.try_init().or_else(|err| {
            if self.common.verbose > 0 {
                eprintln!("logger already initialized: {err}");
            }
            Ok(())
        })
    }

    fn effective_log_level(&self) -> LevelFilter {
        match self.common.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    fn formatter(&self) -> Result<DateFormatter> {
        let formatter = DateFormatter::from_config(&self.config);
        let Some(now) = &self.common.now else {
            return Ok(formatter);
        };
        let instant = formatter
            .parse(now.as_str())
            .datetime()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| anyhow!("cannot read --now value '{now}'"))?;
        debug!("clock frozen at {instant}");
        Ok(formatter.with_clock(Arc::new(FixedClock::new(instant))))
    }
}

fn handle_date(ctx: &RuntimeContext, args: DateArgs) -> Result<()> {
    let f = ctx.formatter()?;
    let value = args.value.as_str();
    let rendered = match args.policy {
        DatePolicy::Short => f.short_date(value),
        DatePolicy::Full => f.full_date(value),
        DatePolicy::Locale => f.locale_date(value),
        DatePolicy::Input => f.date_input_value(value),
        DatePolicy::Time => f.format_time(value),
        DatePolicy::Date => f.format_date(value),
        DatePolicy::Week => f.format_week(value),
        DatePolicy::Month => f.format_month(value),
        DatePolicy::Coverage => f.format_coverage_date(value),
        DatePolicy::Today => f.is_today(value).to_string(),
        DatePolicy::Past => f.is_in_past(value).to_string(),
    };
    println!("{rendered}");
    Ok(())
}

fn handle_agenda(ctx: &RuntimeContext, args: AgendaArgs) -> Result<()> {
    let f = ctx.formatter()?;
    let agenda = f.agenda_date(args.start.as_str(), args.end.as_str());
    let label = f.format_agenda_date(&agenda, args.group.as_deref());
    if ctx.common.json {
        println!("{}", serde_json::to_string_pretty(&label)?);
    } else if label.secondary.is_empty() {
        println!("{}", label.primary);
    } else {
        println!("{}\t{}", label.primary, label.secondary);
    }
    Ok(())
}

fn handle_text(file: Option<PathBuf>) -> Result<()> {
    let html = read_input(file)?;
    print!("{}", extract_text(&html));
    io::stdout().flush()?;
    Ok(())
}

fn handle_words(ctx: &RuntimeContext, args: WordsArgs) -> Result<()> {
    let raw = read_input(args.file)?;
    let item = if args.html {
        NewsItem::with_body(&raw)
    } else {
        serde_json::from_str(&raw).context("parsing item JSON")?
    };
    let words = word_count(&item);
    let chars = args.chars.then(|| char_count(&item));

    if ctx.common.json {
        let mut out = serde_json::json!({ "wordcount": words });
        if let Some(chars) = chars {
            out["charcount"] = chars.into();
        }
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        match chars {
            Some(chars) => println!("{words} words, {chars} characters"),
            None => println!("{words}"),
        }
    }
    Ok(())
}

fn handle_query(ctx: &RuntimeContext, args: QueryArgs) -> Result<()> {
    let state = args
        .state
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()
        .context("parsing --state JSON")?;
    let updates = parse_updates(&args.updates);
    let changed = apply_query(&args.url, &updates, state);

    if ctx.common.json {
        let out = serde_json::json!({
            "changed": changed.is_some(),
            "url": changed.as_deref().unwrap_or(&args.url),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        match changed {
            Some(url) => println!("{url}"),
            None => println!("unchanged"),
        }
    }
    Ok(())
}

/// `key=value` sets, `key=` and bare `key` remove.
fn parse_updates(raw: &[String]) -> QueryUpdateSet {
    raw.iter()
        .map(|update| match update.split_once('=') {
            Some((key, value)) => (key, Some(value)),
            None => (update.as_str(), None),
        })
        .collect()
}

/// New location after syncing `updates` onto `url`, or `None` when nothing changed.
fn apply_query(url: &str, updates: &QueryUpdateSet, state: Option<Value>) -> Option<String> {
    let mut history = MemoryHistory::new(url);
    if sync_query_params(&mut history, updates, state) {
        Some(history.location().to_string())
    } else {
        debug!("query unchanged: ?{}", history.query());
        None
    }
}

fn handle_listen(ctx: &RuntimeContext) -> Result<()> {
    let live = LiveUpdates::from_config(&ctx.config);
    let live = if live.is_enabled() {
        live
    } else {
        LiveUpdates::new(Some("stdin".to_string()))
    };

    let runtime = tokio::runtime::Runtime::new().context("starting runtime")?;
    let delivered = runtime.block_on(print_live_events(&live))?;
    debug!("{delivered} events dispatched");
    Ok(())
}

async fn print_live_events(live: &LiveUpdates) -> Result<usize> {
    let (dispatch, mut events) = mpsc::channel::<Value>(64);
    let handle = live
        .subscribe(&StdinChannel, dispatch, Value::clone)
        .map_err(|e| anyhow!("{e}"))?
        .ok_or_else(|| anyhow!("live updates disabled"))?;

    while let Some(event) = events.recv().await {
        println!("{}", serde_json::to_string(&event)?);
    }
    handle.await.context("push subscription task")
}

/// Push channel fed by stdin, one payload per line.
struct StdinChannel;

impl PushChannel for StdinChannel {
    fn open(&self, endpoint: &str) -> newsroom_core::Result<Receiver<String>> {
        debug!("reading push payloads for {endpoint} from stdin");
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                if tx.send(line).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Get { key, namespace } => {
            let value = ctx
                .config
                .get_config(&key, None, &namespace)
                .ok_or_else(|| anyhow!("'{key}' is not set in namespace '{namespace}'"))?;
            match value {
                Value::String(s) => println!("{s}"),
                other => println!("{}", serde_json::to_string_pretty(&other)?),
            }
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", ctx.paths.global_config.display());
            Ok(())
        }
        ConfigCommand::Reset => {
            ClientConfig::write_default(&ctx.paths.global_config).map_err(|e| anyhow!("{e}"))
        }
    }
}

fn read_input(file: Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => {
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            Ok(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn updates(raw: &[&str]) -> QueryUpdateSet {
        parse_updates(&raw.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn test_apply_query_reports_new_location() {
        let changed = apply_query("/wire?q=old", &updates(&["q=world news", "topic=1"]), None);
        assert_eq!(changed.as_deref(), Some("/wire?q=world+news&topic=1"));
    }

    #[test]
    fn test_apply_query_unchanged() {
        assert_eq!(apply_query("/wire?q=news", &updates(&["q=news"]), None), None);
        assert_eq!(apply_query("/wire", &updates(&["missing", "gone="]), None), None);
    }

    #[test]
    fn test_bare_key_removes() {
        let changed = apply_query("/wire?q=news&topic=1", &updates(&["q"]), None);
        assert_eq!(changed.as_deref(), Some("/wire?topic=1"));
    }
}
