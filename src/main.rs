use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use mailsift::config::Config;

#[derive(Debug, Parser)]
#[command(name = "mailsift", version, about = "Gmail-style search over a local mail store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output structured JSON
    #[arg(long, global = true)]
    json: bool,

    /// Config file (defaults to $MAILSIFT_CONFIG, then the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path
    #[arg(long, global = true, env = "MAILSIFT_DB")]
    db: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Search one user's messages
    Search(SearchArgs),
    /// Show how a query string is interpreted
    Parse { query: String },
    /// List supported search operators
    Operators,
    /// Show store statistics
    Stats,
}

#[derive(Debug, Args)]
struct SearchArgs {
    /// Query string, e.g. `from:alice has:attachment larger:1M`
    #[arg(default_value = "")]
    query: String,
    /// Owner of the mailbox to search
    #[arg(long, env = "MAILSIFT_USER")]
    user: String,
    #[arg(long)]
    from: Option<String>,
    #[arg(long)]
    subject: Option<String>,
    /// Earliest send date (YYYY-MM-DD)
    #[arg(long)]
    since: Option<String>,
    /// Latest send date (YYYY-MM-DD)
    #[arg(long)]
    until: Option<String>,
    #[arg(long, conflicts_with = "no_attachments")]
    has_attachments: bool,
    #[arg(long)]
    no_attachments: bool,
    #[arg(long, conflicts_with = "unread")]
    read: bool,
    #[arg(long)]
    unread: bool,
    #[arg(long)]
    starred: bool,
    /// Restrict to these accounts (repeatable)
    #[arg(long = "account")]
    accounts: Vec<String>,
    /// Require any of these labels (repeatable)
    #[arg(long = "label")]
    labels: Vec<String>,
    /// Page size (0 selects the configured default)
    #[arg(long, default_value_t = 0)]
    limit: usize,
    #[arg(long, default_value_t = 0)]
    offset: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = mailsift::config::read_config(cli.config.as_deref());
    let config = match &loaded {
        Ok(Some((config, _))) => config.clone(),
        Ok(None) | Err(_) => Config::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match loaded {
        Ok(Some((_, path))) => tracing::debug!(path = %path.display(), "Loaded config"),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Unusable config, using defaults"),
    }

    commands::dispatch(cli, config).await
}

mod commands {
    use std::path::PathBuf;

    use anyhow::{Context, Result};
    use chrono::NaiveDate;

    use mailsift::cache::MemoryCache;
    use mailsift::config::Config;
    use mailsift::db::Database;
    use mailsift::output::{self, OutputFormat};
    use mailsift::search::{self, SearchOptions, SearchService};

    use super::{Cli, Commands, SearchArgs};

    pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
        let format = OutputFormat::from_json_flag(cli.json);
        match cli.command {
            Commands::Search(args) => handle_search(args, cli.db, &config, format).await,
            Commands::Parse { query } => handle_parse(&query, format),
            Commands::Operators => handle_operators(format),
            Commands::Stats => handle_stats(cli.db, &config, format),
        }
    }

    async fn handle_search(
        args: SearchArgs,
        db_override: Option<PathBuf>,
        config: &Config,
        format: OutputFormat,
    ) -> Result<()> {
        let db = open_database(db_override, config)?;

        let options = SearchOptions {
            query: Some(args.query).filter(|query| !query.trim().is_empty()),
            from_email: args.from,
            subject: args.subject,
            date_from: parse_date_arg("since", args.since)?,
            date_to: parse_date_arg("until", args.until)?,
            has_attachments: tri_state(args.has_attachments, args.no_attachments),
            is_read: tri_state(args.read, args.unread),
            is_starred: args.starred.then_some(true),
            account_ids: Some(args.accounts).filter(|ids| !ids.is_empty()),
            labels: Some(args.labels).filter(|labels| !labels.is_empty()),
            limit: args.limit,
            offset: args.offset,
        };

        let service = SearchService::new(&db, MemoryCache::new(), config);
        let result = service
            .search_emails(&args.user, &options)
            .await
            .context("search failed, try again")?;
        println!("{}", output::format_search_result(format, &result)?);
        Ok(())
    }

    fn handle_parse(query: &str, format: OutputFormat) -> Result<()> {
        let parsed = search::parse_query(query);
        println!("{}", output::format_parsed_query(format, &parsed)?);
        Ok(())
    }

    fn handle_operators(format: OutputFormat) -> Result<()> {
        let help = search::search_operator_help();
        println!("{}", output::format_operator_help(format, help)?);
        Ok(())
    }

    fn handle_stats(db_override: Option<PathBuf>, config: &Config, format: OutputFormat) -> Result<()> {
        let db = open_database(db_override, config)?;
        let stats = db.get_stats().context("read store statistics")?;
        println!("{}", output::format_stats(format, &stats)?);
        Ok(())
    }

    fn open_database(db_override: Option<PathBuf>, config: &Config) -> Result<Database> {
        let db_path = match db_override.or_else(|| config.storage.database_path.clone()) {
            Some(path) => path,
            None => Database::default_db_path().context("resolve default mailsift database path")?,
        };
        Database::open(&db_path)
            .with_context(|| format!("open mailsift database at {}", db_path.display()))
    }

    fn parse_date_arg(label: &str, raw: Option<String>) -> Result<Option<NaiveDate>> {
        raw.map(|value| {
            NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                .with_context(|| format!("invalid --{label} date '{value}', expected YYYY-MM-DD"))
        })
        .transpose()
    }

    /// `--x` / `--no-x` flag pair to an optional filter.
    fn tri_state(yes: bool, no: bool) -> Option<bool> {
        match (yes, no) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        }
    }
}
