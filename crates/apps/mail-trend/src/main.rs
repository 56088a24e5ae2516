//! mail-trend - Mailbox size reports from Microsoft Graph
//!
//! Harvests every folder of the given mailboxes with application
//! permissions and writes one workbook per mailbox.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use std::fs::File;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use trend::{
    ClientCredentialsAuth, FetchClient, GraphCredentials, GraphUrls, HarvestSettings,
    JsonWorkbookExporter, LogSink, MailboxHarvester, ProgressSink, ReportExporter, TokenProvider,
    UreqTransport, XlsxExporter, harvest_all,
};

mod progress;

use progress::BarSink;

#[derive(Parser)]
#[command(name = "mail-trend", version, about)]
struct Cli {
    /// Mailbox addresses, space or comma separated; prompted for when omitted
    #[arg(value_name = "MAILBOX")]
    mailboxes: Vec<String>,

    /// Maximum simultaneous Graph requests across all mailboxes
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Attempts per request before giving up
    #[arg(long, value_name = "N")]
    retries: Option<u32>,

    /// Directory for the report files
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Credentials JSON file instead of the config directory or environment
    #[arg(long, value_name = "FILE")]
    credentials: Option<PathBuf>,

    /// Report file format
    #[arg(long, value_enum, default_value_t = ReportFormat::Xlsx)]
    format: ReportFormat,

    /// Also append log output to this file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Log progress instead of drawing progress bars
    #[arg(long)]
    no_progress: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    /// Excel workbook
    Xlsx,
    /// The same workbook as JSON
    Json,
}

/// Writes log output to stderr and a file
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()?;
        self.file.flush()
    }
}

fn open_log_file(path: &Path) -> Result<Tee> {
    let file = File::options()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    Ok(Tee { file })
}

fn init_logging(log_file: Option<&Path>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();

    match log_file.map(open_log_file).transpose() {
        Ok(Some(tee)) => {
            builder.target(env_logger::Target::Pipe(Box::new(tee)));
            builder.init();
        }
        Ok(None) => builder.init(),
        Err(e) => {
            builder.init();
            warn!("{:#}; logging to stderr only", e);
        }
    }
}

/// Split raw arguments into trimmed, de-duplicated addresses
fn parse_mailboxes<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut mailboxes: Vec<String> = Vec::new();
    for address in raw
        .iter()
        .flat_map(|arg| arg.as_ref().split([',', ';', ' ']))
        .map(str::trim)
        .filter(|a| !a.is_empty())
    {
        if !mailboxes.iter().any(|m| m.eq_ignore_ascii_case(address)) {
            mailboxes.push(address.to_string());
        }
    }
    mailboxes
}

fn prompt_mailboxes() -> Result<Vec<String>> {
    print!("Mailbox addresses (comma separated): ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read mailbox addresses")?;
    Ok(parse_mailboxes(&[line]))
}

fn load_credentials(path: Option<&PathBuf>) -> Result<GraphCredentials> {
    if let Some(path) = path {
        return GraphCredentials::from_file(path);
    }

    GraphCredentials::load().inspect_err(|_| {
        if let Some(path) = GraphCredentials::default_credentials_path() {
            warn!(
                "To configure Graph access, either:\n\
                 1. Place the app registration credentials at: {}\n\
                 2. Or set environment variables: GRAPH_TENANT_ID, GRAPH_CLIENT_ID and GRAPH_CLIENT_SECRET",
                path.display()
            );
        }
    })
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut mailboxes = parse_mailboxes(&cli.mailboxes);
    if mailboxes.is_empty() {
        mailboxes = prompt_mailboxes()?;
    }
    anyhow::ensure!(!mailboxes.is_empty(), "No mailbox addresses given");

    let mut settings = HarvestSettings::load().context("Failed to load settings")?;
    if let Some(concurrency) = cli.concurrency {
        settings.concurrency = concurrency;
    }
    if let Some(retries) = cli.retries {
        settings.retries = retries;
    }
    if let Some(dir) = cli.output_dir {
        settings.output_dir = Some(dir);
    }

    let credentials = load_credentials(cli.credentials.as_ref())?;
    let auth = Arc::new(ClientCredentialsAuth::new(credentials));
    // Fail fast on bad credentials; the client refreshes from the cache later
    let first_login = auth.clone();
    tokio::task::spawn_blocking(move || first_login.access_token())
        .await
        .context("Token request task failed")?
        .context("Failed to obtain an access token")?;
    info!("Authenticated; harvesting {} mailbox(es)", mailboxes.len());

    let sink: Arc<dyn ProgressSink> = if cli.no_progress {
        Arc::new(LogSink)
    } else {
        Arc::new(BarSink::new()?)
    };
    let transport = Arc::new(UreqTransport::new(settings.request_timeout()));
    let client = Arc::new(FetchClient::with_tokens(
        transport,
        auth,
        settings.concurrency,
        settings.retry_policy(),
        sink,
    ));
    let urls = GraphUrls::new(&settings.graph_base_url, settings.page_size)?;
    let harvester = MailboxHarvester::new(client, urls);

    let output_dir = settings
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let exporter: Arc<dyn ReportExporter> = match cli.format {
        ReportFormat::Xlsx => Arc::new(XlsxExporter::new(output_dir)),
        ReportFormat::Json => Arc::new(JsonWorkbookExporter::new(output_dir)),
    };

    let outcomes = harvest_all(&harvester, &mailboxes, exporter).await;

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(path) => println!("{}: {}", outcome.mailbox, path.display()),
            Err(e) => {
                failed += 1;
                eprintln!("{}: failed: {}", outcome.mailbox, e);
            }
        }
    }
    info!(
        "Exported {} of {} mailbox(es)",
        outcomes.len() - failed,
        outcomes.len()
    );

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref());

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
