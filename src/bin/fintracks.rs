//! CLI binary for fintracks.
//!
//! A thin shim over the library crate: maps subcommands onto the account
//! portal, the batch extractor and the ledger, and prints results.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use fintracks::{
    auth, export, extract_files, BatchOutput, BatchProgressCallback, ExtractionConfig, FileStatus,
    FileStore, KeyValueStore, Ledger, ProgressCallback, Session, Transaction,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the submitted files, plus a
/// log line per failed file.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Index of the most recent file that reported an error (0 = none).
    last_error: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} files  \
                 ⏱ {elapsed_precise}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            last_error: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Reading {total_files} statement file(s)…"))
        ));
    }

    fn on_file_start(&self, _index: usize, _total: usize, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn on_file_error(&self, index: usize, total: usize, error: &str) {
        self.last_error.store(index, Ordering::SeqCst);
        let msg = if error.chars().count() > 90 {
            format!("{}\u{2026}", error.chars().take(89).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} File {:>3}/{:<3}  {}", red("✗"), index, total, red(&msg)));
    }

    fn on_progress(&self, completed: usize, total: usize) {
        if self.last_error.load(Ordering::SeqCst) != completed {
            self.bar
                .println(format!("  {} File {:>3}/{:<3}", green("✓"), completed, total));
        }
        self.bar.set_position(completed as u64);
    }

    fn on_batch_complete(&self, _total_files: usize, _records: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Create an account (signs in)
  fintracks register ada --password 'correct horse'

  # Digitise statements into the ledger
  fintracks extract january.pdf february.pdf receipt.jpg

  # Review and tidy up
  fintracks list
  fintracks summary
  fintracks recategorize Pets 3f2a9c1e 77b0d4aa
  fintracks edit 3f2a9c1e --amount -12.50 --notes "split with Sam"

  # Export
  fintracks export                    # fintracks_ada_YYYY-MM-DD.csv
  fintracks export --tsv | pbcopy     # paste into a spreadsheet

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  FINTRACKS_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  FINTRACKS_MODEL         Override model ID
  FINTRACKS_DATA_DIR      Where accounts and the session are kept
  PDFIUM_LIB_PATH         Path to libpdfium, needed for PDF statements
"#;

/// Digitise bank and credit-card statements into a personal ledger.
#[derive(Parser, Debug)]
#[command(
    name = "fintracks",
    version,
    about = "Digitise bank and credit-card statements into a personal ledger",
    long_about = "Digitise bank and credit-card statements (PDFs and photos) into a personal \
transaction ledger using vision language models, then review, categorise and export it.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory holding accounts and the active session.
    #[arg(long, env = "FINTRACKS_DATA_DIR", default_value = ".fintracks", global = true)]
    data_dir: PathBuf,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "FINTRACKS_VERBOSE", global = true)]
    verbose: bool,

    /// Suppress all output except errors and requested data.
    #[arg(short, long, env = "FINTRACKS_QUIET", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account and sign in.
    Register(Credentials),
    /// Sign in to an existing account.
    Login(Credentials),
    /// Sign out.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Extract transactions from statements and append them to the ledger.
    Extract(ExtractArgs),
    /// List transactions.
    List {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Income, spending, net and expenses per category.
    Summary {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List the category vocabulary.
    Categories,
    /// Edit one transaction.
    Edit(EditArgs),
    /// Set the category of several transactions at once.
    Recategorize {
        category: String,
        /// Transaction ids (or unique prefixes).
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Delete transactions.
    Delete {
        /// Transaction ids (or unique prefixes).
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Delete every transaction.
    Clear {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
    /// Remove repeated (date, description, amount) records.
    Dedupe,
    /// Export the ledger as CSV (or TSV to stdout).
    Export {
        /// Tab-delimited, for spreadsheet paste. Printed to stdout unless -o is given.
        #[arg(long)]
        tsv: bool,
        /// Output path. Default: fintracks_{user}_{date}.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct Credentials {
    username: String,
    /// Read from stdin when omitted.
    #[arg(long, env = "FINTRACKS_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Statement files (PDF or image) or HTTP/HTTPS URLs.
    #[arg(required = true)]
    files: Vec<String>,

    /// Vision model ID (e.g. gemini-2.5-flash, gpt-4.1).
    #[arg(long, env = "FINTRACKS_MODEL")]
    model: Option<String>,

    /// Provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "FINTRACKS_PROVIDER")]
    provider: Option<String>,

    /// PDF page upscaling factor (0.5–4.0).
    #[arg(long, env = "FINTRACKS_RENDER_SCALE", default_value_t = 1.5)]
    render_scale: f32,

    /// JPEG quality for rendered pages (1–100).
    #[arg(long, env = "FINTRACKS_JPEG_QUALITY", default_value_t = 90)]
    jpeg_quality: u8,

    /// Path to a text file replacing the built-in extraction prompt.
    #[arg(long, env = "FINTRACKS_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max output tokens per statement.
    #[arg(long, env = "FINTRACKS_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "FINTRACKS_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per statement on service failure.
    #[arg(long, env = "FINTRACKS_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-request timeout in seconds.
    #[arg(long, env = "FINTRACKS_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "FINTRACKS_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable the progress bar.
    #[arg(long, env = "FINTRACKS_NO_PROGRESS")]
    no_progress: bool,

    /// Print the batch result as JSON instead of a summary.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct EditArgs {
    /// Transaction id (or unique prefix).
    id: String,
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    amount: Option<f64>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters during a batch,
    // so library INFO logs are hidden while it is shown.
    let show_progress = match &cli.command {
        Command::Extract(args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let store = Arc::new(
        FileStore::open(&cli.data_dir)
            .with_context(|| format!("Failed to open data directory {:?}", cli.data_dir))?,
    );

    match cli.command {
        Command::Register(creds) => {
            let password = password_or_prompt(creds.password)?;
            let session = auth::register(store.as_ref(), &creds.username, &password)?;
            say(cli.quiet, format!("{} Registered and signed in as {}", green("✔"), bold(session.username())));
        }
        Command::Login(creds) => {
            let password = password_or_prompt(creds.password)?;
            let session = auth::login(store.as_ref(), &creds.username, &password)?;
            say(cli.quiet, format!("{} Signed in as {}", green("✔"), bold(session.username())));
        }
        Command::Logout => {
            auth::logout(store.as_ref())?;
            say(cli.quiet, "Signed out".to_string());
        }
        Command::Whoami => match auth::restore_session(store.as_ref())? {
            Some(session) => println!("{}", session.username()),
            None => bail!("Not signed in"),
        },
        Command::Extract(args) => {
            let mut ledger = open_ledger(store)?;
            let progress: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
            } else {
                None
            };
            let config = build_config(&args, progress).await?;
            let output = extract_files(&args.files, &config)
                .await
                .context("Extraction failed")?;
            let appended = ledger.append_batch(output.transactions.clone())?;

            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output).context("Failed to serialise output")?
                );
            } else if !cli.quiet {
                print_batch(&output, appended);
            }
        }
        Command::List { json } => {
            let ledger = open_ledger(store)?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(ledger.transactions())
                        .context("Failed to serialise transactions")?
                );
            } else {
                print_transactions(ledger.transactions());
            }
        }
        Command::Summary { json } => {
            let ledger = open_ledger(store)?;
            let agg = ledger.aggregates();
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&agg).context("Failed to serialise summary")?
                );
            } else {
                let s = &agg.summary;
                println!("Records:   {}", s.total_records);
                println!("Income:    {}", green(&format!("{:>12.2}", s.total_income)));
                println!("Spending:  {}", red(&format!("{:>12.2}", s.total_spending)));
                println!("Net:       {}", bold(&format!("{:>12.2}", s.net)));
                if !agg.category_totals.is_empty() {
                    println!();
                    println!("{}", bold("Spending by category"));
                    for c in &agg.category_totals {
                        println!("  {:<20} {:>12.2}", c.category, c.total);
                    }
                }
            }
        }
        Command::Categories => {
            let ledger = open_ledger(store)?;
            let custom = ledger.custom_categories();
            for c in ledger.all_categories() {
                if custom.contains(&c) {
                    println!("{c}  {}", dim("(custom)"));
                } else {
                    println!("{c}");
                }
            }
        }
        Command::Edit(args) => {
            let mut ledger = open_ledger(store)?;
            let id = resolve_id(&ledger, &args.id)?;
            let mut record = ledger
                .get(&id)
                .cloned()
                .with_context(|| format!("No transaction with id {id}"))?;
            if let Some(date) = args.date {
                record.date = date;
            }
            if let Some(description) = args.description {
                if description.trim().is_empty() {
                    bail!("Description cannot be empty");
                }
                record.description = description;
            }
            if let Some(amount) = args.amount {
                record.amount = amount;
            }
            if let Some(category) = args.category {
                record.category = category;
            }
            if let Some(notes) = args.notes {
                record.notes = notes;
            }
            let delta = ledger.update(record)?;
            say(cli.quiet, format!("{} Updated {}", green("✔"), short_id(&id)));
            for c in delta.added {
                say(cli.quiet, format!("  new category {}", bold(&c)));
            }
        }
        Command::Recategorize { category, ids } => {
            let mut ledger = open_ledger(store)?;
            let ids = ids
                .iter()
                .map(|i| resolve_id(&ledger, i))
                .collect::<Result<Vec<_>>>()?;
            for id in &ids {
                ledger.select(id);
            }
            let selected = ledger.selected();
            let delta = ledger.bulk_update_category(&selected, &category)?;
            say(
                cli.quiet,
                format!("{} {} transaction(s) → {}", green("✔"), selected.len(), bold(&category)),
            );
            for c in delta.added {
                say(cli.quiet, format!("  new category {}", bold(&c)));
            }
        }
        Command::Delete { ids } => {
            let mut ledger = open_ledger(store)?;
            let ids = ids
                .iter()
                .map(|i| resolve_id(&ledger, i))
                .collect::<Result<Vec<_>>>()?;
            let removed = ledger.bulk_delete(&ids)?;
            say(cli.quiet, format!("{} Deleted {} transaction(s)", green("✔"), removed));
        }
        Command::Clear { yes } => {
            if !yes {
                bail!("This deletes every transaction in your ledger. Re-run with --yes to confirm.");
            }
            let mut ledger = open_ledger(store)?;
            let removed = ledger.clear_all()?;
            say(cli.quiet, format!("{} Cleared {} transaction(s)", green("✔"), removed));
        }
        Command::Dedupe => {
            let mut ledger = open_ledger(store)?;
            let removed = ledger.dedupe()?;
            say(cli.quiet, format!("{} Removed {} duplicate(s)", green("✔"), removed));
        }
        Command::Export { tsv, output } => {
            let ledger = open_ledger(store)?;
            let delimiter = if tsv {
                export::Delimiter::Tab
            } else {
                export::Delimiter::Comma
            };
            let path = match output {
                Some(p) => Some(p),
                None if tsv => None,
                None => Some(PathBuf::from(export::todays_export_filename(
                    ledger.session().username(),
                ))),
            };
            match path {
                Some(p) => {
                    export::write_delimited(&p, ledger.transactions(), delimiter)?;
                    say(
                        cli.quiet,
                        format!(
                            "{} {} transaction(s) → {}",
                            green("✔"),
                            ledger.len(),
                            bold(&p.display().to_string())
                        ),
                    );
                }
                None => {
                    let mut out = io::stdout().lock();
                    writeln!(out, "{}", export::to_delimited(ledger.transactions(), delimiter))
                        .context("Failed to write to stdout")?;
                }
            }
        }
    }

    Ok(())
}

/// Map extract flags to `ExtractionConfig`.
async fn build_config(
    args: &ExtractArgs,
    progress: Option<ProgressCallback>,
) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .render_scale(args.render_scale)
        .jpeg_quality(args.jpeg_quality)
        .max_tokens(args.max_tokens)
        .temperature(args.temperature)
        .max_retries(args.max_retries)
        .api_timeout_secs(args.api_timeout)
        .download_timeout_secs(args.download_timeout);

    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref path) = args.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn open_ledger(store: Arc<FileStore>) -> Result<Ledger> {
    let session: Session =
        auth::require_session(store.as_ref()).context("Run `fintracks login <username>` first")?;
    let store: Arc<dyn KeyValueStore> = store;
    Ok(Ledger::open(session, store)?)
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    if let Some(p) = password {
        return Ok(p);
    }
    eprint!("Password: ");
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Accept a full id or an unambiguous prefix of one.
fn resolve_id(ledger: &Ledger, input: &str) -> Result<String> {
    if ledger.get(input).is_some() {
        return Ok(input.to_string());
    }
    let matches: Vec<&Transaction> = ledger
        .transactions()
        .iter()
        .filter(|t| t.id.starts_with(input))
        .collect();
    match matches.as_slice() {
        [only] => Ok(only.id.clone()),
        [] => bail!("No transaction with id '{input}'"),
        _ => bail!("Id prefix '{input}' matches {} transactions", matches.len()),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn say(quiet: bool, line: String) {
    if !quiet {
        eprintln!("{line}");
    }
}

fn print_transactions(txns: &[Transaction]) {
    if txns.is_empty() {
        eprintln!("{}", dim("No transactions yet. Try `fintracks extract <statement.pdf>`."));
        return;
    }
    println!(
        "{}",
        bold(&format!(
            "{:<8}  {:<10}  {:<36}  {:>10}  {:<14}  {}",
            "ID", "DATE", "DESCRIPTION", "AMOUNT", "CATEGORY", "NOTES"
        ))
    );
    for t in txns {
        let desc: String = t.description.chars().take(36).collect();
        let amount = format!("{:>10.2}", t.amount);
        let amount = if t.is_income() { green(&amount) } else { amount };
        println!(
            "{:<8}  {:<10}  {:<36}  {}  {:<14}  {}",
            short_id(&t.id),
            t.date,
            desc,
            amount,
            t.category,
            dim(&t.notes)
        );
    }
}

fn print_batch(output: &BatchOutput, appended: usize) {
    for f in &output.files {
        let (mark, detail) = match f.status {
            FileStatus::Extracted => (green("✓"), format!("{} record(s)", f.records.len())),
            FileStatus::NoRecords => (cyan("⚠"), "no usable rows".to_string()),
            FileStatus::Unsupported => (cyan("⚠"), "unsupported file type, skipped".to_string()),
            FileStatus::Failed => (
                red("✗"),
                f.error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "failed".to_string()),
            ),
        };
        eprintln!(
            "  {} {:<32}  {}  {}",
            mark,
            f.name,
            detail,
            dim(&format!("{:.1}s", f.duration_ms as f64 / 1000.0))
        );
    }
    let s = &output.stats;
    eprintln!(
        "{}  {} transaction(s) added from {}/{} file(s)  {}ms",
        if s.failed_files == 0 { green("✔") } else { cyan("⚠") },
        bold(&appended.to_string()),
        s.extracted_files,
        s.total_files,
        s.total_duration_ms
    );
}
