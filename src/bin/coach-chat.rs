//! CLI binary for coach-chat.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ClientConfig`, runs one chat turn (or an offline pipeline stage) and
//! prints the result.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use coach_chat::{
    normalize, AssistantIdentity, ChatEntry, ChatSession, ClientConfig, ComposeObserver,
    Credential, EntryBody, ExtractionContext, MarkdownRenderer, MessageSegmenter,
    PdfiumBackend, RawResponse, SelectedFile, SendOutcome, SessionIdentity, Speaker,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
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

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: one spinner standing in for the typing indicator and
/// the per-file processing status.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        Arc::new(Self { bar })
    }

    fn spin(&self, prefix: &'static str, msg: String) {
        self.bar.set_prefix(prefix);
        self.bar.set_message(msg);
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }
}

impl ComposeObserver for CliObserver {
    fn on_file_processing(&self, name: &str) {
        self.spin("Attaching", name.to_string());
    }

    fn on_file_attached(&self, name: &str, text_len: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            name,
            dim(&format!("{text_len} chars"))
        ));
    }

    fn on_file_rejected(&self, name: &str, reason: &str) {
        self.bar
            .println(format!("  {} {}  {}", red("✗"), name, dim(reason)));
    }

    fn on_send_started(&self, attachments: usize) {
        let msg = match attachments {
            0 => "Typing...".to_string(),
            n => format!("Typing... ({n} attached)"),
        };
        self.spin("Waiting", msg);
    }

    fn on_send_finished(&self, _delivered: bool) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Ask a question
  coach-chat send "How many days of annual leave do I get?"

  # Attach documents to the question
  coach-chat send "Does this contract match policy?" --attach contract.pdf --attach notes.md

  # Print rendered HTML fragments instead of plain text
  coach-chat send --html "Summarise the parental leave policy"

  # Run a saved agent reply through normalize → segment → render
  coach-chat render reply.json
  cat reply.json | coach-chat render -

  # Check what text would be sent for some files
  coach-chat extract handbook.pdf minutes.txt

ENVIRONMENT VARIABLES:
  COACH_CHAT_WEBHOOK_URL      Agent webhook receiving chat turns
  COACH_CHAT_TOKEN            Bearer token of the signed-in user
  COACH_CHAT_USER_ID          User id (also used as the session id)
  COACH_CHAT_EMAIL            User email
  COACH_CHAT_TIMEOUT          Request timeout in seconds (default 60)
  COACH_CHAT_PDF_TIMEOUT      PDF extraction timeout in seconds (default 30)
  COACH_CHAT_ASSISTANT_NAME   Name the agent signs with (default Annie)
  COACH_CHAT_ASSISTANT_ROLE   Role the agent signs with (default HR Business Coach)
  PDFIUM_LIB_PATH             Path to libpdfium; the system library is used otherwise
"#;

/// Talk to the HR coaching agent from the terminal.
#[derive(Parser, Debug)]
#[command(
    name = "coach-chat",
    version,
    about = "Send chat turns to a coaching agent webhook and render its replies",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Name the agent signs its replies with.
    #[arg(long, global = true, env = "COACH_CHAT_ASSISTANT_NAME", default_value = "Annie")]
    assistant_name: String,

    /// Role the agent signs its replies with.
    #[arg(
        long,
        global = true,
        env = "COACH_CHAT_ASSISTANT_ROLE",
        default_value = "HR Business Coach"
    )]
    assistant_role: String,

    /// Path to the pdfium shared library.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Wall-clock budget per PDF, in seconds.
    #[arg(long, global = true, env = "COACH_CHAT_PDF_TIMEOUT", default_value_t = 30)]
    pdf_timeout: u64,

    /// Print rendered HTML instead of plain text.
    #[arg(long, global = true)]
    html: bool,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Disable the spinner.
    #[arg(long, global = true, env = "COACH_CHAT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "COACH_CHAT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "COACH_CHAT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one chat turn and print the reply.
    Send {
        /// The message to send.
        message: String,

        /// Attach a document (repeatable).
        #[arg(short, long = "attach", value_name = "FILE")]
        attach: Vec<PathBuf>,

        /// Agent webhook URL.
        #[arg(long, env = "COACH_CHAT_WEBHOOK_URL")]
        webhook_url: Option<String>,

        /// Bearer token of the signed-in user.
        #[arg(long, env = "COACH_CHAT_TOKEN", hide_env_values = true)]
        token: String,

        /// User id; also the conversation key.
        #[arg(long, env = "COACH_CHAT_USER_ID")]
        user_id: String,

        /// User email.
        #[arg(long, env = "COACH_CHAT_EMAIL")]
        email: String,

        /// Request timeout in seconds.
        #[arg(long, env = "COACH_CHAT_TIMEOUT", default_value_t = 60)]
        timeout: u64,
    },

    /// Run a raw agent reply through normalize → segment → render.
    Render {
        /// File holding the response body; `-` or nothing reads stdin.
        input: Option<PathBuf>,
    },

    /// Validate and extract the text of files, in order.
    Extract {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives the feedback that matters; keep INFO logs out of it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    match &cli.command {
        Command::Send {
            message,
            attach,
            webhook_url,
            token,
            user_id,
            email,
            timeout,
        } => {
            let mut builder = build_config(&cli).request_timeout_secs(*timeout);
            if let Some(url) = webhook_url {
                builder = builder.webhook_url(url.clone());
            }
            let config = builder.build().context("Invalid configuration")?;
            let identity =
                SessionIdentity::new(user_id.clone(), email.clone(), Credential::new(token.clone()));
            run_send(&cli, config, identity, message, attach).await
        }
        Command::Render { input } => {
            let config = build_config(&cli).build().context("Invalid configuration")?;
            run_render(&cli, &config, input.as_ref()).await
        }
        Command::Extract { files } => {
            let config = build_config(&cli).build().context("Invalid configuration")?;
            run_extract(&cli, &config, files).await
        }
    }
}

fn build_config(cli: &Cli) -> coach_chat::ClientConfigBuilder {
    let mut builder = ClientConfig::builder()
        .pdf_timeout_secs(cli.pdf_timeout)
        .assistant(AssistantIdentity::new(
            cli.assistant_name.clone(),
            cli.assistant_role.clone(),
        ));
    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(path.clone());
    }
    builder
}

async fn run_send(
    cli: &Cli,
    config: ClientConfig,
    identity: SessionIdentity,
    message: &str,
    attach: &[PathBuf],
) -> Result<()> {
    let assistant = config.assistant.name.clone();
    let mut session = ChatSession::connect(config, identity).context("Failed to set up chat")?;
    if !cli.quiet && !cli.no_progress && !cli.json {
        session = session.with_observer(CliObserver::new());
    }

    let mut files = Vec::with_capacity(attach.len());
    for path in attach {
        let file = SelectedFile::from_path(path)
            .await
            .with_context(|| format!("Cannot open {}", path.display()))?;
        files.push(file);
    }
    if !files.is_empty() {
        session.attach_files(files).await;
    }

    let outcome = session.send(message).await;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(session.transcript())
                .context("Failed to serialize transcript")?
        );
    } else if !cli.quiet {
        for entry in session.transcript() {
            print_entry(entry, &assistant, cli.html);
        }
    }

    match outcome {
        SendOutcome::Failed(e) => bail!("Chat turn failed: {e}"),
        SendOutcome::Ignored => bail!("Nothing to send"),
        SendOutcome::Delivered { .. } => Ok(()),
    }
}

async fn run_render(cli: &Cli, config: &ClientConfig, input: Option<&PathBuf>) -> Result<()> {
    let body = match input {
        Some(path) if path.as_os_str() != "-" => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Cannot read {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Cannot read stdin")?;
            buf
        }
    };

    let text = normalize(&RawResponse::from_body(&body));
    let parts = MessageSegmenter::new(&config.assistant).segment(&text);
    let renderer = MarkdownRenderer::new(config.render, config.assistant.clone());

    let entries: Vec<ChatEntry> = parts
        .into_iter()
        .map(|part| {
            let html = renderer.render(&part.text);
            ChatEntry::part(part, html)
        })
        .collect();

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).context("Failed to serialize parts")?
        );
    } else if entries.is_empty() {
        eprintln!("{}", dim("(no displayable text in response)"));
    } else {
        for entry in &entries {
            print_entry(entry, &config.assistant.name, cli.html);
        }
    }
    Ok(())
}

async fn run_extract(cli: &Cli, config: &ClientConfig, paths: &[PathBuf]) -> Result<()> {
    let backend = Arc::new(PdfiumBackend::new(config.pdfium_library_path.clone()));
    let ctx = ExtractionContext::new(backend, Duration::from_secs(config.pdf_timeout_secs));

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let file = SelectedFile::from_path(path)
            .await
            .with_context(|| format!("Cannot open {}", path.display()))?;
        files.push(file);
    }

    let mut results = coach_chat::prepare_stream(files, config.limits.clone(), ctx);
    let mut report = Vec::new();
    let mut failed = 0usize;

    while let Some(result) = results.next().await {
        match result {
            Ok(doc) => {
                if cli.json {
                    report.push(serde_json::json!({
                        "name": doc.name,
                        "size": doc.size_bytes,
                        "type": doc.mime_type,
                        "text": doc.extracted_text,
                    }));
                } else {
                    println!(
                        "{} {} {}  {}",
                        coach_chat::file_icon(&doc.mime_type),
                        bold(&doc.name),
                        dim(&coach_chat::format_file_size(doc.size_bytes)),
                        dim(&format!("{} chars", doc.extracted_text.len()))
                    );
                    if !cli.quiet {
                        println!("{}\n", doc.extracted_text);
                    }
                }
            }
            Err(e) => {
                failed += 1;
                if cli.json {
                    report.push(serde_json::json!({
                        "name": e.file_name(),
                        "errors": e.messages(),
                    }));
                } else {
                    for line in e.messages() {
                        eprintln!("{} {}", red("✗"), line);
                    }
                }
            }
        }
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    }
    if failed > 0 {
        bail!("{failed} of {} files could not be extracted", paths.len());
    }
    Ok(())
}

fn print_entry(entry: &ChatEntry, assistant: &str, html: bool) {
    let who = match entry.speaker {
        Speaker::User => cyan("You"),
        Speaker::Assistant => green(assistant),
    };
    match &entry.body {
        EntryBody::Part { part, html: markup } if html => {
            println!("{} {}\n{}\n", bold(&who), dim(&format!("[{}]", part.kind)), markup);
        }
        EntryBody::Part { part, .. } => {
            println!("{} {}\n{}\n", bold(&who), dim(&format!("[{}]", part.kind)), part.text);
        }
        EntryBody::Notice { text } => println!("{}\n{}\n", bold(&who), red(text)),
        _ => println!("{}\n{}\n", bold(&who), entry.text()),
    }
}
