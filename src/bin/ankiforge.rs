//! CLI binary for ankiforge.
//!
//! A thin shim over the library crate: `generate` maps flags to a
//! `GenerationRequest` and prints the deck as CSV, `chat` sends one message
//! to the tutor and keeps the history on disk.

use ankiforge::export::{to_csv, write_csv};
use ankiforge::notify::{FormState, Notifier, ToastId};
use ankiforge::pipeline::files::{validate_file_size, validate_file_type, ACCEPTED_MEDIA_TYPES};
use ankiforge::pipeline::input::resolve_input;
use ankiforge::retry::DEFAULT_MAX_DELAY_MS;
use ankiforge::{
    CardPipeline, CardType, ChatMessage, ChatSession, ChatTutor, ClientConfig, GenerationConfig,
    GenerationRequest, JsonFileStore, MessageStore, MistralClient, SafeStorage,
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
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

// ── Terminal notifier using indicatif ────────────────────────────────────────

/// Renders the loading notification as a spinner and terminal
/// notifications as coloured lines on stderr.
struct CliNotifier {
    spinner: Mutex<Option<(ToastId, ProgressBar)>>,
    show_progress: bool,
    quiet: bool,
}

impl CliNotifier {
    fn new(show_progress: bool, quiet: bool) -> Arc<Self> {
        Arc::new(Self {
            spinner: Mutex::new(None),
            show_progress,
            quiet,
        })
    }

    fn println(&self, line: String) {
        match self.spinner.lock().ok().and_then(|s| s.as_ref().map(|(_, b)| b.clone())) {
            Some(bar) => bar.println(line),
            None => eprintln!("{line}"),
        }
    }
}

impl Notifier for CliNotifier {
    fn loading(&self, message: &str) -> ToastId {
        let id = ToastId::next();
        if self.show_progress {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
            );
            bar.set_prefix("ankiforge");
            bar.set_message(format!("{message}…"));
            bar.enable_steady_tick(Duration::from_millis(80));
            if let Ok(mut slot) = self.spinner.lock() {
                *slot = Some((id.clone(), bar));
            }
        }
        id
    }

    fn success(&self, message: &str, _auto_close: Option<Duration>) {
        if !self.quiet {
            self.println(format!("{} {}", green("✔"), bold(message)));
        }
    }

    fn error(&self, message: &str) {
        self.println(format!("{} {}", red("✘"), red(message)));
    }

    fn dismiss(&self, id: &ToastId) {
        if let Ok(mut slot) = self.spinner.lock() {
            if slot.as_ref().is_some_and(|(open, _)| open == id) {
                if let Some((_, bar)) = slot.take() {
                    bar.finish_and_clear();
                }
            }
        }
    }
}

/// The CLI has no form; it only reports what the OCR step produced.
struct CliForm {
    quiet: bool,
}

impl FormState for CliForm {
    fn set_text_from_pdf(&self, text: &str) {
        if !self.quiet {
            eprintln!(
                "  {} {}",
                cyan("◆"),
                dim(&format!("extracted {} characters from the file", text.chars().count()))
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Five basic cards from typed text (CSV on stdout)
  ankiforge generate --text "毎朝コーヒーを飲みます"

  # Ten kanji cards from a textbook page, written to a file
  ankiforge generate lesson3.pdf --card-type kanji --cards 10 -o lesson3.csv

  # Cards from a photo, with kanji and furigana, JSON output
  ankiforge generate page.jpg --kanji --furigana --json

  # Talk to the tutor (history kept in ./.ankiforge)
  ankiforge chat "Give me a particle exercise" --name Aiko --exercise grammar --level N4

ENVIRONMENT VARIABLES:
  MISTRAL_API_KEY      Mistral API key (required)
  MISTRAL_BASE_URL     Override the API endpoint
  ANKIFORGE_ENV        production refuses test_ keys
  ANKIFORGE_STORE_DIR  Directory for tutor history
"#;

/// Generate Anki flashcards from text, images and PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "ankiforge",
    version,
    about = "Generate Anki flashcards for Japanese from text, images and PDFs",
    long_about = "Generate Anki flashcards for Japanese study from typed text, images and PDFs \
using Mistral OCR and schema-constrained generation, and practise with a chat tutor.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Mistral API key.
    #[arg(long, env = "MISTRAL_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Mistral API base URL.
    #[arg(long, env = "MISTRAL_BASE_URL", global = true)]
    base_url: Option<String>,

    /// HTTP timeout for every API call, in seconds.
    #[arg(long, env = "ANKIFORGE_API_TIMEOUT", default_value_t = 120, global = true)]
    api_timeout: u64,

    /// Chat model used for cards and the tutor.
    #[arg(long, env = "ANKIFORGE_MODEL", global = true)]
    model: Option<String>,

    /// Retries on HTTP 429.
    #[arg(long, env = "ANKIFORGE_MAX_RETRIES", default_value_t = 3, global = true)]
    max_retries: u32,

    /// Delay before the first retry, in milliseconds.
    #[arg(long, env = "ANKIFORGE_RETRY_BACKOFF_MS", default_value_t = 2000, global = true)]
    retry_backoff_ms: u64,

    /// Longest single retry delay, in milliseconds.
    /// Defaults to 30000, or the first-retry delay when that is larger.
    #[arg(long, env = "ANKIFORGE_MAX_BACKOFF_MS", global = true)]
    max_backoff_ms: Option<u64>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ANKIFORGE_VERBOSE", global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ANKIFORGE_QUIET", global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a deck from a file and/or typed text.
    Generate(GenerateArgs),
    /// Send one message to the Japanese tutor.
    Chat(ChatArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// PDF, PNG or JPEG file path, or HTTP/HTTPS URL.
    input: Option<String>,

    /// Text to build the cards from, with any instructions.
    #[arg(short, long)]
    text: Option<String>,

    /// Learner level, e.g. N5.
    #[arg(long, default_value = "N5")]
    level: String,

    /// Card layout.
    #[arg(long, value_enum, default_value = "basic")]
    card_type: CardTypeArg,

    /// Number of cards (1–15).
    #[arg(short = 'n', long = "cards", default_value_t = 5,
          value_parser = clap::value_parser!(u8).range(1..=15))]
    cards: u8,

    /// Include romaji.
    #[arg(long)]
    romanji: bool,

    /// Allow kanji.
    #[arg(long)]
    kanji: bool,

    /// Add furigana after kanji.
    #[arg(long)]
    furigana: bool,

    /// Write everything in Japanese.
    #[arg(long)]
    all_japanese: bool,

    /// Write CSV to this file instead of stdout.
    #[arg(short, long, env = "ANKIFORGE_OUTPUT")]
    output: Option<PathBuf>,

    /// Output the full outcome as JSON instead of CSV.
    #[arg(long)]
    json: bool,

    /// Disable the spinner.
    #[arg(long, env = "ANKIFORGE_NO_PROGRESS")]
    no_progress: bool,

    /// Largest accepted file, in megabytes.
    #[arg(long, default_value_t = 10)]
    max_file_size_mb: u64,
}

#[derive(Args, Debug)]
struct ChatArgs {
    /// Message to the tutor.
    message: String,

    /// Your name.
    #[arg(long)]
    name: Option<String>,

    /// Exercise type, e.g. grammar or vocabulary.
    #[arg(long)]
    exercise: Option<String>,

    /// Your level.
    #[arg(long)]
    level: Option<String>,

    /// Directory holding history and session.
    #[arg(long, env = "ANKIFORGE_STORE_DIR", default_value = ".ankiforge")]
    store_dir: PathBuf,

    /// Messages kept in the history.
    #[arg(long, env = "ANKIFORGE_MAX_MESSAGES", default_value_t = 50,
          value_parser = clap::value_parser!(u64).range(1..))]
    max_messages: u64,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum CardTypeArg {
    Basic,
    Kanji,
}

impl From<CardTypeArg> for CardType {
    fn from(v: CardTypeArg) -> Self {
        match v {
            CardTypeArg::Basic => CardType::Basic,
            CardTypeArg::Kanji => CardType::Kanji,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Keep library logs to warnings while the spinner is active; the
    // notifications carry what the user needs.
    let show_progress = match &cli.command {
        Command::Generate(args) => !cli.global.quiet && !args.no_progress && !args.json,
        Command::Chat(_) => false,
    };
    let filter = if cli.global.verbose {
        "debug"
    } else if cli.global.quiet {
        "error"
    } else if show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let client = build_client_config(&cli.global);
    let config = build_config(&cli.global)?;

    match cli.command {
        Command::Generate(args) => run_generate(args, &cli.global, &client, config, show_progress).await,
        Command::Chat(args) => run_chat(args, &client, config).await,
    }
}

fn build_client_config(global: &GlobalArgs) -> ClientConfig {
    let mut client = ClientConfig::from_env();
    if let Some(ref key) = global.api_key {
        client = client.with_api_key(key.clone());
    }
    if let Some(ref url) = global.base_url {
        client = client.with_base_url(url.clone());
    }
    client.timeout_secs = global.api_timeout;
    client
}

/// Map global flags to `GenerationConfig`.
fn build_config(global: &GlobalArgs) -> Result<GenerationConfig> {
    let mut builder = GenerationConfig::builder()
        .max_retries(global.max_retries)
        .retry_backoff_ms(global.retry_backoff_ms)
        .max_backoff_ms(
            global
                .max_backoff_ms
                .unwrap_or_else(|| DEFAULT_MAX_DELAY_MS.max(global.retry_backoff_ms)),
        );
    if let Some(ref model) = global.model {
        builder = builder.generation_model(model.clone());
    }
    builder.build().context("Invalid configuration")
}

async fn run_generate(
    args: GenerateArgs,
    global: &GlobalArgs,
    client: &ClientConfig,
    config: GenerationConfig,
    show_progress: bool,
) -> Result<()> {
    let config = GenerationConfig {
        max_file_size_mb: args.max_file_size_mb,
        ..config
    };
    let mut builder = GenerationRequest::builder()
        .level(args.level.clone())
        .card_type(args.card_type.clone().into())
        .number_of_cards(args.cards)
        .romanji(args.romanji)
        .kanji(args.kanji)
        .furigana(args.furigana)
        .all_japanese(args.all_japanese);
    if let Some(ref text) = args.text {
        builder = builder.text(text.clone());
    }

    if let Some(ref input) = args.input {
        let file = resolve_input(input, client.timeout_secs)
            .await
            .with_context(|| format!("Failed to read '{input}'"))?;
        validate_file_size(&file, config.max_file_size_mb).context("File rejected")?;
        if let Err(e) = validate_file_type(&file, ACCEPTED_MEDIA_TYPES) {
            if !global.quiet {
                eprintln!("{} {} {}", cyan("⚠"), e, dim("(no text will be extracted)"));
            }
        }
        builder = builder.file(file);
    }

    let request = builder.build().context("Invalid request")?;
    if !request.is_submittable() {
        anyhow::bail!("Nothing to generate from: pass a file or --text");
    }

    let notifier = CliNotifier::new(show_progress, global.quiet);
    let pipeline = CardPipeline::with_mistral(
        client,
        notifier,
        Arc::new(CliForm { quiet: global.quiet }),
        config,
    )
    .context("Failed to set up the Mistral client")?;

    let outcome = pipeline.generate_cards(request).await;

    if args.json {
        let json = serde_json::to_string_pretty(&outcome).context("Failed to serialise outcome")?;
        println!("{json}");
    } else if outcome.status == 200 {
        let rows = pipeline.rows();
        if let Some(ref path) = args.output {
            write_csv(path, &rows).await.context("Failed to write CSV")?;
            if !global.quiet {
                eprintln!(
                    "   {} cards  →  {}",
                    rows.len(),
                    bold(&path.display().to_string())
                );
            }
        } else {
            io::stdout()
                .lock()
                .write_all(to_csv(&rows).as_bytes())
                .context("Failed to write to stdout")?;
        }
    }

    if outcome.status != 200 {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_chat(args: ChatArgs, client: &ClientConfig, config: GenerationConfig) -> Result<()> {
    let config = GenerationConfig {
        message_capacity: args.max_messages as usize,
        ..config
    };
    let store = JsonFileStore::open(&args.store_dir)
        .with_context(|| format!("Failed to open store at {:?}", args.store_dir))?;
    let mut history = MessageStore::from_config(SafeStorage::new(Arc::new(store)), &config);

    let mut session: ChatSession = history.session().clone();
    if let Some(name) = args.name {
        session.name = name;
    }
    if let Some(exercise) = args.exercise {
        session.exercise_type = exercise;
    }
    if let Some(level) = args.level {
        session.level = level;
    }
    history.submit(session.clone());

    let mistral = MistralClient::new(client).context("Failed to set up the Mistral client")?;
    let tutor = ChatTutor::new(Arc::new(mistral), config);

    let prior = history.messages();
    let reply = tutor.reply(&args.message, &prior, &session).await;
    println!("{}", reply.message);

    history.append([ChatMessage::user(args.message), reply]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("ankiforge").chain(args.iter().copied()))
    }

    #[test]
    fn long_first_backoff_raises_the_ceiling() {
        let cli = parse(&["--retry-backoff-ms", "45000", "chat", "hi"]);
        let config = build_config(&cli.global).unwrap();
        assert_eq!(config.retry.base_delay_ms, 45_000);
        assert_eq!(config.retry.max_delay_ms, 45_000);
    }

    #[test]
    fn explicit_max_backoff_is_used() {
        let cli = parse(&["--max-backoff-ms", "60000", "chat", "hi"]);
        let config = build_config(&cli.global).unwrap();
        assert_eq!(config.retry.max_delay_ms, 60_000);
    }

    #[test]
    fn max_backoff_below_first_delay_is_rejected() {
        let cli = parse(&["--retry-backoff-ms", "5000", "--max-backoff-ms", "1000", "chat", "hi"]);
        assert!(build_config(&cli.global).is_err());
    }

    #[test]
    fn chat_history_size_must_be_positive() {
        let cli = parse(&["chat", "--max-messages", "10", "hi"]);
        match cli.command {
            Command::Chat(args) => assert_eq!(args.max_messages, 10),
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["ankiforge", "chat", "--max-messages", "0", "hi"]).is_err());
    }
}
