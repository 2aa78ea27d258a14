//! CLI entry point for `sendria`.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use humansize::{format_size, BINARY};
use serde::Serialize;

use sendria::config::Config;
use sendria::model::message::Message;
use sendria::model::part::Decomposition;
use sendria::model::recipient::Recipient;
use sendria::parser::eml::{self, EmlSummary};
use sendria::parser::mime::{self, DecodeOptions};

#[derive(Parser)]
#[command(
    name = "sendria",
    version,
    about = "Decompose captured emails the way the Sendria client does"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Maximum multipart nesting depth (overrides the config file)
    #[arg(long, global = true, value_name = "N")]
    max_depth: Option<usize>,

    /// Classify a single-part message with an attachment disposition as an attachment
    #[arg(long, global = true)]
    classify_single_part: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List the content parts and attachments of a raw message
    Parts {
        /// `.eml` file, or `-` for stdin
        path: PathBuf,
    },
    /// List or extract the attachments of a raw message
    Attachments {
        /// `.eml` file, or `-` for stdin
        path: PathBuf,
        /// Write the attachments into this directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Decompose the source of a message saved from the Sendria JSON API
    Inspect {
        /// `{id}.json` response body, or `-` for stdin
        path: PathBuf,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = sendria::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let mut options = config.decode;
    if let Some(depth) = cli.max_depth {
        options.max_depth = depth;
    }
    if cli.classify_single_part {
        options.classify_single_part = true;
    }

    match cli.command {
        Commands::Parts { path } => cmd_parts(&path, &options, cli.json),
        Commands::Attachments { path, output } => {
            cmd_attachments(&path, output.as_deref(), &options, cli.json)
        }
        Commands::Inspect { path } => cmd_inspect(&path, &options, cli.json),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = sendria::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "sendria.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Read a file, or stdin when `path` is `-`.
fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        return Ok(buf);
    }
    Ok(eml::read_eml(path)?)
}

#[derive(Serialize)]
struct PartsReport<'a> {
    summary: &'a EmlSummary,
    #[serde(flatten)]
    decomposition: &'a Decomposition,
}

fn cmd_parts(path: &Path, options: &DecodeOptions, json: bool) -> anyhow::Result<()> {
    let raw = read_input(path)?;
    let summary = eml::summarize(&raw)?;
    let decomposition = mime::decompose_bytes(&raw, options)?;

    if json {
        let report = PartsReport {
            summary: &summary,
            decomposition: &decomposition,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!("  {:<12} {}", "Subject", summary.subject);
    if let Some(from) = summary.from.first() {
        println!("  {:<12} {}", "From", from);
    }
    if let Some(date) = summary.date {
        println!("  {:<12} {}", "Date", date.format("%Y-%m-%d %H:%M"));
    }
    println!("  {:<12} {}", "Type", summary.content_type);
    print_decomposition(&decomposition);
    Ok(())
}

fn cmd_attachments(
    path: &Path,
    output: Option<&Path>,
    options: &DecodeOptions,
    json: bool,
) -> anyhow::Result<()> {
    let raw = read_input(path)?;
    let decomposition = mime::decompose_bytes(&raw, options)?;

    if let Some(dir) = output {
        let paths = sendria::export::attachment::save_all(&decomposition, dir)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&paths)?);
        } else {
            println!(
                "  Extracted {} attachment(s) to {}",
                paths.len(),
                dir.display()
            );
        }
        return Ok(());
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&decomposition.attachments)?
        );
    } else if decomposition.attachments.is_empty() {
        println!("  No attachments found.");
    } else {
        print_attachments(&decomposition);
    }
    Ok(())
}

fn cmd_inspect(path: &Path, options: &DecodeOptions, json: bool) -> anyhow::Result<()> {
    let body = read_input(path)?;
    let mut message: Message = sendria::api::wire::decode_message(&body)?;
    message.ensure_decomposed(options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&message)?);
        return Ok(());
    }

    println!();
    println!("  {:<12} {}", "Id", message.id);
    println!("  {:<12} {}", "Subject", message.subject);
    println!("  {:<12} {}", "From", recipients_line(&message.from));
    println!("  {:<12} {}", "To", recipients_line(&message.to));
    println!(
        "  {:<12} {}",
        "Received",
        message.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!("  {:<12} {}", "Size", format_size(message.size, BINARY));
    print_decomposition(&Decomposition {
        parts: message.parts,
        attachments: message.attachments,
    });
    Ok(())
}

fn recipients_line(list: &[Recipient]) -> String {
    list.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_decomposition(decomposition: &Decomposition) {
    println!();
    println!("  {} content part(s)", decomposition.parts.len());
    if !decomposition.parts.is_empty() {
        println!("  {:<4} {:<24} {:>10}  {}", "#", "Type", "Size", "Preview");
        println!("  {}", "-".repeat(80));
        for (i, part) in decomposition.parts.iter().enumerate() {
            let preview: String = part
                .body
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .chars()
                .take(36)
                .collect();
            println!(
                "  {:<4} {:<24} {:>10}  {}",
                i + 1,
                part.media_type,
                format_size(part.size, BINARY),
                preview
            );
        }
    }

    println!();
    println!("  {} attachment(s)", decomposition.attachments.len());
    if !decomposition.attachments.is_empty() {
        print_attachments(decomposition);
    }
    println!();
}

fn print_attachments(decomposition: &Decomposition) {
    println!(
        "  {:<4} {:<30} {:<24} {:>10}  {}",
        "#", "Filename", "Type", "Size", "CID"
    );
    println!("  {}", "-".repeat(90));
    for (i, att) in decomposition.attachments.iter().enumerate() {
        let name: String = att.filename.chars().take(29).collect();
        println!(
            "  {:<4} {:<30} {:<24} {:>10}  {}",
            i + 1,
            name,
            att.media_type,
            format_size(att.size, BINARY),
            att.content_id
        );
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "sendria", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
