mod chat;
mod cli;
mod color;
mod config;
mod fallback;
mod json_reply;
mod logging;
mod providers;
mod registry;
mod utils;
mod version;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use cli::{
    bench::bench_cmd, chat::chat_cmd, generate::generate_cmd, ping::ping_cmd, status::status_cmd,
    ColorMode,
};

#[derive(Default, Clone, Copy, ValueEnum, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum RequestedColorMode {
    #[default]
    Auto,
    On,
    Off,
}

#[derive(Parser)]
#[command(name = "careerramp")]
#[command(
    about = "Talk to Gemini with automatic key and model fallback",
    version = version::VERSION
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    #[arg(long, global = true, default_value_t = RequestedColorMode::default())]
    color: RequestedColorMode,
    /// Read the configuration from this file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log more, can be repeated
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a chat
    Chat(ChatArgs),
    /// Generate a single reply
    Generate(GenerateArgs),
    /// Check that some model answers
    Ping,
    /// Show the configured models and keys
    Status(StatusArgs),
    /// Time every built-in model with the primary key
    Bench(BenchArgs),
}

#[derive(Parser, Default)]
pub(crate) struct ChatArgs {
    /// Instruct the model how to behave for the whole chat
    #[arg(short, long)]
    system: Option<String>,
    /// Enter interactive mode
    #[arg(short, long)]
    interactive: bool,
    /// Specify the initial prompt
    prompt: Option<String>,
}

#[derive(Parser)]
pub(crate) struct GenerateArgs {
    /// Upper bound on the length of the reply
    #[arg(long)]
    max_output_tokens: Option<u32>,
    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f64>,
    /// Extract the JSON object from the reply and print only that
    #[arg(long)]
    json: bool,
    /// The prompt, read from standard input if omitted
    prompt: Option<String>,
}

/// Output formats
#[derive(ValueEnum, Default, Clone, Copy, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub(crate) enum ListingFormat {
    /// Format the output as a table
    #[default]
    Table,
    /// Format the output as JSON
    Json,
    /// Format the output as a table without a header
    HeaderlessTable,
}

#[derive(Parser)]
pub(crate) struct StatusArgs {
    /// Output the status with the specified format
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
}

#[derive(Parser)]
pub(crate) struct BenchArgs {
    /// Pause between models, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pause_ms: u64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let color = ColorMode::resolve_auto(cli.color);

    color::configure_color(color);

    logging::init(cli.verbose, color);

    let config = match config::read_config(cli.config) {
        Ok(config) => config,
        Err(err) => die!("{}", err),
    };

    match &cli.command {
        Some(Commands::Chat(args)) => chat_cmd(&config, args).await,
        Some(Commands::Generate(args)) => generate_cmd(&config, args).await,
        Some(Commands::Ping) => ping_cmd(&config).await,
        Some(Commands::Status(args)) => status_cmd(&config, args),
        Some(Commands::Bench(args)) => bench_cmd(&config, args).await,
        None => chat_cmd(&config, &ChatArgs::default()).await,
    }
}
