use anyhow::Result;
use clap::Parser;
use lingo_shorts::config::Config;
use lingo_shorts::generator::{self, RunOptions};
use lingo_shorts::init;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "lingo-shorts",
    version,
    about = "Generate captioned two-speaker language-learning shorts"
)]
struct Cli {
    /// Conversation topic.
    topic: String,

    /// Exchanges between Alice and Bob (one turn = two lines).
    #[arg(long, default_value_t = 8)]
    turns: u32,

    /// Top subtitle row font size.
    #[arg(long = "fsize-top")]
    fsize_top: Option<u32>,

    /// Bottom subtitle row font size.
    #[arg(long = "fsize-bot")]
    fsize_bot: Option<u32>,

    /// Lines per rendered chunk.
    #[arg(long)]
    chunk: Option<usize>,

    #[arg(long, default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let cfg = Config::load(&cli.config).await?;
    init::ensure_directories(&cfg.dirs).await?;

    if !init::check_ffmpeg().await {
        tracing::warn!("FFmpeg/ffprobe not found in PATH. Please install FFmpeg.");
    }

    let opts = RunOptions {
        topic: cli.topic,
        turns: cli.turns,
        font_size_top: cli.fsize_top,
        font_size_bottom: cli.fsize_bot,
        chunk_size: cli.chunk,
    };

    let produced = generator::run_all(&cfg, &opts).await?;
    if produced < cfg.combos.len() {
        std::process::exit(1);
    }
    Ok(())
}
