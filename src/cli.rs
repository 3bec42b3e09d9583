use anyhow::Result;
use clap::Parser;
use lingo_shorts::chunk_builder::{self, FontSizes};
use lingo_shorts::config::RenderSettings;
use lingo_shorts::dialogue;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "chunk-builder",
    version,
    about = "Render lines.json over a background and a master audio track in chunks"
)]
struct Cli {
    /// `[[speaker, row1, row2, duration], ...]`
    lines_json: PathBuf,

    full_audio: PathBuf,

    bg_image: PathBuf,

    #[arg(long, default_value = "output/final.mp4")]
    out: PathBuf,

    /// Lines per rendered chunk.
    #[arg(long)]
    chunk: Option<usize>,

    /// Subtitle rows to draw (1 or 2).
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=2))]
    rows: u8,

    #[arg(long = "fsize-top")]
    fsize_top: Option<u32>,

    #[arg(long = "fsize-bot")]
    fsize_bot: Option<u32>,

    /// JSON file with `render` and `fonts` sections.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let mut settings = RenderSettings::load_or_default(cli.config.as_deref()).await?;
    if let Some(chunk) = cli.chunk {
        settings.render.chunk_size = chunk;
    }
    settings.render.validate()?;

    let defaults = FontSizes::from_settings(&settings);
    let sizes = FontSizes {
        primary: cli.fsize_top.unwrap_or(defaults.primary),
        secondary: cli.fsize_bot.unwrap_or(defaults.secondary),
    };

    let lines = dialogue::load_lines_file(&cli.lines_json).await?;
    let lines = dialogue::limit_rows(lines, cli.rows as usize);

    let made = chunk_builder::build_chunked_video(
        lines,
        &cli.full_audio,
        &cli.bg_image,
        &cli.out,
        &settings,
        sizes,
    )
    .await?;

    if !made {
        std::process::exit(1);
    }
    Ok(())
}
