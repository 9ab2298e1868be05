use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use quote_shorts::config::Config;
use quote_shorts::generator::{VideoRequest, run_audio_generation, run_video_generation};
use quote_shorts::library::Library;
use quote_shorts::{init, platform, quote};

#[derive(Parser, Debug)]
#[command(name = "quote-shorts", about = "Hindi quote narrations and short videos")]
struct Args {
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, translate and narrate quotes over background music.
    Audio {
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=10))]
        count: u8,
    },
    /// Compose a narration track with a template video.
    Video {
        /// File name in the audio output directory.
        #[arg(long)]
        audio: String,
        /// File name in the template directory.
        #[arg(long)]
        template: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        /// Comma separated.
        #[arg(long)]
        hashtags: String,
        /// Burn the narration text into the video.
        #[arg(long)]
        captions: bool,
    },
    /// Show generated audio, templates and videos.
    List,
    /// Open a file with the default player.
    Play { kind: MediaKind, name: String },
    Delete { kind: OutputKind, name: String },
    /// Copy an .mp4 into the template pool.
    ImportTemplate { path: PathBuf },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MediaKind {
    Audio,
    Video,
    Template,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputKind {
    Audio,
    Video,
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn list(library: &Library) -> Result<()> {
    let audio_records = library.audio_store().load().await?;
    println!("Audio:");
    for path in library.audio_files().await? {
        let name = file_name(&path);
        match audio_records.get(&name) {
            Some(record) => println!("  {}  ({}: {})", name, record.author, record.quote),
            None => println!("  {}", name),
        }
    }

    println!("Templates:");
    for path in library.templates().await? {
        println!("  {}", file_name(&path));
    }

    println!("Videos:");
    for path in library.video_files().await? {
        match library.video_record(&path).await? {
            Some(record) => println!(
                "  {}  [{}] {} {}",
                file_name(&path),
                record.creation_date,
                record.title,
                record.hashtags.join(" ")
            ),
            None => println!("  {}", file_name(&path)),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config).await?;
    init::ensure_directories(&cfg.paths).await?;
    let library = Library::new(cfg.paths.clone());

    match args.command {
        Command::Audio { count } => {
            if !init::check_ffmpeg().await {
                tracing::warn!("FFmpeg not found in PATH. Please install FFmpeg.");
            }
            let report = run_audio_generation(&cfg, usize::from(count), &quote::today()).await?;
            for path in &report.produced {
                println!("{}", path.display());
            }
            if report.produced.is_empty() {
                std::process::exit(1);
            }
        }
        Command::Video {
            audio,
            template,
            title,
            description,
            hashtags,
            captions,
        } => {
            if !init::check_ffmpeg().await {
                tracing::warn!("FFmpeg not found in PATH. Please install FFmpeg.");
            }
            let req = VideoRequest {
                audio_file: audio,
                template,
                title,
                description,
                hashtags,
                captions,
            };
            let output = run_video_generation(&cfg, &req, &quote::today()).await?;
            println!("{}", output.display());
        }
        Command::List => list(&library).await?,
        Command::Play { kind, name } => {
            let path = match kind {
                MediaKind::Audio => library.audio_path(&name),
                MediaKind::Video => library.video_path(&name),
                MediaKind::Template => library.template_path(&name),
            };
            platform::open_path(path)?;
        }
        Command::Delete { kind, name } => {
            let deleted = match kind {
                OutputKind::Audio => library.delete_audio(&name).await?,
                OutputKind::Video => library.delete_video(&name).await?,
            };
            if deleted {
                println!("Deleted {}", name);
            } else {
                println!("{} not found", name);
            }
        }
        Command::ImportTemplate { path } => {
            let dest = library.import_template(&path).await?;
            println!("{}", dest.display());
        }
    }
    Ok(())
}
