use crate::config::VideoConfig;
use crate::ffmpeg;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

const DEFAULT_FONT_SIZE: i32 = 48;

/// How the template is stretched over the narration. The output always
/// lasts exactly as long as the narration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositionPlan {
    pub duration: f64,
    pub loop_template: bool,
}

pub fn plan(template_secs: f64, narration_secs: f64) -> CompositionPlan {
    CompositionPlan {
        duration: narration_secs,
        loop_template: template_secs < narration_secs,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionWindow {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Back-to-back windows of `secs` each, in caption order.
pub fn caption_windows(captions: &[String], secs: f64) -> Vec<CaptionWindow> {
    captions
        .iter()
        .enumerate()
        .map(|(i, text)| CaptionWindow {
            start: i as f64 * secs,
            end: (i + 1) as f64 * secs,
            text: text.clone(),
        })
        .collect()
}

/// First font file that exists: the preferred one, then the fallbacks.
pub fn resolve_font(preferred: &Path, fallbacks: &[PathBuf]) -> Option<PathBuf> {
    std::iter::once(preferred)
        .chain(fallbacks.iter().map(PathBuf::as_path))
        .find(|p| p.is_file())
        .map(Path::to_path_buf)
}

fn quote_filter_value(value: &str) -> String {
    format!("'{}'", value.replace('\\', "/").replace('\'', "'\\''"))
}

/// One `drawtext` per caption, centered, each enabled only inside its window.
pub fn caption_filter(
    windows: &[CaptionWindow],
    text_files: &[PathBuf],
    font: Option<&Path>,
    font_size: i32,
) -> String {
    let draws: Vec<String> = windows
        .iter()
        .zip(text_files)
        .map(|(window, file)| {
            let mut opts = Vec::new();
            if let Some(font) = font {
                opts.push(format!("fontfile={}", quote_filter_value(&font.display().to_string())));
            }
            opts.push(format!("textfile={}", quote_filter_value(&file.display().to_string())));
            opts.push("expansion=none".to_string());
            opts.push(format!("fontsize={}", font_size));
            opts.push("fontcolor=white".to_string());
            opts.push("borderw=3".to_string());
            opts.push("bordercolor=black".to_string());
            opts.push("line_spacing=8".to_string());
            opts.push("x=(w-text_w)/2".to_string());
            opts.push("y=(h-text_h)/2".to_string());
            opts.push(format!(
                "enable='gte(t,{:.3})*lt(t,{:.3})'",
                window.start, window.end
            ));
            format!("drawtext={}", opts.join(":"))
        })
        .collect();

    format!("[0:v]{}[v]", draws.join(","))
}

pub fn render_args(
    cfg: &VideoConfig,
    video_path: &Path,
    audio_path: &Path,
    output_path: &Path,
    plan: &CompositionPlan,
    filter: Option<&str>,
) -> Vec<String> {
    let mut args = vec![
        "ffmpeg".to_string(),
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
    ];
    if plan.loop_template {
        args.push("-stream_loop".to_string());
        args.push("-1".to_string());
    }
    args.extend([
        "-i".to_string(),
        video_path.display().to_string(),
        "-i".to_string(),
        audio_path.display().to_string(),
    ]);

    match filter {
        Some(filter) => args.extend([
            "-filter_complex".to_string(),
            filter.to_string(),
            "-map".to_string(),
            "[v]".to_string(),
        ]),
        None => args.extend(["-map".to_string(), "0:v:0".to_string()]),
    }

    args.extend([
        "-map".to_string(),
        "1:a:0".to_string(),
        "-t".to_string(),
        format!("{:.3}", plan.duration),
        "-c:v".to_string(),
        cfg.video_codec.clone(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-preset".to_string(),
        cfg.preset.clone(),
        "-crf".to_string(),
        cfg.crf.to_string(),
        "-c:a".to_string(),
        cfg.audio_codec.clone(),
        "-b:a".to_string(),
        cfg.audio_bitrate.clone(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output_path.display().to_string(),
    ]);
    args
}

/// Loops or cuts `video_path` to the narration length, attaches the narration,
/// burns in `captions` and renders to `output_path`.
pub async fn compose(
    cfg: &VideoConfig,
    video_path: &Path,
    audio_path: &Path,
    output_path: &Path,
    captions: &[String],
) -> Result<PathBuf> {
    let template_secs = ffmpeg::ffprobe_duration_seconds(video_path)
        .await
        .with_context(|| format!("Unreadable template video {}", video_path.display()))?;
    let narration_secs = ffmpeg::ffprobe_duration_seconds(audio_path)
        .await
        .with_context(|| format!("Unreadable narration {}", audio_path.display()))?;
    let plan = plan(template_secs, narration_secs);
    logi(format!(
        "Template {:.2}s, narration {:.2}s => {:.2}s{}",
        template_secs,
        narration_secs,
        plan.duration,
        if plan.loop_template { " (looped)" } else { "" }
    ));

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create dir {}", parent.display()))?;
    }

    // caption text files must outlive the render
    let scratch = tempfile::tempdir().context("Failed to create caption scratch dir")?;
    let filter = if captions.is_empty() {
        None
    } else {
        let windows = caption_windows(captions, cfg.caption_secs);
        let mut files = Vec::with_capacity(windows.len());
        for (i, window) in windows.iter().enumerate() {
            let file = scratch.path().join(format!("caption_{}.txt", i));
            fs::write(&file, &window.text).await?;
            files.push(file);
        }

        let font = resolve_font(&cfg.preferred_font, &cfg.fallback_fonts);
        if font.is_none() {
            logw("No caption font found; using ffmpeg's default font.");
        }
        let font_size = match ffmpeg::ffprobe_video_dimensions(video_path).await {
            Ok((_w, h)) => (h / 24).max(16),
            Err(_) => DEFAULT_FONT_SIZE,
        };
        Some(caption_filter(&windows, &files, font.as_deref(), font_size))
    };

    let args = render_args(cfg, video_path, audio_path, output_path, &plan, filter.as_deref());
    logi(format!("Rendering video -> {}", output_path.display()));
    ffmpeg::run_cmd(&args).await?;
    if !output_path.exists() {
        anyhow::bail!("Renderer produced no file at {}", output_path.display());
    }
    logok(format!("Rendered {}", output_path.display()));
    Ok(output_path.to_path_buf())
}
