use crate::mixer::Pcm;
use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Runs `args[0]` with the rest as arguments; a non-zero exit carries stderr.
pub async fn run_cmd(args: &[String]) -> Result<()> {
    let Some((program, rest)) = args.split_first() else {
        return Ok(());
    };

    let output = Command::new(program)
        .args(rest)
        .stdin(Stdio::null())
        .output()
        .await
        .with_context(|| format!("Failed to start {}", program))?;
    if !output.status.success() {
        let err = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("{} exited with {}: {}", program, output.status, err.trim());
    }
    Ok(())
}

async fn probe(path: &Path, entries: &[&str]) -> Result<String> {
    let output = Command::new("ffprobe")
        .args(["-v", "error"])
        .args(entries)
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .await
        .context("ffprobe execution failed")?;
    if !output.status.success() {
        anyhow::bail!("ffprobe could not read {}", path.display());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn parse_dimensions(text: &str) -> Option<(i32, i32)> {
    let (w, h) = text.lines().next()?.split_once('x')?;
    let (w, h) = (w.trim().parse::<i32>().ok()?, h.trim().parse::<i32>().ok()?);
    (w > 0 && h > 0).then_some((w, h))
}

fn parse_duration(text: &str) -> Option<f64> {
    text.lines()
        .next()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.1)
}

pub async fn ffprobe_video_dimensions(path: &Path) -> Result<(i32, i32)> {
    let text = probe(
        path,
        &["-select_streams", "v:0", "-show_entries", "stream=width,height", "-of", "csv=s=x:p=0"],
    )
    .await?;
    parse_dimensions(&text).with_context(|| format!("No video dimensions in {}", path.display()))
}

/// Container duration. Anything at or below 0.1 s counts as unreadable.
pub async fn ffprobe_duration_seconds(path: &Path) -> Result<f64> {
    let text = probe(
        path,
        &["-show_entries", "format=duration", "-of", "default=noprint_wrappers=1:nokey=1"],
    )
    .await?;
    parse_duration(&text).with_context(|| format!("No usable duration in {}", path.display()))
}

/// Decodes any audio file to interleaved `f32` samples at the given layout.
pub async fn decode_pcm(path: &Path, sample_rate: u32, channels: u16) -> Result<Pcm> {
    let ac = channels.to_string();
    let ar = sample_rate.to_string();
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            ac.as_str(),
            "-ar",
            ar.as_str(),
            "pipe:1",
        ])
        .stdin(Stdio::null())
        .output()
        .await
        .with_context(|| format!("ffmpeg decode failed: {}", path.display()))?;

    if !output.status.success() {
        let err = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("ffmpeg could not decode {}: {}", path.display(), err.trim());
    }

    Ok(Pcm {
        sample_rate,
        channels,
        samples: samples_from_le_bytes(&output.stdout),
    })
}

/// Encodes `pcm` to an MP3 file at `out_mp3`.
pub async fn encode_mp3(pcm: &Pcm, out_mp3: &Path, bitrate: &str) -> Result<()> {
    let ac = pcm.channels.to_string();
    let ar = pcm.sample_rate.to_string();
    let mut child = Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-loglevel", "error", "-f", "f32le"])
        .args(["-ar", ar.as_str(), "-ac", ac.as_str()])
        .args(["-i", "pipe:0", "-c:a", "libmp3lame", "-b:a", bitrate])
        .arg(out_mp3)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .spawn()
        .context("Failed to spawn ffmpeg encoder")?;

    let mut stdin = child.stdin.take().context("ffmpeg stdin unavailable")?;
    stdin
        .write_all(&samples_to_le_bytes(&pcm.samples))
        .await
        .context("Failed to stream samples to ffmpeg")?;
    drop(stdin);

    let status = child.wait().await.context("ffmpeg encoder did not finish")?;
    if !status.success() {
        anyhow::bail!("ffmpeg failed to encode {}", out_mp3.display());
    }
    Ok(())
}

fn samples_from_le_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn samples_to_le_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
