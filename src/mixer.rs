use crate::config::MixConfig;
use crate::ffmpeg;
use crate::library::list_media;
use crate::{logi, logw};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Interleaved `f32` audio.
#[derive(Debug, Clone, PartialEq)]
pub struct Pcm {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl Pcm {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Truncates `track` to `frames`, or tiles it with whole repetitions plus a
/// partial remainder. An empty track becomes silence.
pub fn fit_to_length(track: &[f32], channels: u16, frames: usize) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    let target = frames * channels;
    let track = &track[..track.len() - track.len() % channels];
    if track.is_empty() {
        return vec![0.0; target];
    }
    if track.len() >= target {
        return track[..target].to_vec();
    }

    let mut out = Vec::with_capacity(target);
    for _ in 0..target / track.len() {
        out.extend_from_slice(track);
    }
    out.extend_from_slice(&track[..target % track.len()]);
    out
}

/// Sums `bed` into `speech` sample by sample, clipping to [-1, 1].
/// The result has exactly the speech length.
pub fn overlay(speech: &Pcm, bed: &[f32]) -> Pcm {
    let samples = speech
        .samples
        .iter()
        .enumerate()
        .map(|(i, s)| (s + bed.get(i).copied().unwrap_or(0.0)).clamp(-1.0, 1.0))
        .collect();
    Pcm {
        sample_rate: speech.sample_rate,
        channels: speech.channels,
        samples,
    }
}

/// Background is length-matched to the speech, attenuated by `gain_db`, then overlaid.
/// Both inputs must share sample rate and channel layout.
pub fn mix_pcm(speech: &Pcm, background: &Pcm, gain_db: f32) -> Pcm {
    let gain = db_to_gain(gain_db);
    let bed: Vec<f32> = fit_to_length(&background.samples, speech.channels, speech.frames())
        .into_iter()
        .map(|s| s * gain)
        .collect();
    overlay(speech, &bed)
}

#[async_trait]
pub trait NarrationMixer: Send + Sync {
    async fn available_tracks(&self) -> Result<usize>;

    /// Writes the narration track and returns its path; `None` when there is
    /// no background track to mix with.
    async fn mix(&self, speech_path: &Path) -> Result<Option<PathBuf>>;
}

pub struct BackgroundMixer {
    pool_dir: PathBuf,
    output_dir: PathBuf,
    cfg: MixConfig,
}

impl BackgroundMixer {
    pub fn new(pool_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, cfg: MixConfig) -> Self {
        Self {
            pool_dir: pool_dir.into(),
            output_dir: output_dir.into(),
            cfg,
        }
    }

    async fn tracks(&self) -> Result<Vec<PathBuf>> {
        let exts: Vec<&str> = self.cfg.extensions.iter().map(String::as_str).collect();
        list_media(&self.pool_dir, &exts).await
    }
}

#[async_trait]
impl NarrationMixer for BackgroundMixer {
    async fn available_tracks(&self) -> Result<usize> {
        Ok(self.tracks().await?.len())
    }

    async fn mix(&self, speech_path: &Path) -> Result<Option<PathBuf>> {
        let tracks = self.tracks().await?;
        let Some(track) = tracks.choose(&mut rand::thread_rng()).cloned() else {
            logw(format!("No background tracks in {}", self.pool_dir.display()));
            return Ok(None);
        };

        let speech = ffmpeg::decode_pcm(speech_path, self.cfg.sample_rate, self.cfg.channels).await?;
        let background = ffmpeg::decode_pcm(&track, self.cfg.sample_rate, self.cfg.channels).await?;
        logi(format!(
            "Mixing {} ({:.2}s) with {} ({:.2}s)",
            speech_path.display(),
            speech.duration_secs(),
            track.display(),
            background.duration_secs()
        ));

        let mixed = mix_pcm(&speech, &background, self.cfg.background_gain_db);

        fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("Failed to create dir {}", self.output_dir.display()))?;
        let file_name = speech_path
            .file_name()
            .with_context(|| format!("Speech path has no file name: {}", speech_path.display()))?;
        let out = self.output_dir.join(file_name);
        ffmpeg::encode_mp3(&mixed, &out, &self.cfg.bitrate).await?;
        Ok(Some(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mono(samples: Vec<f32>) -> Pcm {
        Pcm {
            sample_rate: 8_000,
            channels: 1,
            samples,
        }
    }

    #[test]
    fn longer_background_is_truncated() {
        let bed = fit_to_length(&[1.0, 2.0, 3.0, 4.0, 5.0], 1, 3);
        assert_eq!(bed, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn shorter_background_is_tiled_with_remainder() {
        let bed = fit_to_length(&[1.0, 2.0, 3.0], 1, 8);
        assert_eq!(bed, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0, 2.0]);
    }

    #[test]
    fn tiling_keeps_frames_together() {
        // stereo frames (L, R)
        let bed = fit_to_length(&[0.1, 0.2, 0.3, 0.4], 2, 3);
        assert_eq!(bed, vec![0.1, 0.2, 0.3, 0.4, 0.1, 0.2]);
    }

    #[test]
    fn empty_background_is_silence() {
        assert_eq!(fit_to_length(&[], 2, 2), vec![0.0; 4]);
    }

    #[test]
    fn minus_ten_db() {
        assert!((db_to_gain(-10.0) - 0.316_227_77).abs() < 1e-6);
        assert!((db_to_gain(0.0) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn overlay_clips_and_keeps_speech_length() {
        let speech = mono(vec![0.9, -0.9, 0.1]);
        let out = overlay(&speech, &[0.5, -0.5, 0.1, 0.7]);
        assert_eq!(out.samples, vec![1.0, -1.0, 0.2]);
    }

    #[test]
    fn mix_attenuates_background() {
        let speech = mono(vec![0.0; 4]);
        let background = mono(vec![1.0; 2]);
        let out = mix_pcm(&speech, &background, -10.0);
        for s in out.samples {
            assert!((s - db_to_gain(-10.0)).abs() < 1e-6);
        }
    }

    proptest! {
        #[test]
        fn mixed_duration_equals_speech_duration(
            speech_frames in 0usize..2_000,
            bg_frames in 0usize..700,
            channels in 1u16..3,
        ) {
            let speech = Pcm { sample_rate: 8_000, channels, samples: vec![0.1; speech_frames * channels as usize] };
            let background = Pcm { sample_rate: 8_000, channels, samples: vec![0.2; bg_frames * channels as usize] };
            let out = mix_pcm(&speech, &background, -10.0);
            prop_assert_eq!(out.frames(), speech.frames());
            prop_assert_eq!(out.duration_secs(), speech.duration_secs());
        }

        #[test]
        fn tiling_is_whole_copies_plus_prefix(
            bg in proptest::collection::vec(-1.0f32..1.0, 1..50),
            speech_frames in 0usize..400,
        ) {
            let bed = fit_to_length(&bg, 1, speech_frames);
            prop_assert_eq!(bed.len(), speech_frames);
            if bg.len() >= speech_frames {
                prop_assert_eq!(&bed[..], &bg[..speech_frames]);
            } else {
                let whole = speech_frames / bg.len();
                let rest = speech_frames % bg.len();
                for k in 0..whole {
                    prop_assert_eq!(&bed[k * bg.len()..(k + 1) * bg.len()], &bg[..]);
                }
                prop_assert_eq!(&bed[whole * bg.len()..], &bg[..rest]);
            }
        }
    }
}
