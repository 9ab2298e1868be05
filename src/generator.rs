use crate::api::translate::{GoogleTranslator, Translator};
use crate::api::webdriver::WebDriver;
use crate::api::zenquotes::{QuoteSource, ZenQuotes};
use crate::browser::BrowserSession;
use crate::composer;
use crate::config::Config;
use crate::error::{ItemError, PipelineError};
use crate::library::{Library, list_media};
use crate::metadata::{AudioRecord, AudioStore, VideoRecord};
use crate::mixer::{BackgroundMixer, NarrationMixer};
use crate::speech::{AudioDownloader, HttpDownloader, SpeechSynthesizer};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Outcome of an audio batch. Failed items do not stop the batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub produced: Vec<PathBuf>,
    pub failures: Vec<(usize, ItemError)>,
}

/// Files one batch created and therefore may remove.
#[derive(Debug, Default)]
struct StagedFiles(Vec<PathBuf>);

impl StagedFiles {
    fn push(&mut self, path: PathBuf) {
        self.0.push(path);
    }

    async fn cleanup(self) {
        for path in self.0 {
            match fs::remove_file(&path).await {
                Ok(()) => logi(format!("Removed staged file {}", path.display())),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => logw(format!("Could not remove {}: {}", path.display(), err)),
            }
        }
    }
}

pub struct AudioPipeline<Q, T, M> {
    pub quotes: Q,
    pub translator: T,
    pub mixer: M,
    pub store: AudioStore,
    pub staging_dir: PathBuf,
    /// `YYYY-MM-DD` stamped into file names.
    pub date: String,
}

impl<Q, T, M> AudioPipeline<Q, T, M>
where
    Q: QuoteSource,
    T: Translator,
    M: NarrationMixer,
{
    /// Produces up to `count` narration tracks. Staged speech files are
    /// removed when the batch ends, including when it ends in an error.
    pub async fn run<S, D>(
        &self,
        synth: &mut SpeechSynthesizer<S, D>,
        count: usize,
    ) -> Result<BatchReport>
    where
        S: BrowserSession,
        D: AudioDownloader,
    {
        let mut staged = StagedFiles::default();
        let result = self.run_items(synth, count, &mut staged).await;
        staged.cleanup().await;
        result
    }

    async fn run_items<S, D>(
        &self,
        synth: &mut SpeechSynthesizer<S, D>,
        count: usize,
        staged: &mut StagedFiles,
    ) -> Result<BatchReport>
    where
        S: BrowserSession,
        D: AudioDownloader,
    {
        fs::create_dir_all(&self.staging_dir)
            .await
            .with_context(|| format!("Failed to create dir {}", self.staging_dir.display()))?;

        let mut report = BatchReport::default();
        for index in 1..=count {
            logi(format!("Generating audio for quote {}/{}...", index, count));
            match self.generate_one(synth, staged).await? {
                Ok(path) => {
                    logok(format!("Audio for quote {} generated: {}", index, path.display()));
                    report.produced.push(path);
                }
                Err(err) => {
                    logw(format!("Quote {} failed: {}", index, err));
                    report.failures.push((index, err));
                }
            }
        }

        logi(format!(
            "Batch done: {} produced, {} failed",
            report.produced.len(),
            report.failures.len()
        ));
        Ok(report)
    }

    /// Outer error: I/O, aborts the batch. Inner error: this item only.
    async fn generate_one<S, D>(
        &self,
        synth: &mut SpeechSynthesizer<S, D>,
        staged: &mut StagedFiles,
    ) -> Result<std::result::Result<PathBuf, ItemError>>
    where
        S: BrowserSession,
        D: AudioDownloader,
    {
        let Some(quote) = self.quotes.fetch_quote().await else {
            return Ok(Err(ItemError::QuoteUnavailable));
        };
        logi(format!("Quote by {}: {}", quote.author, quote.text));

        let hindi = match self.translator.translate(&quote.text).await {
            Ok(hindi) => hindi,
            Err(err) => return Ok(Err(ItemError::Translation(err))),
        };
        let tts_text = quote.narration(&hindi);

        let Some(audio) = synth.synthesize(&tts_text).await else {
            return Ok(Err(ItemError::SynthesisFailed));
        };

        let file_name = quote.audio_file_name(&self.date);
        let speech_path = self.staging_dir.join(&file_name);
        fs::write(&speech_path, &audio)
            .await
            .with_context(|| format!("Failed to write {}", speech_path.display()))?;
        staged.push(speech_path.clone());

        let mixed = match self.mixer.mix(&speech_path).await {
            Ok(Some(path)) => path,
            Ok(None) => return Ok(Err(ItemError::NoBackgroundTracks)),
            Err(err) => return Ok(Err(ItemError::Mix(err))),
        };

        self.store
            .insert(
                file_name,
                AudioRecord {
                    quote: quote.text,
                    author: quote.author,
                    hindi_translation: hindi,
                    synthesized_text: tts_text,
                },
            )
            .await?;
        Ok(Ok(mixed))
    }
}

/// Generates `count` narration tracks with the live quote API, translator,
/// browser and ffmpeg. The browser session is always closed afterwards.
pub async fn run_audio_generation(cfg: &Config, count: usize, date: &str) -> Result<BatchReport> {
    let mixer = BackgroundMixer::new(
        &cfg.paths.background_dir,
        &cfg.paths.audio_output_dir,
        cfg.mix.clone(),
    );
    if mixer.available_tracks().await? == 0 {
        return Err(PipelineError::NoBackgroundTracks(cfg.paths.background_dir.clone()).into());
    }

    let client = reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .context("Failed to build HTTP client")?;

    let pipeline = AudioPipeline {
        quotes: ZenQuotes::new(client.clone(), &cfg.quotes.api_url),
        translator: GoogleTranslator::new(client.clone(), cfg.translate.clone()),
        mixer,
        store: AudioStore::new(&cfg.paths.audio_metadata),
        staging_dir: cfg.paths.staging_dir.clone(),
        date: date.to_string(),
    };

    let session = WebDriver::start(client.clone(), &cfg.browser).await?;
    let downloader = HttpDownloader::new(client, &cfg.synth);
    let synth = SpeechSynthesizer::new(session, downloader, cfg.synth.clone())?;

    run_and_close(&pipeline, synth, count).await
}

/// Runs one batch and then quits the synthesizer's browser session, whether
/// the batch succeeded or not.
pub async fn run_and_close<Q, T, M, S, D>(
    pipeline: &AudioPipeline<Q, T, M>,
    mut synth: SpeechSynthesizer<S, D>,
    count: usize,
) -> Result<BatchReport>
where
    Q: QuoteSource,
    T: Translator,
    M: NarrationMixer,
    S: BrowserSession,
    D: AudioDownloader,
{
    let result = pipeline.run(&mut synth, count).await;
    let session = synth.into_session();
    if let Err(err) = session.quit().await {
        logw(format!("Failed to close browser session: {:#}", err));
    }
    result
}

#[derive(Debug, Clone)]
pub struct VideoRequest {
    /// File name inside the audio output directory.
    pub audio_file: String,
    /// File name inside the template pool.
    pub template: String,
    pub title: String,
    pub description: String,
    /// Comma separated.
    pub hashtags: String,
    pub captions: bool,
}

pub fn parse_hashtags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

fn video_file_name(title: &str, date: &str) -> String {
    let safe: String = title
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    format!("{}_{}.mp4", safe, date)
}

fn validate(req: &VideoRequest) -> std::result::Result<Vec<String>, PipelineError> {
    if req.title.trim().is_empty() {
        return Err(PipelineError::MissingField("title"));
    }
    if req.description.trim().is_empty() {
        return Err(PipelineError::MissingField("description"));
    }
    let hashtags = parse_hashtags(&req.hashtags);
    if hashtags.is_empty() {
        return Err(PipelineError::MissingField("hashtags"));
    }
    Ok(hashtags)
}

async fn captions_for(library: &Library, audio_file: &str) -> Result<Vec<String>> {
    let records = library.audio_store().load().await?;
    Ok(records
        .into_iter()
        .filter(|(key, _)| key.contains(audio_file))
        .map(|(_, record)| record.synthesized_text)
        .collect())
}

/// Composes one narration track with one template and records the result.
pub async fn run_video_generation(cfg: &Config, req: &VideoRequest, date: &str) -> Result<PathBuf> {
    let hashtags = validate(req)?;
    let library = Library::new(cfg.paths.clone());

    if list_media(&cfg.paths.templates_dir, &["mp4"]).await?.is_empty() {
        return Err(PipelineError::NoTemplates(cfg.paths.templates_dir.clone()).into());
    }
    let audio_path = library.audio_path(&req.audio_file);
    if !is_file(&audio_path).await {
        return Err(PipelineError::AudioNotFound(audio_path).into());
    }
    let template_path = library.template_path(&req.template);
    if !is_file(&template_path).await {
        return Err(PipelineError::TemplateNotFound(template_path).into());
    }

    let captions = if req.captions {
        let captions = captions_for(&library, &req.audio_file).await?;
        if captions.is_empty() {
            logw(format!("No caption text recorded for {}", req.audio_file));
        }
        captions
    } else {
        Vec::new()
    };

    let output = library.video_path(&video_file_name(&req.title, date));
    logi(format!(
        "Composing {} + {} -> {}",
        template_path.display(),
        audio_path.display(),
        output.display()
    ));
    let output = composer::compose(&cfg.video, &template_path, &audio_path, &output, &captions).await?;

    library
        .video_store()
        .insert(
            output.display().to_string(),
            VideoRecord {
                title: req.title.trim().to_string(),
                description: req.description.trim().to_string(),
                hashtags,
                source_audio_file: req.audio_file.clone(),
                source_video_template: req.template.clone(),
                creation_date: date.to_string(),
            },
        )
        .await?;
    logok(format!("Video '{}' created: {}", req.title.trim(), output.display()));
    Ok(output)
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}
