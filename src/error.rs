use std::path::PathBuf;
use thiserror::Error;

/// Why a single batch item produced nothing. The batch moves on to the next item.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("failed to fetch a quote")]
    QuoteUnavailable,
    #[error("translation failed: {0:#}")]
    Translation(anyhow::Error),
    #[error("speech synthesis returned no audio")]
    SynthesisFailed,
    #[error("no background tracks available")]
    NoBackgroundTracks,
    #[error("mixing failed: {0:#}")]
    Mix(anyhow::Error),
}

/// Errors surfaced to the user for a whole action.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("please fill the {0} field")]
    MissingField(&'static str),
    #[error("no background tracks found in {}", .0.display())]
    NoBackgroundTracks(PathBuf),
    #[error("no template videos found in {}", .0.display())]
    NoTemplates(PathBuf),
    #[error("audio file {} does not exist", .0.display())]
    AudioNotFound(PathBuf),
    #[error("template video {} does not exist", .0.display())]
    TemplateNotFound(PathBuf),
    #[error("{} is not an .mp4 file", .0.display())]
    UnsupportedTemplate(PathBuf),
}
