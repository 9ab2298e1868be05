use crate::config::Paths;
use crate::error::PipelineError;
use crate::metadata::{AudioStore, VideoRecord, VideoStore};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

/// Files directly inside `dir` whose extension matches one of `exts`
/// (case-insensitive), sorted by name. A missing directory lists as empty.
pub async fn list_media(dir: &Path, exts: &[&str]) -> Result<Vec<PathBuf>> {
    if !fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(OsStr::to_str)
            .map(|ext| exts.iter().any(|want| want.trim_start_matches('.').eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if matches {
            out.push(path.to_path_buf());
        }
    }
    Ok(out)
}

/// Removes `path` if it exists. A missing file is `Ok(false)`, not an error.
/// Metadata is left untouched.
pub async fn delete_file(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("Failed to delete {}", path.display())),
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Generated and template media plus their records.
pub struct Library {
    paths: Paths,
    audio_store: AudioStore,
    video_store: VideoStore,
}

impl Library {
    pub fn new(paths: Paths) -> Self {
        let audio_store = AudioStore::new(&paths.audio_metadata);
        let video_store = VideoStore::new(&paths.video_metadata);
        Self {
            paths,
            audio_store,
            video_store,
        }
    }

    pub fn audio_store(&self) -> &AudioStore {
        &self.audio_store
    }

    pub fn video_store(&self) -> &VideoStore {
        &self.video_store
    }

    pub async fn audio_files(&self) -> Result<Vec<PathBuf>> {
        list_media(&self.paths.audio_output_dir, &["mp3"]).await
    }

    pub async fn video_files(&self) -> Result<Vec<PathBuf>> {
        list_media(&self.paths.video_output_dir, &["mp4"]).await
    }

    pub async fn templates(&self) -> Result<Vec<PathBuf>> {
        list_media(&self.paths.templates_dir, &["mp4"]).await
    }

    pub fn audio_path(&self, name: &str) -> PathBuf {
        self.paths.audio_output_dir.join(name)
    }

    pub fn video_path(&self, name: &str) -> PathBuf {
        self.paths.video_output_dir.join(name)
    }

    pub fn template_path(&self, name: &str) -> PathBuf {
        self.paths.templates_dir.join(name)
    }

    /// Video records are keyed by output path.
    pub async fn video_record(&self, path: &Path) -> Result<Option<VideoRecord>> {
        let mut records = self.video_store.load().await?;
        Ok(records.remove(&path.display().to_string()))
    }

    /// Deletes a generated narration track and prunes its record.
    pub async fn delete_audio(&self, name: &str) -> Result<bool> {
        let deleted = delete_file(&self.audio_path(name)).await?;
        if self.audio_store.remove(name).await? {
            logi(format!("Pruned audio record {}", name));
        }
        Ok(deleted)
    }

    /// Deletes a generated video and prunes its record.
    pub async fn delete_video(&self, name: &str) -> Result<bool> {
        let path = self.video_path(name);
        let deleted = delete_file(&path).await?;
        if self.video_store.remove(&path.display().to_string()).await? {
            logi(format!("Pruned video record {}", path.display()));
        }
        Ok(deleted)
    }

    /// Copies an `.mp4` into the template pool, replacing a template of the same name.
    pub async fn import_template(&self, src: &Path) -> Result<PathBuf> {
        let is_mp4 = src
            .extension()
            .and_then(OsStr::to_str)
            .map(|ext| ext.eq_ignore_ascii_case("mp4"))
            .unwrap_or(false);
        if !is_mp4 {
            return Err(PipelineError::UnsupportedTemplate(src.to_path_buf()).into());
        }

        fs::create_dir_all(&self.paths.templates_dir)
            .await
            .with_context(|| format!("Failed to create dir {}", self.paths.templates_dir.display()))?;
        let dest = self.template_path(&file_name_of(src));
        if fs::metadata(&dest).await.is_ok() {
            logw(format!("Replacing existing template {}", dest.display()));
        }
        fs::copy(src, &dest)
            .await
            .with_context(|| format!("Failed to copy {} to {}", src.display(), dest.display()))?;
        logok(format!("Imported template {}", dest.display()));
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::AudioRecord;

    fn paths_in(root: &Path) -> Paths {
        Paths {
            background_dir: root.join("audios"),
            templates_dir: root.join("videos"),
            audio_output_dir: root.join("output/audios"),
            video_output_dir: root.join("output/videos"),
            staging_dir: root.join("staging"),
            audio_metadata: root.join("audio_metadata.json"),
            video_metadata: root.join("video_metadata.json"),
        }
    }

    #[tokio::test]
    async fn deleting_missing_file_is_false() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!delete_file(&dir.path().join("nope.mp3")).await.unwrap());
    }

    #[tokio::test]
    async fn deleted_file_leaves_listing() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp3");
        let b = dir.path().join("b.MP3");
        tokio::fs::write(&a, b"a").await.unwrap();
        tokio::fs::write(&b, b"b").await.unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), b"x").await.unwrap();

        assert_eq!(list_media(dir.path(), &["mp3"]).await.unwrap(), vec![a.clone(), b.clone()]);
        assert!(delete_file(&a).await.unwrap());
        assert_eq!(list_media(dir.path(), &[".mp3"]).await.unwrap(), vec![b]);
    }

    #[tokio::test]
    async fn missing_directory_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_media(&dir.path().join("gone"), &["mp4"]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_audio_prunes_record() {
        let dir = tempfile::tempdir().unwrap();
        let library = Library::new(paths_in(dir.path()));
        tokio::fs::create_dir_all(dir.path().join("output/audios")).await.unwrap();
        tokio::fs::write(library.audio_path("x.mp3"), b"mp3").await.unwrap();
        library
            .audio_store()
            .insert(
                "x.mp3",
                AudioRecord {
                    quote: "q".into(),
                    author: "a".into(),
                    hindi_translation: "h".into(),
                    synthesized_text: "t".into(),
                },
            )
            .await
            .unwrap();

        assert!(library.delete_audio("x.mp3").await.unwrap());
        assert!(library.audio_files().await.unwrap().is_empty());
        assert!(library.audio_store().load().await.unwrap().is_empty());
        assert!(!library.delete_audio("x.mp3").await.unwrap());
    }

    #[tokio::test]
    async fn import_only_accepts_mp4() {
        let dir = tempfile::tempdir().unwrap();
        let library = Library::new(paths_in(dir.path()));
        let clip = dir.path().join("sea.mp4");
        let notes = dir.path().join("sea.txt");
        tokio::fs::write(&clip, b"video").await.unwrap();
        tokio::fs::write(&notes, b"text").await.unwrap();

        let dest = library.import_template(&clip).await.unwrap();
        assert_eq!(dest, library.template_path("sea.mp4"));
        assert_eq!(library.templates().await.unwrap(), vec![dest]);

        let err = library.import_template(&notes).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::UnsupportedTemplate(_))
        ));
    }
}
