//! Flat JSON key/record files describing generated artifacts.
//!
//! Saves are read-modify-write with no locking: two processes saving at once
//! race and the last writer's whole file wins.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioRecord {
    pub quote: String,
    pub author: String,
    #[serde(rename = "hindi_quote")]
    pub hindi_translation: String,
    #[serde(rename = "tts_text")]
    pub synthesized_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub title: String,
    pub description: String,
    pub hashtags: Vec<String>,
    #[serde(rename = "audio_file")]
    pub source_audio_file: String,
    #[serde(rename = "video_file")]
    pub source_video_template: String,
    #[serde(rename = "date_created")]
    pub creation_date: String,
}

pub type AudioStore = RecordStore<AudioRecord>;
pub type VideoStore = RecordStore<VideoRecord>;

pub struct RecordStore<R> {
    path: PathBuf,
    _record: PhantomData<fn() -> R>,
}

impl<R> RecordStore<R>
where
    R: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file reads as an empty mapping.
    pub async fn load(&self) -> Result<BTreeMap<String, R>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    /// Merges `entries` over the persisted mapping (last write wins per key)
    /// and rewrites the whole file.
    pub async fn save(&self, entries: BTreeMap<String, R>) -> Result<()> {
        let mut merged = self.load().await?;
        merged.extend(entries);
        self.write(&merged).await
    }

    pub async fn insert(&self, key: impl Into<String>, record: R) -> Result<()> {
        self.save(BTreeMap::from([(key.into(), record)])).await
    }

    /// Returns whether `key` was present.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let mut merged = self.load().await?;
        if merged.remove(key).is_none() {
            return Ok(false);
        }
        self.write(&merged).await?;
        Ok(true)
    }

    async fn write(&self, records: &BTreeMap<String, R>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create dir {}", parent.display()))?;
        }

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        records
            .serialize(&mut ser)
            .with_context(|| format!("Failed to serialize {}", self.path.display()))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &buf)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(quote: &str) -> AudioRecord {
        AudioRecord {
            quote: quote.to_string(),
            author: "Author A".to_string(),
            hindi_translation: "हिंदी".to_string(),
            synthesized_text: format!("Author A says \"{}\"", quote),
        }
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::new(dir.path().join("audio_metadata.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn later_save_wins_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::new(dir.path().join("audio_metadata.json"));

        store.insert("k", audio("v1")).await.unwrap();
        store.insert("other", audio("x")).await.unwrap();
        store.insert("k", audio("v2")).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["k"], audio("v2"));
        assert_eq!(loaded["other"], audio("x"));
    }

    #[tokio::test]
    async fn saving_same_entry_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::new(dir.path().join("a.json"));
        store.insert("k", audio("v")).await.unwrap();
        let first = tokio::fs::read_to_string(store.path()).await.unwrap();
        store.insert("k", audio("v")).await.unwrap();
        let second = tokio::fs::read_to_string(store.path()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn on_disk_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = VideoStore::new(dir.path().join("video_metadata.json"));
        store
            .insert(
                "output/videos/t_2026-10-15.mp4",
                VideoRecord {
                    title: "t".into(),
                    description: "d".into(),
                    hashtags: vec!["#a".into(), "#b".into()],
                    source_audio_file: "Author_A_2026-10-15_tts_audio.mp3".into(),
                    source_video_template: "sea.mp4".into(),
                    creation_date: "2026-10-15".into(),
                },
            )
            .await
            .unwrap();

        let raw = tokio::fs::read_to_string(store.path()).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let record = &value["output/videos/t_2026-10-15.mp4"];
        assert_eq!(record["audio_file"], "Author_A_2026-10-15_tts_audio.mp3");
        assert_eq!(record["video_file"], "sea.mp4");
        assert_eq!(record["date_created"], "2026-10-15");
        assert_eq!(record["hashtags"][1], "#b");
        assert!(raw.contains("\n        \"title\""));
    }

    #[tokio::test]
    async fn reads_files_written_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio_metadata.json");
        tokio::fs::write(
            &path,
            r#"{"x.mp3": {"quote": "q", "author": "a", "hindi_quote": "h", "tts_text": "t"}}"#,
        )
        .await
        .unwrap();
        let loaded = AudioStore::new(&path).load().await.unwrap();
        assert_eq!(loaded["x.mp3"].synthesized_text, "t");
    }

    #[tokio::test]
    async fn remove_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::new(dir.path().join("a.json"));
        store.insert("k", audio("v")).await.unwrap();
        assert!(store.remove("k").await.unwrap());
        assert!(!store.remove("k").await.unwrap());
        assert!(store.load().await.unwrap().is_empty());
    }
}
