use quote_shorts::config::Paths;
use quote_shorts::library::Library;
use quote_shorts::metadata::VideoRecord;
use std::path::Path;

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
async fn video_lifecycle_keeps_files_and_records_in_step() {
    let dir = tempfile::tempdir().unwrap();
    let library = Library::new(paths_in(dir.path()));

    let clip = dir.path().join("waves.MP4");
    tokio::fs::write(&clip, b"video").await.unwrap();
    let template = library.import_template(&clip).await.unwrap();
    assert_eq!(library.templates().await.unwrap(), vec![template]);

    tokio::fs::create_dir_all(dir.path().join("output/videos")).await.unwrap();
    let video = library.video_path("Morning_2026-10-15.mp4");
    tokio::fs::write(&video, b"render").await.unwrap();
    let record = VideoRecord {
        title: "Morning".into(),
        description: "A quote".into(),
        hashtags: vec!["#quotes".into()],
        source_audio_file: "Author_A_2026-10-15_tts_audio.mp3".into(),
        source_video_template: "waves.MP4".into(),
        creation_date: "2026-10-15".into(),
    };
    library
        .video_store()
        .insert(video.display().to_string(), record.clone())
        .await
        .unwrap();

    assert_eq!(library.video_files().await.unwrap(), vec![video.clone()]);
    assert_eq!(library.video_record(&video).await.unwrap(), Some(record));

    assert!(library.delete_video("Morning_2026-10-15.mp4").await.unwrap());
    assert!(library.video_files().await.unwrap().is_empty());
    assert_eq!(library.video_record(&video).await.unwrap(), None);
    assert!(!library.delete_video("Morning_2026-10-15.mp4").await.unwrap());
}

#[tokio::test]
async fn reimport_replaces_template_of_same_name() {
    let dir = tempfile::tempdir().unwrap();
    let library = Library::new(paths_in(dir.path()));
    let clip = dir.path().join("sea.mp4");

    tokio::fs::write(&clip, b"first").await.unwrap();
    library.import_template(&clip).await.unwrap();
    tokio::fs::write(&clip, b"second").await.unwrap();
    let dest = library.import_template(&clip).await.unwrap();

    assert_eq!(library.templates().await.unwrap().len(), 1);
    assert_eq!(tokio::fs::read(dest).await.unwrap(), b"second");
}
