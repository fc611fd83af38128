//! Async API tests (requires `async` feature)
#![cfg(feature = "async")]

use ripple_unzip::r#async::{ripple_unzip, AsyncEngine};
use ripple_unzip::{CancelToken, Engine, Error};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

// ============================================================================
// Helper functions
// ============================================================================

fn create_simple_zip(filename: &str, content: &[u8]) -> Vec<u8> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buffer);
        let options: zip::write::FileOptions<()> =
            zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        zip.start_file(filename, options).unwrap();
        zip.write_all(content).unwrap();
        zip.finish().unwrap();
    }
    buffer.into_inner()
}

fn write_input(dir: &Path, archives: &[(&str, &str)]) {
    fs::create_dir_all(dir).unwrap();
    for (archive, file) in archives {
        fs::write(dir.join(archive), create_simple_zip(file, b"content")).unwrap();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_async_ripple_unzip() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("in");
    let inner = create_simple_zip("deep.txt", b"deep");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("outer.zip"), create_simple_zip("inner.zip", &inner)).unwrap();

    let log = temp.path().join("run.log");
    let report = ripple_unzip(&input, temp.path().join("out"), Some(log.clone()))
        .await
        .unwrap();

    assert_eq!(report.archives_extracted, 2);
    assert!(temp.path().join("out/outer/inner/deep.txt").exists());
    assert!(fs::read_to_string(log).unwrap().contains("[INFO]"));
}

#[tokio::test]
async fn test_async_engine_with_config() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("in");
    write_input(&input, &[("a.zip", "a.txt")]);
    fs::write(input.join("plain.txt"), b"plain").unwrap();

    let engine = AsyncEngine::new(Engine::new().mirror(ripple_unzip::MirrorMode::ArchivesOnly));
    let report = engine.run(&input, temp.path().join("out")).await.unwrap();

    assert_eq!(report.files_copied, 0);
    assert!(temp.path().join("out/a/a.txt").exists());
    assert!(!temp.path().join("out/plain.txt").exists());
}

#[tokio::test]
async fn test_async_missing_input() {
    let temp = tempdir().unwrap();
    let result = ripple_unzip(temp.path().join("missing"), temp.path().join("out"), None).await;
    assert!(matches!(result, Err(Error::InvalidInput { .. })));
}

#[tokio::test]
async fn test_async_cancelled() {
    let temp = tempdir().unwrap();
    let input = temp.path().join("in");
    write_input(&input, &[("a.zip", "a.txt"), ("b.zip", "b.txt")]);

    let token = CancelToken::new();
    token.cancel();
    let report = AsyncEngine::new(Engine::new())
        .cancel_token(token)
        .run(&input, temp.path().join("out"))
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.archives_extracted, 0);
}

#[tokio::test]
async fn test_async_concurrent_runs() {
    let temp = tempdir().unwrap();
    let in1 = temp.path().join("in1");
    let in2 = temp.path().join("in2");
    write_input(&in1, &[("one.zip", "file1.txt")]);
    write_input(&in2, &[("two.zip", "file2.txt")]);

    let (r1, r2) = tokio::join!(
        ripple_unzip(&in1, temp.path().join("out1"), None),
        ripple_unzip(&in2, temp.path().join("out2"), None),
    );

    assert_eq!(r1.unwrap().archives_extracted, 1);
    assert_eq!(r2.unwrap().archives_extracted, 1);
    assert!(temp.path().join("out1/one/file1.txt").exists());
    assert!(temp.path().join("out2/two/file2.txt").exists());
}
