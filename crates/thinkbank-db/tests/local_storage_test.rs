//! Filesystem tests for `LocalFileStorage`.

use thinkbank_db::{Error, LocalFileStorage, StorageService};

#[tokio::test]
async fn test_put_get_list_delete() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalFileStorage::new(dir.path(), "/normalized")
        .with_public_url("http://localhost:8080");

    let location = storage
        .put("7.jpg", b"jpeg-bytes", "2025/01/02")
        .await
        .unwrap();
    assert_eq!(location, "http://localhost:8080/normalized/2025/01/02/7.jpg");

    let on_disk = std::fs::read(dir.path().join("2025/01/02/7.jpg")).unwrap();
    assert_eq!(on_disk, b"jpeg-bytes");

    assert_eq!(storage.get("2025/01/02/7.jpg").await.unwrap(), location);

    let entries = storage.list("2025/01/02").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "7.jpg");
    assert!(!entries[0].is_dir);

    storage.delete("2025/01/02/7.jpg").await.unwrap();
    assert!(matches!(
        storage.get("2025/01/02/7.jpg").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_put_overwrites_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalFileStorage::new(dir.path(), "/original");

    storage.put("1.png", b"first", "").await.unwrap();
    let path = storage.put("1.png", b"second", "").await.unwrap();

    assert_eq!(std::fs::read(path).unwrap(), b"second");
}

#[tokio::test]
async fn test_delete_missing_file_is_ok() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalFileStorage::new(dir.path(), "/tmp");
    storage.delete("nope/missing.jpg").await.unwrap();
}

#[tokio::test]
async fn test_list_missing_directory_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalFileStorage::new(dir.path(), "/tmp");
    assert!(storage.list("1999/01/01").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejects_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalFileStorage::new(dir.path(), "/tmp");
    let err = storage.put("x.jpg", b"x", "../escape").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_validate_creates_base_dir() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalFileStorage::new(dir.path().join("nested/root"), "/original");
    storage.validate().await.unwrap();
    assert!(storage.base_dir().is_dir());
}

fn leftover_temp_files(dir: &std::path::Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect()
}

#[tokio::test]
async fn test_failed_rename_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalFileStorage::new(dir.path(), "/normalized");
    // A non-empty directory where the file should land makes the rename fail.
    std::fs::create_dir_all(dir.path().join("2025/01/02/9.jpg/keep")).unwrap();

    let err = storage.put("9.jpg", b"jpeg-bytes", "2025/01/02").await.unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert!(leftover_temp_files(&dir.path().join("2025/01/02")).is_empty());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_failed_write_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalFileStorage::new(dir.path(), "/normalized");
    // Writes through this link hit ENOSPC.
    std::os::unix::fs::symlink("/dev/full", dir.path().join(".9.jpg.tmp")).unwrap();

    assert!(storage.put("9.jpg", b"jpeg-bytes", "").await.is_err());
    assert!(leftover_temp_files(dir.path()).is_empty());
    assert!(!dir.path().join("9.jpg").exists());
}
