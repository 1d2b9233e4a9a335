use plan_executor::{DocumentSink, FsDocumentSink, SinkError};
use tempfile::TempDir;

#[tokio::test]
async fn creates_the_artifact_dir_on_first_write() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("digest").join("artifacts");
    let sink = FsDocumentSink::new(&root);

    let path = sink.write("table.md", "| a | b |").await.unwrap();

    assert_eq!(path, root.join("table.md"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "| a | b |\n");
}

#[tokio::test]
async fn rewriting_keeps_only_the_latest_body() {
    let tmp = TempDir::new().unwrap();
    let sink = FsDocumentSink::new(tmp.path());

    sink.write("report.md", "first draft, much longer than the second")
        .await
        .unwrap();
    let path = sink.write("report.md", "final").await.unwrap();

    assert_eq!(std::fs::read_to_string(path).unwrap(), "final\n");
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn names_cannot_escape_the_root() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("artifacts");
    let sink = FsDocumentSink::new(&root);

    for name in ["../outside.md", "nested/table.md", "", ".."] {
        let err = sink.write(name, "x").await.unwrap_err();
        assert!(matches!(err, SinkError::InvalidName { .. }), "{name:?}: {err}");
    }
    assert!(!root.exists());
    assert!(!tmp.path().join("outside.md").exists());
}

#[tokio::test]
async fn storage_failures_name_the_path() {
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("not-a-dir");
    std::fs::write(&blocker, "file").unwrap();
    let sink = FsDocumentSink::new(&blocker);

    match sink.write("table.md", "x").await.unwrap_err() {
        SinkError::Io { path, .. } => assert_eq!(path, blocker),
        other => panic!("expected an I/O error, got {other:?}"),
    }
}
