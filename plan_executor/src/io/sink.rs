use std::{
    ffi::OsStr,
    path::{Component, Path, PathBuf},
};

use async_trait::async_trait;
use snafu::{Backtrace, ResultExt, Snafu, ensure};
use tracing::info;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// The document name is not a single plain file name (e.g. `../x`, `a/b`, `""`).
    #[snafu(display("Invalid document name `{name}`: expected a plain file name"))]
    InvalidName { name: String, backtrace: Backtrace },

    /// Creating the artifact directory or writing the file failed.
    #[snafu(display("I/O error on {}: {source}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },
}

#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Persists `text` under `name`, replacing any earlier document of that name.
    ///
    /// Returns the location the document was written to.
    async fn write(&self, name: &str, text: &str) -> Result<PathBuf, SinkError>;
}

/// Writes documents as files under one artifact directory.
///
/// The directory is created on demand; every body gets one trailing newline.
#[derive(Debug, Clone)]
pub struct FsDocumentSink {
    root: PathBuf,
}

impl FsDocumentSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) => part == OsStr::new(name),
        _ => false,
    }
}

#[async_trait]
impl DocumentSink for FsDocumentSink {
    async fn write(&self, name: &str, text: &str) -> Result<PathBuf, SinkError> {
        ensure!(is_plain_file_name(name), InvalidNameSnafu { name });

        tokio::fs::create_dir_all(&self.root)
            .await
            .context(IoSnafu { path: self.root.clone() })?;

        let path = self.root.join(name);
        let mut body = String::with_capacity(text.len() + 1);
        body.push_str(text);
        body.push('\n');

        tokio::fs::write(&path, body.as_bytes())
            .await
            .context(IoSnafu { path: path.clone() })?;
        info!(path = %path.display(), bytes = body.len(), "wrote document");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_only() {
        assert!(is_plain_file_name("table.md"));
        assert!(is_plain_file_name(".hidden"));
        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name("."));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name("../table.md"));
        assert!(!is_plain_file_name("nested/table.md"));
        assert!(!is_plain_file_name("table.md/"));
        assert!(!is_plain_file_name("/etc/passwd"));
    }
}
