//! On-disk layout of uploads: `<upload_dir>/<safe chat id>/<uuid><ext>`.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

/// Directory name for a chat: path separators and `..` are neutralised.
pub fn safe_chat_dir(chat_id: &str) -> String {
    chat_id.replace("..", "").replace(['/', '\\'], "_")
}

/// Writes `bytes` under the chat's directory with a random name.
pub async fn save_upload(
    upload_dir: &Path,
    chat_id: &str,
    extension: &str,
    bytes: &[u8],
) -> std::io::Result<PathBuf> {
    let dir = upload_dir.join(safe_chat_dir(chat_id));
    tokio::fs::create_dir_all(&dir).await?;
    let path = dir.join(format!("{}{extension}", Uuid::new_v4().simple()));
    tokio::fs::write(&path, bytes).await?;
    debug!(path = %path.display(), bytes = bytes.len(), "upload stored");
    Ok(path)
}

/// Removes the chat's upload directory; failures are logged only.
pub async fn delete_chat_uploads(upload_dir: &Path, chat_id: &str) {
    let dir = upload_dir.join(safe_chat_dir(chat_id));
    match tokio::fs::remove_dir_all(&dir).await {
        Ok(()) => debug!(path = %dir.display(), "chat uploads removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %dir.display(), error = %e, "failed to remove chat uploads"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_dir_cannot_escape_upload_root() {
        assert_eq!(safe_chat_dir("../../etc"), "__etc");
        assert_eq!(safe_chat_dir("a/b\\c"), "a_b_c");
        assert_eq!(safe_chat_dir("chat-1"), "chat-1");
    }

    #[tokio::test]
    async fn save_then_delete() {
        let root = tempfile::tempdir().unwrap();
        let path = save_upload(root.path(), "c1", ".txt", b"hello").await.unwrap();
        assert!(path.starts_with(root.path().join("c1")));
        assert_eq!(path.extension().unwrap(), "txt");
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"hello");

        delete_chat_uploads(root.path(), "c1").await;
        assert!(!root.path().join("c1").exists());
        // second removal is a no-op
        delete_chat_uploads(root.path(), "c1").await;
    }
}
