//! Per-user workspace lifecycle.
//!
//! [`WorkspaceManager`] is the only component that touches the workspace
//! tree. Every operation first derives the workspace root from the user id
//! (`<workspaces_root>/user-<id>`); every path supplied by a client goes
//! through [`WorkspaceManager::resolve`] before any I/O.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`ensure`](WorkspaceManager::ensure) | Create the directory skeleton and seed README, then index |
//! | [`resolve`](WorkspaceManager::resolve) | Map a relative path to an absolute one inside the sandbox |
//! | [`list_files`](WorkspaceManager::list_files) | Flat listing via the configured [`FileLister`] |
//! | [`read_file`](WorkspaceManager::read_file) | Read a file as UTF-8 text |
//! | [`write_file`](WorkspaceManager::write_file) | Write bytes, creating parent directories |
//! | [`store_upload`](WorkspaceManager::store_upload) | Save an upload under `uploads/` |
//! | [`search`](WorkspaceManager::search) | Tag filter via the index, then case-insensitive text filter |

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::AsyncWriteExt;

use crate::config::Config;
use crate::error::{WorkspaceError, WorkspaceResult};
use crate::indexer::{open_indexer, FileQuery, Indexer};
use crate::listing::{lister_for, FileLister, WalkLister};
use crate::models::{FileEntry, IndexedFile, UploadedFile, Workspace};

/// Subdirectories every workspace carries.
pub const REQUIRED_DIRS: [&str; 4] = ["project", "docs", "notes", "uploads"];

pub const README_NAME: &str = "README.md";

const UPLOADS_DIR: &str = "uploads";
const MAX_USER_ID_LEN: usize = 128;

#[derive(Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    indexer: Option<Arc<dyn Indexer>>,
    lister: Arc<dyn FileLister>,
    index_timeout: Duration,
}

impl WorkspaceManager {
    /// A manager rooted at `root` that lists by directory walk and has no
    /// indexer attached.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            indexer: None,
            lister: Arc::new(WalkLister),
            index_timeout: Duration::from_secs(30),
        }
    }

    /// Creates the workspaces root, opens the configured indexer over it
    /// and picks the configured listing backend.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut config = config.clone();
        std::fs::create_dir_all(&config.workspaces.root).with_context(|| {
            format!(
                "creating workspaces root {}",
                config.workspaces.root.display()
            )
        })?;
        config.workspaces.root = std::fs::canonicalize(&config.workspaces.root)?;

        let indexer = open_indexer(&config).await?;
        let lister = lister_for(&config, indexer.clone());

        Ok(Self::new(config.workspaces.root.clone())
            .with_indexer(indexer)
            .with_lister(lister)
            .with_index_timeout(Duration::from_secs(config.index.timeout_secs)))
    }

    pub fn with_indexer(mut self, indexer: Option<Arc<dyn Indexer>>) -> Self {
        self.indexer = indexer;
        self
    }

    pub fn with_lister(mut self, lister: Arc<dyn FileLister>) -> Self {
        self.lister = lister;
        self
    }

    pub fn with_index_timeout(mut self, timeout: Duration) -> Self {
        self.index_timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn indexer(&self) -> Option<&Arc<dyn Indexer>> {
        self.indexer.as_ref()
    }

    /// Deterministic workspace for `user_id`. Does not touch the disk.
    pub fn workspace(&self, user_id: &str) -> WorkspaceResult<Workspace> {
        validate_user_id(user_id)?;
        Ok(Workspace {
            user_id: user_id.to_string(),
            root: self.root.join(workspace_dir_name(user_id)),
        })
    }

    /// Creates the workspace skeleton if missing and re-registers it with
    /// the indexer. Safe to call on every request and concurrently.
    ///
    /// Indexing failures and timeouts are logged, not returned.
    pub async fn ensure(&self, user_id: &str) -> WorkspaceResult<Workspace> {
        let ws = self.workspace(user_id)?;

        for dir in REQUIRED_DIRS {
            let path = ws.root.join(dir);
            tokio::fs::create_dir_all(&path)
                .await
                .map_err(|e| WorkspaceError::storage(&path, e))?;
        }

        let readme = ws.root.join(README_NAME);
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&readme)
            .await
        {
            Ok(mut file) => {
                file.write_all(seed_readme(user_id).as_bytes())
                    .await
                    .map_err(|e| WorkspaceError::storage(&readme, e))?;
                file.flush()
                    .await
                    .map_err(|e| WorkspaceError::storage(&readme, e))?;
                tracing::info!(user_id, root = %ws.root.display(), "workspace created");
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(WorkspaceError::storage(&readme, e)),
        }

        if let Some(indexer) = &self.indexer {
            match tokio::time::timeout(self.index_timeout, indexer.index_folder(&ws.root)).await {
                Ok(Ok(stats)) => {
                    tracing::debug!(user_id, backend = indexer.backend(), ?stats, "workspace indexed")
                }
                Ok(Err(e)) => {
                    tracing::warn!(user_id, error = %e, "error indexing workspace")
                }
                Err(_) => tracing::warn!(
                    user_id,
                    timeout_secs = self.index_timeout.as_secs(),
                    "indexing workspace timed out"
                ),
            }
        }

        Ok(ws)
    }

    /// Resolves `relative` against the workspace root.
    ///
    /// The path is normalized lexically first (`.` dropped, `..` popped),
    /// then the deepest existing ancestor is canonicalized so symlinks
    /// cannot lead outside the root. The result is always a strict
    /// descendant of the root; anything else is [`WorkspaceError::AccessDenied`].
    pub fn resolve(&self, user_id: &str, relative: &str) -> WorkspaceResult<PathBuf> {
        let ws = self.workspace(user_id)?;
        let denied = || WorkspaceError::AccessDenied(relative.to_string());

        let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
        for component in Path::new(relative).components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    parts.pop().ok_or_else(denied)?;
                }
                Component::Normal(part) => parts.push(part),
                Component::RootDir | Component::Prefix(_) => return Err(denied()),
            }
        }
        if parts.is_empty() {
            return Err(denied());
        }

        let candidate = parts.iter().fold(ws.root.clone(), |acc, p| acc.join(p));

        let canonical_root = match std::fs::canonicalize(&ws.root) {
            Ok(root) => root,
            // Nothing exists yet, so nothing can be a symlink out.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(candidate),
            Err(e) => return Err(WorkspaceError::storage(&ws.root, e)),
        };

        for ancestor in candidate.ancestors() {
            if !ancestor.starts_with(&ws.root) {
                break;
            }
            match std::fs::canonicalize(ancestor) {
                Ok(real) => {
                    let inside = if ancestor == ws.root {
                        real == canonical_root
                    } else {
                        real.starts_with(&canonical_root) && real != canonical_root
                    };
                    return if inside { Ok(candidate) } else { Err(denied()) };
                }
                // A dangling or looping symlink cannot be followed safely.
                Err(_) if is_symlink(ancestor) => return Err(denied()),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) if e.kind() == ErrorKind::NotADirectory => {
                    return Err(WorkspaceError::NotFound(relative.to_string()))
                }
                Err(e) => return Err(WorkspaceError::storage(ancestor, e)),
            }
        }

        Ok(candidate)
    }

    pub async fn list_files(&self, user_id: &str) -> WorkspaceResult<Vec<FileEntry>> {
        let ws = self.workspace(user_id)?;
        self.lister.list(&ws).await
    }

    pub async fn read_file(&self, user_id: &str, relative: &str) -> WorkspaceResult<String> {
        let path = self.resolve(user_id, relative)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => String::from_utf8(bytes).map_err(|_| {
                WorkspaceError::InvalidInput(format!("{} is not valid UTF-8 text", relative))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(WorkspaceError::NotFound(relative.to_string()))
            }
            Err(e) => Err(WorkspaceError::Internal(anyhow::Error::new(e).context(format!(
                "reading {}",
                path.display()
            )))),
        }
    }

    pub async fn write_file(
        &self,
        user_id: &str,
        relative: &str,
        contents: &[u8],
    ) -> WorkspaceResult<PathBuf> {
        let path = self.resolve(user_id, relative)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| WorkspaceError::storage(parent, e))?;
        }
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| WorkspaceError::storage(&path, e))?;
        Ok(path)
    }

    /// Stores an uploaded file as `uploads/<unix-millis>-<name>`, where
    /// `<name>` is the final component of `original_name`.
    pub async fn store_upload(
        &self,
        user_id: &str,
        original_name: &str,
        contents: &[u8],
    ) -> WorkspaceResult<UploadedFile> {
        let name = sanitize_file_name(original_name).ok_or_else(|| {
            WorkspaceError::InvalidInput(format!("invalid file name: {:?}", original_name))
        })?;
        self.ensure(user_id).await?;

        let filename = format!("{}-{}", chrono::Utc::now().timestamp_millis(), name);
        let relative = format!("{}/{}", UPLOADS_DIR, filename);
        let path = self.write_file(user_id, &relative, contents).await?;

        Ok(UploadedFile {
            filename,
            original_name: original_name.to_string(),
            path: path.display().to_string(),
            size: contents.len() as u64,
        })
    }

    /// Lists indexed files of the workspace carrying all `tags`, then keeps
    /// those whose content or title contains `query` (case-insensitive).
    pub async fn search(
        &self,
        user_id: &str,
        query: Option<&str>,
        tags: &[String],
    ) -> WorkspaceResult<Vec<IndexedFile>> {
        let ws = self.workspace(user_id)?;
        let indexer = self
            .indexer
            .as_ref()
            .ok_or_else(|| WorkspaceError::Unavailable("index not ready".to_string()))?;

        let file_query = FileQuery::folder(workspace_dir_name(&ws.user_id)).with_tags(tags.to_vec());
        let files = tokio::time::timeout(self.index_timeout, indexer.get_files(&file_query))
            .await
            .map_err(|_| WorkspaceError::Timeout("index query".to_string()))??;

        Ok(match query.filter(|q| !q.trim().is_empty()) {
            Some(q) => filter_by_text(files, q),
            None => files,
        })
    }
}

fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

/// Second-pass filter: substring match on content or `metadata.title`.
pub fn filter_by_text(files: Vec<IndexedFile>, query: &str) -> Vec<IndexedFile> {
    let needle = query.to_lowercase();
    files
        .into_iter()
        .filter(|f| {
            f.content.to_lowercase().contains(&needle)
                || f.metadata
                    .get("title")
                    .and_then(|t| t.as_str())
                    .is_some_and(|t| t.to_lowercase().contains(&needle))
        })
        .collect()
}

pub fn workspace_dir_name(user_id: &str) -> String {
    format!("user-{}", user_id)
}

/// User ids are opaque but must stay a single path component: no path
/// separators, no NUL.
pub fn validate_user_id(user_id: &str) -> WorkspaceResult<()> {
    if user_id.is_empty() {
        return Err(WorkspaceError::InvalidInput("userId is required".to_string()));
    }
    if user_id.len() > MAX_USER_ID_LEN
        || user_id == "."
        || user_id == ".."
        || user_id.contains(['/', '\\', '\0'])
    {
        return Err(WorkspaceError::InvalidInput(format!(
            "invalid userId: {:?}",
            user_id
        )));
    }
    Ok(())
}

fn sanitize_file_name(original: &str) -> Option<String> {
    let name = original.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." || name.contains('\0') {
        return None;
    }
    Some(name.to_string())
}

pub fn seed_readme(user_id: &str) -> String {
    format!(
        "# Workspace for User {user_id}

Welcome to your personal development workspace!

## Folders
- `project/` - Your code files
- `docs/` - Documentation
- `notes/` - Personal notes
- `uploads/` - Uploaded files

## Getting Started
Start chatting with the assistant to build your application!
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn manager(tmp: &TempDir) -> WorkspaceManager {
        WorkspaceManager::new(tmp.path().join("workspaces"))
    }

    fn dir_set(root: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(root)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_ensure_creates_skeleton() {
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&tmp);
        let ws = mgr.ensure("alice").await.unwrap();

        assert_eq!(ws.root, tmp.path().join("workspaces/user-alice"));
        for dir in REQUIRED_DIRS {
            assert!(ws.root.join(dir).is_dir(), "missing {}", dir);
        }
        let readme = fs::read_to_string(ws.root.join(README_NAME)).unwrap();
        assert!(readme.contains("Workspace for User alice"));
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent_and_keeps_readme() {
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&tmp);
        let ws = mgr.ensure("alice").await.unwrap();
        let before = dir_set(&ws.root);

        fs::write(ws.root.join(README_NAME), "edited by user").unwrap();
        let again = mgr.ensure("alice").await.unwrap();

        assert_eq!(again, ws);
        assert_eq!(dir_set(&ws.root), before);
        assert_eq!(
            fs::read_to_string(ws.root.join(README_NAME)).unwrap(),
            "edited by user"
        );
    }

    #[tokio::test]
    async fn test_concurrent_ensure() {
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&tmp);
        let (a, b) = tokio::join!(mgr.ensure("bob"), mgr.ensure("bob"));
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[test]
    fn test_user_id_validation() {
        for ok in ["alice", "a.b-c_1", "alice@example.com", "a+b", "ä", "a b"] {
            assert!(validate_user_id(ok).is_ok(), "rejected {:?}", ok);
        }
        for bad in ["", ".", "..", "a/b", "../x", "a\\b", "a\0b"] {
            assert!(
                matches!(validate_user_id(bad), Err(WorkspaceError::InvalidInput(_))),
                "accepted {:?}",
                bad
            );
        }
        assert!(validate_user_id(&"x".repeat(129)).is_err());
    }

    #[tokio::test]
    async fn test_resolve_rejects_traversal() {
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&tmp);
        mgr.ensure("alice").await.unwrap();

        for bad in [
            "../../etc/passwd",
            "../secret",
            "./../secret",
            "docs/../../secret",
            "docs/./../../user-bob/README.md",
            "/etc/passwd",
            "",
            ".",
            "docs/..",
        ] {
            assert!(
                matches!(mgr.resolve("alice", bad), Err(WorkspaceError::AccessDenied(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[tokio::test]
    async fn test_resolve_normalizes_inside_paths() {
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&tmp);
        let ws = mgr.ensure("alice").await.unwrap();

        assert_eq!(
            mgr.resolve("alice", "./docs/../notes/./todo.md").unwrap(),
            ws.root.join("notes/todo.md")
        );
        assert_eq!(
            mgr.resolve("alice", "docs/new/deep.md").unwrap(),
            ws.root.join("docs/new/deep.md")
        );
    }

    #[tokio::test]
    async fn test_resolve_before_ensure() {
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&tmp);
        assert!(mgr.resolve("ghost", "README.md").is_ok());
        assert!(mgr.resolve("ghost", "../x").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resolve_rejects_symlink_escape() {
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&tmp);
        let ws = mgr.ensure("alice").await.unwrap();
        let outside = tmp.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("secret.txt"), "top secret").unwrap();
        std::os::unix::fs::symlink(&outside, ws.root.join("docs/link")).unwrap();

        assert!(matches!(
            mgr.resolve("alice", "docs/link/secret.txt"),
            Err(WorkspaceError::AccessDenied(_))
        ));
        assert!(matches!(
            mgr.read_file("alice", "docs/link/secret.txt").await,
            Err(WorkspaceError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&tmp);
        mgr.ensure("alice").await.unwrap();

        let body = "fn main() {\n    println!(\"héllo\");\n}\n";
        mgr.write_file("alice", "project/src/main.rs", body.as_bytes())
            .await
            .unwrap();
        assert_eq!(
            mgr.read_file("alice", "project/src/main.rs").await.unwrap(),
            body
        );
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&tmp);
        mgr.ensure("alice").await.unwrap();
        assert!(matches!(
            mgr.read_file("alice", "docs/nope.md").await,
            Err(WorkspaceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_upload_then_list() {
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&tmp);

        let up = mgr
            .store_upload("alice", "C:\\Users\\me\\report.pdf", b"%PDF-1.4")
            .await
            .unwrap();
        assert!(up.filename.ends_with("-report.pdf"));
        assert_eq!(up.size, 8);

        let files = mgr.list_files("alice").await.unwrap();
        let entry = files
            .iter()
            .find(|f| f.name.ends_with("report.pdf"))
            .expect("upload listed");
        assert!(entry.file_path.starts_with("uploads"));
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_name() {
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&tmp);
        for bad in ["", "..", "dir/"] {
            assert!(matches!(
                mgr.store_upload("alice", bad, b"x").await,
                Err(WorkspaceError::InvalidInput(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_search_without_indexer_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&tmp);
        assert!(matches!(
            mgr.search("alice", Some("x"), &[]).await,
            Err(WorkspaceError::Unavailable(_))
        ));
    }

    #[test]
    fn test_filter_by_text_matches_content_or_title() {
        let file = |id: &str, title: &str, content: &str| IndexedFile {
            id: id.into(),
            file_path: format!("user-a/{}.md", id),
            url_path: format!("user-a/{}", id),
            folder: "user-a".into(),
            extension: "md".into(),
            title: Some(title.into()),
            tags: vec![],
            metadata: serde_json::json!({ "title": title }),
            content: content.into(),
        };
        let files = vec![
            file("1", "Deploy Guide", "docker compose up"),
            file("2", "Notes", "Remember to DEPLOY on friday"),
            file("3", "Other", "nothing here"),
        ];
        let mut ids: Vec<String> = filter_by_text(files, "deploy")
            .into_iter()
            .map(|f| f.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_path_below_a_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&tmp);
        mgr.ensure("alice").await.unwrap();

        assert!(matches!(
            mgr.read_file("alice", "README.md/x").await,
            Err(WorkspaceError::NotFound(_))
        ));
        assert!(matches!(
            mgr.read_file("alice", "README.md/deeper/x.md").await,
            Err(WorkspaceError::NotFound(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resolve_rejects_dangling_symlink() {
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&tmp);
        let ws = mgr.ensure("alice").await.unwrap();
        std::os::unix::fs::symlink(tmp.path().join("outside/new.txt"), ws.root.join("docs/out"))
            .unwrap();

        assert!(matches!(
            mgr.resolve("alice", "docs/out"),
            Err(WorkspaceError::AccessDenied(_))
        ));
        assert!(matches!(
            mgr.write_file("alice", "docs/out", b"x").await,
            Err(WorkspaceError::AccessDenied(_))
        ));
        assert!(!tmp.path().join("outside").exists());
    }

    #[tokio::test]
    async fn test_search_query_is_not_trimmed() {
        use crate::index_memory::InMemoryIndexer;
        use crate::indexer::Scanner;

        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("workspaces");
        let indexer = InMemoryIndexer::new(Scanner::new(&root, &["**/*.md".to_string()]).unwrap());
        let mgr =
            WorkspaceManager::new(root).with_indexer(Some(Arc::new(indexer) as Arc<dyn Indexer>));
        let ws = mgr.ensure("alice").await.unwrap();
        fs::write(
            ws.root.join("notes/meeting.md"),
            "---\ntags: [log]\n---\nMeeting notes here",
        )
        .unwrap();
        fs::write(
            ws.root.join("notes/refs.md"),
            "---\ntags: [log]\n---\nSee the footnotes",
        )
        .unwrap();
        mgr.ensure("alice").await.unwrap();

        let tags = vec!["log".to_string()];
        let spaced = mgr.search("alice", Some(" notes"), &tags).await.unwrap();
        assert_eq!(spaced.len(), 1);
        assert_eq!(spaced[0].file_path, "user-alice/notes/meeting.md");

        let bare = mgr.search("alice", Some("notes"), &tags).await.unwrap();
        assert_eq!(bare.len(), 2);

        let blank = mgr.search("alice", Some("   "), &tags).await.unwrap();
        assert_eq!(blank.len(), 2);
    }

    /// Index backend that never answers in time.
    struct StalledIndexer;

    #[async_trait::async_trait]
    impl Indexer for StalledIndexer {
        fn backend(&self) -> &str {
            "stalled"
        }

        async fn index_folder(&self, _folder: &Path) -> anyhow::Result<crate::models::IndexStats> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Default::default())
        }

        async fn get_files(&self, _query: &FileQuery) -> anyhow::Result<Vec<IndexedFile>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_index_timeouts() {
        let tmp = TempDir::new().unwrap();
        let mgr = manager(&tmp)
            .with_indexer(Some(Arc::new(StalledIndexer) as Arc<dyn Indexer>))
            .with_index_timeout(Duration::from_millis(50));

        let started = std::time::Instant::now();
        // A slow index does not fail workspace creation.
        let ws = mgr.ensure("alice").await.unwrap();
        assert!(ws.root.join(README_NAME).is_file());

        assert!(matches!(
            mgr.search("alice", None, &[]).await,
            Err(WorkspaceError::Timeout(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
