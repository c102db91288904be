use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use buddy_core::conversation::ConversationHistory;
use buddy_core::store::{HistoryStore, StoreError};
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::project::Project;

struct Inner {
    base_path: PathBuf,
    // Serializes read-modify-write cycles on project files.
    write_lock: Mutex<()>,
    tmp_counter: AtomicU64,
}

/// Stores every project as a JSON file in a directory.
///
/// Files are named after the project id. Writes go to a temporary file
/// that is then renamed over the old one, so readers never see a partially
/// written project.
#[derive(Clone)]
pub struct ProjectStore {
    inner: Arc<Inner>,
}

impl ProjectStore {
    /// Creates a store rooted at `base_path`.
    ///
    /// The directory is created on the first write.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                base_path: base_path.into(),
                write_lock: Mutex::new(()),
                tmp_counter: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the directory holding the project files.
    #[inline]
    pub fn base_path(&self) -> &Path {
        &self.inner.base_path
    }

    /// Loads a project, or `None` if it does not exist.
    pub async fn load(&self, id: &str) -> Result<Option<Project>, StoreError> {
        let path = self.project_path(id)?;
        read_project(&path).await
    }

    /// Writes a new project, failing if one with the same id exists.
    pub async fn create(&self, project: &Project) -> Result<(), StoreError> {
        let path = self.project_path(&project.id)?;
        let _guard = self.inner.write_lock.lock().await;
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StoreError::new(format!(
                "project {:?} already exists",
                project.id
            )));
        }
        self.write_project(project).await
    }

    /// Writes a project, replacing any previous version.
    pub async fn save(&self, project: &Project) -> Result<(), StoreError> {
        self.project_path(&project.id)?;
        let _guard = self.inner.write_lock.lock().await;
        self.write_project(project).await
    }

    /// Saves the title and document body of an existing project.
    ///
    /// Returns the updated project.
    pub async fn save_document(
        &self,
        id: &str,
        title: &str,
        content: &str,
    ) -> Result<Project, StoreError> {
        self.update(id, |project| {
            project.title = title.to_owned();
            project.content = content.to_owned();
            project.last_edited = Some(Utc::now());
        })
        .await
    }

    /// Lists all projects, most recently edited first.
    pub async fn list(&self) -> Result<Vec<Project>, StoreError> {
        let base_path = &self.inner.base_path;
        let mut entries = match tokio::fs::read_dir(base_path).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(vec![]);
            }
            Err(err) => {
                return Err(StoreError::with_source(
                    format!("failed to read {}", base_path.display()),
                    err,
                ));
            }
        };

        let mut projects = vec![];
        loop {
            let entry = entries.next_entry().await.map_err(|err| {
                StoreError::with_source("failed to list projects", err)
            })?;
            let Some(entry) = entry else {
                break;
            };
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match read_project(&path).await {
                Ok(Some(project)) => projects.push(project),
                Ok(None) => {}
                Err(err) => warn!("skipping {}: {err}", path.display()),
            }
        }
        projects.sort_by(|a, b| {
            b.last_edited.cmp(&a.last_edited).then_with(|| a.id.cmp(&b.id))
        });
        Ok(projects)
    }

    async fn update(
        &self,
        id: &str,
        f: impl FnOnce(&mut Project),
    ) -> Result<Project, StoreError> {
        let path = self.project_path(id)?;
        let _guard = self.inner.write_lock.lock().await;
        let mut project = read_project(&path)
            .await?
            .ok_or_else(|| StoreError::new(format!("project {id:?} not found")))?;
        f(&mut project);
        self.write_project(&project).await?;
        Ok(project)
    }

    fn project_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        validate_id(id)?;
        Ok(self.inner.base_path.join(format!("{id}.json")))
    }

    /// Writes the project atomically. Callers hold the write lock.
    async fn write_project(&self, project: &Project) -> Result<(), StoreError> {
        let base_path = &self.inner.base_path;
        let path = self.project_path(&project.id)?;
        let content = serde_json::to_vec_pretty(project).map_err(|err| {
            StoreError::with_source("failed to serialize project", err)
        })?;

        let tmp_path = base_path.join(format!(
            ".{}.{}.{}.tmp",
            project.id,
            std::process::id(),
            self.inner.tmp_counter.fetch_add(1, Ordering::Relaxed)
        ));
        let write_result = async {
            tokio::fs::create_dir_all(base_path).await?;
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(&content).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp_path, &path).await
        }
        .await;

        if let Err(err) = write_result {
            tokio::fs::remove_file(&tmp_path).await.ok();
            return Err(StoreError::with_source(
                format!("failed to write {}", path.display()),
                err,
            ));
        }
        trace!("wrote {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for ProjectStore {
    async fn load_history(
        &self,
        document_id: &str,
    ) -> Result<ConversationHistory, StoreError> {
        Ok(self
            .load(document_id)
            .await?
            .map(|project| project.chat_history)
            .unwrap_or_default())
    }

    /// Replaces the conversation of an existing project. The other fields
    /// are left untouched.
    async fn save_history(
        &self,
        document_id: &str,
        history: &ConversationHistory,
    ) -> Result<(), StoreError> {
        self.update(document_id, |project| {
            project.chat_history = history.clone();
        })
        .await
        .map(|_| ())
    }
}

async fn read_project(path: &Path) -> Result<Option<Project>, StoreError> {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(StoreError::with_source(
                format!("failed to read {}", path.display()),
                err,
            ));
        }
    };
    serde_json::from_slice(&content).map(Some).map_err(|err| {
        StoreError::with_source(format!("malformed {}", path.display()), err)
    })
}

/// Rejects ids that are not safe to use as a file name.
fn validate_id(id: &str) -> Result<(), StoreError> {
    if id.is_empty() {
        return Err(StoreError::new("project id cannot be empty"));
    }
    if id.starts_with('.')
        || id.contains(['/', '\\', '\0'])
        || id.chars().any(char::is_control)
    {
        return Err(StoreError::new(format!("invalid project id: {id:?}")));
    }
    Ok(())
}
