//! Shared redb handle: the structured store is opened once per process and
//! is the only writer (§5 shared-resource policy).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::Database;

use crate::error::StoreResult;

#[derive(Clone)]
pub struct StoreHandle {
    db: Arc<Database>,
    path: PathBuf,
}

impl StoreHandle {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| crate::error::StoreError::StorageUnavailable(e.to_string()))?;
        }
        let db = Database::create(&path)?;
        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
