//! Model artifact stores.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::debug;

use stockpulse_ai::{GradientBoostedTrees, ModelError, ModelStore};

/// Stores the model as a JSON file.
#[derive(Debug, Clone)]
pub struct FileModelStore {
    path: PathBuf,
}

impl FileModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ModelStore for FileModelStore {
    fn load(&self) -> Result<Option<GradientBoostedTrees>, ModelError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ModelError::Storage(format!("failed to read {}: {e}", self.path.display())));
            }
        };
        let model = serde_json::from_slice(&bytes)
            .map_err(|e| ModelError::Storage(format!("failed to parse {}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), "loaded model artifact");
        Ok(Some(model))
    }

    fn save(&self, model: &GradientBoostedTrees) -> Result<(), ModelError> {
        let bytes = serde_json::to_vec(model).map_err(|e| ModelError::Storage(e.to_string()))?;
        // Sibling temp file, renamed into place.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|e| ModelError::Storage(format!("failed to write {}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), "saved model artifact");
        Ok(())
    }
}

/// In-memory model store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryModelStore {
    inner: RwLock<Option<GradientBoostedTrees>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelStore for InMemoryModelStore {
    fn load(&self) -> Result<Option<GradientBoostedTrees>, ModelError> {
        let guard = self
            .inner
            .read()
            .map_err(|_| ModelError::Storage("model store lock poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, model: &GradientBoostedTrees) -> Result<(), ModelError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| ModelError::Storage("model store lock poisoned".to_string()))?;
        *guard = Some(model.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use stockpulse_ai::{BoostParams, Dataset, Regressor};

    use super::*;

    fn model() -> GradientBoostedTrees {
        let mut data = Dataset::default();
        for i in 0..8 {
            data.push(vec![i as f64], (i * 2) as f64);
        }
        let params = BoostParams {
            n_estimators: 3,
            ..BoostParams::default()
        };
        GradientBoostedTrees::fit(params, &data).unwrap()
    }

    #[test]
    fn file_store_round_trips_and_reports_absence() {
        let dir = std::env::temp_dir().join(format!("stockpulse-model-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let store = FileModelStore::new(dir.join("model.json"));

        assert!(store.load().unwrap().is_none());
        store.save(&model()).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.n_features(), 1);
        assert_eq!(loaded.tree_count(), 3);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn corrupt_file_is_a_storage_error() {
        let dir = std::env::temp_dir().join(format!("stockpulse-model-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("model.json");
        std::fs::write(&path, b"not json").unwrap();

        let err = FileModelStore::new(&path).load().unwrap_err();
        assert!(matches!(err, ModelError::Storage(_)));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
