use shared::ClassificationResult;
use std::path::PathBuf;
use uuid::Uuid;

/// Classification results saved as `<dir>/<uuid>.json`.
#[derive(Clone)]
pub struct ClassificationStore {
    directory: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid classification id: {0}")]
    InvalidId(String),
    #[error("Classification not found: {0}")]
    NotFound(Uuid),
}

impl ClassificationStore {
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }

    pub fn parse_id(id: &str) -> Result<Uuid, StoreError> {
        Uuid::parse_str(id.trim()).map_err(|_| StoreError::InvalidId(id.to_string()))
    }

    fn result_path(&self, id: Uuid) -> PathBuf {
        self.directory.join(format!("{}.json", id))
    }

    pub async fn save(&self, result: &ClassificationResult) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        tokio::fs::create_dir_all(&self.directory).await?;
        let bytes = serde_json::to_vec_pretty(result)?;
        tokio::fs::write(self.result_path(id), bytes).await?;
        log::info!("Saved classification result {}", id);
        Ok(id)
    }

    pub async fn load(&self, id: &str) -> Result<ClassificationResult, StoreError> {
        let id = Self::parse_id(id)?;
        let bytes = match tokio::fs::read(self.result_path(id)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id));
            }
            Err(e) => return Err(StoreError::Io(e)),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}
