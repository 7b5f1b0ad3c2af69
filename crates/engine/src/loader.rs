//! Where a deployment lives: its journal, the artifacts its futures were
//! initialized with, and the deployed-addresses map.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hoist_core::{Address, Artifact, FutureId};
use hoist_journal::{FileJournal, Journal, MemoryJournal};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::EngineError;

pub const JOURNAL_FILE: &str = "journal.jsonl";
pub const DEPLOYED_ADDRESSES_FILE: &str = "deployed_addresses.json";
pub const ARTIFACTS_DIR: &str = "artifacts";
pub const BUILD_INFO_DIR: &str = "build-info";

/// Storage of one deployment.
///
/// Artifacts are stored per future when the future is initialized, so a
/// resumed run decodes results with the ABI it deployed with even if the
/// project has been recompiled since.
#[async_trait]
pub trait DeploymentLoader: Send + Sync {
    fn journal(&self) -> &dyn Journal;

    async fn store_artifact(
        &self,
        future_id: &FutureId,
        artifact: &Artifact,
    ) -> Result<(), EngineError>;

    async fn load_artifact(&self, future_id: &FutureId) -> Result<Option<Artifact>, EngineError>;

    async fn store_build_info(
        &self,
        contract_name: &str,
        build_info: &Value,
    ) -> Result<(), EngineError>;

    async fn write_deployed_addresses(
        &self,
        addresses: &BTreeMap<FutureId, Address>,
    ) -> Result<(), EngineError>;

    async fn read_deployed_addresses(&self) -> Result<BTreeMap<FutureId, Address>, EngineError>;
}

// ──────────────────────────────────────────────
// Directory-backed
// ──────────────────────────────────────────────

/// A deployment directory:
///
/// ```text
/// <dir>/journal.jsonl
/// <dir>/deployed_addresses.json
/// <dir>/artifacts/<futureId>.json
/// <dir>/build-info/<contractName>.json
/// ```
pub struct FileDeploymentLoader {
    dir: PathBuf,
    journal: FileJournal,
}

impl FileDeploymentLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let journal = FileJournal::new(dir.join(JOURNAL_FILE));
        FileDeploymentLoader { dir, journal }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn artifact_path(&self, future_id: &FutureId) -> PathBuf {
        self.dir
            .join(ARTIFACTS_DIR)
            .join(format!("{}.json", file_stem(future_id.as_str())))
    }
}

/// Future ids and qualified contract names contain characters that are
/// awkward in file names.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            other => other,
        })
        .collect()
}

fn io_error(path: &Path, e: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

/// Write via a sibling temp file and rename, so readers never see a torn file.
async fn write_atomically(path: &Path, contents: String) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(parent, e))?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| io_error(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| io_error(path, e))
}

fn to_pretty<T: serde::Serialize>(value: &T) -> Result<String, EngineError> {
    serde_json::to_string_pretty(value).map_err(|e| EngineError::Io {
        path: String::new(),
        message: format!("cannot serialize: {}", e),
    })
}

#[async_trait]
impl DeploymentLoader for FileDeploymentLoader {
    fn journal(&self) -> &dyn Journal {
        &self.journal
    }

    async fn store_artifact(
        &self,
        future_id: &FutureId,
        artifact: &Artifact,
    ) -> Result<(), EngineError> {
        let path = self.artifact_path(future_id);
        write_atomically(&path, to_pretty(artifact)?).await
    }

    async fn load_artifact(&self, future_id: &FutureId) -> Result<Option<Artifact>, EngineError> {
        let path = self.artifact_path(future_id);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(Artifact::from_json_str(future_id.as_str(), &text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn store_build_info(
        &self,
        contract_name: &str,
        build_info: &Value,
    ) -> Result<(), EngineError> {
        let path = self
            .dir
            .join(BUILD_INFO_DIR)
            .join(format!("{}.json", file_stem(contract_name)));
        write_atomically(&path, to_pretty(build_info)?).await
    }

    async fn write_deployed_addresses(
        &self,
        addresses: &BTreeMap<FutureId, Address>,
    ) -> Result<(), EngineError> {
        let path = self.dir.join(DEPLOYED_ADDRESSES_FILE);
        debug!(path = %path.display(), count = addresses.len(), "writing deployed addresses");
        write_atomically(&path, to_pretty(addresses)?).await
    }

    async fn read_deployed_addresses(&self) -> Result<BTreeMap<FutureId, Address>, EngineError> {
        let path = self.dir.join(DEPLOYED_ADDRESSES_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str(&text).map_err(|e| EngineError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

// ──────────────────────────────────────────────
// In memory
// ──────────────────────────────────────────────

/// A deployment that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryDeploymentLoader {
    journal: MemoryJournal,
    artifacts: Mutex<BTreeMap<FutureId, Artifact>>,
    build_info: Mutex<BTreeMap<String, Value>>,
    addresses: Mutex<BTreeMap<FutureId, Address>>,
}

impl MemoryDeploymentLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memory_journal(&self) -> &MemoryJournal {
        &self.journal
    }

    pub async fn build_info(&self, contract_name: &str) -> Option<Value> {
        self.build_info.lock().await.get(contract_name).cloned()
    }
}

#[async_trait]
impl DeploymentLoader for MemoryDeploymentLoader {
    fn journal(&self) -> &dyn Journal {
        &self.journal
    }

    async fn store_artifact(
        &self,
        future_id: &FutureId,
        artifact: &Artifact,
    ) -> Result<(), EngineError> {
        self.artifacts
            .lock()
            .await
            .insert(future_id.clone(), artifact.clone());
        Ok(())
    }

    async fn load_artifact(&self, future_id: &FutureId) -> Result<Option<Artifact>, EngineError> {
        Ok(self.artifacts.lock().await.get(future_id).cloned())
    }

    async fn store_build_info(
        &self,
        contract_name: &str,
        build_info: &Value,
    ) -> Result<(), EngineError> {
        self.build_info
            .lock()
            .await
            .insert(contract_name.to_string(), build_info.clone());
        Ok(())
    }

    async fn write_deployed_addresses(
        &self,
        addresses: &BTreeMap<FutureId, Address>,
    ) -> Result<(), EngineError> {
        *self.addresses.lock().await = addresses.clone();
        Ok(())
    }

    async fn read_deployed_addresses(&self) -> Result<BTreeMap<FutureId, Address>, EngineError> {
        Ok(self.addresses.lock().await.clone())
    }
}
