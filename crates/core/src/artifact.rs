//! Compiled contract artifacts and library linking.
//!
//! Artifacts use the Hardhat layout: `{contractName, sourceName, abi,
//! bytecode, linkReferences}`. Bytecode may contain `__$…$__` placeholders
//! that are replaced by library addresses before deployment.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::abi::{AbiError, ContractAbi};
use crate::primitives::{decode_hex, hex, Address, Bytes};

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact '{0}' not found")]
    NotFound(String),
    #[error("cannot read '{path}': {message}")]
    Io { path: String, message: String },
    #[error("artifact '{name}' is malformed: {message}")]
    Parse { name: String, message: String },
    #[error("contract '{contract}' needs library '{library}' but none was provided")]
    MissingLibrary { contract: String, library: String },
    #[error("library '{library}' is not used by contract '{contract}'")]
    UnknownLibrary { contract: String, library: String },
    #[error("library name '{library}' is ambiguous for contract '{contract}'")]
    AmbiguousLibrary { contract: String, library: String },
    #[error("bytecode of '{contract}' is invalid: {message}")]
    InvalidBytecode { contract: String, message: String },
    #[error(transparent)]
    Abi(#[from] AbiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReference {
    pub start: usize,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    #[serde(default)]
    pub source_name: String,
    pub abi: Value,
    pub bytecode: String,
    #[serde(default)]
    pub link_references: BTreeMap<String, BTreeMap<String, Vec<LinkReference>>>,
}

impl Artifact {
    pub fn from_json_str(name: &str, json: &str) -> Result<Artifact, ArtifactError> {
        serde_json::from_str(json).map_err(|e| ArtifactError::Parse {
            name: name.to_string(),
            message: e.to_string(),
        })
    }

    pub fn contract_abi(&self) -> Result<ContractAbi, AbiError> {
        ContractAbi::from_json(&self.abi)
    }

    /// Libraries this artifact needs, as `(sourceFile, libraryName)`.
    pub fn required_libraries(&self) -> Vec<(String, String)> {
        self.link_references
            .iter()
            .flat_map(|(file, libs)| libs.keys().map(move |lib| (file.clone(), lib.clone())))
            .collect()
    }

    /// Replace every link reference with the matching library address.
    ///
    /// `libraries` keys are either a bare library name or `file:Name`.
    pub fn link(&self, libraries: &BTreeMap<String, Address>) -> Result<Bytes, ArtifactError> {
        let required = self.required_libraries();

        for key in libraries.keys() {
            let matching = required
                .iter()
                .filter(|(file, lib)| key == lib || *key == format!("{}:{}", file, lib))
                .count();
            match matching {
                0 => {
                    return Err(ArtifactError::UnknownLibrary {
                        contract: self.contract_name.clone(),
                        library: key.clone(),
                    })
                }
                1 => {}
                _ => {
                    return Err(ArtifactError::AmbiguousLibrary {
                        contract: self.contract_name.clone(),
                        library: key.clone(),
                    })
                }
            }
        }

        let mut code = self
            .bytecode
            .strip_prefix("0x")
            .unwrap_or(&self.bytecode)
            .to_string();

        for (file, lib) in &required {
            let qualified = format!("{}:{}", file, lib);
            let address = libraries
                .get(&qualified)
                .or_else(|| libraries.get(lib))
                .ok_or_else(|| ArtifactError::MissingLibrary {
                    contract: self.contract_name.clone(),
                    library: qualified.clone(),
                })?;
            let hex_address = hex::encode(address);
            for reference in &self.link_references[file][lib] {
                let start = reference.start * 2;
                let end = start + reference.length * 2;
                if reference.length != 20 || end > code.len() || !code.is_char_boundary(start) {
                    return Err(ArtifactError::InvalidBytecode {
                        contract: self.contract_name.clone(),
                        message: format!("link reference for '{}' out of range", qualified),
                    });
                }
                code.replace_range(start..end, &hex_address);
            }
        }

        if code.contains("__") {
            return Err(ArtifactError::InvalidBytecode {
                contract: self.contract_name.clone(),
                message: "bytecode still contains unlinked placeholders".to_string(),
            });
        }

        decode_hex(&code)
            .map(Bytes::from)
            .map_err(|e| ArtifactError::InvalidBytecode {
                contract: self.contract_name.clone(),
                message: e.to_string(),
            })
    }
}

/// Source of artifacts and build information for named contracts.
pub trait ArtifactResolver: Send + Sync {
    fn load_artifact(&self, contract_name: &str) -> Result<Artifact, ArtifactError>;

    /// Compiler build info for the contract, when the toolchain produced one.
    fn get_build_info(&self, contract_name: &str) -> Result<Option<Value>, ArtifactError>;
}

/// Resolves artifacts from a Hardhat `artifacts/` tree.
///
/// `Foo` is looked up as any `Foo.json` below the root; a fully-qualified
/// `contracts/Foo.sol:Foo` additionally has to match the artifact's source.
#[derive(Debug, Clone)]
pub struct FsArtifactResolver {
    root: PathBuf,
}

impl FsArtifactResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsArtifactResolver { root: root.into() }
    }

    fn find(&self, contract_name: &str) -> Result<(PathBuf, Artifact), ArtifactError> {
        let (source, name) = match contract_name.rsplit_once(':') {
            Some((source, name)) => (Some(source), name),
            None => (None, contract_name),
        };
        let file_name = format!("{}.json", name);
        let mut candidates = Vec::new();
        collect_files(&self.root, &file_name, &mut candidates)?;
        candidates.sort();

        for path in candidates {
            let artifact = Artifact::from_json_str(contract_name, &read(&path)?)?;
            if source.map_or(true, |s| s == artifact.source_name) {
                return Ok((path, artifact));
            }
        }
        Err(ArtifactError::NotFound(contract_name.to_string()))
    }
}

fn read(path: &Path) -> Result<String, ArtifactError> {
    std::fs::read_to_string(path).map_err(|e| ArtifactError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn collect_files(dir: &Path, file_name: &str, out: &mut Vec<PathBuf>) -> Result<(), ArtifactError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ArtifactError::Io {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if path.file_name().is_some_and(|n| n == "build-info") {
                continue;
            }
            collect_files(&path, file_name, out)?;
        } else if path.file_name().is_some_and(|n| n == file_name) {
            out.push(path);
        }
    }
    Ok(())
}

impl ArtifactResolver for FsArtifactResolver {
    fn load_artifact(&self, contract_name: &str) -> Result<Artifact, ArtifactError> {
        self.find(contract_name).map(|(_, artifact)| artifact)
    }

    fn get_build_info(&self, contract_name: &str) -> Result<Option<Value>, ArtifactError> {
        let (path, _) = self.find(contract_name)?;
        let dbg_path = path.with_extension("dbg.json");
        if !dbg_path.exists() {
            return Ok(None);
        }
        let dbg: Value = serde_json::from_str(&read(&dbg_path)?).map_err(|e| ArtifactError::Parse {
            name: dbg_path.display().to_string(),
            message: e.to_string(),
        })?;
        let Some(relative) = dbg.get("buildInfo").and_then(Value::as_str) else {
            return Ok(None);
        };
        let build_info_path = dbg_path
            .parent()
            .map(|p| p.join(relative))
            .unwrap_or_else(|| PathBuf::from(relative));
        let text = read(&build_info_path)?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| ArtifactError::Parse {
                name: build_info_path.display().to_string(),
                message: e.to_string(),
            })
    }
}

/// In-memory resolver, keyed by contract name.
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifactResolver {
    artifacts: BTreeMap<String, Artifact>,
    build_infos: BTreeMap<String, Value>,
}

impl MemoryArtifactResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, artifact: Artifact) {
        self.artifacts
            .insert(artifact.contract_name.clone(), artifact);
    }

    pub fn insert_build_info(&mut self, contract_name: &str, build_info: Value) {
        self.build_infos
            .insert(contract_name.to_string(), build_info);
    }
}

impl ArtifactResolver for MemoryArtifactResolver {
    fn load_artifact(&self, contract_name: &str) -> Result<Artifact, ArtifactError> {
        self.artifacts
            .get(contract_name)
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound(contract_name.to_string()))
    }

    fn get_build_info(&self, contract_name: &str) -> Result<Option<Value>, ArtifactError> {
        Ok(self.build_infos.get(contract_name).cloned())
    }
}
