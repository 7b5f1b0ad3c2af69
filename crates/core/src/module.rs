//! Module description intake.
//!
//! The authoring DSL lives outside this crate; what reaches the engine is its
//! JSON output. Loading a module flattens submodules and qualifies every id
//! so the rest of the pipeline only ever sees `<module>#<local>` ids.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::argument::ParameterRef;
use crate::error::GraphError;
use crate::future::Future;

/// Values supplied for module parameters: `{module: {name: value}}`.
pub type ModuleParameters = BTreeMap<String, BTreeMap<String, Value>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescription {
    pub id: String,
    #[serde(default)]
    pub futures: Vec<Future>,
    #[serde(default)]
    pub submodules: Vec<ModuleDescription>,
}

impl ModuleDescription {
    pub fn from_json_str(json: &str) -> Result<ModuleDescription, GraphError> {
        let module: ModuleDescription =
            serde_json::from_str(json).map_err(|e| GraphError::InvalidModule(e.to_string()))?;
        module.check_ids()?;
        Ok(module)
    }

    pub fn from_path(path: &Path) -> Result<ModuleDescription, GraphError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            GraphError::InvalidModule(format!("cannot read '{}': {}", path.display(), e))
        })?;
        ModuleDescription::from_json_str(&text)
    }

    fn check_ids(&self) -> Result<(), GraphError> {
        if self.id.is_empty() || self.id.contains('#') {
            return Err(GraphError::InvalidModule(format!(
                "module id '{}' must be non-empty and must not contain '#'",
                self.id
            )));
        }
        self.submodules.iter().try_for_each(|m| m.check_ids())
    }

    /// Flatten this module and its submodules into qualified futures,
    /// submodules first, each module's futures in declaration order.
    pub fn into_futures(self) -> Vec<Future> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(self, out: &mut Vec<Future>) {
        for sub in self.submodules {
            sub.flatten_into(out);
        }
        for mut future in self.futures {
            future.qualify(&self.id);
            out.push(future);
        }
    }
}

/// Look a parameter up in the supplied values, falling back to its default.
pub fn resolve_parameter(params: &ModuleParameters, param: &ParameterRef) -> Option<Value> {
    params
        .get(&param.module)
        .and_then(|m| m.get(&param.name))
        .cloned()
        .or_else(|| param.default.clone())
}

/// Read a parameters file. A missing path means no parameters.
pub fn load_parameters(path: Option<&Path>) -> Result<ModuleParameters, GraphError> {
    let Some(path) = path else {
        return Ok(ModuleParameters::new());
    };
    let text = std::fs::read_to_string(path).map_err(|e| {
        GraphError::InvalidModule(format!(
            "cannot read parameters '{}': {}",
            path.display(),
            e
        ))
    })?;
    serde_json::from_str(&text)
        .map_err(|e| GraphError::InvalidModule(format!("invalid parameters file: {}", e)))
}
