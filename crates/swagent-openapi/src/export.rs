//! Offline export of a contract's schema table.

use crate::error::Result;
use crate::types::{ApiInfo, Endpoint, FunctionSchema};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// JSON document written by [`crate::ApiContract::export`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContractExport {
    pub api_info: ApiInfo,
    pub function_schemas: Vec<FunctionSchema>,
    pub endpoints: Vec<Endpoint>,
}

impl ContractExport {
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(
            "Exported {} function schemas to {}",
            self.function_schemas.len(),
            path.display()
        );
        Ok(())
    }

    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn function_names(&self) -> Vec<&str> {
        self.function_schemas.iter().map(|s| s.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ContractExport::read_from(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, crate::error::OpenApiError::IoError(_)));
    }
}
