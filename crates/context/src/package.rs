use std::path::{Path, PathBuf};

use luxport_common::ParamSet;
use serde::{Deserialize, Serialize};

use crate::sink::ContextError;
use crate::statement::Statement;

/// One statement in a packaged document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    /// Statement sub-type such as the material or volume kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub params: ParamSet,
}

/// Ordered record document written when a package is closed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageDocument {
    pub version: u32,
    pub records: Vec<PackageRecord>,
}

/// Packaging sink: accumulates statements as records and writes them as a
/// single JSON document on close. Used to share a material with its textures
/// and volumes.
pub struct PackageContext {
    path: Option<PathBuf>,
    document: PackageDocument,
    closed: bool,
}

impl PackageContext {
    /// Package written to `path` on close.
    pub fn create(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            document: PackageDocument {
                version: 1,
                records: Vec::new(),
            },
            closed: false,
        }
    }

    /// Package kept in memory only.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            document: PackageDocument {
                version: 1,
                records: Vec::new(),
            },
            closed: false,
        }
    }

    pub fn document(&self) -> &PackageDocument {
        &self.document
    }

    pub fn emit(&mut self, statement: &Statement) -> Result<(), ContextError> {
        if self.closed {
            return Err(ContextError::Closed);
        }
        let variant = match statement {
            Statement::Texture { kind, variant, .. } => Some(format!("{variant}:{kind}")),
            Statement::Material { kind, .. } | Statement::MakeNamedVolume { kind, .. } => {
                Some(kind.clone())
            }
            _ => None,
        };
        self.document.records.push(PackageRecord {
            kind: statement.keyword().to_string(),
            name: statement.name().unwrap_or_default().to_string(),
            variant,
            params: statement.params().cloned().unwrap_or_default(),
        });
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, ContextError> {
        Ok(serde_json::to_string_pretty(&self.document)?)
    }

    pub fn close(&mut self) -> Result<(), ContextError> {
        if self.closed {
            return Ok(());
        }
        if let Some(path) = &self.path {
            let file = std::fs::File::create(path)?;
            serde_json::to_writer_pretty(file, &self.document)?;
            tracing::debug!(path = %path.display(), records = self.document.records.len(), "package written");
        }
        self.closed = true;
        Ok(())
    }
}
