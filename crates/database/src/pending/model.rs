// database/pending/model.rs - model for the dominios_pendientes collection

use crate::domains::DomainDocument;
use crate::schema::PENDING_DOMAINS;
use serde::{Deserialize, Serialize};

/// Per-tool completion flags. Claim markers written by the tools alongside
/// these flags are not modelled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ProcessingFlags {
    #[serde(default)]
    pub main: bool,
    #[serde(default)]
    pub lynx: bool,
    #[serde(default)]
    pub certgraph: bool,
    #[serde(default)]
    pub opendata: bool,
}

impl ProcessingFlags {
    pub fn is_complete(&self) -> bool {
        self.main && self.lynx && self.certgraph && self.opendata
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PendingDomain {
    pub dominio: String,
    #[serde(default)]
    pub titular: String,
    #[serde(default)]
    pub identificacion: String,
    #[serde(default)]
    pub procesado_por: ProcessingFlags,
}

impl PendingDomain {
    pub fn new(dominio: impl Into<String>) -> Self {
        Self {
            dominio: dominio.into(),
            ..Default::default()
        }
    }
}

impl DomainDocument for PendingDomain {
    const COLLECTION: &'static str = PENDING_DOMAINS;
}
