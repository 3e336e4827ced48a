// database/schema.rs - collection and index declarations for dominios_db

use serde::Serialize;

pub const DATABASE_NAME: &str = "dominios_db";

pub const CURRENT_DOMAINS: &str = "dominios_actuales";
pub const HISTORICAL_DOMAINS: &str = "dominios_historico";
pub const LYNX_DOMAINS: &str = "dominios_lynx";
pub const CERTGRAPH_DOMAINS: &str = "dominios_certgraph";
pub const CROSSLINKED_DOMAINS: &str = "dominios_crosslinked";
pub const COMPANY_DOMAINS: &str = "dominios_empresa";
pub const PENDING_DOMAINS: &str = "dominios_pendientes";

/// A single-field ascending index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexSpec {
    pub field: &'static str,
    pub unique: bool,
}

impl IndexSpec {
    pub const fn unique(field: &'static str) -> Self {
        Self {
            field,
            unique: true,
        }
    }

    pub const fn ascending(field: &'static str) -> Self {
        Self {
            field,
            unique: false,
        }
    }

    /// Name the store assigns to this index when none is given, e.g. `dominio_1`.
    pub fn name(&self) -> String {
        format!("{}_1", self.field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollectionSpec {
    pub name: &'static str,
    pub indexes: &'static [IndexSpec],
}

impl CollectionSpec {
    pub fn index(&self, field: &str) -> Option<&IndexSpec> {
        self.indexes.iter().find(|index| index.field == field)
    }
}

pub const DOMAIN_SCHEMA: &[CollectionSpec] = &[
    CollectionSpec {
        name: CURRENT_DOMAINS,
        indexes: &[
            IndexSpec::unique("dominio"),
            IndexSpec::ascending("registrante.identificacion"),
            IndexSpec::ascending("ips"),
        ],
    },
    // Append-only log, one document per observation.
    CollectionSpec {
        name: HISTORICAL_DOMAINS,
        indexes: &[IndexSpec::ascending("dominio"), IndexSpec::ascending("fecha")],
    },
    CollectionSpec {
        name: LYNX_DOMAINS,
        indexes: &[IndexSpec::unique("dominio")],
    },
    CollectionSpec {
        name: CERTGRAPH_DOMAINS,
        indexes: &[IndexSpec::unique("dominio")],
    },
    CollectionSpec {
        name: CROSSLINKED_DOMAINS,
        indexes: &[IndexSpec::unique("dominio")],
    },
    CollectionSpec {
        name: COMPANY_DOMAINS,
        indexes: &[
            IndexSpec::unique("dominio"),
            IndexSpec::ascending("empresa.nif"),
            IndexSpec::ascending("empresa.denominacion"),
            IndexSpec::ascending("termino_busqueda"),
        ],
    },
    CollectionSpec {
        name: PENDING_DOMAINS,
        indexes: &[
            IndexSpec::unique("dominio"),
            IndexSpec::ascending("procesado_por.main"),
            IndexSpec::ascending("procesado_por.lynx"),
            IndexSpec::ascending("procesado_por.certgraph"),
            IndexSpec::ascending("procesado_por.opendata"),
        ],
    },
];
