// database/domains/model.rs - models written by the scanning tools

use super::DomainDocument;
use crate::schema::{
    CERTGRAPH_DOMAINS, COMPANY_DOMAINS, CROSSLINKED_DOMAINS, CURRENT_DOMAINS, HISTORICAL_DOMAINS,
    LYNX_DOMAINS,
};
use mongodb::bson::{DateTime, Document};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Registrant {
    #[serde(default)]
    pub identificacion: String,
}

// Latest known state of a domain, one per dominio
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CurrentDomain {
    pub dominio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registrante: Option<Registrant>,
    #[serde(default)]
    pub ips: Vec<String>,
    #[serde(flatten)]
    pub detalles: Document,
}

impl DomainDocument for CurrentDomain {
    const COLLECTION: &'static str = CURRENT_DOMAINS;
}

// One observation of a domain at `fecha`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoricalSnapshot {
    pub dominio: String,
    pub fecha: DateTime,
    #[serde(flatten)]
    pub detalles: Document,
}

impl HistoricalSnapshot {
    pub fn now(dominio: impl Into<String>) -> Self {
        Self::at(dominio, DateTime::now())
    }

    pub fn at(dominio: impl Into<String>, fecha: DateTime) -> Self {
        Self {
            dominio: dominio.into(),
            fecha,
            detalles: Document::new(),
        }
    }
}

impl DomainDocument for HistoricalSnapshot {
    const COLLECTION: &'static str = HISTORICAL_DOMAINS;
}

/// Binds a tool result to the collection its tool writes.
pub trait Tool {
    const COLLECTION: &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lynx;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Certgraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crosslinked;

impl Tool for Lynx {
    const COLLECTION: &'static str = LYNX_DOMAINS;
}

impl Tool for Certgraph {
    const COLLECTION: &'static str = CERTGRAPH_DOMAINS;
}

impl Tool for Crosslinked {
    const COLLECTION: &'static str = CROSSLINKED_DOMAINS;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(bound = "")]
pub struct ToolResult<T> {
    pub dominio: String,
    #[serde(flatten)]
    pub resultado: Document,
    #[serde(skip)]
    tool: PhantomData<T>,
}

impl<T> ToolResult<T> {
    pub fn new(dominio: impl Into<String>, resultado: Document) -> Self {
        Self {
            dominio: dominio.into(),
            resultado,
            tool: PhantomData,
        }
    }
}

impl<T: Tool> DomainDocument for ToolResult<T> {
    const COLLECTION: &'static str = T::COLLECTION;
}

pub type LynxResult = ToolResult<Lynx>;
pub type CertgraphResult = ToolResult<Certgraph>;
pub type CrosslinkedResult = ToolResult<Crosslinked>;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Company {
    #[serde(default)]
    pub nif: String,
    #[serde(default)]
    pub denominacion: String,
}

// OpenData enrichment for a domain's registrant
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CompanyDomain {
    pub dominio: String,
    pub empresa: Company,
    #[serde(default)]
    pub termino_busqueda: String,
}

impl DomainDocument for CompanyDomain {
    const COLLECTION: &'static str = COMPANY_DOMAINS;
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, from_document, to_document};

    #[test]
    fn tool_results_land_in_their_own_collection() {
        assert_eq!(LynxResult::COLLECTION, "dominios_lynx");
        assert_eq!(CertgraphResult::COLLECTION, "dominios_certgraph");
        assert_eq!(CrosslinkedResult::COLLECTION, "dominios_crosslinked");
    }

    #[test]
    fn tool_result_flattens_tool_output() {
        let result = CertgraphResult::new("example.com", doc! { "certificados": [] });
        let document = to_document(&result).unwrap();
        assert_eq!(document, doc! { "dominio": "example.com", "certificados": [] });
    }

    #[test]
    fn current_domain_keeps_unmodelled_fields() {
        let document = doc! {
            "dominio": "example.com",
            "registrante": { "identificacion": "B12345678" },
            "ips": ["192.0.2.1"],
            "titular": "Example SL",
        };
        let current: CurrentDomain = from_document(document).unwrap();
        assert_eq!(current.registrante.unwrap().identificacion, "B12345678");
        assert_eq!(current.detalles.get_str("titular").unwrap(), "Example SL");
    }

    #[test]
    fn snapshot_keeps_the_full_observation() {
        let fecha = DateTime::from_millis(1_700_000_000_000);
        let document = doc! {
            "dominio": "example.com",
            "fecha": fecha,
            "dns": { "A": ["192.0.2.1"] },
            "subdominios": ["www.example.com"],
        };

        let snapshot: HistoricalSnapshot = from_document(document.clone()).unwrap();
        assert_eq!(snapshot.fecha, fecha);
        assert_eq!(snapshot.detalles.get_array("subdominios").unwrap().len(), 1);
        assert!(snapshot.detalles.get_document("dns").is_ok());
        assert_eq!(to_document(&snapshot).unwrap(), document);
    }

    #[test]
    fn company_fields_nest_under_empresa() {
        let company = CompanyDomain {
            dominio: "example.com".to_string(),
            empresa: Company {
                nif: "B12345678".to_string(),
                denominacion: "Example SL".to_string(),
            },
            termino_busqueda: "example".to_string(),
        };
        let document = to_document(&company).unwrap();
        assert_eq!(
            document.get_document("empresa").unwrap().get_str("nif").unwrap(),
            "B12345678"
        );
    }
}
