// database/pending/mod.rs - the dominios_pendientes work queue

pub mod model;
