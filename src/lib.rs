// Core campaign and transaction types used throughout fundgraphs
pub mod types;

// CashAddr codec: hash160 <-> display address, locking-script recognition
pub mod cashaddr;

// Transaction data source trait with the Chaingraph GraphQL connector
pub mod data_sources;

// Raw campaign ingestion: field coercion, content-hash ids, enrichment
pub mod ingest;

// Entity extraction and resolution against the alias table
pub mod entities;

// Recipient address aggregation and multi-campaign detection
pub mod recipients;

// Module for building the funding graph and the renderer-facing node/edge lists
pub mod graph;
