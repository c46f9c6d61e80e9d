//! End-to-end wallet test suite.
//!
//! Flows run against [`helpers::Ledger`], an in-memory indexer that applies
//! broadcast transactions to its UTXO set, tracks SLP token outputs and
//! serves per-address history.

pub mod helpers;
