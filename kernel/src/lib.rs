// SafeRoute Kernel
//
// Versioned storage for map annotations: a mutable draft of markers
// and polygons, committed into immutable per-map snapshots that can
// be loaded or restored.

pub mod audit;
pub mod config;
pub mod draft;
pub mod editor;
pub mod ledger;
pub mod service;
pub mod snapshot;
pub mod store;
