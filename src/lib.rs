//! Model Sizes - size cache reconciliation and retry engine
//!
//! Keeps a persisted cache of byte sizes for every entry of a hierarchical
//! model catalog, resolved against a Hugging Face compatible hub: finds
//! missing, orphaned and failed records, and re-resolves failures.

pub mod catalog;
pub mod config;
pub mod document;
pub mod error;
pub mod hub;
pub mod key;
pub mod reconcile;
pub mod report;
pub mod retry;
pub mod store;

pub use catalog::{Catalog, CatalogEntry, CatalogModel};
pub use config::{HubConfig, SizeCacheConfig};
pub use document::{CacheDocument, Inconsistency, SizeRecord, bytes_to_gb};
pub use error::{ResolveError, SizeCacheError, SizeCacheResult};
pub use hub::{HubClient, HubToken, RemoteEntry, RemoteMetadataClient, SizeResolver};
pub use key::derive_key;
pub use reconcile::{DiffReport, Reconciler, prune_orphans, reconcile};
pub use retry::{RetryEngine, RetryOutcome, RetryPlan, RetrySummary};
pub use store::{FileSystemStorage, SizeCacheStore, StorageBackend};
