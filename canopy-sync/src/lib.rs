//! # canopy-sync
//!
//! Remote project-config stores and the one-way [`RemoteSyncer`].
//!
//! Two [`canopy_core::RemoteStore`] implementations ship here: a JSON document
//! on disk ([`FileRemoteStore`]) and a workspace master reached over HTTP
//! ([`HttpRemoteStore`]).

pub mod error;
pub mod file_store;
pub mod http_store;
pub mod syncer;

pub use error::SyncError;
pub use file_store::{FileRemoteStore, StoreDocument};
pub use http_store::{HttpRemoteStore, DEFAULT_TIMEOUT};
pub use syncer::{RemoteSyncer, SyncAction, SyncReport};
