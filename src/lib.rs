//! This crate backs up a WebDAV folder (e.g. the Collectives folder of a Nextcloud instance).
//!
//! Its core is made of two operations, that only talk to the server through the [`DavSource`](traits::DavSource) trait:
//! * [`mirror`](mirror::mirror) recursively reproduces a remote folder into a local directory
//! * [`prune`](prune::prune) deletes all but the most recent archives of a remote folder
//!
//! A real server is reached with a [`Client`](client::Client). An in-memory namespace is available as [`MemoryDav`](memory::MemoryDav). \
//! These are glued together by the [`backup`] module, that mirrors, zips, uploads, rotates and cleans up.

pub mod traits;
pub mod error;
pub use error::{DavError, MirrorError, PruneError};
pub mod node;
pub use node::RemoteNode;
pub mod multistatus;

pub mod mirror;
pub mod prune;
pub mod archive;
pub mod backup;

pub mod client;
pub mod memory;
pub mod mock_behaviour;
pub mod resource;

pub mod config;
pub mod progress;
pub mod utils;
