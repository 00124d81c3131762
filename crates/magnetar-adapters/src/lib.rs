#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links)]
#![warn(missing_docs)]

//! HTTP adapters for the download and library capabilities.
//!
//! Layout: `transmission/` (JSON-RPC client and wire types), `plex/`
//! (section refresh client), `error.rs` (transport failures mapped onto
//! backend errors).

pub mod error;
pub mod plex;
pub mod transmission;

pub use error::AdapterError;
pub use plex::PlexClient;
pub use transmission::{SESSION_HEADER, TransmissionClient, map_status};
