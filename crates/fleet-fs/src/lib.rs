//! Shared-state filesystem layer for fleet-sync
//!
//! Every participating machine reads and writes one shared filesystem
//! location (a mounted or cloud-synced folder). This crate owns the layout of
//! that location and the I/O discipline for touching it: atomic
//! write-temp-then-rename with advisory locking, retried reads for synced
//! storage, and content checksums.

pub mod checksum;
pub mod error;
pub mod io;
pub mod layout;

pub use checksum::{file_checksum, sha256_hex};
pub use error::{Error, Result};
pub use io::{read_json, read_text, write_atomic, write_json, write_text};
pub use layout::SharedRoot;
