//! Persistent Boot Data
//!
//! This crate owns the auxiliary data vector (ADV): the two-sector blob that
//! carries boot-time settings (a one-shot boot command, the last menu
//! selection) across reboots.
//!
//! # Architecture
//!
//! - [`adv`] - the in-memory blob: record layout, checksums, edits
//! - [`storage`] - where the blob lives on disk
//!   - [`storage::file::FileStore`] - the tail of the installed boot file
//!   - [`storage::raw::RawStore`] - a fixed byte range of a block device
//! - [`io`] - byte-granular access on top of sector-granular `BlockIo`
//!
//! Both copies of the ADV are always written together; a reader accepts the
//! blob as long as either copy is consistent.

pub mod adv;
pub mod error;
pub mod io;
pub mod storage;

pub use adv::{Adv, ADV_SIZE};
pub use error::{AdvError, Result};
pub use storage::AdvStore;
