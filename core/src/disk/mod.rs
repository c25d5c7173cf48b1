//! Block device access
//!
//! - [`device::BlockDevice`] - the opened target device, as a `BlockIo`
//! - [`geometry`] - CHS geometry and device size probing

pub mod device;
pub mod geometry;
pub(crate) mod ioctl;

pub use device::BlockDevice;
pub use geometry::{Geometry, GeometryOverrides, GeometrySource, ProbedGeometry};

/// Sector size assumed everywhere in the boot path
pub const SECTOR_SIZE: usize = 512;
pub const SECTOR_SHIFT: u32 = 9;
