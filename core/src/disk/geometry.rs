//! CHS geometry probing
//!
//! The boot sector carries a FAT-style geometry even on non-FAT targets
//! because the early boot code shares the FAT bootstrap. Sources, in order:
//!
//! 1. `HDIO_GETGEO` (hard disks and partitions)
//! 2. `FDGETPRM` (floppy drives)
//! 3. an exact match against standard media sizes
//! 4. 64 heads / 32 sectors, the USB-ZIP layout
//!
//! Heads/sectors given on the command line always win.

use std::fs::File;
use std::os::fd::AsRawFd;

use super::{ioctl, SECTOR_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub heads: u32,
    pub sectors: u32,
    pub cylinders: u32,
    /// Hidden sectors before the filesystem (partition start)
    pub start: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometrySource {
    Native,
    Floppy,
    StandardTable,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbedGeometry {
    pub geometry: Geometry,
    pub source: GeometrySource,
}

/// User supplied heads/sectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeometryOverrides {
    pub heads: Option<u32>,
    pub sectors: Option<u32>,
}

impl GeometryOverrides {
    /// USB-ZIP drive layout
    pub const ZIPDRIVE: Self = Self {
        heads: Some(64),
        sectors: Some(32),
    };

    pub fn is_empty(&self) -> bool {
        self.heads.is_none() && self.sectors.is_none()
    }

    fn apply(&self, geo: &mut Geometry) {
        if let Some(heads) = self.heads {
            geo.heads = heads;
        }
        if let Some(sectors) = self.sectors {
            geo.sectors = sectors;
        }
    }
}

const FALLBACK_HEADS: u32 = 64;
const FALLBACK_SECTORS: u32 = 32;

struct StandardGeometry {
    bytes: u64,
    heads: u32,
    sectors: u32,
    cylinders: u32,
}

const fn kib(heads: u32, sectors: u32, cylinders: u32, size_kib: u64) -> StandardGeometry {
    StandardGeometry {
        bytes: size_kib * 1024,
        heads,
        sectors,
        cylinders,
    }
}

/// Standard floppy sizes plus LS-120
const STANDARD_GEOMETRIES: &[StandardGeometry] = &[
    kib(2, 9, 40, 360),
    kib(2, 9, 80, 720),
    kib(2, 15, 80, 1200),
    kib(2, 18, 80, 1440),
    kib(2, 21, 80, 1680),
    kib(2, 21, 80, 1722),
    kib(2, 36, 80, 2880),
    kib(2, 48, 80, 3840),
    kib(8, 32, 963, 123264),
];

/// Exact match against known media sizes
pub fn lookup_standard(total_bytes: u64) -> Option<Geometry> {
    STANDARD_GEOMETRIES
        .iter()
        .find(|g| g.bytes == total_bytes)
        .map(|g| Geometry {
            heads: g.heads,
            sectors: g.sectors,
            cylinders: g.cylinders,
            start: 0,
        })
}

/// Last resort: 64/32 (or the overrides), cylinders derived from the size
pub fn fallback(total_bytes: u64, overrides: GeometryOverrides) -> Geometry {
    let heads = overrides.heads.unwrap_or(FALLBACK_HEADS);
    let sectors = overrides.sectors.unwrap_or(FALLBACK_SECTORS);
    let track_bytes = u64::from(heads) * u64::from(sectors) * SECTOR_SIZE as u64;
    let cylinders = total_bytes.checked_div(track_bytes).unwrap_or(0);

    Geometry {
        heads,
        sectors,
        cylinders: u32::try_from(cylinders).unwrap_or(u32::MAX),
        start: 0,
    }
}

fn native(file: &File) -> Option<Geometry> {
    let mut geo = ioctl::HdGeometry::default();
    // SAFETY: file is open, geo is a correctly sized hd_geometry
    unsafe { ioctl::hdio_getgeo(file.as_raw_fd(), &mut geo) }.ok()?;

    Some(Geometry {
        heads: u32::from(geo.heads),
        sectors: u32::from(geo.sectors),
        cylinders: u32::from(geo.cylinders),
        start: u64::from(geo.start),
    })
}

fn floppy(file: &File) -> Option<Geometry> {
    let mut fd_str = ioctl::FloppyStruct::default();
    // SAFETY: file is open, fd_str is a correctly sized floppy_struct
    unsafe { ioctl::fdgetprm(file.as_raw_fd(), &mut fd_str) }.ok()?;

    Some(Geometry {
        heads: fd_str.head,
        sectors: fd_str.sect,
        cylinders: fd_str.track,
        start: 0,
    })
}

/// Determine the geometry of `file`. Never fails.
pub fn probe(file: &File, total_bytes: u64, overrides: GeometryOverrides) -> ProbedGeometry {
    let (mut geometry, source) = if let Some(geo) = native(file) {
        (geo, GeometrySource::Native)
    } else if let Some(geo) = floppy(file) {
        (geo, GeometrySource::Floppy)
    } else {
        from_size(total_bytes, overrides)
    };

    overrides.apply(&mut geometry);

    log::debug!(
        "geometry ({:?}): heads = {}, sectors = {}, cylinders = {}, start = {}",
        source,
        geometry.heads,
        geometry.sectors,
        geometry.cylinders,
        geometry.start
    );

    ProbedGeometry { geometry, source }
}

/// Size based part of the probe, for devices that answer no ioctl
pub fn from_size(total_bytes: u64, overrides: GeometryOverrides) -> (Geometry, GeometrySource) {
    if let Some(geo) = lookup_standard(total_bytes) {
        return (geo, GeometrySource::StandardTable);
    }

    let geo = fallback(total_bytes, overrides);
    if overrides.is_empty() {
        log::warn!(
            "unable to obtain device geometry (defaulting to {} heads, {} sectors)",
            geo.heads,
            geo.sectors
        );
        log::warn!("(on hard disks, this is usually harmless.)");
    }
    (geo, GeometrySource::Fallback)
}
