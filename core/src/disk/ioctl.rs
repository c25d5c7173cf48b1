// Linux block device and filesystem ioctls

use nix::libc::{c_char, c_int, c_long, c_uint, c_ulong};
use nix::{
    ioctl_read, ioctl_read_bad, ioctl_readwrite_bad, ioctl_write_ptr, request_code_none,
};

/// `struct hd_geometry` from <linux/hdreg.h>
#[repr(C)]
#[derive(Debug, Default)]
pub struct HdGeometry {
    pub heads: u8,
    pub sectors: u8,
    pub cylinders: u16,
    pub start: c_ulong,
}

/// `struct floppy_struct` from <linux/fd.h>
#[repr(C)]
#[derive(Debug)]
pub struct FloppyStruct {
    pub size: c_uint,
    pub sect: c_uint,
    pub head: c_uint,
    pub track: c_uint,
    pub stretch: c_uint,
    pub gap: u8,
    pub rate: u8,
    pub spec1: u8,
    pub fmt_gap: u8,
    pub name: *const c_char,
}

impl Default for FloppyStruct {
    fn default() -> Self {
        Self {
            size: 0,
            sect: 0,
            head: 0,
            track: 0,
            stretch: 0,
            gap: 0,
            rate: 0,
            spec1: 0,
            fmt_gap: 0,
            name: core::ptr::null(),
        }
    }
}

// Geometry
ioctl_read_bad!(hdio_getgeo, 0x0301, HdGeometry);
ioctl_read!(fdgetprm, 2, 0x04, FloppyStruct);

// Device size
ioctl_read!(blkgetsize64, 0x12, 114, u64);
ioctl_read_bad!(blkgetsize, request_code_none!(0x12, 96), c_ulong);

// Block mapping
ioctl_readwrite_bad!(fibmap, request_code_none!(0x00, 1), c_int);
ioctl_read_bad!(figetbsz, request_code_none!(0x00, 2), c_int);

// Inode flags (ext2/3/4)
pub const FS_IMMUTABLE_FL: c_long = 0x0000_0010;
ioctl_read!(fs_ioc_getflags, b'f', 1, c_long);
ioctl_write_ptr!(fs_ioc_setflags, b'f', 2, c_long);

// FAT attributes
pub const ATTR_RO: u32 = 0x01;
pub const ATTR_HIDDEN: u32 = 0x02;
pub const ATTR_SYS: u32 = 0x04;
ioctl_write_ptr!(fat_ioctl_set_attributes, b'r', 0x11, u32);
