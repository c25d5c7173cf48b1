//! `/etc/mtab` and `/proc/mounts` parsing

use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

pub const MTAB: &str = "/etc/mtab";
pub const PROC_MOUNTS: &str = "/proc/mounts";

const SUBVOL_OPT: &[u8] = b"subvol=";

/// One mount table line. Names are kept as raw bytes, they are paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub fsname: PathBuf,
    pub dir: PathBuf,
    pub fstype: String,
    pub options: OsString,
}

impl MountEntry {
    /// Value of the btrfs `subvol=` option, if any
    pub fn subvol(&self) -> Option<&OsStr> {
        self.options
            .as_bytes()
            .split(|&b| b == b',')
            .find_map(|opt| opt.strip_prefix(SUBVOL_OPT))
            .map(OsStr::from_bytes)
    }
}

/// Undo the `\ooo` octal escapes used for blanks and backslashes
pub fn unescape(field: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(field.len());
    let mut i = 0;

    while i < field.len() {
        if field[i] == b'\\' {
            if let Some(digits) = field.get(i + 1..i + 4) {
                if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                    let value = digits
                        .iter()
                        .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                    if let Ok(byte) = u8::try_from(value) {
                        out.push(byte);
                        i += 4;
                        continue;
                    }
                }
            }
        }
        out.push(field[i]);
        i += 1;
    }

    out
}

fn os_field(field: &[u8]) -> OsString {
    OsString::from_vec(unescape(field))
}

/// Parse one line; comments and short lines yield `None`
pub fn parse_line(line: &[u8]) -> Option<MountEntry> {
    let mut fields = line
        .split(|b| b.is_ascii_whitespace())
        .filter(|field| !field.is_empty());

    let first = fields.next()?;
    if first.starts_with(b"#") {
        return None;
    }

    let fsname = PathBuf::from(os_field(first));
    let dir = PathBuf::from(os_field(fields.next()?));
    let fstype = String::from_utf8_lossy(&unescape(fields.next()?)).into_owned();
    let options = fields.next().map(os_field).unwrap_or_default();

    Some(MountEntry {
        fsname,
        dir,
        fstype,
        options,
    })
}

pub fn parse(content: &[u8]) -> Vec<MountEntry> {
    content.split(|&b| b == b'\n').filter_map(parse_line).collect()
}

/// Read a mount table. A missing table is not an error, just empty.
pub fn read(path: &Path) -> io::Result<Vec<MountEntry>> {
    match fs::read(path) {
        Ok(content) => Ok(parse(&content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}
