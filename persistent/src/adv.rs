//! Auxiliary data vector
//!
//! Two identical 512-byte copies. Each copy is laid out as:
//!
//! ```text
//! 0    magic1 (0x5a2d2fa5)
//! 4    checksum
//! 8    500 bytes of records: tag(u8) len(u8) data[len], tag 0 terminates
//! 508  magic3 (0xdd28bf64)
//! ```
//!
//! A copy is consistent when both magics match and the wrapping sum of the
//! words from offset 4 up to magic3 equals magic2.

use crate::error::{AdvError, Result};

/// Size of one ADV copy
pub const ADV_SIZE: usize = 512;

/// Bytes available for records in one copy
pub const ADV_LEN: usize = ADV_SIZE - 3 * 4;

const ADV_MAGIC1: u32 = 0x5a2d2fa5;
const ADV_MAGIC2: u32 = 0xa3041767;
const ADV_MAGIC3: u32 = 0xdd28bf64;

const DATA_OFFSET: usize = 8;

/// End of records
pub const ADV_END: u8 = 0;
/// Command line to boot exactly once
pub const ADV_BOOTONCE: u8 = 1;
/// Last selected menu label
pub const ADV_MENUSAVE: u8 = 2;

/// Human readable name of a tag, used in error messages
pub fn tag_name(tag: u8) -> &'static str {
    match tag {
        ADV_BOOTONCE => "boot-once command",
        ADV_MENUSAVE => "menu-save label",
        _ => "ADV record",
    }
}

#[inline]
fn get_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

#[inline]
fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Check one 512-byte copy
fn consistent(copy: &[u8]) -> bool {
    if get_u32(copy, 0) != ADV_MAGIC1 || get_u32(copy, ADV_SIZE - 4) != ADV_MAGIC3 {
        return false;
    }

    let csum = (4..ADV_SIZE - 4)
        .step_by(4)
        .fold(0u32, |acc, off| acc.wrapping_add(get_u32(copy, off)));

    csum == ADV_MAGIC2
}

/// Both ADV copies, always kept identical
#[derive(Clone, PartialEq, Eq)]
pub struct Adv {
    buf: [u8; 2 * ADV_SIZE],
}

impl core::fmt::Debug for Adv {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Adv")
            .field("bootonce", &self.get(ADV_BOOTONCE))
            .field("menusave", &self.get(ADV_MENUSAVE))
            .finish()
    }
}

impl Default for Adv {
    fn default() -> Self {
        Self::new()
    }
}

impl Adv {
    /// Empty, correctly checksummed ADV
    pub fn new() -> Self {
        let mut adv = Self {
            buf: [0; 2 * ADV_SIZE],
        };
        adv.reset();
        adv
    }

    /// Accept a raw 1024-byte blob if either copy is consistent.
    ///
    /// The good copy is mirrored over the bad one.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 2 * ADV_SIZE {
            return Err(AdvError::BadLength {
                expected: 2 * ADV_SIZE,
                actual: bytes.len(),
            });
        }

        let mut buf = [0u8; 2 * ADV_SIZE];
        buf.copy_from_slice(bytes);

        if consistent(&buf[..ADV_SIZE]) {
            buf.copy_within(..ADV_SIZE, ADV_SIZE);
        } else if consistent(&buf[ADV_SIZE..]) {
            log::warn!("primary ADV copy damaged, using backup copy");
            buf.copy_within(ADV_SIZE.., 0);
        } else {
            return Err(AdvError::Corrupt);
        }

        Ok(Self { buf })
    }

    /// Drop every record
    pub fn reset(&mut self) {
        self.buf.fill(0);
        self.seal();
    }

    /// Raw bytes of both copies, ready to be written
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    fn data(&self) -> &[u8] {
        &self.buf[DATA_OFFSET..DATA_OFFSET + ADV_LEN]
    }

    /// Payload stored under `tag`, if any
    pub fn get(&self, tag: u8) -> Option<&[u8]> {
        let data = self.data();
        let mut p = 0;

        while p + 2 <= ADV_LEN {
            let ptag = data[p];
            let plen = data[p + 1] as usize;

            if ptag == ADV_END || p + 2 + plen > ADV_LEN {
                return None;
            }
            if ptag == tag {
                return Some(&data[p + 2..p + 2 + plen]);
            }
            p += plen + 2;
        }

        None
    }

    /// Replace the record stored under `tag`.
    ///
    /// An empty `value` deletes the record. On failure the ADV is left
    /// untouched.
    pub fn set(&mut self, tag: u8, value: &[u8]) -> Result<()> {
        if tag == ADV_END {
            return Err(AdvError::InvalidTag(tag));
        }
        if value.len() > u8::MAX as usize {
            return Err(AdvError::TooLarge(value.len()));
        }

        let mut tmp = [0u8; ADV_LEN];
        tmp.copy_from_slice(self.data());

        // (p, left): where the new record goes and how much room is there.
        // rleft: bytes still to scan, which shrinks on deletion too.
        let mut p = 0;
        let mut left = ADV_LEN;
        let mut rleft = ADV_LEN;

        while rleft >= 2 {
            let ptag = tmp[p];
            let plen = tmp[p + 1] as usize + 2;

            if ptag == ADV_END {
                break;
            }

            if ptag == tag {
                if plen >= rleft {
                    break;
                }
                tmp.copy_within(p + plen..p + rleft, p);
                rleft -= plen;
            } else {
                if plen > rleft {
                    // Overrunning record, overwrite from here
                    break;
                }
                left -= plen;
                rleft -= plen;
                p += plen;
            }
        }

        if !value.is_empty() {
            if left < value.len() + 2 {
                return Err(AdvError::NoSpace(tag_name(tag)));
            }

            tmp[p] = tag;
            tmp[p + 1] = value.len() as u8;
            tmp[p + 2..p + 2 + value.len()].copy_from_slice(value);
            p += value.len() + 2;
        }

        tmp[p..].fill(0);

        self.buf[DATA_OFFSET..DATA_OFFSET + ADV_LEN].copy_from_slice(&tmp);
        self.seal();

        Ok(())
    }

    /// Rewrite magics and checksum of copy 0 and mirror it into copy 1
    fn seal(&mut self) {
        put_u32(&mut self.buf, 0, ADV_MAGIC1);

        let csum = (DATA_OFFSET..ADV_SIZE - 4)
            .step_by(4)
            .fold(ADV_MAGIC2, |acc, off| acc.wrapping_sub(get_u32(&self.buf, off)));

        put_u32(&mut self.buf, 4, csum);
        put_u32(&mut self.buf, ADV_SIZE - 4, ADV_MAGIC3);

        self.buf.copy_within(..ADV_SIZE, ADV_SIZE);
    }

    /// True when every byte of `bytes` is zero, i.e. the area was never
    /// written
    pub fn is_blank(bytes: &[u8]) -> bool {
        bytes.iter().all(|&b| b == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_adv_is_consistent() {
        let adv = Adv::new();
        assert!(consistent(&adv.as_bytes()[..ADV_SIZE]));
        assert!(consistent(&adv.as_bytes()[ADV_SIZE..]));
        assert_eq!(adv.get(ADV_BOOTONCE), None);
    }

    #[test]
    fn test_set_and_get() {
        let mut adv = Adv::new();
        adv.set(ADV_BOOTONCE, b"linux single").unwrap();
        adv.set(ADV_MENUSAVE, b"rescue").unwrap();

        assert_eq!(adv.get(ADV_BOOTONCE), Some(&b"linux single"[..]));
        assert_eq!(adv.get(ADV_MENUSAVE), Some(&b"rescue"[..]));
        assert!(consistent(&adv.as_bytes()[..ADV_SIZE]));
        assert_eq!(adv.as_bytes()[..ADV_SIZE], adv.as_bytes()[ADV_SIZE..]);
    }

    #[test]
    fn test_replace_keeps_other_records() {
        let mut adv = Adv::new();
        adv.set(ADV_BOOTONCE, b"first").unwrap();
        adv.set(ADV_MENUSAVE, b"label").unwrap();
        adv.set(ADV_BOOTONCE, b"second").unwrap();

        assert_eq!(adv.get(ADV_BOOTONCE), Some(&b"second"[..]));
        assert_eq!(adv.get(ADV_MENUSAVE), Some(&b"label"[..]));
    }

    #[test]
    fn test_empty_value_deletes() {
        let mut adv = Adv::new();
        adv.set(ADV_BOOTONCE, b"once").unwrap();
        adv.set(ADV_BOOTONCE, b"").unwrap();

        assert_eq!(adv.get(ADV_BOOTONCE), None);
        assert_eq!(adv, Adv::new());
    }

    #[test]
    fn test_no_space_leaves_adv_untouched() {
        let mut adv = Adv::new();
        adv.set(ADV_BOOTONCE, &[b'a'; 255]).unwrap();
        let before = adv.clone();

        let err = adv.set(ADV_MENUSAVE, &[b'b'; 255]).unwrap_err();
        assert!(matches!(err, AdvError::NoSpace("menu-save label")));
        assert_eq!(adv, before);
    }

    #[test]
    fn test_invalid_input() {
        let mut adv = Adv::new();
        assert!(matches!(adv.set(ADV_END, b"x"), Err(AdvError::InvalidTag(0))));
        assert!(matches!(
            adv.set(ADV_BOOTONCE, &[0u8; 256]),
            Err(AdvError::TooLarge(256))
        ));
    }

    #[test]
    fn test_from_bytes_uses_backup_copy() {
        let mut adv = Adv::new();
        adv.set(ADV_MENUSAVE, b"kept").unwrap();

        let mut raw = adv.as_bytes().to_vec();
        raw[20] ^= 0xFF; // break copy 0

        let restored = Adv::from_bytes(&raw).unwrap();
        assert_eq!(restored.get(ADV_MENUSAVE), Some(&b"kept"[..]));
        assert_eq!(restored.as_bytes()[..ADV_SIZE], restored.as_bytes()[ADV_SIZE..]);
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(matches!(
            Adv::from_bytes(&[0x55u8; 2 * ADV_SIZE]),
            Err(AdvError::Corrupt)
        ));
        assert!(matches!(
            Adv::from_bytes(&[0u8; 10]),
            Err(AdvError::BadLength { actual: 10, .. })
        ));
    }
}
