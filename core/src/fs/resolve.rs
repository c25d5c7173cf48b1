//! Mount path to block device resolution

use std::ffi::OsString;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use super::mount_table::{self, MountEntry};
use super::FsKind;
use crate::disk::BlockDevice;
use crate::error::{InstallError, Result};

/// Name of the boot file on file-based installs
pub const BOOT_FILE_NAME: &str = "extlinux.sys";

/// Everything known about the install target
#[derive(Debug)]
pub struct FilesystemContext {
    pub kind: FsKind,
    /// Directory the boot file goes into
    pub mount: PathBuf,
    pub device_path: PathBuf,
    pub device: BlockDevice,
    /// btrfs subvolume the directory lives on
    pub subvolume: Option<OsString>,
    /// `st_dev` of `mount` when the context was created
    pub mount_dev: u64,
}

impl FilesystemContext {
    /// Context over an already opened device, skipping mount table lookup
    /// and device validation
    pub fn new(kind: FsKind, mount: impl Into<PathBuf>, device: BlockDevice) -> Result<Self> {
        let mount = mount.into();
        let mount_dev = directory_dev(&mount)?;

        Ok(Self {
            kind,
            device_path: device.path().to_path_buf(),
            mount,
            device,
            subvolume: None,
            mount_dev,
        })
    }

    pub fn with_subvolume(mut self, subvolume: impl Into<OsString>) -> Self {
        self.subvolume = Some(subvolume.into());
        self
    }

    pub fn boot_file(&self) -> PathBuf {
        self.mount.join(BOOT_FILE_NAME)
    }

    /// Subvolume name as raw bytes, empty when there is none
    pub fn subvolume_name(&self) -> &[u8] {
        self.subvolume.as_deref().map(OsStrExt::as_bytes).unwrap_or_default()
    }
}

/// `st_dev` of a path that has to be a directory
fn directory_dev(path: &Path) -> Result<u64> {
    let st = fs::metadata(path)
        .map_err(|e| InstallError::io(format!("stat {}", path.display()), e))?;
    if !st.is_dir() {
        return Err(InstallError::NotADirectory(path.to_path_buf()));
    }
    Ok(st.dev())
}

/// The ids mount table matching looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevIds {
    pub dev: u64,
    pub rdev: u64,
}

fn stat_ids(path: &Path) -> Option<DevIds> {
    fs::metadata(path).ok().map(|st| DevIds {
        dev: st.dev(),
        rdev: st.rdev(),
    })
}

/// A device node entry whose node is the device `dev`
fn device_node_matches(entry: &MountEntry, dev: u64, stat: &dyn Fn(&Path) -> Option<DevIds>) -> bool {
    stat(entry.fsname.as_path()).is_some_and(|ids| ids.rdev == dev)
}

/// Scan one mount table for the device backing `dev`.
///
/// btrfs entries are matched on the mount point because btrfs reports an
/// anonymous `st_dev`. A btrfs entry that carries `subvol=` records the
/// subvolume (the first one seen wins) but does not resolve; the caller
/// retries on parent directories.
pub fn match_entries(
    entries: &[MountEntry],
    kind: FsKind,
    dev: u64,
    stat: &dyn Fn(&Path) -> Option<DevIds>,
    subvol: &mut Option<OsString>,
) -> Option<PathBuf> {
    for entry in entries {
        let fstype = entry.fstype.as_str();

        let found = match kind {
            FsKind::Btrfs => {
                if !kind.mount_types().contains(&fstype)
                    || stat(entry.dir.as_path()).map(|ids| ids.dev) != Some(dev)
                {
                    false
                } else if let Some(name) = entry.subvol() {
                    subvol.get_or_insert_with(|| name.to_owned());
                    false
                } else {
                    true
                }
            }
            FsKind::Ext2 => {
                kind.mount_types().contains(&fstype) && device_node_matches(entry, dev, stat)
            }
            FsKind::Vfat => {
                kind.mount_types().contains(&fstype) && device_node_matches(entry, dev, stat)
            }
        };

        if found {
            return Some(entry.fsname.clone());
        }
    }

    None
}

/// Verify that the directory really lives on `device`.
///
/// btrfs never passes this (its `st_dev` is not the device number), so it
/// is skipped there.
pub fn validate_device(path: &Path, kind: FsKind, device: &BlockDevice) -> Result<()> {
    if kind == FsKind::Btrfs {
        return Ok(());
    }

    let pst = fs::metadata(path)
        .map_err(|e| InstallError::io(format!("stat {}", path.display()), e))?;
    let rdev = device
        .rdev()
        .map_err(|e| InstallError::io(format!("stat {}", device.path().display()), e))?;

    if pst.dev() != rdev {
        return Err(InstallError::PathDeviceMismatch {
            path: path.to_path_buf(),
            device: device.path().to_path_buf(),
        });
    }
    Ok(())
}

/// Finds and opens the block device behind a directory
#[derive(Debug, Clone)]
pub struct DeviceResolver {
    primary: PathBuf,
    secondary: PathBuf,
}

impl Default for DeviceResolver {
    fn default() -> Self {
        Self::with_tables(mount_table::MTAB, mount_table::PROC_MOUNTS)
    }
}

impl DeviceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use other mount tables than `/etc/mtab` and `/proc/mounts`
    pub fn with_tables(primary: impl Into<PathBuf>, secondary: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.into(),
        }
    }

    pub fn resolve(&self, path: &Path) -> Result<FilesystemContext> {
        let mount_dev = directory_dev(path)?;
        let kind = FsKind::detect(path)?
            .ok_or_else(|| InstallError::UnsupportedFilesystem(path.to_path_buf()))?;

        let dir_dev = |dir: &Path| directory_dev(dir).ok();
        let (device_path, subvolume) = self.find_device(kind, path, &dir_dev, &stat_ids)?;
        log::info!("{} is device {}", path.display(), device_path.display());
        if let Some(subvol) = &subvolume {
            log::debug!("btrfs subvolume {}", subvol.to_string_lossy());
        }

        let device = BlockDevice::open(&device_path)?;
        validate_device(path, kind, &device)?;

        Ok(FilesystemContext {
            kind,
            mount: path.to_path_buf(),
            device_path,
            device,
            subvolume,
            mount_dev,
        })
    }

    fn table(path: &Path) -> Vec<MountEntry> {
        mount_table::read(path).unwrap_or_else(|e| {
            log::debug!("cannot read {}: {}", path.display(), e);
            Vec::new()
        })
    }

    /// Primary table for the directory and, while it turns out to be a
    /// subvolume, each of its ancestors; then the secondary table from the
    /// outermost ancestor tried back down to the directory itself.
    ///
    /// `dir_dev` gives the `st_dev` of a directory, `stat` the ids of mount
    /// table paths.
    fn find_device(
        &self,
        kind: FsKind,
        path: &Path,
        dir_dev: &dyn Fn(&Path) -> Option<u64>,
        stat: &dyn Fn(&Path) -> Option<DevIds>,
    ) -> Result<(PathBuf, Option<OsString>)> {
        let primary = Self::table(&self.primary);
        let mut subvol = None;
        let mut tried = Vec::new();

        let mut current = Some(path);
        while let Some(dir) = current {
            let Some(dev) = dir_dev(dir) else {
                break;
            };

            if let Some(device) = match_entries(&primary, kind, dev, stat, &mut subvol) {
                return Ok((device, subvol));
            }
            tried.push(dev);

            if subvol.is_none() {
                break;
            }
            current = dir.parent();
            if let Some(parent) = current {
                log::info!(
                    "{} is a subvolume, trying its parent {}",
                    dir.display(),
                    parent.display()
                );
            }
        }

        let secondary = Self::table(&self.secondary);
        for &dev in tried.iter().rev() {
            if let Some(device) = match_entries(&secondary, kind, dev, stat, &mut subvol) {
                return Ok((device, subvol));
            }
        }

        Err(InstallError::DeviceNotFound(path.to_path_buf()))
    }
}
