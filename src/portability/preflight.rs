//! Resource preflight: disk headroom and package size limits.
//!
//! Both checks run before anything is decoded or written. The disk check
//! runs first, so an oversized package on a nearly full volume reports the
//! disk shortage.

use std::io;
use std::path::Path;

use crate::portability::types::{PortResult, PortabilityError};

/// Largest accepted package: 500 MiB.
pub const MAX_PACKAGE_BYTES: u64 = 500 * 1024 * 1024;

/// Free space required, as a multiple of the package size.
pub const HEADROOM_FACTOR: u64 = 2;

/// Source of free-space figures for a destination volume.
pub trait SpaceProbe: Send + Sync {
    /// Bytes available to this process on the volume holding `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the volume cannot be queried.
    fn available(&self, path: &Path) -> io::Result<u64>;
}

/// Queries the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSpaceProbe;

impl SpaceProbe for FsSpaceProbe {
    fn available(&self, path: &Path) -> io::Result<u64> {
        // The media directory may not exist yet; ask its nearest ancestor
        let existing = path
            .ancestors()
            .find(|p| p.exists())
            .unwrap_or_else(|| Path::new("."));
        fs2::available_space(existing)
    }
}

/// Reports a fixed figure.
#[derive(Debug, Clone, Copy)]
pub struct FixedSpace(pub u64);

impl SpaceProbe for FixedSpace {
    fn available(&self, _path: &Path) -> io::Result<u64> {
        Ok(self.0)
    }
}

/// Check a package of `size` bytes against `available` free bytes.
///
/// # Errors
///
/// `InsufficientDiskSpace` when `available < size * factor`, then
/// `PackageTooLarge` when `size > max`.
pub fn check(size: u64, available: u64, max: u64, factor: u64) -> PortResult<()> {
    let required = size.saturating_mul(factor);
    if available < required {
        return Err(PortabilityError::InsufficientDiskSpace {
            required,
            available,
        });
    }
    if size > max {
        return Err(PortabilityError::PackageTooLarge { max, actual: size });
    }
    Ok(())
}

/// Probe `dest` and run [`check`].
///
/// # Errors
///
/// Returns the check's error, or `Io` if the probe fails.
pub fn check_destination(
    probe: &dyn SpaceProbe,
    dest: &Path,
    size: u64,
    max: u64,
    factor: u64,
) -> PortResult<()> {
    let available = probe.available(dest)?;
    tracing::debug!(size, available, dest = %dest.display(), "Preflight");
    check(size, available, max, factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn test_disk_is_checked_before_size() {
        let err = check(600 * MIB, 1024 * MIB, MAX_PACKAGE_BYTES, HEADROOM_FACTOR).unwrap_err();
        assert!(matches!(
            err,
            PortabilityError::InsufficientDiskSpace { required, available }
                if required == 1200 * MIB && available == 1024 * MIB
        ));
    }

    #[test]
    fn test_oversized_package_with_room() {
        let err = check(600 * MIB, 4096 * MIB, MAX_PACKAGE_BYTES, HEADROOM_FACTOR).unwrap_err();
        assert!(matches!(err, PortabilityError::PackageTooLarge { actual, .. } if actual == 600 * MIB));
    }

    #[test]
    fn test_exact_headroom_passes() {
        check(100 * MIB, 200 * MIB, MAX_PACKAGE_BYTES, HEADROOM_FACTOR).unwrap();
        check(MAX_PACKAGE_BYTES, 2 * MAX_PACKAGE_BYTES, MAX_PACKAGE_BYTES, HEADROOM_FACTOR)
            .unwrap();
    }

    #[test]
    fn test_fs_probe_walks_up_to_existing_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let missing = temp.path().join("not/yet/created");
        assert!(FsSpaceProbe.available(&missing).unwrap() > 0);
    }

    #[test]
    fn test_check_destination_with_fixed_probe() {
        let probe = FixedSpace(10);
        let err = check_destination(&probe, Path::new("/media"), 6, 100, 2).unwrap_err();
        assert!(matches!(err, PortabilityError::InsufficientDiskSpace { .. }));
    }
}
