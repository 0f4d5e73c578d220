//! Removable media enumeration.
//!
//! The key store only needs a list of directories to search. Where that list
//! comes from is platform specific, so it sits behind [`MediaProvider`]:
//!
//! - [`LinuxRemovableMedia`]: `sd*` block devices whose sysfs path runs
//!   through a USB controller, matched against `/proc/mounts`
//! - [`WindowsRemovableMedia`]: logical disks with drive type 2 (removable)
//! - [`FixedMedia`]: an explicit list, for `--key-dir` and tests
//!
//! [`platform_provider`] picks the removable-media provider for the running
//! platform.

use crate::error::{Error, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Command;

/// Source of candidate directories that may hold a key file.
pub trait MediaProvider {
    /// Mounted roots to search, in a stable order.
    fn mount_points(&self) -> Result<Vec<PathBuf>>;

    /// Short provider name for log messages.
    fn name(&self) -> &'static str;
}

/// The removable-media provider for the current platform.
pub fn platform_provider() -> Result<Box<dyn MediaProvider>> {
    if cfg!(target_os = "linux") {
        Ok(Box::new(LinuxRemovableMedia::new()))
    } else if cfg!(target_os = "windows") {
        Ok(Box::new(WindowsRemovableMedia::new()))
    } else {
        Err(Error::UnsupportedPlatform(std::env::consts::OS.to_string()))
    }
}

/// A fixed list of directories.
#[derive(Debug, Clone, Default)]
pub struct FixedMedia {
    roots: Vec<PathBuf>,
}

impl FixedMedia {
    /// Search exactly `roots`.
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }
}

impl MediaProvider for FixedMedia {
    fn mount_points(&self) -> Result<Vec<PathBuf>> {
        Ok(self.roots.clone())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// USB mass storage on Linux.
#[derive(Debug, Clone)]
pub struct LinuxRemovableMedia {
    sys_block: PathBuf,
    mounts: PathBuf,
}

impl Default for LinuxRemovableMedia {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxRemovableMedia {
    /// Read the live `/sys/block` and `/proc/mounts`.
    pub fn new() -> Self {
        Self::with_paths("/sys/block", "/proc/mounts")
    }

    /// Read an alternative sysfs block directory and mount table.
    pub fn with_paths(sys_block: impl Into<PathBuf>, mounts: impl Into<PathBuf>) -> Self {
        Self {
            sys_block: sys_block.into(),
            mounts: mounts.into(),
        }
    }

    /// Names (`sdb`, `sdc`, ...) of block devices attached over USB.
    fn usb_devices(&self) -> Result<HashSet<String>> {
        let entries = match std::fs::read_dir(&self.sys_block) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(e.into()),
        };

        let mut devices = HashSet::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with("sd") {
                continue;
            }
            let resolved = std::fs::canonicalize(entry.path()).unwrap_or_else(|_| entry.path());
            let via_usb = resolved
                .components()
                .any(|c| c.as_os_str().to_string_lossy().starts_with("usb"));
            if via_usb {
                devices.insert(name);
            }
        }
        Ok(devices)
    }
}

impl MediaProvider for LinuxRemovableMedia {
    fn mount_points(&self) -> Result<Vec<PathBuf>> {
        let devices = self.usb_devices()?;
        if devices.is_empty() {
            log::debug!("no USB block devices under {}", self.sys_block.display());
            return Ok(Vec::new());
        }
        let table = std::fs::read_to_string(&self.mounts)?;
        let roots = usb_mount_points(&table, &devices);
        log::debug!("{} USB device(s), {} mounted root(s)", devices.len(), roots.len());
        Ok(roots)
    }

    fn name(&self) -> &'static str {
        "linux-usb"
    }
}

/// Mount points in a `/proc/mounts` table that belong to one of `devices`
/// or one of their partitions.
fn usb_mount_points(table: &str, devices: &HashSet<String>) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    for line in table.lines() {
        let mut fields = line.split_whitespace();
        let (Some(source), Some(target)) = (fields.next(), fields.next()) else {
            continue;
        };
        let source = resolve_device(source);
        let Some(name) = source.strip_prefix("/dev/") else {
            continue;
        };
        let disk = name.trim_end_matches(|c: char| c.is_ascii_digit());
        if devices.contains(disk) {
            let root = PathBuf::from(unescape_mount_field(target));
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
    }
    roots
}

fn resolve_device(source: &str) -> String {
    if source.starts_with("/dev/disk/") {
        if let Ok(real) = std::fs::canonicalize(source) {
            return real.to_string_lossy().into_owned();
        }
    }
    source.to_string()
}

/// Undo the octal escapes (`\040` for space, ...) of `/proc/mounts`.
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = bytes
            .get(i + 1..i + 4)
            .filter(|_| bytes[i] == b'\\')
            .and_then(|d| std::str::from_utf8(d).ok())
            .and_then(|d| u8::from_str_radix(d, 8).ok());
        match escaped {
            Some(b) => {
                out.push(b);
                i += 4;
            },
            None => {
                out.push(bytes[i]);
                i += 1;
            },
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Removable logical disks on Windows.
#[derive(Debug, Clone, Default)]
pub struct WindowsRemovableMedia;

impl WindowsRemovableMedia {
    /// Query the live system.
    pub fn new() -> Self {
        Self
    }
}

impl MediaProvider for WindowsRemovableMedia {
    fn mount_points(&self) -> Result<Vec<PathBuf>> {
        let output = Command::new("powershell")
            .args([
                "-NoProfile",
                "-NonInteractive",
                "-Command",
                "Get-CimInstance Win32_LogicalDisk -Filter 'DriveType=2' | ForEach-Object { $_.DeviceID }",
            ])
            .output()
            .or_else(|e| {
                log::debug!("powershell unavailable ({}), falling back to wmic", e);
                Command::new("wmic")
                    .args(["logicaldisk", "where", "drivetype=2", "get", "deviceid"])
                    .output()
            })?;
        if !output.status.success() {
            return Err(Error::UnsupportedPlatform(format!(
                "removable disk query failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(parse_drive_letters(&String::from_utf8_lossy(&output.stdout)))
    }

    fn name(&self) -> &'static str {
        "windows-removable"
    }
}

/// `E:` style device IDs from command output, as root paths.
fn parse_drive_letters(output: &str) -> Vec<PathBuf> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| {
            let b = line.as_bytes();
            b.len() == 2 && b[0].is_ascii_alphabetic() && b[1] == b':'
        })
        .map(|id| PathBuf::from(format!("{}\\", id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usb_mount_points() {
        let table = "\
/dev/sda2 / ext4 rw,relatime 0 0
/dev/sdb1 /media/alice/KEY\\040DRIVE vfat rw 0 0
/dev/sdb2 /media/alice/second vfat rw 0 0
tmpfs /run tmpfs rw 0 0
/dev/sdc /mnt/whole exfat rw 0 0
";
        let devices: HashSet<String> = ["sdb", "sdc"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            usb_mount_points(table, &devices),
            vec![
                PathBuf::from("/media/alice/KEY DRIVE"),
                PathBuf::from("/media/alice/second"),
                PathBuf::from("/mnt/whole"),
            ]
        );
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape_mount_field("a\\040b\\011c"), "a b\tc");
        assert_eq!(unescape_mount_field("trailing\\"), "trailing\\");
        assert_eq!(unescape_mount_field("\\9zz"), "\\9zz");
    }

    #[test]
    fn test_parse_drive_letters() {
        let wmic = "DeviceID  \r\nE:        \r\nF:        \r\n\r\n";
        assert_eq!(
            parse_drive_letters(wmic),
            vec![PathBuf::from("E:\\"), PathBuf::from("F:\\")]
        );
        assert!(parse_drive_letters("").is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_linux_provider_with_fake_sysfs() {
        let dir = tempfile::tempdir().unwrap();
        let devices = dir.path().join("devices");
        let usb = devices.join("pci0000:00/usb1/1-1/host6/block/sdb");
        let sata = devices.join("pci0000:00/ata1/host0/block/sda");
        std::fs::create_dir_all(&usb).unwrap();
        std::fs::create_dir_all(&sata).unwrap();
        let block = dir.path().join("block");
        std::fs::create_dir(&block).unwrap();
        std::os::unix::fs::symlink(&usb, block.join("sdb")).unwrap();
        std::os::unix::fs::symlink(&sata, block.join("sda")).unwrap();
        let mounts = dir.path().join("mounts");
        std::fs::write(&mounts, "/dev/sda1 / ext4 rw 0 0\n/dev/sdb1 /media/usb vfat rw 0 0\n").unwrap();

        let provider = LinuxRemovableMedia::with_paths(&block, &mounts);
        assert_eq!(provider.mount_points().unwrap(), vec![PathBuf::from("/media/usb")]);
    }

    #[test]
    fn test_linux_provider_without_sysfs() {
        let provider = LinuxRemovableMedia::with_paths("/nonexistent/block", "/nonexistent/mounts");
        assert!(provider.mount_points().unwrap().is_empty());
    }

    #[test]
    fn test_fixed_media() {
        let provider = FixedMedia::new(vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(provider.mount_points().unwrap().len(), 2);
        assert_eq!(provider.name(), "fixed");
    }

    #[test]
    fn test_platform_provider() {
        let provider = platform_provider();
        if cfg!(any(target_os = "linux", target_os = "windows")) {
            assert!(provider.is_ok());
        } else {
            assert!(matches!(provider, Err(Error::UnsupportedPlatform(_))));
        }
    }
}
