use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use log::debug;

use crate::model::event::UNKNOWN_ATTR;

const MINOR_BITS: u32 = 20;
const MINOR_MASK: u32 = (1 << MINOR_BITS) - 1;

/// Splits a kernel-internal `dev_t` (as seen in tracepoints, not the
/// userspace encoding) into major and minor numbers.
pub fn split_kernel_dev(dev: u32) -> (u32, u32) {
    (dev >> MINOR_BITS, dev & MINOR_MASK)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub mount_point: String,
}

/// A partition of a whole disk, in 512-byte sectors from the disk start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub dev: (u32, u32),
    pub start: u64,
    pub size: u64,
}

impl Partition {
    pub fn contains(&self, sector: u64) -> bool {
        sector >= self.start && sector - self.start < self.size
    }
}

#[derive(Debug, Clone)]
struct Disk {
    name: String,
    partitions: Vec<Partition>,
}

/// Resolves a request's `dev_t` and sector to a device name and mount point.
///
/// Block tracepoints report the whole-disk device with disk-relative sectors,
/// while mountinfo lists partitions, so the sector picks the partition whose
/// mount is reported. Disks and the mount table are read once and cached.
#[derive(Debug)]
pub struct DeviceTable {
    sys_root: PathBuf,
    mountinfo: PathBuf,
    disks: HashMap<u32, Disk>,
    mounts: Option<HashMap<(u32, u32), String>>,
}

impl Default for DeviceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceTable {
    pub fn new() -> Self {
        Self::with_roots("/sys", "/proc/self/mountinfo")
    }

    pub fn with_roots(sys_root: impl Into<PathBuf>, mountinfo: impl Into<PathBuf>) -> Self {
        Self {
            sys_root: sys_root.into(),
            mountinfo: mountinfo.into(),
            disks: HashMap::new(),
            mounts: None,
        }
    }

    pub fn resolve(&mut self, dev: u32, sector: u64) -> DeviceInfo {
        let (major, minor) = split_kernel_dev(dev);

        if !self.disks.contains_key(&dev) {
            let disk = load_disk(&self.sys_root, major, minor);
            debug!(
                "{}: {major}:{minor} with {} partitions",
                disk.name,
                disk.partitions.len()
            );
            self.disks.insert(dev, disk);
        }
        let disk = &self.disks[&dev];

        // Unpartitioned disks, dm and md devices are mounted under their own number.
        let mount_dev = disk
            .partitions
            .iter()
            .find(|p| p.contains(sector))
            .map_or((major, minor), |p| p.dev);

        let mounts = self.mounts.get_or_insert_with(|| {
            fs::read_to_string(&self.mountinfo)
                .map(|content| parse_mountinfo(&content))
                .unwrap_or_default()
        });
        let mount_point = mounts
            .get(&mount_dev)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_ATTR.to_string());

        DeviceInfo {
            name: disk.name.clone(),
            mount_point,
        }
    }
}

fn load_disk(sys_root: &Path, major: u32, minor: u32) -> Disk {
    let dir = sys_root.join(format!("dev/block/{major}:{minor}"));

    let name = fs::read_to_string(dir.join("uevent"))
        .ok()
        .and_then(|content| parse_uevent_devname(&content))
        .unwrap_or_else(|| format!("{major},{minor}"));

    let mut partitions: Vec<Partition> = fs::read_dir(&dir)
        .into_iter()
        .flatten()
        .flatten()
        .filter_map(|entry| read_partition(&entry.path()))
        .collect();
    partitions.sort_by_key(|p| p.start);

    Disk { name, partitions }
}

/// `<disk>/<part>/{dev,start,size}`; entries without all three (queue,
/// holders, power, ...) are not partitions.
fn read_partition(dir: &Path) -> Option<Partition> {
    let read = |file: &str| fs::read_to_string(dir.join(file)).ok();
    Some(Partition {
        dev: parse_dev_numbers(&read("dev")?)?,
        start: read("start")?.trim().parse().ok()?,
        size: read("size")?.trim().parse().ok()?,
    })
}

/// `"8:1\n"` -> `(8, 1)`
pub fn parse_dev_numbers(content: &str) -> Option<(u32, u32)> {
    let (major, minor) = content.trim().split_once(':')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

pub fn parse_uevent_devname(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("DEVNAME="))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

/// `major:minor -> mount point`, first mount wins. Fields per proc(5):
///
/// ```text
/// 36 35 98:0 /mnt1 /mnt2 rw,noatime master:1 - ext3 /dev/root rw,errors=continue
/// ```
pub fn parse_mountinfo(content: &str) -> HashMap<(u32, u32), String> {
    let mut mounts = HashMap::new();
    for line in content.lines() {
        let mut fields = line.split_whitespace();
        let Some(dev) = fields.nth(2) else { continue };
        let Some(mount_point) = fields.nth(1) else {
            continue;
        };
        let Some(dev) = parse_dev_numbers(dev) else {
            continue;
        };
        mounts
            .entry(dev)
            .or_insert_with(|| unescape_octal(mount_point));
    }
    mounts
}

/// mountinfo escapes space, tab, newline and backslash as `\ooo`.
fn unescape_octal(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = std::str::from_utf8(&bytes[i + 1..i + 4]).unwrap_or("");
            if let Ok(v) = u8::from_str_radix(digits, 8) {
                out.push(v);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
