//! Filesystem and block-device reports.

use std::path::{Path, PathBuf};

use sysinfo::Disks;
use tracing::{debug, instrument, warn};

use super::probe;
use crate::format::{bytes_to_gb, percent};

/// Paths where removable or network storage is usually mounted.
pub const EXTERNAL_MOUNTS: &[&str] = &["/mnt/cloud", "/media", "/mnt"];

/// Where the disk report reads from.
#[derive(Debug, Clone)]
pub struct DiskSources {
    pub df_program: String,
    pub external_mounts: Vec<PathBuf>,
}

impl Default for DiskSources {
    fn default() -> Self {
        Self {
            df_program: "df".to_string(),
            external_mounts: EXTERNAL_MOUNTS.iter().map(PathBuf::from).collect(),
        }
    }
}

/// One data row of `df -h -T`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DfRow {
    pub filesystem: String,
    pub fs_type: String,
    pub size: String,
    pub used: String,
    pub available: String,
    pub use_percent: String,
    pub mount_point: String,
}

/// Parse `df -h -T` output. Rows with fewer than seven columns are skipped;
/// mount points containing spaces are rejoined.
pub fn parse_df(output: &str) -> Vec<DfRow> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 7 {
                return None;
            }
            Some(DfRow {
                filesystem: cols[0].to_string(),
                fs_type: cols[1].to_string(),
                size: cols[2].to_string(),
                used: cols[3].to_string(),
                available: cols[4].to_string(),
                use_percent: cols[5].to_string(),
                mount_point: cols[6..].join(" "),
            })
        })
        .collect()
}

/// Mounted filesystems plus any external mounts.
#[instrument]
pub fn disk_summary() -> String {
    disk_summary_with(&DiskSources::default())
}

pub fn disk_summary_with(sources: &DiskSources) -> String {
    let disks = Disks::new_with_refreshed_list();

    let rows = probe(&sources.df_program, &["-h", "-T"])
        .map(|out| parse_df(&out))
        .unwrap_or_default();

    let mut sections: Vec<String> = if rows.is_empty() {
        debug!(program = %sources.df_program, "No df rows, using partition list");
        partition_sections(&disks)
    } else {
        rows.iter().map(render_df_row).collect()
    };

    sections.extend(
        sources
            .external_mounts
            .iter()
            .filter_map(|mount| external_section(&disks, mount)),
    );

    if sections.is_empty() {
        return "💾 *Disk usage*\n\nNo filesystem information available".to_string();
    }
    format!("💾 *Disk usage*\n\n{}", sections.join("\n"))
}

fn render_df_row(row: &DfRow) -> String {
    format!(
        "*{}* (`{}`)\n• Type: {}\n• Size: {}\n• Used: {} ({})\n• Free: {}\n",
        row.filesystem,
        row.mount_point,
        row.fs_type,
        row.size,
        row.used,
        row.use_percent,
        row.available
    )
}

fn partition_sections(disks: &Disks) -> Vec<String> {
    disks
        .iter()
        .map(|disk| {
            let total = disk.total_space();
            let used = total.saturating_sub(disk.available_space());
            format!(
                "*{}* (`{}`)\n• Type: {}\n• Size: {:.1} GB\n• Used: {:.1} GB ({:.1}%)\n• Free: {:.1} GB\n",
                disk.name().to_string_lossy(),
                disk.mount_point().display(),
                disk.file_system().to_string_lossy(),
                bytes_to_gb(total),
                bytes_to_gb(used),
                percent(used, total),
                bytes_to_gb(disk.available_space()),
            )
        })
        .collect()
}

/// Present only when `mount` is itself a mount point.
fn external_section(disks: &Disks, mount: &Path) -> Option<String> {
    let disk = disks.iter().find(|d| d.mount_point() == mount)?;
    let total = disk.total_space();
    let used = total.saturating_sub(disk.available_space());
    Some(format!(
        "*{}* (`{}`) [External]\n• Size: {:.1} GB\n• Used: {:.1} GB ({:.1}%)\n• Free: {:.1} GB\n",
        disk.name().to_string_lossy(),
        mount.display(),
        bytes_to_gb(total),
        bytes_to_gb(used),
        percent(used, total),
        bytes_to_gb(disk.available_space()),
    ))
}

// ── Block devices ───────────────────────────────────────────────────────────

/// One `lsblk -r` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDevice {
    pub name: String,
    pub size: String,
    pub kind: String,
    pub mount_point: Option<String>,
    pub fs_type: Option<String>,
}

/// Parse `lsblk -r -n -o NAME,SIZE,TYPE,MOUNTPOINT,FSTYPE`.
///
/// Raw mode keeps empty columns as empty fields and escapes blanks inside
/// values as `\x20`, so splitting on single spaces is positional.
pub fn parse_lsblk(output: &str) -> Vec<BlockDevice> {
    let field = |s: Option<&str>| {
        s.map(|v| v.replace("\\x20", " "))
            .filter(|v| !v.is_empty())
    };
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let mut cols = line.split(' ');
            let name = field(cols.next())?;
            let size = field(cols.next())?;
            let kind = field(cols.next())?;
            Some(BlockDevice {
                name,
                size,
                kind,
                mount_point: field(cols.next()),
                fs_type: field(cols.next()),
            })
        })
        .collect()
}

/// Disks with their mounted partitions, as an indented tree.
#[instrument]
pub fn detailed_disk_summary() -> String {
    detailed_disk_summary_with("lsblk")
}

pub fn detailed_disk_summary_with(lsblk_program: &str) -> String {
    let Some(output) = probe(
        lsblk_program,
        &["-r", "-n", "-o", "NAME,SIZE,TYPE,MOUNTPOINT,FSTYPE"],
    ) else {
        warn!(program = lsblk_program, "Block device listing unavailable");
        return format!(
            "❌ Could not list block devices: `{}` is unavailable",
            lsblk_program
        );
    };
    render_block_tree(&parse_lsblk(&output))
}

fn render_block_tree(devices: &[BlockDevice]) -> String {
    let mut out = String::from("💽 *Block devices*\n");
    for dev in devices {
        match dev.kind.as_str() {
            "disk" => out.push_str(&format!("\n*Disk {}:* {}\n", dev.name, dev.size)),
            "part" => {
                if let Some(mount) = &dev.mount_point {
                    out.push_str(&format!(
                        "  └─ {}: {} → `{}` ({})\n",
                        dev.name,
                        dev.size,
                        mount,
                        dev.fs_type.as_deref().unwrap_or("?")
                    ));
                }
            }
            _ => {}
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DF: &str = "\
Filesystem     Type      Size  Used Avail Use% Mounted on
/dev/root      ext4       29G  6.1G   22G  23% /
tmpfs          tmpfs     1.9G     0  1.9G   0% /dev/shm
/dev/sda1      ext4      916G  100G  770G  12% /mnt/my disk
broken line
";

    #[test]
    fn test_parse_df_rows() {
        let rows = parse_df(DF);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].filesystem, "/dev/root");
        assert_eq!(rows[0].use_percent, "23%");
        assert_eq!(rows[2].mount_point, "/mnt/my disk");
    }

    #[test]
    fn test_render_df_row() {
        let rows = parse_df(DF);
        let text = render_df_row(&rows[0]);
        assert_eq!(
            text,
            "*/dev/root* (`/`)\n• Type: ext4\n• Size: 29G\n• Used: 6.1G (23%)\n• Free: 22G\n"
        );
    }

    #[test]
    fn test_parse_lsblk_keeps_empty_columns() {
        let devices = parse_lsblk("sda 931.5G disk  \nsda1 931.5G part /mnt/cloud ext4\nsda2 1G part  swap\n");
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[0].mount_point, None);
        assert_eq!(devices[1].mount_point.as_deref(), Some("/mnt/cloud"));
        assert_eq!(devices[2].mount_point, None);
        assert_eq!(devices[2].fs_type.as_deref(), Some("swap"));
    }

    #[test]
    fn test_lsblk_escaped_mount_point() {
        let devices = parse_lsblk("sdb1 10G part /media/USB\\x20STICK vfat");
        assert_eq!(devices[0].mount_point.as_deref(), Some("/media/USB STICK"));
    }

    #[test]
    fn test_block_tree_shows_only_mounted_partitions() {
        let devices = parse_lsblk(
            "mmcblk0 29.7G disk  \nmmcblk0p1 256M part /boot vfat\nmmcblk0p2 29.5G part / ext4\nsda 1T disk  \nsda1 1T part  \n",
        );
        let text = render_block_tree(&devices);
        assert_eq!(
            text,
            "💽 *Block devices*\n\n*Disk mmcblk0:* 29.7G\n  └─ mmcblk0p1: 256M → `/boot` (vfat)\n  └─ mmcblk0p2: 29.5G → `/` (ext4)\n\n*Disk sda:* 1T"
        );
    }

    #[test]
    fn test_missing_lsblk_is_explicit() {
        let text = detailed_disk_summary_with("definitely-not-lsblk");
        assert!(text.starts_with("❌"));
        assert!(text.contains("definitely-not-lsblk"));
    }
}
