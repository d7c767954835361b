//! Predefined command catalog.
//!
//! Built once at startup from the built-in table plus any `[[commands]]`
//! entries in the config file, then shared read-only.

use serde::{Deserialize, Serialize};

/// A named shell command offered as a one-tap menu action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredefinedCommand {
    pub id: String,
    pub command: String,
    pub description: String,
    /// Ask the operator to confirm before running (reboot, shutdown).
    #[serde(default)]
    pub confirm: bool,
}

impl PredefinedCommand {
    fn builtin(id: &str, command: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            command: command.to_string(),
            description: description.to_string(),
            confirm: false,
        }
    }

    fn guarded(id: &str, command: &str, description: &str) -> Self {
        Self {
            confirm: true,
            ..Self::builtin(id, command, description)
        }
    }
}

/// Ids of the entries listed under the management menu rather than the
/// quick-commands menu.
pub const MANAGEMENT_IDS: &[&str] = &["reboot", "shutdown"];

/// Immutable, ordered command table.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<PredefinedCommand>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Catalog {
    /// Built-in entries followed by `extra`. An extra entry whose id matches a
    /// built-in replaces it in place.
    pub fn new(extra: Vec<PredefinedCommand>) -> Self {
        let mut entries = builtin_commands();
        for cmd in extra {
            match entries.iter_mut().find(|e| e.id == cmd.id) {
                Some(slot) => *slot = cmd,
                None => entries.push(cmd),
            }
        }
        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<&PredefinedCommand> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PredefinedCommand> {
        self.entries.iter()
    }

    /// Entries shown in the quick-commands menu.
    pub fn quick(&self) -> impl Iterator<Item = &PredefinedCommand> {
        self.entries
            .iter()
            .filter(|e| !MANAGEMENT_IDS.contains(&e.id.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn builtin_commands() -> Vec<PredefinedCommand> {
    vec![
        PredefinedCommand::builtin("disk_usage", "df -h -T", "💾 Disk usage (with types)"),
        PredefinedCommand::builtin(
            "disk_detailed",
            "lsblk -o NAME,SIZE,TYPE,MOUNTPOINT,FSTYPE,LABEL,UUID",
            "💽 Block devices",
        ),
        PredefinedCommand::builtin("memory", "free -h", "🧠 Memory usage"),
        PredefinedCommand::builtin(
            "memory_detailed",
            "cat /proc/meminfo | head -20",
            "🧠 Memory details",
        ),
        PredefinedCommand::builtin("uptime", "uptime", "⏱️ Uptime"),
        PredefinedCommand::builtin(
            "top_processes",
            "ps aux --sort=-%cpu | head -15",
            "📈 Top processes (CPU)",
        ),
        PredefinedCommand::builtin(
            "top_memory",
            "ps aux --sort=-%mem | head -15",
            "📈 Top processes (memory)",
        ),
        PredefinedCommand::builtin("network_stats", "ss -tulpn", "🌐 Network connections"),
        PredefinedCommand::builtin(
            "mount_info",
            "mount | grep -E \"/dev/sd|/dev/mmc\"",
            "📌 Mounted devices",
        ),
        PredefinedCommand::builtin(
            "check_disks",
            "ls -la /dev/sd* /dev/mmcblk*",
            "🔍 Disk device nodes",
        ),
        PredefinedCommand::builtin(
            "external_disk",
            "df -h /mnt/cloud 2>/dev/null || echo \"Disk not found\"",
            "🗂️ External HDD (/mnt/cloud)",
        ),
        PredefinedCommand::builtin(
            "system_logs",
            "journalctl -n 20 --no-pager",
            "📋 Recent system logs",
        ),
        PredefinedCommand::builtin(
            "service_status",
            "systemctl list-units --type=service --state=running | head -20",
            "🔄 Running services",
        ),
        PredefinedCommand::builtin(
            "cpu_info",
            "lscpu | grep -E \"Model name|CPU\\(s\\)|Architecture\"",
            "⚙️ CPU information",
        ),
        PredefinedCommand::builtin(
            "temperature",
            "cat /sys/class/thermal/thermal_zone*/temp 2>/dev/null | head -1",
            "🌡️ CPU temperature",
        ),
        PredefinedCommand::guarded("reboot", "sudo reboot", "🔄 Reboot server"),
        PredefinedCommand::guarded("shutdown", "sudo shutdown -h now", "⏹️ Shut down server"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let catalog = Catalog::default();
        let cmd = catalog.get("memory").unwrap();
        assert_eq!(cmd.command, "free -h");
        assert!(!cmd.confirm);
        assert!(catalog.get("reboot").unwrap().confirm);
        assert!(catalog.get("nope").is_none());
    }

    #[test]
    fn test_extra_entries_append_and_override() {
        let base_len = Catalog::default().len();
        let catalog = Catalog::new(vec![
            PredefinedCommand {
                id: "memory".into(),
                command: "free -m".into(),
                description: "Memory (MB)".into(),
                confirm: false,
            },
            PredefinedCommand {
                id: "docker_ps".into(),
                command: "docker ps".into(),
                description: "Containers".into(),
                confirm: false,
            },
        ]);
        assert_eq!(catalog.len(), base_len + 1);
        assert_eq!(catalog.get("memory").unwrap().command, "free -m");
        assert_eq!(catalog.iter().last().unwrap().id, "docker_ps");
    }

    #[test]
    fn test_quick_menu_excludes_management() {
        let catalog = Catalog::default();
        assert!(catalog.quick().all(|c| c.id != "reboot" && c.id != "shutdown"));
        assert!(catalog.quick().any(|c| c.id == "system_logs"));
    }
}
