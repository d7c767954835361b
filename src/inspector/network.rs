//! Network traffic and interface report.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

use sysinfo::Networks;
use tracing::{debug, instrument};

use crate::format::{bytes_to_mb, group_thousands};

const SYS_CLASS_NET: &str = "/sys/class/net";

/// `IFF_UP` in `/sys/class/net/<if>/flags`.
const IFF_UP: u32 = 0x1;

#[derive(Debug, Clone, Default)]
pub struct InterfaceInfo {
    pub name: String,
    pub speed_mbps: Option<u32>,
    pub ipv4: Vec<(Ipv4Addr, u8)>,
    pub ipv6: Vec<Ipv6Addr>,
    pub mac: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkSnapshot {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    /// Only interfaces that are up, sorted by name.
    pub interfaces: Vec<InterfaceInfo>,
}

impl NetworkSnapshot {
    pub fn collect() -> Self {
        let networks = Networks::new_with_refreshed_list();
        let mut snap = NetworkSnapshot::default();

        for (name, data) in networks.iter() {
            snap.bytes_sent += data.total_transmitted();
            snap.bytes_recv += data.total_received();
            snap.packets_sent += data.total_packets_transmitted();
            snap.packets_recv += data.total_packets_received();

            let mut iface = InterfaceInfo {
                name: name.clone(),
                ..Default::default()
            };
            for net in data.ip_networks() {
                match net.addr {
                    IpAddr::V4(v4) => iface.ipv4.push((v4, net.prefix)),
                    IpAddr::V6(v6) => iface.ipv6.push(v6),
                }
            }
            let mac = data.mac_address();
            if !mac.is_unspecified() {
                iface.mac = Some(mac.to_string());
            }

            let sysfs = Path::new(SYS_CLASS_NET).join(name);
            let has_addresses = !iface.ipv4.is_empty() || !iface.ipv6.is_empty();
            if !link_is_up(&sysfs).unwrap_or(has_addresses) {
                debug!(interface = %name, "Skipping interface that is down");
                continue;
            }
            iface.speed_mbps = link_speed(&sysfs);
            snap.interfaces.push(iface);
        }

        snap.interfaces.sort_by(|a, b| a.name.cmp(&b.name));
        snap
    }
}

/// `None` when the flags file is unreadable (no sysfs on this platform).
fn link_is_up(sysfs: &Path) -> Option<bool> {
    let raw = std::fs::read_to_string(sysfs.join("flags")).ok()?;
    let flags = u32::from_str_radix(raw.trim().trim_start_matches("0x"), 16).ok()?;
    Some(flags & IFF_UP != 0)
}

/// Virtual links report `-1` or fail the read entirely.
fn link_speed(sysfs: &Path) -> Option<u32> {
    let raw = std::fs::read_to_string(sysfs.join("speed")).ok()?;
    raw.trim().parse::<i64>().ok().and_then(|s| u32::try_from(s).ok()).filter(|s| *s > 0)
}

/// Netmask for an IPv4 prefix length: 24 → 255.255.255.0
pub(crate) fn ipv4_netmask(prefix: u8) -> Ipv4Addr {
    let bits = u32::MAX
        .checked_shl(32u32.saturating_sub(u32::from(prefix)))
        .unwrap_or(0);
    Ipv4Addr::from(bits)
}

#[instrument]
pub fn network_summary() -> String {
    render_network(&NetworkSnapshot::collect())
}

pub fn render_network(snap: &NetworkSnapshot) -> String {
    let mut out = String::from("🌐 *Network*\n\n*Traffic:*\n");
    out.push_str(&format!("• Sent: {:.1} MB\n", bytes_to_mb(snap.bytes_sent)));
    out.push_str(&format!("• Received: {:.1} MB\n", bytes_to_mb(snap.bytes_recv)));
    out.push_str(&format!(
        "• Packets sent: {}\n",
        group_thousands(snap.packets_sent)
    ));
    out.push_str(&format!(
        "• Packets received: {}\n",
        group_thousands(snap.packets_recv)
    ));

    out.push_str("\n*Interfaces:*\n");
    if snap.interfaces.is_empty() {
        out.push_str("No active interfaces\n");
    }
    for iface in &snap.interfaces {
        match iface.speed_mbps {
            Some(speed) => out.push_str(&format!(
                "• *{}* (UP, {} Mbps)\n",
                iface.name, speed
            )),
            None => out.push_str(&format!("• *{}* (UP)\n", iface.name)),
        }
        for (addr, prefix) in &iface.ipv4 {
            out.push_str(&format!(
                "  IPv4: `{}` / {}\n",
                addr,
                ipv4_netmask(*prefix)
            ));
        }
        for addr in &iface.ipv6 {
            out.push_str(&format!("  IPv6: `{}`\n", addr));
        }
        if let Some(mac) = &iface.mac {
            out.push_str(&format!("  MAC: `{}`\n", mac));
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_netmask_from_prefix() {
        assert_eq!(ipv4_netmask(24), Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(ipv4_netmask(32), Ipv4Addr::new(255, 255, 255, 255));
        assert_eq!(ipv4_netmask(0), Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(ipv4_netmask(20), Ipv4Addr::new(255, 255, 240, 0));
    }

    #[test]
    fn test_sysfs_flags_and_speed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("flags"), "0x1003\n").unwrap();
        std::fs::write(dir.path().join("speed"), "1000\n").unwrap();
        assert_eq!(link_is_up(dir.path()), Some(true));
        assert_eq!(link_speed(dir.path()), Some(1000));

        std::fs::write(dir.path().join("flags"), "0x1002\n").unwrap();
        std::fs::write(dir.path().join("speed"), "-1\n").unwrap();
        assert_eq!(link_is_up(dir.path()), Some(false));
        assert_eq!(link_speed(dir.path()), None);
    }

    #[test]
    fn test_missing_sysfs_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(link_is_up(dir.path()), None);
        assert_eq!(link_speed(dir.path()), None);
    }

    #[test]
    fn test_render_network() {
        let snap = NetworkSnapshot {
            bytes_sent: 5 * 1024 * 1024,
            bytes_recv: 1024 * 1024,
            packets_sent: 1_234_567,
            packets_recv: 42,
            interfaces: vec![InterfaceInfo {
                name: "eth0".into(),
                speed_mbps: Some(1000),
                ipv4: vec![(Ipv4Addr::new(192, 168, 1, 10), 24)],
                ipv6: vec!["fe80::1".parse().unwrap()],
                mac: Some("aa:bb:cc:dd:ee:ff".into()),
            }],
        };
        let text = render_network(&snap);
        assert!(text.contains("• Sent: 5.0 MB"));
        assert!(text.contains("• Packets sent: 1,234,567"));
        assert!(text.contains("• *eth0* (UP, 1000 Mbps)"));
        assert!(text.contains("  IPv4: `192.168.1.10` / 255.255.255.0"));
        assert!(text.contains("  IPv6: `fe80::1`"));
        assert!(text.ends_with("  MAC: `aa:bb:cc:dd:ee:ff`"));
    }

    #[test]
    fn test_render_without_interfaces() {
        let text = render_network(&NetworkSnapshot::default());
        assert!(text.ends_with("No active interfaces"));
    }
}
