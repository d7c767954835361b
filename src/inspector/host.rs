//! Host and memory reports.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Local};
use sysinfo::System;
use tracing::{debug, instrument};

use super::probe;
use crate::format::{bytes_to_gb, format_uptime, percent};

/// Sensor files tried in order for the CPU temperature.
pub const TEMPERATURE_SOURCES: &[&str] = &[
    "/sys/class/thermal/thermal_zone0/temp",
    "/sys/class/hwmon/hwmon0/temp1_input",
    "/sys/devices/virtual/thermal/thermal_zone0/temp",
];

/// Window for the CPU utilization sample.
const CPU_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub available: u64,
    pub swap_total: u64,
    pub swap_used: u64,
}

impl MemorySnapshot {
    fn collect(sys: &System) -> Self {
        Self {
            total: sys.total_memory(),
            used: sys.used_memory(),
            free: sys.free_memory(),
            available: sys.available_memory(),
            swap_total: sys.total_swap(),
            swap_used: sys.used_swap(),
        }
    }
}

/// Everything the host report shows, gathered in one pass.
#[derive(Debug, Clone)]
pub struct HostSnapshot {
    pub cpu_percent: f32,
    pub cores: usize,
    pub temperature: Option<f32>,
    pub load: [f64; 3],
    pub memory: MemorySnapshot,
    pub hostname: Option<String>,
    pub os_name: Option<String>,
    pub os_release: Option<String>,
    pub arch: String,
    pub uptime: Duration,
    pub now: DateTime<Local>,
}

impl HostSnapshot {
    /// Blocks for the CPU sample window.
    pub fn collect() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        std::thread::sleep(CPU_SAMPLE_WINDOW.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL));
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let load = System::load_average();
        let now = Local::now();
        let boot = System::boot_time();
        let uptime = u64::try_from(now.timestamp())
            .map(|now| now.saturating_sub(boot))
            .unwrap_or_default();

        Self {
            cpu_percent: sys.global_cpu_usage(),
            cores: sys.cpus().len(),
            temperature: cpu_temperature(),
            load: [load.one, load.five, load.fifteen],
            memory: MemorySnapshot::collect(&sys),
            hostname: System::host_name(),
            os_name: System::name(),
            os_release: System::kernel_version(),
            arch: std::env::consts::ARCH.to_string(),
            uptime: Duration::from_secs(uptime),
            now,
        }
    }
}

/// CPU, memory, swap and identity of the host.
#[instrument]
pub fn host_summary() -> String {
    render_host(&HostSnapshot::collect())
}

/// Memory and swap only.
#[instrument]
pub fn memory_summary() -> String {
    let mut sys = System::new();
    sys.refresh_memory();
    render_memory(&MemorySnapshot::collect(&sys))
}

pub fn render_host(snap: &HostSnapshot) -> String {
    let temperature = snap
        .temperature
        .map(|t| format!("{:.1}°C", t))
        .unwrap_or_else(|| "N/A".to_string());
    let na = |v: &Option<String>| v.clone().unwrap_or_else(|| "N/A".to_string());

    let mut out = String::from("📊 *System status*\n\n");
    out.push_str(&format!("*CPU ({} cores):*\n", snap.cores));
    out.push_str(&format!("• Usage: {:.1}%\n", snap.cpu_percent));
    out.push_str(&format!("• Temperature: {}\n", temperature));
    out.push_str(&format!(
        "• Load (1, 5, 15 min): {:.2}, {:.2}, {:.2}\n\n",
        snap.load[0], snap.load[1], snap.load[2]
    ));
    out.push_str(&memory_lines(&snap.memory));
    out.push_str("\n*System:*\n");
    out.push_str(&format!("• Host: `{}`\n", na(&snap.hostname)));
    out.push_str(&format!(
        "• OS: {} {}\n",
        na(&snap.os_name),
        na(&snap.os_release)
    ));
    out.push_str(&format!("• Architecture: {}\n", snap.arch));
    out.push_str(&format!("• Uptime: {}\n", format_uptime(snap.uptime)));
    out.push_str(&format!(
        "• Date/time: {}",
        snap.now.format("%Y-%m-%d %H:%M:%S")
    ));
    out
}

pub fn render_memory(mem: &MemorySnapshot) -> String {
    format!("🧠 *Memory usage*\n\n{}", memory_lines(mem))
        .trim_end()
        .to_string()
}

fn memory_lines(mem: &MemorySnapshot) -> String {
    format!(
        "*Memory:*\n\
         • Total: {:.1} GB\n\
         • Used: {:.1} GB ({:.1}%)\n\
         • Free: {:.1} GB\n\
         • Available: {:.1} GB\n\n\
         *Swap:*\n\
         • Total: {:.1} GB\n\
         • Used: {:.1} GB ({:.1}%)\n",
        bytes_to_gb(mem.total),
        bytes_to_gb(mem.used),
        percent(mem.used, mem.total),
        bytes_to_gb(mem.free),
        bytes_to_gb(mem.available),
        bytes_to_gb(mem.swap_total),
        bytes_to_gb(mem.swap_used),
        percent(mem.swap_used, mem.swap_total),
    )
}

// ── Temperature ─────────────────────────────────────────────────────────────

/// First responsive sensor file, then `vcgencmd`, else `None`.
pub fn cpu_temperature() -> Option<f32> {
    read_temperature(TEMPERATURE_SOURCES, "vcgencmd")
}

pub fn read_temperature<P: AsRef<Path>>(sources: &[P], vendor_tool: &str) -> Option<f32> {
    for source in sources {
        let source = source.as_ref();
        match std::fs::read_to_string(source) {
            Ok(raw) => {
                if let Some(celsius) = parse_sensor_value(&raw) {
                    return Some(celsius);
                }
                debug!(path = %source.display(), "Unparseable sensor value");
            }
            Err(e) => debug!(path = %source.display(), error = %e, "Sensor unavailable"),
        }
    }
    probe(vendor_tool, &["measure_temp"]).and_then(|out| parse_vcgencmd(&out))
}

/// Sensor files report either degrees or millidegrees.
pub fn parse_sensor_value(raw: &str) -> Option<f32> {
    let value: f32 = raw.trim().parse().ok()?;
    Some(if value > 1000.0 { value / 1000.0 } else { value })
}

/// `temp=48.3'C` → 48.3
pub fn parse_vcgencmd(raw: &str) -> Option<f32> {
    raw.trim()
        .strip_prefix("temp=")?
        .split('\'')
        .next()?
        .parse()
        .ok()
}
