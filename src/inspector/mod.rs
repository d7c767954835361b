//! System inspector: read-only health reports rendered as chat-ready text.
//!
//! Each report gathers what it can and renders the rest as `N/A`; a single
//! failing probe never aborts a report. Gathering and rendering are kept
//! apart so the layouts can be tested against fixed snapshots.
//!
//! Split into submodules per report.

mod disk;
mod host;
mod network;
mod processes;
mod services;

pub use disk::{
    detailed_disk_summary, detailed_disk_summary_with, disk_summary, disk_summary_with,
    parse_df, parse_lsblk, DiskSources, BlockDevice, DfRow, EXTERNAL_MOUNTS,
};
pub use host::{
    cpu_temperature, host_summary, memory_summary, parse_sensor_value, parse_vcgencmd,
    read_temperature, render_host, render_memory, HostSnapshot, MemorySnapshot,
    TEMPERATURE_SOURCES,
};
pub use network::{network_summary, render_network, InterfaceInfo, NetworkSnapshot};
pub use processes::{process_summary, render_process_table, sort_by_cpu, ProcessRow};
pub use services::{
    check_endpoint, check_tcp, services_summary, Endpoint, ServiceStatus, ServiceTargets,
};

use crate::config::Config;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::{debug, error, instrument};

/// One inspector report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum Section {
    Host,
    Memory,
    Disk,
    DiskDetailed,
    Network,
    Services,
    Processes,
}

/// Report entry point holding the few config values the reports need.
#[derive(Debug, Clone)]
pub struct Inspector {
    targets: ServiceTargets,
    top_n: usize,
}

impl Inspector {
    pub fn new(targets: ServiceTargets, top_n: usize) -> Self {
        Self { targets, top_n }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ServiceTargets::from_config(config),
            config.process_top_n,
        )
    }

    /// Produce one report. Blocking probes run on the blocking pool so the
    /// event loop keeps serving other operators.
    #[instrument(skip(self))]
    pub async fn report(&self, section: Section) -> String {
        debug!("Collecting report");
        match section {
            Section::Services => services_summary(&self.targets).await,
            Section::Host => blocking(section, host_summary).await,
            Section::Memory => blocking(section, memory_summary).await,
            Section::Disk => blocking(section, disk_summary).await,
            Section::DiskDetailed => blocking(section, detailed_disk_summary).await,
            Section::Network => blocking(section, network_summary).await,
            Section::Processes => {
                let top_n = self.top_n;
                blocking(section, move || process_summary(top_n)).await
            }
        }
    }
}

async fn blocking<F>(section: Section, collect: F) -> String
where
    F: FnOnce() -> String + Send + 'static,
{
    match tokio::task::spawn_blocking(collect).await {
        Ok(text) => text,
        Err(e) => {
            error!(%section, error = %e, "Report collection panicked");
            format!("❌ Failed to collect {} report: {}", section, e)
        }
    }
}

// ── Shared helpers ──────────────────────────────────────────────────────────

/// Run a utility and return its stdout, or `None` if it is missing or fails.
pub(crate) fn probe(program: &str, args: &[&str]) -> Option<String> {
    let output = match std::process::Command::new(program).args(args).output() {
        Ok(output) => output,
        Err(e) => {
            debug!(program, error = %e, "Probe unavailable");
            return None;
        }
    };
    if !output.status.success() {
        debug!(program, status = %output.status, "Probe failed");
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}
