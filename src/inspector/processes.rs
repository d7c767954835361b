//! Top-processes table.

use sysinfo::{ProcessesToUpdate, System};
use tracing::instrument;

use crate::format::percent;

const NAME_WIDTH: usize = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRow {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_percent: f64,
}

/// Sample all processes. Two refreshes are needed for CPU figures.
fn collect_rows() -> Vec<ProcessRow> {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.refresh_processes(ProcessesToUpdate::All, true);
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_processes(ProcessesToUpdate::All, true);

    let total_memory = sys.total_memory();
    let mut rows: Vec<ProcessRow> = sys
        .processes()
        .values()
        .map(|p| ProcessRow {
            pid: p.pid().as_u32(),
            name: p.name().to_string_lossy().into_owned(),
            cpu_percent: p.cpu_usage(),
            memory_percent: percent(p.memory(), total_memory),
        })
        .collect();
    // enumeration order is ascending pid
    rows.sort_by_key(|r| r.pid);
    rows
}

/// Descending by CPU. Stable, so ties keep their input order.
pub fn sort_by_cpu(rows: &mut [ProcessRow]) {
    rows.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent));
}

/// Fixed-width table of the `top_n` busiest rows.
pub fn render_process_table(rows: &[ProcessRow], top_n: usize) -> String {
    let mut sorted = rows.to_vec();
    sort_by_cpu(&mut sorted);

    let mut table = String::from("PID   | Name            | CPU%  | Mem%\n");
    table.push_str(&"-".repeat(40));
    table.push('\n');
    for row in sorted.iter().take(top_n) {
        let name: String = row.name.chars().take(NAME_WIDTH).collect();
        table.push_str(&format!(
            "{:>5} | {:<15} | {:>5.1} | {:>6.2}\n",
            row.pid, name, row.cpu_percent, row.memory_percent
        ));
    }
    format!("📈 *Top processes by CPU*\n\n```\n{}```", table)
}

#[instrument]
pub fn process_summary(top_n: usize) -> String {
    let rows = collect_rows();
    if rows.is_empty() {
        return "❌ Could not read the process list".to_string();
    }
    render_process_table(&rows, top_n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pid: u32, name: &str, cpu: f32) -> ProcessRow {
        ProcessRow {
            pid,
            name: name.into(),
            cpu_percent: cpu,
            memory_percent: 1.0,
        }
    }

    #[test]
    fn test_sort_is_stable_for_ties() {
        let mut rows = vec![row(1, "a", 5.0), row(2, "b", 9.0), row(3, "c", 5.0)];
        sort_by_cpu(&mut rows);
        let pids: Vec<u32> = rows.iter().map(|r| r.pid).collect();
        assert_eq!(pids, vec![2, 1, 3]);
    }

    #[test]
    fn test_table_layout() {
        let text = render_process_table(&[row(42, "a-very-long-process-name", 12.34)], 10);
        assert!(text.contains("PID   | Name            | CPU%  | Mem%\n"));
        assert!(text.contains(&"-".repeat(40)));
        assert!(text.contains("   42 | a-very-long-pro |  12.3 |   1.00\n"));
    }

    #[test]
    fn test_table_limited_to_top_n() {
        let rows: Vec<ProcessRow> = (1..=20).map(|i| row(i, "p", i as f32)).collect();
        let text = render_process_table(&rows, 3);
        assert!(text.contains("   20 |"));
        assert!(text.contains("   18 |"));
        assert!(!text.contains("   17 |"));
    }
}
