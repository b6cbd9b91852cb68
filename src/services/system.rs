//! System metrics for the `.sys` report.

use chrono::{DateTime, Utc};
use sysinfo::{MINIMUM_CPU_UPDATE_INTERVAL, System};

const MIB: f64 = 1024.0 * 1024.0;

/// Process start time, captured once at startup.
#[derive(Debug, Clone, Copy)]
pub struct Uptime {
    started_at: DateTime<Utc>,
}

impl Uptime {
    /// Captures the current instant as the process start.
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
        }
    }

    pub const fn from_start(started_at: DateTime<Utc>) -> Self {
        Self { started_at }
    }

    /// Time since start, never negative.
    pub fn elapsed(&self) -> chrono::Duration {
        (Utc::now() - self.started_at).max(chrono::Duration::zero())
    }
}

/// Used and total amount of a memory pool in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    pub used: u64,
    pub total: u64,
}

impl MemoryUsage {
    /// Creates a reading, clamping `used` to `total`.
    pub fn new(used: u64, total: u64) -> Self {
        Self {
            used: used.min(total),
            total,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn format_mib(self) -> String {
        format!("{:.1}MB/{:.1}MB", self.used as f64 / MIB, self.total as f64 / MIB)
    }
}

/// Snapshot of host metrics.
#[derive(Debug, Clone)]
pub struct SystemReport {
    pub cpu_percent: f32,
    pub memory: MemoryUsage,
    /// `None` when the host has no swap.
    pub swap: Option<MemoryUsage>,
    pub runtime: String,
    pub uptime: chrono::Duration,
}

impl SystemReport {
    /// Samples the host. CPU usage needs two refreshes, so this waits
    /// for the minimum update interval in between.
    pub async fn collect(uptime: &Uptime) -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL).await;
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let swap = (sys.total_swap() > 0).then(|| MemoryUsage::new(sys.used_swap(), sys.total_swap()));

        Self {
            cpu_percent: sys.global_cpu_usage(),
            memory: MemoryUsage::new(sys.used_memory(), sys.total_memory()),
            swap,
            runtime: runtime_version(),
            uptime: uptime.elapsed(),
        }
    }

    /// Renders the report. `response_ms` is the placeholder round trip.
    pub fn render(&self, response_ms: f64) -> String {
        let mut lines = vec![
            "🖥️ Prince-X System Report".to_owned(),
            String::new(),
            format!("⏱️ Response Time: {response_ms:.2}ms"),
            format!("🧠 CPU Usage: {:.1}%", self.cpu_percent),
            format!("💾 Memory: {}", self.memory.format_mib()),
        ];
        if let Some(swap) = self.swap {
            lines.push(format!("💽 Swap: {}", swap.format_mib()));
        }
        lines.push(format!("🦀 Runtime: {}", self.runtime));
        lines.push(format!("⚡ Uptime: {}", format_uptime(self.uptime)));
        lines.join("\n")
    }
}

/// Crate version plus target platform.
pub fn runtime_version() -> String {
    format!(
        "{} v{} ({}/{})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Formats an uptime as `[Nd ]HH:MM:SS`.
pub fn format_uptime(uptime: chrono::Duration) -> String {
    let total = uptime.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;
    if days > 0 {
        format!("{days}d {hours:02}:{mins:02}:{secs:02}")
    } else {
        format!("{hours:02}:{mins:02}:{secs:02}")
    }
}
