//! Process-level snapshot reported next to the generator stats.

use serde::Serialize;
use sysinfo::{Pid, System};

/// Runtime figures for the agent process itself.
#[derive(Debug, Clone, Serialize)]
pub struct SystemSnapshot {
    /// Live tasks on the tokio runtime.
    pub tasks: usize,
    /// Resident set size of this process in MiB.
    pub memory_rss_mb: u64,
    /// Logical cores visible to the process.
    pub cpu_cores: usize,
}

impl SystemSnapshot {
    #[must_use]
    pub fn capture() -> Self {
        let pid = Pid::from_u32(std::process::id());
        let mut system = System::new();
        system.refresh_process(pid);
        let memory_rss_mb = system
            .process(pid)
            .map(|process| process.memory() / (1024 * 1024))
            .unwrap_or(0);

        Self {
            tasks: tokio::runtime::Handle::current().metrics().num_alive_tasks(),
            memory_rss_mb,
            cpu_cores: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}
