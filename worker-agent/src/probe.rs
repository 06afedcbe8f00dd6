// Copyright 2024-2025 Golem Cloud
//
// Licensed under the Golem Source License v1.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://license.golem.cloud/LICENSE
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Samples local host resources. Every subsection is best-effort: a
//! failing one is simply omitted from the snapshot rather than reported as
//! zero, since a worker reporting "0% disk used" is worse than a worker
//! reporting nothing.

use fleet_common::protocol::{
    CpuSnapshot, DeclaredResources, DiskSnapshot, NetworkSnapshot, RamSnapshot, ResourceSnapshot,
};
use fleet_common::time::now_millis;
use sysinfo::{Disks, Networks, System};

const BYTES_PER_GB: f64 = 1e9;

struct NetworkSample {
    rx_bytes: u64,
    tx_bytes: u64,
    at: u64,
}

pub struct ResourceProbe {
    system: System,
    disks: Disks,
    networks: Networks,
    last_network: Option<NetworkSample>,
}

impl ResourceProbe {
    pub fn new() -> Self {
        Self {
            system: System::new_all(),
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
            last_network: None,
        }
    }

    /// Static capacity reported once at registration time: total cores,
    /// total RAM, total disk.
    pub fn declared_resources(&mut self) -> DeclaredResources {
        self.system.refresh_memory();
        self.disks.refresh(true);

        let cpu_cores = self.system.cpus().len().max(1) as u32;
        let ram_gb = self.system.total_memory() as f64 / BYTES_PER_GB;
        let disk_gb = self
            .disks
            .iter()
            .map(|disk| disk.total_space())
            .sum::<u64>() as f64
            / BYTES_PER_GB;

        DeclaredResources {
            cpu_cores,
            ram_gb,
            disk_gb,
        }
    }

    /// A live telemetry sample. `network` is omitted on the first call:
    /// bandwidth requires two samples at least a second apart to compute.
    pub fn sample(&mut self) -> ResourceSnapshot {
        let timestamp = now_millis();

        let cpu = self.sample_cpu();
        let ram = self.sample_ram();
        let disk = self.sample_disk();
        let network = self.sample_network(timestamp);

        ResourceSnapshot {
            cpu,
            ram,
            disk,
            network,
            timestamp,
        }
    }

    fn sample_cpu(&mut self) -> Option<CpuSnapshot> {
        self.system.refresh_cpu_usage();
        if self.system.cpus().is_empty() {
            return None;
        }
        let per_core: Vec<f32> = self.system.cpus().iter().map(|cpu| cpu.cpu_usage()).collect();
        let usage_percent = self.system.global_cpu_usage();
        Some(CpuSnapshot {
            usage_percent,
            per_core,
        })
    }

    fn sample_ram(&mut self) -> Option<RamSnapshot> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            return None;
        }
        let used = self.system.used_memory();
        let total_gb = total as f64 / BYTES_PER_GB;
        let used_gb = used as f64 / BYTES_PER_GB;
        Some(RamSnapshot {
            total_gb,
            used_gb,
            usage_percent: (used as f32 / total as f32) * 100.0,
        })
    }

    fn sample_disk(&mut self) -> Option<DiskSnapshot> {
        self.disks.refresh(true);
        if self.disks.list().is_empty() {
            return None;
        }
        let total: u64 = self.disks.iter().map(|disk| disk.total_space()).sum();
        if total == 0 {
            return None;
        }
        let available: u64 = self.disks.iter().map(|disk| disk.available_space()).sum();
        let used = total.saturating_sub(available);
        Some(DiskSnapshot {
            total_gb: total as f64 / BYTES_PER_GB,
            used_gb: used as f64 / BYTES_PER_GB,
            usage_percent: (used as f32 / total as f32) * 100.0,
        })
    }

    fn sample_network(&mut self, timestamp: u64) -> Option<NetworkSnapshot> {
        self.networks.refresh(true);
        let (rx_bytes, tx_bytes) = self
            .networks
            .iter()
            .map(|(_, data)| (data.total_received(), data.total_transmitted()))
            .fold((0u64, 0u64), |acc, pair| (acc.0 + pair.0, acc.1 + pair.1));

        let snapshot = self.last_network.as_ref().and_then(|previous| {
            let elapsed_secs = (timestamp.saturating_sub(previous.at)) as f64 / 1000.0;
            if elapsed_secs < 1.0 {
                return None;
            }
            Some(NetworkSnapshot {
                rx_bytes_per_sec: rx_bytes.saturating_sub(previous.rx_bytes) as f64 / elapsed_secs,
                tx_bytes_per_sec: tx_bytes.saturating_sub(previous.tx_bytes) as f64 / elapsed_secs,
            })
        });

        self.last_network = Some(NetworkSample {
            rx_bytes,
            tx_bytes,
            at: timestamp,
        });

        snapshot
    }
}

impl Default for ResourceProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// True if `updated` differs from `baseline` by at least `noise_floor`
/// (a fraction, e.g. `0.05` for 5%) in any top-level field. Used to decide
/// whether a ping needs to carry a fresh snapshot.
pub fn changed_beyond_noise_floor(
    baseline: &DeclaredResources,
    updated: &DeclaredResources,
    noise_floor: f64,
) -> bool {
    fraction_changed(baseline.ram_gb, updated.ram_gb) > noise_floor
        || fraction_changed(baseline.disk_gb, updated.disk_gb) > noise_floor
        || baseline.cpu_cores != updated.cpu_cores
}

fn fraction_changed(before: f64, after: f64) -> f64 {
    if before <= 0.0 {
        return if after > 0.0 { 1.0 } else { 0.0 };
    }
    ((after - before).abs()) / before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_resources_reports_at_least_one_core() {
        let mut probe = ResourceProbe::new();
        let declared = probe.declared_resources();
        assert!(declared.cpu_cores >= 1);
    }

    #[test]
    fn noise_floor_ignores_small_ram_drift() {
        let baseline = DeclaredResources {
            cpu_cores: 4,
            ram_gb: 16.0,
            disk_gb: 100.0,
        };
        let updated = DeclaredResources {
            ram_gb: 16.1,
            ..baseline.clone()
        };
        assert!(!changed_beyond_noise_floor(&baseline, &updated, 0.05));
    }

    #[test]
    fn noise_floor_flags_a_large_disk_change() {
        let baseline = DeclaredResources {
            cpu_cores: 4,
            ram_gb: 16.0,
            disk_gb: 100.0,
        };
        let updated = DeclaredResources {
            disk_gb: 150.0,
            ..baseline.clone()
        };
        assert!(changed_beyond_noise_floor(&baseline, &updated, 0.05));
    }
}
