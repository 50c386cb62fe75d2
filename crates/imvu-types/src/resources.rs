use serde::{Deserialize, Serialize};

/// Resource quotas allocated to a tenant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceEnvelope {
    pub cpu_cores: u32,
    pub memory_gb: u32,
    pub storage_gb: u32,
    pub bandwidth_mbps: u32,
}

impl ResourceEnvelope {
    pub fn new(cpu_cores: u32, memory_gb: u32, storage_gb: u32, bandwidth_mbps: u32) -> Self {
        Self {
            cpu_cores,
            memory_gb,
            storage_gb,
            bandwidth_mbps,
        }
    }

    /// The envelope of a fully throttled tenant.
    pub fn zero() -> Self {
        Self::default()
    }

    /// True when at least one dimension is zero.
    pub fn has_zero_dimension(&self) -> bool {
        self.dimensions().iter().any(|d| *d == 0)
    }

    /// True when every dimension is at most the ceiling's.
    pub fn fits_within(&self, ceiling: &ResourceEnvelope) -> bool {
        self.dimensions()
            .iter()
            .zip(ceiling.dimensions().iter())
            .all(|(mine, max)| mine <= max)
    }

    /// True when any dimension is strictly smaller than the other envelope's.
    pub fn is_below_in_any(&self, other: &ResourceEnvelope) -> bool {
        self.dimensions()
            .iter()
            .zip(other.dimensions().iter())
            .any(|(mine, theirs)| mine < theirs)
    }

    fn dimensions(&self) -> [u32; 4] {
        [
            self.cpu_cores,
            self.memory_gb,
            self.storage_gb,
            self.bandwidth_mbps,
        ]
    }
}

impl std::fmt::Display for ResourceEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}cpu/{}GB mem/{}GB disk/{}Mbps",
            self.cpu_cores, self.memory_gb, self.storage_gb, self.bandwidth_mbps
        )
    }
}
