//! Live voxel budget for streaming
//!
//! Tracks how many voxels are resident against a configured ceiling and
//! provides pressure metrics to guide eviction and restore decisions.

/// Pressure above which chunks should be evicted
const EVICT_PRESSURE: f32 = 0.9;

/// Live voxel budget
pub struct VoxelBudget {
    /// Maximum live voxels wanted
    budget: usize,
    /// Currently live voxels
    used: usize,
}

impl VoxelBudget {
    /// Create a new budget
    ///
    /// # Arguments
    /// * `budget` - Live voxel count the streamer tries to stay under
    pub fn new(budget: usize) -> Self {
        Self { budget, used: 0 }
    }

    /// Record the current live voxel count
    pub fn update(&mut self, used: usize) {
        self.used = used;
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Voxels that can still be brought in
    pub fn available(&self) -> usize {
        self.budget.saturating_sub(self.used)
    }

    /// Usage pressure (0.0 to 1.0+)
    ///
    /// Values above 0.9 indicate high pressure.
    /// Values above 1.0 indicate over-budget.
    pub fn pressure(&self) -> f32 {
        if self.budget == 0 {
            return 0.0;
        }
        self.used as f32 / self.budget as f32
    }

    /// Check if we should evict chunks
    pub fn should_evict(&self) -> bool {
        self.pressure() > EVICT_PRESSURE
    }

    /// Check if a restore step may run
    pub fn can_restore(&self) -> bool {
        !self.should_evict() && self.available() > 0
    }
}
