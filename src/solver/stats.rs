/// Per-step solver statistics. Counts are summed over the substeps of the
/// latest `Solver::step` call; timings are in microseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverStats {
    pub substeps: u32,
    pub contact_constraints: usize,
    pub rigid_contact_constraints: usize,
    pub boundary_constraints: usize,
    pub stabilization_constraints: usize,
    pub density_constraints: usize,
    pub shape_constraints: usize,
    /// Particles left out of a full hash-grid bucket.
    pub dropped_from_grid: usize,
    /// Fluid neighbour entries cut by the per-particle buffer cap.
    pub truncated_neighbors: usize,
    /// Particles settled by the sleep threshold in the last substep.
    pub sleeping_particles: usize,
    pub prediction_time_us: u64,
    pub discovery_time_us: u64,
    pub solve_time_us: u64,
    pub reconcile_time_us: u64,
    pub total_time_us: u64,
}

impl SolverStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Constraints rebuilt from geometry during the step.
    pub fn transient_constraints(&self) -> usize {
        self.contact_constraints + self.rigid_contact_constraints + self.boundary_constraints
    }

    /// Whether any capacity limit discarded data during the step.
    pub fn overflowed(&self) -> bool {
        self.dropped_from_grid > 0 || self.truncated_neighbors > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_clears_everything() {
        let mut stats = SolverStats {
            substeps: 3,
            contact_constraints: 4,
            boundary_constraints: 2,
            truncated_neighbors: 1,
            total_time_us: 99,
            ..SolverStats::default()
        };
        assert_eq!(stats.transient_constraints(), 6);
        assert!(stats.overflowed());

        stats.reset();
        assert_eq!(stats, SolverStats::default());
        assert!(!stats.overflowed());
    }
}
