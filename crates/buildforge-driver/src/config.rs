use chrono::Duration;

/// Tunables for the Driver. The build-to-test sleep is deliberately a
/// configurable constant rather than a hardcoded literal: SPEC_FULL §9 marks
/// it load-bearing for a real container-layer race observed on orchestrator
/// worker nodes, not a correctness requirement.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub lock_acquire_timeout: Duration,
    pub build_to_test_delay: std::time::Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            lock_acquire_timeout: Duration::minutes(30),
            build_to_test_delay: std::time::Duration::from_secs(3),
        }
    }
}
