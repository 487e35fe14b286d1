use buildforge_core::{JobStatus, Phase};

/// A snapshot of the fields that matter for event derivation, taken before
/// and after a `Driver::update_job_status` call (SPEC_FULL §4.4 step c/g).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub status: JobStatus,
    pub current_phase: Phase,
}

/// Table-driven transition -> event mapping (SPEC_FULL §4.6). A phase
/// advance implies the prior phase completed, so `build -> test` emits both
/// `build.completed` and `test.started`, in that order.
pub fn events_for_transition(
    old: Snapshot,
    new: Snapshot,
    failed_phase: Option<Phase>,
) -> Vec<String> {
    let mut events = Vec::new();

    if old.current_phase != new.current_phase {
        if old.current_phase != Phase::None {
            events.push(format!("{}.completed", old.current_phase.as_str()));
        }
        events.push(format!("{}.started", new.current_phase.as_str()));
    }

    if old.status != new.status {
        if new.status == JobStatus::Succeeded {
            events.push(format!("{}.completed", new.current_phase.as_str()));
            events.push("job.completed".to_string());
        } else if new.status == JobStatus::Failed {
            let phase_name = failed_phase.map(Phase::as_str).unwrap_or("job");
            events.push(format!("{phase_name}.failed"));
            events.push("job.failed".to_string());
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(status: JobStatus, phase: Phase) -> Snapshot {
        Snapshot {
            status,
            current_phase: phase,
        }
    }

    #[test]
    fn build_start_fires_on_phase_entry() {
        let old = snap(JobStatus::Pending, Phase::None);
        let new = snap(JobStatus::Building, Phase::Build);
        assert_eq!(events_for_transition(old, new, None), vec!["build.started"]);
    }

    #[test]
    fn success_without_tests_fires_build_completed_and_job_completed() {
        let old = snap(JobStatus::Building, Phase::Build);
        let new = snap(JobStatus::Succeeded, Phase::Build);
        assert_eq!(
            events_for_transition(old, new, None),
            vec!["build.completed", "job.completed"]
        );
    }

    #[test]
    fn test_failure_fires_test_failed_and_job_failed() {
        let old = snap(JobStatus::Testing, Phase::Test);
        let new = snap(JobStatus::Failed, Phase::Test);
        assert_eq!(
            events_for_transition(old, new, Some(Phase::Test)),
            vec!["test.failed", "job.failed"]
        );
    }

    #[test]
    fn no_change_fires_nothing() {
        let snapshot = snap(JobStatus::Building, Phase::Build);
        assert!(events_for_transition(snapshot, snapshot, None).is_empty());
    }

    #[test]
    fn full_happy_path_sequence_with_tests() {
        let pending = snap(JobStatus::Pending, Phase::None);
        let building = snap(JobStatus::Building, Phase::Build);
        let testing = snap(JobStatus::Testing, Phase::Test);
        let publishing = snap(JobStatus::Publishing, Phase::Publish);
        let succeeded = snap(JobStatus::Succeeded, Phase::Publish);

        let mut sequence = Vec::new();
        sequence.extend(events_for_transition(pending, building, None));
        sequence.extend(events_for_transition(building, testing, None));
        sequence.extend(events_for_transition(testing, publishing, None));
        sequence.extend(events_for_transition(publishing, succeeded, None));

        assert_eq!(
            sequence,
            vec![
                "build.started",
                "build.completed",
                "test.started",
                "test.completed",
                "publish.started",
                "publish.completed",
                "job.completed",
            ]
        );
    }
}
