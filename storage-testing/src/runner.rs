use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use storage_tracker::VolumeLifecycleTracker;
use storage_types::LifecycleEvent;
use tracing::debug;

use crate::scenario::Scenario;
use crate::source::MemoryEventSource;

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub start_error: Option<String>,
    pub observed: Vec<LifecycleEvent>,
    pub expected: Vec<LifecycleEvent>,
    pub placeholders: Vec<String>,
    pub mismatches: Vec<String>,
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

impl fmt::Display for ScenarioOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.passed() { "PASS" } else { "FAIL" };
        writeln!(
            f,
            "{verdict} {} ({} observed, {} expected)",
            self.name,
            self.observed.len(),
            self.expected.len()
        )?;
        for mismatch in &self.mismatches {
            writeln!(f, "  - {mismatch}")?;
        }
        Ok(())
    }
}

fn describe(event: &LifecycleEvent) -> String {
    let kind = if event.is_usable() { "usable" } else { "unusable" };
    let volume = event.volume();
    format!("{kind}({} {})", volume.id, volume.state)
}

/// Replay `scenario` against a fresh tracker on an in-memory source.
pub async fn run_scenario(scenario: &Scenario) -> ScenarioOutcome {
    let source = Arc::new(MemoryEventSource::new(
        scenario.disks.clone(),
        scenario.volumes.clone(),
    ));
    source.set_available(scenario.source_available);

    let mut tracker = VolumeLifecycleTracker::new(Arc::clone(&source), scenario.tracker.clone());
    let mut stream = tracker.subscribe();
    let mut outcome = ScenarioOutcome {
        name: scenario.name.clone(),
        start_error: None,
        observed: Vec::new(),
        expected: scenario.expected.clone(),
        placeholders: Vec::new(),
        mismatches: Vec::new(),
    };

    match tracker.start().await {
        Ok(()) if scenario.expect_start_failure => {
            outcome
                .mismatches
                .push("tracker started but a start failure was expected".to_string());
        }
        Ok(()) => {}
        Err(error) => {
            if !scenario.expect_start_failure {
                outcome.mismatches.push(format!("tracker failed to start: {error}"));
            }
            outcome.start_error = Some(error.to_string());
            return outcome;
        }
    }

    for step in &scenario.steps {
        debug!("Scenario {}: delivering {}", scenario.name, step.kind());
        source.emit(step);
    }

    outcome.observed = stream.drain();
    outcome.placeholders = tracker
        .snapshot()
        .placeholders()
        .map(|v| v.id.clone())
        .collect();
    tracker.stop().await;

    let longest = outcome.observed.len().max(outcome.expected.len());
    for index in 0..longest {
        match (outcome.observed.get(index), outcome.expected.get(index)) {
            (Some(observed), Some(expected)) if observed == expected => {}
            (Some(observed), Some(expected)) => outcome.mismatches.push(format!(
                "event {index}: observed {} but expected {}",
                describe(observed),
                describe(expected)
            )),
            (Some(observed), None) => outcome
                .mismatches
                .push(format!("event {index}: unexpected {}", describe(observed))),
            (None, Some(expected)) => outcome
                .mismatches
                .push(format!("event {index}: missing {}", describe(expected))),
            (None, None) => {}
        }
    }

    if let Some(expected) = &scenario.expected_placeholders
        && *expected != outcome.placeholders
    {
        outcome.mismatches.push(format!(
            "placeholders {:?} but expected {:?}",
            outcome.placeholders, expected
        ));
    }

    outcome
}

#[cfg(test)]
mod tests {
    use storage_types::{Disk, StorageEvent, Volume, VolumeState};

    use super::*;

    fn scenario(steps: Vec<StorageEvent>, expected: Vec<LifecycleEvent>) -> Scenario {
        Scenario {
            name: "unit".to_string(),
            description: None,
            tracker: Default::default(),
            source_available: true,
            expect_start_failure: false,
            disks: vec![Disk::new("D1", 1)],
            volumes: vec![],
            steps,
            expected,
            expected_placeholders: None,
        }
    }

    #[tokio::test]
    async fn reports_missing_and_unexpected_events() {
        let v1 = Volume::new("V1", "abc", "D1", VolumeState::Mounted);
        let outcome = run_scenario(&scenario(
            vec![StorageEvent::VolumeStateChanged {
                volume: v1.clone(),
                old_state: None,
                new_state: VolumeState::Mounted,
            }],
            vec![],
        ))
        .await;

        assert!(!outcome.passed());
        assert_eq!(
            outcome.mismatches,
            vec!["event 0: unexpected usable(V1 mounted)".to_string()]
        );
    }

    #[tokio::test]
    async fn unexpected_start_failure_is_a_mismatch() {
        let mut unavailable = scenario(vec![], vec![]);
        unavailable.source_available = false;

        let outcome = run_scenario(&unavailable).await;

        assert!(outcome.start_error.is_some());
        assert_eq!(outcome.mismatches.len(), 1);
        assert!(outcome.to_string().starts_with("FAIL unit"));
    }
}
