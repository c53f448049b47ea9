//! Readiness resolution and execution waves.
//!
//! Readiness is computed from the project snapshot alone; nothing here
//! mutates state. Orderings are deterministic: the logical time a phase
//! became (or would become) schedulable, then the phase id.

use crate::dag::builder::{PhaseGraph, PhaseIndex};
use crate::lifecycle::PhaseState;
use crate::project::{PhaseRecord, Project};
use std::collections::HashSet;

/// A phase whose prerequisites have all passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyPhase {
    pub id: String,
    /// Logical time the last prerequisite passed, 0 for roots
    pub ready_at: u64,
}

/// Logical time the last prerequisite of `record` passed, if all have.
fn prerequisites_passed_at(project: &Project, record: &PhaseRecord) -> Option<u64> {
    record.def.depends_on.iter().try_fold(0u64, |latest, dep| {
        let dep = project.phase(dep)?;
        if dep.state.is_passed() {
            Some(latest.max(dep.passed_at.unwrap_or(0)))
        } else {
            None
        }
    })
}

/// Every PENDING phase whose whole prerequisite set has PASSED, ordered by
/// `(ready_at, id)`.
pub fn readiness(project: &Project) -> Vec<ReadyPhase> {
    let mut ready: Vec<ReadyPhase> = project
        .phases
        .iter()
        .filter(|p| p.state == PhaseState::Pending)
        .filter_map(|p| {
            prerequisites_passed_at(project, p).map(|ready_at| ReadyPhase {
                id: p.def.id.clone(),
                ready_at,
            })
        })
        .collect();
    ready.sort_by(|a, b| a.ready_at.cmp(&b.ready_at).then_with(|| a.id.cmp(&b.id)));
    ready
}

/// Coordinator candidates in scheduling order: READY, REVISE_REQUIRED and
/// IN_PROGRESS phases without an active session.
pub fn candidates(project: &Project) -> Vec<&PhaseRecord> {
    let mut candidates: Vec<&PhaseRecord> =
        project.phases.iter().filter(|p| p.is_candidate()).collect();
    candidates.sort_by(|a, b| {
        a.schedulable_at
            .cmp(&b.schedulable_at)
            .then_with(|| a.def.id.cmp(&b.def.id))
    });
    candidates
}

/// Compute execution waves: groups of phases that can run in parallel.
///
/// Each wave lists the phases runnable once every earlier wave has passed,
/// sorted by id.
pub fn compute_waves(graph: &PhaseGraph) -> Vec<Vec<String>> {
    waves_from(graph, &HashSet::new())
}

/// Waves for the work still outstanding in `project`.
///
/// Passed phases count as complete and are left out.
pub fn remaining_waves(graph: &PhaseGraph, project: &Project) -> Vec<Vec<String>> {
    let passed: HashSet<PhaseIndex> = project
        .phases
        .iter()
        .filter(|p| p.state.is_passed())
        .filter_map(|p| graph.get_index(p.id()))
        .collect();
    waves_from(graph, &passed)
}

fn waves_from(graph: &PhaseGraph, already: &HashSet<PhaseIndex>) -> Vec<Vec<String>> {
    let mut waves = Vec::new();
    let mut completed = already.clone();

    loop {
        let mut ready: Vec<(PhaseIndex, String)> = graph
            .phases()
            .iter()
            .enumerate()
            .filter(|(i, _)| !completed.contains(i))
            .filter(|(i, _)| graph.dependencies_satisfied(*i, &completed))
            .map(|(i, phase)| (i, phase.id.clone()))
            .collect();

        if ready.is_empty() {
            break;
        }

        ready.sort_by(|a, b| a.1.cmp(&b.1));
        completed.extend(ready.iter().map(|(i, _)| *i));
        waves.push(ready.into_iter().map(|(_, id)| id).collect());
    }

    waves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::DagBuilder;
    use crate::phase::PhaseDef;

    fn defs() -> Vec<PhaseDef> {
        vec![
            PhaseDef::new("a", "A", vec![]),
            PhaseDef::new("c", "C", vec!["a".into()]),
            PhaseDef::new("b", "B", vec!["a".into()]),
            PhaseDef::new("d", "D", vec!["b".into(), "c".into()]),
            PhaseDef::new("e", "E", vec![]),
        ]
    }

    fn pass(project: &mut Project, id: &str) {
        let t = project.tick();
        let rec = project.phase_mut(id).unwrap();
        rec.state = PhaseState::Passed;
        rec.passed_at = Some(t);
    }

    #[test]
    fn test_roots_are_ready_at_zero_sorted_by_id() {
        let project = Project::new("t", defs());
        let ready = readiness(&project);
        assert_eq!(
            ready,
            vec![
                ReadyPhase { id: "a".into(), ready_at: 0 },
                ReadyPhase { id: "e".into(), ready_at: 0 },
            ]
        );
    }

    #[test]
    fn test_ready_ordering_uses_last_prerequisite_time() {
        let mut project = Project::new("t", defs());
        pass(&mut project, "a");
        pass(&mut project, "e");
        let ready = readiness(&project);
        let ids: Vec<&str> = ready.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert!(ready.iter().all(|r| r.ready_at == 1));

        pass(&mut project, "c");
        pass(&mut project, "b");
        let ready = readiness(&project);
        assert_eq!(ready, vec![ReadyPhase { id: "d".into(), ready_at: 4 }]);
    }

    #[test]
    fn test_readiness_is_stable_on_unchanged_state() {
        let mut project = Project::new("t", defs());
        pass(&mut project, "a");
        assert_eq!(readiness(&project), readiness(&project));
    }

    #[test]
    fn test_non_pending_phases_are_not_ready() {
        let mut project = Project::new("t", defs());
        project.phase_mut("a").unwrap().state = PhaseState::Ready;
        let ids: Vec<String> = readiness(&project).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["e".to_string()]);
    }

    #[test]
    fn test_candidates_order() {
        let mut project = Project::new("t", defs());
        for (id, state, at) in [
            ("a", PhaseState::ReviseRequired, 5),
            ("e", PhaseState::Ready, 0),
            ("b", PhaseState::InProgress, 5),
            ("c", PhaseState::UnderReview, 1),
        ] {
            let rec = project.phase_mut(id).unwrap();
            rec.state = state;
            rec.schedulable_at = at;
        }
        let ids: Vec<&str> = candidates(&project).iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["e", "a", "b"]);
    }

    #[test]
    fn test_wave_computation() {
        let graph = DagBuilder::new(defs()).build().unwrap();
        let waves = compute_waves(&graph);
        assert_eq!(waves.len(), 3);
        assert_eq!(waves[0], vec!["a", "e"]);
        assert_eq!(waves[1], vec!["b", "c"]);
        assert_eq!(waves[2], vec!["d"]);
    }

    #[test]
    fn test_remaining_waves_skip_passed() {
        let graph = DagBuilder::new(defs()).build().unwrap();
        let mut project = Project::new("t", defs());
        pass(&mut project, "a");
        let waves = remaining_waves(&graph, &project);
        assert_eq!(waves[0], vec!["b", "c", "e"]);
        assert_eq!(waves[1], vec!["d"]);
    }
}
