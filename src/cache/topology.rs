//! Trigger dependency graph: topological ranks and blocking-dependency queries.
//!
//! Ranks satisfy `rank(trigger) > rank(dependency)` for every acyclic edge. Triggers without
//! dependencies rank 1. Cycles and chains deeper than [`TRIGGER_DEPENDENCY_LEVELS_MAX`]
//! are logged and cut rather than followed.

use std::collections::HashMap;

use tracing::warn;

use super::state::CacheState;
use crate::constants::TRIGGER_DEPENDENCY_LEVELS_MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Ranked(u32),
}

struct RankWalk<'a> {
    deps: &'a HashMap<u64, Vec<u64>>,
    marks: HashMap<u64, Mark>,
}

impl RankWalk<'_> {
    /// Returns `None` when the edge leading here closes a cycle.
    fn visit(
        &mut self,
        triggerid: u64,
        level: usize,
    ) -> Option<u32> {
        match self.marks.get(&triggerid).copied() {
            None => return None,
            Some(Mark::Ranked(rank)) => return Some(rank),
            Some(Mark::InProgress) => {
                warn!("trigger {} is part of a dependency cycle", triggerid);
                return None;
            }
            Some(Mark::Unvisited) => {}
        }

        if level >= TRIGGER_DEPENDENCY_LEVELS_MAX {
            warn!("trigger {} dependency chain is too deep", triggerid);
            return Some(1);
        }

        self.marks.insert(triggerid, Mark::InProgress);
        let mut rank = 1;
        if let Some(ups) = self.deps.get(&triggerid) {
            for &up in ups {
                if let Some(up_rank) = self.visit(up, level + 1) {
                    rank = rank.max(up_rank + 1);
                }
            }
        }
        self.marks.insert(triggerid, Mark::Ranked(rank));
        Some(rank)
    }
}

impl CacheState {
    /// Recomputes `topoindex` of every trigger.
    pub(crate) fn update_trigger_topology(&mut self) {
        let mut walk = RankWalk {
            deps: &self.trigger_deps,
            marks: self.triggers.keys().map(|id| (*id, Mark::Unvisited)).collect(),
        };

        let mut ids: Vec<u64> = self.triggers.keys().copied().collect();
        ids.sort_unstable();
        for triggerid in ids {
            walk.visit(triggerid, 0);
        }

        let marks = walk.marks;
        for (triggerid, trigger) in self.triggers.iter_mut() {
            trigger.topoindex = match marks.get(triggerid) {
                Some(Mark::Ranked(rank)) => *rank,
                _ => 1,
            };
        }
    }

    /// Whether evaluation of `triggerid` is suppressed by a dependency in problem state.
    pub fn has_blocking_dependency(
        &self,
        triggerid: u64,
    ) -> bool {
        self.blocking_dependency(triggerid, triggerid, 0)
    }

    fn blocking_dependency(
        &self,
        origin: u64,
        triggerid: u64,
        level: usize,
    ) -> bool {
        if level >= TRIGGER_DEPENDENCY_LEVELS_MAX {
            warn!("trigger {} dependency chain is too deep", origin);
            return false;
        }
        let Some(ups) = self.trigger_deps.get(&triggerid) else {
            return false;
        };

        for &up in ups {
            if up == origin {
                continue;
            }
            let Some(trigger) = self.triggers.get(&up) else {
                continue;
            };
            if trigger.is_blocking() || self.blocking_dependency(origin, up, level + 1) {
                return true;
            }
        }
        false
    }
}
