use std::collections::HashMap;

use tracing::warn;

use super::KindStats;
use crate::cache::model::Function;
use crate::cache::model::Trigger;
use crate::cache::model::TriggerDep;
use crate::cache::rows::FunctionRow;
use crate::cache::rows::TriggerDepRow;
use crate::cache::rows::TriggerRow;
use crate::cache::state::absent_ids;
use crate::cache::state::find_or_insert;
use crate::cache::state::CacheState;
use crate::cache::strpool::PooledStr;
use crate::constants::HostStatus;
use crate::constants::ItemStatus;
use crate::constants::TriggerState;
use crate::constants::TriggerStatus;
use crate::constants::TriggerValue;
use crate::constants::TIMER_FUNCTIONS;

impl CacheState {
    pub(super) fn sync_triggers(
        &mut self,
        rows: &[TriggerRow],
    ) -> KindStats {
        let mut stats = KindStats::default();
        let mut seen = Vec::with_capacity(rows.len());

        for row in rows {
            let (Ok(value), Ok(state), Ok(status)) = (
                TriggerValue::try_from(row.value),
                TriggerState::try_from(row.state),
                TriggerStatus::try_from(row.status),
            ) else {
                warn!("trigger {} has unknown value, state or status, skipped", row.triggerid);
                stats.skipped += 1;
                continue;
            };

            seen.push(row.triggerid);
            let (trigger, found) = find_or_insert(&mut self.triggers, row.triggerid, || Trigger::new(row.triggerid));
            stats.record(found);

            self.pool.replace(found, &mut trigger.description, &row.description);
            self.pool.replace(found, &mut trigger.expression, &row.expression);
            self.pool.replace(found, &mut trigger.recovery_expression, &row.recovery_expression);
            trigger.priority = row.priority;
            trigger.trigger_type = row.trigger_type;
            trigger.status = status;

            // value and state belong to the history syncers once cached
            if !found {
                trigger.value = value;
                trigger.state = state;
                trigger.lastchange = row.lastchange;
                self.pool.replace(false, &mut trigger.error, &row.error);
            }

            // macros may have changed in this same pass
            trigger.clear_expression_ex(&mut self.pool);
        }

        for triggerid in absent_ids(&self.triggers, seen) {
            if let Some(mut trigger) = self.triggers.remove(&triggerid) {
                trigger.release_strings(&mut self.pool);
            }
            stats.removed += 1;
        }

        stats
    }

    pub(super) fn sync_trigger_deps(
        &mut self,
        rows: &[TriggerDepRow],
    ) -> KindStats {
        let mut stats = KindStats::default();
        let mut seen = Vec::with_capacity(rows.len());

        for row in rows {
            if !self.triggers.contains_key(&row.triggerid_down) || !self.triggers.contains_key(&row.triggerid_up) {
                stats.skipped += 1;
                continue;
            }
            seen.push(row.triggerdepid);
            let (dep, found) = find_or_insert(&mut self.trigdeps, row.triggerdepid, || TriggerDep {
                triggerdepid: row.triggerdepid,
                triggerid_down: row.triggerid_down,
                triggerid_up: row.triggerid_up,
            });
            stats.record(found);
            dep.triggerid_down = row.triggerid_down;
            dep.triggerid_up = row.triggerid_up;
        }

        for id in absent_ids(&self.trigdeps, seen) {
            self.trigdeps.remove(&id);
            stats.removed += 1;
        }

        let mut adjacency: HashMap<u64, Vec<u64>> = HashMap::new();
        for dep in self.trigdeps.values() {
            adjacency.entry(dep.triggerid_down).or_default().push(dep.triggerid_up);
        }
        for ups in adjacency.values_mut() {
            ups.sort_unstable();
            ups.dedup();
        }
        self.trigger_deps = adjacency;

        stats
    }

    /// Syncs functions, then rebuilds item -> trigger links and the timer buckets.
    pub(super) fn sync_functions(
        &mut self,
        rows: &[FunctionRow],
    ) -> KindStats {
        let mut stats = KindStats::default();
        let mut seen = Vec::with_capacity(rows.len());

        for row in rows {
            if !self.items.contains_key(&row.itemid) || !self.triggers.contains_key(&row.triggerid) {
                stats.skipped += 1;
                continue;
            }

            seen.push(row.functionid);
            let (function, found) = find_or_insert(&mut self.functions, row.functionid, || Function {
                functionid: row.functionid,
                itemid: row.itemid,
                triggerid: row.triggerid,
                function: PooledStr::default(),
                parameter: PooledStr::default(),
                timer: false,
            });
            stats.record(found);

            function.itemid = row.itemid;
            function.triggerid = row.triggerid;
            if self.pool.replace(found, &mut function.function, &row.function) {
                function.timer = TIMER_FUNCTIONS.contains(&row.function.as_str());
            }
            self.pool.replace(found, &mut function.parameter, &row.parameter);
        }

        for id in absent_ids(&self.functions, seen) {
            if let Some(mut function) = self.functions.remove(&id) {
                self.pool.clear(&mut function.function);
                self.pool.clear(&mut function.parameter);
            }
            stats.removed += 1;
        }

        self.link_items_to_triggers();
        stats
    }

    fn link_items_to_triggers(&mut self) {
        for item in self.items.values_mut() {
            item.triggers.clear();
        }
        for trigger in self.triggers.values_mut() {
            trigger.timer = false;
        }

        let forks = self.timer_triggers.len().max(1);
        let mut buckets: Vec<Vec<u64>> = vec![Vec::new(); forks];
        let mut trigger_functions: HashMap<u64, Vec<u64>> = HashMap::new();

        for function in self.functions.values() {
            trigger_functions
                .entry(function.triggerid)
                .or_default()
                .push(function.functionid);
            if let Some(item) = self.items.get_mut(&function.itemid) {
                item.triggers.push(function.triggerid);
            }
            if function.timer {
                if let Some(trigger) = self.triggers.get_mut(&function.triggerid) {
                    trigger.timer = true;
                }
                buckets[(function.triggerid % forks as u64) as usize].push(function.triggerid);
            }
        }

        for item in self.items.values_mut() {
            item.triggers.sort_unstable();
            item.triggers.dedup();
        }
        for bucket in buckets.iter_mut() {
            bucket.sort_unstable();
            bucket.dedup();
        }
        for functionids in trigger_functions.values_mut() {
            functionids.sort_unstable();
        }
        self.timer_triggers = buckets;
        self.trigger_functions = trigger_functions;
    }

    /// A trigger stops being functional as soon as one of its items is disabled or
    /// belongs to a host that is not monitored.
    pub(super) fn update_trigger_functional(&mut self) {
        for trigger in self.triggers.values_mut() {
            trigger.functional = true;
        }

        for item in self.items.values() {
            let host_monitored = self
                .hosts
                .get(&item.hostid)
                .is_some_and(|host| host.status == HostStatus::Monitored);
            if item.status == ItemStatus::Active && host_monitored {
                continue;
            }
            for triggerid in &item.triggers {
                if let Some(trigger) = self.triggers.get_mut(triggerid) {
                    trigger.functional = false;
                }
            }
        }
    }
}
