//! Trigger-side operations: history-processing locks, timer batches, value updates and
//! user macro expansion.

use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::Arc;

use super::snapshot::TriggerSnapshot;
use super::state::CacheState;
use crate::constants::TriggerState;
use crate::constants::TriggerStatus;
use crate::constants::TriggerValue;
use crate::utils::usermacro::expand_user_macros;

/// Outcome of [`CacheState::lock_triggers_for_history`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerLock {
    /// Triggers now owned by the caller, sorted
    pub triggerids: Vec<u64>,
    /// Items skipped because one of their triggers is held by another worker
    pub busy_itemids: Vec<u64>,
}

impl CacheState {
    /// Locks the triggers of each item, all or nothing per item.
    pub fn lock_triggers_for_history(
        &mut self,
        itemids: &[u64],
    ) -> TriggerLock {
        let mut lock = TriggerLock::default();

        for itemid in itemids {
            let Some(item) = self.items.get(itemid) else {
                continue;
            };
            let triggerids: Vec<u64> = item
                .triggers
                .iter()
                .filter(|id| self.triggers.contains_key(id))
                .copied()
                .collect();
            if triggerids.is_empty() {
                continue;
            }

            let busy = triggerids
                .iter()
                .any(|id| self.triggers.get(id).is_some_and(|trigger| trigger.locked));
            if busy {
                lock.busy_itemids.push(*itemid);
                continue;
            }

            for id in triggerids {
                if let Some(trigger) = self.triggers.get_mut(&id) {
                    trigger.locked = true;
                    lock.triggerids.push(id);
                }
            }
        }

        lock.triggerids.sort_unstable();
        lock.triggerids.dedup();
        lock
    }

    pub fn unlock_triggers(
        &mut self,
        triggerids: &[u64],
    ) {
        for id in triggerids {
            if let Some(trigger) = self.triggers.get_mut(id) {
                trigger.locked = false;
            }
        }
    }

    pub fn unlock_all_triggers(&mut self) {
        for trigger in self.triggers.values_mut() {
            trigger.locked = false;
        }
        for cursor in self.timer_cursors.iter_mut() {
            cursor.locked.clear();
        }
    }

    /// Next page of one timer worker's time-based triggers.
    ///
    /// Triggers returned by the previous call are unlocked first. An empty page means the
    /// bucket was walked to its end; the following call starts over.
    pub fn get_time_based_triggers(
        &mut self,
        timer_index: usize,
        max_triggers: usize,
    ) -> Vec<TriggerSnapshot> {
        let Some(cursor) = self.timer_cursors.get_mut(timer_index) else {
            return Vec::new();
        };
        let previous = std::mem::take(&mut cursor.locked);
        let mut position = cursor.position;
        for id in previous {
            if let Some(trigger) = self.triggers.get_mut(&id) {
                trigger.locked = false;
            }
        }

        let mut locked = Vec::new();
        if let Some(bucket) = self.timer_triggers.get(timer_index) {
            while position < bucket.len() && locked.len() < max_triggers {
                let id = bucket[position];
                position += 1;
                let Some(trigger) = self.triggers.get_mut(&id) else {
                    continue;
                };
                if trigger.status != TriggerStatus::Enabled || !trigger.functional || trigger.locked {
                    continue;
                }
                trigger.locked = true;
                locked.push(id);
            }
        }

        if locked.is_empty() {
            position = 0;
        }
        if let Some(cursor) = self.timer_cursors.get_mut(timer_index) {
            cursor.position = position;
            cursor.locked = locked.clone();
        }

        locked.into_iter().filter_map(|id| self.trigger_snapshot(id)).collect()
    }

    /// Stores an evaluation result. Returns false for unknown triggers.
    pub fn set_trigger_value(
        &mut self,
        triggerid: u64,
        value: TriggerValue,
        state: TriggerState,
        error: &str,
        now: i64,
    ) -> bool {
        let Some(trigger) = self.triggers.get_mut(&triggerid) else {
            return false;
        };
        if trigger.value != value {
            trigger.lastchange = now;
        }
        trigger.value = value;
        trigger.state = state;
        self.pool.replace(true, &mut trigger.error, error);
        true
    }

    /// Triggers using any of the items, in dependency order (lower topoindex first).
    pub fn get_triggers_by_itemids(
        &mut self,
        itemids: &[u64],
    ) -> Vec<TriggerSnapshot> {
        let mut triggerids: Vec<u64> = itemids
            .iter()
            .filter_map(|id| self.items.get(id))
            .flat_map(|item| item.triggers.iter().copied())
            .filter(|id| self.triggers.contains_key(id))
            .collect();
        triggerids.sort_unstable();
        triggerids.dedup();
        triggerids.sort_by_key(|id| (self.triggers.get(id).map_or(0, |trigger| trigger.topoindex), *id));

        triggerids.into_iter().filter_map(|id| self.trigger_snapshot(id)).collect()
    }

    pub fn get_trigger(
        &mut self,
        triggerid: u64,
    ) -> Option<TriggerSnapshot> {
        self.trigger_snapshot(triggerid)
    }

    fn trigger_snapshot(
        &mut self,
        triggerid: u64,
    ) -> Option<TriggerSnapshot> {
        let expression_ex = self.get_trigger_expression_ex(triggerid)?;
        let trigger = self.triggers.get(&triggerid)?;
        Some(TriggerSnapshot::new(trigger, expression_ex))
    }

    /// Trigger expression with user macros expanded, cached until the next sync pass.
    pub fn get_trigger_expression_ex(
        &mut self,
        triggerid: u64,
    ) -> Option<String> {
        let trigger = self.triggers.get(&triggerid)?;
        if let Some(expression_ex) = &trigger.expression_ex {
            return Some(expression_ex.to_string());
        }

        let expression = trigger.expression.to_string();
        let hostids = self.trigger_hostids(triggerid);
        let expanded = expand_user_macros(&expression, |user_macro| {
            self.resolve_user_macro(&hostids, &user_macro.name, user_macro.context.as_deref())
        });

        let pooled = self.pool.intern(&expanded);
        match self.triggers.get_mut(&triggerid) {
            Some(trigger) => trigger.expression_ex = Some(pooled),
            None => self.pool.release(pooled),
        }
        Some(expanded)
    }

    /// Hosts of the items a trigger's functions read, sorted.
    fn trigger_hostids(
        &self,
        triggerid: u64,
    ) -> Vec<u64> {
        let mut hostids: Vec<u64> = self
            .trigger_functions
            .get(&triggerid)
            .into_iter()
            .flatten()
            .filter_map(|functionid| self.functions.get(functionid))
            .filter_map(|function| self.items.get(&function.itemid))
            .map(|item| item.hostid)
            .collect();
        hostids.sort_unstable();
        hostids.dedup();
        hostids
    }

    /// Value of `{$NAME}` / `{$NAME:context}` as seen from the given hosts.
    ///
    /// Lookup order: host macro with matching context, global macro with matching context,
    /// host macro without context, global macro without context. Hosts are searched before
    /// their linked templates, breadth first.
    pub fn resolve_user_macro(
        &self,
        hostids: &[u64],
        name: &str,
        context: Option<&str>,
    ) -> Option<String> {
        let name_key: Arc<str> = Arc::from(name);
        let mut host_default: Option<String> = None;
        let mut visited: HashSet<u64> = HashSet::new();
        let mut pending: VecDeque<u64> = hostids.iter().copied().collect();

        while let Some(hostid) = pending.pop_front() {
            if !visited.insert(hostid) {
                continue;
            }
            if let Some(ids) = self.hmacros_by_host.get(&(hostid, name_key.clone())) {
                for hmacro in ids.iter().filter_map(|id| self.hmacros.get(id)) {
                    match (&hmacro.context, context) {
                        (Some(macro_context), Some(context)) if macro_context.as_str() == context => {
                            return Some(hmacro.value.to_string());
                        }
                        (None, _) if host_default.is_none() => {
                            host_default = Some(hmacro.value.to_string());
                        }
                        _ => {}
                    }
                }
            }
            if let Some(templates) = self.host_templates.get(&hostid) {
                pending.extend(templates.iter().copied());
            }
        }

        let mut global_default: Option<String> = None;
        if let Some(ids) = self.gmacros_by_name.get(name) {
            for gmacro in ids.iter().filter_map(|id| self.gmacros.get(id)) {
                match (&gmacro.context, context) {
                    (Some(macro_context), Some(context)) if macro_context.as_str() == context => {
                        return Some(gmacro.value.to_string());
                    }
                    (None, _) if global_default.is_none() => {
                        global_default = Some(gmacro.value.to_string());
                    }
                    _ => {}
                }
            }
        }

        host_default.or(global_default)
    }
}
