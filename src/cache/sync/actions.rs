use std::collections::HashMap;
use std::sync::Arc;

use super::KindStats;
use crate::cache::model::Action;
use crate::cache::model::Condition;
use crate::cache::model::Expression;
use crate::cache::rows::ActionRow;
use crate::cache::rows::ConditionRow;
use crate::cache::rows::ExpressionRow;
use crate::cache::state::absent_ids;
use crate::cache::state::find_or_insert;
use crate::cache::state::CacheState;
use crate::cache::strpool::PooledStr;

/// Conditions of AND/OR actions are evaluated grouped by condition type.
const ACTION_EVAL_TYPE_AND_OR: u8 = 0;

impl CacheState {
    pub(super) fn sync_expressions(
        &mut self,
        rows: &[ExpressionRow],
    ) -> KindStats {
        let mut stats = KindStats::default();
        let mut seen = Vec::with_capacity(rows.len());

        for row in rows {
            seen.push(row.expressionid);
            let (expression, found) = find_or_insert(&mut self.expressions, row.expressionid, || Expression {
                expressionid: row.expressionid,
                regexp: PooledStr::default(),
                expression: PooledStr::default(),
                expression_type: 0,
                delimiter: ',',
                case_sensitive: false,
            });
            stats.record(found);

            self.pool.replace(found, &mut expression.regexp, &row.name);
            self.pool.replace(found, &mut expression.expression, &row.expression);
            expression.expression_type = row.expression_type;
            expression.delimiter = row.exp_delimiter.chars().next().unwrap_or(',');
            expression.case_sensitive = row.case_sensitive != 0;
        }

        for id in absent_ids(&self.expressions, seen) {
            if let Some(mut expression) = self.expressions.remove(&id) {
                self.pool.clear(&mut expression.regexp);
                self.pool.clear(&mut expression.expression);
            }
            stats.removed += 1;
        }

        let mut index: HashMap<Arc<str>, Vec<u64>> = HashMap::new();
        for expression in self.expressions.values() {
            index
                .entry(expression.regexp.share())
                .or_default()
                .push(expression.expressionid);
        }
        for ids in index.values_mut() {
            ids.sort_unstable();
        }
        self.regexps = index;

        stats
    }

    pub(super) fn sync_actions(
        &mut self,
        rows: &[ActionRow],
    ) -> KindStats {
        let mut stats = KindStats::default();
        let mut seen = Vec::with_capacity(rows.len());

        for row in rows {
            seen.push(row.actionid);
            let (action, found) = find_or_insert(&mut self.actions, row.actionid, || Action {
                actionid: row.actionid,
                name: PooledStr::default(),
                eventsource: 0,
                evaltype: 0,
                formula: PooledStr::default(),
                conditions: Vec::new(),
            });
            stats.record(found);

            self.pool.replace(found, &mut action.name, &row.name);
            self.pool.replace(found, &mut action.formula, &row.formula);
            action.eventsource = row.eventsource;
            action.evaltype = row.evaltype;
        }

        for id in absent_ids(&self.actions, seen) {
            if let Some(mut action) = self.actions.remove(&id) {
                self.pool.clear(&mut action.name);
                self.pool.clear(&mut action.formula);
            }
            stats.removed += 1;
        }

        stats
    }

    pub(super) fn sync_conditions(
        &mut self,
        rows: &[ConditionRow],
    ) -> KindStats {
        let mut stats = KindStats::default();
        let mut seen = Vec::with_capacity(rows.len());

        for row in rows {
            if !self.actions.contains_key(&row.actionid) {
                stats.skipped += 1;
                continue;
            }
            seen.push(row.conditionid);
            let (condition, found) = find_or_insert(&mut self.conditions, row.conditionid, || Condition {
                conditionid: row.conditionid,
                actionid: row.actionid,
                conditiontype: 0,
                operator: 0,
                value: PooledStr::default(),
                value2: PooledStr::default(),
            });
            stats.record(found);

            condition.actionid = row.actionid;
            condition.conditiontype = row.conditiontype;
            condition.operator = row.operator;
            self.pool.replace(found, &mut condition.value, &row.value);
            self.pool.replace(found, &mut condition.value2, &row.value2);
        }

        for id in absent_ids(&self.conditions, seen) {
            if let Some(mut condition) = self.conditions.remove(&id) {
                self.pool.clear(&mut condition.value);
                self.pool.clear(&mut condition.value2);
            }
            stats.removed += 1;
        }

        self.order_action_conditions();
        stats
    }

    fn order_action_conditions(&mut self) {
        let mut by_action: HashMap<u64, Vec<(u8, u64)>> = HashMap::new();
        for condition in self.conditions.values() {
            by_action
                .entry(condition.actionid)
                .or_default()
                .push((condition.conditiontype, condition.conditionid));
        }

        for action in self.actions.values_mut() {
            let mut conditions = by_action.remove(&action.actionid).unwrap_or_default();
            if action.evaltype == ACTION_EVAL_TYPE_AND_OR {
                conditions.sort_unstable();
            } else {
                conditions.sort_unstable_by_key(|(_, conditionid)| *conditionid);
            }
            action.conditions = conditions.into_iter().map(|(_, conditionid)| conditionid).collect();
        }
    }
}
