//! Set-difference synchronization of fetched rows into the cache tables.
//!
//! Every entity kind follows the same pattern: collect the ids seen in the row stream,
//! `find_or_insert` each one, keep its secondary indices in step with the key columns,
//! copy the scalar and pooled fields, then drop every live record whose id was not seen.
//! Streams are applied in dependency order because later kinds reference earlier ones.

mod actions;
mod hosts;
mod interfaces;
mod items;
mod macros;
mod triggers;

use std::time::Duration;
use std::time::Instant;

use tracing::debug;

use super::rows::ConfigRow;
use super::rows::ConfigRows;
use super::state::CacheState;

/// Row counts applied for one entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindStats {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
    /// Rows dropped because they failed to decode or referenced a missing parent
    pub skipped: usize,
}

impl KindStats {
    pub(crate) fn record(
        &mut self,
        found: bool,
    ) {
        if found {
            self.updated += 1;
        } else {
            self.inserted += 1;
        }
    }
}

/// Outcome of one sync pass.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    pub kinds: Vec<(&'static str, KindStats)>,
    pub revision: u64,
    pub duration: Duration,
}

impl SyncStats {
    pub fn get(
        &self,
        kind: &str,
    ) -> Option<KindStats> {
        self.kinds.iter().find(|(k, _)| *k == kind).map(|(_, s)| *s)
    }

    pub fn total_changes(&self) -> usize {
        self.kinds.iter().map(|(_, s)| s.inserted + s.removed).sum()
    }
}

impl CacheState {
    /// Applies one complete fetch. The caller holds the cache lock for the whole pass.
    pub fn sync(
        &mut self,
        rows: &ConfigRows,
        now: i64,
    ) -> SyncStats {
        let started = Instant::now();
        let mut stats = SyncStats::default();

        if let Some(config) = &rows.config {
            self.sync_config(config);
        }

        stats.kinds.push(("hosts", self.sync_hosts(&rows.hosts, now)));
        stats.kinds.push(("host_inventory", self.sync_host_inventory(&rows.host_inventory)));
        stats.kinds.push(("host_templates", self.sync_host_templates(&rows.host_templates)));
        stats.kinds.push(("global_macros", self.sync_global_macros(&rows.global_macros)));
        stats.kinds.push(("host_macros", self.sync_host_macros(&rows.host_macros)));
        stats.kinds.push(("interfaces", self.sync_interfaces(&rows.interfaces)));
        stats.kinds.push(("items", self.sync_items(&rows.items, now)));
        stats.kinds.push(("item_preproc", self.sync_item_preproc(&rows.item_preproc)));
        stats.kinds.push(("triggers", self.sync_triggers(&rows.triggers)));
        stats.kinds.push(("trigger_deps", self.sync_trigger_deps(&rows.trigger_deps)));
        stats.kinds.push(("functions", self.sync_functions(&rows.functions)));
        stats.kinds.push(("expressions", self.sync_expressions(&rows.expressions)));
        stats.kinds.push(("actions", self.sync_actions(&rows.actions)));
        stats.kinds.push(("conditions", self.sync_conditions(&rows.conditions)));

        self.update_trigger_functional();
        self.update_trigger_topology();

        self.revision += 1;
        self.last_sync = now;
        stats.revision = self.revision;
        stats.duration = started.elapsed();

        debug!(
            "sync pass {} applied in {:?}: {} inserted/removed records, {} pooled strings",
            self.revision,
            stats.duration,
            stats.total_changes(),
            self.pool.len()
        );
        stats
    }

    fn sync_config(
        &mut self,
        row: &ConfigRow,
    ) {
        self.config.refresh_unsupported = row.refresh_unsupported;
        self.config.default_inventory_mode = row.default_inventory_mode;
    }
}
