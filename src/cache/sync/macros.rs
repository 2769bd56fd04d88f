use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use super::KindStats;
use crate::cache::model::GlobalMacro;
use crate::cache::model::HostMacro;
use crate::cache::rows::GlobalMacroRow;
use crate::cache::rows::HostMacroRow;
use crate::cache::state::absent_ids;
use crate::cache::state::find_or_insert;
use crate::cache::state::CacheState;
use crate::cache::strpool::PooledStr;
use crate::cache::strpool::StringPool;
use crate::utils::usermacro::parse_user_macro;

fn replace_context(
    pool: &mut StringPool,
    slot: &mut Option<PooledStr>,
    context: Option<&str>,
) {
    if let (Some(current), Some(new)) = (slot.as_mut(), context) {
        pool.replace(true, current, new);
        return;
    }
    if let Some(old) = slot.take() {
        pool.release(old);
    }
    *slot = context.map(|s| pool.intern(s));
}

impl CacheState {
    pub(super) fn sync_global_macros(
        &mut self,
        rows: &[GlobalMacroRow],
    ) -> KindStats {
        let mut stats = KindStats::default();
        let mut seen = Vec::with_capacity(rows.len());

        for row in rows {
            let Some(user_macro) = parse_user_macro(&row.macro_name) else {
                warn!("cannot parse global macro \"{}\"", row.macro_name);
                stats.skipped += 1;
                continue;
            };

            seen.push(row.globalmacroid);
            let (gmacro, found) = find_or_insert(&mut self.gmacros, row.globalmacroid, || GlobalMacro {
                globalmacroid: row.globalmacroid,
                name: PooledStr::default(),
                context: None,
                value: PooledStr::default(),
            });
            stats.record(found);

            self.pool.replace(found, &mut gmacro.name, &user_macro.name);
            replace_context(&mut self.pool, &mut gmacro.context, user_macro.context.as_deref());
            self.pool.replace(found, &mut gmacro.value, &row.value);
        }

        for id in absent_ids(&self.gmacros, seen) {
            if let Some(mut gmacro) = self.gmacros.remove(&id) {
                self.pool.clear(&mut gmacro.name);
                replace_context(&mut self.pool, &mut gmacro.context, None);
                self.pool.clear(&mut gmacro.value);
            }
            stats.removed += 1;
        }

        let mut index: HashMap<Arc<str>, Vec<u64>> = HashMap::new();
        for gmacro in self.gmacros.values() {
            index.entry(gmacro.name.share()).or_default().push(gmacro.globalmacroid);
        }
        for ids in index.values_mut() {
            ids.sort_unstable();
        }
        self.gmacros_by_name = index;

        stats
    }

    /// Host macros may belong to templates, which are not cached as hosts, so no parent
    /// check is made here.
    pub(super) fn sync_host_macros(
        &mut self,
        rows: &[HostMacroRow],
    ) -> KindStats {
        let mut stats = KindStats::default();
        let mut seen = Vec::with_capacity(rows.len());

        for row in rows {
            let Some(user_macro) = parse_user_macro(&row.macro_name) else {
                warn!("cannot parse host {} macro \"{}\"", row.hostid, row.macro_name);
                stats.skipped += 1;
                continue;
            };

            seen.push(row.hostmacroid);
            let (hmacro, found) = find_or_insert(&mut self.hmacros, row.hostmacroid, || HostMacro {
                hostmacroid: row.hostmacroid,
                hostid: row.hostid,
                name: PooledStr::default(),
                context: None,
                value: PooledStr::default(),
            });
            stats.record(found);

            hmacro.hostid = row.hostid;
            self.pool.replace(found, &mut hmacro.name, &user_macro.name);
            replace_context(&mut self.pool, &mut hmacro.context, user_macro.context.as_deref());
            self.pool.replace(found, &mut hmacro.value, &row.value);
        }

        for id in absent_ids(&self.hmacros, seen) {
            if let Some(mut hmacro) = self.hmacros.remove(&id) {
                self.pool.clear(&mut hmacro.name);
                replace_context(&mut self.pool, &mut hmacro.context, None);
                self.pool.clear(&mut hmacro.value);
            }
            stats.removed += 1;
        }

        let mut index: HashMap<(u64, Arc<str>), Vec<u64>> = HashMap::new();
        for hmacro in self.hmacros.values() {
            index
                .entry((hmacro.hostid, hmacro.name.share()))
                .or_default()
                .push(hmacro.hostmacroid);
        }
        for ids in index.values_mut() {
            ids.sort_unstable();
        }
        self.hmacros_by_host = index;

        stats
    }
}
