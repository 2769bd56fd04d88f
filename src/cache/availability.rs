//! Per-agent-class host availability state machine.
//!
//! A failed check starts an error streak and a retry deadline (`disable_until`). Further
//! failures inside `unreachable_delay` are ignored, failures up to `unreachable_period`
//! push the deadline, and beyond that the class is declared unavailable with the long
//! `unavailable_delay` backoff. One success clears the streak.

use tracing::debug;
use tracing::warn;

use super::model::AgentAvailability;
use super::model::UsedInterfaces;
use super::state::CacheState;
use crate::constants::AgentClass;
use crate::constants::Availability;
use crate::constants::HostStatus;

/// Availability of one agent class after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityDiff {
    pub hostid: u64,
    pub class: AgentClass,
    pub available: Availability,
    pub errors_from: i64,
    pub disable_until: i64,
    pub error: String,
}

impl AvailabilityDiff {
    fn capture(
        hostid: u64,
        class: AgentClass,
        agent: &AgentAvailability,
    ) -> Self {
        Self {
            hostid,
            class,
            available: agent.available,
            errors_from: agent.errors_from,
            disable_until: agent.disable_until,
            error: agent.error.to_string(),
        }
    }
}

impl CacheState {
    /// Marks a class reachable after a successful check.
    pub fn activate_host(
        &mut self,
        hostid: u64,
        class: AgentClass,
        now: i64,
    ) -> Option<AvailabilityDiff> {
        let host = self.hosts.get_mut(&hostid)?;
        let agent = host.agent_mut(class);
        if agent.errors_from == 0 && agent.available == Availability::Available {
            return None;
        }

        agent.errors_from = 0;
        agent.disable_until = 0;
        agent.available = Availability::Available;
        self.pool.replace(true, &mut agent.error, "");
        host.availability_ts = now;

        debug!("host {} {:?} interface is available again", hostid, class);
        Some(AvailabilityDiff::capture(hostid, class, host.agent(class)))
    }

    /// Records a failed check against a class.
    pub fn deactivate_host(
        &mut self,
        hostid: u64,
        class: AgentClass,
        now: i64,
        error: &str,
    ) -> Option<AvailabilityDiff> {
        let unreachable_delay = self.cache_config.unreachable_delay;
        let unreachable_period = self.cache_config.unreachable_period;
        let unavailable_delay = self.cache_config.unavailable_delay;

        let host = self.hosts.get_mut(&hostid)?;
        let agent = host.agent_mut(class);

        if agent.errors_from == 0 {
            agent.errors_from = now;
            agent.disable_until = now + unreachable_delay;
        } else if now - agent.errors_from < unreachable_delay {
            // another poller saw the first error and is already retrying
            return None;
        } else if now - agent.errors_from <= unreachable_period {
            agent.disable_until = now + unreachable_delay;
        } else {
            if agent.available != Availability::Unavailable {
                warn!("host {} {:?} interface is unavailable: {}", hostid, class, error);
            }
            agent.disable_until = now + unavailable_delay;
            agent.available = Availability::Unavailable;
            self.pool.replace(true, &mut agent.error, error);
            host.availability_ts = now;
        }

        Some(AvailabilityDiff::capture(hostid, class, host.agent(class)))
    }

    /// Applies availability computed elsewhere (e.g. reported by a proxy). Returns the
    /// number of diffs applied.
    pub fn set_hosts_availability(
        &mut self,
        diffs: &[AvailabilityDiff],
        now: i64,
    ) -> usize {
        let mut applied = 0;
        for diff in diffs {
            let Some(host) = self.hosts.get_mut(&diff.hostid) else {
                continue;
            };
            let agent = host.agent_mut(diff.class);
            agent.available = diff.available;
            agent.errors_from = diff.errors_from;
            agent.disable_until = diff.disable_until;
            self.pool.replace(true, &mut agent.error, &diff.error);
            host.availability_ts = now;
            applied += 1;
        }
        applied
    }

    /// Resets classes that no active item uses any more back to unknown. Hosts whose
    /// used interfaces are not known yet are left alone.
    pub fn reset_hosts_availability(
        &mut self,
        now: i64,
    ) -> Vec<AvailabilityDiff> {
        let mut diffs = Vec::new();
        let mut hostids: Vec<u64> = self.hosts.keys().copied().collect();
        hostids.sort_unstable();

        for hostid in hostids {
            let Some(host) = self.hosts.get_mut(&hostid) else {
                continue;
            };
            if host.status != HostStatus::Monitored || host.used_interfaces == UsedInterfaces::Unknown {
                continue;
            }

            let used = host.used_interfaces;
            let mut changed = false;
            for class in AgentClass::ALL {
                if used.uses(class) != Some(false) {
                    continue;
                }
                let agent = host.agent_mut(class);
                if agent.available == Availability::Unknown && agent.errors_from == 0 && agent.error.is_empty() {
                    continue;
                }
                agent.available = Availability::Unknown;
                agent.errors_from = 0;
                agent.disable_until = 0;
                self.pool.replace(true, &mut agent.error, "");
                diffs.push(AvailabilityDiff::capture(hostid, class, agent));
                changed = true;
            }
            if changed {
                host.availability_ts = now;
            }
        }

        diffs
    }
}
