use std::sync::Arc;

use barrier::BarrierSet;
use bench_config::BenchConfig;
use log::debug;

use crate::{BenchResult, Handoff, Script};

/// Assignment of barrier ids to the phases of a repetition.
///
/// Global barriers span every worker. Each group gets its own pair of hand-off barriers, sized
/// for the members whose script actually waits there: group 0 uses ids 1 and 2, later groups
/// take consecutive pairs above [`BarrierLayout::RUN_END`]. When the line is primed by a helper
/// thread it joins the round start, release and round end barriers under thread id `num_threads`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierLayout;

impl BarrierLayout {
    pub const ROUND_START: usize = 0;
    pub const ROUND_END: usize = 3;
    pub const SEED_RELEASE: usize = 4;
    pub const RUN_END: usize = 10;
    const GROUP_0_HANDOFF: usize = 1;
    const EXTRA_GROUP_BASE: usize = 11;

    #[inline(always)]
    pub fn handoff(group: usize, handoff: Handoff) -> usize {
        match group {
            0 => Self::GROUP_0_HANDOFF + handoff.index(),
            g => Self::EXTRA_GROUP_BASE + 2 * (g - 1) + handoff.index(),
        }
    }

    /// Size of the bank for `groups` core groups.
    pub fn slots(groups: usize) -> usize {
        let needed = Self::EXTRA_GROUP_BASE + 2 * groups.saturating_sub(1);
        needed.max(BarrierSet::DEFAULT_SLOTS)
    }

    /// Thread id the helper seeder waits under.
    #[inline(always)]
    pub fn helper_id(config: &BenchConfig) -> usize {
        config.num_threads()
    }

    pub fn build(config: &BenchConfig) -> BenchResult<BarrierSet> {
        let threads = config.num_threads();
        let roles = &config.roles;
        let mut barriers = BarrierSet::with_slots(Self::slots(roles.num_groups()), threads);

        // seeded rounds never reach the hand-off barriers
        if config.seed_core.is_none() {
            for group in 0..roles.num_groups() {
                for handoff in Handoff::ALL {
                    let id = Self::handoff(group, handoff);
                    let members: Vec<bool> = roles
                        .ranks()
                        .iter()
                        .map(|info| {
                            info.group == group
                                && Script::for_test(info.test).waits_at(info.role, handoff)
                        })
                        .collect();
                    barriers.set_predicate(
                        id,
                        Arc::new(move |rank| members.get(rank).copied().unwrap_or(false)),
                    )?;
                    let participants = barriers.reconfigure(id, 0, threads)?;
                    debug!("group {group} hands off at barrier {id} ({participants} threads)");
                }
            }
        }

        if config.needs_seed_helper() {
            barriers.reconfigure(Self::ROUND_START, threads + 1, threads)?;
            barriers.reconfigure(Self::SEED_RELEASE, threads + 1, threads)?;
            barriers.reconfigure(Self::ROUND_END, threads + 1, threads)?;
        }

        Ok(barriers)
    }
}

#[cfg(test)]
mod tests {
    use bench_config::{RoleAssignment, TestId};

    use super::*;

    fn config(cores: &[Vec<usize>], tests: &[Vec<usize>]) -> BenchConfig {
        let roles = RoleAssignment::build(Some(cores), Some(tests), TestId::Cas, 2).unwrap();
        BenchConfig::new(roles)
    }

    #[test]
    fn test_handoff_ids_do_not_collide() {
        let mut ids = vec![BarrierLayout::ROUND_START, BarrierLayout::ROUND_END];
        ids.extend([BarrierLayout::SEED_RELEASE, BarrierLayout::RUN_END]);
        for group in 0..8 {
            for handoff in Handoff::ALL {
                ids.push(BarrierLayout::handoff(group, handoff));
            }
        }
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
        assert!(ids.iter().all(|&id| id < BarrierLayout::slots(8)));
        assert_eq!(BarrierLayout::slots(1), BarrierSet::DEFAULT_SLOTS);
    }

    #[test]
    fn test_handoff_sizes_follow_scripts() {
        // group 0 runs a two-role cas, group 1 the three-role store on shared
        let config = config(&[vec![0, 1], vec![2, 3, 4]], &[vec![12, 3]]);
        let barriers = BarrierLayout::build(&config).unwrap();

        assert_eq!(barriers.participants(BarrierLayout::ROUND_START), Some(5));
        assert_eq!(
            barriers.participants(BarrierLayout::handoff(0, Handoff::First)),
            Some(2)
        );
        assert_eq!(
            barriers.participants(BarrierLayout::handoff(1, Handoff::Second)),
            Some(3)
        );
        assert!(!barriers.participates(BarrierLayout::handoff(0, Handoff::First), 2));
        assert!(barriers.participates(BarrierLayout::handoff(1, Handoff::First), 4));
    }

    #[test]
    fn test_mixed_per_thread_tests() {
        // only the cas thread waits at the hand-off, the concurrent cas never does
        let config = config(&[vec![0, 1]], &[vec![12, 24]]);
        let barriers = BarrierLayout::build(&config).unwrap();
        let first = BarrierLayout::handoff(0, Handoff::First);
        assert_eq!(barriers.participants(first), Some(1));
        assert!(barriers.participates(first, 0));
        assert!(!barriers.participates(first, 1));
    }

    #[test]
    fn test_helper_joins_seeded_barriers() {
        let mut config = config(&[vec![0, 1]], &[vec![12]]);
        config.seed_core = Some(7);
        let barriers = BarrierLayout::build(&config).unwrap();
        assert_eq!(barriers.participants(BarrierLayout::SEED_RELEASE), Some(3));
        assert_eq!(barriers.participants(BarrierLayout::ROUND_END), Some(3));
        assert_eq!(barriers.participants(BarrierLayout::ROUND_START), Some(3));
        assert_eq!(barriers.participants(BarrierLayout::RUN_END), Some(2));
        assert_eq!(BarrierLayout::helper_id(&config), 2);
    }
}
