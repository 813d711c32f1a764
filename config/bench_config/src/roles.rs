use itertools::Itertools;

use crate::{ConfigError, ConfigResult, TestId};

/// Identity of one worker thread: which core it runs on, what it runs and where it sits in its
/// group. Rows are built once and never change during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankInfo {
    pub rank: usize,  // flattened thread index
    pub core: usize,  // logical core the thread is pinned to
    pub test: TestId, // scenario this thread runs
    pub role: usize,  // position within its group
    pub group: usize, // index of the core group
}

impl RankInfo {
    #[inline(always)]
    pub fn is_root(&self) -> bool {
        self.rank == 0
    }
}

/// How test ids were distributed over the threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentMode {
    /// No core groups were given: threads 0..n on cores 0..n, all in role 0.
    Implicit,
    /// Every group runs one test (a global one or one per group).
    PerGroup,
    /// A single group where each thread runs its own test.
    PerThread,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    ranks: Vec<RankInfo>,
    group_sizes: Vec<usize>,
    mode: AssignmentMode,
}

impl RoleAssignment {
    /// Build the per-thread table.
    ///
    /// `cores` holds one row of logical cores per group. `tests` is either a single row (one
    /// global id, one id per group by position, or, with a single group, one id per thread) or
    /// one row per group whose first entry is used.
    pub fn build(
        cores: Option<&[Vec<usize>]>,
        tests: Option<&[Vec<usize>]>,
        default_test: TestId,
        default_threads: usize,
    ) -> ConfigResult<Self> {
        let (core_rows, implicit) = match cores {
            Some(rows) => (rows.to_vec(), false),
            None => (vec![(0..default_threads).collect_vec()], true),
        };

        if core_rows.is_empty() {
            return Err(ConfigError::NoThreads);
        }
        if let Some(group) = core_rows.iter().position(|row| row.is_empty()) {
            return Err(ConfigError::EmptyGroup(group));
        }

        let group_sizes = core_rows.iter().map(Vec::len).collect_vec();
        let (tests, mode) = resolve_tests(tests, &group_sizes, default_test)?;
        let mode = if implicit { AssignmentMode::Implicit } else { mode };

        let ranks = core_rows
            .iter()
            .enumerate()
            .flat_map(|(group, row)| {
                row.iter()
                    .enumerate()
                    .map(move |(role, &core)| (group, role, core))
            })
            .zip(tests)
            .enumerate()
            .map(|(rank, ((group, role, core), test))| RankInfo {
                rank,
                core,
                test,
                role: if implicit { 0 } else { role },
                group,
            })
            .collect_vec();

        Ok(Self {
            ranks,
            group_sizes,
            mode,
        })
    }

    #[inline(always)]
    pub fn ranks(&self) -> &[RankInfo] {
        &self.ranks
    }

    #[inline(always)]
    pub fn rank(&self, rank: usize) -> &RankInfo {
        &self.ranks[rank]
    }

    #[inline(always)]
    pub fn num_threads(&self) -> usize {
        self.ranks.len()
    }

    #[inline(always)]
    pub fn num_groups(&self) -> usize {
        self.group_sizes.len()
    }

    #[inline(always)]
    pub fn group_size(&self, group: usize) -> usize {
        self.group_sizes[group]
    }

    #[inline(always)]
    pub fn mode(&self) -> AssignmentMode {
        self.mode
    }

    pub fn group_members(&self, group: usize) -> impl Iterator<Item = &RankInfo> {
        self.ranks.iter().filter(move |info| info.group == group)
    }

    /// Rank pinned to `core`, if any.
    pub fn rank_on_core(&self, core: usize) -> Option<usize> {
        self.ranks.iter().position(|info| info.core == core)
    }

    /// Distinct tests in first-appearance order.
    pub fn tests(&self) -> Vec<TestId> {
        self.ranks.iter().map(|info| info.test).unique().collect()
    }
}

fn resolve_tests(
    tests: Option<&[Vec<usize>]>,
    group_sizes: &[usize],
    default_test: TestId,
) -> ConfigResult<(Vec<TestId>, AssignmentMode)> {
    let threads: usize = group_sizes.iter().sum();
    let groups = group_sizes.len();
    let per_group = |ids: Vec<TestId>| {
        group_sizes
            .iter()
            .zip(ids)
            .flat_map(|(&size, test)| std::iter::repeat(test).take(size))
            .collect_vec()
    };

    let rows = match tests {
        None => return Ok((vec![default_test; threads], AssignmentMode::PerGroup)),
        Some(rows) => rows,
    };
    if let Some(row) = rows.iter().position(|row| row.is_empty()) {
        return Err(ConfigError::EmptyTestRow(row));
    }

    match rows {
        [row] if groups == 1 && threads > 1 && row.len() == threads => {
            let ids = row
                .iter()
                .map(|&id| TestId::try_from(id))
                .collect::<ConfigResult<Vec<_>>>()?;
            Ok((ids, AssignmentMode::PerThread))
        }
        [row] if row.len() == 1 => Ok((
            vec![TestId::try_from(row[0])?; threads],
            AssignmentMode::PerGroup,
        )),
        [row] if row.len() == groups => {
            let ids = row
                .iter()
                .map(|&id| TestId::try_from(id))
                .collect::<ConfigResult<Vec<_>>>()?;
            Ok((per_group(ids), AssignmentMode::PerGroup))
        }
        [row] => Err(ConfigError::TestsPerGroupMismatch {
            tests: row.len(),
            groups,
        }),
        rows if rows.len() == groups => {
            let ids = rows
                .iter()
                .map(|row| TestId::try_from(row[0]))
                .collect::<ConfigResult<Vec<_>>>()?;
            Ok((per_group(ids), AssignmentMode::PerGroup))
        }
        rows => Err(ConfigError::TestShape {
            rows: rows.len(),
            groups,
        }),
    }
}
