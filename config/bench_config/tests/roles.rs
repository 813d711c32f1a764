use bench_config::{AssignmentMode, ConfigError, RoleAssignment, TestId};

fn rows(rows: &[&[usize]]) -> Vec<Vec<usize>> {
    rows.iter().map(|row| row.to_vec()).collect()
}

#[test]
fn test_implicit_assignment() {
    let roles = RoleAssignment::build(None, None, TestId::Cas, 3).unwrap();

    assert_eq!(roles.mode(), AssignmentMode::Implicit);
    assert_eq!(roles.num_threads(), 3);
    assert_eq!(roles.num_groups(), 1);
    for (rank, info) in roles.ranks().iter().enumerate() {
        assert_eq!(info.rank, rank);
        assert_eq!(info.core, rank);
        assert_eq!(info.role, 0);
        assert_eq!(info.group, 0);
        assert_eq!(info.test, TestId::Cas);
    }
}

#[test]
fn test_groups_with_one_global_test() {
    let cores = rows(&[&[4, 5, 6], &[10, 11]]);
    let tests = rows(&[&[13]]);
    let roles =
        RoleAssignment::build(Some(&cores), Some(&tests), TestId::StoreOnModified, 2).unwrap();

    assert_eq!(roles.mode(), AssignmentMode::PerGroup);
    assert_eq!(roles.num_threads(), 5);
    assert_eq!(roles.group_size(0), 3);
    assert_eq!(roles.group_size(1), 2);

    let last = roles.rank(4);
    assert_eq!((last.core, last.role, last.group), (11, 1, 1));
    assert!(roles.ranks().iter().all(|info| info.test == TestId::Fai));
    assert_eq!(roles.rank_on_core(10), Some(3));
    assert_eq!(roles.rank_on_core(7), None);
    assert_eq!(roles.group_members(1).count(), 2);
}

#[test]
fn test_one_test_per_group() {
    let cores = rows(&[&[0, 1], &[2, 3]]);

    let by_position = RoleAssignment::build(
        Some(&cores),
        Some(&rows(&[&[12, 14]])),
        TestId::StoreOnModified,
        2,
    )
    .unwrap();
    let by_row = RoleAssignment::build(
        Some(&cores),
        Some(&rows(&[&[12, 99], &[14]])),
        TestId::StoreOnModified,
        2,
    )
    .unwrap();

    for roles in [by_position, by_row] {
        let tests: Vec<_> = roles.ranks().iter().map(|info| info.test).collect();
        assert_eq!(tests, vec![TestId::Cas, TestId::Cas, TestId::Tas, TestId::Tas]);
        assert_eq!(roles.tests(), vec![TestId::Cas, TestId::Tas]);
    }
}

#[test]
fn test_per_thread_tests() {
    let cores = rows(&[&[0, 1, 2]]);
    let tests = rows(&[&[12, 13, 15]]);
    let roles = RoleAssignment::build(Some(&cores), Some(&tests), TestId::Cas, 2).unwrap();

    assert_eq!(roles.mode(), AssignmentMode::PerThread);
    let tests: Vec<_> = roles.ranks().iter().map(|info| info.test).collect();
    assert_eq!(tests, vec![TestId::Cas, TestId::Fai, TestId::Swap]);
    let role_ids: Vec<_> = roles.ranks().iter().map(|info| info.role).collect();
    assert_eq!(role_ids, vec![0, 1, 2]);
}

#[test]
fn test_shape_errors() {
    let cores = rows(&[&[0, 1], &[2, 3], &[4]]);

    assert_eq!(
        RoleAssignment::build(Some(&cores), Some(&rows(&[&[12, 13]])), TestId::Cas, 2),
        Err(ConfigError::TestsPerGroupMismatch {
            tests: 2,
            groups: 3
        })
    );
    assert_eq!(
        RoleAssignment::build(Some(&cores), Some(&rows(&[&[12], &[13]])), TestId::Cas, 2),
        Err(ConfigError::TestShape { rows: 2, groups: 3 })
    );
    assert_eq!(
        RoleAssignment::build(Some(&cores), Some(&rows(&[&[12], &[], &[1]])), TestId::Cas, 2),
        Err(ConfigError::EmptyTestRow(1))
    );
    assert_eq!(
        RoleAssignment::build(Some(&rows(&[&[0], &[]])), None, TestId::Cas, 2),
        Err(ConfigError::EmptyGroup(1))
    );
    assert_eq!(
        RoleAssignment::build(Some(&cores), Some(&rows(&[&[35]])), TestId::Cas, 2),
        Err(ConfigError::UnknownTest(35))
    );
    assert_eq!(
        RoleAssignment::build(None, None, TestId::Cas, 0),
        Err(ConfigError::EmptyGroup(0))
    );
}
