use bench_config::{BenchConfig, RoleAssignment, TestId};
use ccbench::report::write_report;
use coherence::Benchmark;

#[test]
fn test_winner_trace_marks_fastest_winner() {
    const REPS: usize = 50;
    let cores = vec![vec![0, 1]];
    let tests = vec![vec![12]];
    let roles =
        RoleAssignment::build(Some(&cores), Some(&tests), TestId::StoreOnModified, 2).unwrap();
    let mut config = BenchConfig::new(roles);
    config.repetitions = REPS;
    config.cache_lines = 64;
    config.numa = false;
    config.seed_core = Some(2);
    config.trace_winners = true;

    let report = Benchmark::new(config.clone()).unwrap().run().unwrap();
    let mut out = Vec::new();
    write_report(&mut out, &config, &report).unwrap();
    let text = String::from_utf8(out).unwrap();

    let header = "rep,winner_thread_id,winner_core,winner_fastest";
    let rows = text
        .lines()
        .skip_while(|line| *line != header)
        .skip(1)
        .take(REPS)
        .collect::<Vec<_>>();
    assert_eq!(rows.len(), REPS);
    for (rep, row) in rows.iter().enumerate() {
        let fields = row.split(',').collect::<Vec<_>>();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0], rep.to_string());
        let expected = report.race.winner_fastest[rep].map(|fastest| fastest.to_string());
        assert_eq!(fields[3], expected.unwrap_or_default());
    }
}
