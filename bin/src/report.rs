//! Plain-text report on stdout. The line formats are stable; analysis scripts grep for them.

use std::io::{self, Write};

use bench_config::{AssignmentMode, BenchConfig, TestId};
use coherence::{Band, Distribution, RunReport, SlotReport, ThreadReport};
use itertools::Itertools;

pub fn write_catalogue(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Supported tests:")?;
    for test in TestId::ALL {
        writeln!(out, "  {:2} - {:<26} {}", test.index(), test.name(), test.summary())?;
    }
    Ok(())
}

pub fn write_header(out: &mut impl Write, config: &BenchConfig, started: &str) -> io::Result<()> {
    let roles = &config.roles;
    writeln!(out, "ccbench {started}")?;

    let tests = roles.tests().iter().map(|test| test.name()).join(", ");
    write!(
        out,
        "test: {tests} / threads: {} / repetitions: {} / stride: {} ({} KiB)",
        config.num_threads(),
        config.repetitions,
        config.stride,
        BenchConfig::CACHE_LINE_SIZE * config.stride / 1024
    )?;
    if config.flush {
        write!(out, " / flush")?;
    }
    if config.force_success {
        write!(out, " / success")?;
    }
    writeln!(out, " / fence: {}", config.fence)?;

    let bytes = config.cache_lines * BenchConfig::CACHE_LINE_SIZE;
    write!(
        out,
        "Data size : {} KiB ({} cache lines)",
        bytes / 1024,
        config.cache_lines
    )?;
    if let Some(core) = config.seed_core {
        write!(out, " / seed core: {core}")?;
        if config.needs_seed_helper() {
            write!(out, " (helper thread)")?;
        }
    }
    writeln!(out)?;

    if roles.mode() == AssignmentMode::PerThread {
        writeln!(out, "Per-thread ops in group 0:")?;
        for info in roles.ranks() {
            writeln!(out, "  Test {} on core {}", info.test.index(), info.core)?;
        }
    } else {
        for group in 0..roles.num_groups() {
            let members = roles.group_members(group).collect_vec();
            let test = members.first().map(|info| info.test.index()).unwrap_or_default();
            let cores = members.iter().map(|info| info.core).join(", ");
            writeln!(out, "Test {test} runs on cores: {cores}")?;
        }
    }
    writeln!(out)
}

pub fn write_report(
    out: &mut impl Write,
    config: &BenchConfig,
    report: &RunReport,
) -> io::Result<()> {
    if config.verbose {
        for thread in &report.threads {
            write_samples(out, thread)?;
        }
    }

    write_cross_core(out, report)?;
    write_winners(out, report)?;
    write_counters(out, report)?;
    if report.seeded {
        write_latency(out, report)?;
    }
    write_notes(out, config)?;
    if config.trace_winners {
        write_winner_trace(out, report)?;
    }

    writeln!(
        out,
        " value of cl is {:<10} / sum is {}",
        report.final_word,
        report.checksum()
    )
}

fn write_samples(out: &mut impl Write, thread: &ThreadReport) -> io::Result<()> {
    let info = &thread.info;
    for slot in thread.slots.iter().filter(|slot| slot.count > 0) {
        let Some(stats) = &slot.stats else {
            continue;
        };
        let tag = slot.slot.index();
        writeln!(
            out,
            " *** thread ID {} (core {}, role {}) {} ***",
            info.rank, info.core, info.role, info.test
        )?;
        writeln!(
            out,
            " [{tag:02}] avg : {:8.1} abs dev : {:8.1} std dev : {:8.1} num : {} (corrected by {} cycles)",
            stats.avg, stats.abs_dev, stats.std_dev, stats.count, thread.correction
        )?;
        writeln!(
            out,
            " [{tag:02}] min : {:8} max : {:8}",
            stats.min, stats.max
        )?;
        write_bands(out, tag, stats)?;
        write_first(out, tag, slot)?;
    }
    Ok(())
}

fn band_label(index: usize, band: &Band) -> String {
    let lower = match index {
        0 => 0.0,
        i => Distribution::BAND_LIMITS[i - 1] * 100.0,
    };
    match band.within {
        Some(upper) => format!("{:>3.0}-{:<3.0}%", lower, upper * 100.0),
        None => format!("{:>3.0}-..%", lower),
    }
}

fn write_bands(out: &mut impl Write, tag: usize, stats: &Distribution) -> io::Result<()> {
    for (index, band) in stats.bands.iter().enumerate() {
        let share = 100.0 * band.count as f64 / stats.count as f64;
        writeln!(
            out,
            " [{tag:02}]  {} : {:8} ({:5.1}% | avg: {:8.1})",
            band_label(index, band),
            band.count,
            share,
            band.avg
        )?;
    }
    Ok(())
}

fn write_first(out: &mut impl Write, tag: usize, slot: &SlotReport) -> io::Result<()> {
    if slot.first.is_empty() {
        return Ok(());
    }
    writeln!(out, " [{tag:02}] first {} samples:", slot.first.len())?;
    for chunk in slot.first.chunks(10) {
        writeln!(out, " [{tag:02}]   {}", chunk.iter().map(|v| format!("{v:6}")).join(" "))?;
    }
    Ok(())
}

fn write_cross_core(out: &mut impl Write, report: &RunReport) -> io::Result<()> {
    writeln!(out, "\n")?;
    writeln!(
        out,
        "---- Cross-core summary ------------------------------------------------------------"
    )?;

    for (index, thread) in report.threads.iter().enumerate() {
        let info = &thread.info;
        if info.role == 0 {
            writeln!(
                out,
                "Test number {} uses test ID {}",
                info.group,
                info.test.index()
            )?;
        }

        match thread.primary() {
            Some(stats) => writeln!(
                out,
                "Core number {} is using thread: {}. with: avg {:5.1} cycles (min {:5} | max {:5}), std dev: {:5.1}, abs dev: {:5.1}",
                info.role, info.core, stats.avg, stats.min, stats.max, stats.std_dev, stats.abs_dev
            )?,
            None => writeln!(out, "Thread {} : no samples recorded", info.core)?,
        }

        let group_ends = report
            .threads
            .get(index + 1)
            .map_or(true, |next| next.info.group != info.group);
        if group_ends {
            writeln!(
                out,
                "End test {} results for ID {}",
                info.group,
                info.test.index()
            )?;
        }
    }
    writeln!(out, "\n")?;

    match report.cross_core() {
        Some(summary) => writeln!(
            out,
            " Summary : mean avg {:8.1} cycles | min avg {:8.1} (core {}) | max avg {:8.1} (core {})",
            summary.mean_avg, summary.min_avg, summary.min_core, summary.max_avg, summary.max_core
        ),
        None => writeln!(out, " Summary : no statistics captured"),
    }
}

fn write_winners(out: &mut impl Write, report: &RunReport) -> io::Result<()> {
    writeln!(
        out,
        "\nFirst-op winners per thread (out of {} reps):",
        report.repetitions
    )?;
    for thread in &report.threads {
        let info = &thread.info;
        writeln!(
            out,
            "  Group {} role {} on thread {} (thread ID {}): {} wins",
            info.group,
            info.role,
            info.core,
            info.rank,
            report.wins(info.rank)
        )?;
    }
    if report.race.unclaimed_rounds > 0 {
        writeln!(
            out,
            "  {} repetitions had no winner",
            report.race.unclaimed_rounds
        )?;
    }
    writeln!(out)
}

fn write_counters(out: &mut impl Write, report: &RunReport) -> io::Result<()> {
    for thread in &report.threads {
        let counters = &thread.counters;
        writeln!(
            out,
            "CPU {} ran {} | wins: {} | attempts: {} | successes: {} | failures: {}",
            thread.info.core,
            thread.info.test.name(),
            report.wins(thread.info.rank),
            counters.attempts,
            counters.successes,
            counters.failures
        )?;
    }
    Ok(())
}

fn write_latency(out: &mut impl Write, report: &RunReport) -> io::Result<()> {
    writeln!(out, "\nCommon-start latency (B4 -> success), per thread:")?;
    for thread in &report.threads {
        let info = &thread.info;
        match report.latency(info.rank) {
            Some(latency) => writeln!(
                out,
                "  thread ID {} (core {}): mean {:.1} cycles, min {}, max {}",
                info.rank, info.core, latency.mean, latency.min, latency.max
            )?,
            None => writeln!(
                out,
                "  thread ID {} (core {}): no samples",
                info.rank, info.core
            )?,
        }
    }
    writeln!(
        out,
        "  winner also had the smallest latency in {} of {} timed repetitions\n",
        report.race.winner_was_fastest, report.race.timed_rounds
    )
}

fn write_winner_trace(out: &mut impl Write, report: &RunReport) -> io::Result<()> {
    writeln!(out, "rep,winner_thread_id,winner_core,winner_fastest")?;
    let race = &report.race;
    for (rep, (winner, fastest)) in race.winners.iter().zip(&race.winner_fastest).enumerate() {
        let fastest = fastest.map(|fastest| fastest.to_string()).unwrap_or_default();
        match winner {
            Some(rank) => {
                let core = report
                    .threads
                    .iter()
                    .find(|thread| thread.info.rank == *rank)
                    .map(|thread| thread.info.core.to_string())
                    .unwrap_or_default();
                writeln!(out, "{rep},{rank},{core},{fastest}")?;
            }
            None => writeln!(out, "{rep},,,")?,
        }
    }
    Ok(())
}

fn write_notes(out: &mut impl Write, config: &BenchConfig) -> io::Result<()> {
    for test in config.roles.tests() {
        let threads = config
            .roles
            .ranks()
            .iter()
            .filter(|info| info.test == test)
            .count();
        for note in notes(test, config, threads) {
            writeln!(out, " ** {note}")?;
        }
    }
    Ok(())
}

/// What each role of `test` observes, given the run's flush and force-success settings.
pub fn notes(test: TestId, config: &BenchConfig, threads: usize) -> Vec<String> {
    let flush = config.flush;
    let success = config.force_success;
    let prefetch = if flush {
        "Results from Core 0 : load from invalid"
    } else {
        "Results from Core 0 : load from invalid, BUT could have prefetching"
    };
    let need_three = |name: &str| format!("Need >=3 processes to achieve {name}");

    let mut lines: Vec<String> = match test {
        TestId::StoreOnModified if flush => vec![
            "Results from Core 0 : store on invalid".into(),
            "Results from Core 1 : store on modified".into(),
        ],
        TestId::StoreOnModified => vec!["Results from Core 0 and 1 : store on modified".into()],
        TestId::StoreOnModifiedNoSync if flush => vec!["Results do not make sense".into()],
        TestId::StoreOnModifiedNoSync => vec![
            "Results from Core 0 and 1 : store on modified while another core is also trying to do the same".into(),
        ],
        TestId::StoreOnExclusive => vec![
            prefetch.into(),
            "Results from Core 1 : store on exclusive".into(),
        ],
        TestId::StoreOnShared => vec![
            "Results from Core 0 & 2: load from modified and exclusive or shared, respectively".into(),
            "Results from Core 1 : store on shared".into(),
        ],
        TestId::StoreOnOwnedMine => vec![
            "Results from Core 0 : load from modified (makes it owned, if owned state is supported)".into(),
            if flush {
                "Results 1 from Core 1 : store to invalid".into()
            } else {
                "Results 1 from Core 1 : store to modified mine".into()
            },
            "Results 2 from Core 1 : store to owned mine (if owned is supported, else exclusive)".into(),
        ],
        TestId::StoreOnOwned => vec![
            if flush {
                "Results from Core 0 : store to modified".into()
            } else {
                "Results from Core 0 : store to invalid".into()
            },
            "Results 1 from Core 1 : load from modified (makes it owned, if owned state is supported)".into(),
            "Results 2 from Core 1 : store to owned (if owned is supported, else exclusive mine)".into(),
        ],
        TestId::StoreOnInvalid => vec![
            "Results from Core 0 : store on invalid".into(),
            "Results from Core 1 : cache line flush".into(),
        ],
        TestId::LoadFromModified => vec![
            if flush {
                "Results from Core 0 : store to invalid".into()
            } else {
                "Results from Core 0 : store to owned mine (if owned state supported, else exclusive)".into()
            },
            "Results from Core 1 : load from modified (makes it owned, if owned state supported)".into(),
        ],
        TestId::LoadFromExclusive => vec![
            prefetch.into(),
            "Results from Core 1 : load from exclusive".into(),
        ],
        TestId::LoadFromShared => {
            let mut lines = vec![
                prefetch.to_string(),
                "Results from Core 1 : load from exclusive".into(),
            ];
            if threads >= 3 {
                lines.push("Results from Core 2 : load from shared".into());
            }
            lines
        }
        TestId::LoadFromOwned => {
            let mut lines = vec![
                if flush {
                    "Results from Core 0 : store to invalid".into()
                } else {
                    "Results from Core 0 : store to owned mine (if owned is supported, else shared)".into()
                },
                "Results from Core 1 : load from modified".into(),
            ];
            if threads >= 3 {
                lines.push("Results from Core 2 : load from owned".into());
            }
            lines
        }
        TestId::LoadFromInvalid => vec![
            "Results from Core 0 : load from invalid".into(),
            "Results from Core 1 : cache line flush".into(),
        ],
        TestId::Cas => vec![
            "Results from Core 0 : CAS successfull".into(),
            "Results from Core 1 : CAS unsuccessfull".into(),
        ],
        TestId::Fai => vec!["Results from Cores 0 & 1: FAI".into()],
        TestId::Tas => vec![
            "Results from Core 0 : TAS successfull".into(),
            "Results from Core 1 : TAS unsuccessfull".into(),
        ],
        TestId::Swap => vec!["Results from Cores 0 & 1: SWAP".into()],
        TestId::CasOnModified => vec![
            "Results from Core 0 : store on modified".into(),
            format!(
                "Results from Core 1 : CAS on modified ({}% successfull)",
                if success { 100 } else { 50 }
            ),
        ],
        TestId::FaiOnModified => vec![
            "Results from Core 0 : store on modified".into(),
            "Results from Core 1 : FAI on modified".into(),
        ],
        TestId::TasOnModified => vec![
            "Results from Core 0 : store on modified".into(),
            format!(
                "Results from Core 1 : TAS on modified ({}% successfull)",
                if success { 100 } else { 0 }
            ),
        ],
        TestId::SwapOnModified => vec![
            "Results from Core 0 : store on modified".into(),
            "Results from Core 1 : SWAP on modified".into(),
        ],
        TestId::CasOnShared => vec![
            "Results from Core 0 : load from modified".into(),
            "Results from Core 1 : CAS on shared (100% successfull)".into(),
            "Results from Core 2 : load from exclusive or shared".into(),
        ],
        TestId::FaiOnShared => vec![
            "Results from Core 0 : load from modified".into(),
            "Results from Core 1 : FAI on shared".into(),
            "Results from Core 2 : load from exclusive or shared".into(),
        ],
        TestId::TasOnShared => vec![
            "Results from Core 0 : load from L1".into(),
            format!(
                "Results from Core 1 : TAS on shared ({}% successfull)",
                if success { 100 } else { 0 }
            ),
            "Results from Core 2 : load from exclusive or shared".into(),
        ],
        TestId::SwapOnShared => vec![
            "Results from Core 0 : load from modified".into(),
            "Results from Core 1 : SWAP on shared".into(),
            "Results from Core 2 : load from exclusive or shared".into(),
        ],
        TestId::CasConcurrent => vec![format!("Results from {threads} cores: CAS concurrent")],
        TestId::FaiOnInvalid => vec![
            "Results from Core 0 : FAI on invalid".into(),
            "Results from Core 1 : cache line flush".into(),
        ],
        TestId::LoadFromL1 => vec!["Results from Core 0: load from L1".into()],
        TestId::LoadFromMemSize => vec![format!(
            "Results from every core: load from random {} KiB",
            config.cache_lines * BenchConfig::CACHE_LINE_SIZE / 1024
        )],
        TestId::Lfence => vec!["Results from Cores 0 & 1: load fence".into()],
        TestId::Sfence => vec!["Results from Cores 0 & 1: store fence".into()],
        TestId::Mfence => vec!["Results from Cores 0 & 1: full fence".into()],
        TestId::Profiler => {
            vec!["Results from every core: empty timed region".into()]
        }
        TestId::Pause => vec!["Results from Cores 0 & 1: pause".into()],
        TestId::Nop => vec!["Results from Cores 0 & 1: nop".into()],
        TestId::CasUntilSuccess => vec![format!(
            "Results from {threads} cores: CAS retried until it succeeds{}",
            if config.backoff.enabled {
                " with exponential backoff"
            } else {
                ""
            }
        )],
    };

    let needs_three = matches!(
        test,
        TestId::StoreOnShared
            | TestId::LoadFromShared
            | TestId::LoadFromOwned
            | TestId::CasOnShared
            | TestId::FaiOnShared
            | TestId::TasOnShared
            | TestId::SwapOnShared
    );
    if needs_three && threads < 3 {
        lines.push(need_three(test.name()));
    }
    lines
}
