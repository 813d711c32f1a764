//! Thread orchestration: one pinned worker per configured core, an optional helper that primes
//! the line from the seed core, and the per-repetition barrier protocol tying them together.

use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;

use barrier::BarrierSet;
use bench_config::{BenchConfig, RankInfo, TestId};
use log::{debug, error, info};
use utils::cycles::{current_cpu, full_fence, read_cycles};
use utils::placement::pin_to_core;
use utils::timer::Timer;

use crate::{
    prime_round, Action, AtomicOps, BarrierLayout, BenchError, BenchResult, LineBuffer, Probe,
    RaceState, RunReport, Script, Slot, Step, TasMode, ThreadReport,
};

/// Seed of the pointer-chase permutation; fixed so runs are comparable.
const CHASE_SEED: u64 = 0x5EED_0C0C;

// spreads consecutive ranks over the seed space of the stride walk
const RANK_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

const GATE_PENDING: u8 = 0;
const GATE_OPEN: u8 = 1;
const GATE_ABORTED: u8 = 2;

/// Holds every spawned thread until the whole team exists, so a failed spawn never leaves the
/// others parked in a barrier.
struct StartGate(AtomicU8);

impl StartGate {
    fn new() -> Self {
        Self(AtomicU8::new(GATE_PENDING))
    }

    fn open(&self) {
        self.0.store(GATE_OPEN, Ordering::Release);
    }

    fn abort(&self) {
        self.0.store(GATE_ABORTED, Ordering::Release);
    }

    /// Wait for the verdict; `false` means the run was called off.
    fn pass(&self) -> bool {
        loop {
            match self.0.load(Ordering::Acquire) {
                GATE_PENDING => thread::yield_now(),
                state => return state == GATE_OPEN,
            }
        }
    }
}

/// A thread that dies mid-run leaves its peers blocked forever, so a panic takes the whole
/// process down instead.
struct AbortOnPanic(String);

impl Drop for AbortOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("{} panicked while its peers may wait on it, aborting", self.0);
            std::process::abort();
        }
    }
}

/// A configured run with its shared state allocated.
pub struct Benchmark {
    config: BenchConfig,
    buffer: LineBuffer,
    barriers: BarrierSet,
    race: RaceState,
}

impl Benchmark {
    /// Validate `config`, allocate the buffer and lay out the barriers. Nothing is spawned yet.
    pub fn new(config: BenchConfig) -> BenchResult<Self> {
        config.validate()?;

        let timer = Timer::new("setup", true);
        let mut buffer = LineBuffer::allocate_near(config.cache_lines, config.allocation_core())?;
        if config.lock_memory {
            buffer.lock_pages();
        }
        timer.note(&format!("{} bytes allocated", buffer.size_bytes()));

        if config
            .roles
            .ranks()
            .iter()
            .any(|info| info.test == TestId::LoadFromMemSize)
        {
            buffer.build_chase_ring(CHASE_SEED);
            timer.note("pointer-chase ring linked");
        }

        let barriers = BarrierLayout::build(&config)?;
        let race = RaceState::new(config.num_threads(), config.repetitions);
        timer.stop();

        Ok(Self {
            config,
            buffer,
            barriers,
            race,
        })
    }

    #[inline(always)]
    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Run every repetition on every thread and reduce the results.
    pub fn run(self) -> BenchResult<RunReport> {
        let Self {
            config,
            buffer,
            barriers,
            race,
        } = self;

        info!(
            "{} threads in {} groups, {} repetitions",
            config.num_threads(),
            config.roles.num_groups(),
            config.repetitions
        );
        let timer = Timer::new("run", true);
        let gate = StartGate::new();
        let team = Team {
            config: &config,
            buffer: &buffer,
            barriers: &barriers,
            race: &race,
            gate: &gate,
        };

        let threads = thread::scope(|s| -> BenchResult<Vec<ThreadReport>> {
            let mut handles = Vec::with_capacity(config.num_threads() + 1);
            let mut failure = None;

            for &info in config.roles.ranks() {
                let name = format!("ccbench-{}", info.rank);
                match thread::Builder::new()
                    .name(name.clone())
                    .spawn_scoped(s, move || team.work(info))
                {
                    Ok(handle) => handles.push((name, handle)),
                    Err(source) => {
                        failure = Some(BenchError::Spawn { name, source });
                        break;
                    }
                }
            }

            if failure.is_none() {
                if let Some(core) = config.seed_core.filter(|_| config.needs_seed_helper()) {
                    let name = "ccbench-seed".to_string();
                    match thread::Builder::new()
                        .name(name.clone())
                        .spawn_scoped(s, move || team.seed(core))
                    {
                        Ok(handle) => handles.push((name, handle)),
                        Err(source) => failure = Some(BenchError::Spawn { name, source }),
                    }
                }
            }

            match failure {
                Some(_) => gate.abort(),
                None => gate.open(),
            }

            let mut reports = Vec::with_capacity(config.num_threads());
            for (name, handle) in handles {
                match handle.join() {
                    Ok(report) => reports.extend(report),
                    Err(_) => {
                        failure.get_or_insert(BenchError::Join { name });
                    }
                }
            }
            match failure {
                Some(err) => Err(err),
                None => Ok(reports),
            }
        })?;
        timer.stop();

        Ok(RunReport {
            race: race.summarize(),
            repetitions: config.repetitions,
            seeded: config.seed_core.is_some(),
            buffer_bytes: buffer.size_bytes(),
            buffer_locked: buffer.is_locked(),
            final_word: buffer.line(0).head().load(Ordering::Relaxed),
            threads,
        })
    }
}

/// Everything a thread borrows from the run.
#[derive(Clone, Copy)]
struct Team<'a> {
    config: &'a BenchConfig,
    buffer: &'a LineBuffer,
    barriers: &'a BarrierSet,
    race: &'a RaceState,
    gate: &'a StartGate,
}

impl Team<'_> {
    fn work(self, info: RankInfo) -> Option<ThreadReport> {
        let _guard = AbortOnPanic(format!("worker {}", info.rank));
        pin_to_core(info.core);
        if !self.gate.pass() {
            return None;
        }

        let rank = info.rank;
        let observed_core = current_cpu();
        debug!(
            "rank {rank} runs {} as role {} of group {} on core {} (observed {observed_core:?})",
            info.test, info.role, info.group, info.core
        );

        let config = self.config;
        let seed = read_cycles() ^ (rank as u64).wrapping_mul(RANK_MIX);
        let mut ops = AtomicOps::new(self.buffer, self.race, config, rank, seed);

        self.barriers.wait(BarrierLayout::ROUND_START, rank);
        let correction = ops.calibrate();
        debug!("rank {rank} subtracts {correction} cycles of timer overhead");
        self.barriers.wait(BarrierLayout::ROUND_START, rank);

        let timer = Timer::new("measure", info.is_root());
        if config.seed_core.is_some() {
            self.seeded_rounds(&mut ops, info);
        } else {
            self.scripted_rounds(&mut ops, info);
        }
        timer.stop();

        let (samples, counters, checksum) = ops.into_parts();
        let keep_first = if config.verbose { config.print } else { 0 };
        let report =
            ThreadReport::reduce(info, observed_core, &samples, counters, checksum, keep_first);

        self.barriers.wait(BarrierLayout::RUN_END, rank);
        Some(report)
    }

    #[inline(always)]
    fn flush_target(&self, ops: &AtomicOps) {
        if self.config.flush {
            full_fence();
            ops.target().flush();
            full_fence();
        }
    }

    fn scripted_rounds(&self, ops: &mut AtomicOps, info: RankInfo) {
        let config = self.config;
        let rank = info.rank;
        let steps = Script::for_test(info.test).steps(info.role);
        let advance = info.test.uses_fresh_line() && !config.flush;

        for rep in 0..config.repetitions {
            self.flush_target(ops);
            self.barriers.wait(BarrierLayout::ROUND_START, rank);

            for step in steps {
                match *step {
                    Step::Op(action) => perform(ops, action, rep, config.force_success),
                    Step::Wait(handoff) => {
                        self.barriers
                            .wait(BarrierLayout::handoff(info.group, handoff), rank);
                    }
                }
            }
            if advance {
                ops.advance(config.stride);
            }

            self.barriers.wait(BarrierLayout::ROUND_END, rank);
        }
    }

    fn seeded_rounds(&self, ops: &mut AtomicOps, info: RankInfo) {
        let rank = info.rank;
        let seeder = self.config.seed_rank() == Some(rank);

        for rep in 0..self.config.repetitions {
            self.flush_target(ops);
            self.barriers.wait(BarrierLayout::ROUND_START, rank);

            if seeder {
                prime_round(ops.target(), self.race, rep);
            }
            self.barriers.wait(BarrierLayout::SEED_RELEASE, rank);

            let holds_flag = race_once(ops, info.test, rep);
            self.race.record_completion(rank, rep, read_cycles());
            if holds_flag {
                ops.release_tas();
            }

            self.barriers.wait(BarrierLayout::ROUND_END, rank);
        }
    }

    /// Helper seeder: primes every round from the seed core and never races itself.
    fn seed(self, core: usize) -> Option<ThreadReport> {
        let _guard = AbortOnPanic("seed helper".to_string());
        pin_to_core(core);
        if !self.gate.pass() {
            return None;
        }

        let id = BarrierLayout::helper_id(self.config);
        let line = self.buffer.line(0);
        debug!("seed helper primes every round from core {core}");
        // the workers' calibration bracket
        self.barriers.wait(BarrierLayout::ROUND_START, id);
        self.barriers.wait(BarrierLayout::ROUND_START, id);
        for rep in 0..self.config.repetitions {
            self.barriers.wait(BarrierLayout::ROUND_START, id);
            prime_round(line, self.race, rep);
            self.barriers.wait(BarrierLayout::SEED_RELEASE, id);
            self.barriers.wait(BarrierLayout::ROUND_END, id);
        }
        None
    }
}

/// One racing operation of a seeded round. Returns whether the caller now holds the
/// test-and-set flag and has to release it.
fn race_once(ops: &mut AtomicOps, test: TestId, rep: usize) -> bool {
    match test {
        TestId::Cas => {
            ops.cas(rep);
        }
        TestId::Fai => {
            ops.fai(rep);
        }
        TestId::Tas => return ops.tas(rep, TasMode::UntilAcquired),
        TestId::Swap => {
            ops.swap(rep);
        }
        TestId::CasUntilSuccess => {
            ops.cas_until_success(rep);
        }
        TestId::StoreOnModified
        | TestId::StoreOnModifiedNoSync
        | TestId::StoreOnExclusive
        | TestId::StoreOnShared
        | TestId::StoreOnOwnedMine
        | TestId::StoreOnOwned
        | TestId::StoreOnInvalid => ops.store(rep, Slot::Primary),
        TestId::LoadFromModified
        | TestId::LoadFromExclusive
        | TestId::LoadFromShared
        | TestId::LoadFromOwned
        | TestId::LoadFromInvalid
        | TestId::LoadFromL1 => {
            ops.load(rep);
        }
        _ => ops.probe(rep, Probe::Empty),
    }
    false
}

/// Interpret one scripted primitive.
fn perform(ops: &mut AtomicOps, action: Action, rep: usize, force_success: bool) {
    match action {
        Action::Load => {
            ops.load(rep);
        }
        Action::LoadUntimed => {
            ops.load_untimed();
        }
        Action::LoadTarget => {
            ops.load_target(rep);
        }
        Action::Store => ops.store(rep, Slot::Primary),
        Action::StoreSecondary => ops.store(rep, Slot::Secondary),
        Action::StoreTarget => ops.store_target(rep),
        Action::StoreUntimed => ops.store_untimed(rep),
        Action::Cas => {
            ops.cas(rep);
        }
        Action::CasTarget => {
            ops.cas_target(rep);
        }
        Action::CasUntilSuccess => {
            ops.cas_until_success(rep);
        }
        Action::Fai => {
            ops.fai(rep);
        }
        Action::Tas => {
            ops.tas(rep, TasMode::Once);
        }
        Action::Swap => {
            ops.swap(rep);
        }
        Action::Invalidate => ops.invalidate(rep),
        Action::ReleaseTas => ops.release_tas(),
        Action::ArmCas => {
            if force_success {
                ops.set_head((rep & 1) as u32);
            }
        }
        Action::ArmTasFailure => {
            if !force_success {
                ops.set_head(u32::MAX);
            }
        }
        Action::PrimeTas => ops.set_head(if force_success { 0 } else { u32::MAX }),
        Action::Chase => {
            ops.chase(rep);
        }
        Action::Probe(probe) => ops.probe(rep, probe),
    }
}
