//! Every scenario as data: for each role, the ordered steps of one repetition.
//!
//! A step is either a primitive or a wait at one of the two hand-off barriers of the thread's
//! group. The first role(s) of a script induce the coherence state, the role after them performs
//! the operation whose latency is of interest, and any further roles either wait or keep a copy
//! of the line to make the sharing realistic.

use bench_config::TestId;

use crate::Probe;

/// The two ordered hand-off points inside a repetition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handoff {
    First,
    Second,
}

impl Handoff {
    pub const ALL: [Handoff; 2] = [Handoff::First, Handoff::Second];

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Timed, walked load.
    Load,
    /// Walked load, not timed.
    LoadUntimed,
    /// Timed load of the target only.
    LoadTarget,
    /// Timed, walked store into the primary slot.
    Store,
    /// Timed, walked store into the secondary slot.
    StoreSecondary,
    /// Timed store to the target only.
    StoreTarget,
    /// Store to the target, not timed.
    StoreUntimed,
    Cas,
    /// Timed compare-and-swap of the target only.
    CasTarget,
    CasUntilSuccess,
    Fai,
    Tas,
    Swap,
    /// Timed flush of the target.
    Invalidate,
    /// Clear the test-and-set flag again.
    ReleaseTas,
    /// With forced success, store the value the next compare-and-swap expects.
    ArmCas,
    /// Without forced success, set every bit so the next test-and-set fails.
    ArmTasFailure,
    /// Clear the flag with forced success, set every bit otherwise.
    PrimeTas,
    Chase,
    Probe(Probe),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Op(Action),
    Wait(Handoff),
}

#[derive(Debug, Clone, Copy)]
pub struct Script {
    test: TestId,
    roles: &'static [&'static [Step]],
    rest: &'static [Step],
}

impl Script {
    const fn new(test: TestId, roles: &'static [&'static [Step]], rest: &'static [Step]) -> Self {
        Self { test, roles, rest }
    }

    #[inline(always)]
    pub fn for_test(test: TestId) -> &'static Script {
        &SCRIPTS[test.index()]
    }

    #[inline(always)]
    pub fn test(&self) -> TestId {
        self.test
    }

    /// Steps of `role`; roles past the scripted ones share the same fallback.
    #[inline(always)]
    pub fn steps(&self, role: usize) -> &'static [Step] {
        self.roles.get(role).copied().unwrap_or(self.rest)
    }

    pub fn waits_at(&self, role: usize, handoff: Handoff) -> bool {
        self.steps(role).contains(&Step::Wait(handoff))
    }
}

const B1: Step = Step::Wait(Handoff::First);
const B2: Step = Step::Wait(Handoff::Second);

const LOAD: Step = Step::Op(Action::Load);
const LOAD_UNTIMED: Step = Step::Op(Action::LoadUntimed);
const LOAD_TARGET: Step = Step::Op(Action::LoadTarget);
const STORE: Step = Step::Op(Action::Store);
const STORE_SECONDARY: Step = Step::Op(Action::StoreSecondary);
const STORE_TARGET: Step = Step::Op(Action::StoreTarget);
const STORE_UNTIMED: Step = Step::Op(Action::StoreUntimed);
const CAS: Step = Step::Op(Action::Cas);
const CAS_TARGET: Step = Step::Op(Action::CasTarget);
const CAS_UNTIL_SUCCESS: Step = Step::Op(Action::CasUntilSuccess);
const FAI: Step = Step::Op(Action::Fai);
const TAS: Step = Step::Op(Action::Tas);
const SWAP: Step = Step::Op(Action::Swap);
const INVALIDATE: Step = Step::Op(Action::Invalidate);
const RELEASE_TAS: Step = Step::Op(Action::ReleaseTas);
const ARM_CAS: Step = Step::Op(Action::ArmCas);
const ARM_TAS_FAILURE: Step = Step::Op(Action::ArmTasFailure);
const PRIME_TAS: Step = Step::Op(Action::PrimeTas);
const CHASE: Step = Step::Op(Action::Chase);

macro_rules! probe {
    ($probe:expr) => {
        Step::Op(Action::Probe($probe))
    };
}

// two timing roles, the rest idle
macro_rules! probe_pair {
    ($test:expr, $probe:expr) => {
        Script::new($test, &[&[probe!($probe)], &[probe!($probe)]], &[])
    };
}

// roles 0 and 1 hand the line over at the first barrier
macro_rules! handoff_pair {
    ($test:expr, $first:expr, $second:expr) => {
        Script::new($test, &[&[$first, B1], &[B1, $second]], &[B1])
    };
}

// roles 0 and 2 share the line, role 1 acts on it after both hand-offs
macro_rules! shared_then {
    ($test:expr, $op:expr) => {
        Script::new(
            $test,
            &[&[LOAD, B1, B2], &[B1, B2, $op], &[B1, LOAD, B2]],
            &[B1, LOAD_UNTIMED, B2],
        )
    };
}

static SCRIPTS: [Script; TestId::COUNT] = [
    handoff_pair!(TestId::StoreOnModified, STORE, STORE),
    Script::new(
        TestId::StoreOnModifiedNoSync,
        &[&[STORE_TARGET], &[STORE_TARGET], &[STORE_TARGET]],
        &[STORE_UNTIMED],
    ),
    handoff_pair!(TestId::StoreOnExclusive, LOAD, STORE),
    shared_then!(TestId::StoreOnShared, STORE),
    Script::new(
        TestId::StoreOnOwnedMine,
        &[&[B1, LOAD, B2], &[STORE, B1, B2, STORE_SECONDARY]],
        &[B1, LOAD_UNTIMED, B2],
    ),
    Script::new(
        TestId::StoreOnOwned,
        &[&[STORE, B1, B2], &[B1, LOAD, B2, STORE_SECONDARY]],
        &[B1, LOAD_UNTIMED, B2],
    ),
    Script::new(
        TestId::StoreOnInvalid,
        &[&[B1, STORE_TARGET], &[INVALIDATE, B1]],
        &[B1],
    ),
    handoff_pair!(TestId::LoadFromModified, STORE, LOAD),
    handoff_pair!(TestId::LoadFromExclusive, LOAD, LOAD),
    Script::new(
        TestId::LoadFromShared,
        &[&[LOAD, B1, B2], &[B1, LOAD, B2], &[B1, B2, LOAD]],
        &[B1, B2],
    ),
    Script::new(
        TestId::LoadFromOwned,
        &[&[STORE, B1, B2], &[B1, LOAD, B2], &[B1, B2, LOAD]],
        &[B1, B2],
    ),
    Script::new(
        TestId::LoadFromInvalid,
        &[&[B1, LOAD], &[INVALIDATE, B1]],
        &[B1],
    ),
    handoff_pair!(TestId::Cas, CAS, CAS),
    handoff_pair!(TestId::Fai, FAI, FAI),
    Script::new(
        TestId::Tas,
        &[&[TAS, B1, B2], &[B1, TAS, RELEASE_TAS, B2]],
        &[B1, B2],
    ),
    handoff_pair!(TestId::Swap, SWAP, SWAP),
    Script::new(
        TestId::CasOnModified,
        &[&[STORE, ARM_CAS, B1], &[B1, CAS]],
        &[B1],
    ),
    handoff_pair!(TestId::FaiOnModified, STORE, FAI),
    Script::new(
        TestId::TasOnModified,
        &[&[STORE, ARM_TAS_FAILURE, B1], &[B1, TAS]],
        &[B1],
    ),
    handoff_pair!(TestId::SwapOnModified, STORE, SWAP),
    Script::new(
        TestId::CasOnShared,
        &[&[LOAD, B1, B2], &[B1, CAS, B2], &[B1, LOAD, B2]],
        &[B1, LOAD_UNTIMED, B2],
    ),
    shared_then!(TestId::FaiOnShared, FAI),
    Script::new(
        TestId::TasOnShared,
        &[&[PRIME_TAS, LOAD, B1, B2], &[B1, B2, TAS], &[B1, LOAD, B2]],
        &[B1, LOAD_UNTIMED, B2],
    ),
    shared_then!(TestId::SwapOnShared, SWAP),
    Script::new(TestId::CasConcurrent, &[], &[CAS_TARGET]),
    Script::new(
        TestId::FaiOnInvalid,
        &[&[B1, FAI], &[INVALIDATE, B1]],
        &[B1],
    ),
    Script::new(
        TestId::LoadFromL1,
        &[&[LOAD_TARGET, LOAD_TARGET, LOAD_TARGET]],
        &[],
    ),
    Script::new(TestId::LoadFromMemSize, &[], &[CHASE]),
    probe_pair!(TestId::Lfence, Probe::LoadFence),
    probe_pair!(TestId::Sfence, Probe::StoreFence),
    probe_pair!(TestId::Mfence, Probe::FullFence),
    Script::new(TestId::Profiler, &[], &[probe!(Probe::Empty)]),
    probe_pair!(TestId::Pause, Probe::Pause),
    probe_pair!(TestId::Nop, Probe::Nop),
    Script::new(TestId::CasUntilSuccess, &[], &[CAS_UNTIL_SUCCESS]),
];
