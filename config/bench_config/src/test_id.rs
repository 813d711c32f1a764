use std::fmt;

use crate::ConfigError;

/// Every scenario the harness knows how to run. The discriminant is the numeric id accepted on
/// the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TestId {
    StoreOnModified = 0,
    StoreOnModifiedNoSync,
    StoreOnExclusive,
    StoreOnShared,
    StoreOnOwnedMine,
    StoreOnOwned,
    StoreOnInvalid,
    LoadFromModified,
    LoadFromExclusive,
    LoadFromShared,
    LoadFromOwned,
    LoadFromInvalid,
    Cas,
    Fai,
    Tas,
    Swap,
    CasOnModified,
    FaiOnModified,
    TasOnModified,
    SwapOnModified,
    CasOnShared,
    FaiOnShared,
    TasOnShared,
    SwapOnShared,
    CasConcurrent,
    FaiOnInvalid,
    LoadFromL1,
    LoadFromMemSize,
    Lfence,
    Sfence,
    Mfence,
    Profiler,
    Pause,
    Nop,
    CasUntilSuccess,
}

impl TestId {
    pub const COUNT: usize = 35;

    pub const ALL: [TestId; Self::COUNT] = [
        TestId::StoreOnModified,
        TestId::StoreOnModifiedNoSync,
        TestId::StoreOnExclusive,
        TestId::StoreOnShared,
        TestId::StoreOnOwnedMine,
        TestId::StoreOnOwned,
        TestId::StoreOnInvalid,
        TestId::LoadFromModified,
        TestId::LoadFromExclusive,
        TestId::LoadFromShared,
        TestId::LoadFromOwned,
        TestId::LoadFromInvalid,
        TestId::Cas,
        TestId::Fai,
        TestId::Tas,
        TestId::Swap,
        TestId::CasOnModified,
        TestId::FaiOnModified,
        TestId::TasOnModified,
        TestId::SwapOnModified,
        TestId::CasOnShared,
        TestId::FaiOnShared,
        TestId::TasOnShared,
        TestId::SwapOnShared,
        TestId::CasConcurrent,
        TestId::FaiOnInvalid,
        TestId::LoadFromL1,
        TestId::LoadFromMemSize,
        TestId::Lfence,
        TestId::Sfence,
        TestId::Mfence,
        TestId::Profiler,
        TestId::Pause,
        TestId::Nop,
        TestId::CasUntilSuccess,
    ];

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            TestId::StoreOnModified => "STORE_ON_MODIFIED",
            TestId::StoreOnModifiedNoSync => "STORE_ON_MODIFIED_NO_SYNC",
            TestId::StoreOnExclusive => "STORE_ON_EXCLUSIVE",
            TestId::StoreOnShared => "STORE_ON_SHARED",
            TestId::StoreOnOwnedMine => "STORE_ON_OWNED_MINE",
            TestId::StoreOnOwned => "STORE_ON_OWNED",
            TestId::StoreOnInvalid => "STORE_ON_INVALID",
            TestId::LoadFromModified => "LOAD_FROM_MODIFIED",
            TestId::LoadFromExclusive => "LOAD_FROM_EXCLUSIVE",
            TestId::LoadFromShared => "LOAD_FROM_SHARED",
            TestId::LoadFromOwned => "LOAD_FROM_OWNED",
            TestId::LoadFromInvalid => "LOAD_FROM_INVALID",
            TestId::Cas => "CAS",
            TestId::Fai => "FAI",
            TestId::Tas => "TAS",
            TestId::Swap => "SWAP",
            TestId::CasOnModified => "CAS_ON_MODIFIED",
            TestId::FaiOnModified => "FAI_ON_MODIFIED",
            TestId::TasOnModified => "TAS_ON_MODIFIED",
            TestId::SwapOnModified => "SWAP_ON_MODIFIED",
            TestId::CasOnShared => "CAS_ON_SHARED",
            TestId::FaiOnShared => "FAI_ON_SHARED",
            TestId::TasOnShared => "TAS_ON_SHARED",
            TestId::SwapOnShared => "SWAP_ON_SHARED",
            TestId::CasConcurrent => "CAS_CONCURRENT",
            TestId::FaiOnInvalid => "FAI_ON_INVALID",
            TestId::LoadFromL1 => "LOAD_FROM_L1",
            TestId::LoadFromMemSize => "LOAD_FROM_MEM_SIZE",
            TestId::Lfence => "LFENCE",
            TestId::Sfence => "SFENCE",
            TestId::Mfence => "MFENCE",
            TestId::Profiler => "PROFILER",
            TestId::Pause => "PAUSE",
            TestId::Nop => "NOP",
            TestId::CasUntilSuccess => "CAS_UNTIL_SUCCESS",
        }
    }

    /// One line on what the scenario times, for `--list-tests`.
    pub fn summary(self) -> &'static str {
        match self {
            TestId::StoreOnModified => "role 1 stores to a line role 0 just modified",
            TestId::StoreOnModifiedNoSync => "roles 0-2 store to the same line with no hand-off",
            TestId::StoreOnExclusive => "role 1 stores to a line role 0 holds exclusive",
            TestId::StoreOnShared => "role 1 stores to a line shared by every other role",
            TestId::StoreOnOwnedMine => "role 0 stores to a line it owns while role 1 shares it",
            TestId::StoreOnOwned => "role 1 stores to a line role 0 owns",
            TestId::StoreOnInvalid => "role 0 stores to a freshly flushed line",
            TestId::LoadFromModified => "role 1 loads a line role 0 just modified",
            TestId::LoadFromExclusive => "role 1 loads a line role 0 holds exclusive",
            TestId::LoadFromShared => "role 2 loads a line already shared by roles 0 and 1",
            TestId::LoadFromOwned => "role 2 loads a line role 0 owns and role 1 shares",
            TestId::LoadFromInvalid => "role 0 loads a freshly flushed line",
            TestId::Cas => "role 1 compare-and-swaps a line role 0 just swapped",
            TestId::Fai => "role 1 fetch-and-increments a line role 0 just incremented",
            TestId::Tas => "role 1 test-and-sets a line role 0 just set",
            TestId::Swap => "role 1 swaps a line role 0 just swapped",
            TestId::CasOnModified => "role 1 compare-and-swaps a line role 0 just stored to",
            TestId::FaiOnModified => "role 1 fetch-and-increments a line role 0 just stored to",
            TestId::TasOnModified => "role 1 test-and-sets a line role 0 just stored to",
            TestId::SwapOnModified => "role 1 swaps a line role 0 just stored to",
            TestId::CasOnShared => "role 1 compare-and-swaps a line shared by the others",
            TestId::FaiOnShared => "role 1 fetch-and-increments a line shared by the others",
            TestId::TasOnShared => "role 1 test-and-sets a line shared by the others",
            TestId::SwapOnShared => "role 1 swaps a line shared by the others",
            TestId::CasConcurrent => "every thread compare-and-swaps the same line at once",
            TestId::FaiOnInvalid => "role 0 fetch-and-increments a freshly flushed line",
            TestId::LoadFromL1 => "role 0 loads the same line three times",
            TestId::LoadFromMemSize => "pointer chase through the whole buffer",
            TestId::Lfence => "cost of a load fence",
            TestId::Sfence => "cost of a store fence",
            TestId::Mfence => "cost of a full fence",
            TestId::Profiler => "cost of an empty timed region",
            TestId::Pause => "cost of a spin-loop pause",
            TestId::Nop => "cost of a nop",
            TestId::CasUntilSuccess => "every thread retries its compare-and-swap until it lands",
        }
    }

    /// Scenarios that start every repetition on a line nobody has touched yet, by advancing the
    /// target `stride` lines per repetition (unless the line is flushed instead).
    #[inline]
    pub fn uses_fresh_line(self) -> bool {
        matches!(
            self,
            TestId::StoreOnExclusive
                | TestId::StoreOnInvalid
                | TestId::LoadFromExclusive
                | TestId::LoadFromShared
                | TestId::LoadFromInvalid
                | TestId::FaiOnInvalid
        )
    }

    /// Scenarios whose timed operation is an atomic read-modify-write.
    #[inline]
    pub fn is_atomic(self) -> bool {
        (TestId::Cas.index()..=TestId::FaiOnInvalid.index()).contains(&self.index())
            || self == TestId::CasUntilSuccess
    }
}

impl TryFrom<usize> for TestId {
    type Error = ConfigError;

    fn try_from(id: usize) -> Result<Self, Self::Error> {
        Self::ALL.get(id).copied().ok_or(ConfigError::UnknownTest(id))
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
