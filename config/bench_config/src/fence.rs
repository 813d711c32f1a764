use std::fmt;

/// What follows a timed load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadFence {
    #[default]
    None,
    Load,
    Full,
}

/// What follows a timed store. `DoubleWrite` stores to the next line as well instead of fencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreFence {
    #[default]
    None,
    Store,
    Full,
    DoubleWrite,
}

/// The `-e` fence level: one number selecting a (load, store) fence pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FenceLevel {
    pub level: u8,
    pub load: LoadFence,
    pub store: StoreFence,
}

impl FenceLevel {
    pub const MAX_LEVEL: u8 = 9;

    /// Levels outside 0..=9 behave like level 0.
    pub fn new(level: u8) -> Self {
        let (load, store) = match level {
            1 => (LoadFence::Load, StoreFence::Store),
            2 => (LoadFence::Full, StoreFence::Full),
            3 => (LoadFence::Load, StoreFence::None),
            4 => (LoadFence::None, StoreFence::Store),
            5 => (LoadFence::Full, StoreFence::None),
            6 => (LoadFence::None, StoreFence::Full),
            7 => (LoadFence::Full, StoreFence::Store),
            8 => (LoadFence::Load, StoreFence::Full),
            9 => (LoadFence::None, StoreFence::DoubleWrite),
            _ => (LoadFence::None, StoreFence::None),
        };
        Self { level, load, store }
    }
}

impl fmt::Display for LoadFence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoadFence::None => "none",
            LoadFence::Load => "lfence",
            LoadFence::Full => "mfence",
        })
    }
}

impl fmt::Display for StoreFence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreFence::None => "none",
            StoreFence::Store => "sfence",
            StoreFence::Full => "mfence",
            StoreFence::DoubleWrite => "double write",
        })
    }
}

impl fmt::Display for FenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (loads: {}, stores: {})", self.level, self.load, self.store)
    }
}
