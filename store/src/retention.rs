use rewards_types::Cycle;

/// How many cycles of states a store keeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Keep the last `stored_cycles` cycles before the one being processed.
    Rolling { stored_cycles: u32 },
    /// Keep everything.
    Archive,
}

impl RetentionPolicy {
    /// States with a cycle below the returned one are due for deletion once
    /// `cycle` has been processed. `None` under [`RetentionPolicy::Archive`].
    pub fn prune_below(&self, cycle: Cycle) -> Option<Cycle> {
        match self {
            Self::Rolling { stored_cycles } => Some(cycle - Cycle::from(*stored_cycles)),
            Self::Archive => None,
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::Rolling { stored_cycles: 20 }
    }
}
