//  Copyright 2026 The concache Authors
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

//! Eviction policy selection (component C3's policy table). The actual
//! sweep loop lives on [`crate::cache::Cache`], since it needs the chain,
//! the size accountant and the removal listener together; this module
//! only resolves a [`Strategy`] into the chain mode and the two chain
//! ends it uses.

use crate::chain::{ChainMode, End};

/// One of the four pluggable eviction policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Evict the least-recently accessed entry first.
    #[default]
    Lru,
    /// Evict the most-recently accessed entry first.
    Mru,
    /// Evict the oldest-inserted entry first, ignoring access.
    Fifo,
    /// Evict the newest-inserted entry first, ignoring access.
    Filo,
}

impl Strategy {
    pub(crate) fn chain_mode(self) -> ChainMode {
        match self {
            Strategy::Lru | Strategy::Mru => ChainMode::AccessOrder,
            Strategy::Fifo | Strategy::Filo => ChainMode::InsertionOrder,
        }
    }

    /// The chain end eviction removes entries from.
    pub(crate) fn eviction_end(self) -> End {
        match self {
            Strategy::Lru => End::Head,
            Strategy::Mru => End::Tail,
            Strategy::Fifo => End::Head,
            Strategy::Filo => End::Tail,
        }
    }

    /// The chain end `keys()` enumeration starts from — always the end
    /// opposite eviction, i.e. the entries least at risk first.
    pub(crate) fn forward_end(self) -> End {
        self.eviction_end().opposite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eviction_and_forward_ends_are_opposite() {
        for strategy in [Strategy::Lru, Strategy::Mru, Strategy::Fifo, Strategy::Filo] {
            assert_eq!(strategy.forward_end(), strategy.eviction_end().opposite());
        }
    }

    #[test]
    fn test_chain_modes() {
        assert_eq!(Strategy::Lru.chain_mode(), ChainMode::AccessOrder);
        assert_eq!(Strategy::Mru.chain_mode(), ChainMode::AccessOrder);
        assert_eq!(Strategy::Fifo.chain_mode(), ChainMode::InsertionOrder);
        assert_eq!(Strategy::Filo.chain_mode(), ChainMode::InsertionOrder);
    }
}
