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

//! The size accountant (component C2): a single running total, updated on
//! every commit and removal. `size_of` is required to be non-negative and
//! deterministic; a violation is a programmer error and panics rather than
//! being reported through a `Result`.

/// Running total of `size_of(k, v)` over every entry currently committed.
#[derive(Debug, Default)]
pub struct SizeAccountant {
    total: i64,
}

impl SizeAccountant {
    pub fn total(&self) -> i64 {
        self.total
    }

    /// Accounts for a brand-new entry.
    pub fn insert(&mut self, size: i64) {
        assert!(size >= 0, "size_of must be non-negative, got {size}");
        self.total += size;
    }

    /// Accounts for replacing an existing entry's size with a new one.
    pub fn replace(&mut self, old_size: i64, new_size: i64) {
        assert!(new_size >= 0, "size_of must be non-negative, got {new_size}");
        self.total = self.total - old_size + new_size;
        assert!(
            self.total >= 0,
            "size accounting went negative after replace; size_of must be deterministic"
        );
    }

    /// Accounts for removing an entry.
    pub fn remove(&mut self, size: i64) {
        self.total -= size;
        assert!(
            self.total >= 0,
            "size accounting went negative after remove; size_of must be deterministic"
        );
    }

    /// Checked at quiescent points: zero iff empty, never negative. Runs
    /// under plain `debug_assert!` by default; with the `strict_assertions`
    /// feature it also runs in release builds, for callers who would rather
    /// pay the check than risk silent drift in a long-lived cache.
    pub fn assert_consistent(&self, is_empty: bool) {
        #[cfg(feature = "strict_assertions")]
        {
            assert!(self.total >= 0, "size accountant went negative");
            assert_eq!(
                is_empty,
                self.total == 0,
                "size must be zero exactly when the map is empty"
            );
        }
        #[cfg(not(feature = "strict_assertions"))]
        {
            debug_assert!(self.total >= 0, "size accountant went negative");
            debug_assert_eq!(
                is_empty,
                self.total == 0,
                "size must be zero exactly when the map is empty"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_remove_round_trip() {
        let mut a = SizeAccountant::default();
        a.insert(3);
        a.insert(4);
        assert_eq!(a.total(), 7);
        a.remove(3);
        assert_eq!(a.total(), 4);
        a.remove(4);
        assert_eq!(a.total(), 0);
        a.assert_consistent(true);
    }

    #[test]
    fn test_replace_adjusts_delta() {
        let mut a = SizeAccountant::default();
        a.insert(5);
        a.replace(5, 9);
        assert_eq!(a.total(), 9);
    }

    #[test]
    #[should_panic(expected = "non-negative")]
    fn test_negative_size_panics() {
        let mut a = SizeAccountant::default();
        a.insert(-1);
    }
}
