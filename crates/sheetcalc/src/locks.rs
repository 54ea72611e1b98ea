//! Per-sheet update locks
//!
//! A request claims every sheet it touches in one step, waiting until none of
//! them is held by another request. Claims are all-or-nothing, so two
//! requests can never each hold a sheet the other is waiting for.

use ahash::AHashSet;
use sheetcalc_core::SheetId;
use std::collections::BTreeSet;
use std::sync::{Condvar, Mutex, PoisonError};
use tracing::trace;

/// Exclusive locks on sheets
#[derive(Debug, Default)]
pub struct SheetLocks {
    /// Sheets currently claimed
    held: Mutex<AHashSet<SheetId>>,
    /// Signalled whenever a claim is released
    released: Condvar,
}

impl SheetLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until every sheet in `sheets` is free, then claim them all
    pub fn acquire(&self, sheets: &BTreeSet<SheetId>) -> SheetGuard<'_> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while sheets.iter().any(|s| held.contains(s)) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.extend(sheets.iter().copied());
        trace!(sheets = ?sheets, "sheet locks acquired");

        SheetGuard {
            locks: self,
            sheets: sheets.clone(),
        }
    }

    /// Check if a sheet is currently claimed
    pub fn is_locked(&self, sheet: SheetId) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&sheet)
    }

    fn release(&self, sheets: &BTreeSet<SheetId>) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        for sheet in sheets {
            held.remove(sheet);
        }
        self.released.notify_all();
    }
}

/// Claimed sheets, released on drop
#[derive(Debug)]
pub struct SheetGuard<'a> {
    locks: &'a SheetLocks,
    sheets: BTreeSet<SheetId>,
}

impl SheetGuard<'_> {
    /// Sheets held by this guard
    pub fn sheets(&self) -> &BTreeSet<SheetId> {
        &self.sheets
    }

    /// Check if the guard holds every sheet in `sheets`
    pub fn covers(&self, sheets: &BTreeSet<SheetId>) -> bool {
        sheets.is_subset(&self.sheets)
    }
}

impl Drop for SheetGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.sheets);
        trace!(sheets = ?self.sheets, "sheet locks released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn sheets(ids: &[u64]) -> BTreeSet<SheetId> {
        ids.iter().map(|id| SheetId(*id)).collect()
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let locks = SheetLocks::new();
        {
            let guard = locks.acquire(&sheets(&[1, 2]));
            assert!(locks.is_locked(SheetId(1)));
            assert!(locks.is_locked(SheetId(2)));
            assert!(guard.covers(&sheets(&[2])));
            assert!(!guard.covers(&sheets(&[2, 3])));
        }
        assert!(!locks.is_locked(SheetId(1)));
        assert!(!locks.is_locked(SheetId(2)));
    }

    #[test]
    fn test_disjoint_sheets_do_not_block() {
        let locks = SheetLocks::new();
        let _a = locks.acquire(&sheets(&[1]));
        let _b = locks.acquire(&sheets(&[2]));
        assert!(locks.is_locked(SheetId(1)));
        assert!(locks.is_locked(SheetId(2)));
    }

    #[test]
    fn test_overlapping_claim_waits() {
        let locks = Arc::new(SheetLocks::new());
        let guard = locks.acquire(&sheets(&[1, 2]));

        let waiter = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                let guard = locks.acquire(&sheets(&[2, 3]));
                guard.sheets().len()
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!locks.is_locked(SheetId(3)));
        drop(guard);

        assert_eq!(waiter.join().unwrap(), 2);
        assert!(!locks.is_locked(SheetId(2)));
    }
}
