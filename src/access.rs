//! Single-writer / many-reader access tracking.
//!
//! Each table embeds an `AccessState`. Readers and writers never wait: an
//! entry that would overlap a writer with anyone else fails immediately and
//! the caller reports `Error::AccessConflict`. Guards release on drop.
//!
//! The state also carries a mutation stamp, bumped by every writer that
//! actually changed the table, so that cursors can tell whether the table
//! they walk is still the one they started on.

use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

const WRITER: usize = 1 << (usize::BITS - 1);

#[derive(Debug, Default)]
pub struct AccessState {
    // WRITER bit, or the number of active readers.
    state: AtomicUsize,
    stamp: AtomicU64,
}

/// Why a guarded section could not be entered.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Conflict {
    WriterActive,
    ReadersActive,
}

impl Conflict {
    pub fn describe(self) -> &'static str {
        match self {
            Conflict::WriterActive => "table is being written",
            Conflict::ReadersActive => "table is being read",
        }
    }
}

impl AccessState {
    pub const fn new() -> Self {
        Self {
            state: AtomicUsize::new(0),
            stamp: AtomicU64::new(0),
        }
    }

    /// Enter a read section. Any number may be active at once.
    #[inline]
    pub fn read(&self) -> Result<ReadGuard<'_>, Conflict> {
        let mut cur = self.state.load(Ordering::Relaxed);
        loop {
            if cur & WRITER != 0 {
                return Err(Conflict::WriterActive);
            }
            match self.state.compare_exchange_weak(
                cur,
                cur + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(ReadGuard { owner: self }),
                Err(actual) => cur = actual,
            }
        }
    }

    /// Enter the write section. Fails if anyone else is inside.
    #[inline]
    pub fn write(&self) -> Result<WriteGuard<'_>, Conflict> {
        match self
            .state
            .compare_exchange(0, WRITER, Ordering::Acquire, Ordering::Relaxed)
        {
            Ok(_) => Ok(WriteGuard {
                owner: self,
                mutated: false,
            }),
            Err(actual) if actual & WRITER != 0 => Err(Conflict::WriterActive),
            Err(_) => Err(Conflict::ReadersActive),
        }
    }

    /// Current mutation stamp.
    #[inline]
    pub fn stamp(&self) -> u64 {
        self.stamp.load(Ordering::Acquire)
    }

    pub fn readers(&self) -> usize {
        let s = self.state.load(Ordering::Relaxed);
        if s & WRITER != 0 {
            0
        } else {
            s
        }
    }
}

/// RAII guard returned by `AccessState::read`.
#[derive(Debug)]
pub struct ReadGuard<'a> {
    owner: &'a AccessState,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        let prev = self.owner.state.fetch_sub(1, Ordering::Release);
        debug_assert!(prev & WRITER == 0 && prev > 0);
    }
}

/// RAII guard returned by `AccessState::write`.
#[derive(Debug)]
pub struct WriteGuard<'a> {
    owner: &'a AccessState,
    mutated: bool,
}

impl WriteGuard<'_> {
    /// Record that the table changed under this guard.
    #[inline]
    pub fn mark_mutated(&mut self) {
        self.mutated = true;
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if self.mutated {
            self.owner.stamp.fetch_add(1, Ordering::Release);
        }
        self.owner.state.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_share() {
        let a = AccessState::new();
        let _r1 = a.read().unwrap();
        let _r2 = a.read().unwrap();
        assert_eq!(a.readers(), 2);
    }

    #[test]
    fn writer_excludes_readers_and_writers() {
        let a = AccessState::new();
        let w = a.write().unwrap();
        assert_eq!(a.read().unwrap_err(), Conflict::WriterActive);
        assert_eq!(a.write().unwrap_err(), Conflict::WriterActive);
        drop(w);
        assert!(a.read().is_ok());
    }

    #[test]
    fn reader_blocks_writer_until_dropped() {
        let a = AccessState::new();
        let r = a.read().unwrap();
        assert_eq!(a.write().unwrap_err(), Conflict::ReadersActive);
        drop(r);
        assert_eq!(a.readers(), 0);
        assert!(a.write().is_ok());
    }

    #[test]
    fn stamp_moves_only_on_mutation() {
        let a = AccessState::new();
        drop(a.write().unwrap());
        assert_eq!(a.stamp(), 0);
        let mut w = a.write().unwrap();
        w.mark_mutated();
        drop(w);
        assert_eq!(a.stamp(), 1);
    }
}
