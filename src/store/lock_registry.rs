// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! A registry of per-path exclusive locks.
//!
//! A lock is held for the whole time a store is open, across calls, so it is modelled as a
//! flag guarded by a `Mutex` with a `Condvar` rather than as a `MutexGuard`. Acquiring hands out a
//! [`PathLease`] that releases the lock when dropped, on every exit path.

use crate::SseError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};

#[derive(Debug, Default)]
struct PathLock {
    held: Mutex<bool>,
    released: Condvar,
}

impl PathLock {
    fn acquire(&self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while *held {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *held = true;
    }

    /// Releasing an unheld lock is a no-op.
    fn release(&self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !*held {
            return;
        }
        *held = false;
        self.released.notify_one();
    }

    fn is_held(&self) -> bool {
        *self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Maps storage paths to exclusive locks, created lazily per distinct path.
///
/// Paths are made absolute before lookup, so relative and absolute spellings of one path share a lock.
/// A path's entry is dropped once its last lease is released with nobody waiting, so the registry
/// only tracks paths that are in use.
/// The lock is fully exclusive (not reader/writer) and is process-local: it does not protect
/// against other processes.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Arc<LockMap>,
}

type LockMap = Mutex<HashMap<PathBuf, Arc<PathLock>>>;

static GLOBAL_REGISTRY: OnceLock<LockRegistry> = OnceLock::new();

impl LockRegistry {
    /// Returns a new, empty registry independent of every other registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry used by stores opened without an explicit registry.
    pub fn global() -> &'static LockRegistry {
        GLOBAL_REGISTRY.get_or_init(LockRegistry::new)
    }

    fn lock_for(&self, path: &Path) -> Result<(PathBuf, Arc<PathLock>), SseError> {
        let path = std::path::absolute(path)?;
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = locks.entry(path.clone()).or_default().clone();
        Ok((path, lock))
    }

    /// Blocks until the lock for `path` is free, then takes it.
    pub fn acquire(&self, path: &Path) -> Result<PathLease, SseError> {
        let (path, lock) = self.lock_for(path)?;
        log::debug!("Acquiring path lock -- {:?}", path);
        lock.acquire();
        log::debug!("Acquired path lock -- {:?}", path);
        Ok(PathLease {
            lock,
            path,
            locks: Arc::clone(&self.locks),
        })
    }

    /// Returns `true` if the lock for `path` is currently held.
    pub fn is_held(&self, path: &Path) -> Result<bool, SseError> {
        let path = std::path::absolute(path)?;
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(locks.get(&path).is_some_and(|lock| lock.is_held()))
    }
}

/// Proof of holding the lock for one path. Dropping the lease releases the lock.
#[derive(Debug)]
pub struct PathLease {
    lock: Arc<PathLock>,
    path: PathBuf,
    locks: Arc<LockMap>,
}

impl PathLease {
    /// The (absolute) path this lease locks.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PathLease {
    fn drop(&mut self) {
        log::debug!("Releasing path lock -- {:?}", self.path);
        // Waiters clone the lock under the map mutex, so with the mutex held a count of two
        // (the map and this lease) means nobody else can still want it.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        self.lock.release();
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn lease_releases_on_drop() {
        let registry = LockRegistry::new();
        let path = Path::new("some/store");
        assert!(!registry.is_held(path).unwrap());

        let lease = registry.acquire(path).unwrap();
        assert!(registry.is_held(path).unwrap());
        assert!(lease.path().is_absolute());

        drop(lease);
        assert!(!registry.is_held(path).unwrap());
    }

    #[test]
    fn released_paths_are_forgotten() {
        let registry = LockRegistry::new();
        for i in 0..16 {
            let _lease = registry.acquire(&PathBuf::from(format!("store-{i}"))).unwrap();
        }
        assert!(registry.locks.lock().unwrap().is_empty());

        let path = Path::new("kept/store");
        let lease = registry.acquire(path).unwrap();
        let _other = registry.acquire(Path::new("other/store")).unwrap();
        assert_eq!(registry.locks.lock().unwrap().len(), 2);
        drop(lease);
        assert_eq!(registry.locks.lock().unwrap().len(), 1);
    }

    #[test]
    fn registries_are_independent() {
        let a = LockRegistry::new();
        let b = LockRegistry::new();
        let path = Path::new("shared/store");

        let _lease = a.acquire(path).unwrap();
        assert!(a.is_held(path).unwrap());
        assert!(!b.is_held(path).unwrap());
        let _other = b.acquire(path).unwrap();
    }

    #[test]
    fn relative_and_absolute_paths_share_a_lock() {
        let registry = LockRegistry::new();
        let relative = Path::new("relative/store");
        let absolute = std::path::absolute(relative).unwrap();

        let _lease = registry.acquire(relative).unwrap();
        assert!(registry.is_held(&absolute).unwrap());
    }

    #[test]
    fn second_acquire_blocks_until_release() {
        let registry = Arc::new(LockRegistry::new());
        let path = PathBuf::from("contended/store");
        let lease = registry.acquire(&path).unwrap();

        let (sender, receiver) = mpsc::channel();
        let handle = {
            let registry = Arc::clone(&registry);
            let path = path.clone();
            thread::spawn(move || {
                let _lease = registry.acquire(&path).unwrap();
                sender.send(()).unwrap();
            })
        };

        assert!(receiver.recv_timeout(Duration::from_millis(100)).is_err());
        drop(lease);
        receiver.recv_timeout(Duration::from_secs(10)).unwrap();
        handle.join().unwrap();
        assert!(!registry.is_held(&path).unwrap());
        assert!(registry.locks.lock().unwrap().is_empty());
    }
}
