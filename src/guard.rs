//! The one shared handle to the query engine.
//!
//! [`SharedEngine`] owns the live engine behind a single mutex. A logical
//! operation (introspection, a listing, an intersection, a correlation
//! matrix) runs inside one [`SharedEngine::run`] call, so no other request's
//! queries interleave with it and the handle cannot be swapped halfway
//! through. [`SharedEngine::replace`] swaps the whole handle under the same
//! lock when the active dataset set changes.

use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::engine::QueryEngine;
use crate::error::Result;

pub struct SharedEngine {
    handle: Mutex<Box<dyn QueryEngine>>,
}

impl SharedEngine {
    pub fn new<E: QueryEngine + 'static>(engine: E) -> Self {
        Self::from_boxed(Box::new(engine))
    }
    pub fn from_boxed(engine: Box<dyn QueryEngine>) -> Self {
        Self {
            handle: Mutex::new(engine),
        }
    }
    // operations never leave the handle half-mutated, so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, Box<dyn QueryEngine>> {
        self.handle.lock().unwrap_or_else(|poisoned| {
            warn!("engine lock poisoned by a panicked operation, recovering");
            self.handle.clear_poison();
            poisoned.into_inner()
        })
    }
    /// Runs `operation` with exclusive access to the engine for its full duration.
    pub fn run<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&dyn QueryEngine) -> Result<T>,
    {
        let waited = Instant::now();
        let guard = self.lock();
        debug!(wait_ms = waited.elapsed().as_secs_f64() * 1000.0, "engine lock acquired");
        operation(guard.as_ref())
    }
    /// Swaps in a new engine and hands back the previous one.
    pub fn replace(&self, engine: Box<dyn QueryEngine>) -> Result<Box<dyn QueryEngine>> {
        let mut guard = self.lock();
        let previous = std::mem::replace(&mut *guard, engine);
        info!("query engine handle replaced");
        Ok(previous)
    }
}
