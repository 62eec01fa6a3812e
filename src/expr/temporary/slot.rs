//! Result slots of temporary expressions

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::tensor::Tensor;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};

/// Where a temporary expression keeps its materialized result
pub trait ResultSlot<T: Element>: Sync {
    /// The destination was supplied by the caller; nothing is ever allocated
    const FORCED: bool;

    /// Storage exists, either pending evaluation or already evaluated
    fn has_storage(&self) -> bool;

    /// Hand freshly allocated storage to the slot
    ///
    /// Ignored when storage already exists.
    fn install(&mut self, storage: Tensor<T>);

    /// Run `apply` on the storage unless a result is already present
    ///
    /// Returns whether `apply` ran.
    fn compute<F>(&mut self, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut Tensor<T>) -> Result<()>;

    /// The evaluated result
    fn get(&self) -> Option<&Tensor<T>>;

    /// Move the slot out, leaving the moved-from slot in a valid state
    fn take(&mut self) -> Self;
}

struct SharedResult<T: Element> {
    pending: Mutex<Option<Tensor<T>>>,
    result: OnceLock<Tensor<T>>,
}

/// Lazily allocated result shared by every copy of an expression
///
/// Cloning the slot (and so the expression holding it) shares one result:
/// whichever copy evaluates first computes it, the others observe it.
/// Evaluation is serialized by the pending lock, so concurrent `evaluate`
/// calls on copies still run `apply` once.
pub struct SharedSlot<T: Element>(Arc<SharedResult<T>>);

impl<T: Element> SharedSlot<T> {
    /// Slot without storage
    pub fn new() -> Self {
        Self(Arc::new(SharedResult {
            pending: Mutex::new(None),
            result: OnceLock::new(),
        }))
    }

    /// Number of expressions sharing this slot
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl<T: Element> Default for SharedSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> Clone for SharedSlot<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: Element> std::fmt::Debug for SharedSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSlot")
            .field("evaluated", &self.0.result.get().is_some())
            .field("shares", &self.share_count())
            .finish()
    }
}

impl<T: Element> ResultSlot<T> for SharedSlot<T> {
    const FORCED: bool = false;

    fn has_storage(&self) -> bool {
        self.0.result.get().is_some() || self.0.pending.lock().is_some()
    }

    fn install(&mut self, storage: Tensor<T>) {
        let mut pending = self.0.pending.lock();
        if pending.is_none() && self.0.result.get().is_none() {
            *pending = Some(storage);
        }
    }

    fn compute<F>(&mut self, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut Tensor<T>) -> Result<()>,
    {
        let mut pending = self.0.pending.lock();
        if self.0.result.get().is_some() {
            return Ok(false);
        }
        let mut out = pending
            .take()
            .ok_or_else(|| Error::Internal("temporary evaluated without storage".into()))?;
        if let Err(e) = apply(&mut out) {
            *pending = Some(out);
            return Err(e);
        }
        if self.0.result.set(out).is_err() {
            return Err(Error::Internal("temporary result set twice".into()));
        }
        Ok(true)
    }

    fn get(&self) -> Option<&Tensor<T>> {
        self.0.result.get()
    }

    fn take(&mut self) -> Self {
        self.clone()
    }
}

/// Caller-supplied destination a temporary writes into
pub struct ForcedSlot<'d, T: Element> {
    dest: Option<&'d mut Tensor<T>>,
    evaluated: bool,
}

impl<'d, T: Element> ForcedSlot<'d, T> {
    /// Slot writing into `dest`
    pub fn new(dest: &'d mut Tensor<T>) -> Self {
        Self {
            dest: Some(dest),
            evaluated: false,
        }
    }
}

impl<T: Element> std::fmt::Debug for ForcedSlot<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForcedSlot")
            .field("dest", &self.dest)
            .field("evaluated", &self.evaluated)
            .finish()
    }
}

impl<T: Element> ResultSlot<T> for ForcedSlot<'_, T> {
    const FORCED: bool = true;

    fn has_storage(&self) -> bool {
        self.dest.is_some()
    }

    fn install(&mut self, _storage: Tensor<T>) {}

    fn compute<F>(&mut self, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut Tensor<T>) -> Result<()>,
    {
        if self.evaluated {
            return Ok(false);
        }
        let dest = self
            .dest
            .as_deref_mut()
            .ok_or_else(|| Error::Internal("forced temporary has been moved out".into()))?;
        apply(dest)?;
        self.evaluated = true;
        Ok(true)
    }

    fn get(&self) -> Option<&Tensor<T>> {
        self.dest.as_deref().filter(|_| self.evaluated)
    }

    fn take(&mut self) -> Self {
        Self {
            dest: self.dest.take(),
            evaluated: std::mem::replace(&mut self.evaluated, false),
        }
    }
}
