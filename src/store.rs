use crate::{provider::Labels, Time};

/// Sink for generated samples.
///
/// Not thread-safe. Everything written goes into memory until `flush`, which
/// seals it as one immutable, time-bounded unit and starts a new epoch:
///
/// ```text
/// write, write, ..., flush   -> block 1
/// write, write, ..., flush   -> block 2
/// close
/// ```
///
/// Timestamps passed to `write` must not decrease within an epoch.
pub trait BlockStore {
    fn write(&mut self, time: Time, labels: &Labels, value: f64) -> anyhow::Result<()>;
    fn flush(&mut self) -> anyhow::Result<()>;
    /// Call exactly once.
    fn close(&mut self) -> anyhow::Result<()>;
}
impl<S: BlockStore + ?Sized> BlockStore for &mut S {
    fn write(&mut self, time: Time, labels: &Labels, value: f64) -> anyhow::Result<()> {
        (**self).write(time, labels, value)
    }
    fn flush(&mut self) -> anyhow::Result<()> {
        (**self).flush()
    }
    fn close(&mut self) -> anyhow::Result<()> {
        (**self).close()
    }
}

/// Owns a store and closes it exactly once: explicitly through
/// [`StoreGuard::close`], or on drop if that never happened.
#[derive(Debug)]
pub struct StoreGuard<S: BlockStore> {
    store: Option<S>,
}
impl<S: BlockStore> StoreGuard<S> {
    pub fn new(store: S) -> Self {
        Self { store: Some(store) }
    }

    pub fn close(mut self) -> anyhow::Result<()> {
        match self.store.take() {
            Some(mut store) => store.close(),
            None => Ok(()),
        }
    }
}
impl<S: BlockStore> core::ops::Deref for StoreGuard<S> {
    type Target = S;
    fn deref(&self) -> &S {
        self.store.as_ref().expect("store is present until close")
    }
}
impl<S: BlockStore> core::ops::DerefMut for StoreGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        self.store.as_mut().expect("store is present until close")
    }
}
impl<S: BlockStore> Drop for StoreGuard<S> {
    fn drop(&mut self) {
        let Some(mut store) = self.store.take() else {
            return;
        };
        if let Err(e) = store.close() {
            tracing::warn!(error = %e, "closing store on drop failed");
        }
    }
}
