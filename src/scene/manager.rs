//! Single-flight construction of instanced objects.

use super::{InstanceRef, SceneObject};
use crate::error::{RenderError, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

type PendingObject = Shared<BoxFuture<'static, std::result::Result<Arc<SceneObject>, Arc<RenderError>>>>;

/// Shares one instanced [`SceneObject`] per key.
///
/// The first caller for a key registers the in-flight construction before
/// awaiting it, so every concurrent caller for that key awaits the same
/// object and receives its own slot on it.
pub struct InstanceManager {
    entries: Mutex<HashMap<String, PendingObject>>,
    capacity: Option<usize>,
}

impl Default for InstanceManager {
    fn default() -> Self {
        Self::new(None)
    }
}

impl InstanceManager {
    /// Objects created here get at most `capacity` live slots each.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// A new instance slot on the object registered under `key`, building it
    /// with `supplier` if no entry exists yet.
    ///
    /// A failed construction is forgotten, so a later call retries it. So is
    /// an object that was disposed after it was registered.
    pub async fn get_or_create<F, Fut>(&self, key: &str, supplier: F) -> Result<InstanceRef>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<SceneObject>>> + Send + 'static,
    {
        let mut supplier = Some(supplier);
        loop {
            let pending = {
                let mut entries = self.entries.lock();
                match entries.get(key) {
                    Some(pending) => pending.clone(),
                    None => {
                        // Only reachable if our own object was disposed before we got a slot.
                        let Some(supplier) = supplier.take() else {
                            return Err(RenderError::Disposed(key.to_string()));
                        };
                        log::debug!("Creating instanced object for {}", key);
                        let capacity = self.capacity;
                        let build = supplier();
                        let pending: PendingObject = async move {
                            let object = build.await?;
                            object.enable_instancing(capacity)?;
                            Ok::<_, RenderError>(object)
                        }
                        .map(|result| result.map_err(Arc::new))
                        .boxed()
                        .shared();
                        entries.insert(key.to_string(), pending.clone());
                        pending
                    }
                }
            };

            let object = match pending.clone().await {
                Ok(object) => object,
                Err(err) => {
                    self.evict(key, &pending);
                    return Err(RenderError::from(err));
                }
            };

            match object.next_instance() {
                Ok(slot) => return Ok(InstanceRef::new(object, slot)),
                Err(RenderError::Disposed(_)) => {
                    log::debug!("Instanced object for {} was disposed, rebuilding", key);
                    self.evict(key, &pending);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn evict(&self, key: &str, pending: &PendingObject) {
        let mut entries = self.entries.lock();
        if entries.get(key).map(|current| current.ptr_eq(pending)).unwrap_or(false) {
            entries.remove(key);
        }
    }

    /// Forget every entry. Objects already handed out are not disposed.
    pub fn reset(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
