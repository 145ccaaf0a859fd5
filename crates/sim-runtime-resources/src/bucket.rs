//! Simulated object storage.
//!
//! A [`Bucket`] is the lifecycle side of the resource (driven by the
//! orchestrator); a [`BucketClient`] is the capability handed to program
//! code. Both share one storage area, allocated in `init` and removed in
//! `cleanup`.
//!
//! Every client call is traced through the resource's [`Traced`] helper, and
//! refused with `InvalidState` unless the bucket is `Ready`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use sim_runtime_common::SimError;
use sim_runtime_core::{Lifecycle, LifecycleHandle, ResourceContext, StorageArea, Traced};

/// Canonical type tag of buckets.
pub const BUCKET_TYPE: &str = "bucket";

/// Bucket configuration from the resource graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BucketProps {
    /// Objects written during `init`, before any client call.
    #[serde(default, rename = "initialObjects", alias = "initial_objects")]
    pub initial_objects: BTreeMap<String, String>,
}

impl BucketProps {
    /// Parse props from the graph. `null` means an empty bucket.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, SimError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone())
            .map_err(|e| SimError::invalid_config(format!("invalid bucket props: {e}")))
    }

    /// Add an initial object.
    #[must_use]
    pub fn with_object(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.initial_objects.insert(key.into(), value.into());
        self
    }
}

/// Options for [`BucketClient::delete`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Fail with `NotFound` if the key is absent.
    pub must_exist: bool,
}

impl DeleteOptions {
    /// Options that require the key to exist.
    pub fn must_exist() -> Self {
        Self { must_exist: true }
    }
}

/// Check that `key` is usable as an object key.
///
/// Keys are opaque: `images/cat.png` is one key in a flat namespace, and
/// backends store it without interpreting the `/`.
pub fn validate_key(key: &str) -> Result<(), SimError> {
    if key.is_empty() {
        return Err(SimError::invalid_key(key, "key must not be empty"));
    }
    if key.contains('\0') {
        return Err(SimError::invalid_key(key, "key must not contain NUL"));
    }
    Ok(())
}

struct BucketInner {
    ctx: ResourceContext,
    initial_objects: BTreeMap<String, String>,
    area: RwLock<Option<Arc<dyn StorageArea>>>,
}

impl BucketInner {
    fn id(&self) -> &str {
        self.ctx.resource_id()
    }

    fn traced(&self) -> &Traced {
        self.ctx.traced()
    }

    fn area(&self) -> Option<Arc<dyn StorageArea>> {
        self.area.read().clone()
    }
}

/// A simulated object-storage bucket.
#[derive(Clone)]
pub struct Bucket {
    inner: Arc<BucketInner>,
}

impl Bucket {
    /// Create a bucket. No storage is allocated until `init`.
    pub fn new(props: BucketProps, ctx: ResourceContext) -> Self {
        Self {
            inner: Arc::new(BucketInner {
                ctx,
                initial_objects: props.initial_objects,
                area: RwLock::new(None),
            }),
        }
    }

    /// A client for program code. Clients are cheap to clone.
    pub fn client(&self) -> BucketClient {
        BucketClient {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Lifecycle handle the orchestrator drives.
    pub fn lifecycle(&self) -> &LifecycleHandle {
        self.inner.ctx.lifecycle()
    }

    /// Location of the storage area, once allocated.
    pub fn location(&self) -> Option<String> {
        self.inner.area().map(|area| area.location())
    }
}

#[async_trait]
impl Lifecycle for Bucket {
    async fn init(&self) -> Result<(), SimError> {
        let inner = &self.inner;
        let area = inner.ctx.backend().allocate(inner.id()).await?;
        *inner.area.write() = Some(Arc::clone(&area));

        for (key, value) in &inner.initial_objects {
            inner
                .traced()
                .trace(format!("Adding object from preflight (key={key})."), async {
                    validate_key(key)?;
                    area.write(key, value.as_bytes()).await
                })
                .await
                .map_err(|e| SimError::initialization_failed(inner.id(), e))?;
        }

        info!(
            resource_id = inner.id(),
            location = %area.location(),
            objects = inner.initial_objects.len(),
            "Bucket initialized"
        );
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), SimError> {
        let area = self.inner.area();
        let Some(area) = area else {
            debug!(resource_id = self.inner.id(), "Bucket has no storage to remove");
            return Ok(());
        };

        area.destroy().await?;
        debug!(resource_id = self.inner.id(), location = %area.location(), "Bucket storage removed");
        Ok(())
    }
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket")
            .field("id", &self.inner.id())
            .field("state", &self.lifecycle().state())
            .field("location", &self.location())
            .finish_non_exhaustive()
    }
}

/// Object-storage operations exposed to program code.
///
/// All operations are async, traced, and safe to call concurrently from
/// cloned clients. Concurrent writes to one key race; the last one wins.
#[derive(Clone)]
pub struct BucketClient {
    inner: Arc<BucketInner>,
}

impl BucketClient {
    /// Id of the bucket.
    pub fn id(&self) -> &str {
        self.inner.id()
    }

    fn ready_area(&self, operation: &str) -> Result<Arc<dyn StorageArea>, SimError> {
        self.inner.ctx.lifecycle().ensure_ready(operation)?;
        self.inner
            .area()
            .ok_or_else(|| SimError::invalid_state(self.id(), "unallocated", operation))
    }

    /// Write `value` under `key`, replacing any previous value.
    pub async fn put(&self, key: &str, value: impl AsRef<[u8]>) -> Result<(), SimError> {
        self.inner
            .traced()
            .trace(format!("Put (key={key})."), async {
                validate_key(key)?;
                let area = self.ready_area("put")?;
                area.write(key, value.as_ref()).await
            })
            .await
    }

    /// Serialize `value` as JSON and write it under `key`.
    pub async fn put_json<T>(&self, key: &str, value: &T) -> Result<(), SimError>
    where
        T: Serialize + ?Sized,
    {
        let bytes = serde_json::to_vec(value)?;
        self.put(key, bytes).await
    }

    /// Read the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the key was never written or has been deleted.
    pub async fn get(&self, key: &str) -> Result<Vec<u8>, SimError> {
        self.inner
            .traced()
            .trace(format!("Get (key={key})."), async {
                validate_key(key)?;
                let area = self.ready_area("get")?;
                area.read(key)
                    .await?
                    .ok_or_else(|| SimError::not_found(self.id(), key))
            })
            .await
    }

    /// Read the value under `key` as UTF-8 text.
    pub async fn get_string(&self, key: &str) -> Result<String, SimError> {
        let bytes = self.get(key).await?;
        String::from_utf8(bytes).map_err(|e| SimError::InvalidValue {
            resource_id: self.id().to_string(),
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Read the value under `key` and deserialize it from JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<T, SimError> {
        let bytes = self.get(key).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Whether `key` is present.
    pub async fn exists(&self, key: &str) -> Result<bool, SimError> {
        self.inner
            .traced()
            .trace(format!("Exists (key={key})."), async {
                validate_key(key)?;
                let area = self.ready_area("exists")?;
                area.contains(key).await
            })
            .await
    }

    /// Keys currently present, optionally only those starting with `prefix`.
    ///
    /// Order is unspecified.
    pub async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, SimError> {
        self.inner
            .traced()
            .trace(format!("List (prefix={}).", prefix.unwrap_or("null")), async {
                let area = self.ready_area("list")?;
                let mut keys = area.list().await?;
                if let Some(prefix) = prefix {
                    keys.retain(|key| key.starts_with(prefix));
                }
                Ok(keys)
            })
            .await
    }

    /// Remove `key`.
    ///
    /// Deleting an absent key succeeds unless `opts.must_exist` is set, in
    /// which case it fails with `NotFound`.
    pub async fn delete(&self, key: &str, opts: DeleteOptions) -> Result<(), SimError> {
        self.inner
            .traced()
            .trace(format!("Delete (key={key})."), async {
                validate_key(key)?;
                let area = self.ready_area("delete")?;
                let removed = area.remove(key).await?;
                if !removed && opts.must_exist {
                    return Err(SimError::not_found(self.id(), key));
                }
                Ok(())
            })
            .await
    }
}

impl fmt::Debug for BucketClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketClient")
            .field("id", &self.id())
            .finish_non_exhaustive()
    }
}
