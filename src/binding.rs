//! Binding - local callbacks the processor may invoke.
//!
//! Callbacks are registered by name and keyed by [`type_id`] of that name,
//! which is also the op code of the callback frame. Arguments and results
//! are MsgPack.
//!
//! # Example
//!
//! ```
//! # async fn run() -> gridwire::Result<()> {
//! use gridwire::binding::Binding;
//! use gridwire::codec::MsgPackCodec;
//!
//! let binding = Binding::new();
//! let id = binding.register("double", |n: i64| async move { Ok(n * 2) })?;
//!
//! let args = MsgPackCodec::encode(&21i64)?;
//! let reply = binding.dispatch(id, &args).await?;
//! assert_eq!(MsgPackCodec::decode::<i64>(&reply)?, 42);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::binary::type_id;
use crate::boundary::BoxFuture;
use crate::codec::MsgPackCodec;
use crate::error::{GridwireError, Result};

/// Fault code sent when no callback is registered for the frame's op code.
pub const FAULT_UNKNOWN_CALLBACK: i32 = 1;

/// Fault code sent when a callback returned an error.
pub const FAULT_CALLBACK_FAILED: i32 = 2;

/// Fault code sent when too many callbacks are already executing.
pub const FAULT_OVERLOADED: i32 = 3;

/// A callback operating on raw MsgPack payloads.
pub trait Callback: Send + Sync + 'static {
    /// Run the callback on an encoded argument, producing an encoded result.
    fn call(&self, data: &[u8]) -> BoxFuture<'static, Result<Vec<u8>>>;
}

/// Wrapper that decodes the argument and encodes the result.
pub struct TypedCallback<F, T, R, Fut> {
    callback: F,
    _phantom: PhantomData<fn(T) -> (R, Fut)>,
}

impl<F, T, R, Fut> TypedCallback<F, T, R, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    /// Wrap a typed callback.
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, R, Fut> Callback for TypedCallback<F, T, R, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    fn call(&self, data: &[u8]) -> BoxFuture<'static, Result<Vec<u8>>> {
        let arg: T = match MsgPackCodec::decode(data) {
            Ok(v) => v,
            Err(e) => return Box::pin(async move { Err(e) }),
        };

        let fut = (self.callback)(arg);
        Box::pin(async move {
            let result = fut.await?;
            MsgPackCodec::encode(&result)
        })
    }
}

struct CallbackEntry {
    name: String,
    callback: Arc<dyn Callback>,
}

/// Registry of named callbacks, shared by the environment and its proxies.
#[derive(Default)]
pub struct Binding {
    callbacks: RwLock<HashMap<i32, CallbackEntry>>,
}

impl Binding {
    /// Create an empty binding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `name` and return its id.
    ///
    /// Registering a name again replaces the previous callback.
    ///
    /// # Errors
    ///
    /// Returns `TypeConflict` if a different name already holds the id.
    pub fn register<F, T, R, Fut>(&self, name: &str, callback: F) -> Result<i32>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let id = type_id(name);
        let mut callbacks = self
            .callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = callbacks.get(&id) {
            if existing.name.to_lowercase() != name.to_lowercase() {
                return Err(GridwireError::TypeConflict {
                    id,
                    name: name.to_string(),
                    existing: existing.name.clone(),
                });
            }
            tracing::debug!("Replacing callback '{}'", name);
        }

        callbacks.insert(
            id,
            CallbackEntry {
                name: name.to_string(),
                callback: Arc::new(TypedCallback::new(callback)),
            },
        );
        Ok(id)
    }

    /// Remove the callback registered under `name`.
    pub fn unregister(&self, name: &str) -> bool {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&type_id(name))
            .is_some()
    }

    /// Check if a callback is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&type_id(name))
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the callback registered under `id` on an encoded argument.
    ///
    /// # Errors
    ///
    /// Returns `CallbackNotFound` for unknown ids, otherwise whatever decoding
    /// the argument or running the callback produced.
    pub fn dispatch(&self, id: i32, data: &[u8]) -> BoxFuture<'static, Result<Vec<u8>>> {
        let callback = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(|entry| entry.callback.clone());

        match callback {
            Some(callback) => callback.call(data),
            None => Box::pin(async move { Err(GridwireError::CallbackNotFound(id)) }),
        }
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let callbacks = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_set()
            .entries(callbacks.values().map(|entry| &entry.name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Event {
        cache: String,
        key: i64,
    }

    #[tokio::test]
    async fn test_dispatch_typed_callback() {
        let binding = Binding::new();
        let id = binding
            .register("on_event", |event: Event| async move {
                Ok(format!("{}:{}", event.cache, event.key))
            })
            .unwrap();

        let args = MsgPackCodec::encode(&Event {
            cache: "orders".to_string(),
            key: 7,
        })
        .unwrap();
        let reply = binding.dispatch(id, &args).await.unwrap();

        assert_eq!(MsgPackCodec::decode::<String>(&reply).unwrap(), "orders:7");
    }

    #[tokio::test]
    async fn test_dispatch_unknown_id() {
        let binding = Binding::new();
        let result = binding.dispatch(5, &[]).await;
        assert!(matches!(result, Err(GridwireError::CallbackNotFound(5))));
    }

    #[tokio::test]
    async fn test_dispatch_bad_argument() {
        let binding = Binding::new();
        let id = binding
            .register("typed", |n: i64| async move { Ok(n) })
            .unwrap();

        let args = MsgPackCodec::encode(&"not a number").unwrap();
        let result = binding.dispatch(id, &args).await;
        assert!(matches!(result, Err(GridwireError::MsgPackDecode(_))));
    }

    #[test]
    fn test_register_replace_and_unregister() {
        let binding = Binding::new();
        binding.register("cb", |n: i32| async move { Ok(n) }).unwrap();
        binding.register("CB", |n: i32| async move { Ok(n + 1) }).unwrap();

        assert_eq!(binding.len(), 1);
        assert!(binding.contains("cb"));
        assert!(binding.unregister("cb"));
        assert!(binding.is_empty());
        assert!(!binding.unregister("cb"));
    }

    #[test]
    fn test_register_conflict() {
        let binding = Binding::new();
        binding.register("1z", |n: i32| async move { Ok(n) }).unwrap();

        let result = binding.register("2[", |n: i32| async move { Ok(n) });
        assert!(matches!(result, Err(GridwireError::TypeConflict { .. })));
    }
}
