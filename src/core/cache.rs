//! Key/value storage abstractions shared by the rate cache and the checkout counter.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

/// A named bucket of raw values. Implementations swallow I/O errors and
/// report them as a miss; callers must treat every read as optional.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn put(&self, key: &str, value: Vec<u8>);
}

/// Reads a JSON value, treating undecodable bytes as absent.
pub async fn get_json<T: DeserializeOwned>(
    collection: &dyn KeyValueCollection,
    key: &str,
) -> Option<T> {
    let bytes = collection.get(key).await?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(key, error = %e, "Discarding undecodable stored value");
            None
        }
    }
}

pub async fn put_json<T: Serialize>(collection: &dyn KeyValueCollection, key: &str, value: &T) {
    match serde_json::to_vec(value) {
        Ok(bytes) => collection.put(key, bytes).await,
        Err(e) => debug!(key, error = %e, "Failed to encode value for store"),
    }
}
