use crate::error::BoxError;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

type DecodeFn<P> = dyn Fn(&[u8]) -> Result<P, BoxError> + Send + Sync;

/// Turns raw request body bytes into the payload type body matchers inspect.
pub struct BodyDecoder<P> {
    name: &'static str,
    decode: Arc<DecodeFn<P>>,
}

impl<P> BodyDecoder<P> {
    pub fn new<F>(name: &'static str, decode: F) -> Self
    where
        F: Fn(&[u8]) -> Result<P, BoxError> + Send + Sync + 'static,
    {
        Self {
            name,
            decode: Arc::new(decode),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<P, BoxError> {
        (self.decode)(bytes)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<P: DeserializeOwned + 'static> BodyDecoder<P> {
    pub fn json() -> Self {
        Self::new("json", |bytes| Ok(serde_json::from_slice(bytes)?))
    }
}

impl BodyDecoder<String> {
    /// UTF-8 text; invalid sequences are replaced rather than rejected.
    pub fn text() -> Self {
        Self::new("text", |bytes| Ok(String::from_utf8_lossy(bytes).into_owned()))
    }
}

impl<P> Clone for BodyDecoder<P> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            decode: Arc::clone(&self.decode),
        }
    }
}

impl<P> fmt::Debug for BodyDecoder<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BodyDecoder").field(&self.name).finish()
    }
}
