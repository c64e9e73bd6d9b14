use crate::error::BoxError;
use crate::request::CapturedRequest;
use crate::response::ResponseDefinition;
use async_trait::async_trait;
use std::future::Future;

/// Produces the response for a request a stub has matched.
///
/// Any async closure `Fn(CapturedRequest) -> Future<Output = Result<..>>`
/// is a responder; `respond_with` wraps plain synchronous closures.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, request: CapturedRequest) -> Result<ResponseDefinition, BoxError>;
}

#[async_trait]
impl<F, Fut> Responder for F
where
    F: Fn(CapturedRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ResponseDefinition, BoxError>> + Send,
{
    async fn respond(&self, request: CapturedRequest) -> Result<ResponseDefinition, BoxError> {
        (self)(request).await
    }
}

/// Responder over a synchronous, infallible closure.
pub struct FnResponder<F>(F);

pub fn respond_with<F, R>(f: F) -> FnResponder<F>
where
    F: Fn(&CapturedRequest) -> R + Send + Sync,
    R: Into<ResponseDefinition>,
{
    FnResponder(f)
}

#[async_trait]
impl<F, R> Responder for FnResponder<F>
where
    F: Fn(&CapturedRequest) -> R + Send + Sync,
    R: Into<ResponseDefinition>,
{
    async fn respond(&self, request: CapturedRequest) -> Result<ResponseDefinition, BoxError> {
        Ok((self.0)(&request).into())
    }
}
