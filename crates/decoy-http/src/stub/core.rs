//! Core Stub struct: configuration, request specification and responder.

use super::config::StubConfiguration;
use super::responder::Responder;
use crate::request::{panic_message, CapturedRequest, RequestMatch};
use crate::response::{PlainResponseBuilder, ResponseBody};
use futures::FutureExt;
use hyper::{Response, StatusCode};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::error;

/// Process-wide creation counter; starts at 1.
static NEXT_CREATION_ORDER: AtomicU64 = AtomicU64::new(1);

/// A request specification paired with a responder.
///
/// Stubs order by `(priority, creation_order)`: lower priority first, and
/// among equal priorities the older stub first. Creation order is unique per
/// process, so two distinct stubs never compare equal.
pub struct Stub {
    configuration: StubConfiguration,
    specification: Arc<dyn RequestMatch>,
    responder: Arc<dyn Responder>,
    creation_order: u64,
    match_count: AtomicUsize,
}

impl Stub {
    pub fn new(
        configuration: StubConfiguration,
        specification: impl RequestMatch + 'static,
        responder: impl Responder + 'static,
    ) -> Self {
        Self {
            configuration,
            specification: Arc::new(specification),
            responder: Arc::new(responder),
            creation_order: NEXT_CREATION_ORDER.fetch_add(1, Ordering::Relaxed),
            match_count: AtomicUsize::new(0),
        }
    }

    pub fn configuration(&self) -> &StubConfiguration {
        &self.configuration
    }

    pub fn specification(&self) -> &Arc<dyn RequestMatch> {
        &self.specification
    }

    pub fn priority(&self) -> i32 {
        self.specification.priority()
    }

    pub fn creation_order(&self) -> u64 {
        self.creation_order
    }

    pub fn ordering_key(&self) -> (i32, u64) {
        (self.priority(), self.creation_order)
    }

    pub fn match_count(&self) -> usize {
        self.match_count.load(Ordering::Acquire)
    }

    pub(crate) fn increment_match_count(&self) {
        self.match_count.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn reset_match_count(&self) {
        self.match_count.store(0, Ordering::Release);
    }

    pub fn log_string(&self) -> String {
        match self.configuration.name.as_deref().filter(|n| !n.trim().is_empty()) {
            Some(name) => format!(
                "Stub('{}')[config={} requestSpec={}]",
                name,
                self.configuration,
                self.specification.describe()
            ),
            None => format!(
                "Stub[config={} requestSpec={}]",
                self.configuration,
                self.specification.describe()
            ),
        }
    }

    /// Runs the responder and renders its definition.
    ///
    /// A responder error or a panic while producing the response becomes a
    /// logged 500; the connection stays usable.
    pub async fn respond(&self, request: CapturedRequest, verbose: bool) -> Response<ResponseBody> {
        let rendered = AssertUnwindSafe(async {
            match self.responder.respond(request).await {
                Ok(definition) => Ok(definition.into_response(verbose).await),
                Err(e) => Err(e),
            }
        })
        .catch_unwind()
        .await;

        match rendered {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                error!("Responder failed for {}: {}", self.log_string(), e);
                internal_error(format!("Stub responder failed: {e}"))
            }
            Err(payload) => {
                let message = panic_message(&*payload);
                error!("Responder panicked for {}: {}", self.log_string(), message);
                internal_error(format!("Stub responder panicked: {message}"))
            }
        }
    }
}

fn internal_error(body: String) -> Response<ResponseBody> {
    PlainResponseBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
        .body(body)
        .build()
}

impl fmt::Debug for Stub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stub")
            .field("name", &self.configuration.name)
            .field("priority", &self.priority())
            .field("creation_order", &self.creation_order)
            .field("match_count", &self.match_count())
            .finish()
    }
}
