//! Per-request handling: match against the registry, answer, record in the journal.

use crate::error::BoxError;
use crate::format::format_request;
use crate::request::{CapturedRequest, JournalMode, RecordedRequest, RequestJournal};
use crate::response::{PlainResponseBuilder, ResponseBody};
use crate::stub::StubRegistry;
use bytes::Bytes;
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{info, warn};

/// State shared by every connection of one server.
pub struct ServerState {
    registry: StubRegistry,
    journal: RequestJournal,
    verbose: bool,
}

impl ServerState {
    pub fn new(verbose: bool, journal_mode: JournalMode) -> Self {
        Self {
            registry: StubRegistry::new(),
            journal: RequestJournal::new(journal_mode),
            verbose,
        }
    }

    pub fn registry(&self) -> &StubRegistry {
        &self.registry
    }

    pub fn journal(&self) -> &RequestJournal {
        &self.journal
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

/// Serves one request: find and account a stub, journal the outcome, then
/// answer with the stub's response or a 404.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<ServerState>,
) -> Result<Response<ResponseBody>, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let request = CapturedRequest::new(req);
    let matched = state
        .registry
        .find_matching_stub(&request, state.verbose)
        .await;
    let recorded = RecordedRequest::from_captured(&request);

    match matched {
        Some(stub) => {
            let verbose = state.verbose || stub.configuration().verbose;
            if verbose {
                info!(
                    "Request matched: {} by {}\n---\n{}---",
                    recorded,
                    stub.log_string(),
                    format_request(&request)
                );
            }
            state.journal.record_matched(recorded);
            Ok(stub.respond(request, verbose).await)
        }
        None => {
            state.journal.record_unmatched(recorded.clone());
            Ok(no_match(&state, &request, &recorded))
        }
    }
}

fn no_match(
    state: &ServerState,
    request: &CapturedRequest,
    recorded: &RecordedRequest,
) -> Response<ResponseBody> {
    let mut body = format!("No matched mapping for request: {recorded}");
    if state.verbose {
        let catalogue = state
            .registry
            .get_all()
            .iter()
            .map(|stub| stub.log_string())
            .collect::<Vec<_>>()
            .join("\n---\n");
        warn!(
            "No stubs found for the request: {}. Available stubs: {}\n---\n{}---\n{}",
            recorded,
            state.registry().len(),
            format_request(request),
            catalogue
        );
        body.push_str("\n\nAvailable stubs:\n");
        body.push_str(&catalogue);
    } else {
        warn!("No matched mapping for request: {}", recorded);
    }
    PlainResponseBuilder::new(StatusCode::NOT_FOUND)
        .body(body)
        .build()
}
