//! Stub registry.
//!
//! Readers take a lock-free snapshot of the stub list and scan it in
//! priority order. Writers serialize on a mutex and publish a new snapshot.

use super::core::Stub;
use crate::error::StubError;
use crate::format::format_request;
use crate::request::CapturedRequest;
use arc_swap::{ArcSwap, Guard};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

type Stubs = Vec<Arc<Stub>>;

/// Stubs kept sorted by `(priority, creation_order)`.
///
/// Reads are lock-free snapshots. Writes swap in a new list with a
/// compare-and-swap retry loop. `find_matching_stub` holds an async lock for
/// the whole scan-count-remove step, so a remove-after-match stub is handed
/// to at most one request.
pub struct StubRegistry {
    stubs: ArcSwap<Stubs>,
    find_lock: Mutex<()>,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self {
            stubs: ArcSwap::from_pointee(Vec::new()),
            find_lock: Mutex::new(()),
        }
    }

    /// Inserts at the sorted position.
    pub fn add(&self, stub: Arc<Stub>) -> Result<(), StubError> {
        let key = stub.ordering_key();
        self.update(|current| {
            let index = match current.binary_search_by(|s| s.ordering_key().cmp(&key)) {
                Ok(_) => return Err(StubError::Duplicate(stub.log_string())),
                Err(index) => index,
            };
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend_from_slice(&current[..index]);
            next.push(Arc::clone(&stub));
            next.extend_from_slice(&current[index..]);
            Ok(Some(next))
        })?;
        Ok(())
    }

    /// Removes this exact stub. Returns false if it was not registered.
    pub fn remove(&self, stub: &Arc<Stub>) -> bool {
        let result = self.update(|current| {
            let Some(index) = current.iter().position(|s| Arc::ptr_eq(s, stub)) else {
                return Ok::<_, Infallible>(None);
            };
            let mut next = current.to_vec();
            next.remove(index);
            Ok(Some(next))
        });
        match result {
            Ok(removed) => removed,
            Err(never) => match never {},
        }
    }

    /// First stub in order whose specification matches, after counting the
    /// match and, for remove-after-match stubs, unregistering it.
    ///
    /// A matcher that fails is treated as a non-match for that stub.
    pub async fn find_matching_stub(
        &self,
        request: &CapturedRequest,
        verbose: bool,
    ) -> Option<Arc<Stub>> {
        let formatted = if verbose {
            format_request(request)
        } else {
            String::new()
        };

        let _guard = self.find_lock.lock().await;
        let snapshot = self.stubs.load_full();

        let mut matched = None;
        for stub in snapshot.iter() {
            match stub.specification().matches(request).await {
                Ok(true) => {
                    matched = Some(Arc::clone(stub));
                    break;
                }
                Ok(false) => {}
                Err(e) => {
                    if verbose {
                        warn!(
                            "Failed to evaluate condition for stub: {}. Request: {}. Cause: {}",
                            stub.log_string(),
                            formatted,
                            e
                        );
                    }
                }
            }
        }

        let stub = matched?;
        stub.increment_match_count();
        if stub.configuration().remove_after_match {
            self.remove(&stub);
            if verbose {
                debug!("Removed used stub: {}", stub.log_string());
            }
        }
        Some(stub)
    }

    /// Point-in-time view in match order.
    pub fn get_all(&self) -> Arc<Stubs> {
        self.stubs.load_full()
    }

    pub fn len(&self) -> usize {
        self.stubs.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.load().is_empty()
    }

    pub fn clear(&self) {
        self.stubs.store(Arc::new(Vec::new()));
    }

    pub fn reset_match_counts(&self) {
        for stub in self.stubs.load().iter() {
            stub.reset_match_count();
        }
    }

    /// Copy-on-write update; `step` returns `Ok(None)` to leave the list
    /// untouched. Retries until no concurrent writer intervened.
    fn update<E>(
        &self,
        mut step: impl FnMut(&[Arc<Stub>]) -> Result<Option<Stubs>, E>,
    ) -> Result<bool, E> {
        let mut current = self.stubs.load_full();
        loop {
            let Some(next) = step(&current)? else {
                return Ok(false);
            };
            let previous = self.stubs.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&*previous, &current) {
                return Ok(true);
            }
            current = Guard::into_inner(previous);
        }
    }
}

impl Default for StubRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestSpecification;
    use crate::response::ResponseDefinition;
    use crate::stub::{respond_with, StubConfiguration};
    use hyper::{HeaderMap, Method, Uri};
    use tracing_test::traced_test;

    fn stub(name: &str, path: &str, priority: Option<i32>) -> Arc<Stub> {
        let mut spec = RequestSpecification::text().path(path);
        if let Some(priority) = priority {
            spec = spec.priority(priority);
        }
        let body = name.to_string();
        Arc::new(Stub::new(
            StubConfiguration::named(name),
            spec.build(),
            respond_with(move |_| ResponseDefinition::text(body.clone())),
        ))
    }

    fn get(path: &'static str) -> CapturedRequest {
        CapturedRequest::from_parts(Method::GET, Uri::from_static(path), HeaderMap::new(), "")
    }

    fn names(registry: &StubRegistry) -> Vec<String> {
        registry
            .get_all()
            .iter()
            .map(|s| s.configuration().name.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_kept_sorted_by_priority_then_age() {
        let registry = StubRegistry::new();
        registry.add(stub("default", "/a", None)).unwrap();
        registry.add(stub("p5-old", "/a", Some(5))).unwrap();
        registry.add(stub("p1", "/a", Some(1))).unwrap();
        registry.add(stub("p5-new", "/a", Some(5))).unwrap();

        assert_eq!(names(&registry), vec!["p1", "p5-old", "p5-new", "default"]);
    }

    #[tokio::test]
    async fn test_lower_priority_number_wins_in_either_registration_order() {
        for (first, second) in [(1, 2), (2, 1)] {
            let registry = StubRegistry::new();
            registry
                .add(stub(&format!("p{first}"), "/same", Some(first)))
                .unwrap();
            registry
                .add(stub(&format!("p{second}"), "/same", Some(second)))
                .unwrap();

            let found = registry.find_matching_stub(&get("/same"), false).await.unwrap();
            assert_eq!(found.configuration().name.as_deref(), Some("p1"));
            assert_eq!(found.match_count(), 1);
        }
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = StubRegistry::new();
        let s = stub("once", "/a", None);
        registry.add(s.clone()).unwrap();

        let err = registry.add(s).unwrap_err();
        assert!(err.to_string().starts_with("Duplicate stub detected: Stub('once')"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = StubRegistry::new();
        let s = stub("gone", "/a", None);
        registry.add(s.clone()).unwrap();

        assert!(registry.remove(&s));
        assert!(!registry.remove(&s));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_isolated_from_later_changes() {
        let registry = StubRegistry::new();
        registry.add(stub("a", "/a", None)).unwrap();
        let snapshot = registry.get_all();
        registry.add(stub("b", "/b", None)).unwrap();
        registry.clear();

        assert_eq!(snapshot.len(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_lowest_priority_wins_and_counts() {
        let registry = StubRegistry::new();
        let loose = stub("loose", "/ping", Some(10));
        let tight = stub("tight", "/ping", Some(1));
        registry.add(loose.clone()).unwrap();
        registry.add(tight.clone()).unwrap();

        let found = registry.find_matching_stub(&get("/ping"), false).await.unwrap();
        assert!(Arc::ptr_eq(&found, &tight));
        assert_eq!(tight.match_count(), 1);
        assert_eq!(loose.match_count(), 0);
        assert!(registry.find_matching_stub(&get("/other"), false).await.is_none());
    }

    #[tokio::test]
    async fn test_equal_priority_older_wins() {
        let registry = StubRegistry::new();
        let older = stub("older", "/x", None);
        let newer = stub("newer", "/x", None);
        registry.add(newer.clone()).unwrap();
        registry.add(older.clone()).unwrap();

        // `older` was constructed first, regardless of registration order.
        let found = registry.find_matching_stub(&get("/x"), false).await.unwrap();
        assert!(Arc::ptr_eq(&found, &older));
    }

    #[tokio::test]
    async fn test_remove_after_match_used_once() {
        let registry = StubRegistry::new();
        let once = Arc::new(Stub::new(
            StubConfiguration::named("once").remove_after_match(true),
            RequestSpecification::text().path("/once").build(),
            respond_with(|_| ResponseDefinition::text("1")),
        ));
        registry.add(once.clone()).unwrap();

        assert!(registry.find_matching_stub(&get("/once"), false).await.is_some());
        assert!(registry.find_matching_stub(&get("/once"), false).await.is_none());
        assert_eq!(once.match_count(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_remove_after_match_under_contention() {
        let registry = Arc::new(StubRegistry::new());
        registry
            .add(Arc::new(Stub::new(
                StubConfiguration::default().remove_after_match(true),
                RequestSpecification::text().path("/race").build(),
                respond_with(|_| ResponseDefinition::text("won")),
            )))
            .unwrap();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.find_matching_stub(&get("/race"), false).await.is_some()
            }));
        }
        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_all_land_sorted() {
        let registry = Arc::new(StubRegistry::new());
        let mut tasks = Vec::new();
        for i in 0..8 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                for j in 0..25 {
                    registry
                        .add(stub(&format!("s{i}-{j}"), "/x", Some((i * j) % 7)))
                        .unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let all = registry.get_all();
        assert_eq!(all.len(), 200);
        assert!(all
            .windows(2)
            .all(|pair| pair[0].ordering_key() < pair[1].ordering_key()));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failing_matcher_skipped_and_logged_when_verbose() {
        let registry = StubRegistry::new();
        registry
            .add(Arc::new(Stub::new(
                StubConfiguration::named("broken"),
                RequestSpecification::text()
                    .priority(1)
                    .body("explodes", |_: &String| panic!("kaboom"))
                    .build(),
                respond_with(|_| ResponseDefinition::text("never")),
            )))
            .unwrap();
        let fallback = stub("fallback", "/x", None);
        registry.add(fallback.clone()).unwrap();

        let found = registry.find_matching_stub(&get("/x"), true).await.unwrap();
        assert!(Arc::ptr_eq(&found, &fallback));
        assert!(logs_contain("Failed to evaluate condition for stub: Stub('broken')"));
    }

    #[tokio::test]
    async fn test_reset_match_counts() {
        let registry = StubRegistry::new();
        let s = stub("counted", "/c", None);
        registry.add(s.clone()).unwrap();
        registry.find_matching_stub(&get("/c"), false).await;
        registry.find_matching_stub(&get("/c"), false).await;
        assert_eq!(s.match_count(), 2);

        registry.reset_match_counts();
        assert_eq!(s.match_count(), 0);
    }
}
