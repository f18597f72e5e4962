//! Mock cache and the `Mimic` context that publishes it.
//!
//! # Design Decisions
//! - A cache is built whole, off to the side, then published under the write
//!   lock; readers see either the old or the new cache, never a mix
//! - Reconfigurations (load, catcher replacement) are serialised so an index
//!   is always built with the catcher it is published with
//! - Readers hold the read lock for a single map lookup

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use axum::body::Body;
use axum::http::{Request, Response};

use crate::mimic::catcher::{Catcher, JsonCatcher, KeySubject};
use crate::mimic::endpoint::{DocumentFormat, EndpointDefinition, MockDocument};
use crate::mimic::error::{MimicError, MimicResult};
use crate::mimic::form::{self, DEFAULT_MAX_FORM_BYTES};

/// Loaded definitions and their key index.
#[derive(Debug, Default)]
pub struct MockCache {
    definitions: Vec<Arc<EndpointDefinition>>,
    index: HashMap<String, Arc<EndpointDefinition>>,
}

impl MockCache {
    /// Index `definitions` with the catcher's key function.
    pub fn build(
        definitions: Vec<Arc<EndpointDefinition>>,
        catcher: &dyn Catcher,
    ) -> MimicResult<Self> {
        let mut index = HashMap::with_capacity(definitions.len());
        for definition in &definitions {
            let key = catcher.key_of(KeySubject::FromDefinition(definition))?;
            if index.insert(key.clone(), definition.clone()).is_some() {
                tracing::warn!(key = %key, "Duplicate mock key, later definition wins");
            }
        }
        Ok(Self { definitions, index })
    }

    /// Definitions in document order.
    pub fn definitions(&self) -> &[Arc<EndpointDefinition>] {
        &self.definitions
    }

    pub fn lookup(&self, key: &str) -> Option<&Arc<EndpointDefinition>> {
        self.index.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

struct Active {
    catcher: Arc<dyn Catcher>,
    cache: Arc<MockCache>,
}

/// Shared mock engine state: the active catcher and the published cache.
///
/// Construct once, wrap in an `Arc`, and hand it to the middleware and to any
/// code that needs to reconfigure or inspect the mocks.
pub struct Mimic {
    active: RwLock<Active>,
    reconfigure: Mutex<()>,
    max_form_bytes: usize,
}

impl Mimic {
    /// Empty engine with the default [`JsonCatcher`].
    pub fn new() -> Self {
        Self::with_catcher(Arc::new(JsonCatcher))
    }

    /// Empty engine with a custom catcher.
    pub fn with_catcher(catcher: Arc<dyn Catcher>) -> Self {
        Self {
            active: RwLock::new(Active {
                catcher,
                cache: Arc::new(MockCache::default()),
            }),
            reconfigure: Mutex::new(()),
            max_form_bytes: DEFAULT_MAX_FORM_BYTES,
        }
    }

    /// Cap on url-encoded request bodies buffered for matching.
    pub fn with_max_form_bytes(mut self, max_form_bytes: usize) -> Self {
        self.max_form_bytes = max_form_bytes;
        self
    }

    /// Replace the mocks with the document at `path`.
    pub fn load(&self, path: &Path) -> MimicResult<()> {
        let document = MockDocument::from_file(path)?;
        tracing::info!(path = %path.display(), endpoints = document.endpoints.len(), "Mock document read");
        self.load_document(document)
    }

    /// Replace the mocks with an in-memory document.
    pub fn load_str(&self, content: &str, format: DocumentFormat) -> MimicResult<()> {
        self.load_document(MockDocument::parse(content, format)?)
    }

    /// Replace the mocks with an already parsed document.
    pub fn load_document(&self, document: MockDocument) -> MimicResult<()> {
        let _guard = self.reconfigure.lock().unwrap_or_else(PoisonError::into_inner);

        let definitions = document.endpoints.into_iter().map(Arc::new).collect();
        let catcher = self.catcher();
        let cache = MockCache::build(definitions, catcher.as_ref())?;
        for key in cache.keys() {
            tracing::info!(key = %key, "Mock loaded");
        }

        self.write().cache = Arc::new(cache);
        Ok(())
    }

    /// Swap the catcher and re-index the current definitions with it.
    ///
    /// On failure the previous catcher and cache stay active.
    pub fn set_catcher(&self, catcher: Arc<dyn Catcher>) -> MimicResult<()> {
        let _guard = self.reconfigure.lock().unwrap_or_else(PoisonError::into_inner);

        let definitions = self.snapshot().definitions.clone();
        let cache = MockCache::build(definitions, catcher.as_ref())?;
        tracing::info!(catcher = ?catcher, mocks = cache.len(), "Catcher replaced");

        let mut active = self.write();
        active.catcher = catcher;
        active.cache = Arc::new(cache);
        Ok(())
    }

    /// Look a key up in the published cache.
    pub fn get(&self, key: &str) -> MimicResult<Arc<EndpointDefinition>> {
        self.read()
            .cache
            .lookup(key)
            .cloned()
            .ok_or_else(|| MimicError::NotFound(key.to_string()))
    }

    /// The published cache.
    pub fn snapshot(&self) -> Arc<MockCache> {
        self.read().cache.clone()
    }

    /// The active catcher.
    pub fn catcher(&self) -> Arc<dyn Catcher> {
        self.read().catcher.clone()
    }

    /// Match an incoming request, handing the request back for fall-through.
    ///
    /// Unparsable form data counts as a miss.
    pub async fn match_request(
        &self,
        request: Request<Body>,
    ) -> (Request<Body>, Option<Arc<EndpointDefinition>>) {
        let (request, signature) = form::extract(request, self.max_form_bytes).await;
        let found = match signature {
            Ok(signature) => self.catcher().catch(&signature, self),
            Err(e) => {
                tracing::debug!(error = %e, "Request form unparsable, skipping mocks");
                None
            }
        };
        (request, found)
    }

    /// Render an endpoint with the active catcher.
    pub fn render(&self, dest: &mut Response<Body>, endpoint: &EndpointDefinition) -> MimicResult<()> {
        self.catcher().render(dest, endpoint)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Active> {
        self.active.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Active> {
        self.active.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Mimic {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Mimic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let active = self.read();
        f.debug_struct("Mimic")
            .field("catcher", &active.catcher)
            .field("mocks", &active.cache.len())
            .field("max_form_bytes", &self.max_form_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mimic::catcher::XmlCatcher;
    use axum::http::{Method, StatusCode};
    use std::thread;

    const DOC: &str = r#"
endpoints:
  - method: GET
    uri: /ping
    response:
      status: 200
      body: pong
  - method: POST
    uri: /login
    params: pass=x&user=bob
    response:
      status: 201
      headers:
        Content-Type: application/json
      body: '{"ok":true}'
"#;

    fn loaded() -> Mimic {
        let mimic = Mimic::new();
        mimic.load_str(DOC, DocumentFormat::Yaml).unwrap();
        mimic
    }

    /// Catcher whose key function rejects everything.
    #[derive(Debug)]
    struct RefusingCatcher;

    impl Catcher for RefusingCatcher {
        fn key_of(&self, _subject: KeySubject<'_>) -> MimicResult<String> {
            Err(MimicError::Key("unsupported endpoint".into()))
        }

        fn render(&self, _dest: &mut Response<Body>, _e: &EndpointDefinition) -> MimicResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_every_definition_is_reachable_by_its_key() {
        let mimic = loaded();
        let snapshot = mimic.snapshot();
        assert_eq!(snapshot.definitions().len(), 2);

        for definition in snapshot.definitions() {
            let key = JsonCatcher
                .key_of(KeySubject::FromDefinition(definition))
                .unwrap();
            let found = mimic.get(&key).unwrap();
            assert!(Arc::ptr_eq(&found, definition));
        }
    }

    #[test]
    fn test_get_missing_key_is_not_found() {
        let mimic = loaded();
        let err = mimic.get("GET /nope ").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_failed_load_keeps_previous_cache() {
        let mimic = loaded();

        let err = mimic.load_str("endpoints: [ {", DocumentFormat::Yaml).unwrap_err();
        assert!(matches!(err, MimicError::Parse(_)));
        assert_eq!(mimic.snapshot().len(), 2);

        let err = mimic.load(Path::new("/no/such/mocks.yml")).unwrap_err();
        assert!(matches!(err, MimicError::Io(_)));
        assert!(mimic.get("GET /ping ").is_ok());
    }

    #[test]
    fn test_key_error_aborts_catcher_swap() {
        let mimic = loaded();

        let err = mimic.set_catcher(Arc::new(RefusingCatcher)).unwrap_err();
        assert!(matches!(err, MimicError::Key(_)));
        assert!(format!("{:?}", mimic.catcher()).contains("JsonCatcher"));
        assert!(mimic.get("GET /ping ").is_ok());
    }

    #[test]
    fn test_set_catcher_rebuilds_index() {
        let mimic = loaded();
        mimic.set_catcher(Arc::new(XmlCatcher)).unwrap();

        assert!(format!("{:?}", mimic.catcher()).contains("XmlCatcher"));
        assert_eq!(mimic.snapshot().len(), 2);
    }

    #[test]
    fn test_loading_twice_is_idempotent() {
        let mimic = loaded();
        let first: HashMap<String, EndpointDefinition> = mimic
            .snapshot()
            .keys()
            .map(|k| (k.to_string(), (*mimic.get(k).unwrap()).clone()))
            .collect();

        mimic.load_str(DOC, DocumentFormat::Yaml).unwrap();
        let second: HashMap<String, EndpointDefinition> = mimic
            .snapshot()
            .keys()
            .map(|k| (k.to_string(), (*mimic.get(k).unwrap()).clone()))
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_concurrent_loads_publish_whole_caches() {
        let old_doc = (0..50)
            .map(|i| format!("  - {{method: GET, uri: /old/{}, response: {{status: 200}}}}\n", i))
            .collect::<String>();
        let new_doc = (0..50)
            .map(|i| format!("  - {{method: GET, uri: /new/{}, response: {{status: 200}}}}\n", i))
            .collect::<String>();
        let old_doc = format!("endpoints:\n{}", old_doc);
        let new_doc = format!("endpoints:\n{}", new_doc);

        let mimic = Arc::new(Mimic::new());
        mimic.load_str(&old_doc, DocumentFormat::Yaml).unwrap();

        let writer = {
            let mimic = mimic.clone();
            thread::spawn(move || {
                for i in 0..100 {
                    let doc = if i % 2 == 0 { &new_doc } else { &old_doc };
                    mimic.load_str(doc, DocumentFormat::Yaml).unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let mimic = mimic.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        let snapshot = mimic.snapshot();
                        let old = snapshot.keys().filter(|k| k.contains("/old/")).count();
                        let new = snapshot.keys().filter(|k| k.contains("/new/")).count();
                        assert!(
                            (old == 50 && new == 0) || (old == 0 && new == 50),
                            "mixed cache observed: old={} new={}",
                            old,
                            new
                        );
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        // A lookup after the last completed load sees only the final set.
        assert!(mimic.get("GET /old/0 ").is_ok());
        assert!(mimic.get("GET /new/0 ").is_err());
    }

    #[tokio::test]
    async fn test_match_request_hit_and_miss() {
        let mimic = loaded();

        let req = Request::builder()
            .method(Method::POST)
            .uri("/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("user=bob&pass=x"))
            .unwrap();
        let (_, found) = mimic.match_request(req).await;
        let endpoint = found.expect("login mock should match");

        let mut response = Response::new(Body::empty());
        mimic.render(&mut response, &endpoint).unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["content-type"], "application/json");

        let req = Request::builder()
            .method(Method::POST)
            .uri("/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("user=alice&pass=x"))
            .unwrap();
        let (_, found) = mimic.match_request(req).await;
        assert!(found.is_none());

        let req = Request::builder()
            .method(Method::PUT)
            .uri("/ping")
            .body(Body::empty())
            .unwrap();
        let (_, found) = mimic.match_request(req).await;
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_different_path_is_a_miss() {
        let mimic = loaded();

        // Same method and form as the login mock, other path.
        let req = Request::builder()
            .method(Method::POST)
            .uri("/logout")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("user=bob&pass=x"))
            .unwrap();
        let (_, found) = mimic.match_request(req).await;
        assert!(found.is_none());

        let req = Request::builder().uri("/ping/").body(Body::empty()).unwrap();
        let (_, found) = mimic.match_request(req).await;
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_unparsable_form_is_a_miss() {
        let mimic = loaded();
        let req = Request::builder()
            .uri("/ping?bad=%G0")
            .body(Body::empty())
            .unwrap();
        let (_, found) = mimic.match_request(req).await;
        assert!(found.is_none());
    }
}
