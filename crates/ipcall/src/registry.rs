//! Namespaced method registry.
//!
//! Handlers live at the leaves of a tree of named namespaces and are
//! addressed by dot-delimited method names (`"math.double"`). Resolution is
//! a pure iterative walk over the segments; there is no partial or fallback
//! matching, and lookups are case-sensitive. Arity is not validated here —
//! a handler that dislikes its arguments fails at execution time.

use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;

/// A registered method implementation.
///
/// Handlers come in two flavors mirroring the two result disciplines the
/// dispatch engine supports: [`Handler::sync`] returns its value directly,
/// [`Handler::deferred`] returns a future the engine awaits before writing
/// the response.
pub enum Handler {
    Sync(Box<dyn Fn(Vec<Value>) -> anyhow::Result<Value> + Send + Sync>),
    Deferred(Box<dyn Fn(Vec<Value>) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>),
}

impl Handler {
    /// Wrap a synchronous function as a handler.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Handler::Sync(Box::new(f))
    }

    /// Wrap an async function as a handler; the dispatch engine awaits its
    /// settlement without blocking other connections.
    pub fn deferred<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Handler::Deferred(Box::new(move |params| Box::pin(f(params))))
    }

    /// Invoke the handler with positional arguments.
    pub async fn invoke(&self, params: Vec<Value>) -> anyhow::Result<Value> {
        match self {
            Handler::Sync(f) => f(params),
            Handler::Deferred(f) => f(params).await,
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Handler::Sync(_) => f.write_str("Handler::Sync"),
            Handler::Deferred(_) => f.write_str("Handler::Deferred"),
        }
    }
}

#[derive(Debug)]
enum Node {
    Namespace(HashMap<String, Node>),
    Method(Handler),
}

/// A tree of namespaced handlers, supplied at server construction.
///
/// # Example
///
/// ```
/// use ipcall::registry::{Handler, Methods};
/// use serde_json::json;
///
/// let methods = Methods::new().namespace(
///     "math",
///     Methods::new().handler("double", Handler::sync(|params| {
///         let n = params.first().and_then(|v| v.as_i64()).unwrap_or(0);
///         Ok(json!(n * 2))
///     })),
/// );
/// ```
#[derive(Debug, Default)]
pub struct Methods {
    nodes: HashMap<String, Node>,
}

impl Methods {
    /// Create an empty registry level.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `name` at this level.
    pub fn handler(mut self, name: impl Into<String>, handler: Handler) -> Self {
        self.nodes.insert(name.into(), Node::Method(handler));
        self
    }

    /// Register a nested namespace under `name` at this level.
    pub fn namespace(mut self, name: impl Into<String>, methods: Methods) -> Self {
        self.nodes
            .insert(name.into(), Node::Namespace(methods.nodes));
        self
    }

    /// Whether no handlers or namespaces are registered at this level.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Resolve a dot-delimited method name against the registry.
///
/// Returns `None` when the name is empty, when the full dotted name appears
/// in the exclusion set, or when any segment fails to resolve while walking
/// the tree.
pub fn resolve<'a>(
    methods: &'a Methods,
    excluded: &HashSet<String>,
    name: &str,
) -> Option<&'a Handler> {
    if name.is_empty() || excluded.contains(name) {
        return None;
    }

    let mut scope = Some(&methods.nodes);
    let mut resolved: Option<&Node> = None;

    for segment in name.split('.') {
        let node = scope?.get(segment)?;
        scope = match node {
            Node::Namespace(children) => Some(children),
            Node::Method(_) => None,
        };
        resolved = Some(node);
    }

    match resolved {
        Some(Node::Method(handler)) => Some(handler),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_methods() -> Methods {
        Methods::new()
            .handler("ping", Handler::sync(|_| Ok(json!("pong"))))
            .namespace(
                "math",
                Methods::new()
                    .handler(
                        "double",
                        Handler::sync(|params| {
                            let n = params.first().and_then(|v| v.as_i64()).unwrap_or(0);
                            Ok(json!(n * 2))
                        }),
                    )
                    .namespace(
                        "advanced",
                        Methods::new().handler("identity", Handler::sync(|params| {
                            Ok(params.into_iter().next().unwrap_or(Value::Null))
                        })),
                    ),
            )
    }

    #[tokio::test]
    async fn test_resolves_top_level_method() {
        let methods = sample_methods();
        let handler = resolve(&methods, &HashSet::new(), "ping").expect("handler");
        assert_eq!(handler.invoke(vec![]).await.unwrap(), json!("pong"));
    }

    #[tokio::test]
    async fn test_resolves_nested_method() {
        let methods = sample_methods();
        let handler = resolve(&methods, &HashSet::new(), "math.double").expect("handler");
        assert_eq!(handler.invoke(vec![json!(21)]).await.unwrap(), json!(42));
    }

    #[tokio::test]
    async fn test_resolves_deeply_nested_method() {
        let methods = sample_methods();
        let handler =
            resolve(&methods, &HashSet::new(), "math.advanced.identity").expect("handler");
        assert_eq!(handler.invoke(vec![json!("x")]).await.unwrap(), json!("x"));
    }

    #[test]
    fn test_empty_name_is_not_found() {
        let methods = sample_methods();
        assert!(resolve(&methods, &HashSet::new(), "").is_none());
    }

    #[test]
    fn test_missing_segment_is_not_found() {
        let methods = sample_methods();
        assert!(resolve(&methods, &HashSet::new(), "math.triple").is_none());
        assert!(resolve(&methods, &HashSet::new(), "physics.double").is_none());
    }

    #[test]
    fn test_namespace_itself_is_not_invocable() {
        let methods = sample_methods();
        assert!(resolve(&methods, &HashSet::new(), "math").is_none());
    }

    #[test]
    fn test_path_through_handler_is_not_found() {
        let methods = sample_methods();
        assert!(resolve(&methods, &HashSet::new(), "ping.extra").is_none());
    }

    #[test]
    fn test_excluded_method_is_not_found() {
        let methods = sample_methods();
        let excluded: HashSet<String> = ["math.double".to_string()].into();
        assert!(resolve(&methods, &excluded, "math.double").is_none());
        // Exclusion is an exact full-name match, not per-segment.
        assert!(resolve(&methods, &excluded, "math.advanced.identity").is_some());
    }

    #[test]
    fn test_resolution_is_case_sensitive() {
        let methods = sample_methods();
        assert!(resolve(&methods, &HashSet::new(), "Math.double").is_none());
        assert!(resolve(&methods, &HashSet::new(), "math.Double").is_none());
    }

    #[tokio::test]
    async fn test_deferred_handler_resolves() {
        let methods = Methods::new().handler(
            "wait",
            Handler::deferred(|params| async move {
                Ok(params.into_iter().next().unwrap_or(Value::Null))
            }),
        );
        let handler = resolve(&methods, &HashSet::new(), "wait").expect("handler");
        assert_eq!(handler.invoke(vec![json!(5)]).await.unwrap(), json!(5));
    }
}
