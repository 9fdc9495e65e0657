//! Request dispatch: method+pattern routes with parameters and aspect
//! middleware, filesystem mount points as fallback, then the default
//! handler.

pub mod aspect;
pub mod static_files;

pub use aspect::Aspect;
pub use static_files::MountPoint;

use crate::error::Result;
use crate::http::request::{Method, Request};
use crate::http::response::Response;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

pub type HandlerFuture<'a> = BoxFuture<'a, Result<()>>;

/// An async request handler. Implemented for any
/// `Fn(&mut Request, &mut Response) -> HandlerFuture`, so plain `fn`
/// items and boxed closures both register directly.
pub trait HttpHandler: Send + Sync + 'static {
    fn call<'a>(&'a self, req: &'a mut Request, resp: &'a mut Response) -> HandlerFuture<'a>;
}

impl<F> HttpHandler for F
where
    F: for<'a> Fn(&'a mut Request, &'a mut Response) -> HandlerFuture<'a>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(&'a self, req: &'a mut Request, resp: &'a mut Response) -> HandlerFuture<'a> {
        (self)(req, resp)
    }
}

/// One pattern segment: an exact literal, a `:name` parameter binding a
/// single segment, or a trailing `*` absorbing the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

#[derive(Debug, Clone)]
struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    fn parse(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if s == "*" {
                    Segment::Wildcard
                } else if let Some(name) = s.strip_prefix(':') {
                    Segment::Param(name.to_string())
                } else {
                    Segment::Literal(s.to_string())
                }
            })
            .collect();
        Self { segments }
    }

    /// Matches a decoded path, binding parameters on success.
    fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = HashMap::new();

        let mut i = 0;
        for segment in &self.segments {
            match segment {
                Segment::Wildcard => return Some(params),
                Segment::Literal(lit) => {
                    if parts.get(i) != Some(&lit.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.get(i)?;
                    params.insert(name.clone(), value.to_string());
                }
            }
            i += 1;
        }

        if i == parts.len() {
            Some(params)
        } else {
            None
        }
    }
}

struct Route {
    methods: Vec<Method>,
    pattern: Pattern,
    handler: Arc<dyn HttpHandler>,
    aspects: Vec<Arc<dyn Aspect>>,
}

/// Path-to-handler table. Registration order decides ties; the table is
/// frozen once the server starts accepting.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    mount_points: Vec<MountPoint>,
    default_handler: Option<Arc<dyn HttpHandler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for `pattern` under the given methods.
    pub fn route(
        &mut self,
        methods: &[Method],
        pattern: &str,
        handler: impl HttpHandler,
    ) -> &mut Self {
        self.route_with(methods, pattern, handler, Vec::new())
    }

    /// Registers a handler with an aspect middleware chain.
    pub fn route_with(
        &mut self,
        methods: &[Method],
        pattern: &str,
        handler: impl HttpHandler,
        aspects: Vec<Arc<dyn Aspect>>,
    ) -> &mut Self {
        self.routes.push(Route {
            methods: methods.to_vec(),
            pattern: Pattern::parse(pattern),
            handler: Arc::new(handler),
            aspects,
        });
        self
    }

    /// Handler invoked when nothing else matched.
    pub fn set_default_handler(&mut self, handler: impl HttpHandler) -> &mut Self {
        self.default_handler = Some(Arc::new(handler));
        self
    }

    /// Maps a URL prefix onto a filesystem root, consulted after all
    /// routes have failed to match.
    pub fn set_mount_point(
        &mut self,
        url_prefix: impl Into<String>,
        fs_root: impl Into<PathBuf>,
    ) -> &mut Self {
        self.mount_points.push(MountPoint {
            url_prefix: url_prefix.into(),
            fs_root: fs_root.into(),
        });
        self
    }

    /// Whether anything would answer this method + path. Gates whether
    /// the session reads the request body at all.
    pub fn has_handler(&self, method: Method, path: &str) -> bool {
        if self.default_handler.is_some() {
            return true;
        }
        if self
            .routes
            .iter()
            .any(|r| r.methods.contains(&method) && r.pattern.matches(path).is_some())
        {
            return true;
        }
        self.mount_points.iter().any(|m| m.matches(path))
    }

    fn match_route(&self, method: Method, path: &str) -> Option<(&Route, HashMap<String, String>)> {
        for route in &self.routes {
            if !route.methods.contains(&method) {
                continue;
            }
            if let Some(params) = route.pattern.matches(path) {
                return Some((route, params));
            }
        }
        None
    }

    /// Longest matching mount prefix wins.
    fn match_mount(&self, path: &str) -> Option<&MountPoint> {
        self.mount_points
            .iter()
            .filter(|m| m.matches(path))
            .max_by_key(|m| m.url_prefix.len())
    }

    /// Routes a request to its handler.
    ///
    /// Protocol-level refusals (`404`, `400`, `416`, handler failure)
    /// come back as errors carrying a status; the session turns them
    /// into error pages. Transport errors pass through untouched.
    pub async fn dispatch(&self, req: &mut Request, resp: &mut Response) -> Result<()> {
        if let Some((route, params)) = self.match_route(req.method, &req.path) {
            req.route_params = params;
            return run_chain(route, req, resp).await;
        }

        if let Some(mount) = self.match_mount(&req.path) {
            return static_files::serve(req, resp, mount).await;
        }

        if let Some(handler) = &self.default_handler {
            return handler.call(req, resp).await;
        }

        Err(crate::error::Error::NotFound)
    }
}

/// Runs the aspect chain around the handler: `before` in order with
/// veto, the handler only when nothing vetoed, then `after` in reverse
/// over the aspects whose `before` ran, regardless of handler outcome.
async fn run_chain(route: &Route, req: &mut Request, resp: &mut Response) -> Result<()> {
    let mut ran = 0usize;
    let mut vetoed = false;
    let mut chain_err = None;
    for aspect in &route.aspects {
        match aspect.before(req, resp).await {
            Ok(true) => ran += 1,
            Ok(false) => {
                ran += 1;
                vetoed = true;
                break;
            }
            Err(e) => {
                ran += 1;
                chain_err = Some(e);
                break;
            }
        }
    }

    let outcome = if let Some(e) = chain_err {
        Err(e)
    } else if vetoed {
        Ok(())
    } else {
        route.handler.call(req, resp).await
    };

    for aspect in route.aspects[..ran].iter().rev() {
        if !aspect.after(req, resp) {
            tracing::debug!("aspect after() reported failure");
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_matches_exactly() {
        let p = Pattern::parse("/api/users");
        assert!(p.matches("/api/users").is_some());
        assert!(p.matches("/api/users/42").is_none());
        assert!(p.matches("/api").is_none());
    }

    #[test]
    fn params_bind_segments() {
        let p = Pattern::parse("/users/:id/posts/:post");
        let params = p.matches("/users/7/posts/hello").unwrap();
        assert_eq!(params["id"], "7");
        assert_eq!(params["post"], "hello");
    }

    #[test]
    fn trailing_wildcard_absorbs_rest() {
        let p = Pattern::parse("/files/*");
        assert!(p.matches("/files/a/b/c").is_some());
        assert!(p.matches("/files").is_some());
        assert!(p.matches("/other").is_none());
    }
}
