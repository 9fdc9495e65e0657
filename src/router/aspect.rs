use crate::error::Result;
use crate::http::request::Request;
use crate::http::response::Response;
use async_trait::async_trait;

/// A before/after hook pair wrapped around a route handler.
///
/// `before` runs in registration order and may veto the chain by
/// returning `false`; `after` runs in reverse order over exactly the
/// aspects whose `before` ran, whatever the handler did. An `after`
/// returning `false` is noted but never stops later `after`s.
#[async_trait]
pub trait Aspect: Send + Sync + 'static {
    async fn before(&self, req: &mut Request, resp: &mut Response) -> Result<bool>;

    fn after(&self, _req: &mut Request, _resp: &mut Response) -> bool {
        true
    }
}
