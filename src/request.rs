//! Per-request handle (`spec.md` §4.5, §4.9). Grounded on the reference
//! crate's `server::RequestContext`, with method/URI/headers promoted
//! into the connection's `Region` instead of borrowing the read buffer,
//! and a body driven by `BodyStream` instead of a blocking `BodyReader`.

use std::sync::Arc;

use crate::body::BodyStream;
use crate::context::Context;
use crate::http::{Headers, Method, RequestUri};
use crate::middleware::SpawnPool;
use crate::parser::Head;
use crate::region::Region;

/// A single `(name, value)` route parameter capture, e.g. `:id` in
/// `/users/:id`. Values are region-owned copies of the matched path
/// segment, independent of the connection's read buffer.
pub struct RouteParam<'r> {
    pub name: String,
    pub value: &'r str,
}

pub struct Req<'r> {
    pub method: Method,
    uri_full: &'r str,
    uri_path_start: usize,
    uri_path_end: usize,
    headers: Headers<'r>,
    params: Vec<RouteParam<'r>>,
    pub http_version: u8,
    body: BodyStream,
    chain_cursor: usize,
    spawn_pool: Arc<SpawnPool>,
    context: Context,
}

impl<'r> Req<'r> {
    pub fn from_head(
        head: &Head,
        region: &'r Region,
        params: Vec<(String, &str)>,
        body: BodyStream,
        spawn_pool: Arc<SpawnPool>,
    ) -> Self {
        let uri_full: &'r str = region.strdup(&head.uri_full);
        let mut headers = Headers::new_nodate();
        for (name, value) in &head.header_lines {
            let name: &'r str = region.strdup(name);
            let value: &'r [u8] = region.memdup(value);
            headers.add(name, value);
        }
        let params = params
            .into_iter()
            .map(|(name, value)| RouteParam {
                name,
                value: region.strdup(value),
            })
            .collect();

        Req {
            method: head.method.clone(),
            uri_full,
            uri_path_start: head.uri_path_start,
            uri_path_end: head.uri_path_end,
            headers,
            params,
            http_version: head.http_version,
            body,
            chain_cursor: 0,
            spawn_pool,
            context: Context::new(),
        }
    }

    /// Typed extension storage a middleware uses to pass data to
    /// downstream middleware and the terminal handler (`spec.md` §4.5).
    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn uri(&self) -> RequestUri<'r> {
        RequestUri::new(self.uri_full, self.uri_path_start, self.uri_path_end)
    }

    pub fn headers(&self) -> &Headers<'r> {
        &self.headers
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rev()
            .find(|p| p.name == name)
            .map(|p| p.value)
    }

    pub fn body(&mut self) -> &mut BodyStream {
        &mut self.body
    }

    pub(crate) fn reset_chain_cursor(&mut self) {
        self.chain_cursor = 0;
    }

    pub(crate) fn take_chain_cursor(&mut self) -> usize {
        let idx = self.chain_cursor;
        self.chain_cursor += 1;
        idx
    }

    /// Runs `work_fn` on the background spawn pool, blocking this
    /// connection's thread until it completes, then invokes `done_fn`
    /// inline with the result (`spec.md` §4.5). Because the calling
    /// thread is the same one that owns this `Req`/`Res`/`Region` for
    /// the life of the request, `done_fn` may freely call
    /// `Chain::next` to continue the middleware chain.
    pub fn spawn<T, F, D>(&mut self, res: &mut crate::response::Res<'r>, work_fn: F, done_fn: D)
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
        D: FnOnce(&mut Req<'r>, &mut crate::response::Res<'r>, T),
    {
        let result = self.spawn_pool.run(work_fn);
        done_fn(self, res, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserLimits;

    fn sample_head() -> Head {
        let limits = ParserLimits::default();
        let mut ctx = crate::parser::ParserContext::new(limits);
        match ctx
            .feed(b"GET /users/42?x=1 HTTP/1.1\r\nhost: example\r\n\r\n")
            .unwrap()
        {
            crate::parser::ParseOutcome::HeadComplete { head, .. } => head,
            _ => panic!("expected head"),
        }
    }

    #[test]
    fn promotes_head_fields_into_region() {
        let region = Region::new(4096);
        let head = sample_head();
        let req = Req::from_head(
            &head,
            &region,
            vec![("id".to_string(), "42")],
            BodyStream::new_empty(),
            Arc::new(SpawnPool::new(1)),
        );
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.uri().path(), "/users/42");
        assert_eq!(req.uri().query(), Some("x=1"));
        assert_eq!(req.param("id"), Some("42"));
        assert_eq!(req.headers().get("host"), Some(&b"example"[..]));
    }

    #[test]
    fn chain_cursor_advances_and_resets() {
        let region = Region::new(4096);
        let head = sample_head();
        let mut req = Req::from_head(
            &head,
            &region,
            Vec::new(),
            BodyStream::new_empty(),
            Arc::new(SpawnPool::new(1)),
        );
        assert_eq!(req.take_chain_cursor(), 0);
        assert_eq!(req.take_chain_cursor(), 1);
        req.reset_chain_cursor();
        assert_eq!(req.take_chain_cursor(), 0);
    }
}
