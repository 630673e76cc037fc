//! Per-message orchestrator (`spec.md` §4.7): matches a route, builds
//! `Req`/`Res`, runs the middleware chain, and reports whether the
//! connection should stay open. A free function rather than a method on
//! `Connection` so it can be unit-tested without a live socket.

use std::net::TcpStream;
use std::sync::Arc;

use crate::body::BodyStream;
use crate::http::Status;
use crate::middleware::{MiddlewareInfo, SpawnPool};
use crate::parser::Head;
use crate::region::Region;
use crate::request::Req;
use crate::response::Res;
use crate::router::{Lookup, Router};

pub enum DispatchOutcome {
    Close,
    KeepAlive,
}

/// Runs steps 2-10 of the dispatcher contract. Step 1 (acquiring the
/// region from the pool on exhaustion) happens one level up, in the
/// connection runtime, since it needs to fall back to a region-free
/// 500 path before a `Region` even exists.
pub fn dispatch(
    router: &Router<MiddlewareInfo>,
    head: &Head,
    region: &Region,
    stream: &mut TcpStream,
    body: BodyStream,
    spawn_pool: Arc<SpawnPool>,
) -> DispatchOutcome {
    let path = head.uri().path().to_string();
    let mut res = Res::new(stream);

    match router.find(&head.method, &path) {
        Lookup::NotFound | Lookup::WrongMethod => {
            let _ = res.send(Status::of(404), std::io::empty());
        }
        Lookup::Matched(m) => {
            let mut req = Req::from_head(head, region, m.params, body, spawn_pool);
            m.handler.dispatch(&mut req, &mut res);
        }
    }

    if res.keep_alive() && !head.connection_close {
        DispatchOutcome::KeepAlive
    } else {
        DispatchOutcome::Close
    }
}
