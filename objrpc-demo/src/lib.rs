#![forbid(unsafe_code)]

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use objrpc::Router;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Request(pub String);

/// Builds a router exposing the demo object: `Demo.Echo` returns its
/// argument, `Demo.Greet` greets with a running counter.
#[must_use]
pub fn demo_router() -> Router {
    let counter = Arc::new(AtomicU64::new(0));

    let mut router = Router::default();
    router.add_method("Demo.Echo", |req: Request| async move { Ok(req.0) });
    router.add_method("Demo.Greet", move |req: Request| {
        let counter = counter.clone();
        async move {
            let idx = counter.fetch_add(1, Ordering::AcqRel);
            Ok(format!("hello {}({idx})!", req.0))
        }
    });
    router
}

/// Transport binding selected on the demo command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Transport {
    Stream,
    Http,
}
