use std::{collections::HashMap, future::Future, pin::Pin};

use bytes::Bytes;
use foldhash::fast::RandomState;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    Payload,
    error::{Error, ErrorKind, Result},
    msg::{Message, MsgFlags, decode_payload, encode_result},
};

type MethodFuture = Pin<Box<dyn Future<Output = Bytes> + Send>>;

pub type Method = Box<dyn Fn(Payload, MsgFlags) -> MethodFuture + Send + Sync>;

/// Maps opaque `"Object.Method"` identifiers to registered handlers and
/// dispatches decoded requests to them.
#[derive(Default)]
pub struct Router {
    methods: HashMap<String, Method, RandomState>,
}

impl Router {
    /// Registers a handler under `name`. The request is decoded in the
    /// codec of the incoming message and the handler's outcome is encoded
    /// back in the same codec.
    pub fn add_method<Req, Rsp, F, Fut>(&mut self, name: impl Into<String>, func: F)
    where
        Req: DeserializeOwned + Send + 'static,
        Rsp: Serialize + Send + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Rsp>> + Send + 'static,
    {
        let method: Method = Box::new(move |payload: Payload, flags: MsgFlags| -> MethodFuture {
            match decode_payload::<Req>(&payload, flags) {
                Ok(req) => {
                    let fut = func(req);
                    Box::pin(async move { encode_result(flags, &fut.await) })
                }
                Err(e) => {
                    let rsp = encode_result::<Rsp>(flags, &Err(e));
                    Box::pin(std::future::ready(rsp))
                }
            }
        });
        self.methods.insert(name.into(), method);
    }

    pub fn method_names(&self) -> impl Iterator<Item = &String> {
        self.methods.keys()
    }

    /// Serves one request and returns the encoded response payload.
    pub async fn dispatch(&self, msg: Message) -> Bytes {
        if let Some(func) = self.methods.get(&msg.meta.method) {
            func(msg.payload, msg.meta.flags).await
        } else {
            let m = format!("method not found: {}", msg.meta.method);
            tracing::error!(m);
            encode_result::<()>(msg.meta.flags, &Err(Error::new(ErrorKind::MethodNotFound, m)))
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("methods", &self.methods.keys())
            .finish()
    }
}
