use tokio::sync::oneshot;

use crate::{
    error::{Error, ErrorKind, Result},
    msg::Message,
    waiter::WaiterCleaner,
};

/// The receiving end of one pending call.
pub(crate) struct Receiver<'a> {
    rx: oneshot::Receiver<Message>,
    _cleaner: WaiterCleaner<'a>,
}

impl<'a> Receiver<'a> {
    pub(crate) fn new(rx: oneshot::Receiver<Message>, cleaner: WaiterCleaner<'a>) -> Self {
        Self {
            rx,
            _cleaner: cleaner,
        }
    }

    /// Waits for the response. Fails if the connection goes away before
    /// a response is posted.
    pub(crate) async fn recv(self) -> Result<Message> {
        self.rx.await.map_err(|_| {
            Error::new(
                ErrorKind::RecvMsgFailed,
                "connection closed before reply".to_string(),
            )
        })
    }
}
