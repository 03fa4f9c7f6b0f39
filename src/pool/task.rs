use tokio::sync::oneshot;

use crate::payload::{RequestPayload, ResponsePayload};

/// One unit of dispatched work: a request plus the private channel its
/// reply goes back on.
///
/// `complete` consumes the task, so a reply is written at most once.
#[derive(Debug)]
pub struct Task {
    request: RequestPayload,
    reply: oneshot::Sender<ResponsePayload>,
}

impl Task {
    /// Create a task and the receiver its reply will arrive on.
    pub fn new(request: RequestPayload) -> (Self, oneshot::Receiver<ResponsePayload>) {
        let (reply, rx) = oneshot::channel();
        (Self { request, reply }, rx)
    }

    pub fn request(&self) -> &RequestPayload {
        &self.request
    }

    /// Deliver the reply. Never blocks; returns `false` if the caller
    /// stopped waiting.
    pub fn complete(self, response: ResponsePayload) -> bool {
        self.reply.send(response).is_ok()
    }
}
