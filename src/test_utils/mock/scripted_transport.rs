use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::Transport;
use crate::TransportError;
use crate::TransportRequest;
use crate::TransportResponse;

/// Scripted outcome of one request
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    /// 200 with the JSON encoding of the value
    Value(u64),
    /// Non-2xx response with a text body
    Status(u16, String),
    /// Transport level failure
    Network(String),
}

/// Transport returning sequential integers 0, 1, 2, ... per completed call.
///
/// In held mode every request parks until the test answers it with
/// [`ScriptedTransport::respond`], or until its token fires. Calls and
/// cancellations are counted.
pub(crate) struct ScriptedTransport {
    held: AtomicBool,
    next_value: AtomicU64,
    calls: watch::Sender<usize>,
    cancellations: AtomicUsize,
    script: Mutex<VecDeque<Reply>>,
    parked: Mutex<HashMap<usize, oneshot::Sender<Reply>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    /// Answers every request immediately
    pub(crate) fn new() -> Self {
        let (calls, _) = watch::channel(0);
        Self {
            held: AtomicBool::new(false),
            next_value: AtomicU64::new(0),
            calls,
            cancellations: AtomicUsize::new(0),
            script: Mutex::new(VecDeque::new()),
            parked: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Parks every request until answered
    pub(crate) fn held() -> Self {
        let transport = Self::new();
        transport.held.store(true, Ordering::SeqCst);
        transport
    }

    /// Queues the reply for the next immediately-answered request
    pub(crate) fn push_reply(
        &self,
        reply: Reply,
    ) {
        self.script.lock().push_back(reply);
    }

    /// Answers the parked request with 0-based index `call`.
    /// Returns false if that request is not parked (never made, or cancelled).
    pub(crate) fn respond(
        &self,
        call: usize,
        reply: Reply,
    ) -> bool {
        match self.parked.lock().remove(&call) {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    /// Answers a parked request with the next sequential value
    pub(crate) fn respond_next(
        &self,
        call: usize,
    ) -> bool {
        let value = self.next_value.fetch_add(1, Ordering::SeqCst);
        self.respond(call, Reply::Value(value))
    }

    pub(crate) fn calls(&self) -> usize {
        *self.calls.borrow()
    }

    pub(crate) fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }

    /// Waits until at least `n` requests reached the transport
    pub(crate) async fn wait_for_calls(
        &self,
        n: usize,
    ) {
        let mut rx = self.calls.subscribe();
        let _ = rx.wait_for(|calls| *calls >= n).await;
    }

    fn render(reply: Reply) -> std::result::Result<TransportResponse, TransportError> {
        match reply {
            Reply::Value(value) => Ok(TransportResponse::ok(value.to_string())),
            Reply::Status(status, body) => Ok(TransportResponse {
                status,
                body: body.into_bytes(),
                ..Default::default()
            }),
            Reply::Network(message) => Err(TransportError::Network(message)),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(
        &self,
        request: TransportRequest,
        cancel: CancellationToken,
    ) -> std::result::Result<TransportResponse, TransportError> {
        self.requests.lock().push(request);
        let mut index = 0;
        self.calls.send_modify(|calls| {
            index = *calls;
            *calls += 1;
        });

        if cancel.is_cancelled() {
            self.cancellations.fetch_add(1, Ordering::SeqCst);
            return Err(TransportError::Aborted);
        }

        if !self.held.load(Ordering::SeqCst) {
            let reply = self.script.lock().pop_front().unwrap_or_else(|| {
                Reply::Value(self.next_value.fetch_add(1, Ordering::SeqCst))
            });
            return Self::render(reply);
        }

        let (tx, rx) = oneshot::channel();
        self.parked.lock().insert(index, tx);
        tokio::select! {
            _ = cancel.cancelled() => {
                self.parked.lock().remove(&index);
                self.cancellations.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Aborted)
            }
            reply = rx => match reply {
                Ok(reply) => Self::render(reply),
                Err(_) => Err(TransportError::Other("reply channel dropped".into())),
            },
        }
    }
}
