//! Correlated request tracking.
//!
//! Each outgoing request gets a correlation id and a [`ReplyMatcher`]. The
//! session's reader task offers every inbound reply to [`PendingRequests`];
//! the first reply the matcher accepts (or rejects as a device error)
//! completes the request. Timeouts and connection loss race against that,
//! and whichever removes the entry from the map first is the only one that
//! gets to resolve it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::channel::Channel;
use super::frame::CastMessage;
use super::messages::{reply_type, Reply, Request};
use super::session::ChannelSession;
use crate::protocol_constants::{REQUEST_ID_MAX, REQUEST_ID_MIN};

/// Failure modes of a single correlated request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RpcError {
    /// Could not reach the device (TCP/TLS) or write to it.
    #[error("connection failed: {0}")]
    Connection(String),

    /// No acceptable reply arrived before the deadline.
    #[error("no matching reply within {0:?}")]
    Timeout(Duration),

    /// The device answered with an error type or closed the virtual connection.
    #[error("device rejected request: {0}")]
    Device(String),

    /// The reply could not be decoded into the expected shape.
    #[error("malformed reply: {0}")]
    MalformedReply(String),

    /// The session died while the request was outstanding.
    #[error("connection closed while request was pending")]
    ConnectionClosed,

    /// Another request with this id is still outstanding on the session.
    #[error("request id {0} is already pending")]
    DuplicateRequest(u32),
}

impl RpcError {
    /// Timeout and connection loss are treated the same by callers.
    pub fn is_timeout_equivalent(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::ConnectionClosed)
    }
}

pub type RpcResult<T> = Result<T, RpcError>;

// ─────────────────────────────────────────────────────────────────────────────
// Correlation ids
// ─────────────────────────────────────────────────────────────────────────────

/// Correlation id counter, scoped to one logical client.
///
/// Hands out `REQUEST_ID_MIN..=REQUEST_ID_MAX` and then wraps. Uniqueness is
/// best-effort: a request still pending after a full wrap would collide, and
/// [`PendingRequests::register`] refuses the newcomer in that case.
#[derive(Debug)]
pub struct RequestIds {
    next: AtomicU32,
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestIds {
    pub fn new() -> Self {
        Self::starting_at(REQUEST_ID_MIN)
    }

    pub(crate) fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    pub fn next_id(&self) -> u32 {
        let mut current = self.next.load(Ordering::Relaxed);
        loop {
            let id = if (REQUEST_ID_MIN..=REQUEST_ID_MAX).contains(&current) {
                current
            } else {
                log::debug!("[Tracker] Request id counter wrapped");
                REQUEST_ID_MIN
            };
            match self.next.compare_exchange_weak(
                current,
                id + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return id,
                Err(actual) => current = actual,
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Matching
// ─────────────────────────────────────────────────────────────────────────────

type Condition = Box<dyn Fn(&Reply) -> bool + Send + Sync>;

/// Describes which replies complete a request.
pub struct ReplyMatcher {
    request_id: u32,
    reply_type: &'static str,
    accept_zero_id: bool,
    condition: Option<Condition>,
}

/// Outcome of offering a reply to a matcher.
#[derive(Debug, PartialEq)]
pub(crate) enum Verdict {
    NoMatch,
    Matched,
    Failed(String),
}

impl ReplyMatcher {
    /// Accepts `reply_type` with exactly this correlation id.
    pub fn new(request_id: u32, reply_type: &'static str) -> Self {
        Self {
            request_id,
            reply_type,
            accept_zero_id: false,
            condition: None,
        }
    }

    /// Also accepts `requestId == 0`.
    ///
    /// Some media receiver apps echo zero instead of our id. Only use this for
    /// playback state transitions, never for status queries: a zero-id status
    /// broadcast says nothing about whether our request was handled.
    pub fn accept_zero_id(mut self) -> Self {
        self.accept_zero_id = true;
        self
    }

    /// Extra state requirement; replies failing it leave the request pending.
    pub fn with_condition(
        mut self,
        condition: impl Fn(&Reply) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.condition = Some(Box::new(condition));
        self
    }

    pub fn request_id(&self) -> u32 {
        self.request_id
    }

    pub(crate) fn evaluate(&self, reply: &Reply) -> Verdict {
        let is_error = reply_type::ERRORS.contains(&reply.kind.as_str());
        if reply.request_id == self.request_id && is_error {
            return Verdict::Failed(format!("{}: {}", reply.kind, reply.error_reason()));
        }

        if reply.kind != self.reply_type {
            return Verdict::NoMatch;
        }

        let id_matches = reply.request_id == self.request_id
            || (self.accept_zero_id && reply.request_id == 0);
        if !id_matches {
            return Verdict::NoMatch;
        }

        match &self.condition {
            Some(condition) if !condition(reply) => Verdict::NoMatch,
            _ => Verdict::Matched,
        }
    }
}

impl std::fmt::Debug for ReplyMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyMatcher")
            .field("request_id", &self.request_id)
            .field("reply_type", &self.reply_type)
            .field("accept_zero_id", &self.accept_zero_id)
            .field("has_condition", &self.condition.is_some())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pending map
// ─────────────────────────────────────────────────────────────────────────────

type Completion = oneshot::Sender<RpcResult<Reply>>;

struct PendingRequest {
    channel: Channel,
    matcher: ReplyMatcher,
    completion: Completion,
}

/// Outstanding requests on one session.
///
/// Removal from the map is the single point of resolution: whoever removes
/// an entry sends its result, and nobody else can.
#[derive(Default)]
pub struct PendingRequests {
    entries: Mutex<HashMap<u32, PendingRequest>>,
    closed: AtomicBool,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a request; the receiver yields its single resolution.
    pub fn register(
        &self,
        channel: Channel,
        matcher: ReplyMatcher,
    ) -> RpcResult<oneshot::Receiver<RpcResult<Reply>>> {
        let mut entries = self.entries.lock();
        // Checked under the lock so fail_all cannot miss a late registration.
        if self.closed.load(Ordering::Acquire) {
            return Err(RpcError::ConnectionClosed);
        }

        let id = matcher.request_id();
        if entries.contains_key(&id) {
            return Err(RpcError::DuplicateRequest(id));
        }

        let (tx, rx) = oneshot::channel();
        entries.insert(
            id,
            PendingRequest {
                channel,
                matcher,
                completion: tx,
            },
        );
        Ok(rx)
    }

    /// Offers an inbound reply to every pending request on its channel.
    ///
    /// Returns the number of requests it resolved.
    pub fn dispatch(&self, frame: &CastMessage, reply: &Reply) -> usize {
        let mut entries = self.entries.lock();

        let decided: Vec<(u32, Verdict)> = entries
            .iter()
            .filter(|(_, pending)| pending.channel.accepts(frame))
            .filter_map(|(id, pending)| match pending.matcher.evaluate(reply) {
                Verdict::NoMatch => None,
                verdict => Some((*id, verdict)),
            })
            .collect();

        let mut resolved = 0;
        for (id, verdict) in decided {
            if let Some(pending) = entries.remove(&id) {
                let result = match verdict {
                    Verdict::Failed(reason) => Err(RpcError::Device(reason)),
                    _ => Ok(reply.clone()),
                };
                // Receiver gone means the caller already gave up.
                let _ = pending.completion.send(result);
                resolved += 1;
            }
        }
        resolved
    }

    /// Removes a request without resolving it. Returns `false` if it was
    /// already resolved.
    pub fn cancel(&self, request_id: u32) -> bool {
        self.entries.lock().remove(&request_id).is_some()
    }

    /// Fails every request addressed to `remote_id` (virtual connection closed).
    pub fn fail_remote(&self, remote_id: &str, error: RpcError) -> usize {
        let mut entries = self.entries.lock();
        let ids: Vec<u32> = entries
            .iter()
            .filter(|(_, pending)| pending.channel.remote_id == remote_id)
            .map(|(id, _)| *id)
            .collect();

        for id in &ids {
            if let Some(pending) = entries.remove(id) {
                let _ = pending.completion.send(Err(error.clone()));
            }
        }
        ids.len()
    }

    /// Fails everything and refuses new registrations.
    pub fn fail_all(&self) -> usize {
        let mut entries = self.entries.lock();
        self.closed.store(true, Ordering::Release);

        let count = entries.len();
        for (_, pending) in entries.drain() {
            let _ = pending.completion.send(Err(RpcError::ConnectionClosed));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sends `request` on `channel` and waits for the reply `matcher` accepts.
///
/// Resolves exactly once: with the matched reply, a device error, a
/// connection failure, or [`RpcError::Timeout`] after `timeout`.
pub async fn issue(
    session: &ChannelSession,
    channel: &Channel,
    request: &Request,
    matcher: ReplyMatcher,
    timeout: Duration,
) -> RpcResult<Reply> {
    let request_id = matcher.request_id();
    let pending = session.pending();
    let mut rx = pending.register(channel.clone(), matcher)?;
    let deadline = Instant::now() + timeout;

    // The deadline covers the write too; a peer that stops reading must not
    // hold the request open.
    match tokio::time::timeout_at(deadline, session.send(channel, request)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            pending.cancel(request_id);
            return Err(e);
        }
        Err(_) => {
            pending.cancel(request_id);
            log::debug!(
                "[Tracker] Request {} on {} not written within {:?}",
                request_id,
                channel,
                timeout
            );
            return Err(RpcError::Timeout(timeout));
        }
    }

    match tokio::time::timeout_at(deadline, &mut rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(RpcError::ConnectionClosed),
        Err(_) => {
            if pending.cancel(request_id) {
                log::debug!(
                    "[Tracker] Request {} on {} timed out after {:?}",
                    request_id,
                    channel,
                    timeout
                );
                Err(RpcError::Timeout(timeout))
            } else {
                // Resolved between the deadline firing and the cancel.
                rx.try_recv().unwrap_or(Err(RpcError::ConnectionClosed))
            }
        }
    }
}
