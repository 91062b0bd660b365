//! One media call per remote peer, and the display slot bound to it.

use tracing::{debug, info, warn};

use huddle_common::{SessionError, StreamDescriptor};

use crate::transport::{CallEvent, CallId, SignalingTransport};

use super::coordinator::Coordinator;
use super::state::{ActiveCall, QueuedCall};
use super::types::{DisplaySlot, SessionEvent, DEFAULT_PARTICIPANT_LABEL};

impl<T: SignalingTransport> Coordinator<T> {
    /// Call `peer_id` with the local stream, or defer until media is ready.
    pub(super) async fn place_call(&mut self, peer_id: &str) {
        if self.session.has_call_with(peer_id) {
            debug!(peer_id = %peer_id, "call already in place");
            return;
        }
        let Some(stream) = self.session.local_stream() else {
            debug!(peer_id = %peer_id, "media not ready, deferring call");
            self.session.deferred_calls.push(peer_id.to_string());
            return;
        };

        match self.transport.call(peer_id, stream).await {
            Ok(call) => {
                info!(peer_id = %peer_id, call = %call, "calling peer");
                self.session.calls.insert(
                    call,
                    ActiveCall {
                        peer_id: peer_id.to_string(),
                        outbound: true,
                    },
                );
            }
            Err(e) => self.call_failed(peer_id, &e.to_string()).await,
        }
    }

    /// Answer an inbound call with the local stream. A second call from a
    /// peer we already have a call with is declined.
    pub(super) async fn accept_call(
        &mut self,
        call: CallId,
        peer_id: String,
        offered: StreamDescriptor,
    ) {
        if self.session.has_call_with(&peer_id) {
            info!(peer_id = %peer_id, call = %call, "declining duplicate call");
            self.transport.hang_up(call).await;
            return;
        }
        let Some(stream) = self.session.local_stream() else {
            debug!(peer_id = %peer_id, call = %call, "media not ready, queueing call");
            self.session.queued_calls.push(QueuedCall {
                call,
                peer_id,
                offered,
            });
            return;
        };

        debug!(peer_id = %peer_id, video = offered.has_video, "answering call");
        match self.transport.answer(call, stream).await {
            Ok(()) => {
                self.session.calls.insert(
                    call,
                    ActiveCall {
                        peer_id,
                        outbound: false,
                    },
                );
            }
            Err(e) => {
                self.transport.hang_up(call).await;
                self.call_failed(&peer_id, &e.to_string()).await;
            }
        }
    }

    /// Answer queued inbound calls, then place deferred outbound ones.
    pub(super) async fn flush_waiting_calls(&mut self) {
        let queued = std::mem::take(&mut self.session.queued_calls);
        for QueuedCall {
            call,
            peer_id,
            offered,
        } in queued
        {
            self.accept_call(call, peer_id, offered).await;
        }
        let deferred = std::mem::take(&mut self.session.deferred_calls);
        for peer_id in deferred {
            self.place_call(&peer_id).await;
        }
    }

    pub(super) async fn handle_call(&mut self, event: CallEvent) {
        match event {
            CallEvent::Stream { call, stream } => {
                let Some(active) = self.session.calls.get(&call) else {
                    debug!(call = %call, "stream for unknown call");
                    return;
                };
                let peer_id = active.peer_id.clone();
                debug!(peer_id = %peer_id, outbound = active.outbound, "remote stream available");
                self.bind_slot(&peer_id, stream).await;
            }
            CallEvent::Error { call, message } => {
                if let Some(active) = self.session.calls.remove(&call) {
                    self.release_slot(&active.peer_id).await;
                    self.call_failed(&active.peer_id, &message).await;
                }
            }
            CallEvent::Closed { call } => {
                if let Some(active) = self.session.calls.remove(&call) {
                    debug!(peer_id = %active.peer_id, call = %call, "call closed");
                    self.release_slot(&active.peer_id).await;
                }
            }
        }
    }

    /// Create the slot for `peer_id` unless it already exists. Whether the
    /// placeholder shows is decided here, once.
    async fn bind_slot(&mut self, peer_id: &str, stream: StreamDescriptor) {
        if self.session.slots.contains_key(peer_id) {
            return;
        }
        let label = self
            .session
            .roster
            .get(peer_id)
            .unwrap_or(DEFAULT_PARTICIPANT_LABEL)
            .to_string();
        let slot = DisplaySlot {
            peer_id: peer_id.to_string(),
            label,
            show_placeholder: !stream.shows_video(),
            stream,
        };
        self.session.slots.insert(peer_id.to_string(), slot.clone());
        self.emit(SessionEvent::SlotAdded(slot)).await;
    }

    async fn release_slot(&mut self, peer_id: &str) {
        if self.session.calls_with(peer_id) > 0 {
            return;
        }
        if self.session.slots.remove(peer_id).is_some() {
            self.emit(SessionEvent::SlotRemoved {
                peer_id: peer_id.to_string(),
            })
            .await;
        }
    }

    async fn call_failed(&mut self, peer_id: &str, reason: &str) {
        let error = SessionError::CallSetup {
            peer_id: peer_id.to_string(),
            reason: reason.to_string(),
        };
        warn!(error = %error, "call failed");
        self.emit(SessionEvent::CallFailed {
            peer_id: peer_id.to_string(),
            reason: reason.to_string(),
        })
        .await;
    }
}
