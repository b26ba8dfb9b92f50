//! # WebSocket Endpoints
//!
//! Two WebSocket surfaces share this module:
//!
//! - `/ws/recognition/{session_id}` streams binary PCM float32 audio into the
//!   recognition pipeline. Each connection owns one [`SessionCoordinator`];
//!   the server replies with `partial`, `final` and `save` JSON messages.
//! - `/ws/rooms/{kind}/{room_id}` relays text payloads between the members of
//!   a chat, voice-call or video-call room via the [`RoomRegistry`].
//!
//! ## Recognition Protocol:
//! - **Client → Server**: Binary frames of little-endian float32 PCM
//!   (16 kHz, mono). Text frames are not part of the protocol and are ignored.
//! - **Server → Client**: JSON messages tagged with `"type"`.

use crate::recognition::SharedDecoderFactory;
use crate::rooms::{RoomEvent, RoomRegistry};
use crate::session::{OutboundMessage, SessionCoordinator};
use crate::state::AppState;
use crate::storage::TranscriptStore;

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Ping cadence for idle-connection detection.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// A connection that missed this many seconds of heartbeats is dropped.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Recognition socket
// ---------------------------------------------------------------------------

/// Connection actor for one recognition session.
///
/// Owns the coordinator outright: every frame is processed inline on the
/// actor, so outbound messages leave in the exact order their audio arrived.
pub struct RecognitionSocket {
    coordinator: SessionCoordinator,
    state: web::Data<AppState>,
    last_heartbeat: Instant,
}

impl RecognitionSocket {
    pub fn new(coordinator: SessionCoordinator, state: web::Data<AppState>) -> Self {
        Self {
            coordinator,
            state,
            last_heartbeat: Instant::now(),
        }
    }

    /// Serialize and send outbound messages, updating the server counters.
    fn deliver(&self, messages: Vec<OutboundMessage>, ctx: &mut ws::WebsocketContext<Self>) {
        for message in messages {
            match &message {
                OutboundMessage::Final { .. } => self.state.record_finalized_segment(),
                OutboundMessage::Save { .. } => self.state.record_transcript_saved(),
                OutboundMessage::Partial { .. } => {}
            }
            match serde_json::to_string(&message) {
                Ok(json) => ctx.text(json),
                Err(err) => {
                    error!(
                        session_id = %self.coordinator.session_id(),
                        error = %err,
                        "failed to serialize outbound message"
                    );
                }
            }
        }
    }

    /// Close the session and flush any end-of-session messages.
    ///
    /// Called on a clean close frame while the transport can still carry the
    /// `save` confirmation. The coordinator makes a second call a no-op.
    fn finish(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let messages = self.coordinator.close();
        self.deliver(messages, ctx);
    }
}

impl Actor for RecognitionSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(session_id = %self.coordinator.session_id(), "recognition session connected");
        self.state.increment_active_sessions();

        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                warn!(
                    session_id = %act.coordinator.session_id(),
                    "heartbeat timeout, closing connection"
                );
                ctx.stop();
            } else {
                ctx.ping(b"");
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        // Abrupt disconnects land here without a close frame. The transcript
        // is still persisted; only the outbound confirmation has nowhere to
        // go.
        let messages = self.coordinator.close();
        for message in &messages {
            if let OutboundMessage::Save { .. } = message {
                self.state.record_transcript_saved();
            }
        }
        self.state.decrement_active_sessions();
        info!(
            session_id = %self.coordinator.session_id(),
            segments = self.coordinator.transcript().len(),
            "recognition session ended"
        );
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RecognitionSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Binary(data)) => {
                self.state.record_audio_frame(data.len());
                let messages = self.coordinator.handle_frame(&data);
                self.deliver(messages, ctx);
            }
            Ok(ws::Message::Text(_)) => {
                // Binary-only protocol.
                warn!(
                    session_id = %self.coordinator.session_id(),
                    "ignoring text frame on recognition socket"
                );
            }
            Ok(ws::Message::Ping(data)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                debug!(
                    session_id = %self.coordinator.session_id(),
                    ?reason,
                    "close frame received"
                );
                self.finish(ctx);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!("received unexpected continuation frame");
            }
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                error!(
                    session_id = %self.coordinator.session_id(),
                    error = %err,
                    "websocket protocol error"
                );
                ctx.stop();
            }
        }
    }
}

/// HTTP handler upgrading `/ws/recognition/{session_id}` connections.
pub async fn recognition_websocket(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<String>,
    state: web::Data<AppState>,
    factory: web::Data<SharedDecoderFactory>,
    store: web::Data<TranscriptStore>,
) -> ActixResult<HttpResponse> {
    let session_id = path.into_inner();
    let config = state.get_config();

    let active = state.get_metrics_snapshot().active_sessions;
    if active as usize >= config.performance.max_concurrent_sessions {
        warn!(
            session_id = %session_id,
            active,
            max = config.performance.max_concurrent_sessions,
            "rejecting session, server at capacity"
        );
        return Ok(HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "error": "session_limit_reached",
            "message": "Maximum number of concurrent sessions reached"
        })));
    }

    let coordinator = SessionCoordinator::new(
        session_id,
        &config.audio,
        factory.get_ref().clone(),
        store.get_ref().clone(),
    )
    .map_err(|err| {
        error!(error = %err, "failed to create recognition session");
        actix_web::error::ErrorInternalServerError("recognizer unavailable")
    })?;

    ws::start(RecognitionSocket::new(coordinator, state), &req, stream)
}

// ---------------------------------------------------------------------------
// Room socket
// ---------------------------------------------------------------------------

/// Connection actor for one room member.
///
/// Joins the room on start, relays inbound text frames to the other members
/// and leaves on stop. Payloads pass through untouched.
pub struct RoomSocket {
    registry: web::Data<RoomRegistry>,
    room: String,
    member_id: Uuid,
    last_heartbeat: Instant,
}

impl RoomSocket {
    pub fn new(registry: web::Data<RoomRegistry>, room: String) -> Self {
        Self {
            registry,
            room,
            member_id: Uuid::new_v4(),
            last_heartbeat: Instant::now(),
        }
    }
}

impl Actor for RoomSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.registry
            .join(&self.room, self.member_id, ctx.address().recipient());

        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                warn!(room = %act.room, "heartbeat timeout, closing room connection");
                ctx.stop();
            } else {
                ctx.ping(b"");
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.registry.leave(&self.room, self.member_id);
    }
}

impl Handler<RoomEvent> for RoomSocket {
    type Result = ();

    fn handle(&mut self, msg: RoomEvent, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RoomSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                self.registry.broadcast(&self.room, self.member_id, &text);
            }
            Ok(ws::Message::Binary(_)) => {
                warn!(room = %self.room, "ignoring binary frame on room socket");
            }
            Ok(ws::Message::Ping(data)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {}
            Err(err) => {
                error!(room = %self.room, error = %err, "websocket protocol error");
                ctx.stop();
            }
        }
    }
}

/// HTTP handler upgrading `/ws/rooms/{kind}/{room_id}` connections.
pub async fn room_websocket(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<(String, String)>,
    registry: web::Data<RoomRegistry>,
) -> ActixResult<HttpResponse> {
    let (kind, room_id) = path.into_inner();
    match kind.as_str() {
        "chat" | "voice" | "video" => {}
        other => {
            return Ok(HttpResponse::NotFound().json(serde_json::json!({
                "error": "unknown_room_kind",
                "message": format!("No such room kind: {}", other)
            })));
        }
    }

    let room = format!("{}/{}", kind, room_id);
    info!(room = %room, "room connection accepted");
    ws::start(RoomSocket::new(registry, room), &req, stream)
}
