//! `GET /ws?user_id=&conversation_id=` — WebSocket upgrade.
//!
//! Each connection registers one [`realtime_hub::Subscription`] filtered to
//! its `conversation_id` and bridges the subscription's bounded outbound
//! queue to the actix WebSocket actor. Client-sent frames are JSON
//! `{type, conversation_id, content}`; a `"message"` frame is published to
//! the bus exactly like `POST /api/v1/messages/` so the hub's own bus
//! consumer is the only path that ever re-broadcasts it — never a direct
//! in-process hand-off.

use std::sync::Arc;
use std::time::{Duration, Instant};

use actix::{Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use bus_adapter::{BusProducer, KafkaBusProducer};
use event_schema::domain::{ChatMessageSent, DomainEvent};
use realtime_hub::{HubHandle, OutboundMessage, SubjectFilter, SubscriberId};
use serde::Deserialize;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub conversation_id: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
struct WsInboundFrame {
    #[serde(rename = "type")]
    frame_type: String,
    conversation_id: String,
    content: String,
}

#[derive(ActixMessage)]
#[rtype(result = "()")]
struct OutboundText(String);

struct WsSession {
    conversation_id: String,
    user_id: String,
    subscriber_id: SubscriberId,
    hub: HubHandle,
    bus_producer: Arc<KafkaBusProducer>,
    hb: Instant,
    /// Taken in `started()` and spawned into a forwarding task; `None`
    /// afterwards.
    queue_rx: Option<tokio::sync::mpsc::Receiver<OutboundMessage>>,
}

impl WsSession {
    fn heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::warn!(subscriber_id = %act.subscriber_id, "websocket heartbeat timed out, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            conversation_id = %self.conversation_id,
            user_id = %self.user_id,
            "websocket session started"
        );
        self.heartbeat(ctx);

        if let Some(mut queue_rx) = self.queue_rx.take() {
            let addr = ctx.address();
            actix::spawn(async move {
                while let Some(msg) = queue_rx.recv().await {
                    let text = serde_json::to_string(&msg.payload).unwrap_or_default();
                    addr.do_send(OutboundText(text));
                }
            });
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(subscriber_id = %self.subscriber_id, "websocket session stopped");
        let hub = self.hub.clone();
        let subscriber_id = self.subscriber_id;
        actix::spawn(async move {
            let _ = hub.unregister(subscriber_id).await;
        });
    }
}

impl Handler<OutboundText> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: OutboundText, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                self.hb = Instant::now();
                let hub = self.hub.clone();
                let subscriber_id = self.subscriber_id;
                actix::spawn(async move {
                    let _ = hub.touch(subscriber_id).await;
                });
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
                let hub = self.hub.clone();
                let subscriber_id = self.subscriber_id;
                actix::spawn(async move {
                    let _ = hub.touch(subscriber_id).await;
                });
            }
            Ok(ws::Message::Text(text)) => {
                let frame: Result<WsInboundFrame, _> = serde_json::from_str(&text);
                match frame {
                    Ok(frame) if frame.frame_type == "message" => {
                        if frame.conversation_id != self.conversation_id {
                            tracing::warn!("dropping frame for a conversation this connection isn't subscribed to");
                            return;
                        }
                        let producer = self.bus_producer.clone();
                        let conversation_id = frame.conversation_id;
                        let user_id = self.user_id.clone();
                        let content = frame.content;
                        actix::spawn(async move {
                            let event = DomainEvent::ChatMessageSent(ChatMessageSent {
                                conversation_id: conversation_id.clone(),
                                user_id,
                                message: content,
                            });
                            let subject = event.subject().to_string();
                            let envelope = event.into_envelope(conversation_id.clone(), "conversation");
                            if let Ok(bytes) = envelope.encode() {
                                let headers = envelope.bus_headers();
                                if let Err(e) = producer.publish(&subject, &conversation_id, &bytes, &headers).await {
                                    tracing::error!(error = %e, "failed to publish inbound websocket message");
                                }
                            }
                        });
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "failed to parse inbound websocket frame"),
                }
            }
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("binary websocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!(?reason, "websocket close message received");
                ctx.stop();
            }
            _ => {}
        }
    }
}

pub async fn upgrade(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<crate::state::AppState>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let params = query.into_inner();

    let (subscriber_id, queue_rx) = state
        .hub
        .register(SubjectFilter::Conversation(params.conversation_id.clone()))
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let session = WsSession {
        conversation_id: params.conversation_id,
        user_id: params.user_id,
        subscriber_id,
        hub: state.hub.clone(),
        bus_producer: state.bus_producer.clone(),
        hb: Instant::now(),
        queue_rx: Some(queue_rx),
    };

    ws::start(session, &req, stream)
}
