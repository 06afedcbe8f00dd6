// Copyright 2024-2025 Golem Cloud
//
// Licensed under the Golem Source License v1.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://license.golem.cloud/LICENSE
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Ingress handler for the `/operators` streaming namespace. A bearer
//! token is required to upgrade at all; once connected, the session
//! receives every lifecycle event plus `worker:live:update` for whatever
//! worker ids it subscribes to.

use crate::auth::OperatorAuth;
use crate::bootstrap::Services;
use fleet_common::protocol::OperatorInboundEvent;
use futures_util::{SinkExt, StreamExt};
use poem::web::websocket::{Message, WebSocket, WebSocketStream};
use poem::web::Data;
use poem::{handler, IntoResponse, Response};
use tracing::{info, warn};
use uuid::Uuid;

#[handler]
pub fn operators_ws(
    websocket: WebSocket,
    auth: OperatorAuth,
    Data(services): Data<&Services>,
) -> Response {
    let services = services.clone();
    websocket
        .on_upgrade(move |socket| async move {
            handle_connection(socket, services, auth).await;
        })
        .into_response()
}

async fn handle_connection(socket: WebSocketStream, services: Services, auth: OperatorAuth) {
    let session_id = Uuid::new_v4();
    let handle = services.hub.connect(session_id).await;
    let (mut sink, mut stream) = socket.split();

    info!(operator_id = ?auth.operator_id, %session_id, "operator subscribed");

    loop {
        tokio::select! {
            event = handle.recv() => {
                let json = serde_json::to_string(&event).expect("OperatorOutboundEvent always serializes");
                if sink.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            message = stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        for line in text.lines().filter(|l| !l.trim().is_empty()) {
                            match serde_json::from_str::<OperatorInboundEvent>(line) {
                                Ok(OperatorInboundEvent::Subscribe(payload)) => {
                                    handle.subscribe(payload.worker_id).await;
                                }
                                Ok(OperatorInboundEvent::Unsubscribe(payload)) => {
                                    handle.unsubscribe(payload.worker_id).await;
                                }
                                Err(error) => {
                                    warn!(%session_id, %error, "malformed operator event, ignoring");
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(%session_id, "operator socket closed");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        warn!(%session_id, %error, "websocket error");
                        break;
                    }
                }
            }
        }
    }

    if handle.dropped_count() > 0 {
        warn!(%session_id, dropped = handle.dropped_count(), "operator session dropped buffered events on disconnect");
    }
    let _ = sink.close().await;
}
