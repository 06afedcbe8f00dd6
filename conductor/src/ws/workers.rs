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

//! Ingress handler for the `/workers` streaming namespace: a socket starts
//! `CONNECTED` and must present `worker:register` within the configured
//! grace window to become `AUTHENTICATED`. Everything else is rejected
//! until then.

use crate::bootstrap::Services;
use crate::error::ConductorError;
use fleet_common::protocol::{RegisteredPayload, WorkerInboundEvent, WorkerOutboundEvent};
use futures_util::{SinkExt, StreamExt};
use poem::web::websocket::{Message, WebSocket, WebSocketStream};
use poem::web::Data;
use poem::{handler, IntoResponse, Response};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

#[handler]
pub fn workers_ws(websocket: WebSocket, Data(services): Data<&Services>) -> Response {
    let services = services.clone();
    websocket
        .on_upgrade(move |socket| async move {
            handle_connection(socket, services).await;
        })
        .into_response()
}

async fn handle_connection(socket: WebSocketStream, services: Services) {
    let (session_id, cancel) = services.sessions.connect().await;
    let (mut sink, mut stream) = socket.split();
    let grace = Duration::from_secs(services.config.registration_grace_seconds);

    let mut worker_id: Option<Uuid> = None;
    let registration_deadline = tokio::time::sleep(grace);
    tokio::pin!(registration_deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(%session_id, "session superseded, closing socket");
                let _ = send_error(&mut sink, &ConductorError::Superseded("session superseded by a newer registration".into())).await;
                break;
            }
            _ = &mut registration_deadline, if worker_id.is_none() => {
                info!(%session_id, "registration grace window elapsed, closing socket");
                let _ = send_error(&mut sink, &ConductorError::Unauthorized("registration grace window elapsed".into())).await;
                break;
            }
            message = stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        let mut should_close = false;
                        for line in text.lines().filter(|l| !l.trim().is_empty()) {
                            if handle_line(line, &services, session_id, &mut worker_id, &mut sink).await.is_err() {
                                should_close = true;
                                break;
                            }
                        }
                        if should_close {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(%session_id, "worker socket closed");
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

    // Do not mark the worker offline here: the sweeper is the only
    // component that promotes workers to offline. A disconnect on a
    // superseded session must not clobber the successor session's
    // freshly-registered `Online` status.
    services.sessions.disconnect(session_id).await;
    let _ = sink.close().await;
}

async fn handle_line<S>(
    line: &str,
    services: &Services,
    session_id: Uuid,
    worker_id: &mut Option<Uuid>,
    sink: &mut S,
) -> Result<(), ()>
where
    S: futures_util::Sink<Message> + Unpin,
{
    let event: WorkerInboundEvent = match serde_json::from_str(line) {
        Ok(event) => event,
        Err(error) => {
            let _ = send_error(
                sink,
                &ConductorError::Validation(format!("malformed event: {error}")),
            )
            .await;
            return Err(());
        }
    };

    match (worker_id.as_ref(), event) {
        (None, WorkerInboundEvent::Register(payload)) => {
            let owner = match services.tokens.validate(&payload.token).await {
                Ok(owner) => owner,
                Err(error) => {
                    let _ = send_error(sink, &error).await;
                    return Err(());
                }
            };

            let worker = match services
                .registry
                .register_or_rebind(owner, payload.hostname, payload.ip_address, payload.resources)
                .await
            {
                Ok(worker) => worker,
                Err(error) => {
                    let _ = send_error(sink, &error).await;
                    return Err(());
                }
            };

            services.sessions.authenticate(session_id, worker.id).await;
            *worker_id = Some(worker.id);

            let reply = WorkerOutboundEvent::Registered(RegisteredPayload {
                worker_id: worker.id,
                hostname: worker.hostname,
                ip_address: worker.ip_address,
                status: worker.status,
            });
            send_event(sink, &reply).await
        }
        (None, _) => {
            let _ = send_error(
                sink,
                &ConductorError::Validation("worker:register required before any other event".into()),
            )
            .await;
            Err(())
        }
        (Some(id), WorkerInboundEvent::Ping(payload)) => {
            services.sessions.record_ping(session_id).await;
            match services.registry.record_ping(*id, payload.timestamp, payload.resources).await {
                Ok(_) => Ok(()),
                Err(error) => {
                    let _ = send_error(sink, &error).await;
                    Err(())
                }
            }
        }
        (Some(id), WorkerInboundEvent::Resources(payload)) => {
            match services.registry.record_resources(*id, payload.resources).await {
                Ok(_) => Ok(()),
                Err(error) => {
                    let _ = send_error(sink, &error).await;
                    Err(())
                }
            }
        }
        (Some(id), WorkerInboundEvent::ServiceStatus(payload)) => {
            info!(worker_id = %id, service = %payload.service, status = ?payload.status, "service status update");
            Ok(())
        }
        (Some(_), WorkerInboundEvent::Register(_)) => {
            let _ = send_error(
                sink,
                &ConductorError::Validation("already registered on this session".into()),
            )
            .await;
            Err(())
        }
    }
}

async fn send_event<S>(sink: &mut S, event: &WorkerOutboundEvent) -> Result<(), ()>
where
    S: futures_util::Sink<Message> + Unpin,
{
    let json = serde_json::to_string(event).expect("WorkerOutboundEvent always serializes");
    sink.send(Message::Text(json)).await.map_err(|_| ())
}

async fn send_error<S>(sink: &mut S, error: &ConductorError) -> Result<(), ()>
where
    S: futures_util::Sink<Message> + Unpin,
{
    send_event(sink, &WorkerOutboundEvent::Error(error.to_error_payload())).await
}
