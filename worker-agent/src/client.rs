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

//! The single cooperative task that owns the conductor connection:
//! `BOOT -> CONNECTING -> REGISTERING -> ACTIVE`, falling back to
//! `CONNECTING` on any network loss. The worker never gives up; conductor
//! unavailability is retried forever with jittered exponential backoff.

use crate::config::WorkerAgentConfig;
use crate::error::AgentError;
use crate::probe::{changed_beyond_noise_floor, ResourceProbe};
use crate::state::AgentState;
use crate::supervisor::DeploymentSupervisor;
use fleet_common::protocol::{
    DeclaredResources, PingPayload, RegisterPayload, ResourcesPayload, WorkerInboundEvent,
    WorkerOutboundEvent,
};
use fleet_common::time::now_millis;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(10);
const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(30);
const RESOURCE_NOISE_FLOOR: f64 = 0.05;

struct Backoff {
    attempt: u32,
}

impl Backoff {
    fn new() -> Self {
        Self { attempt: 0 }
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn next_delay(&mut self) -> Duration {
        let exponent = self.attempt.min(5);
        self.attempt = self.attempt.saturating_add(1);

        let base = BACKOFF_BASE.as_secs_f64() * 2f64.powi(exponent as i32);
        let capped = base.min(BACKOFF_CAP.as_secs_f64());
        let jitter = rand::rng().random_range(-0.2..=0.2);
        Duration::from_secs_f64((capped * (1.0 + jitter)).max(0.0))
    }
}

pub struct ConductorClient {
    config: Arc<WorkerAgentConfig>,
    state: Arc<AgentState>,
    supervisor: Arc<DeploymentSupervisor>,
}

impl ConductorClient {
    pub fn new(
        config: Arc<WorkerAgentConfig>,
        state: Arc<AgentState>,
        supervisor: Arc<DeploymentSupervisor>,
    ) -> Self {
        Self {
            config,
            state,
            supervisor,
        }
    }

    pub async fn run(self, mut probe: ResourceProbe, shutdown: CancellationToken) {
        let mut backoff = Backoff::new();

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match self.connect_and_serve(&mut probe, &shutdown).await {
                Ok(()) => {
                    info!("conductor connection closed cleanly");
                    backoff.reset();
                }
                Err(error) => {
                    warn!(%error, "conductor connection failed, will retry");
                }
            }

            self.state.set_connected(false);
            if shutdown.is_cancelled() {
                break;
            }

            let delay = backoff.next_delay();
            info!(delay_ms = delay.as_millis() as u64, "reconnecting after backoff");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => break,
            }
        }
    }

    async fn connect_and_serve(
        &self,
        probe: &mut ResourceProbe,
        shutdown: &CancellationToken,
    ) -> Result<(), AgentError> {
        let (stream, _response) = tokio_tungstenite::connect_async(&self.config.conductor_url)
            .await
            .map_err(|error| AgentError::Transient(format!("connect failed: {error}")))?;

        let (mut sink, mut stream) = stream.split();

        let declared = probe.declared_resources();
        self.state.set_declared(declared.clone()).await;

        let register = WorkerInboundEvent::Register(RegisterPayload {
            token: self.config.conductor_token.clone(),
            hostname: local_hostname(),
            ip_address: local_ip(),
            resources: declared.clone(),
            worker_id: self.state.worker_id().await,
        });
        send(&mut sink, &register).await?;

        let worker_id = tokio::time::timeout(REGISTRATION_TIMEOUT, await_registration(&mut stream))
            .await
            .map_err(|_| AgentError::Transient("registration handshake timed out".to_string()))??;

        self.state.set_worker_id(worker_id).await;
        self.state.set_connected(true);
        info!(%worker_id, "registered with conductor");

        self.serve_active(&mut sink, &mut stream, probe, declared, shutdown)
            .await
    }

    async fn serve_active<Sink, Stream>(
        &self,
        sink: &mut Sink,
        stream: &mut Stream,
        probe: &mut ResourceProbe,
        mut last_declared: DeclaredResources,
        shutdown: &CancellationToken,
    ) -> Result<(), AgentError>
    where
        Sink: futures_util::Sink<Message> + Unpin,
        Stream: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval());
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut resource_ticker = tokio::time::interval(self.config.resource_check_interval());
        resource_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    return Ok(());
                }
                _ = heartbeat.tick() => {
                    let ping = WorkerInboundEvent::Ping(PingPayload {
                        timestamp: now_millis(),
                        resources: None,
                    });
                    send(sink, &ping).await?;
                }
                _ = resource_ticker.tick() => {
                    // Runs on its own cadence, independent of the ping
                    // cadence above: an out-of-band `worker:resources` is
                    // only emitted when the sample moved beyond the noise
                    // floor since the last one we sent.
                    let declared_now = probe.declared_resources();
                    let live = probe.sample();
                    self.state.set_live(live.clone()).await;

                    if changed_beyond_noise_floor(&last_declared, &declared_now, RESOURCE_NOISE_FLOOR) {
                        last_declared = declared_now;
                        self.state.set_declared(last_declared.clone()).await;

                        let resources = WorkerInboundEvent::Resources(ResourcesPayload { resources: live });
                        send(sink, &resources).await?;
                    }
                }
                message = stream.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_inbound(sink, &text).await?;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return Ok(());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(error)) => {
                            return Err(AgentError::Transient(format!("websocket error: {error}")));
                        }
                    }
                }
            }
        }
    }

    async fn handle_inbound<Sink>(&self, sink: &mut Sink, text: &str) -> Result<(), AgentError>
    where
        Sink: futures_util::Sink<Message> + Unpin,
    {
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let event: WorkerOutboundEvent = serde_json::from_str(line)
                .map_err(|error| AgentError::Validation(format!("malformed event from conductor: {error}")))?;

            match event {
                WorkerOutboundEvent::Deployment(payload) => {
                    let status = self.supervisor.apply(payload).await;
                    let reply = WorkerInboundEvent::ServiceStatus(status);
                    send(sink, &reply).await?;
                }
                WorkerOutboundEvent::Registered(_) => {
                    warn!("unexpected duplicate registration reply while active, ignoring");
                }
                WorkerOutboundEvent::Error(payload) => {
                    warn!(code = %payload.code, message = %payload.message, "conductor reported an error");
                }
            }
        }
        Ok(())
    }
}

async fn await_registration<Stream>(stream: &mut Stream) -> Result<uuid::Uuid, AgentError>
where
    Stream: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                let event: WorkerOutboundEvent = serde_json::from_str(&text)
                    .map_err(|error| AgentError::Validation(format!("malformed registration reply: {error}")))?;
                match event {
                    WorkerOutboundEvent::Registered(payload) => return Ok(payload.worker_id),
                    WorkerOutboundEvent::Error(payload) => {
                        return Err(AgentError::Unauthorized(payload.message));
                    }
                    WorkerOutboundEvent::Deployment(_) => continue,
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(AgentError::Transient("socket closed before registration completed".to_string()));
            }
            Some(Ok(_)) => continue,
            Some(Err(error)) => {
                return Err(AgentError::Transient(format!("websocket error during registration: {error}")));
            }
        }
    }
}

async fn send<Sink>(sink: &mut Sink, event: &WorkerInboundEvent) -> Result<(), AgentError>
where
    Sink: futures_util::Sink<Message> + Unpin,
{
    let json = serde_json::to_string(event).expect("WorkerInboundEvent always serializes");
    sink.send(Message::Text(json))
        .await
        .map_err(|_| AgentError::Transient("failed to write to conductor socket".to_string()))
}

fn local_hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".to_string())
}

/// No outbound traffic is actually sent: connecting a UDP socket only
/// triggers a routing-table lookup, which is enough to learn which local
/// interface address would be used.
fn local_ip() -> String {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_never_exceeds_the_cap() {
        let mut backoff = Backoff::new();
        for _ in 0..20 {
            let delay = backoff.next_delay();
            assert!(delay <= BACKOFF_CAP.mul_f64(1.21));
        }
    }

    #[test]
    fn backoff_resets_to_the_base_delay() {
        let mut backoff = Backoff::new();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        let delay = backoff.next_delay();
        assert!(delay <= BACKOFF_BASE.mul_f64(1.21));
    }
}
