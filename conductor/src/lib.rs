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

pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod model;
pub mod persistence;
pub mod registry;
pub mod session;
pub mod subscription;
pub mod sweeper;
pub mod token;
pub mod ws;

use crate::api::Apis;
use crate::bootstrap::Services;
use crate::config::ConductorConfig;
use poem::listener::{Acceptor, Listener, TcpListener};
use poem::middleware::{Cors, RequestId};
use poem::{get, EndpointExt, Route};
use poem_openapi::OpenApiService;
use tokio::task::JoinSet;
use tracing::{info, Instrument};

pub struct Conductor {
    config: ConductorConfig,
    services: Services,
}

impl Conductor {
    pub async fn new(config: ConductorConfig) -> Result<Self, anyhow::Error> {
        let services = Services::bootstrap(config.clone())
            .await
            .map_err(|error| anyhow::anyhow!(error.to_string()))?;
        Ok(Self { config, services })
    }

    pub fn http_service(&self) -> OpenApiService<Apis, ()> {
        api::make_open_api_service(self.services.clone())
    }

    /// Binds and runs the HTTP + websocket server, returning the bound port
    /// (useful when `http_port` is configured as `0` for tests). The server
    /// task is spawned on `join_set`; the future returned by this method
    /// resolves as soon as the listener is bound.
    pub async fn run(
        &self,
        join_set: &mut JoinSet<Result<(), anyhow::Error>>,
    ) -> Result<u16, anyhow::Error> {
        let api_service = self.http_service();
        let ui = api_service.swagger_ui();
        let spec = api_service.spec_endpoint_yaml();

        let cors = Cors::new()
            .allow_origin_regex(&self.config.cors_origin_regex)
            .allow_credentials(true);

        let app = Route::new()
            .nest("/", api_service)
            .nest("/docs", ui)
            .nest("/specs", spec)
            .at("/workers", get(ws::workers::workers_ws))
            .at("/operators", get(ws::operators::operators_ws))
            .with(cors)
            .with(RequestId::default())
            .data(self.services.clone())
            .data(self.services.operator_sessions.clone())
            .boxed();

        let listener = TcpListener::bind(format!("0.0.0.0:{}", self.config.http_port));
        let acceptor = listener.into_acceptor().await?;
        let port = acceptor.local_addr()[0]
            .as_socket_addr()
            .expect("socket address")
            .port();

        info!(port, "conductor listening");

        join_set.spawn(
            async move {
                poem::Server::new_with_acceptor(acceptor)
                    .run(app)
                    .await
                    .map_err(|error| error.into())
            }
            .in_current_span(),
        );

        Ok(port)
    }
}
