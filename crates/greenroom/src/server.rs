//! `GreenroomServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → session → lobby,
//! with the hub in the middle and the background tasks (maintenance
//! sweep, bus pump) running alongside the accept loop.

use std::sync::Arc;

use greenroom_protocol::{Codec, JsonCodec};
use greenroom_session::Authenticator;
use greenroom_transport::WsListener;

use crate::fanout::{EventBus, LoopbackBus};
use crate::handler::handle_connection;
use crate::hub::{Hub, HubConfig};
use crate::GreenroomError;

/// The current protocol version. Clients must send this in their
/// `hello` or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Everything a connection handler needs, shared across handler tasks.
pub(crate) struct ServerContext<A, C> {
    pub(crate) hub: Arc<Hub>,
    pub(crate) auth: A,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Greenroom server.
///
/// # Example
///
/// ```rust,ignore
/// let server = GreenroomServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(DevAuthenticator)
///     .await?;
/// server.run().await
/// ```
pub struct GreenroomServerBuilder {
    bind_addr: String,
    hub_config: HubConfig,
    bus: Option<Arc<dyn EventBus>>,
}

impl GreenroomServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            hub_config: HubConfig::default(),
            bus: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Overrides the hub tunables (session grace, lobby policy, sweep
    /// interval).
    pub fn hub_config(mut self, config: HubConfig) -> Self {
        self.hub_config = config;
        self
    }

    /// Replaces the default in-process bus with an external one, for
    /// deployments running several server processes.
    pub fn event_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Builds the server with the given authenticator.
    ///
    /// Uses `JsonCodec` and the WebSocket listener as defaults.
    pub async fn build<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<GreenroomServer<A, JsonCodec>, GreenroomError> {
        let listener = WsListener::bind(&self.bind_addr).await?;
        let bus = self
            .bus
            .unwrap_or_else(|| Arc::new(LoopbackBus::default()));
        let hub = Arc::new(Hub::new(self.hub_config, bus));

        Ok(GreenroomServer {
            listener,
            ctx: Arc::new(ServerContext {
                hub,
                auth,
                codec: JsonCodec,
            }),
        })
    }
}

impl Default for GreenroomServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Greenroom server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct GreenroomServer<A, C> {
    listener: WsListener,
    ctx: Arc<ServerContext<A, C>>,
}

impl<A, C> GreenroomServer<A, C>
where
    A: Authenticator,
    C: Codec,
{
    pub fn builder() -> GreenroomServerBuilder {
        GreenroomServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the server: background tasks plus the accept loop. Runs
    /// until the process is terminated.
    pub async fn run(self) -> Result<(), GreenroomError> {
        let _maintenance = self.ctx.hub.spawn_maintenance();
        let _pump = self.ctx.hub.spawn_bus_pump();
        tracing::info!("Greenroom server running");

        loop {
            match self.listener.accept().await {
                Ok(conn) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, ctx).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
