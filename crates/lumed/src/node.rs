//! A running node: every long-lived loop spawned as a tracked task.
//!
//! `Node::start` brings up the beacon broadcaster, the discovery listener
//! and the connection listener. Each observes the same shutdown channel.
//! A loop that fails only takes itself down; the others keep running.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use lume_services::LumeContext;

use crate::discovery;
use crate::session::ConnectionListener;

/// How long `shutdown` waits for each loop before aborting it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub struct Node {
    ctx: LumeContext,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    tcp_addr: Option<SocketAddr>,
}

impl Node {
    pub async fn start(ctx: LumeContext) -> Self {
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let mut tasks = Vec::new();

        tasks.push((
            "beacon broadcast",
            spawn_loop(
                ctx.clone(),
                "beacon broadcast",
                discovery::broadcast_loop(ctx.clone(), shutdown_tx.subscribe()),
            ),
        ));

        tasks.push((
            "discovery listener",
            spawn_loop(
                ctx.clone(),
                "discovery listener",
                discovery::listener_loop(ctx.clone(), shutdown_tx.subscribe()),
            ),
        ));

        // A busy TCP port leaves the node able to discover and send, not receive.
        let port = ctx.identity().tcp_port;
        let tcp_addr = match ConnectionListener::bind(ctx.clone(), shutdown_tx.subscribe()).await {
            Ok(listener) => {
                let addr = listener.local_addr().ok();
                tasks.push((
                    "connection listener",
                    spawn_loop(ctx.clone(), "connection listener", listener.run()),
                ));
                addr
            }
            Err(e) => {
                tracing::error!(port, error = %e, "failed to bind TCP listener");
                ctx.status(format!(
                    "Error: Could not bind to TCP port {port}. Is it already in use?"
                ));
                None
            }
        };

        tracing::info!(
            name = %ctx.identity().name,
            port,
            discovery_port = ctx.settings().discovery_port,
            "node started"
        );

        Self {
            ctx,
            shutdown_tx,
            tasks,
            tcp_addr,
        }
    }

    pub fn context(&self) -> &LumeContext {
        &self.ctx
    }

    /// Address of the connection listener, or `None` if it failed to bind.
    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        self.tcp_addr
    }

    /// A receiver that fires when the node shuts down.
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signal every loop to stop and wait for them.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        for (name, mut handle) in self.tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
                Ok(Ok(())) => tracing::debug!(task = name, "task stopped"),
                Ok(Err(e)) => tracing::warn!(task = name, error = %e, "task ended abnormally"),
                Err(_) => {
                    tracing::warn!(task = name, "task did not stop in time, aborting");
                    handle.abort();
                }
            }
        }
        tracing::info!("node stopped");
    }
}

fn spawn_loop<F>(ctx: LumeContext, name: &'static str, fut: F) -> JoinHandle<()>
where
    F: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = fut.await {
            tracing::error!(task = name, error = format!("{e:#}"), "task failed");
            ctx.status(format!("Error: {name} stopped: {e}"));
        }
    })
}
