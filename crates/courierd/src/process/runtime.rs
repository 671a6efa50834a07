//! Wiring of queue, workers and listeners, and their ordered teardown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use courier_config::{Config, Protocol};

use crate::auth::AuthResolver;
use crate::bootstrap::Daemon;
use crate::codec::Codec;
use crate::dispatch::Dispatcher;
use crate::health::HealthReporter;
use crate::queue::{RequestQueue, request_queue};
use crate::registry::MethodRegistry;
use crate::transport::{
    ConnectionHandler, ConnectionTracker, HealthProbeHandler, HttpConnectionHandler,
    LineConnectionHandler, ListenerHandle, SocketListener,
};
use crate::worker::WorkerPool;

use super::PROCESS_TARGET;
use super::errors::LaunchError;

const HEALTH_LISTENER: &str = "health";

/// A started listener and the connections it accepted.
struct FrontEnd {
    name: &'static str,
    handle: ListenerHandle,
    tracker: ConnectionTracker,
}

impl FrontEnd {
    fn stop_accepting(self) -> ConnectionTracker {
        self.handle.shutdown();
        if let Err(error) = self.handle.join() {
            warn!(
                target: PROCESS_TARGET,
                listener = self.name,
                error = %error,
                "listener did not stop cleanly"
            );
        }
        self.tracker
    }
}

/// Everything that runs between bootstrap and shutdown.
pub(crate) struct Runtime {
    protocol: Protocol,
    registry: MethodRegistry,
    queue: RequestQueue,
    workers: WorkerPool,
    primary: FrontEnd,
    probe: Option<FrontEnd>,
    reporter: Arc<dyn HealthReporter>,
    shutdown_grace: Duration,
    http_shutdown_timeout: Duration,
}

impl Runtime {
    /// Binds the listeners, starts the workers and begins accepting.
    pub(crate) fn start(daemon: &Daemon) -> Result<Self, LaunchError> {
        let config = daemon.config();
        let protocol = config.protocol();
        let primary_name = listener_name(protocol);
        let primary = SocketListener::bind(primary_name, config.host(), config.port())?;
        let probe = match config.health_port() {
            Some(port) => Some(SocketListener::bind(HEALTH_LISTENER, config.host(), port)?),
            None => None,
        };

        let (queue, receiver) = request_queue(config.max_requests());
        let dispatcher = Arc::new(Dispatcher::new(
            daemon.registry().clone(),
            AuthResolver::new(config.auth_secret()),
            Codec::new(config.format()),
            config.batch_fanout(),
        ));
        let workers = WorkerPool::spawn(config.max_workers(), &receiver, &dispatcher)
            .map_err(|source| LaunchError::Workers { source })?;
        drop(receiver);

        let reporter = daemon.reporter();
        let started = start_listeners(config, &queue, daemon.registry(), primary, probe);
        let (primary, probe) = match started {
            Ok(front_ends) => front_ends,
            Err(error) => {
                queue.close();
                workers.drain(config.shutdown_grace());
                return Err(error);
            }
        };
        for front_end in std::iter::once(&primary).chain(probe.as_ref()) {
            if let Some(address) = front_end.handle.local_addr() {
                reporter.listening(front_end.name, address);
            }
        }

        Ok(Self {
            protocol,
            registry: daemon.registry().clone(),
            queue,
            workers,
            primary,
            probe,
            reporter,
            shutdown_grace: config.shutdown_grace(),
            http_shutdown_timeout: config.http_shutdown_timeout(),
        })
    }

    /// Address the primary front end is accepting on.
    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.primary.handle.local_addr()
    }

    /// Rebuilds the registry; a failure keeps the current methods.
    pub(crate) fn reload(&self) {
        info!(target: PROCESS_TARGET, "reloading method registry");
        match self.registry.reload() {
            Ok(methods) => self.reporter.registry_reloaded(methods),
            Err(error) => self.reporter.registry_reload_failed(&error),
        }
    }

    /// Stops admission, drains the workers and closes every connection.
    pub(crate) fn shutdown(self) {
        let Self {
            protocol,
            queue,
            workers,
            primary,
            probe,
            reporter,
            shutdown_grace,
            http_shutdown_timeout,
            ..
        } = self;
        reporter.shutdown_started();

        let connections = primary.stop_accepting();
        queue.close();
        let drained = workers.drain(shutdown_grace);
        debug!(target: PROCESS_TARGET, drained, "worker pool drained");

        match protocol {
            Protocol::Http => close_gracefully(&connections, http_shutdown_timeout),
            Protocol::Tcp => sever(&connections),
        }
        if let Some(probe) = probe {
            close_gracefully(&probe.stop_accepting(), http_shutdown_timeout);
        }
        reporter.shutdown_completed(drained);
    }
}

const fn listener_name(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::Tcp => "tcp",
        Protocol::Http => "http",
    }
}

fn start_listeners(
    config: &Config,
    queue: &RequestQueue,
    registry: &MethodRegistry,
    primary: SocketListener,
    probe: Option<SocketListener>,
) -> Result<(FrontEnd, Option<FrontEnd>), LaunchError> {
    let handler: Arc<dyn ConnectionHandler> = match config.protocol() {
        Protocol::Tcp => Arc::new(LineConnectionHandler::new(
            queue.clone(),
            config.format(),
            config.idle_timeout(),
        )),
        Protocol::Http => Arc::new(HttpConnectionHandler::new(
            queue.clone(),
            config.format().content_type(),
        )),
    };
    let primary = start_front_end(listener_name(config.protocol()), primary, handler)?;
    let probe = match probe {
        Some(listener) => {
            let handler = Arc::new(HealthProbeHandler::new(
                registry.clone(),
                queue.clone(),
                config.protocol(),
            ));
            match start_front_end(HEALTH_LISTENER, listener, handler) {
                Ok(front_end) => Some(front_end),
                Err(error) => {
                    sever(&primary.stop_accepting());
                    return Err(error);
                }
            }
        }
        None => None,
    };
    Ok((primary, probe))
}

fn start_front_end(
    name: &'static str,
    listener: SocketListener,
    handler: Arc<dyn ConnectionHandler>,
) -> Result<FrontEnd, LaunchError> {
    let tracker = ConnectionTracker::new();
    let handle = listener.start(handler, tracker.clone())?;
    Ok(FrontEnd {
        name,
        handle,
        tracker,
    })
}

/// Lets in-flight exchanges finish for up to `timeout`, then severs the rest.
fn close_gracefully(connections: &ConnectionTracker, timeout: Duration) {
    if !connections.wait_idle(timeout) {
        warn!(
            target: PROCESS_TARGET,
            remaining = connections.active(),
            timeout_ms = timeout.as_millis(),
            "connections still open after graceful close timeout"
        );
        sever(connections);
    }
}

fn sever(connections: &ConnectionTracker) {
    let severed = connections.force_close();
    if severed > 0 {
        debug!(target: PROCESS_TARGET, severed, "closed remaining connections");
    }
}
