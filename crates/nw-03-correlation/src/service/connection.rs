//! Connection: one execution queue, one timeout scheduler, one registry and
//! one transport.
//!
//! ```text
//!  issue() ──► allocate id ──► post ──► [queue] register, arm, encode
//!                                                  │
//!                                                  └─► spawn send ──► transport
//!  transport ──► TransportEvent ──► post ──► [queue] decode id, complete
//!  timeout fires ─────────────────► post ──► [queue] fail(id, Timeout)
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use nw_01_execution_queue::{panic_message, ExecutionQueue, QueueHandle};
use nw_02_timeout_scheduler::TimeoutScheduler;
use shared_types::{RequestError, TimeoutConfig, TransportError};
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

use crate::domain::{
    CorrelationId, CorrelationIdAllocator, CorrelationRegistry, IdSpace, PendingRequest,
    RegistryStats, Respond, Responder,
};
use crate::ports::{
    CorrelationCodec, Datagram, Decoded, Transport, TransportBuilder, TransportEvent,
};
use crate::service::requester::{ArmHook, PendingControl, RequestHandle, Requester};

// ============================================================================
// Connection state (owned by the execution queue)
// ============================================================================

/// Everything a connection mutates. Only ever touched from its queue.
pub struct ConnectionState<C: CorrelationCodec> {
    name: Arc<str>,
    codec: Arc<C>,
    target: SocketAddr,
    transport: Arc<dyn Transport>,
    timeouts: TimeoutScheduler,
    registry: CorrelationRegistry<C::Response>,
}

impl<C: CorrelationCodec> ConnectionState<C> {
    fn start(
        &mut self,
        handle: RequestHandle,
        request: C::Request,
        arm: Option<ArmHook>,
        responder: Responder<C::Response>,
    ) {
        let id = handle.id();
        let payload = match self.codec.encode(id, &request) {
            Ok(payload) => payload,
            Err(error) => {
                debug!(
                    connection = %self.name,
                    id = %id,
                    error = %error,
                    "Request could not be encoded"
                );
                responder.deliver(Err(RequestError::Protocol(error)));
                return;
            }
        };
        let to = self.codec.destination(&request).unwrap_or(self.target);

        if let Err(occupied) = self
            .registry
            .register(PendingRequest::from_responder(id, responder))
        {
            warn!(
                connection = %self.name,
                id = %id,
                "Correlation id still outstanding after wraparound; refusing request"
            );
            occupied
                .rejected
                .finish(Err(RequestError::IdCollision(occupied.id.value())));
            return;
        }

        if let Some(arm) = arm {
            match panic::catch_unwind(AssertUnwindSafe(|| arm(&handle))) {
                Ok(timeouts) => {
                    self.registry.attach(id, timeouts);
                }
                Err(payload) => error!(
                    connection = %self.name,
                    id = %id,
                    panic = %panic_message(payload.as_ref()),
                    "Arm hook panicked; sending without timeouts"
                ),
            }
        }

        trace!(
            connection = %self.name,
            id = %id,
            to = %to,
            bytes = payload.len(),
            "Sending request"
        );
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            if let Err(error) = transport.send(to, payload).await {
                debug!(id = %handle.id(), to = %to, error = %error, "Send failed");
                handle.fail(RequestError::Transport(error));
            }
        });
    }

    fn receive(&mut self, datagram: Datagram) {
        match self.codec.decode(datagram.from, &datagram.payload) {
            Ok(Decoded { id, outcome }) => {
                self.registry
                    .complete(id, outcome.map_err(RequestError::Protocol));
            }
            Err(error) => {
                debug!(
                    connection = %self.name,
                    from = %datagram.from,
                    error = %error,
                    "Dropping undecodable datagram"
                );
            }
        }
    }

    fn fail(&mut self, id: CorrelationId, error: RequestError) {
        self.registry.complete(id, Err(error));
    }

    fn cancel(&mut self, id: CorrelationId) {
        if self.registry.cancel(id) {
            trace!(connection = %self.name, id = %id, "Request cancelled");
        }
    }

    /// Close hook: fail pending, stop timers, release the transport.
    fn shutdown(&mut self) {
        let failed = self.registry.fail_all(&RequestError::Closed);
        self.timeouts.close();
        self.transport.close();
        debug!(connection = %self.name, failed, "Connection closed");
    }
}

struct QueueControl<C: CorrelationCodec> {
    queue: QueueHandle<ConnectionState<C>>,
}

impl<C: CorrelationCodec> PendingControl for QueueControl<C> {
    fn fail(&self, id: CorrelationId, error: RequestError) {
        self.queue.post(move |state| state.fail(id, error));
    }

    fn cancel(&self, id: CorrelationId) {
        self.queue.post(move |state| state.cancel(id));
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Configures and opens a [`Connection`].
pub struct ConnectionBuilder<C> {
    name: String,
    codec: C,
    target: SocketAddr,
    precision: Duration,
    first_id: Option<u64>,
}

impl<C: CorrelationCodec> ConnectionBuilder<C> {
    pub fn new(name: &str, codec: C) -> Self {
        Self {
            name: name.to_string(),
            codec,
            target: SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0),
            precision: TimeoutConfig::default().precision,
            first_id: None,
        }
    }

    /// Default destination for requests the codec does not route itself.
    pub fn target(mut self, target: SocketAddr) -> Self {
        self.target = target;
        self
    }

    /// Wake precision of the connection's timeout scheduler.
    pub fn precision(mut self, precision: Duration) -> Self {
        self.precision = precision;
        self
    }

    pub fn timeout_config(self, config: &TimeoutConfig) -> Self {
        self.precision(config.precision)
    }

    /// First correlation id to allocate (masked to the codec's id space).
    pub fn first_id(mut self, first_id: u64) -> Self {
        self.first_id = Some(first_id);
        self
    }

    /// Open the transport and start the connection on the current runtime.
    pub async fn connect(
        self,
        transports: &dyn TransportBuilder,
    ) -> Result<Connection<C>, TransportError> {
        let (events, inbound) = mpsc::unbounded_channel();
        let transport = transports.connect(events).await?;
        let local_addr = transport.local_addr();

        let space = self.codec.id_space();
        let ids = match self.first_id {
            Some(first) => CorrelationIdAllocator::starting_at(space, first),
            None => CorrelationIdAllocator::new(space),
        };
        let timeouts = TimeoutScheduler::named(&format!("{}-timeouts", self.name), self.precision);
        let name: Arc<str> = Arc::from(self.name.as_str());

        let state = ConnectionState {
            name: Arc::clone(&name),
            codec: Arc::new(self.codec),
            target: self.target,
            transport,
            timeouts: timeouts.clone(),
            registry: CorrelationRegistry::new(),
        };
        let queue = ExecutionQueue::spawn(&self.name, state).into_handle();
        tokio::spawn(forward_events(queue.clone(), inbound));

        debug!(connection = %name, target = %self.target, local = ?local_addr, "Connection opened");
        Ok(Connection {
            name,
            target: self.target,
            local_addr,
            ids,
            timeouts,
            control: Arc::new(QueueControl {
                queue: queue.clone(),
            }),
            queue,
        })
    }
}

/// Marshals transport events onto the connection queue.
async fn forward_events<C: CorrelationCodec>(
    queue: QueueHandle<ConnectionState<C>>,
    mut inbound: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = inbound.recv().await {
        match event {
            TransportEvent::Received(datagram) => {
                if !queue.post(move |state| state.receive(datagram)) {
                    break;
                }
            }
            TransportEvent::Failed(error) => {
                warn!(connection = %queue.name(), error = %error, "Transport receive failure");
            }
            TransportEvent::Closed => {
                debug!(connection = %queue.name(), "Transport closed; closing connection");
                queue.close_with(ConnectionState::shutdown);
                break;
            }
        }
    }
}

// ============================================================================
// Connection
// ============================================================================

/// A live request/response channel over one transport.
///
/// Dropping the connection closes it.
pub struct Connection<C: CorrelationCodec> {
    name: Arc<str>,
    target: SocketAddr,
    local_addr: Option<SocketAddr>,
    ids: CorrelationIdAllocator,
    timeouts: TimeoutScheduler,
    control: Arc<dyn PendingControl>,
    queue: QueueHandle<ConnectionState<C>>,
}

impl<C: CorrelationCodec> Connection<C> {
    pub fn builder(name: &str, codec: C) -> ConnectionBuilder<C> {
        ConnectionBuilder::new(name, codec)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn id_space(&self) -> IdSpace {
        self.ids.space()
    }

    /// Retire `id` silently.
    pub fn cancel(&self, id: CorrelationId) {
        self.control.cancel(id);
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    /// Outstanding requests; zero once closed.
    pub async fn pending_count(&self) -> usize {
        self.queue
            .call(|state| state.registry.len())
            .await
            .unwrap_or(0)
    }

    pub async fn stats(&self) -> Option<RegistryStats> {
        self.queue.call(|state| state.registry.stats()).await
    }
}

impl<C: CorrelationCodec> Requester for Connection<C> {
    type Request = C::Request;
    type Response = C::Response;

    fn issue_with(
        &self,
        request: C::Request,
        arm: Option<ArmHook>,
        respond: Respond<C::Response>,
    ) -> RequestHandle {
        let id = self.ids.allocate();
        let handle = RequestHandle::new(id, Arc::clone(&self.control));
        // A dropped task drops the responder, which reports Closed
        let responder = Responder::new(respond);
        let queued = handle.clone();
        self.queue
            .post(move |state| state.start(queued, request, arm, responder));
        handle
    }

    fn timeouts(&self) -> &TimeoutScheduler {
        &self.timeouts
    }

    fn close(&self) {
        self.queue.close_with(ConnectionState::shutdown);
    }
}

impl<C: CorrelationCodec> Drop for Connection<C> {
    fn drop(&mut self) {
        self.close();
    }
}
