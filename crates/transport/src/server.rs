//! gRPC server adapter for the membership protocol.
//!
//! Each inbound RPC is translated into a task on the protocol executor, a
//! dedicated worker draining a bounded queue. Fire-and-forget RPCs (link
//! updates, consensus traffic) are acknowledged on the transport thread as
//! soon as their task is queued; join and probe replies ride a oneshot
//! back from the worker. Calls that arrive before the membership service
//! is bound are held by a [`DeferredDispatch`] latch, except probes, which
//! are answered immediately with `BOOTSTRAPPING`.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, warn};

use crate::deferred::DeferredDispatch;
use crate::error::TransportError;
use crate::proto;
use crate::proto::membership_server::{Membership, MembershipServer};

/// Capacity of the protocol task queue.
const PROTOCOL_QUEUE_DEPTH: usize = 1024;

/// Contract of the membership service driven by this transport.
///
/// Implementations own the protocol: they feed link updates into the
/// watermark buffer, react to consensus traffic, and answer joins and
/// probes. All methods run on the protocol executor, one task at a time.
#[tonic::async_trait]
pub trait MembershipService: Send + Sync + 'static {
    /// Process a batch of edge-health reports. The sender has already been
    /// acknowledged.
    async fn handle_link_updates(&self, batch: proto::BatchedLinkUpdateRequest);

    /// Process consensus-phase traffic. The sender has already been
    /// acknowledged.
    async fn handle_consensus_proposal(&self, proposal: proto::ConsensusProposalRequest);

    /// Answer the first phase of a join.
    async fn handle_join_phase_one(&self, request: proto::JoinRequest) -> proto::JoinResponse;

    /// Answer the second phase of a join.
    async fn handle_join_phase_two(&self, request: proto::JoinRequest) -> proto::JoinResponse;

    /// Answer a failure-detector probe.
    async fn handle_probe(&self, request: proto::ProbeRequest) -> proto::ProbeResponse;

    /// Invoked during transport shutdown, after the listener has stopped
    /// accepting calls.
    async fn shutdown(&self) {}
}

/// Unit of work scheduled on the protocol executor.
enum ProtocolTask {
    LinkUpdates(proto::BatchedLinkUpdateRequest),
    ConsensusProposal(proto::ConsensusProposalRequest),
    JoinPhaseOne(
        proto::JoinRequest,
        oneshot::Sender<proto::JoinResponse>,
    ),
    JoinPhaseTwo(
        proto::JoinRequest,
        oneshot::Sender<proto::JoinResponse>,
    ),
    Probe(proto::ProbeRequest, oneshot::Sender<proto::ProbeResponse>),
}

/// State shared between the RPC handlers and the owning server.
struct Shared {
    service: OnceLock<Arc<dyn MembershipService>>,
    dispatch: DeferredDispatch,
}

/// The generated-service implementation backing [`TransportServer`].
struct MembershipGrpc {
    shared: Arc<Shared>,
    task_tx: mpsc::Sender<ProtocolTask>,
}

impl MembershipGrpc {
    fn enqueue(&self, task: ProtocolTask) -> Result<(), Status> {
        self.task_tx.try_send(task).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => {
                Status::resource_exhausted("protocol queue full")
            }
            mpsc::error::TrySendError::Closed(_) => {
                Status::unavailable("protocol executor stopped")
            }
        })
    }
}

/// Canned reply for probes that arrive before the membership service is
/// bound. The probing failure detector can tell "alive, still joining"
/// apart from "down".
fn bootstrapping_response() -> proto::ProbeResponse {
    proto::ProbeResponse {
        status: proto::NodeStatus::Bootstrapping.into(),
    }
}

#[tonic::async_trait]
impl Membership for MembershipGrpc {
    async fn send_link_updates(
        &self,
        request: Request<proto::BatchedLinkUpdateRequest>,
    ) -> Result<Response<proto::BatchedLinkUpdateResponse>, Status> {
        self.shared.dispatch.wait().await;
        self.enqueue(ProtocolTask::LinkUpdates(request.into_inner()))?;
        Ok(Response::new(proto::BatchedLinkUpdateResponse::default()))
    }

    async fn send_consensus_proposal(
        &self,
        request: Request<proto::ConsensusProposalRequest>,
    ) -> Result<Response<proto::ConsensusProposalResponse>, Status> {
        self.shared.dispatch.wait().await;
        self.enqueue(ProtocolTask::ConsensusProposal(request.into_inner()))?;
        Ok(Response::new(proto::ConsensusProposalResponse::default()))
    }

    async fn join_phase_one(
        &self,
        request: Request<proto::JoinRequest>,
    ) -> Result<Response<proto::JoinResponse>, Status> {
        self.shared.dispatch.wait().await;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.enqueue(ProtocolTask::JoinPhaseOne(request.into_inner(), reply_tx))?;
        let response = reply_rx
            .await
            .map_err(|_| Status::cancelled("join handler dropped"))?;
        Ok(Response::new(response))
    }

    async fn join_phase_two(
        &self,
        request: Request<proto::JoinRequest>,
    ) -> Result<Response<proto::JoinResponse>, Status> {
        self.shared.dispatch.wait().await;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.enqueue(ProtocolTask::JoinPhaseTwo(request.into_inner(), reply_tx))?;
        let response = reply_rx
            .await
            .map_err(|_| Status::cancelled("join handler dropped"))?;
        Ok(Response::new(response))
    }

    async fn probe(
        &self,
        request: Request<proto::ProbeRequest>,
    ) -> Result<Response<proto::ProbeResponse>, Status> {
        if self.shared.service.get().is_none() {
            return Ok(Response::new(bootstrapping_response()));
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.enqueue(ProtocolTask::Probe(request.into_inner(), reply_tx))?;
        let response = reply_rx
            .await
            .map_err(|_| Status::cancelled("probe handler dropped"))?;
        Ok(Response::new(response))
    }
}

/// Drains the protocol queue one task at a time.
async fn protocol_worker(mut task_rx: mpsc::Receiver<ProtocolTask>, shared: Arc<Shared>) {
    while let Some(task) = task_rx.recv().await {
        // Handlers pass the dispatch latch before queueing, so the service
        // must be bound by the time a task arrives.
        let Some(service) = shared.service.get() else {
            warn!("dropping protocol task: membership service not bound");
            continue;
        };

        match task {
            ProtocolTask::LinkUpdates(batch) => service.handle_link_updates(batch).await,
            ProtocolTask::ConsensusProposal(proposal) => {
                service.handle_consensus_proposal(proposal).await;
            }
            ProtocolTask::JoinPhaseOne(request, reply_tx) => {
                let response = service.handle_join_phase_one(request).await;
                if reply_tx.send(response).is_err() {
                    debug!("join phase one caller went away before the reply");
                }
            }
            ProtocolTask::JoinPhaseTwo(request, reply_tx) => {
                let response = service.handle_join_phase_two(request).await;
                if reply_tx.send(response).is_err() {
                    debug!("join phase two caller went away before the reply");
                }
            }
            ProtocolTask::Probe(request, reply_tx) => {
                let response = service.handle_probe(request).await;
                if reply_tx.send(response).is_err() {
                    debug!("probe caller went away before the reply");
                }
            }
        }
    }
}

/// Membership gRPC server.
///
/// The server can start accepting connections before the membership
/// service exists; protocol calls are held at the boundary until
/// [`set_membership_service`](Self::set_membership_service) binds one.
///
/// # Lifecycle
///
/// [`new`](Self::new) -> [`start`](Self::start) ->
/// [`set_membership_service`](Self::set_membership_service) ->
/// [`shutdown`](Self::shutdown), each at most once.
pub struct TransportServer {
    listen_addr: SocketAddr,
    local_addr: Option<SocketAddr>,
    shared: Arc<Shared>,
    handler: Option<MembershipGrpc>,
    task_rx: Option<mpsc::Receiver<ProtocolTask>>,
    shutdown: CancellationToken,
    serve_handle: Option<JoinHandle<Result<(), tonic::transport::Error>>>,
    worker_handle: Option<JoinHandle<()>>,
}

impl TransportServer {
    /// Creates a server that will listen on `listen_addr`. Port `0` binds
    /// an ephemeral port, reported by [`local_addr`](Self::local_addr)
    /// after [`start`](Self::start).
    pub fn new(listen_addr: SocketAddr) -> Self {
        let shared = Arc::new(Shared {
            service: OnceLock::new(),
            dispatch: DeferredDispatch::new(),
        });
        let (task_tx, task_rx) = mpsc::channel(PROTOCOL_QUEUE_DEPTH);

        Self {
            listen_addr,
            local_addr: None,
            handler: Some(MembershipGrpc {
                shared: Arc::clone(&shared),
                task_tx,
            }),
            task_rx: Some(task_rx),
            shared,
            shutdown: CancellationToken::new(),
            serve_handle: None,
            worker_handle: None,
        }
    }

    /// Binds the listener and starts serving.
    ///
    /// # Errors
    ///
    /// Fails if the socket cannot be bound or the server was already
    /// started.
    pub async fn start(&mut self) -> Result<(), TransportError> {
        let handler = self.handler.take().ok_or(TransportError::AlreadyStarted)?;
        let task_rx = self.task_rx.take().ok_or(TransportError::AlreadyStarted)?;

        let listener = TcpListener::bind(self.listen_addr).await?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        self.worker_handle = Some(tokio::spawn(protocol_worker(
            task_rx,
            Arc::clone(&self.shared),
        )));

        let service = MembershipServer::new(handler);
        let shutdown = self.shutdown.clone();
        self.serve_handle = Some(tokio::spawn(async move {
            Server::builder()
                .add_service(service)
                .serve_with_incoming_shutdown(
                    TcpListenerStream::new(listener),
                    shutdown.cancelled_owned(),
                )
                .await
        }));

        debug!(addr = %local_addr, "membership transport listening");
        Ok(())
    }

    /// Address the listener is bound to; `None` before
    /// [`start`](Self::start).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Binds the membership service and releases held calls.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AlreadyBound`] on the second call; the
    /// bound service is unchanged.
    pub fn set_membership_service(
        &self,
        service: Arc<dyn MembershipService>,
    ) -> Result<(), TransportError> {
        self.shared
            .service
            .set(service)
            .map_err(|_| TransportError::AlreadyBound)?;
        self.shared.dispatch.release();
        debug!("membership service bound, releasing held calls");
        Ok(())
    }

    /// Stops the transport, then the membership service, then the
    /// protocol executor.
    ///
    /// Both the listener and the protocol executor get a zero-timeout
    /// await and are then terminated, so held or in-flight calls cannot
    /// stall shutdown.
    ///
    /// # Errors
    ///
    /// Surfaces the serve task's transport error, if it died with one.
    /// Shutdown still runs to completion in that case.
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        let mut result = Ok(());

        self.shutdown.cancel();
        if let Some(mut handle) = self.serve_handle.take() {
            match timeout(Duration::ZERO, &mut handle).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(err))) => result = Err(TransportError::GrpcTransport(err)),
                Ok(Err(err)) => warn!(error = %err, "serve task panicked"),
                Err(_) => {
                    handle.abort();
                    let _ = handle.await;
                }
            }
        }

        // If the server never started, these still hold the queue open.
        self.handler = None;
        self.task_rx = None;

        if let Some(service) = self.shared.service.get() {
            service.shutdown().await;
        }

        if let Some(mut handle) = self.worker_handle.take() {
            if timeout(Duration::ZERO, &mut handle).await.is_err() {
                handle.abort();
                let _ = handle.await;
            }
        }
        debug!("membership transport stopped");
        result
    }
}
