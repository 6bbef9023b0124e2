//! Common test utilities for transport integration tests.
//!
//! This module provides a watermark-buffer-backed membership service, a
//! helper for starting a server on an ephemeral port, and a condition
//! poller for awaiting asynchronous protocol effects.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cohort_common::Endpoint;
use cohort_membership::{Proposal, WatermarkBuffer};
use cohort_transport::convert::link_update_from_proto;
use cohort_transport::{proto, MembershipClient, MembershipService, TransportServer};
use tokio::time::{sleep, Instant};
use tonic::transport::Channel;

/// Membership service that drives a watermark buffer from inbound link
/// updates and records every emitted proposal.
pub struct BufferBackedService {
    buffer: WatermarkBuffer,
    emitted: Mutex<Vec<Proposal>>,
    config_id: u64,
}

impl BufferBackedService {
    /// Creates a service around a buffer with the given thresholds.
    ///
    /// # Panics
    ///
    /// Panics if the thresholds are invalid.
    pub fn new(k: u32, h: u32, l: u32) -> Self {
        Self {
            buffer: WatermarkBuffer::new(k, h, l).expect("valid thresholds"),
            emitted: Mutex::new(Vec::new()),
            config_id: 1,
        }
    }

    /// Proposals emitted so far, in emission order.
    pub fn proposals(&self) -> Vec<Proposal> {
        self.emitted.lock().expect("emitted lock poisoned").clone()
    }

    /// Counter of the underlying buffer.
    pub fn num_proposals(&self) -> u64 {
        self.buffer.num_proposals()
    }
}

#[tonic::async_trait]
impl MembershipService for BufferBackedService {
    async fn handle_link_updates(&self, batch: proto::BatchedLinkUpdateRequest) {
        for update in batch.updates {
            let update = match link_update_from_proto(update) {
                Ok(update) => update,
                Err(_) => continue,
            };
            let proposal = self.buffer.receive(&update);
            if !proposal.is_empty() {
                self.emitted
                    .lock()
                    .expect("emitted lock poisoned")
                    .push(proposal);
            }
        }
    }

    async fn handle_consensus_proposal(&self, _proposal: proto::ConsensusProposalRequest) {}

    async fn handle_join_phase_one(&self, request: proto::JoinRequest) -> proto::JoinResponse {
        proto::JoinResponse {
            sender: request.sender,
            status: proto::JoinStatus::SafeToJoin.into(),
            config_id: self.config_id,
            endpoints: Vec::new(),
        }
    }

    async fn handle_join_phase_two(&self, request: proto::JoinRequest) -> proto::JoinResponse {
        proto::JoinResponse {
            sender: request.sender,
            status: proto::JoinStatus::SafeToJoin.into(),
            config_id: self.config_id,
            endpoints: vec![wire_endpoint("seed", 5872)],
        }
    }

    async fn handle_probe(&self, _request: proto::ProbeRequest) -> proto::ProbeResponse {
        proto::ProbeResponse {
            status: proto::NodeStatus::Ok.into(),
        }
    }
}

/// Starts a server on an ephemeral loopback port and connects a client.
pub async fn start_server() -> (TransportServer, MembershipClient<Channel>) {
    let mut server = TransportServer::new("127.0.0.1:0".parse().unwrap());
    server.start().await.expect("server starts");
    let addr = server.local_addr().expect("listener bound");

    let client = MembershipClient::connect(format!("http://{addr}"))
        .await
        .expect("client connects");

    (server, client)
}

/// Polls `condition` until it holds or `timeout` elapses.
pub async fn wait_until<F>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + timeout;
    while !condition() {
        if Instant::now() >= deadline {
            return false;
        }
        sleep(Duration::from_millis(10)).await;
    }
    true
}

/// Builds a wire endpoint.
pub fn wire_endpoint(host: &str, port: u16) -> proto::Endpoint {
    proto::Endpoint {
        host: host.to_string(),
        port: u32::from(port),
    }
}

/// Builds a domain endpoint matching [`wire_endpoint`].
pub fn domain_endpoint(host: &str, port: u16) -> Endpoint {
    Endpoint::new(host, port)
}

/// Builds a batch of DOWN reports for the given `(src, dst)` pairs.
pub fn batched_updates(sender: &str, edges: &[(&str, &str)]) -> proto::BatchedLinkUpdateRequest {
    proto::BatchedLinkUpdateRequest {
        sender: Some(wire_endpoint(sender, 5872)),
        updates: edges
            .iter()
            .map(|(src, dst)| proto::LinkUpdate {
                src: Some(wire_endpoint(src, 5872)),
                dst: Some(wire_endpoint(dst, 5872)),
                status: proto::LinkStatus::Down.into(),
                config_id: 1,
            })
            .collect(),
    }
}
