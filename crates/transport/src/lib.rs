//! gRPC transport layer for the cohort membership service.
//!
//! This crate hosts the server side of the membership protocol. It uses
//! tonic with our own protobuf definitions and defers inbound protocol
//! calls until a [`MembershipService`] is bound, so the transport can be
//! opened before the bootstrap protocol has produced one.
//!
//! # Architecture
//!
//! - **Transport pool**: the tonic runtime runs the generated handlers;
//!   they do only short, non-blocking work.
//! - **Protocol executor**: a dedicated worker task drains a bounded queue
//!   of protocol tasks one at a time. Fire-and-forget RPCs are
//!   acknowledged as soon as their task is queued; join and probe replies
//!   ride a oneshot back to the transport runtime.
//! - **Deferred dispatch**: every protocol handler awaits a one-shot latch
//!   that [`TransportServer::set_membership_service`] releases. Probes
//!   arriving before that are answered with `BOOTSTRAPPING` instead of
//!   being held.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cohort_transport::{proto, MembershipService, TransportServer};
//!
//! struct Service;
//!
//! #[tonic::async_trait]
//! impl MembershipService for Service {
//!     async fn handle_link_updates(&self, _batch: proto::BatchedLinkUpdateRequest) {}
//!
//!     async fn handle_consensus_proposal(&self, _proposal: proto::ConsensusProposalRequest) {}
//!
//!     async fn handle_join_phase_one(&self, request: proto::JoinRequest) -> proto::JoinResponse {
//!         proto::JoinResponse {
//!             sender: request.sender,
//!             status: proto::JoinStatus::SafeToJoin.into(),
//!             ..Default::default()
//!         }
//!     }
//!
//!     async fn handle_join_phase_two(&self, request: proto::JoinRequest) -> proto::JoinResponse {
//!         proto::JoinResponse {
//!             sender: request.sender,
//!             status: proto::JoinStatus::SafeToJoin.into(),
//!             ..Default::default()
//!         }
//!     }
//!
//!     async fn handle_probe(&self, _request: proto::ProbeRequest) -> proto::ProbeResponse {
//!         proto::ProbeResponse {
//!             status: proto::NodeStatus::Ok.into(),
//!         }
//!     }
//! }
//!
//! # async fn example() -> Result<(), cohort_transport::TransportError> {
//! let mut server = TransportServer::new("0.0.0.0:5872".parse().unwrap());
//! server.start().await?;
//!
//! // Protocol calls are now held at the boundary. Once the bootstrap
//! // protocol has a membership service, bind it to release them.
//! server.set_membership_service(Arc::new(Service))?;
//! # Ok(())
//! # }
//! ```

pub mod convert;
pub mod deferred;
pub mod error;
pub mod server;

// Include the generated protobuf code
pub mod proto {
    tonic::include_proto!("cohort");
}

// Re-export main types for convenience
pub use deferred::DeferredDispatch;
pub use error::TransportError;
pub use proto::membership_client::MembershipClient;
pub use server::{MembershipService, TransportServer};
