//! The watermark buffer: a two-threshold filter over edge-health reports.
//!
//! Monitors report observations about their monitored edges as
//! [`LinkUpdate`]s. The buffer counts distinct reporters per destination
//! and emits a view-change [`Proposal`] about a destination only when:
//!
//! - `H` distinct monitors have reported it, and
//! - no other destination currently has at least `L` but fewer than `H`
//!   reports.
//!
//! Holding emission until the in-between band drains is what lets
//! independent failures observed by overlapping monitor sets land in a
//! single proposal, keeping the number of consensus rounds per fault
//! epoch low.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use cohort_common::Endpoint;
use tracing::debug;

use crate::config::{ConfigError, MembershipConfig, K_MIN};

/// Health transition a monitor reports about an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// The edge destination became reachable.
    Up,
    /// The edge destination stopped responding.
    Down,
}

/// A report that monitor `src` observed a status change on its edge to
/// `dst`.
///
/// The aggregation core consumes only `src` and `dst`; the status and
/// configuration id ride along for the layers above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkUpdate {
    /// The reporting monitor.
    pub src: Endpoint,
    /// The destination the report is about.
    pub dst: Endpoint,
    /// The observed transition.
    pub status: LinkStatus,
    /// Configuration epoch the observation was made in.
    pub config_id: u64,
}

impl LinkUpdate {
    /// Creates a report about the edge `src -> dst`.
    pub fn new(src: Endpoint, dst: Endpoint, status: LinkStatus, config_id: u64) -> Self {
        Self {
            src,
            dst,
            status,
            config_id,
        }
    }
}

/// A destination that crossed the high watermark, destined for a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    endpoint: Endpoint,
}

impl Node {
    /// Wraps a destination endpoint.
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    /// The wrapped endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

/// An immutable batch of nodes emitted as one view-change proposal.
///
/// Node order is the order in which destinations crossed the high
/// watermark within the batch. The snapshot is cheap to clone and can be
/// forwarded across threads without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    nodes: Arc<[Node]>,
}

impl Proposal {
    /// The empty proposal, returned by the common non-emitting case.
    pub fn empty() -> Self {
        Self {
            nodes: Arc::from(Vec::new()),
        }
    }

    /// Whether the proposal carries no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of nodes in the proposal.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// The proposed nodes in stabilization order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Iterates the proposed nodes in stabilization order.
    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }
}

impl From<Vec<Node>> for Proposal {
    fn from(nodes: Vec<Node>) -> Self {
        Self {
            nodes: Arc::from(nodes),
        }
    }
}

impl<'a> IntoIterator for &'a Proposal {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Aggregation state guarded by the buffer's single lock.
#[derive(Debug, Default)]
struct BufferState {
    /// Distinct reporters per destination. Entries are retained after
    /// emission with their sets cleared, so subsequent reports count from
    /// an empty baseline.
    reports_per_host: HashMap<Endpoint, HashSet<Endpoint>>,
    /// Destinations that crossed the high watermark but have not been
    /// emitted yet, in crossing order.
    proposal: Vec<Node>,
    /// Destinations currently sitting between the watermarks.
    updates_in_progress: u32,
    /// Total proposals emitted since construction.
    proposal_count: u64,
}

/// A filter that outputs a view-change proposal about a node only if:
/// - there are `H` reports about the node, and
/// - there is no other node with at least `L` but fewer than `H` reports.
///
/// All calls are serialized by the buffer's internal lock; `receive` never
/// blocks beyond that lock and never throws for flow control — emissions
/// are surfaced through the return value alone.
///
/// # Examples
///
/// ```
/// use cohort_common::Endpoint;
/// use cohort_membership::{LinkStatus, LinkUpdate, WatermarkBuffer};
///
/// let buffer = WatermarkBuffer::new(10, 3, 2).unwrap();
/// let dst = Endpoint::new("n1", 5872);
///
/// for monitor in ["m1", "m2"] {
///     let report = LinkUpdate::new(Endpoint::new(monitor, 5872), dst.clone(), LinkStatus::Down, 0);
///     assert!(buffer.receive(&report).is_empty());
/// }
///
/// let report = LinkUpdate::new(Endpoint::new("m3", 5872), dst.clone(), LinkStatus::Down, 0);
/// let proposal = buffer.receive(&report);
/// assert_eq!(proposal.len(), 1);
/// assert_eq!(proposal.nodes()[0].endpoint(), &dst);
/// ```
#[derive(Debug)]
pub struct WatermarkBuffer {
    high: u32,
    low: u32,
    state: Mutex<BufferState>,
}

impl WatermarkBuffer {
    /// Creates a buffer with fan-in `k`, high watermark `h`, and low
    /// watermark `l`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidThresholds`] unless
    /// `k >= h >= l >= 0` and `k >= 3`.
    pub fn new(k: u32, h: u32, l: u32) -> Result<Self, ConfigError> {
        if h > k || l > h || k < K_MIN {
            return Err(ConfigError::InvalidThresholds { k, h, l });
        }
        Ok(Self {
            high: h,
            low: l,
            state: Mutex::new(BufferState::default()),
        })
    }

    /// Creates a buffer from a validated [`MembershipConfig`].
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn from_config(config: &MembershipConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.monitors_per_node,
            config.high_watermark,
            config.low_watermark,
        )
    }

    /// Number of proposals emitted since construction.
    pub fn num_proposals(&self) -> u64 {
        self.state
            .lock()
            .expect("watermark buffer lock poisoned")
            .proposal_count
    }

    /// Feeds one report into the buffer and returns the emitted proposal,
    /// empty in the common case.
    ///
    /// A duplicate report (same `src` and `dst` as one already counted) is
    /// a complete no-op: the report set deduplicates structurally, so no
    /// threshold transition can fire.
    ///
    /// # Panics
    ///
    /// Panics if a destination pending emission has no report set. That
    /// state is unreachable through this API and indicates an accounting
    /// bug in the buffer itself.
    pub fn receive(&self, msg: &LinkUpdate) -> Proposal {
        let mut guard = self.state.lock().expect("watermark buffer lock poisoned");
        let state = &mut *guard;

        let num_reports = {
            let reports = state.reports_per_host.entry(msg.dst.clone()).or_default();
            if !reports.insert(msg.src.clone()) {
                return Proposal::empty();
            }
            reports.len() as u32
        };

        // A low watermark of zero makes a destination interesting from its
        // first distinct report.
        let entered_band = if self.low == 0 {
            num_reports == 1
        } else {
            num_reports == self.low
        };
        if entered_band {
            state.updates_in_progress += 1;
        }

        if num_reports == self.high {
            // Enough distinct reporters for `msg.dst` that it is safe to
            // act upon, provided no other destination still sits between
            // the watermarks.
            state.proposal.push(Node::new(msg.dst.clone()));
            state.updates_in_progress -= 1;

            if state.updates_in_progress == 0 {
                // Every destination that crossed the high watermark is now
                // part of a single proposal.
                state.proposal_count += 1;
                for node in &state.proposal {
                    let Some(reports) = state.reports_per_host.get_mut(node.endpoint()) else {
                        panic!(
                            "destination pending emission missing from report counters: {}",
                            node.endpoint()
                        );
                    };
                    reports.clear();
                }

                let proposal = Proposal::from(std::mem::take(&mut state.proposal));
                debug!(
                    nodes = proposal.len(),
                    total_proposals = state.proposal_count,
                    "emitting view-change proposal"
                );
                return proposal;
            }
        }

        Proposal::empty()
    }
}
