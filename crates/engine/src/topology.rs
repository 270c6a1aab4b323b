//! Overlay topology: an undirected weighted graph over peers.
//!
//! Immutable after generation. Peers are numbered 1..=N and every edge
//! carries a fixed one-way latency in milliseconds. Two generation modes:
//!
//! - **Full mesh**: every pair of peers is connected; delays are drawn from
//!   a normal distribution, clamped to the configured range and scaled by
//!   the delay multiplier.
//! - **Partial**: each peer is given a target degree drawn uniformly from
//!   the configured range and a bounded rejection loop picks random
//!   partners. The attempt cap means some peers may end up under their
//!   target degree; the graph is used as built.
//!
//! Adjacency lists are insertion-ordered, so neighbour iteration is
//! deterministic for a fixed generation seed.

use meshsim_types::PeerId;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

/// Mean of the edge-delay distribution, in milliseconds.
const DELAY_MEAN_MS: f64 = 100.0;

/// Standard deviation of the edge-delay distribution, in milliseconds.
const DELAY_STDDEV_MS: f64 = 50.0;

/// Candidate draws per peer before partial generation gives up on its
/// target degree.
const MAX_EDGE_ATTEMPTS: u32 = 1000;

/// Configuration for topology generation.
#[derive(Debug, Clone)]
pub struct TopologyConfig {
    /// Number of peers in the overlay.
    pub num_peers: u32,

    /// Connect every pair of peers instead of sampling a partial graph.
    pub full_mesh: bool,

    /// Minimum target degree per peer (partial mode).
    pub min_connections: u32,

    /// Hard cap on the degree of any peer (partial mode).
    pub max_connections: u32,

    /// Lower clamp for sampled edge delays, in milliseconds.
    pub delay_min_ms: u32,

    /// Upper clamp for sampled edge delays, in milliseconds.
    pub delay_max_ms: u32,

    /// Multiplier applied to each clamped delay.
    pub delay_multiplier: u32,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            num_peers: 30,
            full_mesh: false,
            min_connections: 3,
            max_connections: 12,
            delay_min_ms: 10,
            delay_max_ms: 200,
            delay_multiplier: 1,
        }
    }
}

impl TopologyConfig {
    /// Create a new topology configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of peers.
    pub fn with_num_peers(mut self, num_peers: u32) -> Self {
        self.num_peers = num_peers;
        self
    }

    /// Enable or disable full-mesh generation.
    pub fn with_full_mesh(mut self, full_mesh: bool) -> Self {
        self.full_mesh = full_mesh;
        self
    }

    /// Set the per-peer degree range for partial generation.
    pub fn with_connections(mut self, min: u32, max: u32) -> Self {
        self.min_connections = min;
        self.max_connections = max;
        self
    }

    /// Set the clamp range for sampled edge delays.
    pub fn with_delay_range(mut self, min_ms: u32, max_ms: u32) -> Self {
        self.delay_min_ms = min_ms;
        self.delay_max_ms = max_ms;
        self
    }

    /// Set the delay multiplier.
    pub fn with_delay_multiplier(mut self, multiplier: u32) -> Self {
        self.delay_multiplier = multiplier;
        self
    }
}

/// One adjacency entry: a neighbour and the latency of the connecting edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    /// The neighbouring peer.
    pub peer: PeerId,

    /// Fixed one-way latency of the edge, in milliseconds.
    pub latency_ms: u32,
}

/// Immutable overlay graph.
#[derive(Debug, Clone)]
pub struct Topology {
    /// Adjacency lists indexed by `peer.0 - 1`, in insertion order.
    adjacency: Vec<Vec<Link>>,
}

impl Topology {
    /// Generate a topology from the given configuration.
    pub fn generate(config: &TopologyConfig, rng: &mut ChaCha8Rng) -> Self {
        assert!(
            config.min_connections <= config.max_connections,
            "min_connections {} exceeds max_connections {}",
            config.min_connections,
            config.max_connections,
        );
        assert!(
            config.delay_min_ms <= config.delay_max_ms,
            "delay_min_ms {} exceeds delay_max_ms {}",
            config.delay_min_ms,
            config.delay_max_ms,
        );

        let n = config.num_peers;
        let mut topology = Self {
            adjacency: vec![Vec::new(); n as usize],
        };
        let delay = Normal::new(DELAY_MEAN_MS, DELAY_STDDEV_MS).expect("valid delay distribution");

        if config.full_mesh {
            // Every pair gets one edge; the degree cap does not apply.
            for i in 1..=n {
                for j in (i + 1)..=n {
                    let latency = sample_delay(&delay, config, rng);
                    topology.add_edge(PeerId(i), PeerId(j), latency, n);
                }
            }
        } else {
            for i in 1..=n {
                let peer = PeerId(i);
                let target =
                    rng.gen_range(config.min_connections..=config.max_connections) as usize;
                let mut added = 0usize;
                let mut attempts = 0;
                while added < target
                    && topology.degree(peer) < config.max_connections as usize
                    && attempts < MAX_EDGE_ATTEMPTS
                {
                    let candidate = PeerId(rng.gen_range(1..=n));
                    if candidate != peer
                        && topology.latency(peer, candidate).is_none()
                        && topology.degree(candidate) < config.max_connections as usize
                    {
                        let latency = sample_delay(&delay, config, rng);
                        if topology.add_edge(peer, candidate, latency, config.max_connections) {
                            added += 1;
                        }
                    }
                    attempts += 1;
                }
                if added < target {
                    debug!(
                        peer = peer.0,
                        target,
                        added,
                        "Peer under-connected after attempt cap"
                    );
                }
            }
        }

        topology
    }

    /// Build a topology from an explicit edge list.
    ///
    /// Edges are `(a, b, latency_ms)` with peers numbered 1..=`num_peers`.
    /// Duplicate pairs and self-edges are rejected by panic. This is the
    /// entry point for drivers that bring their own graph generator.
    pub fn from_edges(num_peers: u32, edges: &[(u32, u32, u32)]) -> Self {
        let mut topology = Self {
            adjacency: vec![Vec::new(); num_peers as usize],
        };
        for &(a, b, latency_ms) in edges {
            let inserted = topology.add_edge(PeerId(a), PeerId(b), latency_ms, num_peers);
            assert!(inserted, "invalid or duplicate edge ({a}, {b})");
        }
        topology
    }

    /// Number of peers in the overlay.
    pub fn num_peers(&self) -> u32 {
        self.adjacency.len() as u32
    }

    /// Iterate over all peer ids.
    pub fn peers(&self) -> impl Iterator<Item = PeerId> {
        (1..=self.num_peers()).map(PeerId)
    }

    /// The neighbours of a peer, with edge latencies.
    pub fn neighbours(&self, peer: PeerId) -> &[Link] {
        &self.adjacency[Self::idx(peer)]
    }

    /// Degree of a peer.
    pub fn degree(&self, peer: PeerId) -> usize {
        self.adjacency[Self::idx(peer)].len()
    }

    /// Latency of the edge between two peers, if one exists.
    pub fn latency(&self, a: PeerId, b: PeerId) -> Option<u32> {
        self.adjacency[Self::idx(a)]
            .iter()
            .find(|link| link.peer == b)
            .map(|link| link.latency_ms)
    }

    /// Insert a symmetric edge. Returns false if the edge is a self-edge,
    /// already present, or would push either endpoint past `max_degree`.
    fn add_edge(&mut self, a: PeerId, b: PeerId, latency_ms: u32, max_degree: u32) -> bool {
        if a == b || self.latency(a, b).is_some() {
            return false;
        }
        if self.degree(a) >= max_degree as usize || self.degree(b) >= max_degree as usize {
            return false;
        }
        self.adjacency[Self::idx(a)].push(Link {
            peer: b,
            latency_ms,
        });
        self.adjacency[Self::idx(b)].push(Link {
            peer: a,
            latency_ms,
        });
        true
    }

    fn idx(peer: PeerId) -> usize {
        debug_assert!(peer.0 >= 1, "peer ids start at 1");
        (peer.0 - 1) as usize
    }
}

/// Sample one edge delay: normal draw, clamped, then scaled.
fn sample_delay(delay: &Normal<f64>, config: &TopologyConfig, rng: &mut ChaCha8Rng) -> u32 {
    let raw = delay.sample(rng) as i64;
    let clamped = raw.clamp(config.delay_min_ms as i64, config.delay_max_ms as i64) as u32;
    clamped * config.delay_multiplier
}
