//! Reconnect simulator
//!
//! Builds a random tree for the learner, edits a copy of it for the teacher,
//! runs one full session between them and reports what was sent.
//!
//! # Example
//!
//! ```no_run
//! use reconnect_sim::{run, SimConfig};
//!
//! #[tokio::main]
//! async fn main() -> reconnect_protocol::Result<()> {
//!     let report = run(&SimConfig::default()).await?;
//!     assert!(report.converged);
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use reconnect_merkle::{CustomRootRegistry, MerkleLearnerView, MerkleTeacherView, TreeGenerator};
use reconnect_protocol::{
    ClassId, Error, LearningSynchronizer, ReconnectConfig, ReconnectNodeCount, Result, SessionReport, TeacherStats,
    TeachingSynchronizer,
};
use reconnect_stream::{connect, Connection, ReconnectListener, TransportConfig};
use serde::Serialize;
use tracing::{debug, info};

/// Class of the custom view containers the simulator generates.
pub const SIM_CUSTOM_CLASS: ClassId = ClassId(0x5eed);

const DUPLEX_BUFFER: usize = 256 * 1024;

/// How the two peers are connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// In-process `tokio::io::duplex` pipe.
    Duplex,
    /// TCP over the loopback interface.
    Tcp,
}

/// Simulation parameters.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub seed: u64,
    /// Size of the learner's tree.
    pub nodes: usize,
    /// Edits applied to produce the teacher's tree.
    pub mutations: usize,
    /// Share of internal nodes generated as custom view roots.
    pub custom_probability: f64,
    /// Learner starts without any tree.
    pub empty_learner: bool,
    pub transport: TransportKind,
    pub reconnect: ReconnectConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            nodes: 1000,
            mutations: 20,
            custom_probability: 0.05,
            empty_learner: false,
            transport: TransportKind::Duplex,
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Outcome of one simulated session.
#[derive(Debug, Serialize)]
pub struct SimReport {
    pub seed: u64,
    pub transport: TransportKind,
    pub teacher_nodes: usize,
    pub learner_nodes: usize,
    /// Whether the learner's new root hashes equal to the teacher's.
    pub converged: bool,
    pub elapsed_ms: u64,
    pub teacher: SessionReport<TeacherStats>,
    pub learner: SessionReport<ReconnectNodeCount>,
}

/// Run one teacher/learner session as described by `config`.
pub async fn run(config: &SimConfig) -> Result<SimReport> {
    if !(0.0..=1.0).contains(&config.custom_probability) {
        return Err(Error::Config(format!(
            "custom probability must be within 0..=1, got {}",
            config.custom_probability
        )));
    }
    let mut generator =
        TreeGenerator::new(config.seed).with_custom_class(SIM_CUSTOM_CLASS, config.custom_probability);
    let stale = generator.tree(config.nodes);
    let fresh = generator.mutate(&stale, config.mutations);
    let learner_root = (!config.empty_learner).then(|| stale.clone());

    let teacher_nodes = fresh.subtree_size();
    let learner_nodes = learner_root.as_ref().map_or(0, |root| root.subtree_size());
    info!(
        seed = config.seed,
        teacher_nodes,
        learner_nodes,
        transport = ?config.transport,
        "starting simulation"
    );

    let (teacher_conn, learner_conn) = connect_pair(config.transport, &config.reconnect).await?;
    let registry = Arc::new(CustomRootRegistry::new().with_class(SIM_CUSTOM_CLASS));
    let teacher_view = MerkleTeacherView::new(registry.clone(), config.reconnect.max_ack_delay);
    let learner_view = MerkleLearnerView::new(learner_root, registry);

    let started = Instant::now();
    let teacher = TeachingSynchronizer::new(teacher_conn, config.reconnect.clone());
    let learner = LearningSynchronizer::new(learner_conn, config.reconnect.clone());
    let (taught, learned) = tokio::join!(
        teacher.synchronize(fresh.clone(), teacher_view),
        learner.synchronize(learner_view),
    );
    let teacher_report = taught?;
    let learned = learned?;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let converged = learned.root.hash() == fresh.hash();
    info!(converged, elapsed_ms, "simulation finished");

    Ok(SimReport {
        seed: config.seed,
        transport: config.transport,
        teacher_nodes,
        learner_nodes,
        converged,
        elapsed_ms,
        teacher: teacher_report,
        learner: learned.report,
    })
}

/// Teacher and learner ends of a fresh connection.
async fn connect_pair(kind: TransportKind, config: &ReconnectConfig) -> Result<(Connection, Connection)> {
    match kind {
        TransportKind::Duplex => Ok(Connection::duplex(DUPLEX_BUFFER, config.stream_config())),
        TransportKind::Tcp => {
            let transport = TransportConfig {
                bind: SocketAddr::from(([127, 0, 0, 1], 0)),
                ..TransportConfig::default()
            };
            let listener = ReconnectListener::bind(&transport, config.stream_config())?;
            let addr = listener.local_addr()?;
            let (accepted, dialed) = tokio::join!(
                listener.accept(),
                connect(addr, &transport, config.stream_config())
            );
            let (teacher, peer) = accepted?;
            debug!("learner connected from {}", peer);
            Ok((teacher, dialed?))
        }
    }
}
