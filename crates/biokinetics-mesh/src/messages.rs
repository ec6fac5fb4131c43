// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Typed meshing messages
//!
//! A coordinator talks to a mesh through a pair of bounded crossbeam
//! channels. The mesh side never blocks: [`MeshingPort::pump`] drains what is
//! queued and answers each request in order. A request is only taken off the
//! queue once its reply has room, so a full reply queue leaves requests
//! waiting instead of applying them unanswered.

use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use tracing::{trace, warn};

use crate::chem_mesh::{ChemMesh, MeshStats};
use crate::decomposition::MeshSplit;
use crate::error::{MeshError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum MeshingRequest {
    NodeInfo {
        num_nodes: usize,
        threads_per_node: usize,
    },
    RequestStats,
    ResetStencil,
    BuildDefaultMesh {
        size: f64,
        num_entries: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MeshingReply {
    Split(MeshSplit),
    Stats(MeshStats),
    StencilReset,
    Rebuilt { num_entries: usize },
    Failed(MeshError),
}

/// Coordinator end
#[derive(Debug, Clone)]
pub struct MeshingClient {
    pub requests: Sender<MeshingRequest>,
    pub replies: Receiver<MeshingReply>,
}

impl MeshingClient {
    pub fn send(&self, request: MeshingRequest) -> Result<()> {
        self.requests.try_send(request).map_err(|e| match e {
            TrySendError::Full(_) => MeshError::Backpressure,
            TrySendError::Disconnected(_) => MeshError::Disconnected,
        })
    }

    /// Replies available right now
    pub fn drain_replies(&self) -> Vec<MeshingReply> {
        self.replies.try_iter().collect()
    }
}

/// Mesh end
#[derive(Debug)]
pub struct MeshingPort {
    requests: Receiver<MeshingRequest>,
    replies: Sender<MeshingReply>,
    /// Answered but not yet delivered
    pending: Option<MeshingReply>,
}

pub fn meshing_channel(capacity: usize) -> (MeshingClient, MeshingPort) {
    let (request_tx, request_rx) = bounded(capacity);
    let (reply_tx, reply_rx) = bounded(capacity);
    (
        MeshingClient {
            requests: request_tx,
            replies: reply_rx,
        },
        MeshingPort {
            requests: request_rx,
            replies: reply_tx,
            pending: None,
        },
    )
}

fn answer(mesh: &mut ChemMesh, request: MeshingRequest) -> MeshingReply {
    match request {
        MeshingRequest::NodeInfo {
            num_nodes,
            threads_per_node,
        } => match mesh.handle_node_info(num_nodes, threads_per_node) {
            Ok(split) => MeshingReply::Split(split),
            Err(e) => MeshingReply::Failed(e),
        },
        MeshingRequest::RequestStats => MeshingReply::Stats(mesh.mesh_stats()),
        MeshingRequest::ResetStencil => {
            mesh.reset_stencil();
            MeshingReply::StencilReset
        }
        MeshingRequest::BuildDefaultMesh { size, num_entries } => {
            match mesh.build_default_mesh(size, num_entries) {
                Ok(()) => MeshingReply::Rebuilt {
                    num_entries: mesh.num_entries(),
                },
                Err(e) => MeshingReply::Failed(e),
            }
        }
    }
}

impl MeshingPort {
    /// Answer every queued request, returning how many replies were delivered
    ///
    /// Stops with `Backpressure` when requests remain but the reply queue is
    /// full; nothing is lost and the next call carries on.
    pub fn pump(&mut self, mesh: &mut ChemMesh) -> Result<usize> {
        let mut handled = 0;
        if let Some(reply) = self.pending.take() {
            self.deliver(mesh, reply)?;
            handled += 1;
        }
        loop {
            if self.replies.is_full() && !self.requests.is_empty() {
                warn!(target: "biokinetics-mesh", "{} reply queue full", mesh.id());
                return Err(MeshError::Backpressure);
            }
            let request = match self.requests.try_recv() {
                Ok(request) => request,
                Err(TryRecvError::Empty) => return Ok(handled),
                Err(TryRecvError::Disconnected) => {
                    return if handled > 0 {
                        Ok(handled)
                    } else {
                        Err(MeshError::Disconnected)
                    }
                }
            };
            trace!(target: "biokinetics-mesh", "{} handling {:?}", mesh.id(), request);
            let reply = answer(mesh, request);
            self.deliver(mesh, reply)?;
            handled += 1;
        }
    }

    /// Whether an answered reply is still waiting for queue space
    pub fn has_pending_reply(&self) -> bool {
        self.pending.is_some()
    }

    fn deliver(&mut self, mesh: &ChemMesh, reply: MeshingReply) -> Result<()> {
        match self.replies.try_send(reply) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(reply)) => {
                warn!(target: "biokinetics-mesh", "{} reply queue full, holding reply", mesh.id());
                self.pending = Some(reply);
                Err(MeshError::Backpressure)
            }
            Err(TrySendError::Disconnected(_)) => Err(MeshError::Disconnected),
        }
    }
}
