//! Arena-allocated search tree with PUCT selection.
//!
//! Nodes live in a single `Vec` and refer to each other by [`NodeId`]; the
//! root is always index 0. Statistics are kept on edges: an edge's value
//! sum is from the perspective of the side to move at the edge's parent, so
//! selection simply maximizes
//!
//! ```text
//! Q(edge) + c_puct * P(edge) * sqrt(N(parent)) / (1 + N(edge))
//! ```
//!
//! In-flight simulations add virtual visits to the edges and nodes they
//! pass through. A virtual visit counts towards N and charges
//! `virtual_loss` against Q until it is released.

use crate::config::SearchConfig;
use crate::movegen::Move;
use crate::position::Position;

/// Handle of a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An outgoing move of an expanded node and its statistics.
#[derive(Debug, Clone)]
pub struct Edge {
    mv: Move,
    prior: f64,
    visits: u32,
    value_sum: f64,
    virtual_visits: u32,
    child: Option<NodeId>,
}

impl Edge {
    fn new(mv: Move, prior: f64) -> Self {
        Self {
            mv,
            prior,
            visits: 0,
            value_sum: 0.0,
            virtual_visits: 0,
            child: None,
        }
    }

    #[inline]
    pub fn mv(&self) -> Move {
        self.mv
    }

    #[inline]
    pub fn prior(&self) -> f64 {
        self.prior
    }

    #[inline]
    pub fn visits(&self) -> u32 {
        self.visits
    }

    #[inline]
    pub fn value_sum(&self) -> f64 {
        self.value_sum
    }

    #[inline]
    pub fn virtual_visits(&self) -> u32 {
        self.virtual_visits
    }

    /// Mean value, or `None` before the first completed visit.
    pub fn q(&self) -> Option<f64> {
        (self.visits > 0).then(|| self.value_sum / self.visits as f64)
    }

    #[inline]
    pub fn child(&self) -> Option<NodeId> {
        self.child
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeState {
    Unexpanded,
    Expanded,
    /// Game over; the value is from the side to move.
    Terminal(f64),
}

#[derive(Debug, Clone)]
pub struct Node {
    edges: Vec<Edge>,
    state: NodeState,
    visits: u32,
    value_sum: f64,
    virtual_visits: u32,
}

impl Node {
    fn new() -> Self {
        Self {
            edges: Vec::new(),
            state: NodeState::Unexpanded,
            visits: 0,
            value_sum: 0.0,
            virtual_visits: 0,
        }
    }

    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[inline]
    pub fn state(&self) -> NodeState {
        self.state
    }

    #[inline]
    pub fn visits(&self) -> u32 {
        self.visits
    }

    #[inline]
    pub fn virtual_visits(&self) -> u32 {
        self.virtual_visits
    }

    /// Mean backed-up value from the side to move here; 0 when unvisited.
    pub fn q(&self) -> f64 {
        if self.visits > 0 {
            self.value_sum / self.visits as f64
        } else {
            0.0
        }
    }
}

/// One step of a root-to-leaf path: the node and the index of the edge
/// taken out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    pub node: NodeId,
    pub edge: usize,
}

/// The result of one selection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descent {
    pub path: Vec<PathStep>,
    pub leaf: NodeId,
}

impl Descent {
    /// Moves made on the scratch position to reach the leaf.
    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

/// Virtual loss held by one in-flight simulation.
///
/// The only way to get the descent back is to hand the lease to
/// [`SearchTree::release_virtual_loss`], so each application is released
/// exactly once.
#[derive(Debug)]
#[must_use = "virtual loss stays on the tree until the lease is released"]
pub struct VirtualLoss {
    descent: Descent,
}

impl VirtualLoss {
    pub fn leaf(&self) -> NodeId {
        self.descent.leaf
    }

    pub fn path(&self) -> &[PathStep] {
        &self.descent.path
    }
}

/// The search tree.
#[derive(Debug, Clone)]
pub struct SearchTree {
    nodes: Vec<Node>,
    c_puct: f64,
    virtual_loss: f64,
    fpu_reduction: f64,
}

impl SearchTree {
    /// A tree holding only an unexpanded root.
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            nodes: vec![Node::new()],
            c_puct: config.c_puct,
            virtual_loss: config.virtual_loss,
            fpu_reduction: config.fpu_reduction,
        }
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn root(&self) -> &Node {
        self.node(NodeId::ROOT)
    }

    /// Number of allocated nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new());
        id
    }

    /// Attach edges to an unexpanded node. Returns `false` (and changes
    /// nothing) if the node was already expanded or terminal.
    pub fn expand(&mut self, id: NodeId, moves: &[Move], priors: &[f64]) -> bool {
        let node = &mut self.nodes[id.index()];
        if node.state != NodeState::Unexpanded {
            return false;
        }
        node.edges = moves
            .iter()
            .zip(priors)
            .map(|(&mv, &p)| Edge::new(mv, p))
            .collect();
        node.state = NodeState::Expanded;
        true
    }

    pub fn mark_terminal(&mut self, id: NodeId, value: f64) {
        self.nodes[id.index()].state = NodeState::Terminal(value);
    }

    /// Mix normalized noise into the root priors:
    /// `P <- (1 - eps) * P + eps * noise * sum(P)`.
    ///
    /// Scaling by the prior total keeps the noise proportionate when priors
    /// are raw weights rather than probabilities.
    pub fn mix_root_noise(&mut self, noise: &[f64], epsilon: f64) {
        let root = &mut self.nodes[NodeId::ROOT.index()];
        let total: f64 = root.edges.iter().map(|e| e.prior).sum();
        let scale = if total > 0.0 { total } else { 1.0 };
        for (edge, &n) in root.edges.iter_mut().zip(noise) {
            edge.prior = (1.0 - epsilon) * edge.prior + epsilon * n * scale;
        }
    }

    /// Walk from the root to a leaf, making each selected move on `pos`.
    ///
    /// `pos` must be the position of the root. Edge moves were generated for
    /// their node, so they are applied without another legality check.
    /// Children are allocated the first time their edge is taken. The caller
    /// owns undoing the `depth()` moves made on `pos`.
    pub fn descend(&mut self, pos: &mut Position, rng: &mut fastrand::Rng) -> Descent {
        let mut path = Vec::new();
        let mut id = NodeId::ROOT;
        while self.node(id).state == NodeState::Expanded && !self.node(id).edges.is_empty() {
            let edge = self.select_edge(id, rng);
            pos.apply(self.nodes[id.index()].edges[edge].mv);
            path.push(PathStep { node: id, edge });
            id = match self.nodes[id.index()].edges[edge].child {
                Some(child) => child,
                None => {
                    let child = self.allocate();
                    self.nodes[id.index()].edges[edge].child = Some(child);
                    child
                }
            };
        }
        Descent { path, leaf: id }
    }

    /// Index of the edge with the highest PUCT score. Exact ties are broken
    /// uniformly with `rng`, which is only drawn from when a tie exists.
    pub fn select_edge(&self, id: NodeId, rng: &mut fastrand::Rng) -> usize {
        let node = self.node(id);
        let sqrt_n = ((node.visits + node.virtual_visits) as f64).sqrt();
        let unvisited_q = self.first_play_value(node);

        let scores: Vec<f64> = node
            .edges
            .iter()
            .map(|e| self.score(e, sqrt_n, unvisited_q))
            .collect();
        let best = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let tied = scores.iter().filter(|&&s| s == best).count();
        let pick = if tied > 1 { rng.usize(..tied) } else { 0 };
        scores
            .iter()
            .enumerate()
            .filter(|&(_, &s)| s == best)
            .nth(pick)
            .map_or(0, |(i, _)| i)
    }

    fn score(&self, edge: &Edge, sqrt_parent: f64, unvisited_q: f64) -> f64 {
        let n = edge.visits + edge.virtual_visits;
        let q = if n > 0 {
            (edge.value_sum - self.virtual_loss * edge.virtual_visits as f64) / n as f64
        } else {
            unvisited_q
        };
        q + self.c_puct * edge.prior * sqrt_parent / (1.0 + n as f64)
    }

    fn first_play_value(&self, node: &Node) -> f64 {
        if self.fpu_reduction > 0.0 && node.visits > 0 {
            (node.q() - self.fpu_reduction / (node.visits as f64).sqrt()).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }

    /// Mark every edge and node on the descent as in flight.
    pub fn apply_virtual_loss(&mut self, descent: Descent) -> VirtualLoss {
        for step in &descent.path {
            let node = &mut self.nodes[step.node.index()];
            node.virtual_visits += 1;
            node.edges[step.edge].virtual_visits += 1;
        }
        self.nodes[descent.leaf.index()].virtual_visits += 1;
        VirtualLoss { descent }
    }

    /// Undo [`SearchTree::apply_virtual_loss`] and return the descent for
    /// its real backup.
    pub fn release_virtual_loss(&mut self, lease: VirtualLoss) -> Descent {
        let descent = lease.descent;
        for step in &descent.path {
            let node = &mut self.nodes[step.node.index()];
            node.virtual_visits = node.virtual_visits.saturating_sub(1);
            let edge = &mut node.edges[step.edge];
            edge.virtual_visits = edge.virtual_visits.saturating_sub(1);
        }
        let leaf = &mut self.nodes[descent.leaf.index()];
        leaf.virtual_visits = leaf.virtual_visits.saturating_sub(1);
        descent
    }

    /// Back `value` (from the leaf's side to move) up the descent, negating
    /// at every ply. Each edge and node on the path gains one visit.
    pub fn backup(&mut self, descent: &Descent, value: f64) {
        let leaf = &mut self.nodes[descent.leaf.index()];
        leaf.visits += 1;
        leaf.value_sum += value;

        let mut v = value;
        for step in descent.path.iter().rev() {
            v = -v;
            let node = &mut self.nodes[step.node.index()];
            let edge = &mut node.edges[step.edge];
            edge.visits += 1;
            edge.value_sum += v;
            node.visits += 1;
            node.value_sum += v;
        }
    }

    /// Root moves with their completed visit counts, in move order.
    pub fn root_children(&self) -> Vec<(Move, u32)> {
        self.root().edges.iter().map(|e| (e.mv, e.visits)).collect()
    }

    /// Mean backed-up value at the root, from the root's side to move.
    pub fn root_value(&self) -> f64 {
        self.root().q()
    }

    pub fn root_visits(&self) -> u32 {
        self.root().visits
    }

    /// Total in-flight virtual visits on the tree; 0 between waves.
    pub fn outstanding_virtual_visits(&self) -> u64 {
        self.nodes
            .iter()
            .flat_map(|n| n.edges.iter())
            .map(|e| e.virtual_visits as u64)
            .sum()
    }
}

/// Turn evaluator weights into edge priors.
///
/// With `normalize`, weights are rescaled to sum to 1; an all-zero vector
/// becomes uniform. Otherwise weights are used as given.
pub fn priors_from_weights(weights: &[f64], normalize: bool) -> Vec<f64> {
    if !normalize || weights.is_empty() {
        return weights.to_vec();
    }
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        weights.iter().map(|w| w / total).collect()
    } else {
        vec![1.0 / weights.len() as f64; weights.len()]
    }
}
