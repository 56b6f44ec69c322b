//! Specialized network flow algorithms
//!
//! Handles pure network structure (per edge capacities plus node flow
//! conservation, one commodity, no side constraints): min-cost flow via
//! successive shortest paths with node potentials, and max-flow via BFS
//! augmenting paths. Assignment problems are unit-supply min-cost flows and
//! are handled by the orchestrator on top of [`solve_min_cost`].
//!
//! Problems with side constraints or oversized networks fall back to the
//! general LP path in the orchestrator instead of this module.
use std::time::Instant;

use indexmap::IndexMap;
use log::debug;

use crate::optimize::solvers::SolverError;
use crate::optimize::OptimizationStatus;
use crate::utils::num;

/// A pure network flow problem
#[derive(Debug, Clone)]
pub struct FlowNetwork {
    /// Node ids, in declaration order
    pub nodes: Vec<String>,
    /// Net supply per node: positive for supply, negative for demand
    pub net_supply: Vec<f64>,
    /// Directed edges of the network
    pub edges: Vec<FlowEdge>,
}

/// A directed edge with capacity and per unit cost
#[derive(Debug, Clone)]
pub struct FlowEdge {
    /// Name used to key this edge's flow in the solution
    pub name: String,
    /// Index of the tail node
    pub from: usize,
    /// Index of the head node
    pub to: usize,
    /// Capacity; `f64::INFINITY` when uncapacitated
    pub capacity: f64,
    /// Cost per unit of flow
    pub cost: f64,
}

/// Outcome of a network flow solve
#[derive(Debug, Clone)]
pub struct FlowOutcome {
    pub status: OptimizationStatus,
    /// Total cost (min-cost) or total flow (max-flow)
    pub objective_value: Option<f64>,
    /// Flow per edge, keyed by edge name in input order
    pub flows: IndexMap<String, f64>,
    /// Explanation for infeasible outcomes
    pub message: Option<String>,
    pub solve_time: f64,
}

/// Residual arc used by both algorithms
struct ResidualArc {
    to: usize,
    capacity: f64,
    cost: f64,
    flow: f64,
    /// Index of the paired reverse arc in `arcs`
    reverse: usize,
    /// Index of the originating edge, None for reverse and auxiliary arcs
    edge: Option<usize>,
}

struct ResidualGraph {
    arcs: Vec<ResidualArc>,
    /// Arc indices leaving each node
    adjacency: Vec<Vec<usize>>,
}

impl ResidualGraph {
    fn new(num_nodes: usize) -> Self {
        ResidualGraph {
            arcs: Vec::new(),
            adjacency: vec![Vec::new(); num_nodes],
        }
    }

    fn add_arc(&mut self, from: usize, to: usize, capacity: f64, cost: f64, edge: Option<usize>) {
        let forward = self.arcs.len();
        self.arcs.push(ResidualArc {
            to,
            capacity,
            cost,
            flow: 0.0,
            reverse: forward + 1,
            edge,
        });
        self.arcs.push(ResidualArc {
            to: from,
            capacity: 0.0,
            cost: -cost,
            flow: 0.0,
            reverse: forward,
            edge: None,
        });
        self.adjacency[from].push(forward);
        self.adjacency[to].push(forward + 1);
    }

    fn residual(&self, arc: usize) -> f64 {
        self.arcs[arc].capacity - self.arcs[arc].flow
    }

    fn push(&mut self, arc: usize, amount: f64) {
        self.arcs[arc].flow += amount;
        let reverse = self.arcs[arc].reverse;
        self.arcs[reverse].flow -= amount;
    }
}

/// Solve a min-cost flow problem with successive shortest paths
///
/// Total supply must match total demand; an imbalanced network is an
/// infeasible *outcome* (with the totals in the message), matching the
/// behavior of specialized network libraries, not a hard error.
pub fn solve_min_cost(network: &FlowNetwork) -> Result<FlowOutcome, SolverError> {
    let start = Instant::now();
    let tolerance = num::tolerance();

    let total_supply: f64 = network.net_supply.iter().filter(|s| **s > 0.0).sum();
    let total_demand: f64 = -network
        .net_supply
        .iter()
        .filter(|s| **s < 0.0)
        .sum::<f64>();
    if !num::approx_eq(total_supply, total_demand, tolerance.max(1e-9)) {
        return Ok(FlowOutcome {
            status: OptimizationStatus::Infeasible,
            objective_value: None,
            flows: IndexMap::new(),
            message: Some(format!(
                "network flow problem is infeasible: total supply ({total_supply}) does not \
                 equal total demand ({total_demand})"
            )),
            solve_time: start.elapsed().as_secs_f64(),
        });
    }

    // Super source feeds every supply node; every demand node drains into the
    // super sink. Shipping total_supply units then satisfies every node.
    let n = network.nodes.len();
    let source = n;
    let sink = n + 1;
    let mut graph = ResidualGraph::new(n + 2);
    for (index, edge) in network.edges.iter().enumerate() {
        graph.add_arc(edge.from, edge.to, edge.capacity, edge.cost, Some(index));
    }
    for (node, &supply) in network.net_supply.iter().enumerate() {
        if supply > 0.0 {
            graph.add_arc(source, node, supply, 0.0, None);
        } else if supply < 0.0 {
            graph.add_arc(node, sink, -supply, 0.0, None);
        }
    }

    let mut shipped = 0.0;
    while shipped + tolerance < total_supply {
        let Some((path, bottleneck)) =
            shortest_augmenting_path(&graph, source, sink, tolerance)?
        else {
            break;
        };
        let amount = bottleneck.min(total_supply - shipped);
        for arc in path {
            graph.push(arc, amount);
        }
        shipped += amount;
    }

    let solve_time = start.elapsed().as_secs_f64();
    if !num::approx_eq(shipped, total_supply, tolerance.max(1e-6)) {
        return Ok(FlowOutcome {
            status: OptimizationStatus::Infeasible,
            objective_value: None,
            flows: IndexMap::new(),
            message: Some(format!(
                "network flow problem is infeasible: only {shipped} of {total_supply} units \
                 can be routed; check edge capacities and connectivity"
            )),
            solve_time,
        });
    }

    let (flows, total_cost) = collect_flows(network, &graph);
    debug!(
        "min cost flow solved: {} units shipped at cost {total_cost}",
        shipped
    );
    Ok(FlowOutcome {
        status: OptimizationStatus::Optimal,
        objective_value: Some(total_cost),
        flows,
        message: None,
        solve_time,
    })
}

/// Solve a max-flow problem with BFS augmenting paths
///
/// Supplies cap how much each source may emit and demands cap how much each
/// sink may absorb; the objective is the total routed flow.
pub fn solve_max_flow(network: &FlowNetwork) -> Result<FlowOutcome, SolverError> {
    let start = Instant::now();
    let tolerance = num::tolerance();

    let has_source = network.net_supply.iter().any(|s| *s > 0.0);
    let has_sink = network.net_supply.iter().any(|s| *s < 0.0);
    if !has_source || !has_sink {
        return Err(SolverError::Backend {
            solver: "network",
            detail: "max flow requires at least one supply node and one demand node".to_string(),
        });
    }

    let n = network.nodes.len();
    let source = n;
    let sink = n + 1;
    let mut graph = ResidualGraph::new(n + 2);
    for (index, edge) in network.edges.iter().enumerate() {
        graph.add_arc(edge.from, edge.to, edge.capacity, 0.0, Some(index));
    }
    for (node, &supply) in network.net_supply.iter().enumerate() {
        if supply > 0.0 {
            graph.add_arc(source, node, supply, 0.0, None);
        } else if supply < 0.0 {
            graph.add_arc(node, sink, -supply, 0.0, None);
        }
    }

    let mut total_flow = 0.0;
    loop {
        // BFS for any augmenting path
        let mut parent_arc: Vec<Option<usize>> = vec![None; n + 2];
        let mut queue = std::collections::VecDeque::from([source]);
        let mut reached = vec![false; n + 2];
        reached[source] = true;
        while let Some(node) = queue.pop_front() {
            for &arc in &graph.adjacency[node] {
                let to = graph.arcs[arc].to;
                if !reached[to] && graph.residual(arc) > tolerance {
                    reached[to] = true;
                    parent_arc[to] = Some(arc);
                    queue.push_back(to);
                }
            }
        }
        if !reached[sink] {
            break;
        }
        let mut bottleneck = f64::INFINITY;
        let mut node = sink;
        while node != source {
            let arc = parent_arc[node].unwrap();
            bottleneck = bottleneck.min(graph.residual(arc));
            node = graph.arcs[graph.arcs[arc].reverse].to;
        }
        let mut node = sink;
        while node != source {
            let arc = parent_arc[node].unwrap();
            graph.push(arc, bottleneck);
            node = graph.arcs[graph.arcs[arc].reverse].to;
        }
        total_flow += bottleneck;
    }

    let (flows, _) = collect_flows(network, &graph);
    debug!("max flow solved: {total_flow} units routed");
    Ok(FlowOutcome {
        status: OptimizationStatus::Optimal,
        objective_value: Some(total_flow),
        flows,
        message: None,
        solve_time: start.elapsed().as_secs_f64(),
    })
}

/// Bellman-Ford over the residual graph; returns the arc list of the cheapest
/// source→sink path and its bottleneck capacity
fn shortest_augmenting_path(
    graph: &ResidualGraph,
    source: usize,
    sink: usize,
    tolerance: f64,
) -> Result<Option<(Vec<usize>, f64)>, SolverError> {
    let num_nodes = graph.adjacency.len();
    let mut distance = vec![f64::INFINITY; num_nodes];
    let mut parent_arc: Vec<Option<usize>> = vec![None; num_nodes];
    distance[source] = 0.0;

    // One extra round detects negative cycles, which the residual graph of a
    // valid input never contains.
    let mut relaxed_in_last_round = false;
    for round in 0..num_nodes {
        relaxed_in_last_round = false;
        for node in 0..num_nodes {
            if !distance[node].is_finite() {
                continue;
            }
            for &arc in &graph.adjacency[node] {
                if graph.residual(arc) <= tolerance {
                    continue;
                }
                let to = graph.arcs[arc].to;
                let candidate = distance[node] + graph.arcs[arc].cost;
                if candidate < distance[to] - 1e-12 {
                    distance[to] = candidate;
                    parent_arc[to] = Some(arc);
                    relaxed_in_last_round = true;
                }
            }
        }
        if !relaxed_in_last_round {
            break;
        }
        if round == num_nodes - 1 {
            return Err(SolverError::Numerical {
                solver: "network",
                detail: "negative cost cycle detected in the residual network".to_string(),
            });
        }
    }

    if !distance[sink].is_finite() {
        return Ok(None);
    }
    let mut path = Vec::new();
    let mut bottleneck = f64::INFINITY;
    let mut node = sink;
    while node != source {
        let arc = parent_arc[node].expect("path reconstruction follows finite distances");
        path.push(arc);
        bottleneck = bottleneck.min(graph.residual(arc));
        node = graph.arcs[graph.arcs[arc].reverse].to;
    }
    path.reverse();
    Ok(Some((path, bottleneck)))
}

/// Extract per edge flows (in input edge order) and the total cost
fn collect_flows(network: &FlowNetwork, graph: &ResidualGraph) -> (IndexMap<String, f64>, f64) {
    let mut flows: IndexMap<String, f64> =
        network.edges.iter().map(|e| (e.name.clone(), 0.0)).collect();
    let mut total_cost = 0.0;
    for arc in &graph.arcs {
        if let Some(edge_index) = arc.edge {
            let edge = &network.edges[edge_index];
            let flow = arc.flow.max(0.0);
            *flows.get_mut(&edge.name).unwrap() += flow;
            total_cost += flow * edge.cost;
        }
    }
    (flows, total_cost)
}
