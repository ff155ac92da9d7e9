//! Communication-graph abstractions over the sparsity of a dynamics
//! matrix. E.g., the directed influence graph and hop distances used
//! by locality constraints.

use ndarray::Array2;
use petgraph::{algo::dijkstra, graph::DiGraph, graph::NodeIndex};

/// Marker for a pair of states with no communication path between them.
pub const UNREACHABLE: usize = usize::MAX;

/// Build the directed communication graph of a dynamics matrix.
///
/// State $j$ influences state $i$ whenever $A_{ij} \neq 0$, so the graph
/// carries an edge $j \to i$ for every structural nonzero. Diagonal
/// entries add nothing to connectivity and are skipped.
///
/// # Examples
/// ```
/// use ndarray::array;
/// use sls_sim::graphs::communication_graph;
///
/// let a_mat = array![[0.5, 0.2], [0., 0.5]];
/// let graph = communication_graph(&a_mat);
/// assert_eq!(graph.node_count(), 2);
/// assert_eq!(graph.edge_count(), 1);
/// ```
pub fn communication_graph(a_mat: &Array2<f64>) -> DiGraph<(), ()> {
    let n = a_mat.nrows();
    let mut graph = DiGraph::with_capacity(n, 2 * n);
    for _ in 0..n {
        graph.add_node(());
    }
    for ((i, j), &v) in a_mat.indexed_iter() {
        if i != j && v != 0.0 {
            graph.add_edge(NodeIndex::new(j), NodeIndex::new(i), ());
        }
    }
    graph
}

/// All-pairs hop distances of the communication graph.
///
/// Entry $(i, j)$ is the number of hops a disturbance entering at state
/// $j$ needs before it can influence state $i$, with [`UNREACHABLE`] for
/// disconnected pairs and 0 on the diagonal.
///
/// # Examples
/// ```
/// use ndarray::array;
/// use sls_sim::graphs::hop_distances;
///
/// // a 3-state chain
/// let a_mat = array![[0.8, 0.2, 0.], [0.2, 0.6, 0.2], [0., 0.2, 0.8]];
/// let dist = hop_distances(&a_mat);
/// assert_eq!(dist[(0, 0)], 0);
/// assert_eq!(dist[(2, 0)], 2);
/// ```
pub fn hop_distances(a_mat: &Array2<f64>) -> Array2<usize> {
    let n = a_mat.nrows();
    let graph = communication_graph(a_mat);
    let mut dist = Array2::from_elem((n, n), UNREACHABLE);
    for j in 0..n {
        let reached = dijkstra(&graph, NodeIndex::new(j), None, |_| 1usize);
        for (node, hops) in reached {
            dist[(node.index(), j)] = hops;
        }
    }
    dist
}
