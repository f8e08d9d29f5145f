//! Dependency Graph Analysis
//!
//! Generic strongly-connected-component search (iterative Tarjan) over any
//! node type, parameterised by a "get dependencies" function, and a
//! [`CycleDetector`] that splits a node set into a dependency-first order and
//! the cycles that must be excluded from it.

use std::collections::HashMap;
use std::hash::Hash;
use thiserror::Error;

/// Failure of the graph analysis itself, as opposed to finding a cycle
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError<E> {
    /// The edge provider failed for a node
    #[error("edge provider failed: {0}")]
    Edges(E),
}

/// Result of a cycle detection run
#[derive(Debug, Clone, PartialEq)]
pub struct GraphAnalysis<N> {
    /// Acyclic nodes, dependencies before dependents
    pub sorted: Vec<N>,

    /// One entry per cycle, members in input order
    pub cycles: Vec<Vec<N>>,
}

/// Strongly connected components of the graph induced by `nodes`.
///
/// An edge `p -> q` means `p` depends on `q`. Components come out in reverse
/// topological order: every component appears after all components it depends
/// on. Members of a component are in input order. Targets not in `nodes` are
/// ignored.
pub fn strongly_connected_components<N, E, F>(nodes: &[N], edges: F) -> Result<Vec<Vec<N>>, E>
where
    N: Clone + Eq + Hash,
    F: FnMut(&N) -> Result<Vec<N>, E>,
{
    let graph = IndexedGraph::build(nodes, edges)?;
    Ok(graph
        .components()
        .into_iter()
        .map(|component| component.into_iter().map(|i| nodes[i].clone()).collect())
        .collect())
}

/// Node indices plus adjacency lists
struct IndexedGraph {
    adjacency: Vec<Vec<usize>>,
}

impl IndexedGraph {
    fn build<N, E, F>(nodes: &[N], mut edges: F) -> Result<Self, E>
    where
        N: Eq + Hash,
        F: FnMut(&N) -> Result<Vec<N>, E>,
    {
        let position: HashMap<&N, usize> = nodes.iter().enumerate().map(|(i, n)| (n, i)).collect();

        let mut adjacency = Vec::with_capacity(nodes.len());
        for node in nodes {
            let targets = edges(node)?
                .iter()
                .filter_map(|target| position.get(target).copied())
                .collect();
            adjacency.push(targets);
        }

        Ok(Self { adjacency })
    }

    fn has_self_edge(&self, node: usize) -> bool {
        self.adjacency[node].contains(&node)
    }

    fn components(&self) -> Vec<Vec<usize>> {
        let n = self.adjacency.len();
        let mut index: Vec<Option<usize>> = vec![None; n];
        let mut lowlink = vec![0usize; n];
        let mut on_stack = vec![false; n];
        let mut stack = Vec::new();
        let mut next_index = 0;
        let mut components = Vec::new();

        for root in 0..n {
            if index[root].is_some() {
                continue;
            }

            index[root] = Some(next_index);
            lowlink[root] = next_index;
            next_index += 1;
            stack.push(root);
            on_stack[root] = true;

            // (node, next edge to follow)
            let mut calls: Vec<(usize, usize)> = vec![(root, 0)];

            while let Some(frame) = calls.last_mut() {
                let v = frame.0;

                if frame.1 < self.adjacency[v].len() {
                    let w = self.adjacency[v][frame.1];
                    frame.1 += 1;

                    match index[w] {
                        None => {
                            index[w] = Some(next_index);
                            lowlink[w] = next_index;
                            next_index += 1;
                            stack.push(w);
                            on_stack[w] = true;
                            calls.push((w, 0));
                        }
                        Some(w_index) if on_stack[w] => {
                            lowlink[v] = lowlink[v].min(w_index);
                        }
                        Some(_) => {}
                    }
                    continue;
                }

                calls.pop();
                if let Some(&(parent, _)) = calls.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }

                if index[v] == Some(lowlink[v]) {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    component.sort_unstable();
                    components.push(component);
                }
            }
        }

        components
    }
}

/// Splits a node set into a dependency order and its cycles
pub struct CycleDetector<F> {
    edges: F,
}

impl<F> CycleDetector<F> {
    pub fn new(edges: F) -> Self {
        Self { edges }
    }

    /// Analyse `nodes`; a self-edge counts as a cycle
    pub fn run<N, E>(&mut self, nodes: &[N]) -> Result<GraphAnalysis<N>, GraphError<E>>
    where
        N: Clone + Eq + Hash,
        F: FnMut(&N) -> Result<Vec<N>, E>,
    {
        let graph = IndexedGraph::build(nodes, &mut self.edges).map_err(GraphError::Edges)?;

        let mut sorted = Vec::new();
        let mut cycles = Vec::new();
        for component in graph.components() {
            let cyclic = component.len() > 1 || graph.has_self_edge(component[0]);
            let members: Vec<N> = component.into_iter().map(|i| nodes[i].clone()).collect();
            if cyclic {
                cycles.push(members);
            } else {
                sorted.extend(members);
            }
        }

        Ok(GraphAnalysis { sorted, cycles })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::convert::Infallible;

    fn adjacency(edges: &[(u32, u32)]) -> HashMap<u32, Vec<u32>> {
        let mut map: HashMap<u32, Vec<u32>> = HashMap::new();
        for (from, to) in edges {
            map.entry(*from).or_default().push(*to);
        }
        map
    }

    fn analyse(nodes: &[u32], edges: &[(u32, u32)]) -> GraphAnalysis<u32> {
        let map = adjacency(edges);
        CycleDetector::new(|n: &u32| Ok::<_, Infallible>(map.get(n).cloned().unwrap_or_default()))
            .run(nodes)
            .unwrap()
    }

    #[test]
    fn test_dependencies_come_first() {
        let analysis = analyse(&[1, 2, 3], &[(1, 2), (2, 3)]);
        assert_eq!(analysis.sorted, vec![3, 2, 1]);
        assert!(analysis.cycles.is_empty());
    }

    #[test]
    fn test_unrelated_nodes_keep_input_order() {
        let analysis = analyse(&[5, 1, 4], &[]);
        assert_eq!(analysis.sorted, vec![5, 1, 4]);
    }

    #[test]
    fn test_cycle_is_excluded_whole() {
        let analysis = analyse(&[1, 2, 3, 4, 5], &[(1, 2), (2, 3), (3, 1), (4, 1), (5, 5)]);
        assert_eq!(analysis.cycles, vec![vec![1, 2, 3], vec![5]]);
        assert_eq!(analysis.sorted, vec![4]);
    }

    #[test]
    fn test_dangling_edges_are_ignored() {
        let analysis = analyse(&[1, 2], &[(1, 99), (2, 1)]);
        assert_eq!(analysis.sorted, vec![1, 2]);
    }

    #[test]
    fn test_edge_provider_failure() {
        let result = CycleDetector::new(|n: &u32| if *n == 2 { Err("boom") } else { Ok(vec![]) })
            .run(&[1, 2, 3]);
        assert_eq!(result, Err(GraphError::Edges("boom")));
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let nodes: Vec<u32> = (0..50_000).collect();
        let components = strongly_connected_components(&nodes, |n: &u32| {
            Ok::<_, Infallible>(if *n > 0 { vec![n - 1] } else { vec![] })
        })
        .unwrap();
        assert_eq!(components.len(), nodes.len());
        assert_eq!(components[0], vec![0]);
    }

    proptest! {
        #[test]
        fn prop_sorted_respects_every_edge(
            edges in proptest::collection::vec((0u32..20, 0u32..20), 0..60)
        ) {
            let nodes: Vec<u32> = (0..20).collect();
            let analysis = analyse(&nodes, &edges);

            let position: HashMap<u32, usize> =
                analysis.sorted.iter().enumerate().map(|(i, n)| (*n, i)).collect();
            for (from, to) in &edges {
                if let (Some(p), Some(q)) = (position.get(from), position.get(to)) {
                    prop_assert!(q <= p);
                }
            }

            let cyclic: HashSet<u32> = analysis.cycles.iter().flatten().copied().collect();
            prop_assert_eq!(cyclic.len() + analysis.sorted.len(), nodes.len());
            prop_assert!(analysis.sorted.iter().all(|n| !cyclic.contains(n)));
        }
    }
}
