//! Property-based tests for the path planner
//!
//! Random graphs of up to eight modes with parallel edges, zero-cost edges
//! and cycles; every planned path must be a real walk through the graph.

use modepilot::{Mode, ModeGraph, Path, Strategy as PlanStrategy};
use proptest::prelude::*;

const MAX_MODES: usize = 8;
const STRATEGIES: [PlanStrategy; 3] = [PlanStrategy::MinCost, PlanStrategy::MinHop, PlanStrategy::MaxCost];

fn name(i: usize) -> Mode {
    Mode::new(format!("m{}", i))
}

fn arb_graph() -> impl Strategy<Value = (usize, Vec<(usize, usize, u32)>)> {
    (2..=MAX_MODES).prop_flat_map(|n| {
        let edges = prop::collection::vec((0..n, 0..n, 0u32..20), 0..(n * 3));
        (Just(n), edges)
    })
}

fn build(n: usize, edges: &[(usize, usize, u32)]) -> ModeGraph {
    let mut builder = ModeGraph::builder();
    for i in 0..n {
        let outgoing: Vec<(Mode, u32)> = edges
            .iter()
            .filter(|(from, _, _)| *from == i)
            .map(|(_, to, cost)| (name(*to), *cost))
            .collect();
        builder.add_mode(name(i), outgoing);
    }
    builder.build().unwrap()
}

/// Every step follows a declared edge with the recorded cost
fn is_walk(graph: &ModeGraph, path: &Path) -> bool {
    path.hops().iter().all(|hop| {
        graph
            .edges_from(&hop.from)
            .any(|e| e.to == hop.to && e.cost == hop.cost)
    })
}

/// Cheapest simple path cost by exhaustive search
fn brute_force_min_cost(n: usize, edges: &[(usize, usize, u32)], src: usize, dst: usize) -> Option<u64> {
    fn walk(
        node: usize,
        dst: usize,
        cost: u64,
        edges: &[(usize, usize, u32)],
        visited: &mut [bool],
        best: &mut Option<u64>,
    ) {
        if node == dst {
            *best = Some(best.map_or(cost, |b| b.min(cost)));
            return;
        }
        for &(from, to, c) in edges {
            if from == node && !visited[to] {
                visited[to] = true;
                walk(to, dst, cost + u64::from(c), edges, visited, best);
                visited[to] = false;
            }
        }
    }

    let mut visited = vec![false; n];
    visited[src] = true;
    let mut best = None;
    walk(src, dst, 0, edges, &mut visited, &mut best);
    best
}

fn is_simple(path: &Path) -> bool {
    let modes = path.modes();
    let mut seen = std::collections::HashSet::new();
    modes.iter().all(|m| seen.insert(m.clone()))
}

proptest! {
    #[test]
    fn test_paths_are_walks_between_endpoints(
        (n, edges) in arb_graph(),
        src in 0..MAX_MODES,
        dst in 0..MAX_MODES,
    ) {
        let graph = build(n, &edges);
        let (src, dst) = (src % n, dst % n);

        for strategy in STRATEGIES {
            if let Ok(path) = graph.get_path(&name(src), &name(dst), strategy, &[]) {
                prop_assert!(is_walk(&graph, &path));
                if src == dst {
                    prop_assert!(path.is_empty());
                } else {
                    prop_assert_eq!(path.source(), Some(&name(src)));
                    prop_assert_eq!(path.destination(), Some(&name(dst)));
                }
            }
        }
    }

    #[test]
    fn test_strategies_agree_on_reachability(
        (n, edges) in arb_graph(),
        src in 0..MAX_MODES,
        dst in 0..MAX_MODES,
    ) {
        let graph = build(n, &edges);
        let (from, to) = (name(src % n), name(dst % n));

        let min_cost = graph.get_path(&from, &to, PlanStrategy::MinCost, &[]);
        let min_hop = graph.get_path(&from, &to, PlanStrategy::MinHop, &[]);
        let max_cost = graph.get_path(&from, &to, PlanStrategy::MaxCost, &[]);

        prop_assert_eq!(min_cost.is_ok(), min_hop.is_ok());
        prop_assert_eq!(min_cost.is_ok(), max_cost.is_ok());

        if let (Ok(min_cost), Ok(min_hop), Ok(max_cost)) = (min_cost, min_hop, max_cost) {
            prop_assert!(min_cost.total_cost() <= min_hop.total_cost());
            prop_assert!(min_cost.total_cost() <= max_cost.total_cost());
            prop_assert!(min_hop.hop_count() <= min_cost.hop_count());
            prop_assert!(min_hop.hop_count() <= max_cost.hop_count());
            prop_assert!(is_simple(&max_cost));
        }
    }

    #[test]
    fn test_mincost_matches_exhaustive_search(
        (n, edges) in arb_graph(),
        src in 0..MAX_MODES,
        dst in 0..MAX_MODES,
    ) {
        let graph = build(n, &edges);
        let (src, dst) = (src % n, dst % n);

        let planned = graph
            .get_path(&name(src), &name(dst), PlanStrategy::MinCost, &[])
            .ok()
            .map(|p| p.total_cost());
        prop_assert_eq!(planned, brute_force_min_cost(n, &edges, src, dst));
    }

    #[test]
    fn test_planning_is_deterministic(
        (n, edges) in arb_graph(),
        src in 0..MAX_MODES,
        dst in 0..MAX_MODES,
    ) {
        let graph = build(n, &edges);
        let rebuilt = build(n, &edges);
        let (from, to) = (name(src % n), name(dst % n));

        for strategy in STRATEGIES {
            let first = graph.get_path(&from, &to, strategy, &[]).ok();
            let second = rebuilt.get_path(&from, &to, strategy, &[]).ok();
            prop_assert_eq!(first, second);
        }
    }

    #[test]
    fn test_waypoints_never_break_a_reachable_goal(
        (n, edges) in arb_graph(),
        src in 0..MAX_MODES,
        dst in 0..MAX_MODES,
        waypoints in prop::collection::vec(0..MAX_MODES + 2, 0..4),
    ) {
        let graph = build(n, &edges);
        let (from, to) = (name(src % n), name(dst % n));
        // Indices past `n` name undeclared modes
        let followpath: Vec<Mode> = waypoints.into_iter().map(name).collect();

        let direct = graph.get_path(&from, &to, PlanStrategy::MinCost, &[]);
        let guided = graph.get_path(&from, &to, PlanStrategy::MinCost, &followpath);

        prop_assert_eq!(direct.is_ok(), guided.is_ok());
        if let Ok(path) = guided {
            prop_assert!(is_walk(&graph, &path));
            if from != to {
                prop_assert_eq!(path.destination(), Some(&to));
            }
        }
    }
}
