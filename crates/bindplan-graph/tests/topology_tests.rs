use super::*;

fn graph(edges: &[(&'static str, &'static str, EdgeKind)], nodes: &[&'static str]) -> DependencyGraph<&'static str> {
    let mut graph = DependencyGraph::new();
    for node in nodes {
        graph.add_node(*node);
    }
    for &(from, to, kind) in edges {
        graph.add_dependency(from, to, kind);
    }
    graph
}

#[test]
fn test_chain_sorts_dependencies_first() {
    let g = graph(
        &[("a", "b", EdgeKind::Direct), ("b", "c", EdgeKind::Direct)],
        &["a", "b", "c"],
    );
    let topo = g.sort().unwrap();
    assert_eq!(topo.sorted_keys, vec!["c", "b", "a"]);
    assert_eq!(topo.components.len(), 3);
    assert!(topo.components.iter().all(|c| !c.is_cyclic()));
    assert!(topo.deferred_keys.is_empty());
}

#[test]
fn test_independent_keys_keep_declaration_order() {
    let g = graph(&[], &["x", "y", "z"]);
    assert_eq!(g.sort().unwrap().sorted_keys, vec!["x", "y", "z"]);
}

#[test]
fn test_ties_break_by_smallest_declaration_index() {
    // "late" and "early" are both ready once "root" is sorted; declaration
    // order decides between them regardless of edge insertion order.
    let g = graph(
        &[
            ("late", "root", EdgeKind::Direct),
            ("early", "root", EdgeKind::Direct),
        ],
        &["early", "late", "root"],
    );
    assert_eq!(g.sort().unwrap().sorted_keys, vec!["root", "early", "late"]);
}

#[test]
fn test_deferred_edge_breaks_cycle() {
    let g = graph(
        &[("a", "b", EdgeKind::Direct), ("b", "a", EdgeKind::Deferred)],
        &["a", "b"],
    );
    let topo = g.sort().unwrap();
    assert_eq!(topo.sorted_keys, vec!["b", "a"]);
    assert_eq!(topo.components.len(), 1);
    assert!(topo.components[0].is_cyclic());
    assert_eq!(topo.component_of(&"a"), topo.component_of(&"b"));
    assert_eq!(topo.deferred_keys, vec!["a"]);
}

#[test]
fn test_direct_cycle_is_rejected_with_path() {
    let g = graph(
        &[("a", "b", EdgeKind::Direct), ("b", "a", EdgeKind::Direct)],
        &["a", "b"],
    );
    let errors = g.sort().unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].cycle, vec!["a", "b", "a"]);
    assert_eq!(errors[0].to_string(), "dependency cycle: a -> b -> a");
}

#[test]
fn test_direct_cycle_inside_larger_component() {
    // a -> b -> c -> a directly, d hangs off the cycle through a provider.
    let g = graph(
        &[
            ("a", "b", EdgeKind::Direct),
            ("b", "c", EdgeKind::Direct),
            ("c", "a", EdgeKind::Direct),
            ("a", "d", EdgeKind::Direct),
            ("d", "a", EdgeKind::Deferred),
        ],
        &["a", "b", "c", "d"],
    );
    let errors = g.sort().unwrap_err();
    assert_eq!(errors.len(), 1);
    let cycle = &errors[0].cycle;
    assert_eq!(cycle.first(), cycle.last());
    assert_eq!(cycle.len(), 4);
}

#[test]
fn test_self_edges() {
    let direct = graph(&[("a", "a", EdgeKind::Direct)], &["a"]);
    let errors = direct.sort().unwrap_err();
    assert_eq!(errors[0].cycle, vec!["a", "a"]);

    let deferred = graph(&[("a", "a", EdgeKind::Deferred)], &["a"]);
    let topo = deferred.sort().unwrap();
    assert_eq!(topo.sorted_keys, vec!["a"]);
    assert!(topo.deferred_keys.is_empty());
}

#[test]
fn test_component_graph_order() {
    // a; b -> a; c -> d direct; d -> c deferred; e -> c
    let g = graph(
        &[
            ("b", "a", EdgeKind::Direct),
            ("c", "d", EdgeKind::Direct),
            ("d", "c", EdgeKind::Deferred),
            ("e", "c", EdgeKind::Direct),
        ],
        &["a", "b", "c", "d", "e"],
    );
    let topo = g.sort().unwrap();
    assert_eq!(topo.sorted_keys, vec!["a", "b", "d", "c", "e"]);
    assert_eq!(topo.components.len(), 4);
    let cd = topo.component(topo.component_of(&"c").unwrap()).unwrap();
    assert_eq!(cd.keys, vec!["d", "c"]);
    for (i, component) in topo.components.iter().enumerate() {
        assert_eq!(component.id, ComponentId(i as u32));
    }
}

#[test]
fn test_sort_is_repeatable() {
    let edges = [
        ("a", "c", EdgeKind::Direct),
        ("b", "c", EdgeKind::Direct),
        ("c", "d", EdgeKind::Deferred),
        ("d", "c", EdgeKind::Direct),
        ("e", "a", EdgeKind::Direct),
    ];
    let nodes = ["e", "b", "a", "d", "c"];
    let first = graph(&edges, &nodes).sort().unwrap();
    for _ in 0..10 {
        let again = graph(&edges, &nodes).sort().unwrap();
        assert_eq!(again.sorted_keys, first.sorted_keys);
        assert_eq!(again.components, first.components);
        assert_eq!(again.deferred_keys, first.deferred_keys);
    }
}
