//! Conservative control-flow structuring.
//!
//! PERFORM shapes lower directly to loops and calls; GO TO transfer flow
//! is preserved through a dispatch driver in the generated code. This
//! module decides what that driver may never be asked to run: a cycle of
//! transfer edges entered from two or more places is irreducible, and the
//! paragraphs inside it are blocked rather than guessed into a structured
//! form. It also finds the one collapse that is always safe, a tail GO TO
//! whose target is the next paragraph in source order.

use std::collections::{HashMap, HashSet};

use cobalt_lang_core::Span;

use crate::flow::{EdgeKind, FlowGraph, NodeId};

/// Structuring results for one program.
#[derive(Debug, Default)]
pub struct Structure {
    pub irreducible: Vec<IrreducibleRegion>,
    /// Paragraphs inside an irreducible region; IR translation skips them.
    pub blocked: HashSet<String>,
    /// Paragraphs whose tail GO TO is a plain fall-through in disguise and
    /// may be dropped.
    pub trivial_tail_gotos: HashSet<String>,
}

/// A transfer cycle with more than one way in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrreducibleRegion {
    pub paragraphs: Vec<String>,
    pub span: Span,
}

/// Analyze transfer flow (GO TO + fall-through edges; PERFORM edges are
/// calls and play no part in reducibility).
pub fn analyze(graph: &FlowGraph<'_>) -> Structure {
    let mut structure = Structure::default();
    if graph.is_empty() {
        return structure;
    }

    let transfer = transfer_edges(graph);
    let components = strongly_connected_components(graph.nodes().len(), &transfer);

    for component in &components {
        if !is_cycle(component, &transfer) {
            continue;
        }
        let members: HashSet<NodeId> = component.iter().copied().collect();
        let mut entries: HashSet<NodeId> = HashSet::new();
        // The procedure entry is a way in even without a predecessor edge.
        if members.contains(&NodeId(0)) {
            entries.insert(NodeId(0));
        }
        for (from, targets) in &transfer {
            if members.contains(from) {
                continue;
            }
            for to in targets {
                if members.contains(to) {
                    entries.insert(*to);
                }
            }
        }
        if entries.len() >= 2 {
            let mut paragraphs: Vec<String> = component
                .iter()
                .map(|id| graph.node(*id).name.clone())
                .collect();
            paragraphs.sort();
            let span = graph.node(component[0]).span;
            for name in &paragraphs {
                structure.blocked.insert(name.clone());
            }
            structure
                .irreducible
                .push(IrreducibleRegion { paragraphs, span });
        }
    }

    find_trivial_tail_gotos(graph, &mut structure);

    tracing::debug!(
        irreducible = structure.irreducible.len(),
        "structuring finished"
    );
    structure
}

/// Adjacency over Goto and FallThrough edges only.
fn transfer_edges(graph: &FlowGraph<'_>) -> HashMap<NodeId, Vec<NodeId>> {
    let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for node in graph.nodes() {
        let targets: Vec<NodeId> = node
            .edges
            .iter()
            .filter(|e| matches!(e.kind, EdgeKind::Goto | EdgeKind::FallThrough))
            .map(|e| e.to)
            .collect();
        adjacency.insert(node.id, targets);
    }
    adjacency
}

/// A component is a cycle when it has more than one node, or one node
/// with an edge to itself.
fn is_cycle(component: &[NodeId], transfer: &HashMap<NodeId, Vec<NodeId>>) -> bool {
    if component.len() > 1 {
        return true;
    }
    let only = component[0];
    transfer
        .get(&only)
        .map(|targets| targets.contains(&only))
        .unwrap_or(false)
}

/// Tarjan's algorithm, with an explicit DFS stack so a long chain of
/// GO TO paragraphs cannot overflow the call stack.
fn strongly_connected_components(
    node_count: usize,
    transfer: &HashMap<NodeId, Vec<NodeId>>,
) -> Vec<Vec<NodeId>> {
    let mut index = 0usize;
    let mut indices: Vec<Option<usize>> = vec![None; node_count];
    let mut lowlink = vec![0usize; node_count];
    let mut on_stack = vec![false; node_count];
    let mut stack: Vec<NodeId> = Vec::new();
    let mut components: Vec<Vec<NodeId>> = Vec::new();
    // Each frame is a node plus the index of its next untried successor.
    let mut frames: Vec<(NodeId, usize)> = Vec::new();

    for root in 0..node_count {
        if indices[root].is_some() {
            continue;
        }
        indices[root] = Some(index);
        lowlink[root] = index;
        index += 1;
        stack.push(NodeId(root));
        on_stack[root] = true;
        frames.push((NodeId(root), 0));

        while let Some(&(v, cursor)) = frames.last() {
            match transfer.get(&v).and_then(|s| s.get(cursor)).copied() {
                Some(w) => {
                    if let Some(frame) = frames.last_mut() {
                        frame.1 += 1;
                    }
                    if indices[w.0].is_none() {
                        indices[w.0] = Some(index);
                        lowlink[w.0] = index;
                        index += 1;
                        stack.push(w);
                        on_stack[w.0] = true;
                        frames.push((w, 0));
                    } else if on_stack[w.0] {
                        lowlink[v.0] = lowlink[v.0].min(indices[w.0].unwrap_or(0));
                    }
                }
                None => {
                    // All successors tried; close the node.
                    frames.pop();
                    if let Some(&(parent, _)) = frames.last() {
                        lowlink[parent.0] = lowlink[parent.0].min(lowlink[v.0]);
                    }
                    if Some(lowlink[v.0]) == indices[v.0] {
                        let mut component = Vec::new();
                        while let Some(w) = stack.pop() {
                            on_stack[w.0] = false;
                            component.push(w);
                            if w == v {
                                break;
                            }
                        }
                        components.push(component);
                    }
                }
            }
        }
    }
    components
}

/// A GO TO as the last statement of a paragraph, targeting exactly the
/// next paragraph in source order, is a fall-through.
fn find_trivial_tail_gotos(graph: &FlowGraph<'_>, structure: &mut Structure) {
    use cobalt_cobol::ast::Statement;
    for (index, node) in graph.nodes().iter().enumerate() {
        let Some(Statement::GoTo(goto)) = node.statements.last() else {
            continue;
        };
        if goto.depending_on.is_some() || goto.targets.len() != 1 {
            continue;
        }
        if graph.resolve(&goto.targets[0]) == Some(NodeId(index + 1)) {
            structure.trivial_tail_gotos.insert(node.name.clone());
        }
    }
}
