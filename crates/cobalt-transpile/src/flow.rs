//! Paragraph flow graph.
//!
//! Nodes are paragraphs in source order; edges record how control can move
//! between them: PERFORM (a call that returns), fall-through to the next
//! paragraph, and GO TO. Every PERFORM / GO TO target must resolve;
//! unresolved targets become diagnostics, unreachable paragraphs become
//! warnings and are kept.

use std::collections::{HashMap, HashSet, VecDeque};

use cobalt_cobol::ast::*;
use cobalt_cobol::semantic::{DataType, SymbolTable};
use cobalt_lang_core::{Diagnostic, Span};

/// Index of a node in the flow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// A paragraph and its outgoing edges.
#[derive(Debug)]
pub struct FlowNode<'a> {
    pub id: NodeId,
    pub name: String,
    pub statements: &'a [Statement],
    pub edges: Vec<Edge>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub to: NodeId,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Perform(PerformKind),
    FallThrough,
    Goto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformKind {
    Once,
    Times,
    Until,
    Varying,
}

/// The flow graph for one program's PROCEDURE DIVISION.
#[derive(Debug, Default)]
pub struct FlowGraph<'a> {
    nodes: Vec<FlowNode<'a>>,
    by_name: HashMap<String, NodeId>,
}

impl<'a> FlowGraph<'a> {
    pub fn nodes(&self) -> &[FlowNode<'a>] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &FlowNode<'a> {
        &self.nodes[id.0]
    }

    pub fn resolve(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(&name.to_uppercase()).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes reachable from the entry paragraph through any edge kind.
    pub fn reachable(&self) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        if self.nodes.is_empty() {
            return seen;
        }
        let mut queue = VecDeque::from([NodeId(0)]);
        seen.insert(NodeId(0));
        while let Some(id) = queue.pop_front() {
            for edge in &self.node(id).edges {
                if seen.insert(edge.to) {
                    queue.push_back(edge.to);
                }
            }
        }
        seen
    }
}

/// Build the flow graph and run the flow checks.
pub fn analyze<'a>(
    program: &'a Program,
    symbols: &SymbolTable,
) -> (FlowGraph<'a>, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    let mut graph = FlowGraph::default();

    let Some(procedure) = &program.procedure else {
        return (graph, diagnostics);
    };

    // Nodes first so forward references resolve.
    match &procedure.body {
        ProcedureBody::Statements(statements) => {
            graph.nodes.push(FlowNode {
                id: NodeId(0),
                name: "$MAIN".to_string(),
                statements,
                edges: Vec::new(),
                span: procedure.span,
            });
            graph.by_name.insert("$MAIN".to_string(), NodeId(0));
        }
        _ => {
            for paragraph in procedure.paragraphs() {
                let id = NodeId(graph.nodes.len());
                graph.nodes.push(FlowNode {
                    id,
                    name: paragraph.name.clone(),
                    statements: &paragraph.statements,
                    edges: Vec::new(),
                    span: paragraph.span,
                });
                graph.by_name.entry(paragraph.name.to_uppercase()).or_insert(id);
            }
            // Section names resolve to their first paragraph.
            if let ProcedureBody::Sections(sections) = &procedure.body {
                let mut index = 0usize;
                for section in sections {
                    if !section.paragraphs.is_empty() {
                        graph
                            .by_name
                            .entry(section.name.to_uppercase())
                            .or_insert(NodeId(index));
                    }
                    index += section.paragraphs.len();
                }
            }
        }
    }

    // Edges.
    for index in 0..graph.nodes.len() {
        let statements = graph.nodes[index].statements;
        let mut edges = Vec::new();
        collect_edges(statements, &graph, &mut edges, &mut diagnostics);

        let falls_through = index + 1 < graph.nodes.len()
            && !statements.last().map(is_terminal).unwrap_or(false);
        if falls_through {
            edges.push(Edge {
                to: NodeId(index + 1),
                kind: EdgeKind::FallThrough,
            });
        }
        graph.nodes[index].edges = edges;
    }

    // Unreachable paragraphs are kept but flagged.
    let reachable = graph.reachable();
    for node in graph.nodes() {
        if !reachable.contains(&node.id) {
            diagnostics.push(Diagnostic::warning(
                "FLOW-W001",
                format!("paragraph {} is unreachable", node.name),
                node.span,
            ));
        }
    }

    check_until_loops(&graph, symbols, &mut diagnostics);

    tracing::debug!(
        paragraphs = graph.nodes.len(),
        errors = diagnostics.iter().filter(|d| d.is_error()).count(),
        "flow graph built"
    );
    (graph, diagnostics)
}

/// Whether a statement never lets control reach the next paragraph.
fn is_terminal(statement: &Statement) -> bool {
    match statement {
        Statement::StopRun(_) | Statement::GoBack(_) => true,
        // GO TO DEPENDING ON falls through when the index is out of range.
        Statement::GoTo(g) => g.depending_on.is_none(),
        Statement::Exit(e) => e.program,
        _ => false,
    }
}

fn collect_edges(
    statements: &[Statement],
    graph: &FlowGraph<'_>,
    edges: &mut Vec<Edge>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut resolve = |name: &str, span: Span, kind: EdgeKind, edges: &mut Vec<Edge>| {
        match graph.resolve(name) {
            Some(to) => edges.push(Edge { to, kind }),
            None => diagnostics.push(Diagnostic::error(
                "FLOW-E001",
                format!("control transfer targets undeclared paragraph {}", name),
                span,
            )),
        }
    };

    walk_statements(statements, &mut |statement| match statement {
        Statement::Perform(p) => {
            let kind = if p.times.is_some() {
                PerformKind::Times
            } else if p.varying.is_some() {
                PerformKind::Varying
            } else if p.until.is_some() {
                PerformKind::Until
            } else {
                PerformKind::Once
            };
            if let Some(target) = &p.target {
                resolve(target, p.span, EdgeKind::Perform(kind), edges);
            }
            if let Some(thru) = &p.thru {
                resolve(thru, p.span, EdgeKind::Perform(kind), edges);
            }
        }
        Statement::GoTo(g) => {
            for target in &g.targets {
                resolve(target, g.span, EdgeKind::Goto, edges);
            }
        }
        Statement::Alter(a) => {
            // ALTER rewrites a GO TO at run time; both endpoints count as
            // reachable so the edge-case report names real paragraphs.
            resolve(&a.target, a.span, EdgeKind::Goto, edges);
        }
        _ => {}
    });
}

/// Visit every statement, descending into nested blocks.
pub fn walk_statements<'a>(statements: &'a [Statement], visit: &mut impl FnMut(&'a Statement)) {
    for statement in statements {
        visit(statement);
        match statement {
            Statement::If(s) => {
                walk_statements(&s.then_branch, visit);
                if let Some(else_branch) = &s.else_branch {
                    walk_statements(else_branch, visit);
                }
            }
            Statement::Evaluate(s) => {
                for branch in &s.branches {
                    walk_statements(&branch.statements, visit);
                }
                if let Some(other) = &s.other {
                    walk_statements(other, visit);
                }
            }
            Statement::Perform(s) => {
                if let Some(inline) = &s.inline {
                    walk_statements(inline, visit);
                }
            }
            Statement::Read(s) => {
                for block in [&s.at_end, &s.not_at_end, &s.invalid_key, &s.not_invalid_key]
                    .into_iter()
                    .flatten()
                {
                    walk_statements(block, visit);
                }
            }
            Statement::Compute(s) => {
                walk_size_error(&s.on_size_error, &s.not_on_size_error, visit);
            }
            Statement::Add(s) => walk_size_error(&s.on_size_error, &s.not_on_size_error, visit),
            Statement::Subtract(s) => {
                walk_size_error(&s.on_size_error, &s.not_on_size_error, visit)
            }
            Statement::Multiply(s) => {
                walk_size_error(&s.on_size_error, &s.not_on_size_error, visit)
            }
            Statement::Divide(s) => walk_size_error(&s.on_size_error, &s.not_on_size_error, visit),
            _ => {}
        }
    }
}

fn walk_size_error<'a>(
    on: &'a Option<Vec<Statement>>,
    not_on: &'a Option<Vec<Statement>>,
    visit: &mut impl FnMut(&'a Statement),
) {
    if let Some(block) = on {
        walk_statements(block, visit);
    }
    if let Some(block) = not_on {
        walk_statements(block, visit);
    }
}

// ============================================================================
// PERFORM UNTIL exit analysis
// ============================================================================

/// Warn about PERFORM UNTIL loops whose body never assigns any item named
/// in the exit condition, the classic unkillable read loop.
fn check_until_loops(graph: &FlowGraph<'_>, symbols: &SymbolTable, diagnostics: &mut Vec<Diagnostic>) {
    for node in graph.nodes() {
        walk_statements(node.statements, &mut |statement| {
            let Statement::Perform(p) = statement else {
                return;
            };
            let condition = match (&p.until, &p.varying) {
                (Some(until), _) => until,
                (None, Some(varying)) => &varying.until,
                _ => return,
            };

            let mut exit_names = HashSet::new();
            condition_names(condition, symbols, &mut exit_names);
            // VARYING assigns its own counter every iteration.
            if let Some(varying) = &p.varying {
                if exit_names.contains(&varying.variable.name.to_uppercase()) {
                    return;
                }
            }

            let mut assigned = HashSet::new();
            let mut visited = HashSet::new();
            if let Some(inline) = &p.inline {
                assigned_names(inline, graph, &mut assigned, &mut visited);
            }
            if let Some(target) = &p.target {
                if let Some(id) = graph.resolve(target) {
                    collect_assigned_transitive(graph, id, &mut assigned, &mut visited);
                }
            }
            if let Some(thru) = &p.thru {
                if let Some(id) = graph.resolve(thru) {
                    collect_assigned_transitive(graph, id, &mut assigned, &mut visited);
                }
            }

            if exit_names.is_disjoint(&assigned) {
                diagnostics.push(Diagnostic::warning(
                    "FLOW-W002",
                    "PERFORM UNTIL body never assigns the items in its exit condition",
                    p.span,
                ));
            }
        });
    }
}

/// Data names a condition reads. Level-88 names resolve to their parent
/// item, which is what an assignment would actually change.
fn condition_names(condition: &Condition, symbols: &SymbolTable, out: &mut HashSet<String>) {
    match condition {
        Condition::Comparison { left, right, .. } => {
            expression_names(left, out);
            expression_names(right, out);
        }
        Condition::Class { operand, .. } => expression_names(operand, out),
        Condition::ConditionName(name) => {
            let key = name.name.to_uppercase();
            if let Some(entry) = symbols.resolve(&key) {
                if entry.data_type == DataType::ConditionName {
                    if let Some(parent) = entry.parent {
                        out.insert(symbols.entry(parent).name.clone());
                        return;
                    }
                }
            }
            out.insert(key);
        }
        Condition::Not(inner) | Condition::Paren(inner) => condition_names(inner, symbols, out),
        Condition::And(left, right) | Condition::Or(left, right) => {
            condition_names(left, symbols, out);
            condition_names(right, symbols, out);
        }
    }
}

fn expression_names(expression: &Expression, out: &mut HashSet<String>) {
    match expression {
        Expression::Variable(name) => {
            out.insert(name.name.to_uppercase());
        }
        Expression::Binary { left, right, .. } => {
            expression_names(left, out);
            expression_names(right, out);
        }
        Expression::Unary { operand, .. } => expression_names(operand, out),
        Expression::Paren(inner) => expression_names(inner, out),
        Expression::Literal(_) => {}
    }
}

fn collect_assigned_transitive(
    graph: &FlowGraph<'_>,
    start: NodeId,
    assigned: &mut HashSet<String>,
    visited: &mut HashSet<NodeId>,
) {
    if !visited.insert(start) {
        return;
    }
    let node = graph.node(start);
    assigned_names(node.statements, graph, assigned, visited);
    // Control performed out of this paragraph keeps flowing through its
    // own PERFORMs and fall-through successors.
    for edge in &node.edges {
        collect_assigned_transitive(graph, edge.to, assigned, visited);
    }
}

/// Names a statement list writes to, descending into performed paragraphs.
fn assigned_names(
    statements: &[Statement],
    graph: &FlowGraph<'_>,
    out: &mut HashSet<String>,
    visited: &mut HashSet<NodeId>,
) {
    let mut performed = Vec::new();
    walk_statements(statements, &mut |statement| {
        match statement {
            Statement::Move(s) => {
                for target in &s.targets {
                    out.insert(target.name.to_uppercase());
                }
            }
            Statement::Compute(s) => {
                for target in &s.targets {
                    out.insert(target.name.name.to_uppercase());
                }
            }
            Statement::Add(s) => collect_arith_targets(&s.to, &s.giving, out),
            Statement::Subtract(s) => collect_arith_targets(&s.from, &s.giving, out),
            Statement::Multiply(s) => collect_arith_targets(&s.by, &s.giving, out),
            Statement::Divide(s) => {
                collect_arith_targets(&s.into, &s.giving, out);
                if let Some(remainder) = &s.remainder {
                    out.insert(remainder.name.to_uppercase());
                }
            }
            Statement::Accept(s) => {
                out.insert(s.target.name.to_uppercase());
            }
            Statement::Read(s) => {
                // Reading refreshes the record under the FD.
                out.insert(s.file.to_uppercase());
                if let Some(into) = &s.into {
                    out.insert(into.name.to_uppercase());
                }
            }
            Statement::Perform(p) => {
                if let Some(target) = &p.target {
                    performed.push(target.clone());
                }
            }
            _ => {}
        }
    });
    for target in performed {
        if let Some(id) = graph.resolve(&target) {
            collect_assigned_transitive(graph, id, out, visited);
        }
    }
}

fn collect_arith_targets(
    primary: &[ComputeTarget],
    giving: &[ComputeTarget],
    out: &mut HashSet<String>,
) {
    for target in primary.iter().chain(giving) {
        out.insert(target.name.name.to_uppercase());
    }
}
