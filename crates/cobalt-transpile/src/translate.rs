//! Lowering from the parse tree and symbol table into IR.
//!
//! Translation is deterministic and fail-soft: constructs the edge-case
//! catalog flagged as blocking turn their enclosing paragraph into a
//! stub, constructs flagged for augmentation lower to their best
//! deterministic approximation, and everything else lowers exactly.
//! Identifier finalization happens here so every later stage sees final
//! names only.

use std::collections::HashMap;

use cobalt_cobol::ast;
use cobalt_cobol::ast::Statement;
use cobalt_cobol::semantic::{
    sanitize_identifier, DataEntry, DataType, EntryId, Scope, SymbolTable,
};

use crate::flow::{walk_statements, EdgeKind, FlowGraph};
use crate::ir::*;
use crate::names::NameScope;
use crate::structure::Structure;

/// Lower a program to IR.
pub fn translate(
    program: &ast::Program,
    symbols: &SymbolTable,
    graph: &FlowGraph<'_>,
    structure: &Structure,
) -> IrProgram {
    let mut translator = Translator {
        symbols,
        graph,
        structure,
        paths: HashMap::new(),
        file_names: HashMap::new(),
        para_finals: HashMap::new(),
        module_scope: NameScope::new(),
    };
    translator.run(program)
}

struct Translator<'a> {
    symbols: &'a SymbolTable,
    graph: &'a FlowGraph<'a>,
    structure: &'a Structure,
    /// Final attribute chain for every translatable data entry.
    paths: HashMap<EntryId, Vec<String>>,
    /// Source file name to final handle name.
    file_names: HashMap<String, String>,
    /// Uppercased paragraph name to final function name.
    para_finals: HashMap<String, String>,
    module_scope: NameScope,
}

impl<'a> Translator<'a> {
    fn run(&mut self, program: &ast::Program) -> IrProgram {
        let (records, scalars) = self.build_data();
        let files = self.build_files();

        for node in self.graph.nodes() {
            let final_name = self.module_scope.finalize(&sanitize_identifier(&node.name));
            self.para_finals
                .insert(node.name.to_uppercase(), final_name);
        }

        let paragraphs: Vec<IrParagraph> = self
            .graph
            .nodes()
            .iter()
            .map(|node| self.translate_paragraph(node))
            .collect();
        let entry = paragraphs
            .first()
            .map(|p| p.name.clone())
            .unwrap_or_default();

        tracing::debug!(
            records = records.len(),
            paragraphs = paragraphs.len(),
            blocked = paragraphs.iter().filter(|p| p.blocked).count(),
            "translation finished"
        );

        IrProgram {
            name: sanitize_identifier(program.name()),
            source_name: program.name().to_string(),
            records,
            scalars,
            files,
            paragraphs,
            entry,
        }
    }

    // ------------------------------------------------------------------
    // Data division
    // ------------------------------------------------------------------

    fn build_data(&mut self) -> (Vec<IrRecord>, Vec<IrField>) {
        let mut records = Vec::new();
        let mut scalars = Vec::new();
        for &root in self.symbols.roots() {
            if self.symbols.is_blocked(root) {
                continue;
            }
            let entry = self.symbols.entry(root).clone();
            let final_name = self.module_scope.finalize(&entry.target_name);
            if entry.is_group() {
                let record =
                    self.build_record(&entry, final_name.clone(), vec![final_name.clone()]);
                records.push(record);
            } else {
                self.paths.insert(entry.id, vec![final_name.clone()]);
                if let Some(field) = self.build_field(&entry, final_name) {
                    scalars.push(field);
                }
            }
        }
        (records, scalars)
    }

    fn build_record(&mut self, entry: &DataEntry, final_name: String, path: Vec<String>) -> IrRecord {
        self.paths.insert(entry.id, path.clone());
        let mut field_scope = NameScope::new();
        let mut fields = Vec::new();
        for &child_id in &entry.children {
            let child = self.symbols.entry(child_id).clone();
            if matches!(child.data_type, DataType::ConditionName) {
                // Condition names own no storage; references resolve to
                // the parent item.
                continue;
            }
            let child_final = field_scope.finalize(&child.target_name);
            let mut child_path = path.clone();
            child_path.push(child_final.clone());
            if child.is_group() {
                let nested = self.build_record(&child, child_final.clone(), child_path);
                fields.push(IrField {
                    name: child_final,
                    source_name: child.name.clone(),
                    ty: FieldType::Group(nested),
                    initial: None,
                    occurs: child.occurs.as_ref().map(|o| o.max),
                });
            } else {
                self.paths.insert(child.id, child_path);
                if let Some(field) = self.build_field(&child, child_final) {
                    fields.push(field);
                }
            }
        }
        IrRecord {
            name: final_name,
            source_name: entry.name.clone(),
            fields,
        }
    }

    fn build_field(&self, entry: &DataEntry, final_name: String) -> Option<IrField> {
        let ty = match entry.data_type {
            DataType::Numeric { digits, scale, .. } if scale == 0 => FieldType::Int { digits },
            DataType::Numeric { digits, scale, .. } => FieldType::Decimal { digits, scale },
            DataType::Alphanumeric { len } | DataType::AlphanumericEdited { len } => {
                FieldType::Str { len }
            }
            DataType::ConditionName | DataType::Group { .. } => return None,
        };
        Some(IrField {
            name: final_name,
            source_name: entry.name.clone(),
            ty,
            initial: entry.value.as_ref().map(constant_of),
            occurs: entry.occurs.as_ref().map(|o| o.max),
        })
    }

    fn build_files(&mut self) -> Vec<IrFile> {
        let mut files = Vec::new();
        for (name, info) in self.symbols.files() {
            let final_name = self.module_scope.finalize(&sanitize_identifier(name));
            self.file_names.insert(name.to_uppercase(), final_name.clone());
            let record = info
                .records
                .first()
                .and_then(|&id| self.paths.get(&id))
                .and_then(|segments| segments.first().cloned());
            files.push(IrFile {
                name: final_name,
                source_name: name.clone(),
                assign_to: info.assign_to.clone(),
                record,
            });
        }
        files
    }

    // ------------------------------------------------------------------
    // Procedure division
    // ------------------------------------------------------------------

    fn translate_paragraph(&self, node: &crate::flow::FlowNode<'_>) -> IrParagraph {
        let name = self.final_paragraph(&node.name);
        let mut blocked = self.structure.blocked.contains(&node.name);
        if !blocked {
            walk_statements(node.statements, &mut |s| {
                if matches!(s, Statement::Alter(_)) {
                    blocked = true;
                }
            });
        }

        let collapse_tail = self.structure.trivial_tail_gotos.contains(&node.name);
        let statements: &[Statement] = if collapse_tail {
            &node.statements[..node.statements.len() - 1]
        } else {
            node.statements
        };

        let body = if blocked {
            Vec::new()
        } else {
            self.stmts(statements)
        };

        let fall_through = if collapse_tail {
            match node.statements.last() {
                Some(Statement::GoTo(g)) => g.targets.first().map(|t| self.final_paragraph(t)),
                _ => None,
            }
        } else {
            node.edges
                .iter()
                .find(|e| e.kind == EdgeKind::FallThrough)
                .map(|e| self.final_paragraph(&self.graph.node(e.to).name))
        };

        IrParagraph {
            name,
            source_name: node.name.clone(),
            body,
            fall_through,
            blocked,
        }
    }

    fn final_paragraph(&self, name: &str) -> String {
        // Section names resolve through the graph to their first
        // paragraph.
        let resolved = self
            .graph
            .resolve(name)
            .map(|id| self.graph.node(id).name.clone())
            .unwrap_or_else(|| name.to_string());
        self.para_finals
            .get(&resolved.to_uppercase())
            .cloned()
            .unwrap_or_else(|| sanitize_identifier(&resolved))
    }

    fn stmts(&self, statements: &[Statement]) -> Vec<Ir> {
        let mut out = Vec::new();
        for statement in statements {
            self.stmt(statement, &mut out);
        }
        out
    }

    fn stmt(&self, statement: &Statement, out: &mut Vec<Ir>) {
        match statement {
            Statement::Move(s) => {
                let value = self.value(&s.value);
                for target in &s.targets {
                    out.push(Ir::Assign {
                        target: self.path(target),
                        value: value.clone(),
                        mode: self.move_mode(target),
                    });
                }
            }
            Statement::Compute(s) => out.push(Ir::Arithmetic {
                expression: self.value(&s.expression),
                targets: self.arith_targets(&s.targets),
                on_size_error: s.on_size_error.as_deref().map(|b| self.stmts(b)),
                not_on_size_error: s.not_on_size_error.as_deref().map(|b| self.stmts(b)),
            }),
            Statement::Add(s) => self.translate_add(s, out),
            Statement::Subtract(s) => self.translate_subtract(s, out),
            Statement::Multiply(s) => self.translate_multiply(s, out),
            Statement::Divide(s) => self.translate_divide(s, out),
            Statement::If(s) => out.push(Ir::Conditional {
                arms: vec![(self.cond(&s.condition), self.stmts(&s.then_branch))],
                else_arm: s.else_branch.as_deref().map(|b| self.stmts(b)),
            }),
            Statement::Evaluate(s) => self.translate_evaluate(s, out),
            Statement::Perform(s) => self.translate_perform(s, out),
            Statement::GoTo(s) => self.translate_goto(s, out),
            Statement::GoBack(_) | Statement::StopRun(_) => out.push(Ir::Call {
                paragraph: STOP_TARGET.to_string(),
                transfer: true,
            }),
            Statement::Exit(s) => {
                if s.program {
                    out.push(Ir::Call {
                        paragraph: STOP_TARGET.to_string(),
                        transfer: true,
                    });
                }
            }
            Statement::Continue(_) => {}
            Statement::Display(s) => out.push(Ir::FileOp {
                op: FileOpKind::Display {
                    operands: s.operands.iter().map(|e| self.value(e)).collect(),
                    newline: !s.no_advancing,
                },
                file: CONSOLE_FILE.to_string(),
                handlers: FileHandlers::default(),
            }),
            Statement::Accept(s) => out.push(Ir::FileOp {
                op: FileOpKind::Accept {
                    target: self.path(&s.target),
                    mode: self.move_mode(&s.target),
                },
                file: CONSOLE_FILE.to_string(),
                handlers: FileHandlers::default(),
            }),
            Statement::Open(s) => {
                for (mode, file) in &s.files {
                    out.push(Ir::FileOp {
                        op: FileOpKind::Open {
                            mode: open_mode(*mode),
                        },
                        file: self.final_file(file),
                        handlers: FileHandlers::default(),
                    });
                }
            }
            Statement::Close(s) => {
                for file in &s.files {
                    out.push(Ir::FileOp {
                        op: FileOpKind::Close,
                        file: self.final_file(file),
                        handlers: FileHandlers::default(),
                    });
                }
            }
            Statement::Read(s) => out.push(Ir::FileOp {
                op: FileOpKind::Read {
                    into: s
                        .into
                        .as_ref()
                        .map(|n| (self.path(n), self.move_mode(n))),
                },
                file: self.final_file(&s.file),
                handlers: FileHandlers {
                    at_end: s.at_end.as_deref().map(|b| self.stmts(b)),
                    not_at_end: s.not_at_end.as_deref().map(|b| self.stmts(b)),
                    invalid_key: s.invalid_key.as_deref().map(|b| self.stmts(b)),
                    not_invalid_key: s.not_invalid_key.as_deref().map(|b| self.stmts(b)),
                },
            }),
            Statement::Write(s) => out.push(Ir::FileOp {
                op: FileOpKind::Write {
                    from: s.from.as_ref().map(|e| self.value(e)),
                },
                file: self.file_of_record(&s.record.name),
                handlers: FileHandlers::default(),
            }),
            Statement::Call(s) => out.push(Ir::ExternalCall {
                program: self.value(&s.target),
                using: s.using.iter().map(|n| self.path(n)).collect(),
                returning: s.returning.as_ref().map(|n| self.path(n)),
            }),
            // Catalogued as edge cases; they have no deterministic
            // lowering, so nothing is emitted for them.
            Statement::Alter(_)
            | Statement::Sort(_)
            | Statement::Merge(_)
            | Statement::Unknown(_) => {}
        }
    }

    fn translate_add(&self, s: &ast::AddStatement, out: &mut Vec<Ir>) {
        let sum = self.sum(&s.operands);
        if s.giving.is_empty() {
            for target in &s.to {
                out.push(Ir::Arithmetic {
                    expression: Value::binary(
                        ArithOp::Add,
                        Value::var(self.path(&target.name)),
                        sum.clone(),
                    ),
                    targets: self.arith_targets(std::slice::from_ref(target)),
                    on_size_error: s.on_size_error.as_deref().map(|b| self.stmts(b)),
                    not_on_size_error: s.not_on_size_error.as_deref().map(|b| self.stmts(b)),
                });
            }
        } else {
            let mut expression = sum;
            for operand in &s.to {
                expression = Value::binary(
                    ArithOp::Add,
                    expression,
                    Value::var(self.path(&operand.name)),
                );
            }
            out.push(Ir::Arithmetic {
                expression,
                targets: self.arith_targets(&s.giving),
                on_size_error: s.on_size_error.as_deref().map(|b| self.stmts(b)),
                not_on_size_error: s.not_on_size_error.as_deref().map(|b| self.stmts(b)),
            });
        }
    }

    fn translate_subtract(&self, s: &ast::SubtractStatement, out: &mut Vec<Ir>) {
        let sum = self.sum(&s.operands);
        if s.giving.is_empty() {
            for target in &s.from {
                out.push(Ir::Arithmetic {
                    expression: Value::binary(
                        ArithOp::Subtract,
                        Value::var(self.path(&target.name)),
                        sum.clone(),
                    ),
                    targets: self.arith_targets(std::slice::from_ref(target)),
                    on_size_error: s.on_size_error.as_deref().map(|b| self.stmts(b)),
                    not_on_size_error: s.not_on_size_error.as_deref().map(|b| self.stmts(b)),
                });
            }
        } else if let Some(minuend) = s.from.first() {
            out.push(Ir::Arithmetic {
                expression: Value::binary(
                    ArithOp::Subtract,
                    Value::var(self.path(&minuend.name)),
                    sum,
                ),
                targets: self.arith_targets(&s.giving),
                on_size_error: s.on_size_error.as_deref().map(|b| self.stmts(b)),
                not_on_size_error: s.not_on_size_error.as_deref().map(|b| self.stmts(b)),
            });
        }
    }

    fn translate_multiply(&self, s: &ast::MultiplyStatement, out: &mut Vec<Ir>) {
        let operand = self.value(&s.operand);
        if s.giving.is_empty() {
            for target in &s.by {
                out.push(Ir::Arithmetic {
                    expression: Value::binary(
                        ArithOp::Multiply,
                        Value::var(self.path(&target.name)),
                        operand.clone(),
                    ),
                    targets: self.arith_targets(std::slice::from_ref(target)),
                    on_size_error: s.on_size_error.as_deref().map(|b| self.stmts(b)),
                    not_on_size_error: s.not_on_size_error.as_deref().map(|b| self.stmts(b)),
                });
            }
        } else if let Some(factor) = s.by.first() {
            out.push(Ir::Arithmetic {
                expression: Value::binary(
                    ArithOp::Multiply,
                    operand,
                    Value::var(self.path(&factor.name)),
                ),
                targets: self.arith_targets(&s.giving),
                on_size_error: s.on_size_error.as_deref().map(|b| self.stmts(b)),
                not_on_size_error: s.not_on_size_error.as_deref().map(|b| self.stmts(b)),
            });
        }
    }

    fn translate_divide(&self, s: &ast::DivideStatement, out: &mut Vec<Ir>) {
        let operand = self.value(&s.operand);
        if let Some(by) = &s.by {
            // DIVIDE a BY b GIVING c [REMAINDER r].
            let divisor = self.value(by);
            let quotient = Value::binary(ArithOp::Divide, operand.clone(), divisor.clone());
            out.push(Ir::Arithmetic {
                expression: quotient,
                targets: self.arith_targets(&s.giving),
                on_size_error: s.on_size_error.as_deref().map(|b| self.stmts(b)),
                not_on_size_error: s.not_on_size_error.as_deref().map(|b| self.stmts(b)),
            });
            if let (Some(remainder), Some(giving)) = (&s.remainder, s.giving.first()) {
                // remainder = dividend - quotient * divisor, using the
                // already-conformed quotient.
                let value = Value::binary(
                    ArithOp::Subtract,
                    operand,
                    Value::binary(
                        ArithOp::Multiply,
                        Value::var(self.path(&giving.name)),
                        divisor,
                    ),
                );
                out.push(Ir::Assign {
                    target: self.path(remainder),
                    value,
                    mode: self.move_mode(remainder),
                });
            }
        } else if s.giving.is_empty() {
            // DIVIDE a INTO b... : each b becomes b / a.
            for target in &s.into {
                out.push(Ir::Arithmetic {
                    expression: Value::binary(
                        ArithOp::Divide,
                        Value::var(self.path(&target.name)),
                        operand.clone(),
                    ),
                    targets: self.arith_targets(std::slice::from_ref(target)),
                    on_size_error: s.on_size_error.as_deref().map(|b| self.stmts(b)),
                    not_on_size_error: s.not_on_size_error.as_deref().map(|b| self.stmts(b)),
                });
            }
        } else if let Some(dividend) = s.into.first() {
            // DIVIDE a INTO b GIVING c.
            out.push(Ir::Arithmetic {
                expression: Value::binary(
                    ArithOp::Divide,
                    Value::var(self.path(&dividend.name)),
                    operand,
                ),
                targets: self.arith_targets(&s.giving),
                on_size_error: s.on_size_error.as_deref().map(|b| self.stmts(b)),
                not_on_size_error: s.not_on_size_error.as_deref().map(|b| self.stmts(b)),
            });
        }
    }

    fn translate_evaluate(&self, s: &ast::EvaluateStatement, out: &mut Vec<Ir>) {
        let subject = match &s.subject {
            ast::EvaluateSubject::Expression(e) => Some(self.value(e)),
            ast::EvaluateSubject::True | ast::EvaluateSubject::False => None,
        };
        let invert = matches!(s.subject, ast::EvaluateSubject::False);

        let mut arms = Vec::new();
        let mut else_arm = s.other.as_deref().map(|b| self.stmts(b));
        for branch in &s.branches {
            if branch.objects.iter().any(|o| matches!(o, ast::WhenObject::Any)) {
                // An unconditional WHEN takes everything that falls
                // through to it.
                else_arm = Some(self.stmts(&branch.statements));
                break;
            }
            let mut cond: Option<Cond> = None;
            for object in &branch.objects {
                let piece = match object {
                    ast::WhenObject::Value(v) => match &subject {
                        Some(subject) => Cond::Compare {
                            op: CmpOp::Equal,
                            left: subject.clone(),
                            right: self.value(v),
                        },
                        None => self.truthy(v),
                    },
                    ast::WhenObject::Condition(c) => self.cond(c),
                    ast::WhenObject::Any => continue,
                };
                let piece = if invert { negate(piece) } else { piece };
                cond = Some(match cond {
                    Some(existing) => Cond::Or(Box::new(existing), Box::new(piece)),
                    None => piece,
                });
            }
            if let Some(cond) = cond {
                arms.push((cond, self.stmts(&branch.statements)));
            }
        }
        out.push(Ir::Conditional { arms, else_arm });
    }

    fn translate_perform(&self, s: &ast::PerformStatement, out: &mut Vec<Ir>) {
        let body = match (&s.inline, &s.target) {
            (Some(inline), _) => self.stmts(inline),
            (None, Some(target)) => vec![Ir::Call {
                // PERFORM THRU lowers to its first paragraph; the range
                // is surfaced by edge-case detection.
                paragraph: self.final_paragraph(target),
                transfer: false,
            }],
            (None, None) => Vec::new(),
        };

        if let Some(varying) = &s.varying {
            let variable = self.path(&varying.variable);
            let step = Ir::Assign {
                target: variable.clone(),
                value: Value::binary(
                    ArithOp::Add,
                    Value::var(variable.clone()),
                    self.value(&varying.by),
                ),
                mode: self.move_mode(&varying.variable),
            };
            let mut loop_body = body;
            loop_body.push(step);
            out.push(Ir::Sequence(vec![
                Ir::Assign {
                    target: variable,
                    value: self.value(&varying.from),
                    mode: self.move_mode(&varying.variable),
                },
                Ir::Loop {
                    kind: if s.test_after {
                        LoopKind::PostTest
                    } else {
                        LoopKind::While
                    },
                    count: None,
                    cond: Some(negate(self.cond(&varying.until))),
                    body: loop_body,
                },
            ]));
        } else if let Some(until) = &s.until {
            out.push(Ir::Loop {
                kind: if s.test_after {
                    LoopKind::PostTest
                } else {
                    LoopKind::While
                },
                count: None,
                cond: Some(negate(self.cond(until))),
                body,
            });
        } else if let Some(times) = &s.times {
            out.push(Ir::Loop {
                kind: LoopKind::Count,
                count: Some(self.value(times)),
                cond: None,
                body,
            });
        } else {
            out.extend(body);
        }
    }

    fn translate_goto(&self, s: &ast::GoToStatement, out: &mut Vec<Ir>) {
        match &s.depending_on {
            None => {
                if let Some(target) = s.targets.first() {
                    out.push(Ir::Call {
                        paragraph: self.final_paragraph(target),
                        transfer: true,
                    });
                }
            }
            Some(selector) => {
                // Best-effort lowering: select on the one-based value of
                // the controlling item, falling through when out of
                // range.
                let selector = Value::var(self.path(selector));
                let arms = s
                    .targets
                    .iter()
                    .enumerate()
                    .map(|(i, target)| {
                        (
                            Cond::Compare {
                                op: CmpOp::Equal,
                                left: selector.clone(),
                                right: Value::int(i as i64 + 1),
                            },
                            vec![Ir::Call {
                                paragraph: self.final_paragraph(target),
                                transfer: true,
                            }],
                        )
                    })
                    .collect();
                out.push(Ir::Conditional {
                    arms,
                    else_arm: None,
                });
            }
        }
    }

    // ------------------------------------------------------------------
    // Values and conditions
    // ------------------------------------------------------------------

    fn value(&self, expression: &ast::Expression) -> Value {
        match expression {
            ast::Expression::Literal(lit) => Value::Literal(constant_of(lit)),
            ast::Expression::Variable(name) => Value::var(self.path(name)),
            ast::Expression::Binary { op, left, right } => Value::binary(
                arith_op(*op),
                self.value(left),
                self.value(right),
            ),
            ast::Expression::Unary { op, operand } => match op {
                ast::UnaryOp::Negate => Value::Unary {
                    op: UnaryArithOp::Negate,
                    operand: Box::new(self.value(operand)),
                },
                ast::UnaryOp::Plus => self.value(operand),
            },
            ast::Expression::Paren(inner) => self.value(inner),
        }
    }

    fn sum(&self, operands: &[ast::Expression]) -> Value {
        let mut values = operands.iter().map(|e| self.value(e));
        let first = values.next().unwrap_or(Value::int(0));
        values.fold(first, |acc, v| Value::binary(ArithOp::Add, acc, v))
    }

    fn cond(&self, condition: &ast::Condition) -> Cond {
        match condition {
            ast::Condition::Comparison { left, op, right } => Cond::Compare {
                op: cmp_op(*op),
                left: self.value(left),
                right: self.value(right),
            },
            ast::Condition::Class {
                operand,
                class,
                negated,
            } => {
                let test = Cond::ClassTest {
                    value: self.value(operand),
                    class: class_kind(*class),
                };
                if *negated {
                    Cond::Not(Box::new(test))
                } else {
                    test
                }
            }
            ast::Condition::ConditionName(name) => self.condition_name(name),
            ast::Condition::Not(inner) => negate(self.cond(inner)),
            ast::Condition::And(l, r) => {
                Cond::And(Box::new(self.cond(l)), Box::new(self.cond(r)))
            }
            ast::Condition::Or(l, r) => {
                Cond::Or(Box::new(self.cond(l)), Box::new(self.cond(r)))
            }
            ast::Condition::Paren(inner) => self.cond(inner),
        }
    }

    /// Lower a level-88 reference to tests against its parent item, one
    /// per VALUE entry, joined with OR. Single values become equality
    /// tests; THRU ranges become inclusive bound checks.
    fn condition_name(&self, name: &ast::QualifiedName) -> Cond {
        let entry = self.symbols.resolve(&name.name);
        if let Some(entry) = entry {
            if matches!(entry.data_type, DataType::ConditionName) {
                if let Some(parent) = entry.parent {
                    let parent_value = Value::var(self.entry_path(parent));
                    let mut tests = entry.condition_values.iter().map(|spec| match spec {
                        ast::ConditionSpec::Single(lit) => Cond::Compare {
                            op: CmpOp::Equal,
                            left: parent_value.clone(),
                            right: Value::Literal(constant_of(lit)),
                        },
                        ast::ConditionSpec::Range(low, high) => Cond::And(
                            Box::new(Cond::Compare {
                                op: CmpOp::GreaterOrEqual,
                                left: parent_value.clone(),
                                right: Value::Literal(constant_of(low)),
                            }),
                            Box::new(Cond::Compare {
                                op: CmpOp::LessOrEqual,
                                left: parent_value.clone(),
                                right: Value::Literal(constant_of(high)),
                            }),
                        ),
                    });
                    if let Some(first) = tests.next() {
                        return tests
                            .fold(first, |acc, t| Cond::Or(Box::new(acc), Box::new(t)));
                    }
                }
            }
        }
        // Not an 88 after all; fall back to a truthiness test.
        Cond::Compare {
            op: CmpOp::NotEqual,
            left: Value::var(self.path(name)),
            right: Value::int(0),
        }
    }

    fn truthy(&self, expression: &ast::Expression) -> Cond {
        if let ast::Expression::Variable(name) = expression {
            return self.condition_name(name);
        }
        Cond::Compare {
            op: CmpOp::NotEqual,
            left: self.value(expression),
            right: Value::int(0),
        }
    }

    // ------------------------------------------------------------------
    // Name resolution
    // ------------------------------------------------------------------

    fn path(&self, name: &ast::QualifiedName) -> Path {
        let mut path = match self.symbols.resolve(&name.name) {
            Some(entry) => self.entry_path(entry.id),
            None => Path::local(sanitize_identifier(&name.name)),
        };
        if let Some(subscript) = name.subscripts.first() {
            path = path.indexed(self.value(subscript));
        }
        path
    }

    fn entry_path(&self, id: EntryId) -> Path {
        match self.paths.get(&id) {
            Some(segments) => Path::new(segments.clone()),
            None => Path::local(self.symbols.entry(id).target_name.clone()),
        }
    }

    fn move_mode(&self, name: &ast::QualifiedName) -> AssignMode {
        self.mode_of(name, false)
    }

    fn mode_of(&self, name: &ast::QualifiedName, rounded: bool) -> AssignMode {
        match self.symbols.resolve(&name.name).map(|e| &e.data_type) {
            Some(DataType::Numeric { digits, scale, .. }) => AssignMode::Numeric {
                digits: *digits,
                scale: *scale,
                rounded,
            },
            Some(DataType::Alphanumeric { len })
            | Some(DataType::AlphanumericEdited { len }) => AssignMode::Alphanumeric { len: *len },
            _ => AssignMode::Raw,
        }
    }

    fn arith_targets(&self, targets: &[ast::ComputeTarget]) -> Vec<ArithTarget> {
        targets
            .iter()
            .map(|t| ArithTarget {
                path: self.path(&t.name),
                mode: self.mode_of(&t.name, t.rounded),
            })
            .collect()
    }

    fn final_file(&self, name: &str) -> String {
        self.file_names
            .get(&name.to_uppercase())
            .cloned()
            .unwrap_or_else(|| sanitize_identifier(name))
    }

    /// The file a record belongs to, for WRITE.
    fn file_of_record(&self, record: &str) -> String {
        if let Some(entry) = self.symbols.resolve(record) {
            let root = self.symbols.root_of(entry.id);
            if let Scope::File(file) = &self.symbols.entry(root).scope {
                return self.final_file(file);
            }
        }
        sanitize_identifier(record)
    }
}

/// Invert a condition, folding the negation into comparisons.
fn negate(cond: Cond) -> Cond {
    match cond {
        Cond::Compare { op, left, right } => Cond::Compare {
            op: invert_cmp(op),
            left,
            right,
        },
        Cond::Not(inner) => *inner,
        other => Cond::Not(Box::new(other)),
    }
}

fn invert_cmp(op: CmpOp) -> CmpOp {
    match op {
        CmpOp::Equal => CmpOp::NotEqual,
        CmpOp::NotEqual => CmpOp::Equal,
        CmpOp::Greater => CmpOp::LessOrEqual,
        CmpOp::GreaterOrEqual => CmpOp::Less,
        CmpOp::Less => CmpOp::GreaterOrEqual,
        CmpOp::LessOrEqual => CmpOp::Greater,
    }
}

fn constant_of(literal: &ast::Literal) -> Constant {
    match &literal.kind {
        ast::LiteralKind::Integer(n) => Constant::Int(*n),
        ast::LiteralKind::Decimal(text) => Constant::Decimal(text.clone()),
        ast::LiteralKind::String(text) => Constant::Str(text.clone()),
        ast::LiteralKind::Figurative(fig) => match fig {
            ast::Figurative::Zero => Constant::Int(0),
            ast::Figurative::Space => Constant::Str(" ".to_string()),
            ast::Figurative::HighValue => Constant::Str("\u{00ff}".to_string()),
            ast::Figurative::LowValue => Constant::Str("\u{0000}".to_string()),
            ast::Figurative::Quote => Constant::Str("\"".to_string()),
        },
    }
}

fn arith_op(op: ast::BinaryOp) -> ArithOp {
    match op {
        ast::BinaryOp::Add => ArithOp::Add,
        ast::BinaryOp::Subtract => ArithOp::Subtract,
        ast::BinaryOp::Multiply => ArithOp::Multiply,
        ast::BinaryOp::Divide => ArithOp::Divide,
        ast::BinaryOp::Power => ArithOp::Power,
    }
}

fn cmp_op(op: ast::ComparisonOp) -> CmpOp {
    match op {
        ast::ComparisonOp::Equal => CmpOp::Equal,
        ast::ComparisonOp::NotEqual => CmpOp::NotEqual,
        ast::ComparisonOp::Greater => CmpOp::Greater,
        ast::ComparisonOp::GreaterOrEqual => CmpOp::GreaterOrEqual,
        ast::ComparisonOp::Less => CmpOp::Less,
        ast::ComparisonOp::LessOrEqual => CmpOp::LessOrEqual,
    }
}

fn class_kind(class: ast::ClassTest) -> ClassKind {
    match class {
        ast::ClassTest::Numeric => ClassKind::Numeric,
        ast::ClassTest::Alphabetic => ClassKind::Alphabetic,
        ast::ClassTest::Positive => ClassKind::Positive,
        ast::ClassTest::Negative => ClassKind::Negative,
        ast::ClassTest::Zero => ClassKind::Zero,
    }
}

fn open_mode(mode: ast::OpenMode) -> OpenMode {
    match mode {
        ast::OpenMode::Input => OpenMode::Input,
        ast::OpenMode::Output => OpenMode::Output,
        ast::OpenMode::Extend => OpenMode::Extend,
        ast::OpenMode::InputOutput => OpenMode::InputOutput,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{flow, structure};
    use cobalt_cobol::lexer::{FileId, SourceFile, SourceFormat};
    use cobalt_cobol::parser::parse_source;
    use cobalt_cobol::semantic;

    fn lower(text: &str) -> IrProgram {
        let source = SourceFile::from_text(FileId::MAIN, text.to_string(), SourceFormat::Free);
        let (program, errors) = parse_source(&source);
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        let program = program.unwrap();
        let (symbols, _) = semantic::analyze(&program);
        let (graph, _) = flow::analyze(&program, &symbols);
        let structure = structure::analyze(&graph);
        translate(&program, &symbols, &graph, &structure)
    }

    fn lower_procedure(data: &str, body: &str) -> IrProgram {
        lower(&format!(
            "IDENTIFICATION DIVISION.\nPROGRAM-ID. DEMO.\n{}PROCEDURE DIVISION.\n{}\n",
            data, body
        ))
    }

    const WS: &str = "DATA DIVISION.\nWORKING-STORAGE SECTION.\n\
         01 CHOICE PIC 9.\n\
         01 WS-NAME PIC X(10).\n\
         01 WS-TOTAL PIC 9(5)V99.\n\
         01 MORE-DATA PIC X(3).\n";

    #[test]
    fn if_lowers_to_conditional() {
        let ir = lower_procedure(
            WS,
            "MAIN-PARA.\n    IF CHOICE = 1\n        DISPLAY \"ONE\"\n    END-IF.\n    STOP RUN.",
        );
        let body = &ir.paragraphs[0].body;
        let Ir::Conditional { arms, else_arm } = &body[0] else {
            panic!("expected conditional, got {:?}", body[0]);
        };
        assert!(else_arm.is_none());
        let (cond, then) = &arms[0];
        assert_eq!(
            *cond,
            Cond::Compare {
                op: CmpOp::Equal,
                left: Value::var(Path::local("choice")),
                right: Value::int(1),
            }
        );
        assert!(matches!(&then[0], Ir::FileOp { file, .. } if file == CONSOLE_FILE));
    }

    #[test]
    fn move_carries_destination_length() {
        let ir = lower_procedure(WS, "MAIN-PARA.\n    MOVE \"HI\" TO WS-NAME.\n    STOP RUN.");
        let Ir::Assign { mode, .. } = &ir.paragraphs[0].body[0] else {
            panic!("expected assign");
        };
        assert_eq!(*mode, AssignMode::Alphanumeric { len: 10 });
    }

    #[test]
    fn compute_rounded_with_size_error_guard() {
        let ir = lower_procedure(
            WS,
            "MAIN-PARA.\n    COMPUTE WS-TOTAL ROUNDED = WS-TOTAL * 2\n        ON SIZE ERROR DISPLAY \"OVERFLOW\"\n    END-COMPUTE.\n    STOP RUN.",
        );
        let Ir::Arithmetic {
            targets,
            on_size_error,
            ..
        } = &ir.paragraphs[0].body[0]
        else {
            panic!("expected arithmetic");
        };
        assert_eq!(
            targets[0].mode,
            AssignMode::Numeric {
                digits: 7,
                scale: 2,
                rounded: true,
            }
        );
        assert!(on_size_error.is_some());
    }

    #[test]
    fn perform_until_becomes_while_with_inverted_test() {
        let ir = lower_procedure(
            WS,
            "MAIN-PARA.\n    PERFORM READ-LOOP UNTIL MORE-DATA = \"NO\".\n    STOP RUN.\nREAD-LOOP.\n    EXIT.",
        );
        let Ir::Loop { kind, cond, body, .. } = &ir.paragraphs[0].body[0] else {
            panic!("expected loop");
        };
        assert_eq!(*kind, LoopKind::While);
        assert_eq!(
            *cond,
            Some(Cond::Compare {
                op: CmpOp::NotEqual,
                left: Value::var(Path::local("more_data")),
                right: Value::str("NO"),
            })
        );
        assert_eq!(
            body[0],
            Ir::Call {
                paragraph: "read_loop".into(),
                transfer: false,
            }
        );
    }

    #[test]
    fn condition_name_tests_its_parent() {
        let ir = lower_procedure(
            "DATA DIVISION.\nWORKING-STORAGE SECTION.\n\
             01 WS-STATUS PIC X(2).\n\
                88 EOF-REACHED VALUE \"10\".\n",
            "MAIN-PARA.\n    IF EOF-REACHED\n        DISPLAY \"DONE\"\n    END-IF.\n    STOP RUN.",
        );
        let Ir::Conditional { arms, .. } = &ir.paragraphs[0].body[0] else {
            panic!("expected conditional");
        };
        assert_eq!(
            arms[0].0,
            Cond::Compare {
                op: CmpOp::Equal,
                left: Value::var(Path::local("ws_status")),
                right: Value::str("10"),
            }
        );
    }

    #[test]
    fn condition_name_range_tests_the_bounds() {
        let ir = lower_procedure(
            "DATA DIVISION.\nWORKING-STORAGE SECTION.\n\
             01 WS-CODE PIC 9.\n\
                88 VALID-CODE VALUE 1 THRU 5.\n",
            "MAIN-PARA.\n    IF VALID-CODE\n        DISPLAY \"OK\"\n    END-IF.\n    STOP RUN.",
        );
        let Ir::Conditional { arms, .. } = &ir.paragraphs[0].body[0] else {
            panic!("expected conditional");
        };
        // Interior values must satisfy the range, not just the endpoints.
        assert_eq!(
            arms[0].0,
            Cond::And(
                Box::new(Cond::Compare {
                    op: CmpOp::GreaterOrEqual,
                    left: Value::var(Path::local("ws_code")),
                    right: Value::int(1),
                }),
                Box::new(Cond::Compare {
                    op: CmpOp::LessOrEqual,
                    left: Value::var(Path::local("ws_code")),
                    right: Value::int(5),
                }),
            )
        );
    }

    #[test]
    fn stop_run_transfers_to_the_stop_target() {
        let ir = lower_procedure(WS, "MAIN-PARA.\n    STOP RUN.");
        assert_eq!(
            ir.paragraphs[0].body[0],
            Ir::Call {
                paragraph: STOP_TARGET.into(),
                transfer: true,
            }
        );
    }

    #[test]
    fn read_at_end_keeps_both_handlers() {
        let ir = lower(
            "IDENTIFICATION DIVISION.\n\
             PROGRAM-ID. COPYF.\n\
             ENVIRONMENT DIVISION.\n\
             INPUT-OUTPUT SECTION.\n\
             FILE-CONTROL.\n\
                 SELECT IN-FILE ASSIGN TO \"IN.DAT\".\n\
             DATA DIVISION.\n\
             FILE SECTION.\n\
             FD IN-FILE.\n\
             01 IN-REC PIC X(80).\n\
             WORKING-STORAGE SECTION.\n\
             01 MORE-DATA PIC X(3) VALUE \"YES\".\n\
             PROCEDURE DIVISION.\n\
             MAIN-PARA.\n\
                 READ IN-FILE\n\
                     AT END MOVE \"NO\" TO MORE-DATA\n\
                     NOT AT END DISPLAY IN-REC\n\
                 END-READ.\n\
                 STOP RUN.\n",
        );
        let Ir::FileOp { op, file, handlers } = &ir.paragraphs[0].body[0] else {
            panic!("expected file op");
        };
        assert!(matches!(op, FileOpKind::Read { .. }));
        assert_eq!(file, "in_file");
        assert!(handlers.at_end.is_some());
        assert!(handlers.not_at_end.is_some());
        assert_eq!(ir.files[0].record.as_deref(), Some("in_rec"));
    }

    #[test]
    fn trivial_tail_goto_collapses_to_fall_through() {
        let ir = lower_procedure(
            WS,
            "FIRST-PARA.\n    DISPLAY \"A\".\n    GO TO SECOND-PARA.\nSECOND-PARA.\n    STOP RUN.",
        );
        let first = &ir.paragraphs[0];
        assert_eq!(first.fall_through.as_deref(), Some("second_para"));
        assert!(!first
            .body
            .iter()
            .any(|n| matches!(n, Ir::Call { transfer: true, .. })));
    }

    #[test]
    fn alter_blocks_its_paragraph() {
        let ir = lower_procedure(
            WS,
            "MAIN-PARA.\n    ALTER MAIN-PARA TO PROCEED TO END-PARA.\nEND-PARA.\n    STOP RUN.",
        );
        let main = &ir.paragraphs[0];
        assert!(main.blocked);
        assert!(main.body.is_empty());
        assert!(!ir.paragraphs[1].blocked);
    }

    #[test]
    fn varying_lowers_to_init_loop_step() {
        let ir = lower_procedure(
            "DATA DIVISION.\nWORKING-STORAGE SECTION.\n01 IDX PIC 9(3).\n",
            "MAIN-PARA.\n    PERFORM VARYING IDX FROM 1 BY 1 UNTIL IDX > 10\n        DISPLAY IDX\n    END-PERFORM.\n    STOP RUN.",
        );
        let Ir::Sequence(parts) = &ir.paragraphs[0].body[0] else {
            panic!("expected sequence");
        };
        assert!(matches!(&parts[0], Ir::Assign { .. }));
        let Ir::Loop { kind, body, .. } = &parts[1] else {
            panic!("expected loop");
        };
        assert_eq!(*kind, LoopKind::While);
        // Display plus the step assignment.
        assert_eq!(body.len(), 2);
        assert!(matches!(body.last(), Some(Ir::Assign { .. })));
    }

    #[test]
    fn group_fields_get_attribute_paths() {
        let ir = lower_procedure(
            "DATA DIVISION.\nWORKING-STORAGE SECTION.\n\
             01 WS-REC.\n\
                05 WS-ID PIC 9(5).\n\
                05 WS-NAME PIC X(20).\n",
            "MAIN-PARA.\n    MOVE 7 TO WS-ID.\n    STOP RUN.",
        );
        assert_eq!(ir.records[0].name, "ws_rec");
        assert_eq!(ir.records[0].fields.len(), 2);
        let Ir::Assign { target, .. } = &ir.paragraphs[0].body[0] else {
            panic!("expected assign");
        };
        assert_eq!(target.segments, vec!["ws_rec".to_string(), "ws_id".to_string()]);
    }

    #[test]
    fn goto_depending_selects_on_one_based_value() {
        let ir = lower_procedure(
            WS,
            "MAIN-PARA.\n    GO TO A-PARA B-PARA DEPENDING ON CHOICE.\nA-PARA.\n    STOP RUN.\nB-PARA.\n    STOP RUN.",
        );
        let Ir::Conditional { arms, else_arm } = &ir.paragraphs[0].body[0] else {
            panic!("expected conditional");
        };
        assert_eq!(arms.len(), 2);
        assert!(else_arm.is_none());
        assert_eq!(
            arms[1].0,
            Cond::Compare {
                op: CmpOp::Equal,
                left: Value::var(Path::local("choice")),
                right: Value::int(2),
            }
        );
        assert!(
            matches!(&arms[0].1[0], Ir::Call { paragraph, transfer: true } if paragraph == "a_para")
        );
    }
}
