//! Target code generation.
//!
//! A pure function of the IR: walking the same program twice emits
//! byte-identical output. The target-specific text lives in a
//! [`TargetTemplates`] value, so the walker itself knows nothing about
//! any one language beyond expression syntax.

pub mod python;

use std::collections::{BTreeSet, HashMap};

use crate::ir::*;

/// The static text fragments of one target language.
#[derive(Debug, Clone, Copy)]
pub struct TargetTemplates {
    /// Module docstring and imports. Placeholder: `{source_name}`.
    pub header: &'static str,
    /// Runtime helper definitions, emitted verbatim.
    pub helpers: &'static str,
    /// Dispatch-driver main routine. Placeholder: `{entry}`.
    pub dispatch_driver: &'static str,
    /// Straight-call main routine for programs without transfers.
    /// Placeholder: `{entry}`.
    pub simple_main: &'static str,
}

/// Generate a complete target module for a translated program.
pub fn generate(program: &IrProgram, templates: &TargetTemplates) -> String {
    let generator = Generator::new(program);
    let output = generator.run(templates);
    tracing::debug!(
        program = %program.source_name,
        bytes = output.len(),
        "module generated"
    );
    output
}

struct Generator<'a> {
    program: &'a IrProgram,
    /// Module-level names functions rebind, declared global.
    globals: Vec<String>,
    files_by_name: HashMap<&'a str, &'a IrFile>,
    /// File handles referenced by operations but never declared.
    undeclared_files: BTreeSet<String>,
}

impl<'a> Generator<'a> {
    fn new(program: &'a IrProgram) -> Self {
        let files_by_name: HashMap<&str, &IrFile> =
            program.files.iter().map(|f| (f.name.as_str(), f)).collect();

        let mut undeclared_files = BTreeSet::new();
        for paragraph in &program.paragraphs {
            collect_file_refs(&paragraph.body, &mut |name| {
                if name != CONSOLE_FILE && !files_by_name.contains_key(name) {
                    undeclared_files.insert(name.to_string());
                }
            });
        }

        let mut globals: Vec<String> =
            program.scalars.iter().map(|s| s.name.clone()).collect();
        globals.extend(program.files.iter().map(|f| f.name.clone()));
        globals.extend(undeclared_files.iter().cloned());

        Generator {
            program,
            globals,
            files_by_name,
            undeclared_files,
        }
    }

    fn run(&self, templates: &TargetTemplates) -> String {
        let mut e = Emitter::default();

        e.raw(&templates.header.replace("{source_name}", &self.program.source_name));
        e.raw(templates.helpers);

        self.emit_records(&mut e);
        self.emit_scalars(&mut e);
        self.emit_files(&mut e);

        for paragraph in &self.program.paragraphs {
            self.emit_paragraph(paragraph, &mut e);
        }

        if self.program.paragraphs.len() > 1 || self.program.needs_dispatch() {
            e.blank();
            e.blank();
            e.line(0, "_DISPATCH = {");
            for paragraph in &self.program.paragraphs {
                e.line(1, &format!("\"{}\": {},", paragraph.name, paragraph.name));
            }
            e.line(0, "}");
            e.raw(&templates.dispatch_driver.replace("{entry}", &self.program.entry));
        } else if !self.program.entry.is_empty() {
            e.raw(&templates.simple_main.replace("{entry}", &self.program.entry));
        }

        e.out
    }

    // ------------------------------------------------------------------
    // Data
    // ------------------------------------------------------------------

    fn emit_records(&self, e: &mut Emitter) {
        for record in &self.program.records {
            self.emit_record_class(record, "", e);
        }
        if !self.program.records.is_empty() {
            e.blank();
            e.blank();
            for record in &self.program.records {
                e.line(
                    0,
                    &format!("{} = {}()", record.name, class_name("", &record.name)),
                );
            }
        }
    }

    fn emit_record_class(&self, record: &IrRecord, prefix: &str, e: &mut Emitter) {
        // Nested groups first so their classes exist by the time the
        // parent annotates them.
        let own = class_name(prefix, &record.name);
        for field in &record.fields {
            if let FieldType::Group(nested) = &field.ty {
                self.emit_record_class(nested, &own, e);
            }
        }

        e.blank();
        e.blank();
        e.line(0, "@dataclass");
        e.line(0, &format!("class {}:", own));
        if record.fields.is_empty() {
            e.line(1, "pass");
            return;
        }
        for field in &record.fields {
            e.line(1, &self.field_line(field, &own));
        }
    }

    fn field_line(&self, field: &IrField, parent_class: &str) -> String {
        let (annotation, default) = match &field.ty {
            FieldType::Int { .. } => ("int".to_string(), field_default(field, "0")),
            FieldType::Decimal { scale, .. } => {
                let zero = format!("Decimal(\"0.{}\")", "0".repeat(*scale as usize));
                ("Decimal".to_string(), field_default(field, &zero))
            }
            FieldType::Str { len } => {
                let blank = format!("\" \" * {}", len);
                ("str".to_string(), field_default(field, &blank))
            }
            FieldType::Group(nested) => {
                let class = class_name(parent_class, &nested.name);
                let default = match field.occurs {
                    Some(n) => format!(
                        "field(default_factory=lambda: [{}() for _ in range({})])",
                        class, n
                    ),
                    None => format!("field(default_factory={})", class),
                };
                return format!("{}: {} = {}", field.name, class, default);
            }
        };
        match field.occurs {
            Some(n) => format!(
                "{}: list = field(default_factory=lambda: [{}] * {})",
                field.name, default, n
            ),
            None => format!("{}: {} = {}", field.name, annotation, default),
        }
    }

    fn emit_scalars(&self, e: &mut Emitter) {
        if self.program.scalars.is_empty() {
            return;
        }
        e.blank();
        e.blank();
        for scalar in &self.program.scalars {
            let default = match &scalar.ty {
                FieldType::Int { .. } => field_default(scalar, "0"),
                FieldType::Decimal { scale, .. } => {
                    field_default(scalar, &format!("Decimal(\"0.{}\")", "0".repeat(*scale as usize)))
                }
                FieldType::Str { len } => field_default(scalar, &format!("\" \" * {}", len)),
                FieldType::Group(_) => continue,
            };
            match scalar.occurs {
                Some(n) => e.line(0, &format!("{} = [{}] * {}", scalar.name, default, n)),
                None => e.line(0, &format!("{} = {}", scalar.name, default)),
            }
        }
    }

    fn emit_files(&self, e: &mut Emitter) {
        if self.program.files.is_empty() && self.undeclared_files.is_empty() {
            return;
        }
        e.blank();
        e.blank();
        for file in &self.program.files {
            let assign = file
                .assign_to
                .clone()
                .unwrap_or_else(|| file.source_name.clone());
            e.line(0, &format!("{} = _CobolFile({})", file.name, py_str(&assign)));
        }
        for name in &self.undeclared_files {
            e.line(0, &format!("{} = _CobolFile({})", name, py_str(name)));
        }
    }

    // ------------------------------------------------------------------
    // Paragraphs
    // ------------------------------------------------------------------

    fn emit_paragraph(&self, paragraph: &IrParagraph, e: &mut Emitter) {
        e.blank();
        e.blank();
        e.line(0, &format!("def {}():", paragraph.name));
        if paragraph.blocked {
            e.line(
                1,
                &format!(
                    "raise NotImplementedError({})",
                    py_str(&format!(
                        "paragraph {} requires manual translation",
                        paragraph.source_name
                    ))
                ),
            );
            return;
        }
        if !self.globals.is_empty() {
            e.line(1, &format!("global {}", self.globals.join(", ")));
        }
        self.emit_nodes(&paragraph.body, 1, e);
        if !ends_in_transfer(&paragraph.body) {
            match &paragraph.fall_through {
                Some(next) => e.line(1, &format!("return {}", py_str(next))),
                None => e.line(1, "return None"),
            }
        }
    }

    fn emit_nodes(&self, nodes: &[Ir], indent: usize, e: &mut Emitter) {
        for node in nodes {
            self.emit_node(node, indent, e);
        }
    }

    fn emit_body(&self, nodes: &[Ir], indent: usize, e: &mut Emitter) {
        if nodes.is_empty() {
            e.line(indent, "pass");
        } else {
            self.emit_nodes(nodes, indent, e);
        }
    }

    fn emit_node(&self, node: &Ir, indent: usize, e: &mut Emitter) {
        match node {
            Ir::Sequence(inner) => self.emit_nodes(inner, indent, e),
            Ir::Assign { target, value, mode } => {
                let target = render_path(target);
                let value = render_value(value);
                e.line(indent, &assign_line(&target, &value, mode));
            }
            Ir::Arithmetic {
                expression,
                targets,
                on_size_error,
                not_on_size_error,
            } => self.emit_arithmetic(
                expression,
                targets,
                on_size_error.as_deref(),
                not_on_size_error.as_deref(),
                indent,
                e,
            ),
            Ir::Conditional { arms, else_arm } => {
                if arms.is_empty() {
                    if let Some(else_arm) = else_arm {
                        self.emit_nodes(else_arm, indent, e);
                    }
                    return;
                }
                for (i, (cond, body)) in arms.iter().enumerate() {
                    let keyword = if i == 0 { "if" } else { "elif" };
                    e.line(indent, &format!("{} {}:", keyword, render_cond(cond)));
                    self.emit_body(body, indent + 1, e);
                }
                if let Some(else_arm) = else_arm {
                    e.line(indent, "else:");
                    self.emit_body(else_arm, indent + 1, e);
                }
            }
            Ir::Loop {
                kind,
                count,
                cond,
                body,
            } => match kind {
                LoopKind::Count => {
                    let count = count.as_ref().map(render_value).unwrap_or_default();
                    e.line(indent, &format!("for _ in range(int(_num({}))):", count));
                    self.emit_body(body, indent + 1, e);
                }
                LoopKind::While => {
                    let cond = cond.as_ref().map(render_cond).unwrap_or_default();
                    e.line(indent, &format!("while {}:", cond));
                    self.emit_body(body, indent + 1, e);
                }
                LoopKind::PostTest => {
                    let cond = cond.as_ref().map(render_cond).unwrap_or_default();
                    e.line(indent, "while True:");
                    self.emit_body(body, indent + 1, e);
                    e.line(indent + 1, &format!("if not ({}):", cond));
                    e.line(indent + 2, "break");
                }
            },
            Ir::Call { paragraph, transfer } => {
                if *transfer {
                    e.line(indent, &format!("return {}", py_str(paragraph)));
                } else {
                    e.line(indent, &format!("{}()", paragraph));
                }
            }
            Ir::FileOp { op, file, handlers } => self.emit_file_op(op, file, handlers, indent, e),
            Ir::ExternalCall {
                program,
                using,
                returning: _,
            } => {
                let mut args = vec![render_value(program)];
                args.extend(using.iter().map(render_path));
                e.line(indent, &format!("_call_external({})", args.join(", ")));
            }
        }
    }

    fn emit_arithmetic(
        &self,
        expression: &Value,
        targets: &[ArithTarget],
        on_size_error: Option<&[Ir]>,
        not_on_size_error: Option<&[Ir]>,
        indent: usize,
        e: &mut Emitter,
    ) {
        let expr = render_value(expression);
        let guarded = on_size_error.is_some() || not_on_size_error.is_some();
        if guarded {
            e.line(indent, "try:");
            e.line(indent + 1, &format!("_v = {}", expr));
            for target in targets {
                let path = render_path(&target.path);
                e.line(indent + 1, &checked_assign_line(&path, "_v", &target.mode));
            }
            e.line(indent, "except _SizeError:");
            self.emit_body(on_size_error.unwrap_or(&[]), indent + 1, e);
            if let Some(not_branch) = not_on_size_error {
                e.line(indent, "else:");
                self.emit_body(not_branch, indent + 1, e);
            }
        } else if targets.len() > 1 {
            e.line(indent, &format!("_v = {}", expr));
            for target in targets {
                let path = render_path(&target.path);
                e.line(indent, &assign_line(&path, "_v", &target.mode));
            }
        } else if let Some(target) = targets.first() {
            let path = render_path(&target.path);
            e.line(indent, &assign_line(&path, &expr, &target.mode));
        }
    }

    fn emit_file_op(
        &self,
        op: &FileOpKind,
        file: &str,
        handlers: &FileHandlers,
        indent: usize,
        e: &mut Emitter,
    ) {
        match op {
            FileOpKind::Display { operands, newline } => {
                let text = operands
                    .iter()
                    .map(render_display_operand)
                    .collect::<Vec<_>>()
                    .join(" + ");
                let text = if text.is_empty() { "\"\"".to_string() } else { text };
                if *newline {
                    e.line(indent, &format!("print({})", text));
                } else {
                    e.line(indent, &format!("print({}, end=\"\")", text));
                }
            }
            FileOpKind::Accept { target, mode } => {
                let target = render_path(target);
                e.line(indent, &assign_line(&target, "input()", mode));
            }
            FileOpKind::Open { mode } => {
                let mode = match mode {
                    OpenMode::Input => "r",
                    OpenMode::Output => "w",
                    OpenMode::Extend => "a",
                    OpenMode::InputOutput => "r+",
                };
                e.line(indent, &format!("{}.open(\"{}\")", file, mode));
            }
            FileOpKind::Close => e.line(indent, &format!("{}.close()", file)),
            FileOpKind::Read { into } => {
                e.line(indent, &format!("_line = {}.read_line()", file));
                e.line(indent, "if _line is None:");
                let end_branch = handlers
                    .at_end
                    .as_deref()
                    .or(handlers.invalid_key.as_deref());
                self.emit_body(end_branch.unwrap_or(&[]), indent + 1, e);
                e.line(indent, "else:");
                let mut else_lines = 0;
                if let Some(assign) = self.record_read_assign(file) {
                    e.line(indent + 1, &assign);
                    else_lines += 1;
                }
                if let Some((path, mode)) = into {
                    e.line(indent + 1, &assign_line(&render_path(path), "_line", mode));
                    else_lines += 1;
                }
                let not_branch = handlers
                    .not_at_end
                    .as_deref()
                    .or(handlers.not_invalid_key.as_deref());
                if let Some(body) = not_branch {
                    self.emit_nodes(body, indent + 1, e);
                    else_lines += body.len();
                }
                if else_lines == 0 {
                    e.line(indent + 1, "pass");
                }
            }
            FileOpKind::Write { from } => {
                let payload = match from {
                    Some(value) => format!("_render({})", render_value(value)),
                    None => match self.files_by_name.get(file).and_then(|f| f.record.as_ref()) {
                        Some(record) => format!("_render({})", record),
                        None => "\"\"".to_string(),
                    },
                };
                e.line(indent, &format!("{}.write_line({})", file, payload));
            }
        }
    }

    /// Assignment refreshing a file's record variable after a READ, when
    /// the record is an elementary item the module holds directly.
    fn record_read_assign(&self, file: &str) -> Option<String> {
        let record = self.files_by_name.get(file)?.record.as_ref()?;
        let scalar = self.program.scalars.iter().find(|s| &s.name == record)?;
        match &scalar.ty {
            FieldType::Str { len } => Some(format!("{} = _move_str(_line, {})", record, len)),
            FieldType::Int { digits } => {
                Some(format!("{} = _conform(_line, {}, 0)", record, digits))
            }
            FieldType::Decimal { digits, scale } => Some(format!(
                "{} = _conform(_line, {}, {})",
                record, digits, scale
            )),
            FieldType::Group(_) => None,
        }
    }
}

// ----------------------------------------------------------------------
// Expression rendering
// ----------------------------------------------------------------------

fn assign_line(target: &str, value: &str, mode: &AssignMode) -> String {
    match mode {
        AssignMode::Numeric {
            digits,
            scale,
            rounded,
        } => {
            let rounded = if *rounded { ", rounded=True" } else { "" };
            format!(
                "{} = _conform({}, {}, {}{})",
                target, value, digits, scale, rounded
            )
        }
        AssignMode::Alphanumeric { len } => {
            format!("{} = _move_str({}, {})", target, value, len)
        }
        AssignMode::Raw => format!("{} = {}", target, value),
    }
}

fn checked_assign_line(target: &str, value: &str, mode: &AssignMode) -> String {
    match mode {
        AssignMode::Numeric {
            digits,
            scale,
            rounded,
        } => {
            let rounded = if *rounded { ", rounded=True" } else { "" };
            format!(
                "{} = _conform({}, {}, {}{}, check=True)",
                target, value, digits, scale, rounded
            )
        }
        other => assign_line(target, value, other),
    }
}

fn render_path(path: &Path) -> String {
    let joined = path.segments.join(".");
    match &path.index {
        Some(index) => format!("{}[_sub({})]", joined, render_value(index)),
        None => joined,
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Literal(c) => render_constant(c),
        Value::Record(path) => render_path(path),
        Value::Binary { op, left, right } => {
            let l = render_operand(left);
            let r = render_operand(right);
            match op {
                ArithOp::Add => format!("({} + {})", l, r),
                ArithOp::Subtract => format!("({} - {})", l, r),
                ArithOp::Multiply => format!("({} * {})", l, r),
                ArithOp::Divide => format!("_div({}, {})", l, r),
                ArithOp::Power => format!("({} ** {})", l, r),
            }
        }
        Value::Unary { op, operand } => match op {
            UnaryArithOp::Negate => format!("(-{})", render_operand(operand)),
        },
    }
}

/// Operands of arithmetic go through `_num` when their runtime type is
/// not already numeric, so PIC X data used numerically coerces instead
/// of concatenating.
fn render_operand(value: &Value) -> String {
    match value {
        Value::Record(path) => format!("_num({})", render_path(path)),
        other => render_value(other),
    }
}

fn render_constant(constant: &Constant) -> String {
    match constant {
        Constant::Int(n) => n.to_string(),
        Constant::Decimal(text) => format!("Decimal(\"{}\")", text),
        Constant::Str(text) => py_str(text),
    }
}

fn render_display_operand(value: &Value) -> String {
    match value {
        Value::Literal(Constant::Str(text)) => py_str(text),
        other => format!("_render({})", render_value(other)),
    }
}

fn render_cond(cond: &Cond) -> String {
    match cond {
        Cond::Compare { op, left, right } => {
            let op = match op {
                CmpOp::Equal => "==",
                CmpOp::NotEqual => "!=",
                CmpOp::Greater => ">",
                CmpOp::GreaterOrEqual => ">=",
                CmpOp::Less => "<",
                CmpOp::LessOrEqual => "<=",
            };
            format!("{} {} {}", render_value(left), op, render_value(right))
        }
        Cond::And(l, r) => format!("({} and {})", render_cond(l), render_cond(r)),
        Cond::Or(l, r) => format!("({} or {})", render_cond(l), render_cond(r)),
        Cond::Not(inner) => format!("not ({})", render_cond(inner)),
        Cond::ClassTest { value, class } => {
            let v = render_value(value);
            match class {
                ClassKind::Numeric => format!("_is_numeric({})", v),
                ClassKind::Alphabetic => format!("_is_alphabetic({})", v),
                ClassKind::Positive => format!("_num({}) > 0", v),
                ClassKind::Negative => format!("_num({}) < 0", v),
                ClassKind::Zero => format!("_num({}) == 0", v),
            }
        }
    }
}

/// Python string literal with escapes.
fn py_str(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || (c as u32) > 0x7e => {
                if (c as u32) <= 0xff {
                    out.push_str(&format!("\\x{:02x}", c as u32));
                } else {
                    out.push_str(&format!("\\u{:04x}", c as u32));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn field_default(field: &IrField, type_default: &str) -> String {
    match (&field.initial, &field.ty) {
        (Some(Constant::Str(text)), FieldType::Str { len }) => {
            let mut padded = text.clone();
            let len = *len as usize;
            if padded.len() < len {
                padded.push_str(&" ".repeat(len - padded.len()));
            } else {
                padded.truncate(len);
            }
            py_str(&padded)
        }
        (Some(constant), _) => render_constant(constant),
        (None, _) => type_default.to_string(),
    }
}

/// Globally unique class name from the record's attribute chain.
fn class_name(prefix: &str, name: &str) -> String {
    let mut out = String::from(prefix);
    for part in name.split('_').filter(|p| !p.is_empty()) {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

fn ends_in_transfer(nodes: &[Ir]) -> bool {
    match nodes.last() {
        Some(Ir::Call { transfer, .. }) => *transfer,
        Some(Ir::Sequence(inner)) => ends_in_transfer(inner),
        _ => false,
    }
}

fn collect_file_refs(nodes: &[Ir], visit: &mut impl FnMut(&str)) {
    for node in nodes {
        match node {
            Ir::FileOp { file, handlers, .. } => {
                visit(file);
                for body in [
                    &handlers.at_end,
                    &handlers.not_at_end,
                    &handlers.invalid_key,
                    &handlers.not_invalid_key,
                ]
                .into_iter()
                .flatten()
                {
                    collect_file_refs(body, visit);
                }
            }
            Ir::Sequence(inner) => collect_file_refs(inner, visit),
            Ir::Conditional { arms, else_arm } => {
                for (_, body) in arms {
                    collect_file_refs(body, visit);
                }
                if let Some(body) = else_arm {
                    collect_file_refs(body, visit);
                }
            }
            Ir::Loop { body, .. } => collect_file_refs(body, visit),
            Ir::Arithmetic {
                on_size_error,
                not_on_size_error,
                ..
            } => {
                for body in [on_size_error, not_on_size_error].into_iter().flatten() {
                    collect_file_refs(body, visit);
                }
            }
            _ => {}
        }
    }
}

/// A line-oriented output buffer with four-space indentation.
#[derive(Default)]
struct Emitter {
    out: String,
}

impl Emitter {
    fn line(&mut self, indent: usize, text: &str) {
        for _ in 0..indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn raw(&mut self, text: &str) {
        self.out.push_str(text);
    }
}
