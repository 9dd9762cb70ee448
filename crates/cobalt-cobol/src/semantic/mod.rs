//! Symbol table construction.
//!
//! Walks the DATA DIVISION of a parsed program into a typed record tree
//! with statically computed offsets and byte sizes. Semantic errors are
//! reported as diagnostics and mark the enclosing record as blocked; they
//! never abort analysis of the rest of the program.

mod types;

pub use types::{resolve_elementary, DataType, NumericStorage};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;

use rust_decimal::Decimal;

use cobalt_lang_core::{Diagnostic, Span};

use crate::ast::{
    AccessMode, ConditionSpec, ConditionValue, DataItem, DataItemName, FileOrganization, Literal,
    LiteralKind, Program,
};

/// Index of an entry in the symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(usize);

/// Where a record tree was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// A record under an FD, keyed by the file name.
    File(String),
    WorkingStorage,
    Linkage,
}

/// One resolved data item.
#[derive(Debug, Clone, PartialEq)]
pub struct DataEntry {
    pub id: EntryId,
    /// Original name, uppercase. "FILLER" for anonymous items.
    pub name: String,
    /// Deterministically sanitized identifier for generated code.
    pub target_name: String,
    pub level: u8,
    pub parent: Option<EntryId>,
    pub children: Vec<EntryId>,
    pub data_type: DataType,
    pub occurs: Option<OccursInfo>,
    /// Entry whose storage this one redefines.
    pub redefines: Option<EntryId>,
    pub value: Option<Literal>,
    /// Satisfying values when this entry is a level-88 condition name.
    pub condition_values: Vec<ConditionSpec>,
    /// Byte offset from the start of the enclosing record.
    pub offset: u32,
    /// Total storage contribution in bytes, including all occurrences.
    pub size: u32,
    pub scope: Scope,
    pub span: Span,
}

impl DataEntry {
    pub fn is_group(&self) -> bool {
        matches!(self.data_type, DataType::Group { .. })
    }

    pub fn is_filler(&self) -> bool {
        self.name == "FILLER"
    }
}

/// A resolved OCCURS clause.
#[derive(Debug, Clone, PartialEq)]
pub struct OccursInfo {
    pub min: u32,
    pub max: u32,
    /// Controlling counter for variable-length tables.
    pub depending_on: Option<EntryId>,
}

impl OccursInfo {
    pub fn is_variable(&self) -> bool {
        self.depending_on.is_some()
    }
}

/// A file joined from its SELECT entry and FD records.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub name: String,
    pub assign_to: Option<String>,
    pub organization: FileOrganization,
    pub access_mode: AccessMode,
    pub record_key: Option<String>,
    pub file_status: Option<String>,
    /// Level-01 records declared under the FD.
    pub records: Vec<EntryId>,
}

/// The symbol table for one program.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: Vec<DataEntry>,
    roots: Vec<EntryId>,
    by_name: HashMap<String, Vec<EntryId>>,
    files: BTreeMap<String, FileInfo>,
    blocked_roots: HashSet<EntryId>,
}

impl SymbolTable {
    pub fn entry(&self, id: EntryId) -> &DataEntry {
        &self.entries[id.0]
    }

    /// Level-01 (and 77) records in declaration order.
    pub fn roots(&self) -> &[EntryId] {
        &self.roots
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataEntry> {
        self.entries.iter()
    }

    /// All entries sharing a name, in declaration order.
    pub fn lookup(&self, name: &str) -> &[EntryId] {
        self.by_name
            .get(&name.to_uppercase())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// The first entry with the given name, case-insensitive.
    pub fn resolve(&self, name: &str) -> Option<&DataEntry> {
        self.lookup(name).first().map(|id| self.entry(*id))
    }

    pub fn files(&self) -> &BTreeMap<String, FileInfo> {
        &self.files
    }

    /// The level-01 record an entry belongs to.
    pub fn root_of(&self, id: EntryId) -> EntryId {
        let mut current = id;
        while let Some(parent) = self.entry(current).parent {
            current = parent;
        }
        current
    }

    /// Whether a record tree carried a semantic error and must be skipped
    /// by translation.
    pub fn is_blocked(&self, root: EntryId) -> bool {
        self.blocked_roots.contains(&root)
    }

    fn add(&mut self, mut entry: DataEntry) -> EntryId {
        let id = EntryId(self.entries.len());
        entry.id = id;
        if entry.name != "FILLER" {
            self.by_name
                .entry(entry.name.clone())
                .or_default()
                .push(id);
        }
        self.entries.push(entry);
        id
    }
}

/// Sanitize a COBOL name into a target-language-neutral identifier:
/// lowercase, hyphens to underscores, invalid characters dropped, and a
/// leading underscore when the result would start with a digit. Reserved
/// words and collisions are the generator's concern.
pub fn sanitize_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '-' => out.push('_'),
            c if c.is_ascii_alphanumeric() || c == '_' => out.push(c.to_ascii_lowercase()),
            _ => {}
        }
    }
    if out.is_empty() {
        out.push('_');
    }
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Build the symbol table for a program.
pub fn analyze(program: &Program) -> (SymbolTable, Vec<Diagnostic>) {
    let mut analyzer = Analyzer::default();
    analyzer.run(program);
    tracing::debug!(
        entries = analyzer.table.entries.len(),
        files = analyzer.table.files.len(),
        errors = analyzer
            .diagnostics
            .iter()
            .filter(|d| d.is_error())
            .count(),
        "symbol table built"
    );
    (analyzer.table, analyzer.diagnostics)
}

#[derive(Default)]
struct Analyzer {
    table: SymbolTable,
    diagnostics: Vec<Diagnostic>,
    /// REDEFINES references awaiting resolution: (entry, target name).
    pending_redefines: Vec<(EntryId, String, Span)>,
    /// OCCURS DEPENDING ON references awaiting resolution.
    pending_depending: Vec<(EntryId, String, Span)>,
}

impl Analyzer {
    fn run(&mut self, program: &Program) {
        let Some(data) = &program.data else {
            self.build_files(program);
            return;
        };

        let mut seen_roots: HashSet<String> = HashSet::new();

        for fd in &data.file_section {
            let scope = Scope::File(fd.name.clone());
            for record in &fd.records {
                self.add_root(record, scope.clone(), &mut seen_roots);
            }
        }
        for item in &data.working_storage {
            self.add_root(item, Scope::WorkingStorage, &mut seen_roots);
        }
        for item in &data.linkage {
            self.add_root(item, Scope::Linkage, &mut seen_roots);
        }

        self.resolve_redefines();
        self.resolve_depending();
        self.layout_roots();
        self.check_values();
        self.build_files(program);
    }

    fn add_root(&mut self, item: &DataItem, scope: Scope, seen: &mut HashSet<String>) {
        let mut duplicate = false;
        if let DataItemName::Named(name) = &item.name {
            if !seen.insert(name.clone()) {
                duplicate = true;
                self.error(
                    "SEM-E001",
                    format!("duplicate level-01 name {}", name),
                    item.span,
                );
            }
        }
        // A duplicate record is still entered so references resolve; it is
        // simply never translated.
        let id = self.add_item(item, None, scope);
        self.table.roots.push(id);
        if duplicate {
            self.table.blocked_roots.insert(id);
        }
    }

    fn add_item(&mut self, item: &DataItem, parent: Option<EntryId>, scope: Scope) -> EntryId {
        let name = item.name.as_str().to_string();
        let data_type = match &item.picture {
            Some(picture) => resolve_elementary(picture, item.usage, item.sign),
            // Groups get their length during layout. A picture-less item
            // with no children is an empty alphanumeric.
            None if item.children.is_empty() => DataType::Alphanumeric { len: 0 },
            None => DataType::Group { len: 0 },
        };

        let occurs = item.occurs.as_ref().map(|o| OccursInfo {
            min: o.times,
            max: o.max_times,
            depending_on: None,
        });

        let id = self.table.add(DataEntry {
            id: EntryId(0),
            target_name: sanitize_identifier(&name),
            name,
            level: item.level,
            parent,
            children: Vec::new(),
            data_type,
            occurs,
            redefines: None,
            value: item.value.clone(),
            condition_values: Vec::new(),
            offset: 0,
            size: 0,
            scope: scope.clone(),
            span: item.span,
        });

        if let Some(target) = &item.redefines {
            self.pending_redefines.push((id, target.clone(), item.span));
        }
        if let Some(occurs) = &item.occurs {
            if let Some(dep) = &occurs.depending_on {
                self.pending_depending.push((id, dep.clone(), occurs.span));
            }
        }

        for condition in &item.condition_values {
            let cond_id = self.add_condition(condition, id, scope.clone());
            self.table.entries[id.0].children.push(cond_id);
        }
        for child in &item.children {
            let child_id = self.add_item(child, Some(id), scope.clone());
            self.table.entries[id.0].children.push(child_id);
        }
        id
    }

    fn add_condition(&mut self, condition: &ConditionValue, parent: EntryId, scope: Scope) -> EntryId {
        let scope_entry = DataEntry {
            id: EntryId(0),
            target_name: sanitize_identifier(&condition.name),
            name: condition.name.clone(),
            level: 88,
            parent: Some(parent),
            children: Vec::new(),
            data_type: DataType::ConditionName,
            occurs: None,
            redefines: None,
            value: None,
            condition_values: condition.values.clone(),
            offset: 0,
            size: 0,
            scope,
            span: condition.span,
        };
        self.table.add(scope_entry)
    }

    fn resolve_redefines(&mut self) {
        let pending = std::mem::take(&mut self.pending_redefines);
        for (id, target_name, span) in pending {
            let candidates = self.table.lookup(&target_name).to_vec();
            if candidates.is_empty() {
                self.block(id);
                self.error(
                    "SEM-E002",
                    format!("REDEFINES target {} is not declared", target_name),
                    span,
                );
                continue;
            }
            let level = self.table.entry(id).level;
            let parent = self.table.entry(id).parent;
            // A valid target is an earlier sibling at the same level.
            let target = candidates.iter().copied().find(|&t| {
                let e = self.table.entry(t);
                e.level == level && e.parent == parent && t < id
            });
            match target {
                Some(t) => self.table.entries[id.0].redefines = Some(t),
                None => {
                    self.block(id);
                    self.error(
                        "SEM-E003",
                        format!(
                            "REDEFINES target {} is not a preceding item at level {:02}",
                            target_name, level
                        ),
                        span,
                    );
                }
            }
        }
    }

    fn resolve_depending(&mut self) {
        let pending = std::mem::take(&mut self.pending_depending);
        for (id, dep_name, span) in pending {
            let candidates = self.table.lookup(&dep_name).to_vec();
            let Some(&dep) = candidates.first() else {
                self.block(id);
                self.error(
                    "SEM-E004",
                    format!("OCCURS DEPENDING ON references undeclared item {}", dep_name),
                    span,
                );
                continue;
            };
            if !self.table.entry(dep).data_type.is_numeric() {
                self.block(id);
                self.error(
                    "SEM-E005",
                    format!(
                        "OCCURS DEPENDING ON references non-numeric item {}",
                        dep_name
                    ),
                    span,
                );
                continue;
            }
            if let Some(occurs) = &mut self.table.entries[id.0].occurs {
                occurs.depending_on = Some(dep);
            }
        }
    }

    fn layout_roots(&mut self) {
        let roots = self.table.roots.clone();
        for root in roots {
            self.layout(root, 0);
        }
    }

    /// Assign `offset` and compute `size` bottom-up. Returns the entry's
    /// total storage contribution. A redefining child is laid over its
    /// target's offset and never advances the cursor.
    fn layout(&mut self, id: EntryId, offset: u32) -> u32 {
        self.table.entries[id.0].offset = offset;

        let children = self.table.entries[id.0].children.clone();
        let unit = if self.table.entry(id).is_group() || self.has_storage_children(&children) {
            let mut cursor = offset;
            let mut end = offset;
            for child in children {
                if self.table.entry(child).data_type == DataType::ConditionName {
                    self.table.entries[child.0].offset = offset;
                    continue;
                }
                let child_offset = match self.table.entry(child).redefines {
                    Some(target) => self.table.entry(target).offset,
                    None => cursor,
                };
                let child_size = self.layout(child, child_offset);
                if self.table.entry(child).redefines.is_none() {
                    cursor += child_size;
                }
                end = end.max(child_offset + child_size);
            }
            let len = end.max(cursor) - offset;
            self.table.entries[id.0].data_type = DataType::Group { len };
            len
        } else {
            for child in children {
                self.table.entries[child.0].offset = offset;
            }
            self.table.entry(id).data_type.byte_size()
        };

        let occurrences = self
            .table
            .entry(id)
            .occurs
            .as_ref()
            .map(|o| o.max.max(1))
            .unwrap_or(1);
        let total = unit * occurrences;
        self.table.entries[id.0].size = total;
        total
    }

    fn has_storage_children(&self, children: &[EntryId]) -> bool {
        children
            .iter()
            .any(|&c| self.table.entry(c).data_type != DataType::ConditionName)
    }

    /// Validate VALUE clauses against the resolved type.
    fn check_values(&mut self) {
        let mut diags = Vec::new();
        for entry in self.table.iter() {
            let Some(value) = &entry.value else { continue };
            if let DataType::Numeric { digits, scale, .. } = entry.data_type {
                match &value.kind {
                    LiteralKind::Integer(n) => {
                        let width = n.unsigned_abs().to_string().len() as u32;
                        if width > digits {
                            diags.push(Diagnostic::warning(
                                "SEM-W001",
                                format!(
                                    "VALUE {} exceeds the {} digit positions of {}",
                                    n, digits, entry.name
                                ),
                                entry.span,
                            ));
                        }
                    }
                    LiteralKind::Decimal(text) => match Decimal::from_str(text) {
                        Ok(d) => {
                            if d.scale() > scale {
                                diags.push(Diagnostic::warning(
                                    "SEM-W002",
                                    format!(
                                        "VALUE {} has more decimal places than {} holds",
                                        text, entry.name
                                    ),
                                    entry.span,
                                ));
                            }
                        }
                        Err(_) => {
                            diags.push(Diagnostic::error(
                                "SEM-E006",
                                format!("VALUE {} is not a valid number", text),
                                entry.span,
                            ));
                        }
                    },
                    LiteralKind::String(_) => {
                        diags.push(Diagnostic::error(
                            "SEM-E007",
                            format!("non-numeric VALUE on numeric item {}", entry.name),
                            entry.span,
                        ));
                    }
                    LiteralKind::Figurative(_) => {}
                }
            } else if let DataType::Alphanumeric { len } = entry.data_type {
                if let LiteralKind::String(s) = &value.kind {
                    if s.chars().count() as u32 > len {
                        diags.push(Diagnostic::warning(
                            "SEM-W003",
                            format!(
                                "VALUE \"{}\" is longer than the {} characters of {}",
                                s, len, entry.name
                            ),
                            entry.span,
                        ));
                    }
                }
            }
        }
        self.diagnostics.extend(diags);
    }

    fn build_files(&mut self, program: &Program) {
        let mut files: BTreeMap<String, FileInfo> = BTreeMap::new();

        if let Some(environment) = &program.environment {
            for select in &environment.file_control {
                files.insert(
                    select.file_name.clone(),
                    FileInfo {
                        name: select.file_name.clone(),
                        assign_to: Some(select.assign_to.clone()),
                        organization: select.organization,
                        access_mode: select.access_mode,
                        record_key: select.record_key.as_ref().map(|k| k.name.clone()),
                        file_status: select.file_status.as_ref().map(|s| s.name.clone()),
                        records: Vec::new(),
                    },
                );
            }
        }

        if let Some(data) = &program.data {
            for fd in &data.file_section {
                let records: Vec<EntryId> = self
                    .table
                    .roots
                    .iter()
                    .copied()
                    .filter(|&id| self.table.entry(id).scope == Scope::File(fd.name.clone()))
                    .collect();
                files
                    .entry(fd.name.clone())
                    .or_insert_with(|| FileInfo {
                        name: fd.name.clone(),
                        assign_to: None,
                        organization: FileOrganization::default(),
                        access_mode: AccessMode::default(),
                        record_key: None,
                        file_status: None,
                        records: Vec::new(),
                    })
                    .records = records;
            }
        }

        self.table.files = files;
    }

    fn error(&mut self, code: &str, message: String, span: Span) {
        self.diagnostics.push(Diagnostic::error(code, message, span));
    }

    fn block(&mut self, id: EntryId) {
        let root = self.table.root_of(id);
        self.table.blocked_roots.insert(root);
    }
}
