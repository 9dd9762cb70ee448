//! Deterministic identifier finalization.
//!
//! Sanitization (lowercasing, hyphen folding) happens during symbol
//! analysis; this layer resolves the remaining target-language concerns:
//! reserved words get a trailing underscore and collisions within one
//! scope get a numeric counter. Running the same names through in the
//! same order always yields the same output.

use std::collections::HashSet;

/// Python keywords plus builtins the generated code relies on.
const RESERVED: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue",
    "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import",
    "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while",
    "with", "yield", "match", "case", "print", "input", "int", "str", "len", "open", "min", "max",
    "sum", "abs", "round", "main",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

/// One naming scope. Names registered first win the bare spelling;
/// later collisions pick up `_2`, `_3`, and so on.
#[derive(Debug, Default)]
pub struct NameScope {
    used: HashSet<String>,
}

impl NameScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finalize a sanitized identifier within this scope.
    pub fn finalize(&mut self, sanitized: &str) -> String {
        let mut candidate = if is_reserved(sanitized) {
            format!("{}_", sanitized)
        } else {
            sanitized.to_string()
        };
        if self.used.contains(&candidate) {
            let mut counter = 2;
            loop {
                let numbered = format!("{}_{}", candidate, counter);
                if !self.used.contains(&numbered) {
                    candidate = numbered;
                    break;
                }
                counter += 1;
            }
        }
        self.used.insert(candidate.clone());
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_words_get_a_suffix() {
        let mut scope = NameScope::new();
        assert_eq!(scope.finalize("class"), "class_");
        assert_eq!(scope.finalize("ws_total"), "ws_total");
    }

    #[test]
    fn collisions_count_up() {
        let mut scope = NameScope::new();
        assert_eq!(scope.finalize("filler"), "filler");
        assert_eq!(scope.finalize("filler"), "filler_2");
        assert_eq!(scope.finalize("filler"), "filler_3");
    }

    #[test]
    fn same_inputs_same_outputs() {
        let run = || {
            let mut scope = NameScope::new();
            ["return", "ws_a", "ws_a", "return"]
                .iter()
                .map(|n| scope.finalize(n))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
