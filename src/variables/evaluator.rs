// src/variables/evaluator.rs

//! Expression evaluation for variable values

use super::VariableStore;

/// Maximum nesting of `#{..}` expansion before giving up
const MAX_DEPTH: usize = 32;

/// Most references resolved in one evaluation; later ones stay verbatim
const MAX_EXPANSIONS: usize = 4096;

/// Output size past which no more references are resolved
const MAX_OUTPUT_LEN: usize = 1024 * 1024;

/// Expands variable references in raw text
///
/// The template language itself belongs to the caller; the store only
/// needs this one entry point.
pub trait ExpressionEvaluator: Send + Sync {
    /// Expand `text` using values from `variables`
    fn evaluate(&self, text: &str, variables: &VariableStore) -> String;
}

/// Default evaluator: `#{Name}` substitution
///
/// - References resolve transitively and case-insensitively
/// - Unknown references are left verbatim
/// - `##{Name}` is an escape producing a literal `#{Name}`
/// - A reference to a variable already being expanded is left verbatim,
///   so cycles stop at their first repeat
/// - Total work is bounded by an expansion count and an output size
#[derive(Debug, Default, Clone, Copy)]
pub struct SubstitutionEvaluator;

impl ExpressionEvaluator for SubstitutionEvaluator {
    fn evaluate(&self, text: &str, variables: &VariableStore) -> String {
        let mut expansion = Expansion {
            variables,
            active: Vec::new(),
            expansions: 0,
        };
        let mut out = String::with_capacity(text.len());
        expansion.expand_into(text, &mut out);
        out
    }
}

/// State of one evaluation
struct Expansion<'a> {
    variables: &'a VariableStore,
    /// Lowercased names currently being expanded, outermost first
    active: Vec<String>,
    expansions: usize,
}

impl Expansion<'_> {
    fn exhausted(&self, out: &str) -> bool {
        self.active.len() >= MAX_DEPTH || self.expansions >= MAX_EXPANSIONS || out.len() >= MAX_OUTPUT_LEN
    }

    fn expand_into(&mut self, text: &str, out: &mut String) {
        let mut rest = text;

        while let Some(start) = rest.find("#{") {
            let prefix = &rest[..start];
            let after = &rest[start + 2..];

            if prefix.ends_with('#') {
                // Escaped: the preceding '#' plus "{" make a literal "#{"
                out.push_str(prefix);
                out.push('{');
                rest = after;
                continue;
            }

            out.push_str(prefix);
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return;
            };

            let reference = &rest[start..start + 2 + end + 1];
            let name = after[..end].trim();
            let key = name.to_lowercase();
            let variables = self.variables;
            match variables.get(name) {
                Some(raw) if !self.active.contains(&key) && !self.exhausted(out) => {
                    self.expansions += 1;
                    self.active.push(key);
                    self.expand_into(raw, out);
                    self.active.pop();
                }
                _ => out.push_str(reference),
            }
            rest = &after[end + 1..];
        }

        out.push_str(rest);
    }
}
