//! Rule-based tag classification over the taxonomy table.
//!
//! Matching happens on a normalized form of the text (lowercased, with
//! diacritics stripped) because the catalog targets Vietnamese and keyword
//! variants must match regardless of accent marks ("NÚI", "núi" and "nui"
//! are the same keyword).

use std::collections::BTreeSet;
use std::sync::Arc;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use super::{LabelSource, MatchMode, Taxonomy};

/// Lowercases and strips diacritics so keyword matching is accent-blind.
///
/// NFD decomposition separates base letters from combining marks, which are
/// then dropped. `đ` does not decompose, so it is folded by hand.
pub fn normalize_for_match(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c == 'đ' { 'd' } else { c })
        .collect()
}

/// A keyword pattern compiled down to its normalized form plus the label it
/// contributes when it matches.
#[derive(Debug, Clone)]
struct CompiledPattern {
    needle: String,
    label: String,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    patterns: Vec<CompiledPattern>,
}

#[derive(Debug, Clone)]
struct CompiledCategory {
    mode: MatchMode,
    rules: Vec<CompiledRule>,
}

/// Pure classifier: free text in, deduplicated label set out.
///
/// Safe to share across threads; it only reads the compiled table.
#[derive(Debug, Clone)]
pub struct TagClassifier {
    taxonomy: Arc<Taxonomy>,
    compiled: Vec<CompiledCategory>,
}

impl TagClassifier {
    /// Compiles a validated taxonomy into its normalized matching form.
    pub fn new(taxonomy: Taxonomy) -> Self {
        let compiled = taxonomy
            .categories()
            .iter()
            .map(|category| CompiledCategory {
                mode: category.mode,
                rules: category
                    .rules
                    .iter()
                    .map(|rule| CompiledRule {
                        patterns: rule
                            .keywords
                            .iter()
                            .filter(|keyword| !keyword.trim().is_empty())
                            .map(|keyword| {
                                let needle = normalize_for_match(keyword);
                                let label = match category.label_from {
                                    LabelSource::RuleKey => {
                                        format!("{}_{}", category.prefix, rule.key)
                                    }
                                    LabelSource::Keyword => {
                                        format!("{}_{}", category.prefix, slug(&needle))
                                    }
                                };
                                CompiledPattern { needle, label }
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            taxonomy: Arc::new(taxonomy),
            compiled,
        }
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Derives taxonomy labels from free text.
    ///
    /// Never errors: unrecognized scripts, empty strings or purely numeric
    /// text produce an empty set, which callers must read as
    /// "unclassified", not as a failure.
    pub fn classify(&self, text: &str) -> BTreeSet<String> {
        let haystack = normalize_for_match(text);
        let mut labels = BTreeSet::new();
        if haystack.trim().is_empty() {
            return labels;
        }

        for category in &self.compiled {
            match category.mode {
                MatchMode::FirstWins => {
                    'category: for rule in &category.rules {
                        for pattern in &rule.patterns {
                            if haystack.contains(&pattern.needle) {
                                labels.insert(pattern.label.clone());
                                break 'category;
                            }
                        }
                    }
                }
                MatchMode::MultiLabel => {
                    for rule in &category.rules {
                        for pattern in &rule.patterns {
                            if haystack.contains(&pattern.needle) {
                                labels.insert(pattern.label.clone());
                            }
                        }
                    }
                }
            }
        }
        labels
    }
}

fn slug(normalized: &str) -> String {
    normalized
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}
