//! NG identifier generation from CG display names.
//!
//! NG identifiers must match `^[a-zA-Z_][0-9a-zA-Z_]*$`. Names are split on
//! any run of non-alphanumeric characters and re-joined in the requested
//! case format.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseFormat {
    #[default]
    CamelCase,
    SnakeCase,
}

/// Converts a display name into a valid NG identifier. A name without any
/// ASCII alphanumerics gives `"_"`; see [`entity_identifier`] for the
/// collision-free variant.
pub fn identifier_from_name(name: &str, case: CaseFormat) -> String {
    join_words(name, case).unwrap_or_else(|| "_".to_string())
}

/// Identifier for one CG entity: built from its display name, or from its
/// CG id when the name has nothing usable (e.g. `数据库密码`). Two entities
/// with distinct ids never both end up as `"_"`.
pub fn entity_identifier(name: &str, cg_id: &str, case: CaseFormat) -> String {
    join_words(name, case)
        .or_else(|| join_words(cg_id, case))
        .unwrap_or_else(|| {
            let hex: String = cg_id.bytes().map(|b| format!("{b:02x}")).collect();
            format!("_{hex}")
        })
}

fn join_words(text: &str, case: CaseFormat) -> Option<String> {
    let words: Vec<&str> = text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return None;
    }

    let mut out = match case {
        CaseFormat::SnakeCase => words
            .iter()
            .map(|w| w.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join("_"),
        CaseFormat::CamelCase => words
            .iter()
            .enumerate()
            .map(|(i, w)| {
                if i == 0 {
                    w.to_ascii_lowercase()
                } else {
                    upper_first(w)
                }
            })
            .collect(),
    };

    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    Some(out)
}

fn upper_first(w: &str) -> String {
    let mut chars = w.chars();
    match chars.next() {
        Some(c) => c.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
