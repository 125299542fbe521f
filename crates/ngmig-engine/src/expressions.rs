//! `${...}` expression handling for generated documents.
//!
//! CG documents carry runtime expressions such as `${secrets.getValue("x")}`
//! or `${workflow.variables.tag}` that have no direct NG equivalent. User
//! supplied replacements are applied first; whatever dotted expressions
//! remain are reported so they can be fixed by hand.

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_yaml::Value;

use ngmig_core::{SkippedExpressionDetail, YamlArtifact};

const EXPRESSION_PATTERN: &str = r"\$\{([^}]+)\}";

static EXPRESSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(EXPRESSION_PATTERN).expect("expression pattern is a valid regex"));

/// Replaces `${key}` with `custom[key]` in every string of `value`.
pub fn substitute(value: &mut Value, custom: &HashMap<String, String>) {
    if custom.is_empty() {
        return;
    }
    visit_strings_mut(value, &mut |s| {
        if !s.contains("${") {
            return;
        }
        let replaced = EXPRESSION
            .replace_all(s, |caps: &Captures<'_>| match custom.get(caps[1].trim()) {
                Some(v) => v.clone(),
                None => caps[0].to_string(),
            })
            .into_owned();
        *s = replaced;
    });
}

/// Every dotted expression left in `value`.
pub fn dotted_expressions(value: &Value) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    visit_strings(value, &mut |s| {
        for caps in EXPRESSION.captures_iter(s) {
            let expr = caps[1].trim();
            if expr.contains('.') {
                found.insert(expr.to_string());
            }
        }
    });
    found
}

/// Applies `custom` to every generated artifact and reports the leftovers.
pub fn scan_artifacts(
    artifacts: &mut [YamlArtifact],
    custom: &HashMap<String, String>,
) -> Vec<SkippedExpressionDetail> {
    let mut details = Vec::new();
    for artifact in artifacts.iter_mut().filter(|a| !a.exists) {
        substitute(&mut artifact.yaml, custom);
        let expressions = dotted_expressions(&artifact.yaml);
        if expressions.is_empty() {
            continue;
        }
        details.push(SkippedExpressionDetail {
            identifier: artifact.ng_detail.identifier.clone(),
            org_identifier: artifact.ng_detail.org_identifier.clone(),
            project_identifier: artifact.ng_detail.project_identifier.clone(),
            entity_type: artifact.kind(),
            expressions,
        });
    }
    details
}

fn visit_strings(value: &Value, f: &mut impl FnMut(&str)) {
    match value {
        Value::String(s) => f(s),
        Value::Sequence(items) => items.iter().for_each(|v| visit_strings(v, f)),
        Value::Mapping(map) => map.values().for_each(|v| visit_strings(v, f)),
        Value::Tagged(tagged) => visit_strings(&tagged.value, f),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn visit_strings_mut(value: &mut Value, f: &mut impl FnMut(&mut String)) {
    match value {
        Value::String(s) => f(s),
        Value::Sequence(items) => items.iter_mut().for_each(|v| visit_strings_mut(v, f)),
        Value::Mapping(map) => map.values_mut().for_each(|v| visit_strings_mut(v, f)),
        Value::Tagged(tagged) => visit_strings_mut(&mut tagged.value, f),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
