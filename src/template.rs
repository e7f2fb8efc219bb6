//! Template variables - `{{name}}` extraction, validation and substitution
//!
//! This module provides:
//! - Extraction of placeholder names from strings and whole documents
//! - Closed-world validation against `{id, description} ∪ matrix axes`
//! - Per-job substitution, tokenizing each template once per resolver
//!
//! Only `render` populates the token cache, so a resolver's cache is bounded by
//! the templates of the workflows it executes. Extraction scans without caching.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::TemplateError;
use crate::matrix::Job;
use crate::workflow::Workflow;

/// Pre-compiled regex for `{{name}}`: a letter or underscore, then letters, digits, `_` or `-`
static VARIABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([a-zA-Z_][a-zA-Z0-9_-]*)\}\}").unwrap());

/// Variables every workflow provides
pub const WORKFLOW_VARIABLES: [&str; 2] = ["id", "description"];

/// Token representing a parsed template fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal text (stores range in original string)
    Literal(Range<usize>),
    /// `{{name}}`, with the range of the whole placeholder
    Variable { name: String, span: Range<usize> },
}

/// Values bound to template variables for one job
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateContext {
    values: IndexMap<String, Value>,
}

impl TemplateContext {
    /// Context holding the workflow-level variables only
    pub fn for_workflow(workflow: &Workflow) -> Self {
        let mut values = IndexMap::new();
        values.insert("id".to_string(), Value::String(workflow.id.clone()));
        values.insert(
            "description".to_string(),
            Value::String(workflow.description.clone()),
        );
        Self { values }
    }

    /// Copy of this context with the job's matrix values bound
    pub fn with_job(&self, job: &Job) -> Self {
        let mut values = self.values.clone();
        for (name, value) in job {
            values.insert(name.clone(), value.clone());
        }
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

/// Template resolver with caching
pub struct TemplateResolver {
    /// Cache of parsed templates
    cache: DashMap<String, Arc<Vec<Token>>>,
}

impl Default for TemplateResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateResolver {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// Parse template into tokens (with caching)
    pub fn tokenize(&self, template: &str) -> Arc<Vec<Token>> {
        if let Some(cached) = self.cache.get(template) {
            return Arc::clone(&cached);
        }

        let mut tokens = Vec::new();
        let mut last_end = 0;
        for cap in VARIABLE_RE.captures_iter(template) {
            let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            if whole.start() > last_end {
                tokens.push(Token::Literal(last_end..whole.start()));
            }
            tokens.push(Token::Variable {
                name: name.as_str().to_string(),
                span: whole.range(),
            });
            last_end = whole.end();
        }
        if last_end < template.len() {
            tokens.push(Token::Literal(last_end..template.len()));
        }

        let tokens = Arc::new(tokens);
        self.cache.insert(template.to_string(), Arc::clone(&tokens));
        tokens
    }

    /// Variable names used in `text`
    pub fn extract(&self, text: &str) -> BTreeSet<String> {
        VARIABLE_RE
            .captures_iter(text)
            .filter_map(|cap| cap.get(1))
            .map(|name| name.as_str().to_string())
            .collect()
    }

    /// Variable names used in a document value; non-strings have none
    pub fn extract_value(&self, value: &Value) -> BTreeSet<String> {
        match value {
            Value::String(text) => self.extract(text),
            _ => BTreeSet::new(),
        }
    }

    /// Union of the variables used in every string leaf of `document`
    pub fn collect(&self, document: &Value) -> BTreeSet<String> {
        let mut used = BTreeSet::new();
        self.collect_into(document, &mut used);
        used
    }

    fn collect_into(&self, value: &Value, used: &mut BTreeSet<String>) {
        match value {
            Value::Object(map) => {
                for item in map.values() {
                    self.collect_into(item, used);
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.collect_into(item, used);
                }
            }
            Value::String(text) => used.extend(self.extract(text)),
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
    }

    /// Variables used anywhere in the workflow
    pub fn collect_workflow(&self, workflow: &Workflow) -> BTreeSet<String> {
        let mut used = self.extract(&workflow.id);
        used.extend(self.extract(&workflow.description));
        if let Some(matrix) = &workflow.matrix {
            for values in matrix.values() {
                for value in values {
                    self.collect_into(value, &mut used);
                }
            }
        }
        for step in &workflow.steps {
            if let Some(name) = &step.name {
                used.extend(self.extract(name));
            }
            used.extend(self.extract(step.action.target()));
            for value in step.with.values() {
                self.collect_into(value, &mut used);
            }
        }
        used
    }

    /// Variables a workflow's templates may reference
    pub fn available_variables(workflow: &Workflow) -> BTreeSet<String> {
        let mut available: BTreeSet<String> =
            WORKFLOW_VARIABLES.iter().map(|v| v.to_string()).collect();
        if let Some(matrix) = &workflow.matrix {
            available.extend(matrix.keys().cloned());
        }
        available
    }

    /// Fail when a template references a variable outside the workflow's scope
    pub fn validate(&self, workflow: &Workflow) -> Result<(), TemplateError> {
        let available = Self::available_variables(workflow);
        let used = self.collect_workflow(workflow);

        let unknown: Vec<String> = used.difference(&available).cloned().collect();
        if unknown.is_empty() {
            return Ok(());
        }
        Err(TemplateError {
            unknown,
            available: available.into_iter().collect(),
        })
    }

    /// Substitute bound variables; unbound placeholders stay as written.
    ///
    /// Returns `Cow::Borrowed` when the template has no placeholders.
    pub fn render<'a>(&self, template: &'a str, context: &TemplateContext) -> Cow<'a, str> {
        if !template.contains("{{") {
            return Cow::Borrowed(template);
        }

        let tokens = self.tokenize(template);
        let mut result = String::with_capacity(template.len() + 32);
        for token in tokens.iter() {
            match token {
                Token::Literal(range) => result.push_str(&template[range.clone()]),
                Token::Variable { name, span } => match context.get(name) {
                    Some(value) => result.push_str(&value_to_text(value)),
                    None => result.push_str(&template[span.clone()]),
                },
            }
        }
        Cow::Owned(result)
    }

    /// Apply [`render`](Self::render) to every string leaf of `value`
    pub fn render_value(&self, value: &Value, context: &TemplateContext) -> Value {
        match value {
            Value::String(text) => Value::String(self.render(text, context).into_owned()),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.render_value(item, context))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, item)| (key.clone(), self.render_value(item, context)))
                    .collect(),
            ),
            Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
        }
    }
}

/// Strings verbatim, everything else as compact JSON
fn value_to_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn names(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn workflow(yaml: &str) -> Workflow {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn extract_finds_all_variables() {
        let resolver = TemplateResolver::new();
        assert_eq!(
            resolver.extract("/results/{{id}}/{{dataset}}_{{algorithm}}.xml"),
            names(&["id", "dataset", "algorithm"])
        );
        assert_eq!(resolver.extract("chart_{{dataset}}.png"), names(&["dataset"]));
        assert_eq!(resolver.extract("{{a}}{{b}}"), names(&["a", "b"]));
        assert!(resolver.extract("/results/static/output.xml").is_empty());
    }

    #[test]
    fn extract_ignores_malformed_delimiters() {
        let resolver = TemplateResolver::new();
        assert!(resolver.extract("{invalid}").is_empty());
        assert!(resolver
            .extract("/results/{dataset}/{{}/{{incomplete}/output.xml")
            .is_empty());
        assert!(resolver.extract("{{1abc}} {{ spaced }} {{a.b}}").is_empty());
        assert_eq!(
            resolver.extract("/results/{{valid}}/{invalid}/{{also_valid}}.xml"),
            names(&["valid", "also_valid"])
        );
    }

    #[test]
    fn extract_allows_hyphens_after_first_char() {
        let resolver = TemplateResolver::new();
        assert_eq!(resolver.extract("{{_x-1}}"), names(&["_x-1"]));
        assert!(resolver.extract("{{-x}}").is_empty());
    }

    #[test]
    fn extract_value_of_non_string_is_empty() {
        let resolver = TemplateResolver::new();
        assert!(resolver.extract_value(&json!(123)).is_empty());
        assert!(resolver.extract_value(&json!(null)).is_empty());
        assert_eq!(resolver.extract_value(&json!("{{x}}")), names(&["x"]));
    }

    #[test]
    fn collect_walks_values_not_keys() {
        let resolver = TemplateResolver::new();
        let doc = json!({
            "{{key}}": "{{a}}",
            "nested": {"list": ["{{b}}", 1, {"deep": "x{{c}}y"}]},
            "flag": true
        });
        assert_eq!(resolver.collect(&doc), names(&["a", "b", "c"]));
    }

    #[test]
    fn cache_reuses_tokens() {
        let resolver = TemplateResolver::new();
        let first = resolver.tokenize("{{a}} and {{b}}");
        let second = resolver.tokenize("{{a}} and {{b}}");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn extraction_leaves_cache_empty() {
        let resolver = TemplateResolver::new();
        for i in 0..100 {
            resolver.extract(&format!("/results/{}/{{{{dataset}}}}.xml", i));
        }
        resolver.collect(&json!({"a": ["{{x}}", "{{y}}"]}));
        assert!(resolver.cache.is_empty());

        resolver.render("{{x}}", &TemplateContext::default());
        assert_eq!(resolver.cache.len(), 1);
    }

    #[test]
    fn validate_accepts_workflow_and_matrix_variables() {
        let wf = workflow(
            r#"
id: test-workflow
description: Test workflow
matrix:
  dataset: [asia]
  algorithm: [pc]
steps:
  - uses: echo
    with:
      result: "/results/{{id}}/{{dataset}}_{{algorithm}}.xml"
"#,
        );
        assert!(TemplateResolver::new().validate(&wf).is_ok());
    }

    #[test]
    fn validate_reports_sorted_unknown_and_available() {
        let wf = workflow(
            r#"
id: test-workflow
description: Test workflow
matrix:
  dataset: [asia]
steps:
  - uses: echo
    with:
      result: "/results/{{zeta}}/{{unknown_var}}/{{dataset}}.xml"
"#,
        );
        let err = TemplateResolver::new().validate(&wf).unwrap_err();
        assert_eq!(err.unknown, vec!["unknown_var", "zeta"]);
        assert_eq!(err.available, vec!["dataset", "description", "id"]);
    }

    #[test]
    fn validate_without_matrix_only_allows_workflow_variables() {
        let wf = workflow(
            r#"
id: simple
description: Simple test
steps:
  - uses: echo
    with:
      output: "/results/{{id}}_{{description}}.txt"
  - run: "echo {{dataset}}"
"#,
        );
        let err = TemplateResolver::new().validate(&wf).unwrap_err();
        assert_eq!(err.unknown, vec!["dataset"]);
        assert_eq!(err.available, vec!["description", "id"]);
    }

    #[test]
    fn render_substitutes_bound_values() {
        let wf = workflow(
            r#"
id: exp
description: d
steps:
  - run: "true"
"#,
        );
        let mut job = Job::new();
        job.insert("dataset".into(), json!("asia"));
        job.insert("alpha".into(), json!(0.05));
        let ctx = TemplateContext::for_workflow(&wf).with_job(&job);

        let resolver = TemplateResolver::new();
        assert_eq!(
            resolver.render("/r/{{id}}/{{dataset}}_{{alpha}}_{{missing}}.xml", &ctx),
            "/r/exp/asia_0.05_{{missing}}.xml"
        );
        assert!(matches!(resolver.render("plain", &ctx), Cow::Borrowed("plain")));

        let rendered = resolver.render_value(&json!({"p": ["{{dataset}}", 3]}), &ctx);
        assert_eq!(rendered, json!({"p": ["asia", 3]}));
    }

    proptest! {
        #[test]
        fn extract_matches_inserted_identifiers(
            idents in prop::collection::btree_set("[a-zA-Z_][a-zA-Z0-9_-]{0,8}", 0..5),
            filler in "[a-z /.]{0,6}",
        ) {
            let text: String = idents
                .iter()
                .map(|name| format!("{}{{{{{}}}}}", filler, name))
                .collect();
            prop_assert_eq!(TemplateResolver::new().extract(&text), idents);
        }
    }
}
