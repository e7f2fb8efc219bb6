//! # Registry Tests
//!
//! Discovery over several extensions, package grouping and reference
//! validation of whole workflows.

use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use stepflow::error::DiscoveryError;
use stepflow::registry::{ExtensionSource, Registrar};
use stepflow::{
    Action, ActionContext, ActionError, ActionExtension, ActionInput, ActionInputs, ActionOutputs,
    ActionRegistry, ActionValidationError, TaskStatus, Workflow,
};

// ============================================================================
// TEST HELPERS
// ============================================================================

struct NamedAction {
    name: &'static str,
    version: &'static str,
    inputs: Vec<ActionInput>,
}

impl NamedAction {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            version: "1.0.0",
            inputs: Vec::new(),
        }
    }

    fn with_inputs(mut self, inputs: Vec<ActionInput>) -> Self {
        self.inputs = inputs;
        self
    }
}

#[async_trait]
impl Action for NamedAction {
    fn name(&self) -> &str {
        self.name
    }

    fn version(&self) -> &str {
        self.version
    }

    fn inputs(&self) -> &[ActionInput] {
        &self.inputs
    }

    async fn run(&self, inputs: &ActionInputs, _ctx: &ActionContext) -> Result<ActionOutputs, ActionError> {
        Ok(inputs.clone())
    }
}

/// Extension registering a fixed list of actions, optionally failing afterwards
struct Module {
    path: &'static str,
    actions: Vec<fn() -> Result<Arc<dyn Action>, ActionValidationError>>,
    fails: bool,
}

impl Module {
    fn new(path: &'static str) -> Self {
        Self {
            path,
            actions: Vec::new(),
            fails: false,
        }
    }

    fn with(mut self, constructor: fn() -> Result<Arc<dyn Action>, ActionValidationError>) -> Self {
        self.actions.push(constructor);
        self
    }

    fn failing(mut self) -> Self {
        self.fails = true;
        self
    }

    fn boxed(self) -> Arc<dyn ActionExtension> {
        Arc::new(self)
    }
}

impl ActionExtension for Module {
    fn module_path(&self) -> &str {
        self.path
    }

    fn register(&self, registrar: &mut Registrar<'_>) -> Result<(), ActionValidationError> {
        for constructor in &self.actions {
            registrar.register(*constructor);
        }
        if self.fails {
            return Err(ActionValidationError("import failed".into()));
        }
        Ok(())
    }
}

fn learn() -> Result<Arc<dyn Action>, ActionValidationError> {
    Ok(Arc::new(NamedAction::new("learn-graph").with_inputs(vec![
        ActionInput::new("algorithm", "Structure learning algorithm").required(),
        ActionInput::new("alpha", "Significance level").with_default(json!(0.05)),
    ])))
}

fn evaluate() -> Result<Arc<dyn Action>, ActionValidationError> {
    Ok(Arc::new(NamedAction::new("evaluate")))
}

fn broken() -> Result<Arc<dyn Action>, ActionValidationError> {
    Err(ActionValidationError("missing model file".into()))
}

fn unnamed() -> Result<Arc<dyn Action>, ActionValidationError> {
    Ok(Arc::new(NamedAction::new("")))
}

fn unversioned() -> Result<Arc<dyn Action>, ActionValidationError> {
    Ok(Arc::new(NamedAction {
        name: "no-version",
        version: " ",
        inputs: Vec::new(),
    }))
}

struct FailingSource;

impl ExtensionSource for FailingSource {
    fn extensions(&self) -> Result<Vec<Arc<dyn ActionExtension>>, DiscoveryError> {
        Err(DiscoveryError("plugin directory unreadable".into()))
    }
}

// ============================================================================
// DISCOVERY
// ============================================================================

#[test]
fn discovers_actions_across_extensions() {
    let registry = ActionRegistry::discover(&vec![
        Module::new("causal::learners").with(learn).boxed(),
        Module::new("causal.metrics").with(evaluate).boxed(),
    ]);

    assert_eq!(registry.available_actions(), vec!["evaluate", "learn-graph"]);
    assert!(registry.get_discovery_errors().is_empty());

    let info = registry.action_info("learn-graph").unwrap();
    assert_eq!(info.module_path, "causal::learners");
    assert_eq!(info.inputs.len(), 2);
    assert!(registry.action_info("nope").is_none());
}

#[test]
fn enumeration_failure_indexes_nothing() {
    let registry = ActionRegistry::discover(&FailingSource);

    assert!(registry.is_empty());
    assert_eq!(registry.get_discovery_errors().len(), 1);
    assert!(registry.get_discovery_errors()[0].contains("plugin directory unreadable"));
}

#[test]
fn private_and_core_modules_are_skipped() {
    let registry = ActionRegistry::discover(&vec![
        Module::new("_private_test").with(learn).boxed(),
        Module::new("plugins::_internal").with(evaluate).boxed(),
        Module::new("std::fs").with(evaluate).boxed(),
    ]);

    assert!(registry.is_empty());
    assert!(registry.get_discovery_errors().is_empty());
}

#[test]
fn failures_are_recorded_with_module_and_scanning_continues() {
    let registry = ActionRegistry::discover(&vec![
        Module::new("broken::module").with(broken).with(unnamed).with(unversioned).boxed(),
        Module::new("half::done").with(evaluate).failing().boxed(),
        Module::new("causal::learners").with(learn).boxed(),
    ]);

    assert_eq!(registry.available_actions(), vec!["evaluate", "learn-graph"]);

    let errors = registry.get_discovery_errors();
    assert_eq!(errors.len(), 4);
    assert!(errors[0].starts_with("broken::module: ") && errors[0].contains("missing model file"));
    assert!(errors[1].starts_with("broken::module: ") && errors[1].contains("invalid action name"));
    assert!(errors[2].starts_with("broken::module: ") && errors[2].contains("no version"));
    assert_eq!(errors[3], "half::done: import failed");
}

#[test]
fn duplicate_name_last_registration_wins() {
    let registry = ActionRegistry::discover(&vec![
        Module::new("first::pkg").with(evaluate).boxed(),
        Module::new("second::pkg").with(evaluate).boxed(),
    ]);

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.action_info("evaluate").unwrap().module_path, "second::pkg");

    let warnings = registry.get_discovery_warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("first::pkg") && warnings[0].contains("second::pkg"));
}

#[test]
fn actions_grouped_by_package() {
    let registry = ActionRegistry::discover(&vec![
        Module::new("causal::learners").with(learn).boxed(),
        Module::new(".loose").with(evaluate).boxed(),
    ]);

    let packages = registry.list_actions_by_package();
    let keys: Vec<&str> = packages.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["", "causal"]);
    assert!(packages["causal"].contains("learn-graph"));
    assert!(packages[""].contains("evaluate"));
}

#[test]
fn builtins_are_grouped_under_builtin() {
    let registry = ActionRegistry::with_builtins();
    let packages = registry.list_actions_by_package();
    let builtin: Vec<&str> = packages["builtin"].iter().map(String::as_str).collect();
    assert_eq!(builtin, vec!["echo", "write-file"]);
}

// ============================================================================
// REFERENCE VALIDATION
// ============================================================================

fn registry() -> ActionRegistry {
    ActionRegistry::discover(&vec![
        Module::new("causal::learners").with(learn).with(evaluate).boxed(),
    ])
}

fn workflow(steps: serde_json::Value) -> Workflow {
    Workflow::from_document(json!({"id": "t", "description": "d", "steps": steps})).unwrap()
}

#[test]
fn valid_references_produce_no_errors() {
    let wf = workflow(json!([
        {"uses": "learn-graph", "with": {"algorithm": "pc"}},
        {"uses": "evaluate", "with": {"anything": 1}},
        {"run": "echo done"}
    ]));
    assert!(registry().validate_workflow_actions(&wf).is_empty());
}

#[test]
fn every_violation_is_reported_in_step_order() {
    let wf = workflow(json!([
        {"uses": "learn-graph", "with": {"colour": "red"}},
        {"run": "true"},
        {"uses": "unknown-action"}
    ]));

    let errors = registry().validate_workflow_actions(&wf);
    let summary: Vec<(usize, TaskStatus, &str)> = errors
        .iter()
        .map(|e| (e.step_index, e.status, e.message.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (0, TaskStatus::InvalidParameter, "unknown parameter 'colour'"),
            (0, TaskStatus::InvalidParameter, "missing required parameter 'algorithm'"),
            (2, TaskStatus::InvalidUses, "unknown action 'unknown-action'"),
        ]
    );
    assert_eq!(
        errors[2].to_string(),
        "step 3 (unknown-action): unknown action 'unknown-action' [INVALID_USES]"
    );
}
