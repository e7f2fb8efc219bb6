//! # Action Registry
//!
//! Index of the actions available to `uses:` steps.
//!
//! ## Discovery
//!
//! Actions are contributed by extensions. An [`ActionExtension`] names the
//! module path it lives under and registers its actions through a
//! [`Registrar`]; an [`ExtensionSource`] enumerates the extensions to scan.
//!
//! Discovery is best-effort and cumulative:
//!
//! | Situation | Outcome |
//! |-----------|---------|
//! | enumeration fails | nothing indexed, one discovery error |
//! | module segment starts with `_` | skipped (private) |
//! | module in `std`/`core`/`alloc` | skipped (not an extension) |
//! | extension `register` fails | discovery error, other extensions still scanned |
//! | constructor or conformance check fails | discovery error, rest of module still scanned |
//! | name already registered | last registration wins, discovery warning |
//!
//! ## Reference validation
//!
//! [`ActionRegistry::validate_workflow_actions`] reports every unresolvable
//! `uses:` and every bad parameter in one pass instead of failing fast.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::action::{parameter_problems, Action, ActionInput};
use crate::error::{ActionValidationError, DiscoveryError};
use crate::status::TaskStatus;
use crate::workflow::Workflow;

/// Action names: letter or underscore first, then letters, digits, `_`, `-` or `.`
static ACTION_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_.-]*$").unwrap());

/// Packages that hold core code rather than extensions
pub const CORE_PACKAGES: [&str; 3] = ["std", "core", "alloc"];

// ============================================================================
// EXTENSIONS
// ============================================================================

/// A unit contributing actions under one module path
pub trait ActionExtension: Send + Sync {
    /// e.g. `causal::learners`; the first segment is the package
    fn module_path(&self) -> &str;

    fn register(&self, registrar: &mut Registrar<'_>) -> Result<(), ActionValidationError>;
}

/// Enumerates the extensions discovery should scan
pub trait ExtensionSource {
    fn extensions(&self) -> Result<Vec<Arc<dyn ActionExtension>>, DiscoveryError>;
}

impl ExtensionSource for Vec<Arc<dyn ActionExtension>> {
    fn extensions(&self) -> Result<Vec<Arc<dyn ActionExtension>>, DiscoveryError> {
        Ok(self.clone())
    }
}

/// Collects one extension's registrations into the registry
pub struct Registrar<'a> {
    module_path: &'a str,
    registry: &'a mut ActionRegistry,
}

impl Registrar<'_> {
    /// Build and index an action. Failures are recorded, never returned.
    pub fn register<F>(&mut self, constructor: F)
    where
        F: FnOnce() -> Result<Arc<dyn Action>, ActionValidationError>,
    {
        match constructor() {
            Ok(action) => self.insert(action),
            Err(e) => self
                .registry
                .record_error(format!("{}: cannot construct action: {}", self.module_path, e)),
        }
    }

    pub fn register_action<A: Action + 'static>(&mut self, action: A) {
        self.register(|| Ok(Arc::new(action)));
    }

    fn insert(&mut self, action: Arc<dyn Action>) {
        if let Err(e) = check_conformance(action.as_ref()) {
            self.registry
                .record_error(format!("{}: {}", self.module_path, e));
            return;
        }

        let name = action.name().to_string();
        let entry = RegisteredAction {
            action,
            module_path: self.module_path.to_string(),
        };
        if let Some(previous) = self.registry.actions.insert(name.clone(), entry) {
            let message = format!(
                "action '{}' from {} replaces the one registered by {}",
                name, self.module_path, previous.module_path
            );
            warn!(action = %name, "{}", message);
            self.registry.discovery_warnings.push(message);
        } else {
            debug!(action = %name, module = %self.module_path, "registered action");
        }
    }
}

/// Metadata checks done once at registration
fn check_conformance(action: &dyn Action) -> Result<(), ActionValidationError> {
    let name = action.name();
    if !ACTION_NAME_RE.is_match(name) {
        return Err(ActionValidationError(format!("invalid action name '{}'", name)));
    }
    if action.version().trim().is_empty() {
        return Err(ActionValidationError(format!(
            "action '{}' declares no version",
            name
        )));
    }
    let mut seen = BTreeSet::new();
    for input in action.inputs() {
        if input.name.is_empty() {
            return Err(ActionValidationError(format!(
                "action '{}' declares an input with an empty name",
                name
            )));
        }
        if !seen.insert(input.name.as_str()) {
            return Err(ActionValidationError(format!(
                "action '{}' declares input '{}' twice",
                name, input.name
            )));
        }
    }
    Ok(())
}

fn is_private_module(module_path: &str) -> bool {
    module_segments(module_path).any(|segment| segment.starts_with('_'))
}

fn is_core_module(module_path: &str) -> bool {
    CORE_PACKAGES.contains(&package_of(module_path))
}

fn module_segments(module_path: &str) -> impl Iterator<Item = &str> {
    module_path
        .split(|c: char| c == ':' || c == '.')
        .filter(|segment| !segment.is_empty())
}

/// First path segment; `""` when the path starts with a separator
pub fn package_of(module_path: &str) -> &str {
    module_path
        .split(|c: char| c == ':' || c == '.')
        .next()
        .unwrap_or_default()
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Clone)]
pub struct RegisteredAction {
    pub action: Arc<dyn Action>,
    pub module_path: String,
}

impl fmt::Debug for RegisteredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredAction")
            .field("name", &self.action.name())
            .field("module_path", &self.module_path)
            .finish()
    }
}

/// Serializable description of a registered action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub module_path: String,
    pub inputs: Vec<ActionInput>,
}

/// A `uses:` step that does not resolve cleanly
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceError {
    pub step_index: usize,
    pub action: String,
    /// `INVALID_USES` or `INVALID_PARAMETER`
    pub status: TaskStatus,
    pub message: String,
}

impl fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {} ({}): {} [{}]",
            self.step_index + 1,
            self.action,
            self.message,
            self.status
        )
    }
}

#[derive(Debug, Default)]
pub struct ActionRegistry {
    actions: IndexMap<String, RegisteredAction>,
    discovery_errors: Vec<String>,
    discovery_warnings: Vec<String>,
}

impl ActionRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan every extension the source yields
    pub fn discover(source: &dyn ExtensionSource) -> Self {
        let mut registry = Self::new();
        registry.discover_from(source);
        registry
    }

    /// Registry holding the built-in actions
    pub fn with_builtins() -> Self {
        Self::discover(&crate::builtin::extensions())
    }

    fn discover_from(&mut self, source: &dyn ExtensionSource) {
        let extensions = match source.extensions() {
            Ok(extensions) => extensions,
            Err(e) => {
                warn!(error = %e, "action discovery aborted");
                self.record_error(e.to_string());
                return;
            }
        };

        for extension in extensions {
            self.scan_extension(extension.as_ref());
        }
        debug!(
            actions = self.actions.len(),
            errors = self.discovery_errors.len(),
            "action discovery finished"
        );
    }

    /// Register the actions of one extension, recording any failure
    pub fn scan_extension(&mut self, extension: &dyn ActionExtension) {
        let module_path = extension.module_path().to_string();
        if is_private_module(&module_path) {
            debug!(module = %module_path, "skipping private module");
            return;
        }
        if is_core_module(&module_path) {
            debug!(module = %module_path, "skipping core module");
            return;
        }

        let mut registrar = Registrar {
            module_path: &module_path,
            registry: self,
        };
        if let Err(e) = extension.register(&mut registrar) {
            self.record_error(format!("{}: {}", module_path, e));
        }
    }

    fn record_error(&mut self, message: String) {
        warn!("action discovery: {}", message);
        self.discovery_errors.push(message);
    }

    pub fn get_action(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).map(|entry| Arc::clone(&entry.action))
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Registered names, sorted
    pub fn available_actions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn action_info(&self, name: &str) -> Option<ActionInfo> {
        self.actions.get(name).map(|entry| ActionInfo {
            name: entry.action.name().to_string(),
            version: entry.action.version().to_string(),
            description: entry.action.description().to_string(),
            module_path: entry.module_path.clone(),
            inputs: entry.action.inputs().to_vec(),
        })
    }

    /// Package (first module path segment) -> action names
    pub fn list_actions_by_package(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut packages: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (name, entry) in &self.actions {
            packages
                .entry(package_of(&entry.module_path).to_string())
                .or_default()
                .insert(name.clone());
        }
        packages
    }

    pub fn get_discovery_errors(&self) -> &[String] {
        &self.discovery_errors
    }

    /// Name collisions seen during discovery
    pub fn get_discovery_warnings(&self) -> &[String] {
        &self.discovery_warnings
    }

    /// Check every `uses:` step; empty when all resolve with valid parameters
    pub fn validate_workflow_actions(&self, workflow: &Workflow) -> Vec<ReferenceError> {
        let mut errors = Vec::new();

        for (step_index, step, name) in workflow.uses_steps() {
            let Some(entry) = self.actions.get(name) else {
                errors.push(ReferenceError {
                    step_index,
                    action: name.to_string(),
                    status: TaskStatus::InvalidUses,
                    message: format!("unknown action '{}'", name),
                });
                continue;
            };

            for message in parameter_problems(entry.action.as_ref(), &step.with) {
                errors.push(ReferenceError {
                    step_index,
                    action: name.to_string(),
                    status: TaskStatus::InvalidParameter,
                    message,
                });
            }
        }

        errors
    }
}
