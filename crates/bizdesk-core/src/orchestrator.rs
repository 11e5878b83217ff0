//! Composite action orchestration
//!
//! A composite action is an ordered list of steps. A step may only take
//! inputs from steps declared before it, so the dependency graph is acyclic
//! by construction. Steps run in dependency order; a failed step never
//! rolls back earlier side effects, and every step downstream of a failure
//! is skipped without being invoked.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capability::{Binding, Capability, CapabilityRegistry};
use crate::error::{AdapterError, CoreError, CoreResult};
use crate::router::validate_arguments;
use crate::types::Arguments;

/// `{step.field}` placeholders; `{{` and `}}` are literal braces
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{|\}\}|\{([A-Za-z0-9_-]+)\.([A-Za-z0-9_]+)\}")
        .expect("valid placeholder regex")
});

/// Make arbitrary text safe to embed in a template
pub fn escape_template(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

/// Where a step input comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepInput {
    Literal(Value),
    /// One field of an earlier step's output
    FromStep { step: String, field: String },
    /// Text with `{step.field}` placeholders, see [`escape_template`]
    Template(String),
}

impl StepInput {
    fn dependencies(&self) -> Vec<String> {
        match self {
            Self::Literal(_) => Vec::new(),
            Self::FromStep { step, .. } => vec![step.clone()],
            Self::Template(text) => PLACEHOLDER_RE
                .captures_iter(text)
                .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeStep {
    pub id: String,
    pub capability: String,
    pub inputs: Vec<(String, StepInput)>,
}

impl CompositeStep {
    pub fn new(id: impl Into<String>, capability: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capability: capability.into(),
            inputs: Vec::new(),
        }
    }

    pub fn literal(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.inputs
            .push((name.to_string(), StepInput::Literal(value.into())));
        self
    }

    pub fn from_step(mut self, name: &str, step: &str, field: &str) -> Self {
        self.inputs.push((
            name.to_string(),
            StepInput::FromStep {
                step: step.to_string(),
                field: field.to_string(),
            },
        ));
        self
    }

    pub fn template(mut self, name: &str, text: impl Into<String>) -> Self {
        self.inputs
            .push((name.to_string(), StepInput::Template(text.into())));
        self
    }

    /// Step ids this step reads from, first mention first
    pub fn dependencies(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.inputs
            .iter()
            .flat_map(|(_, input)| input.dependencies())
            .filter(|dep| seen.insert(dep.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeAction {
    pub name: String,
    pub steps: Vec<CompositeStep>,
}

impl CompositeAction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: CompositeStep) -> Self {
        self.steps.push(step);
        self
    }

    /// One-step plan invoking `capability` with fixed arguments
    pub fn single(capability: &str, arguments: &Arguments) -> Self {
        let step = arguments
            .iter()
            .fold(CompositeStep::new(capability, capability), |step, (k, v)| {
                step.literal(k, v.clone())
            });
        Self::new(capability).with_step(step)
    }

    /// Check step ids and references, and resolve every step's capability.
    ///
    /// Returned capabilities are in step order.
    pub fn validate(&self, registry: &CapabilityRegistry) -> CoreResult<Vec<Arc<Capability>>> {
        let invalid = |reason: String| CoreError::InvalidComposite {
            action: self.name.clone(),
            reason,
        };

        if self.steps.is_empty() {
            return Err(invalid("no steps".to_string()));
        }

        let all_ids: HashSet<&str> = self.steps.iter().map(|s| s.id.as_str()).collect();
        let mut declared: HashSet<&str> = HashSet::new();
        let mut capabilities = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            if step.id.is_empty() {
                return Err(invalid("step with empty id".to_string()));
            }
            if declared.contains(step.id.as_str()) {
                return Err(invalid(format!("duplicate step id `{}`", step.id)));
            }
            for dep in step.dependencies() {
                if dep == step.id {
                    return Err(invalid(format!("step `{}` references itself", step.id)));
                }
                if !declared.contains(dep.as_str()) {
                    let reason = if all_ids.contains(dep.as_str()) {
                        format!("step `{}` references later step `{}`", step.id, dep)
                    } else {
                        format!("step `{}` references unknown step `{}`", step.id, dep)
                    };
                    return Err(invalid(reason));
                }
            }

            let capability = registry.resolve(&step.capability)?;
            if !matches!(capability.binding, Binding::Adapter { .. }) {
                return Err(invalid(format!(
                    "step `{}` uses `{}`, which is not bound to an adapter",
                    step.id, step.capability
                )));
            }
            capabilities.push(capability);
            declared.insert(step.id.as_str());
        }
        Ok(capabilities)
    }
}

/// Invokes the adapter verb bound to a capability
#[async_trait]
pub trait StepInvoker: Send + Sync {
    async fn invoke(
        &self,
        capability: &Capability,
        arguments: Arguments,
    ) -> Result<Arguments, AdapterError>;
}

/// Outcome of calling one step's adapter
#[derive(Debug, Clone, Serialize)]
pub struct InvocationResult {
    pub step_id: String,
    pub capability: String,
    pub success: bool,
    pub output: Arguments,
    pub error: Option<AdapterError>,
}

impl InvocationResult {
    fn ok(step_id: &str, capability: &str, output: Arguments) -> Self {
        Self {
            step_id: step_id.to_string(),
            capability: capability.to_string(),
            success: true,
            output,
            error: None,
        }
    }

    fn failed(step_id: &str, capability: &str, error: AdapterError) -> Self {
        Self {
            step_id: step_id.to_string(),
            capability: capability.to_string(),
            success: false,
            output: Arguments::new(),
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    Skipped,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step_id: String,
    pub capability: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub output: Arguments,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AdapterError>,
    /// Upstream step that did not succeed, for skipped steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<String>,
}

impl From<InvocationResult> for StepReport {
    fn from(result: InvocationResult) -> Self {
        Self {
            status: if result.success {
                StepStatus::Succeeded
            } else {
                StepStatus::Failed
            },
            step_id: result.step_id,
            capability: result.capability,
            output: result.output,
            error: result.error,
            blocked_by: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Completed,
    PartiallyFailed,
    Failed,
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::PartiallyFailed => write!(f, "partially_failed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Aggregate result of one composite action, steps in declared order
#[derive(Debug, Clone, Serialize)]
pub struct CompositeReport {
    pub action: String,
    pub status: ReportStatus,
    pub steps: Vec<StepReport>,
}

impl CompositeReport {
    fn new(action: &str, steps: Vec<StepReport>) -> Self {
        let succeeded = steps
            .iter()
            .filter(|s| s.status == StepStatus::Succeeded)
            .count();
        let status = if succeeded == steps.len() {
            ReportStatus::Completed
        } else if succeeded == 0 {
            ReportStatus::Failed
        } else {
            ReportStatus::PartiallyFailed
        };
        Self {
            action: action.to_string(),
            status,
            steps,
        }
    }

    pub fn step(&self, id: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.step_id == id)
    }

    /// A field of a succeeded step's output
    pub fn output(&self, step: &str, field: &str) -> Option<&Value> {
        self.step(step).and_then(|s| s.output.get(field))
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }
}

/// Order in which ready steps are run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One step at a time, in declared order
    #[default]
    Sequential,
    /// Steps whose dependencies are settled run together
    Concurrent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub mode: ExecutionMode,
    pub max_concurrent_steps: usize,
    /// Per-invocation limit; 0 disables it
    pub step_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
            max_concurrent_steps: 4,
            step_timeout_secs: 30,
        }
    }
}

/// Runs composite actions against a step invoker
pub struct Orchestrator {
    registry: Arc<CapabilityRegistry>,
    invoker: Arc<dyn StepInvoker>,
    config: OrchestratorConfig,
}

/// What a step needs to run, once its inputs are resolved
struct PreparedStep {
    index: usize,
    capability: Arc<Capability>,
    arguments: Arguments,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        invoker: Arc<dyn StepInvoker>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            invoker,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub async fn execute(&self, action: &CompositeAction) -> CoreResult<CompositeReport> {
        self.execute_with_cancel(action, CancellationToken::new())
            .await
    }

    /// Execute an action. Once `cancel` fires no further step starts;
    /// calls already in flight finish but their results are dropped.
    pub async fn execute_with_cancel(
        &self,
        action: &CompositeAction,
        cancel: CancellationToken,
    ) -> CoreResult<CompositeReport> {
        let capabilities = action.validate(&self.registry)?;
        info!(
            "Executing composite action {} ({} steps, {:?})",
            action.name,
            action.steps.len(),
            self.config.mode
        );

        let mut reports: Vec<Option<StepReport>> = vec![None; action.steps.len()];
        let mut outputs: HashMap<String, Arguments> = HashMap::new();

        loop {
            if cancel.is_cancelled() {
                warn!("Composite action {} cancelled", action.name);
                return Err(CoreError::Cancelled);
            }

            let mut wave = Vec::new();
            for (index, step) in action.steps.iter().enumerate() {
                if reports[index].is_some() {
                    continue;
                }
                let deps = step.dependencies();
                if deps
                    .iter()
                    .any(|d| !settled(action, &reports, d))
                {
                    // sequential mode never looks past the first unsettled step
                    if self.config.mode == ExecutionMode::Sequential {
                        break;
                    }
                    continue;
                }

                if let Some(blocker) = deps.iter().find(|d| !outputs.contains_key(*d)) {
                    debug!("Skipping step {}: upstream {} did not succeed", step.id, blocker);
                    reports[index] = Some(StepReport {
                        step_id: step.id.clone(),
                        capability: step.capability.clone(),
                        status: StepStatus::Skipped,
                        output: Arguments::new(),
                        error: None,
                        blocked_by: Some(blocker.clone()),
                    });
                    continue;
                }

                let capability = Arc::clone(&capabilities[index]);
                match resolve_inputs(step, &capability, &outputs) {
                    Ok(arguments) => wave.push(PreparedStep {
                        index,
                        capability,
                        arguments,
                    }),
                    Err(e) => {
                        warn!("Step {} has unusable inputs: {}", step.id, e.message);
                        reports[index] = Some(
                            InvocationResult::failed(&step.id, &step.capability, e).into(),
                        );
                    }
                }
                if self.config.mode == ExecutionMode::Sequential {
                    break;
                }
            }

            if wave.is_empty() {
                if reports.iter().all(Option::is_some) {
                    break;
                }
                continue;
            }

            let results = self.run_wave(action, wave).await;
            if cancel.is_cancelled() {
                warn!(
                    "Composite action {} cancelled; discarding {} in-flight results",
                    action.name,
                    results.len()
                );
                return Err(CoreError::Cancelled);
            }
            for (index, result) in results {
                if result.success {
                    outputs.insert(result.step_id.clone(), result.output.clone());
                } else if let Some(e) = &result.error {
                    warn!("Step {} failed: {}", result.step_id, e);
                }
                reports[index] = Some(result.into());
            }
        }

        let steps: Vec<StepReport> = reports.into_iter().flatten().collect();
        let report = CompositeReport::new(&action.name, steps);
        info!("Composite action {} {}", action.name, report.status);
        Ok(report)
    }

    /// Run a set of ready steps, at most `max_concurrent_steps` at a time
    async fn run_wave(
        &self,
        action: &CompositeAction,
        wave: Vec<PreparedStep>,
    ) -> Vec<(usize, InvocationResult)> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_steps.max(1)));
        let timeout_secs = self.config.step_timeout_secs;
        let mut handles = Vec::with_capacity(wave.len());

        for prepared in wave {
            let step_id = action.steps[prepared.index].id.clone();
            let invoker = Arc::clone(&self.invoker);
            let sem = Arc::clone(&semaphore);
            handles.push((
                prepared.index,
                step_id.clone(),
                prepared.capability.name.clone(),
                tokio::spawn(async move {
                    let _permit = match sem.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return InvocationResult::failed(
                                &step_id,
                                &prepared.capability.name,
                                AdapterError::new("orchestrator", "closed", "step pool shut down"),
                            );
                        }
                    };
                    invoke_step(invoker, &step_id, &prepared.capability, prepared.arguments, timeout_secs)
                        .await
                }),
            ));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (index, step_id, capability, handle) in handles {
            match handle.await {
                Ok(result) => results.push((index, result)),
                Err(e) => results.push((
                    index,
                    InvocationResult::failed(
                        &step_id,
                        &capability,
                        AdapterError::new("orchestrator", "panic", format!("step panicked: {}", e)),
                    ),
                )),
            }
        }
        results
    }
}

/// A step is settled once it has a report of any kind
fn settled(action: &CompositeAction, reports: &[Option<StepReport>], id: &str) -> bool {
    action
        .steps
        .iter()
        .position(|s| s.id == id)
        .is_some_and(|i| reports[i].is_some())
}

async fn invoke_step(
    invoker: Arc<dyn StepInvoker>,
    step_id: &str,
    capability: &Capability,
    arguments: Arguments,
    timeout_secs: u64,
) -> InvocationResult {
    debug!("Invoking step {} ({})", step_id, capability.name);
    let call = invoker.invoke(capability, arguments);
    let result = if timeout_secs == 0 {
        call.await
    } else {
        match tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), call).await {
            Ok(r) => r,
            Err(_) => Err(AdapterError::timeout(provider_of(capability), timeout_secs)),
        }
    };
    match result {
        Ok(output) => InvocationResult::ok(step_id, &capability.name, output),
        Err(e) => InvocationResult::failed(step_id, &capability.name, e),
    }
}

fn provider_of(capability: &Capability) -> String {
    match &capability.binding {
        Binding::Adapter { adapter, .. } => adapter.to_string(),
        Binding::Composite(_) => "orchestrator".to_string(),
    }
}

/// Turn a step's declared inputs into validated capability arguments
fn resolve_inputs(
    step: &CompositeStep,
    capability: &Capability,
    outputs: &HashMap<String, Arguments>,
) -> Result<Arguments, AdapterError> {
    let missing = |step_ref: &str, field: &str| {
        AdapterError::new(
            "orchestrator",
            "missing_input",
            format!("step `{}` produced no `{}`", step_ref, field),
        )
    };

    let mut arguments = Arguments::new();
    for (name, input) in &step.inputs {
        let value = match input {
            StepInput::Literal(v) => v.clone(),
            StepInput::FromStep { step: from, field } => outputs
                .get(from)
                .and_then(|o| o.get(field))
                .cloned()
                .ok_or_else(|| missing(from, field))?,
            StepInput::Template(text) => {
                let mut rendered = String::with_capacity(text.len());
                let mut last = 0;
                for caps in PLACEHOLDER_RE.captures_iter(text) {
                    let Some(whole) = caps.get(0) else { continue };
                    rendered.push_str(&text[last..whole.start()]);
                    last = whole.end();
                    let (Some(from), Some(field)) = (caps.get(1), caps.get(2)) else {
                        // escaped brace
                        rendered.push_str(&whole.as_str()[..1]);
                        continue;
                    };
                    let value = outputs
                        .get(from.as_str())
                        .and_then(|o| o.get(field.as_str()))
                        .ok_or_else(|| missing(from.as_str(), field.as_str()))?;
                    match value {
                        Value::String(s) => rendered.push_str(s),
                        other => rendered.push_str(&other.to_string()),
                    }
                }
                rendered.push_str(&text[last..]);
                Value::String(rendered)
            }
        };
        arguments.insert(name.clone(), value);
    }

    validate_arguments(capability, arguments)
        .map_err(|e| AdapterError::new("orchestrator", "invalid_arguments", e.to_string()))
}

/// Format a report into a readable markdown string.
pub fn format_report(report: &CompositeReport) -> String {
    let mut output = format!("## {} ({})\n\n", report.action, report.status);
    for step in &report.steps {
        output.push_str(&format!(
            "### {} [{}] ({})\n",
            step.step_id, step.capability, step.status
        ));
        match step.status {
            StepStatus::Succeeded => {
                for (key, value) in &step.output {
                    output.push_str(&format!("- {}: {}\n", key, value));
                }
            }
            StepStatus::Failed => {
                if let Some(e) = &step.error {
                    output.push_str(&format!("Error: {}\n", e));
                }
            }
            StepStatus::Skipped => {
                if let Some(blocker) = &step.blocked_by {
                    output.push_str(&format!("Blocked by: {}\n", blocker));
                }
            }
        }
        output.push('\n');
    }
    output
}
