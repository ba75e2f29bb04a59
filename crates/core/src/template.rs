//! Workflow templates and typed parameter injection.
//!
//! A template is a pre-authored backend job graph in API format: a JSON
//! object keyed by node id, where each node carries an `inputs` object.
//! Tasks never poke at node ids directly; they set a [`TemplateField`] and
//! the task's [`Binding`] table resolves it to a `(node, input)` location.
//! Every location is checked when the template is loaded, so a broken
//! template stops the server at startup instead of failing mid-request.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::error::CoreError;
use crate::task::TaskKind;

/// Semantic names for the values a request can inject into a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateField {
    PositivePrompt,
    NegativePrompt,
    StyleImage,
    ContentImage,
    CharacterDescription,
    PortraitImage,
    LoraName,
    Seed,
    Sampler,
    Scheduler,
    Unet,
    /// Model link feeding the guidance stage; rewired to bypass it.
    GuidanceModel,
    UserPrompt,
    SystemPrompt,
    SpeechText,
}

/// A concrete `graph[node].inputs[input]` location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionPoint {
    pub node: &'static str,
    pub input: &'static str,
}

/// Maps a [`TemplateField`] to where it lives in one task's template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub field: TemplateField,
    pub point: InjectionPoint,
}

/// Fully parameterized job graph, ready for submission.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescription(Value);

impl JobDescription {
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for JobDescription {
    fn from(graph: Value) -> Self {
        Self(graph)
    }
}

/// A validated workflow template for one task.
#[derive(Debug, Clone)]
pub struct WorkflowTemplate {
    task: TaskKind,
    graph: Value,
}

impl WorkflowTemplate {
    /// Validate `graph` against every binding of `task`.
    pub fn parse(task: TaskKind, graph: Value) -> Result<Self, CoreError> {
        let template_err = |message: String| CoreError::Template { task, message };

        let nodes = graph
            .as_object()
            .ok_or_else(|| template_err("top level is not a JSON object".into()))?;

        for binding in task.bindings() {
            let InjectionPoint { node, input } = binding.point;
            let inputs = nodes
                .get(node)
                .ok_or_else(|| template_err(format!("missing node {node} for {:?}", binding.field)))?
                .get("inputs")
                .and_then(Value::as_object)
                .ok_or_else(|| template_err(format!("node {node} has no inputs object")))?;
            if !inputs.contains_key(input) {
                return Err(template_err(format!(
                    "node {node} has no input '{input}' for {:?}",
                    binding.field
                )));
            }
        }

        Ok(Self { task, graph })
    }

    /// Read and validate `dir/<task template file>`.
    pub async fn load(task: TaskKind, dir: &Path) -> Result<Self, CoreError> {
        let path = dir.join(task.template_file());
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| CoreError::Template {
            task,
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        let graph: Value = serde_json::from_str(&raw).map_err(|e| CoreError::Template {
            task,
            message: format!("{} is not valid JSON: {e}", path.display()),
        })?;
        Self::parse(task, graph)
    }

    pub fn task(&self) -> TaskKind {
        self.task
    }

    /// Start a fresh copy of the graph for one request.
    pub fn instantiate(&self) -> JobBuilder {
        JobBuilder {
            task: self.task,
            graph: self.graph.clone(),
        }
    }
}

/// Per-request copy of a template receiving field values.
#[derive(Debug)]
pub struct JobBuilder {
    task: TaskKind,
    graph: Value,
}

impl JobBuilder {
    /// Write `value` at the location bound to `field`.
    ///
    /// Fails when the task has no binding for `field`.
    pub fn set(
        &mut self,
        field: TemplateField,
        value: impl Into<Value>,
    ) -> Result<&mut Self, CoreError> {
        let task = self.task;
        let point = task.binding(field).ok_or_else(|| CoreError::Template {
            task,
            message: format!("no injection point for {field:?}"),
        })?;

        let slot = self
            .graph
            .get_mut(point.node)
            .and_then(|node| node.get_mut("inputs"))
            .and_then(|inputs| inputs.get_mut(point.input))
            .ok_or_else(|| CoreError::Template {
                task,
                message: format!("node {} lost input '{}'", point.node, point.input),
            })?;
        *slot = value.into();
        Ok(self)
    }

    /// Like [`set`](Self::set), skipping `None`.
    pub fn set_opt<V: Into<Value>>(
        &mut self,
        field: TemplateField,
        value: Option<V>,
    ) -> Result<&mut Self, CoreError> {
        match value {
            Some(v) => self.set(field, v),
            None => Ok(self),
        }
    }

    pub fn build(self) -> JobDescription {
        JobDescription(self.graph)
    }
}

/// Every task's template, loaded once at startup and shared read-only.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: HashMap<TaskKind, Arc<WorkflowTemplate>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate the template of each task in `tasks` from `dir`.
    ///
    /// Stops at the first invalid or unreadable template.
    pub async fn load(dir: &Path, tasks: &[TaskKind]) -> Result<Self, CoreError> {
        let mut registry = Self::new();
        for &task in tasks {
            let template = WorkflowTemplate::load(task, dir).await?;
            tracing::info!(task = %task, file = task.template_file(), "Loaded workflow template");
            registry.insert(template);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, template: WorkflowTemplate) {
        self.templates.insert(template.task(), Arc::new(template));
    }

    pub fn get(&self, task: TaskKind) -> Result<Arc<WorkflowTemplate>, CoreError> {
        self.templates
            .get(&task)
            .cloned()
            .ok_or_else(|| CoreError::Internal(format!("no template loaded for {task}")))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
