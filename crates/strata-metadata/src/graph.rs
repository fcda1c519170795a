use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::execution::Execution;

/// A dangling or unreadable reference found while validating a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
  #[error("task '{task_name}' output '{output_key}' selects unknown task '{producer}'")]
  DanglingSelector {
    task_name: String,
    output_key: String,
    producer: String,
  },

  #[error("composite task '{task_name}' has an unreadable output mapping: {message}")]
  UnreadableMapping { task_name: String, message: String },
}

/// Snapshot of a running workflow: task name to execution record.
///
/// Built once per resolution request and never mutated while resolutions run,
/// so it can be shared across concurrent resolutions by reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskGraph {
  tasks: HashMap<String, Execution>,
}

impl TaskGraph {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_task(mut self, name: impl Into<String>, execution: Execution) -> Self {
    self.tasks.insert(name.into(), execution);
    self
  }

  /// Get the execution of a task by name.
  pub fn get(&self, task_name: &str) -> Option<&Execution> {
    self.tasks.get(task_name)
  }

  pub fn contains(&self, task_name: &str) -> bool {
    self.tasks.contains_key(task_name)
  }

  pub fn task_names(&self) -> impl Iterator<Item = &String> {
    self.tasks.keys()
  }

  pub fn len(&self) -> usize {
    self.tasks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tasks.is_empty()
  }

  /// Check every selector of every composite task against the snapshot.
  ///
  /// Returns all problems found, sorted by task name and output key. An empty
  /// list does not guarantee resolution succeeds (leaf outputs are only known
  /// to the metadata store) but a non-empty one guarantees some resolution
  /// will fail.
  pub fn validate(&self) -> Vec<GraphError> {
    let mut problems = Vec::new();

    for (task_name, execution) in &self.tasks {
      if !execution.is_composite() {
        continue;
      }
      let mapping = match execution.output_artifacts() {
        Ok(Some(mapping)) => mapping,
        Ok(None) => continue,
        Err(e) => {
          problems.push(GraphError::UnreadableMapping {
            task_name: task_name.clone(),
            message: e.to_string(),
          });
          continue;
        }
      };
      for (output_key, spec) in mapping.iter() {
        for selector in &spec.artifact_selectors {
          if !self.contains(&selector.producer_subtask) {
            problems.push(GraphError::DanglingSelector {
              task_name: task_name.clone(),
              output_key: output_key.clone(),
              producer: selector.producer_subtask.clone(),
            });
          }
        }
      }
    }

    problems.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    problems
  }
}

fn sort_key(error: &GraphError) -> (&str, &str) {
  match error {
    GraphError::DanglingSelector {
      task_name,
      output_key,
      ..
    } => (task_name.as_str(), output_key.as_str()),
    GraphError::UnreadableMapping { task_name, .. } => (task_name.as_str(), ""),
  }
}

impl<S: Into<String>> FromIterator<(S, Execution)> for TaskGraph {
  fn from_iter<I: IntoIterator<Item = (S, Execution)>>(iter: I) -> Self {
    Self {
      tasks: iter
        .into_iter()
        .map(|(name, exec)| (name.into(), exec))
        .collect(),
    }
  }
}
