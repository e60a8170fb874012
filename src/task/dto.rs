//! Serialized form of a task, used to persist and resume it.

use super::{
    RepairServices, RepairTask, TaskError, SOLVE_MAILBOX_INCONSISTENCIES,
    SOLVE_MESSAGE_INCONSISTENCIES,
};
use crate::repair::RunningOptions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TaskDto {
    #[serde(rename = "solve-mailbox-inconsistencies")]
    SolveMailboxInconsistencies,

    #[serde(rename = "solve-message-inconsistencies", rename_all = "camelCase")]
    SolveMessageInconsistencies {
        #[serde(default)]
        running_options: RunningOptions,
    },
}

impl TaskDto {
    pub fn task_type(&self) -> &'static str {
        match self {
            TaskDto::SolveMailboxInconsistencies => SOLVE_MAILBOX_INCONSISTENCIES,
            TaskDto::SolveMessageInconsistencies { .. } => SOLVE_MESSAGE_INCONSISTENCIES,
        }
    }

    /// Parse a DTO, rejecting type identifiers no task is registered under
    pub fn from_json(json: &str) -> Result<Self, TaskError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let task_type = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| TaskError::UnknownTaskType(String::new()))?;

        if task_type != SOLVE_MAILBOX_INCONSISTENCIES && task_type != SOLVE_MESSAGE_INCONSISTENCIES
        {
            return Err(TaskError::UnknownTaskType(task_type.to_string()));
        }

        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Result<String, TaskError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Rebuild the task this DTO describes, with a fresh context
    pub fn into_task(self, services: &RepairServices) -> RepairTask {
        match self {
            TaskDto::SolveMailboxInconsistencies => RepairTask::solve_mailbox_inconsistencies(services),
            TaskDto::SolveMessageInconsistencies { running_options } => {
                RepairTask::solve_message_inconsistencies(services, running_options)
            }
        }
    }
}
