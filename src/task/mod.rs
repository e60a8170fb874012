//! Repair runs packaged as background tasks.
//!
//! Each task owns its progress context, so `details()` can be polled while
//! `run()` is in progress. Task types are a closed set, chosen when the task
//! is built.

mod details;
mod dto;

pub use details::{AdditionalInformation, MailboxInconsistenciesDetails, MessageInconsistenciesDetails};
pub use dto::TaskDto;

use crate::repair::{
    MailboxContext, MailboxRepairService, MessageContext, MessageRepairService, RepairError,
    RunningOptions, TaskResult,
};
use crate::storage::MemoryStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub const SOLVE_MAILBOX_INCONSISTENCIES: &str = "solve-mailbox-inconsistencies";
pub const SOLVE_MESSAGE_INCONSISTENCIES: &str = "solve-message-inconsistencies";

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Status reported for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Partial,
    Failed,
}

impl TaskStatus {
    pub fn from_outcome(outcome: &Result<TaskResult, RepairError>) -> Self {
        match outcome {
            Ok(TaskResult::Completed) => TaskStatus::Completed,
            Ok(TaskResult::Partial) => TaskStatus::Partial,
            Err(_) => TaskStatus::Failed,
        }
    }
}

/// The repair services a task can be built from.
#[derive(Clone)]
pub struct RepairServices {
    pub mailboxes: Arc<MailboxRepairService>,
    pub messages: Arc<MessageRepairService>,
}

impl RepairServices {
    pub fn new(mailboxes: MailboxRepairService, messages: MessageRepairService) -> Self {
        Self {
            mailboxes: Arc::new(mailboxes),
            messages: Arc::new(messages),
        }
    }

    /// Services working on the tables of `store`
    pub fn for_store(store: &MemoryStore) -> Self {
        Self::new(
            MailboxRepairService::for_mailboxes(
                store.mailboxes.clone(),
                store.mailbox_paths.clone(),
                store.schema_version.clone(),
            ),
            MessageRepairService::for_messages(store.imap_uids.clone(), store.message_ids.clone()),
        )
    }
}

pub struct SolveMailboxInconsistenciesTask {
    service: Arc<MailboxRepairService>,
    context: Arc<MailboxContext>,
}

impl SolveMailboxInconsistenciesTask {
    pub fn new(service: Arc<MailboxRepairService>) -> Self {
        Self {
            service,
            context: Arc::new(MailboxContext::new()),
        }
    }

    pub async fn run(&self, cancel: &CancellationToken) -> Result<TaskResult, RepairError> {
        self.service
            .repair(&self.context, &RunningOptions::default(), cancel)
            .await
    }

    pub fn details(&self) -> MailboxInconsistenciesDetails {
        MailboxInconsistenciesDetails::from_snapshot(self.context.snapshot(), Utc::now())
    }

    pub fn context(&self) -> &Arc<MailboxContext> {
        &self.context
    }
}

pub struct SolveMessageInconsistenciesTask {
    service: Arc<MessageRepairService>,
    options: RunningOptions,
    context: Arc<MessageContext>,
}

impl SolveMessageInconsistenciesTask {
    pub fn new(service: Arc<MessageRepairService>, options: RunningOptions) -> Self {
        Self {
            service,
            options,
            context: Arc::new(MessageContext::new()),
        }
    }

    pub async fn run(&self, cancel: &CancellationToken) -> Result<TaskResult, RepairError> {
        self.service.repair(&self.context, &self.options, cancel).await
    }

    pub fn details(&self) -> MessageInconsistenciesDetails {
        MessageInconsistenciesDetails::from_snapshot(self.context.snapshot(), self.options, Utc::now())
    }

    pub fn running_options(&self) -> RunningOptions {
        self.options
    }

    pub fn context(&self) -> &Arc<MessageContext> {
        &self.context
    }
}

pub enum RepairTask {
    SolveMailboxInconsistencies(SolveMailboxInconsistenciesTask),
    SolveMessageInconsistencies(SolveMessageInconsistenciesTask),
}

impl RepairTask {
    pub fn solve_mailbox_inconsistencies(services: &RepairServices) -> Self {
        RepairTask::SolveMailboxInconsistencies(SolveMailboxInconsistenciesTask::new(
            services.mailboxes.clone(),
        ))
    }

    pub fn solve_message_inconsistencies(services: &RepairServices, options: RunningOptions) -> Self {
        RepairTask::SolveMessageInconsistencies(SolveMessageInconsistenciesTask::new(
            services.messages.clone(),
            options,
        ))
    }

    pub fn task_type(&self) -> &'static str {
        match self {
            RepairTask::SolveMailboxInconsistencies(_) => SOLVE_MAILBOX_INCONSISTENCIES,
            RepairTask::SolveMessageInconsistencies(_) => SOLVE_MESSAGE_INCONSISTENCIES,
        }
    }

    pub async fn run(&self, cancel: &CancellationToken) -> Result<TaskResult, RepairError> {
        match self {
            RepairTask::SolveMailboxInconsistencies(task) => task.run(cancel).await,
            RepairTask::SolveMessageInconsistencies(task) => task.run(cancel).await,
        }
    }

    pub fn details(&self) -> AdditionalInformation {
        match self {
            RepairTask::SolveMailboxInconsistencies(task) => {
                AdditionalInformation::Mailbox(task.details())
            }
            RepairTask::SolveMessageInconsistencies(task) => {
                AdditionalInformation::Message(task.details())
            }
        }
    }

    pub fn to_dto(&self) -> TaskDto {
        match self {
            RepairTask::SolveMailboxInconsistencies(_) => TaskDto::SolveMailboxInconsistencies,
            RepairTask::SolveMessageInconsistencies(task) => TaskDto::SolveMessageInconsistencies {
                running_options: task.running_options(),
            },
        }
    }
}
