use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Namespace used for personal mailboxes.
pub const PRIVATE_NAMESPACE: &str = "#private";

/// Opaque, immutable mailbox identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MailboxId(Uuid);

impl MailboxId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a fresh random id
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MailboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fully qualified mailbox name: namespace, owner and hierarchical name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxPath {
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub name: String,
}

impl MailboxPath {
    pub fn new(namespace: impl Into<String>, user: Option<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            user,
            name: name.into(),
        }
    }

    /// A mailbox in the private namespace of `user`
    pub fn for_user(user: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(PRIVATE_NAMESPACE, Some(user.into()), name)
    }
}

impl fmt::Display for MailboxPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.namespace,
            self.user.as_deref().unwrap_or(""),
            self.name
        )
    }
}

/// Row of the mailbox table: the source of truth for a mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mailbox {
    pub id: MailboxId,
    pub path: MailboxPath,
    pub uid_validity: u32,
}

impl Mailbox {
    pub fn new(id: MailboxId, path: MailboxPath, uid_validity: u32) -> Self {
        Self {
            id,
            path,
            uid_validity,
        }
    }

    /// The path-index row this mailbox should be reachable through
    pub fn associated_registration(&self) -> PathRegistration {
        PathRegistration {
            path: self.path.clone(),
            id: self.id,
        }
    }
}

/// Row of the mailbox-path index: resolves a path to the mailbox owning it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathRegistration {
    pub path: MailboxPath,
    pub id: MailboxId,
}

impl PathRegistration {
    pub fn new(path: MailboxPath, id: MailboxId) -> Self {
        Self { path, id }
    }
}
