use std::{collections::HashMap, sync::Arc};

use serde::Serialize;

/// Login shell handed out for every account: the directory authenticates,
/// it does not grant interactive logins.
pub const LOGIN_SHELL: &str = "/usr/bin/false";

/// A group, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Group {
    pub name: String,
    pub gid_number: u32,
}

/// One account loaded from the credential file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub display_name: String,
    pub email: String,
    /// Encoded password digest, e.g. `$argon2id$...`.
    pub password: String,
    /// Group names in the order the file lists them.
    pub groups: Vec<String>,
    pub disabled: bool,
    pub uid_number: u32,
    /// First listed group.
    pub primary_group: Arc<Group>,
    /// Remaining listed groups, deduplicated, primary excluded.
    pub other_groups: Vec<Arc<Group>>,
}

/// Account view consumed by the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PosixAccount {
    pub name: String,
    pub uid_number: u32,
    pub primary_group: u32,
    pub other_groups: Vec<u32>,
    pub given_name: String,
    pub mail: String,
    pub login_shell: &'static str,
    pub disabled: bool,
}

/// Immutable view of the whole directory produced by one parse.
#[derive(Debug, Default)]
pub struct Snapshot {
    users: HashMap<String, User>,
    groups: HashMap<String, Arc<Group>>,
}

////////////////////////////////////////////////////////////////////////////////
// Inherent methods
////////////////////////////////////////////////////////////////////////////////

impl User {
    pub fn is_member_of(
        &self,
        group: &str,
    ) -> bool {
        self.primary_group.name == group || self.other_groups.iter().any(|g| g.name == group)
    }

    pub fn to_account(&self) -> PosixAccount {
        PosixAccount {
            name: self.username.clone(),
            uid_number: self.uid_number,
            primary_group: self.primary_group.gid_number,
            other_groups: self.other_groups.iter().map(|g| g.gid_number).collect(),
            given_name: self.display_name.clone(),
            mail: self.email.clone(),
            login_shell: LOGIN_SHELL,
            disabled: self.disabled,
        }
    }
}

impl Snapshot {
    pub(crate) fn new(
        users: HashMap<String, User>,
        groups: HashMap<String, Arc<Group>>,
    ) -> Self {
        Self { users, groups }
    }

    pub fn user(
        &self,
        username: &str,
    ) -> Option<&User> {
        self.users.get(username)
    }

    pub fn group(
        &self,
        name: &str,
    ) -> Option<&Arc<Group>> {
        self.groups.get(name)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn groups(&self) -> impl Iterator<Item = &Arc<Group>> {
        self.groups.values()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
