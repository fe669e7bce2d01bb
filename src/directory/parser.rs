//! Credential file parser.
//!
//! The file is a YAML document with a top-level `users:` mapping:
//!
//! ```yaml
//! users:
//!   dereulenspiegel:
//!     displayname: Till
//!     email: till@example.com
//!     password: $argon2id$v=19$m=65536,t=3,p=4$...
//!     groups:
//!       - admin
//!       - paperless
//! ```
//!
//! Parsing is all-or-nothing: it yields a complete [`Snapshot`] or a
//! [`DirectoryError::MalformedInput`].

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

use credir_error::DirectoryError;
use serde::{
    de::{self, MapAccess, Visitor},
    Deserialize, Deserializer,
};

use super::model::{Group, Snapshot, User};

/// First identifier handed out to users.
pub const USER_ID_BASE: u32 = 10000;
/// First identifier handed out to groups.
pub const GROUP_ID_BASE: u32 = 10000;

#[derive(Debug, Deserialize)]
struct RawDatabase {
    // BTreeMap fixes the traversal order: identifiers must not depend on
    // hash or file order.
    #[serde(deserialize_with = "unique_users")]
    users: BTreeMap<String, RawUser>,
}

/// Map visitor that refuses a username seen twice in the same mapping.
struct UniqueUsers;

#[derive(Debug, Deserialize)]
struct RawUser {
    displayname: Option<String>,
    email: Option<String>,
    password: Option<String>,
    groups: Option<Vec<String>>,
    #[serde(default)]
    disabled: bool,
}

/// Sequential identifier source.
#[derive(Debug)]
struct IdAllocator {
    next: u32,
}

/// Groups seen so far in one parse pass.
#[derive(Debug)]
struct GroupTable {
    ids: IdAllocator,
    groups: HashMap<String, Arc<Group>>,
}

////////////////////////////////////////////////////////////////////////////////
// Inherent methods
////////////////////////////////////////////////////////////////////////////////

impl IdAllocator {
    fn starting_at(base: u32) -> Self {
        Self { next: base }
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl GroupTable {
    fn new() -> Self {
        Self {
            ids: IdAllocator::starting_at(GROUP_ID_BASE),
            groups: HashMap::new(),
        }
    }

    /// Returns the group for `name`, allocating the next identifier on first
    /// sight.
    fn intern(
        &mut self,
        name: &str,
    ) -> Arc<Group> {
        if let Some(group) = self.groups.get(name) {
            return Arc::clone(group);
        }
        let group = Arc::new(Group {
            name: name.to_string(),
            gid_number: self.ids.allocate(),
        });
        self.groups.insert(name.to_string(), Arc::clone(&group));
        group
    }
}

impl<'de> Visitor<'de> for UniqueUsers {
    type Value = BTreeMap<String, RawUser>;

    fn expecting(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str("a mapping of user names to user records")
    }

    fn visit_map<A>(
        self,
        mut map: A,
    ) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut users = BTreeMap::new();
        while let Some(username) = map.next_key::<String>()? {
            if users.contains_key(&username) {
                return Err(de::Error::custom(format_args!(
                    "user `{username}` is defined more than once"
                )));
            }
            let record = map.next_value::<RawUser>()?;
            users.insert(username, record);
        }
        Ok(users)
    }
}

fn unique_users<'de, D>(deserializer: D) -> Result<BTreeMap<String, RawUser>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_map(UniqueUsers)
}

////////////////////////////////////////////////////////////////////////////////
// External functions
////////////////////////////////////////////////////////////////////////////////

/// Parses raw credential file bytes into a snapshot.
///
/// Users are visited in lexicographic order of their names and each user's
/// groups in listed order; user and group identifiers are assigned in that
/// traversal order starting at [`USER_ID_BASE`] / [`GROUP_ID_BASE`].
pub fn parse_snapshot(bytes: &[u8]) -> Result<Snapshot, DirectoryError> {
    let raw: RawDatabase = serde_yaml::from_slice(bytes)
        .map_err(|e| DirectoryError::malformed(format!("invalid credential yaml: {e}")))?;

    let mut uids = IdAllocator::starting_at(USER_ID_BASE);
    let mut groups = GroupTable::new();
    let mut users = HashMap::with_capacity(raw.users.len());

    for (username, record) in raw.users {
        let user = build_user(username, record, &mut uids, &mut groups)?;
        users.insert(user.username.clone(), user);
    }

    Ok(Snapshot::new(users, groups.groups))
}

fn build_user(
    username: String,
    record: RawUser,
    uids: &mut IdAllocator,
    groups: &mut GroupTable,
) -> Result<User, DirectoryError> {
    if username.is_empty() {
        return Err(DirectoryError::malformed("empty username key"));
    }

    let password = record
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| DirectoryError::malformed(format!("user {username}: missing password")))?;

    let group_names = record.groups.unwrap_or_default();
    let Some((first, rest)) = group_names.split_first() else {
        return Err(DirectoryError::malformed(format!(
            "user {username}: missing groups"
        )));
    };

    if group_names.iter().any(String::is_empty) {
        return Err(DirectoryError::malformed(format!(
            "user {username}: empty group name"
        )));
    }

    let primary_group = groups.intern(first);
    let mut other_groups: Vec<Arc<Group>> = Vec::new();
    for name in rest {
        let group = groups.intern(name);
        if group.name != primary_group.name && !other_groups.iter().any(|g| g.name == group.name) {
            other_groups.push(group);
        }
    }

    Ok(User {
        display_name: record.displayname.unwrap_or_default(),
        email: record.email.unwrap_or_default(),
        password,
        groups: group_names,
        disabled: record.disabled,
        uid_number: uids.allocate(),
        primary_group,
        other_groups,
        username,
    })
}
