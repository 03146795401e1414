// SPDX-License-Identifier: MIT

//! Authorization levels gating command execution.
//!
//! Levels are 0..=5 per role, scoped to a group. Super-operators and group
//! owners are always level 5; everyone else gets the maximum level across
//! their roles, defaulting to 0.

use crate::command::ValidationError;
use crate::id::GroupId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Identifier of a platform role
pub type RoleId = String;

/// Group-scoped role-to-level mapping, as persisted in the permission table file
pub type LevelTable = BTreeMap<GroupId, BTreeMap<RoleId, u8>>;

/// Highest authorization level
pub const MAX_LEVEL: u8 = 5;

/// Someone invoking a command
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Platform identity, also used for audit entries
    pub identity: String,
    /// Roles held in the group
    pub roles: Vec<RoleId>,
    /// Whether the actor owns the group
    pub group_owner: bool,
}

impl Actor {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            roles: Vec::new(),
            group_owner: false,
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = impl Into<RoleId>>) -> Self {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn as_owner(mut self) -> Self {
        self.group_owner = true;
        self
    }
}

/// Resolves an actor's authorization level within a group
#[derive(Clone, Debug, Default)]
pub struct Leveler {
    table: LevelTable,
    super_operators: BTreeSet<String>,
}

impl Leveler {
    pub fn new(table: LevelTable) -> Self {
        Self {
            table,
            super_operators: BTreeSet::new(),
        }
    }

    /// Designate identities that are level 5 everywhere
    pub fn with_super_operators(
        mut self,
        identities: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.super_operators = identities.into_iter().map(Into::into).collect();
        self
    }

    /// The actor's level in the group: 5 for super-operators and owners,
    /// otherwise the maximum across mapped roles, 0 when nothing matches
    pub fn level_of(&self, actor: &Actor, group: &GroupId) -> u8 {
        if self.super_operators.contains(&actor.identity) || actor.group_owner {
            return MAX_LEVEL;
        }
        let Some(roles) = self.table.get(group) else {
            return 0;
        };
        actor
            .roles
            .iter()
            .filter_map(|role| roles.get(role).copied())
            .max()
            .unwrap_or(0)
    }

    /// Register a group with an empty role table
    pub fn register_group(&mut self, group: &GroupId) {
        self.table.entry(group.clone()).or_default();
    }

    /// Assign a level to a set of roles in a group
    pub fn set_level(
        &mut self,
        group: &GroupId,
        roles: &[RoleId],
        level: u8,
    ) -> Result<(), ValidationError> {
        if level > MAX_LEVEL {
            return Err(ValidationError(format!(
                "Level should be an integer from 0 to {}.",
                MAX_LEVEL
            )));
        }
        let entry = self.table.entry(group.clone()).or_default();
        for role in roles {
            entry.insert(role.clone(), level);
        }
        Ok(())
    }

    /// Roles grouped by level, for displaying the permission table
    pub fn levels(&self, group: &GroupId) -> [Vec<RoleId>; 6] {
        let mut out: [Vec<RoleId>; 6] = Default::default();
        if let Some(roles) = self.table.get(group) {
            for (role, level) in roles {
                out[usize::from((*level).min(MAX_LEVEL))].push(role.clone());
            }
        }
        out
    }

    /// The underlying table, for persistence
    pub fn table(&self) -> &LevelTable {
        &self.table
    }
}

#[cfg(test)]
#[path = "level_tests.rs"]
mod tests;
