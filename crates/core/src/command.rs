// SPDX-License-Identifier: MIT

//! The command surface contract.
//!
//! Parsing and transport live outside this crate; what is fixed here is the
//! set of commands and the authorization level each one requires.

use crate::id::GroupId;
use crate::level::{Actor, Leveler};
use thiserror::Error;

/// Malformed or unauthorized user input, rejected with a user-visible message
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// Every user-facing command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Look up whether a profile is tracked
    Check,
    /// Track a profile (create a record)
    Block,
    /// Edit a record's reason tags
    EditReasons,
    /// Edit arbitrary record fields, or delete the record
    EditFields,
    /// Re-run a full reconciliation sweep now
    Restore,
    /// Set the group's target channel
    SetChannel,
    /// Toggle the group's visibility mode
    SetVisibility,
    /// Assign levels to roles
    SetPermissions,
    /// Display the permission table
    GetPermissions,
    /// Show the help card
    Help,
}

impl Command {
    /// Minimum level required to run this command
    pub fn required_level(self) -> u8 {
        match self {
            Command::Help => 0,
            Command::Check => 1,
            Command::Block => 2,
            Command::EditReasons => 3,
            Command::EditFields | Command::Restore => 4,
            Command::SetChannel
            | Command::SetVisibility
            | Command::SetPermissions
            | Command::GetPermissions => 5,
        }
    }
}

/// Reject the command unless the actor's level in the group is sufficient
pub fn authorize(
    leveler: &Leveler,
    actor: &Actor,
    group: &GroupId,
    command: Command,
) -> Result<(), ValidationError> {
    let required = command.required_level();
    if leveler.level_of(actor, group) < required {
        return Err(ValidationError(format!(
            "You do not have LVL{} permissions.",
            required
        )));
    }
    Ok(())
}
