//! # Role-Based Access Control
//!
//! Each privileged entry point names the [`Role`] it requires; membership
//! is an explicit `role -> set of principals` map that can be enumerated.
//!
//! ## High-Privilege Rotation
//!
//! `Admin` and `Restaker` control the keys to everything else and to the
//! custody path out of the vault. Handing either to a mistyped address is
//! unrecoverable, so they never move in one step:
//!
//! ```text
//!   Admin: propose_rotation(role, from, to)
//!                  │
//!                  ▼
//!          ┌───────────────┐  cancel_rotation   ┌───────────┐
//!          │    Pending     │──────────────────►│ discarded │
//!          └───────┬───────┘                    └───────────┘
//!                  │ accept_rotation(role), signed by `to`
//!                  ▼
//!        `from` loses the role, `to` gains it
//! ```
//!
//! Low-privilege roles are granted and revoked directly by an admin.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

use crate::types::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from role checks and role administration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// The caller does not hold the role the entry point requires.
    #[error("unauthorized: {account} lacks role {role}")]
    MissingRole {
        /// The caller.
        account: Address,
        /// The required role.
        role: Role,
    },

    /// High-privilege roles only move through propose/accept.
    #[error("role {0} must be rotated with propose/accept, not granted directly")]
    RotationRequired(Role),

    /// Removing this member would leave the pool without an admin.
    #[error("cannot remove the last admin")]
    LastAdmin,

    /// The proposed outgoing member does not hold the role.
    #[error("{account} does not hold role {role}")]
    NotAMember {
        /// The account named as `from`.
        account: Address,
        /// The role being rotated.
        role: Role,
    },

    /// `accept_rotation` or `cancel_rotation` without a pending proposal.
    #[error("no pending rotation for role {0}")]
    NoPendingRotation(Role),

    /// A proposal is pending and only its named recipient may accept it.
    #[error("rotation of {role} is addressed to {expected}, not {caller}")]
    NotRotationRecipient {
        /// The role being rotated.
        role: Role,
        /// The recipient named in the proposal.
        expected: Address,
        /// Whoever tried to accept.
        caller: Address,
    },
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// Privileged roles of the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Grants and revokes roles, resumes a halted pool.
    Admin,
    /// Adjusts cap and daily limit.
    Operator,
    /// Pauses and unpauses user entry points.
    Pauser,
    /// Freezes, unfreezes, and confiscates.
    Compliance,
    /// Publishes the exchange rate and resets daily counters.
    RateSource,
    /// Moves surplus to and from the restaking venue.
    Restaker,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::Operator,
        Role::Pauser,
        Role::Compliance,
        Role::RateSource,
        Role::Restaker,
    ];

    /// `true` for roles that only move through two-phase rotation.
    pub fn is_high_privilege(&self) -> bool {
        matches!(self, Role::Admin | Role::Restaker)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
            Role::Pauser => "pauser",
            Role::Compliance => "compliance",
            Role::RateSource => "rate_source",
            Role::Restaker => "restaker",
        };
        f.write_str(name)
    }
}

/// A proposed hand-over of a high-privilege role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRotation {
    /// Current holder giving up the role.
    pub from: Address,
    /// Recipient who must accept.
    pub to: Address,
    /// Admin who proposed it.
    pub proposed_by: Address,
    /// When it was proposed.
    pub proposed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// AccessControl
// ---------------------------------------------------------------------------

/// Role membership table plus pending rotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    members: BTreeMap<Role, BTreeSet<Address>>,
    pending: BTreeMap<Role, PendingRotation>,
}

impl AccessControl {
    /// Creates a table whose only member is `admin` holding [`Role::Admin`].
    pub fn new(admin: Address) -> Self {
        let mut members = BTreeMap::new();
        members.insert(Role::Admin, BTreeSet::from([admin]));
        Self {
            members,
            pending: BTreeMap::new(),
        }
    }

    /// `true` if `account` holds `role`.
    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.members
            .get(&role)
            .is_some_and(|set| set.contains(account))
    }

    /// Rejects unless `account` holds `role`.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::MissingRole`].
    pub fn require(&self, role: Role, account: &Address) -> Result<(), AccessError> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            Err(AccessError::MissingRole {
                account: account.clone(),
                role,
            })
        }
    }

    /// Members of `role`, in address order.
    pub fn members(&self, role: Role) -> Vec<Address> {
        self.members
            .get(&role)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The pending rotation for `role`, if one exists.
    pub fn pending_rotation(&self, role: Role) -> Option<&PendingRotation> {
        self.pending.get(&role)
    }

    /// Grants a low-privilege role. Caller must be an admin.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::MissingRole`] if `caller` is not an admin and
    /// [`AccessError::RotationRequired`] for high-privilege roles.
    pub fn grant_role(
        &mut self,
        caller: &Address,
        role: Role,
        account: Address,
    ) -> Result<(), AccessError> {
        self.require(Role::Admin, caller)?;
        if role.is_high_privilege() {
            return Err(AccessError::RotationRequired(role));
        }
        self.members.entry(role).or_default().insert(account);
        Ok(())
    }

    /// Seeds a high-privilege role at construction time, bypassing
    /// rotation. Only meaningful before the pool is handed to users.
    pub fn bootstrap_role(&mut self, role: Role, account: Address) {
        self.members.entry(role).or_default().insert(account);
    }

    /// Revokes any role. Caller must be an admin.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::LastAdmin`] if this would leave no admin.
    pub fn revoke_role(
        &mut self,
        caller: &Address,
        role: Role,
        account: &Address,
    ) -> Result<(), AccessError> {
        self.require(Role::Admin, caller)?;
        if role == Role::Admin && self.members(Role::Admin) == [account.clone()] {
            return Err(AccessError::LastAdmin);
        }
        if let Some(set) = self.members.get_mut(&role) {
            set.remove(account);
        }
        Ok(())
    }

    /// Phase one: an admin proposes moving `role` from `from` to `to`.
    /// A newer proposal replaces an older one for the same role.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::NotAMember`] if `from` does not hold `role`.
    pub fn propose_rotation(
        &mut self,
        caller: &Address,
        role: Role,
        from: Address,
        to: Address,
        now: DateTime<Utc>,
    ) -> Result<(), AccessError> {
        self.require(Role::Admin, caller)?;
        if !self.has_role(role, &from) {
            return Err(AccessError::NotAMember { account: from, role });
        }
        self.pending.insert(
            role,
            PendingRotation {
                from,
                to,
                proposed_by: caller.clone(),
                proposed_at: now,
            },
        );
        Ok(())
    }

    /// Phase two: the named recipient accepts.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::NoPendingRotation`] or
    /// [`AccessError::NotRotationRecipient`].
    pub fn accept_rotation(&mut self, caller: &Address, role: Role) -> Result<(), AccessError> {
        let pending = self
            .pending
            .get(&role)
            .ok_or(AccessError::NoPendingRotation(role))?;
        if &pending.to != caller {
            return Err(AccessError::NotRotationRecipient {
                role,
                expected: pending.to.clone(),
                caller: caller.clone(),
            });
        }
        let pending = self
            .pending
            .remove(&role)
            .ok_or(AccessError::NoPendingRotation(role))?;
        let set = self.members.entry(role).or_default();
        set.remove(&pending.from);
        set.insert(pending.to);
        Ok(())
    }

    /// Discards a pending rotation. Caller must be an admin.
    pub fn cancel_rotation(&mut self, caller: &Address, role: Role) -> Result<(), AccessError> {
        self.require(Role::Admin, caller)?;
        self.pending
            .remove(&role)
            .map(|_| ())
            .ok_or(AccessError::NoPendingRotation(role))
    }
}
