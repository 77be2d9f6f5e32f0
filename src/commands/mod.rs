/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The closed set of commands that can appear in a transaction, together with the permission model
//! that guards them.
//!
//! Every command kind is handled by exactly two exhaustive match functions: one per concern,
//! [`validate`](validate::validate) and [`execute`](execute::execute). Adding a command variant
//! without teaching both functions about it is a compile error, which is the point of keeping
//! `Command` a closed sum type instead of a trait hierarchy.
//!
//! ## Validation vs execution
//!
//! `validate` checks permissions and preconditions against the world state view and never mutates
//! it: a missing permission, a dangling reference or an insufficient balance is a *validation*
//! failure. `execute` applies the mutation; a failure there (say, creating an account whose id is
//! already taken) indicates a deeper invariant mismatch and callers log it at higher severity.

pub mod execute;

pub mod validate;

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::identifiers::{AccountId, AssetId, DomainId, RoleId};

/// Ed25519 public key bytes identifying a signatory or a peer.
pub type PublicKeyBytes = [u8; 32];

/// A state-changing instruction, scoped to one acting account (the transaction's creator) per
/// call.
///
/// The command set mirrors the mutations the world state view supports: asset quantity
/// management and transfers, account/domain/asset/role lifecycle, signatory management, and the
/// granting of account-to-account permissions.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub enum Command {
    /// Mint `amount` of `asset` onto the creator's own balance.
    AddAssetQuantity { asset: AssetId, amount: u128 },

    /// Register a network peer.
    AddPeer {
        address: String,
        peer_key: PublicKeyBytes,
    },

    /// Attach an additional signatory key to `account`.
    AddSignatory {
        account: AccountId,
        signatory: PublicKeyBytes,
    },

    /// Attach an existing role to `account`.
    AppendRole { account: AccountId, role: RoleId },

    /// Create an account `name@domain` with one initial signatory and the domain's default role.
    CreateAccount {
        name: String,
        domain: DomainId,
        signatory: PublicKeyBytes,
    },

    /// Register an asset `name#domain` with a fixed decimal precision.
    CreateAsset {
        name: String,
        domain: DomainId,
        precision: u8,
    },

    /// Register a domain with a default role for its future accounts.
    CreateDomain {
        domain: DomainId,
        default_role: RoleId,
    },

    /// Register a role carrying a set of permissions.
    CreateRole {
        role: RoleId,
        permissions: PermissionSet,
    },

    /// Detach a role from `account`.
    DetachRole { account: AccountId, role: RoleId },

    /// Grant `to` a permission over the creator's own account.
    GrantPermission {
        to: AccountId,
        permission: GrantablePermission,
    },

    /// Remove a signatory key from `account`.
    RemoveSignatory {
        account: AccountId,
        signatory: PublicKeyBytes,
    },

    /// Revoke a previously granted permission over the creator's account.
    RevokePermission {
        from: AccountId,
        permission: GrantablePermission,
    },

    /// Set a key-value entry in `account`'s detail blob.
    SetAccountDetail {
        account: AccountId,
        key: String,
        value: String,
    },

    /// Set the number of signatures `account` requires on its transactions.
    SetQuorum { account: AccountId, quorum: u32 },

    /// Burn `amount` of `asset` from the creator's own balance.
    SubtractAssetQuantity { asset: AssetId, amount: u128 },

    /// Move `amount` of `asset` from `source` to `destination`.
    TransferAsset {
        source: AccountId,
        destination: AccountId,
        asset: AssetId,
        description: String,
        amount: u128,
    },
}

impl Command {
    /// Get a short name for this command kind, used in error messages and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::AddAssetQuantity { .. } => "AddAssetQuantity",
            Command::AddPeer { .. } => "AddPeer",
            Command::AddSignatory { .. } => "AddSignatory",
            Command::AppendRole { .. } => "AppendRole",
            Command::CreateAccount { .. } => "CreateAccount",
            Command::CreateAsset { .. } => "CreateAsset",
            Command::CreateDomain { .. } => "CreateDomain",
            Command::CreateRole { .. } => "CreateRole",
            Command::DetachRole { .. } => "DetachRole",
            Command::GrantPermission { .. } => "GrantPermission",
            Command::RemoveSignatory { .. } => "RemoveSignatory",
            Command::RevokePermission { .. } => "RevokePermission",
            Command::SetAccountDetail { .. } => "SetAccountDetail",
            Command::SetQuorum { .. } => "SetQuorum",
            Command::SubtractAssetQuantity { .. } => "SubtractAssetQuantity",
            Command::TransferAsset { .. } => "TransferAsset",
        }
    }
}

/// Role-attached permission over world state operations.
///
/// Permission checks are always resolved as the union of the permission sets of all roles attached
/// to the acting account (plus any [`GrantablePermission`] overrides), never by trusting a field on
/// the account itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
#[repr(u8)]
pub enum Permission {
    AddAssetQuantity = 0,
    AddPeer,
    AddSignatory,
    AppendRole,
    CreateAccount,
    CreateAsset,
    CreateDomain,
    CreateRole,
    DetachRole,
    Grant,
    Receive,
    RemoveSignatory,
    SetDetail,
    SetQuorum,
    SubtractAssetQuantity,
    Transfer,
}

/// Account-to-account permission: a right over *my* account that I grant to another account with
/// [`Command::GrantPermission`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
#[repr(u8)]
pub enum GrantablePermission {
    AddMySignatory = 0,
    RemoveMySignatory,
    SetMyQuorum,
    SetMyAccountDetail,
    TransferMyAssets,
}

/// Compact set of [`Permission`]s, stored as a bitset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, BorshDeserialize, BorshSerialize)]
pub struct PermissionSet(u64);

impl PermissionSet {
    /// Create an empty `PermissionSet`.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Create a `PermissionSet` containing the given permissions.
    pub fn from_iter(permissions: impl IntoIterator<Item = Permission>) -> Self {
        let mut set = Self::empty();
        for permission in permissions {
            set.insert(permission);
        }
        set
    }

    /// Add `permission` to this set.
    pub fn insert(&mut self, permission: Permission) {
        self.0 |= 1u64 << permission as u8;
    }

    /// Check whether `permission` is in this set.
    pub fn contains(&self, permission: Permission) -> bool {
        self.0 & (1u64 << permission as u8) != 0
    }

    /// Check whether every permission in `other` is also in this set.
    pub fn is_superset(&self, other: PermissionSet) -> bool {
        self.0 & other.0 == other.0
    }

    /// Extend this set with every permission in `other`.
    pub fn union_with(&mut self, other: PermissionSet) {
        self.0 |= other.0;
    }
}

/// Compact set of [`GrantablePermission`]s, stored as a bitset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, BorshDeserialize, BorshSerialize)]
pub struct GrantablePermissionSet(u64);

impl GrantablePermissionSet {
    /// Create an empty `GrantablePermissionSet`.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Add `permission` to this set.
    pub fn insert(&mut self, permission: GrantablePermission) {
        self.0 |= 1u64 << permission as u8;
    }

    /// Remove `permission` from this set.
    pub fn remove(&mut self, permission: GrantablePermission) {
        self.0 &= !(1u64 << permission as u8);
    }

    /// Check whether `permission` is in this set.
    pub fn contains(&self, permission: GrantablePermission) -> bool {
        self.0 & (1u64 << permission as u8) != 0
    }

    /// Check whether this set is empty.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Early exit used inside the command handlers: either a domain rejection or a storage failure.
///
/// Lets `validate` and `execute` thread both failure kinds through `?` before the public entry
/// points split them back into their nested result types.
pub(crate) enum Abort {
    Command(CommandError),
    Storage(crate::state::kv_store::StorageError),
}

impl From<crate::state::kv_store::StorageError> for Abort {
    fn from(error: crate::state::kv_store::StorageError) -> Self {
        Abort::Storage(error)
    }
}

pub(crate) fn split(
    outcome: Result<(), Abort>,
) -> Result<Result<(), CommandError>, crate::state::kv_store::StorageError> {
    match outcome {
        Ok(()) => Ok(Ok(())),
        Err(Abort::Command(error)) => Ok(Err(error)),
        Err(Abort::Storage(error)) => Err(error),
    }
}

/// Reason a single command failed to validate or execute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError {
    /// The acting account does not hold the permission the command requires.
    PermissionDenied {
        creator: AccountId,
        command: &'static str,
    },

    /// The command references an account that does not exist.
    AccountNotFound(AccountId),

    /// The command references a domain that does not exist.
    DomainNotFound(DomainId),

    /// The command references an asset that does not exist.
    AssetNotFound(AssetId),

    /// The command references a role that does not exist.
    RoleNotFound(RoleId),

    /// The referenced signatory is not attached to the account.
    SignatoryNotFound(AccountId),

    /// The source account's balance does not cover the requested amount.
    InsufficientBalance {
        account: AccountId,
        asset: AssetId,
        balance: u128,
        amount: u128,
    },

    /// Adding the requested amount would overflow the destination balance.
    BalanceOverflow { account: AccountId, asset: AssetId },

    /// An entity with the same identifier already exists.
    AlreadyExists { entity: &'static str, id: String },

    /// The requested quorum is zero or exceeds the number of signatories.
    InvalidQuorum { account: AccountId, quorum: u32 },

    /// Removing this signatory would leave the account unable to meet its quorum.
    QuorumUnsatisfiable { account: AccountId },
}

impl Display for CommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::PermissionDenied { creator, command } => {
                write!(f, "account {} may not execute {}", creator, command)
            }
            CommandError::AccountNotFound(account) => {
                write!(f, "account {} does not exist", account)
            }
            CommandError::DomainNotFound(domain) => write!(f, "domain {} does not exist", domain),
            CommandError::AssetNotFound(asset) => write!(f, "asset {} does not exist", asset),
            CommandError::RoleNotFound(role) => write!(f, "role {} does not exist", role),
            CommandError::SignatoryNotFound(account) => {
                write!(f, "signatory is not attached to account {}", account)
            }
            CommandError::InsufficientBalance {
                account,
                asset,
                balance,
                amount,
            } => write!(
                f,
                "account {} holds {} of {}, needed {}",
                account, balance, asset, amount
            ),
            CommandError::BalanceOverflow { account, asset } => {
                write!(f, "balance of {} for {} would overflow", asset, account)
            }
            CommandError::AlreadyExists { entity, id } => {
                write!(f, "{} {} already exists", entity, id)
            }
            CommandError::InvalidQuorum { account, quorum } => {
                write!(f, "quorum {} is invalid for account {}", quorum, account)
            }
            CommandError::QuorumUnsatisfiable { account } => {
                write!(f, "account {} could no longer meet its quorum", account)
            }
        }
    }
}
