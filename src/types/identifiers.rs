/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Identifiers of the entities stored in the world state view.
//!
//! Accounts and assets are scoped to a domain, and their canonical printed forms carry the domain:
//! `name@domain` for accounts and `name#domain` for assets. Identifiers compare structurally and
//! can be used as map keys.

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};

/// Identifier of a domain: a named grouping of accounts and assets with a default role for new
/// accounts.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, BorshDeserialize, BorshSerialize)]
pub struct DomainId(String);

impl DomainId {
    /// Create a new `DomainId` wrapping `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the inner `str` of this `DomainId`.
    pub fn str(&self) -> &str {
        &self.0
    }
}

impl Display for DomainId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an account. Every account belongs to exactly one domain.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, BorshDeserialize, BorshSerialize)]
pub struct AccountId {
    pub name: String,
    pub domain: DomainId,
}

impl AccountId {
    /// Create a new `AccountId` for `name` in `domain`.
    pub fn new(name: impl Into<String>, domain: DomainId) -> Self {
        Self {
            name: name.into(),
            domain,
        }
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.domain)
    }
}

/// Identifier of an asset. Like accounts, assets are scoped to a domain.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, BorshDeserialize, BorshSerialize)]
pub struct AssetId {
    pub name: String,
    pub domain: DomainId,
}

impl AssetId {
    /// Create a new `AssetId` for `name` in `domain`.
    pub fn new(name: impl Into<String>, domain: DomainId) -> Self {
        Self {
            name: name.into(),
            domain,
        }
    }
}

impl Display for AssetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.domain)
    }
}

/// Identifier of a role: a named set of permissions attachable to accounts.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, BorshDeserialize, BorshSerialize)]
pub struct RoleId(String);

impl RoleId {
    /// Create a new `RoleId` wrapping `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the inner `str` of this `RoleId`.
    pub fn str(&self) -> &str {
        &self.0
    }
}

impl Display for RoleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
