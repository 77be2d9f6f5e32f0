/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The world state view (WSV): a typed read/write projection of ledger state.
//!
//! A `WorldStateView` wraps a read handle to the committed store plus a stack of
//! [`WriteSet`] overlays, one per open savepoint. Reads resolve through the overlays
//! newest-first before falling through to the committed store; writes always land in the top
//! overlay. Nothing touches the committed store until the owning
//! [`MutableStorage`](super::mutable_storage::MutableStorage) is committed, so discarding a view
//! on any exit path leaves ledger state untouched.
//!
//! ## Permission resolution
//!
//! An account's effective permissions are always the union of the permission sets of all roles
//! attached to it; account-to-account rights are looked up in the grantable-permission table.
//! No check ever trusts a field stored on the account itself.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::commands::{
    GrantablePermission, GrantablePermissionSet, Permission, PermissionSet, PublicKeyBytes,
};
use crate::state::kv_store::{KVGet, KeyClass, StorageError};
use crate::state::paths;
use crate::state::write_set::WriteSet;
use crate::types::identifiers::{AccountId, AssetId, DomainId, RoleId};

/// Stored record of an account.
///
/// `roles` is the authoritative list of roles attached to the account; `quorum` is the number of
/// signatures the account requires on its transactions; `details` is a free-form key-value blob
/// writable via `SetAccountDetail`.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct AccountRecord {
    pub quorum: u32,
    pub details: BTreeMap<String, String>,
    pub roles: Vec<RoleId>,
}

/// Stored record of a domain.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct DomainRecord {
    /// The role every account created in this domain starts with.
    pub default_role: RoleId,
}

/// Stored record of an asset.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct AssetRecord {
    pub precision: u8,
}

/// Stored record of a network peer.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct PeerRecord {
    pub address: String,
    pub peer_key: PublicKeyBytes,
}

/// A typed read/write view of ledger state layered over a committed store.
pub struct WorldStateView<S> {
    base: S,
    savepoints: Vec<WriteSet>,
}

impl<S: KVGet> WorldStateView<S> {
    /// Create a view over `base` with a single root overlay and no open savepoints.
    pub(crate) fn new(base: S) -> WorldStateView<S> {
        WorldStateView {
            base,
            savepoints: vec![WriteSet::new()],
        }
    }

    /* ↓↓↓ Savepoint control (driven by MutableStorage) ↓↓↓ */

    /// Open a new savepoint: subsequent writes can be discarded as a unit.
    pub(crate) fn open_savepoint(&mut self) {
        self.savepoints.push(WriteSet::new());
    }

    /// Release the newest savepoint, keeping its writes by merging them into the overlay below.
    pub(crate) fn release_savepoint(&mut self) {
        if self.savepoints.len() > 1 {
            let overlay = self.savepoints.pop().expect("stack has at least two overlays");
            self.savepoints
                .last_mut()
                .expect("root overlay is never popped")
                .merge(overlay);
        }
    }

    /// Roll back the newest savepoint, discarding every write made since it was opened.
    pub(crate) fn rollback_savepoint(&mut self) {
        if self.savepoints.len() > 1 {
            let _ = self.savepoints.pop();
        }
    }

    /// Collapse all overlays into a single `WriteSet`, consuming the view. Used at commit time.
    pub(crate) fn flatten(self) -> WriteSet {
        let mut savepoints = self.savepoints.into_iter();
        let mut flattened = savepoints.next().expect("root overlay always exists");
        for overlay in savepoints {
            flattened.merge(overlay);
        }
        flattened
    }

    /* ↓↓↓ Raw key-value access through the overlay stack ↓↓↓ */

    fn get_raw(&self, key: &[u8]) -> Option<Vec<u8>> {
        for overlay in self.savepoints.iter().rev() {
            if overlay.contains_delete(key) {
                return None;
            }
            if let Some(value) = overlay.get_insert(key) {
                return Some(value.clone());
            }
        }
        self.base.get(key)
    }

    fn set_raw(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.savepoints
            .last_mut()
            .expect("root overlay always exists")
            .set(key, value);
    }

    fn read<T: BorshDeserialize>(
        &self,
        key: &[u8],
        key_class: KeyClass,
    ) -> Result<Option<T>, StorageError> {
        match self.get_raw(key) {
            Some(bytes) => T::deserialize(&mut bytes.as_slice())
                .map(Some)
                .map_err(|err| StorageError::DeserializeValueError {
                    key: key_class,
                    source: err,
                }),
            None => Ok(None),
        }
    }

    fn put<T: BorshSerialize>(&mut self, key: Vec<u8>, value: &T) {
        self.set_raw(key, value.try_to_vec().unwrap());
    }

    /* ↓↓↓ Accounts ↓↓↓ */

    pub fn account(&self, id: &AccountId) -> Result<Option<AccountRecord>, StorageError> {
        self.read(&account_key(id), KeyClass::Account)
    }

    pub fn set_account(&mut self, id: &AccountId, record: &AccountRecord) {
        self.put(account_key(id), record);
    }

    pub fn signatories(&self, id: &AccountId) -> Result<Option<Vec<PublicKeyBytes>>, StorageError> {
        self.read(&signatories_key(id), KeyClass::Signatories)
    }

    pub fn set_signatories(&mut self, id: &AccountId, signatories: &Vec<PublicKeyBytes>) {
        self.put(signatories_key(id), signatories);
    }

    /* ↓↓↓ Domains, assets, balances ↓↓↓ */

    pub fn domain(&self, id: &DomainId) -> Result<Option<DomainRecord>, StorageError> {
        self.read(&domain_key(id), KeyClass::Domain)
    }

    pub fn set_domain(&mut self, id: &DomainId, record: &DomainRecord) {
        self.put(domain_key(id), record);
    }

    pub fn asset(&self, id: &AssetId) -> Result<Option<AssetRecord>, StorageError> {
        self.read(&asset_key(id), KeyClass::Asset)
    }

    pub fn set_asset(&mut self, id: &AssetId, record: &AssetRecord) {
        self.put(asset_key(id), record);
    }

    /// Get `account`'s balance of `asset`. `None` means the account has never held the asset,
    /// which permission checks treat the same as a zero balance.
    pub fn balance(
        &self,
        account: &AccountId,
        asset: &AssetId,
    ) -> Result<Option<u128>, StorageError> {
        self.read(&balance_key(account, asset), KeyClass::Balance)
    }

    pub fn set_balance(&mut self, account: &AccountId, asset: &AssetId, amount: u128) {
        self.put(balance_key(account, asset), &amount);
    }

    /* ↓↓↓ Roles and permissions ↓↓↓ */

    pub fn role_permissions(&self, role: &RoleId) -> Result<Option<PermissionSet>, StorageError> {
        self.read(&role_key(role), KeyClass::Role)
    }

    pub fn set_role(&mut self, role: &RoleId, permissions: &PermissionSet) {
        self.put(role_key(role), permissions);
    }

    /// Get the permissions `owner` has granted to `grantee` over `owner`'s account.
    pub fn grants(
        &self,
        owner: &AccountId,
        grantee: &AccountId,
    ) -> Result<GrantablePermissionSet, StorageError> {
        Ok(self
            .read(&grants_key(owner, grantee), KeyClass::Grants)?
            .unwrap_or(GrantablePermissionSet::empty()))
    }

    pub fn set_grants(
        &mut self,
        owner: &AccountId,
        grantee: &AccountId,
        permissions: GrantablePermissionSet,
    ) {
        self.put(grants_key(owner, grantee), &permissions);
    }

    /// Compute the union of the permission sets of every role attached to `account`.
    ///
    /// A missing account or a dangling role reference contributes nothing to the union.
    pub fn account_permissions(&self, account: &AccountId) -> Result<PermissionSet, StorageError> {
        let mut permissions = PermissionSet::empty();
        if let Some(record) = self.account(account)? {
            for role in &record.roles {
                if let Some(role_permissions) = self.role_permissions(role)? {
                    permissions.union_with(role_permissions);
                }
            }
        }
        Ok(permissions)
    }

    /// Check whether any of `account`'s roles carries `permission`.
    pub fn has_role_permission(
        &self,
        account: &AccountId,
        permission: Permission,
    ) -> Result<bool, StorageError> {
        Ok(self.account_permissions(account)?.contains(permission))
    }

    /// Check whether `owner` has granted `grantee` the account-to-account `permission`.
    pub fn has_grantable_permission(
        &self,
        grantee: &AccountId,
        owner: &AccountId,
        permission: GrantablePermission,
    ) -> Result<bool, StorageError> {
        Ok(self.grants(owner, grantee)?.contains(permission))
    }

    /* ↓↓↓ Peers ↓↓↓ */

    pub fn peers(&self) -> Result<Vec<PeerRecord>, StorageError> {
        Ok(self
            .read(&paths::PEERS.to_vec(), KeyClass::Peers)?
            .unwrap_or_default())
    }

    pub fn set_peers(&mut self, peers: &Vec<PeerRecord>) {
        self.put(paths::PEERS.to_vec(), peers);
    }
}

/// A base that holds nothing. [`WorldStateView::genesis`] layers a view over it so callers can
/// assemble the initial world state with the typed setters.
#[derive(Clone)]
pub struct EmptyBase;

impl KVGet for EmptyBase {
    fn get(&self, _key: &[u8]) -> Option<Vec<u8>> {
        None
    }
}

impl WorldStateView<EmptyBase> {
    /// Create a view over an empty base. Populate it with the typed setters, then pass
    /// [`into_write_set`](Self::into_write_set) to
    /// [`Node::initialize`](crate::node::Node::initialize).
    pub fn genesis() -> WorldStateView<EmptyBase> {
        WorldStateView::new(EmptyBase)
    }

    /// Collapse the view into the initial-state write set.
    pub fn into_write_set(self) -> WriteSet {
        self.flatten()
    }
}

/* ↓↓↓ Key construction ↓↓↓ */

pub(crate) fn account_key(id: &AccountId) -> Vec<u8> {
    paths::combine(&paths::ACCOUNTS, &id.try_to_vec().unwrap())
}

pub(crate) fn signatories_key(id: &AccountId) -> Vec<u8> {
    paths::combine(&paths::ACCOUNT_SIGNATORIES, &id.try_to_vec().unwrap())
}

pub(crate) fn grants_key(owner: &AccountId, grantee: &AccountId) -> Vec<u8> {
    let mut key = paths::combine(&paths::ACCOUNT_GRANTS, &owner.try_to_vec().unwrap());
    key.extend_from_slice(&grantee.try_to_vec().unwrap());
    key
}

pub(crate) fn balance_key(account: &AccountId, asset: &AssetId) -> Vec<u8> {
    let mut key = paths::combine(&paths::ACCOUNT_BALANCES, &account.try_to_vec().unwrap());
    key.extend_from_slice(&asset.try_to_vec().unwrap());
    key
}

pub(crate) fn domain_key(id: &DomainId) -> Vec<u8> {
    paths::combine(&paths::DOMAINS, &id.try_to_vec().unwrap())
}

pub(crate) fn asset_key(id: &AssetId) -> Vec<u8> {
    paths::combine(&paths::ASSETS, &id.try_to_vec().unwrap())
}

pub(crate) fn role_key(role: &RoleId) -> Vec<u8> {
    paths::combine(&paths::ROLES, &role.try_to_vec().unwrap())
}
