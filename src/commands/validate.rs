/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Stateful command validation: permission checks and preconditions, with no writes.

use crate::commands::{
    split, Abort, Command, CommandError, GrantablePermission, Permission,
};
use crate::state::kv_store::{KVGet, StorageError};
use crate::state::wsv::WorldStateView;
use crate::types::identifiers::AccountId;

/// Check whether `creator` may execute `command` against the current world state.
///
/// The outer result reports storage-level failures. The inner result is the validation verdict:
/// `Err` carries the first reason the command is not allowed to run. Validation never writes, so
/// a rejected command leaves the view untouched.
pub fn validate<S: KVGet>(
    wsv: &WorldStateView<S>,
    creator: &AccountId,
    command: &Command,
) -> Result<Result<(), CommandError>, StorageError> {
    split(validate_with_abort(wsv, creator, command))
}

fn validate_with_abort<S: KVGet>(
    wsv: &WorldStateView<S>,
    creator: &AccountId,
    command: &Command,
) -> Result<(), Abort> {
    if wsv.account(creator)?.is_none() {
        return fail(CommandError::AccountNotFound(creator.clone()));
    }

    match command {
        Command::AddAssetQuantity { asset, .. } => {
            require_role_permission(wsv, creator, Permission::AddAssetQuantity, command)?;
            if wsv.asset(asset)?.is_none() {
                return fail(CommandError::AssetNotFound(asset.clone()));
            }
            Ok(())
        }

        Command::AddPeer { .. } => {
            require_role_permission(wsv, creator, Permission::AddPeer, command)
        }

        Command::AddSignatory { account, .. } => {
            require_permission_over(
                wsv,
                creator,
                account,
                Permission::AddSignatory,
                GrantablePermission::AddMySignatory,
                command,
            )?;
            if wsv.account(account)?.is_none() {
                return fail(CommandError::AccountNotFound(account.clone()));
            }
            Ok(())
        }

        Command::AppendRole { account, role } => {
            require_role_permission(wsv, creator, Permission::AppendRole, command)?;
            if wsv.account(account)?.is_none() {
                return fail(CommandError::AccountNotFound(account.clone()));
            }
            if wsv.role_permissions(role)?.is_none() {
                return fail(CommandError::RoleNotFound(role.clone()));
            }
            Ok(())
        }

        Command::CreateAccount { domain, .. } => {
            require_role_permission(wsv, creator, Permission::CreateAccount, command)?;
            if wsv.domain(domain)?.is_none() {
                return fail(CommandError::DomainNotFound(domain.clone()));
            }
            Ok(())
        }

        Command::CreateAsset { domain, .. } => {
            require_role_permission(wsv, creator, Permission::CreateAsset, command)?;
            if wsv.domain(domain)?.is_none() {
                return fail(CommandError::DomainNotFound(domain.clone()));
            }
            Ok(())
        }

        Command::CreateDomain { default_role, .. } => {
            require_role_permission(wsv, creator, Permission::CreateDomain, command)?;
            if wsv.role_permissions(default_role)?.is_none() {
                return fail(CommandError::RoleNotFound(default_role.clone()));
            }
            Ok(())
        }

        Command::CreateRole { permissions, .. } => {
            require_role_permission(wsv, creator, Permission::CreateRole, command)?;
            // An account can only hand out permissions it holds itself.
            if !wsv.account_permissions(creator)?.is_superset(*permissions) {
                return fail(CommandError::PermissionDenied {
                    creator: creator.clone(),
                    command: command.kind(),
                });
            }
            Ok(())
        }

        Command::DetachRole { account, role } => {
            require_role_permission(wsv, creator, Permission::DetachRole, command)?;
            match wsv.account(account)? {
                None => fail(CommandError::AccountNotFound(account.clone())),
                Some(record) if !record.roles.contains(role) => {
                    fail(CommandError::RoleNotFound(role.clone()))
                }
                Some(_) => Ok(()),
            }
        }

        Command::GrantPermission { to, .. } => {
            require_role_permission(wsv, creator, Permission::Grant, command)?;
            if wsv.account(to)?.is_none() {
                return fail(CommandError::AccountNotFound(to.clone()));
            }
            Ok(())
        }

        Command::RemoveSignatory { account, signatory } => {
            require_permission_over(
                wsv,
                creator,
                account,
                Permission::RemoveSignatory,
                GrantablePermission::RemoveMySignatory,
                command,
            )?;
            let record = match wsv.account(account)? {
                Some(record) => record,
                None => return fail(CommandError::AccountNotFound(account.clone())),
            };
            let signatories = wsv.signatories(account)?.unwrap_or_default();
            if !signatories.contains(signatory) {
                return fail(CommandError::SignatoryNotFound(account.clone()));
            }
            if (signatories.len() as u32).saturating_sub(1) < record.quorum {
                return fail(CommandError::QuorumUnsatisfiable {
                    account: account.clone(),
                });
            }
            Ok(())
        }

        Command::RevokePermission { from, permission } => {
            // Revoking needs no role permission, but the grant being revoked must exist.
            if wsv.account(from)?.is_none() {
                return fail(CommandError::AccountNotFound(from.clone()));
            }
            if !wsv.grants(creator, from)?.contains(*permission) {
                return fail(CommandError::PermissionDenied {
                    creator: creator.clone(),
                    command: command.kind(),
                });
            }
            Ok(())
        }

        Command::SetAccountDetail { account, .. } => {
            if account != creator {
                require_permission_over(
                    wsv,
                    creator,
                    account,
                    Permission::SetDetail,
                    GrantablePermission::SetMyAccountDetail,
                    command,
                )?;
            }
            if wsv.account(account)?.is_none() {
                return fail(CommandError::AccountNotFound(account.clone()));
            }
            Ok(())
        }

        Command::SetQuorum { account, quorum } => {
            require_permission_over(
                wsv,
                creator,
                account,
                Permission::SetQuorum,
                GrantablePermission::SetMyQuorum,
                command,
            )?;
            if wsv.account(account)?.is_none() {
                return fail(CommandError::AccountNotFound(account.clone()));
            }
            let signatories = wsv.signatories(account)?.unwrap_or_default();
            if *quorum == 0 || *quorum as usize > signatories.len() {
                return fail(CommandError::InvalidQuorum {
                    account: account.clone(),
                    quorum: *quorum,
                });
            }
            Ok(())
        }

        Command::SubtractAssetQuantity { asset, amount } => {
            require_role_permission(wsv, creator, Permission::SubtractAssetQuantity, command)?;
            if wsv.asset(asset)?.is_none() {
                return fail(CommandError::AssetNotFound(asset.clone()));
            }
            require_balance(wsv, creator, asset, *amount)
        }

        Command::TransferAsset {
            source,
            destination,
            asset,
            amount,
            ..
        } => {
            if source == creator {
                require_role_permission(wsv, creator, Permission::Transfer, command)?;
            } else {
                if !wsv.has_grantable_permission(
                    creator,
                    source,
                    GrantablePermission::TransferMyAssets,
                )? {
                    return fail(CommandError::PermissionDenied {
                        creator: creator.clone(),
                        command: command.kind(),
                    });
                }
            }
            if wsv.account(source)?.is_none() {
                return fail(CommandError::AccountNotFound(source.clone()));
            }
            match wsv.account(destination)? {
                None => return fail(CommandError::AccountNotFound(destination.clone())),
                Some(_) => {
                    // The receiving side must opt in through a role carrying Receive.
                    if !wsv.has_role_permission(destination, Permission::Receive)? {
                        return fail(CommandError::PermissionDenied {
                            creator: destination.clone(),
                            command: command.kind(),
                        });
                    }
                }
            }
            if wsv.asset(asset)?.is_none() {
                return fail(CommandError::AssetNotFound(asset.clone()));
            }
            require_balance(wsv, source, asset, *amount)
        }
    }
}

fn fail<T>(error: CommandError) -> Result<T, Abort> {
    Err(Abort::Command(error))
}

/// Require that one of `creator`'s roles carries `permission`.
fn require_role_permission<S: KVGet>(
    wsv: &WorldStateView<S>,
    creator: &AccountId,
    permission: Permission,
    command: &Command,
) -> Result<(), Abort> {
    if wsv.has_role_permission(creator, permission)? {
        Ok(())
    } else {
        fail(CommandError::PermissionDenied {
            creator: creator.clone(),
            command: command.kind(),
        })
    }
}

/// Require the permission to act on `target`'s account: the role permission `own` when acting on
/// any account, or the grantable `granted` handed to `creator` by `target`.
fn require_permission_over<S: KVGet>(
    wsv: &WorldStateView<S>,
    creator: &AccountId,
    target: &AccountId,
    own: Permission,
    granted: GrantablePermission,
    command: &Command,
) -> Result<(), Abort> {
    if wsv.has_role_permission(creator, own)? {
        return Ok(());
    }
    if target != creator && wsv.has_grantable_permission(creator, target, granted)? {
        return Ok(());
    }
    fail(CommandError::PermissionDenied {
        creator: creator.clone(),
        command: command.kind(),
    })
}

fn require_balance<S: KVGet>(
    wsv: &WorldStateView<S>,
    account: &AccountId,
    asset: &crate::types::identifiers::AssetId,
    amount: u128,
) -> Result<(), Abort> {
    let balance = wsv.balance(account, asset)?.unwrap_or(0);
    if balance < amount {
        fail(CommandError::InsufficientBalance {
            account: account.clone(),
            asset: asset.clone(),
            balance,
            amount,
        })
    } else {
        Ok(())
    }
}
