/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Command execution: the state mutation behind each command kind.
//!
//! Execution assumes [`validate`](super::validate::validate) has already passed. The residual
//! failures here (identifier collisions, arithmetic overflow) are conditions validation cannot
//! rule out without re-doing execution's work.

use crate::commands::{split, Abort, Command, CommandError};
use crate::state::kv_store::{KVGet, StorageError};
use crate::state::wsv::{
    AccountRecord, AssetRecord, DomainRecord, PeerRecord, WorldStateView,
};
use crate::types::identifiers::{AccountId, AssetId};

/// Apply `command` on behalf of `creator`, writing into the view's current savepoint.
///
/// The outer result reports storage-level failures; the inner result is the execution verdict.
/// On an inner `Err` the view may hold partial writes from this command, so the caller is
/// expected to roll back its savepoint.
pub fn execute<S: KVGet>(
    wsv: &mut WorldStateView<S>,
    creator: &AccountId,
    command: &Command,
) -> Result<Result<(), CommandError>, StorageError> {
    split(execute_with_abort(wsv, creator, command))
}

fn execute_with_abort<S: KVGet>(
    wsv: &mut WorldStateView<S>,
    creator: &AccountId,
    command: &Command,
) -> Result<(), Abort> {
    match command {
        Command::AddAssetQuantity { asset, amount } => {
            add_to_balance(wsv, creator, asset, *amount)
        }

        Command::AddPeer { address, peer_key } => {
            let mut peers = wsv.peers()?;
            if peers.iter().any(|peer| &peer.peer_key == peer_key) {
                return fail(CommandError::AlreadyExists {
                    entity: "peer",
                    id: address.clone(),
                });
            }
            peers.push(PeerRecord {
                address: address.clone(),
                peer_key: *peer_key,
            });
            wsv.set_peers(&peers);
            Ok(())
        }

        Command::AddSignatory { account, signatory } => {
            let mut signatories = wsv.signatories(account)?.unwrap_or_default();
            if signatories.contains(signatory) {
                return fail(CommandError::AlreadyExists {
                    entity: "signatory",
                    id: account.to_string(),
                });
            }
            signatories.push(*signatory);
            wsv.set_signatories(account, &signatories);
            Ok(())
        }

        Command::AppendRole { account, role } => {
            let mut record = expect_account(wsv, account)?;
            if record.roles.contains(role) {
                return fail(CommandError::AlreadyExists {
                    entity: "role attachment",
                    id: format!("{} on {}", role, account),
                });
            }
            record.roles.push(role.clone());
            wsv.set_account(account, &record);
            Ok(())
        }

        Command::CreateAccount {
            name,
            domain,
            signatory,
        } => {
            let id = AccountId {
                name: name.clone(),
                domain: domain.clone(),
            };
            if wsv.account(&id)?.is_some() {
                return fail(CommandError::AlreadyExists {
                    entity: "account",
                    id: id.to_string(),
                });
            }
            let domain_record = match wsv.domain(domain)? {
                Some(record) => record,
                None => return fail(CommandError::DomainNotFound(domain.clone())),
            };
            wsv.set_account(
                &id,
                &AccountRecord {
                    quorum: 1,
                    details: Default::default(),
                    roles: vec![domain_record.default_role],
                },
            );
            wsv.set_signatories(&id, &vec![*signatory]);
            Ok(())
        }

        Command::CreateAsset {
            name,
            domain,
            precision,
        } => {
            let id = AssetId {
                name: name.clone(),
                domain: domain.clone(),
            };
            if wsv.asset(&id)?.is_some() {
                return fail(CommandError::AlreadyExists {
                    entity: "asset",
                    id: id.to_string(),
                });
            }
            wsv.set_asset(
                &id,
                &AssetRecord {
                    precision: *precision,
                },
            );
            Ok(())
        }

        Command::CreateDomain {
            domain,
            default_role,
        } => {
            if wsv.domain(domain)?.is_some() {
                return fail(CommandError::AlreadyExists {
                    entity: "domain",
                    id: domain.to_string(),
                });
            }
            wsv.set_domain(
                domain,
                &DomainRecord {
                    default_role: default_role.clone(),
                },
            );
            Ok(())
        }

        Command::CreateRole { role, permissions } => {
            if wsv.role_permissions(role)?.is_some() {
                return fail(CommandError::AlreadyExists {
                    entity: "role",
                    id: role.to_string(),
                });
            }
            wsv.set_role(role, permissions);
            Ok(())
        }

        Command::DetachRole { account, role } => {
            let mut record = expect_account(wsv, account)?;
            match record.roles.iter().position(|attached| attached == role) {
                Some(position) => {
                    record.roles.remove(position);
                    wsv.set_account(account, &record);
                    Ok(())
                }
                None => fail(CommandError::RoleNotFound(role.clone())),
            }
        }

        Command::GrantPermission { to, permission } => {
            let mut grants = wsv.grants(creator, to)?;
            grants.insert(*permission);
            wsv.set_grants(creator, to, grants);
            Ok(())
        }

        Command::RemoveSignatory { account, signatory } => {
            let mut signatories = wsv.signatories(account)?.unwrap_or_default();
            match signatories.iter().position(|attached| attached == signatory) {
                Some(position) => {
                    signatories.remove(position);
                    wsv.set_signatories(account, &signatories);
                    Ok(())
                }
                None => fail(CommandError::SignatoryNotFound(account.clone())),
            }
        }

        Command::RevokePermission { from, permission } => {
            let mut grants = wsv.grants(creator, from)?;
            grants.remove(*permission);
            wsv.set_grants(creator, from, grants);
            Ok(())
        }

        Command::SetAccountDetail {
            account,
            key,
            value,
        } => {
            let mut record = expect_account(wsv, account)?;
            record.details.insert(key.clone(), value.clone());
            wsv.set_account(account, &record);
            Ok(())
        }

        Command::SetQuorum { account, quorum } => {
            let mut record = expect_account(wsv, account)?;
            record.quorum = *quorum;
            wsv.set_account(account, &record);
            Ok(())
        }

        Command::SubtractAssetQuantity { asset, amount } => {
            let balance = wsv.balance(creator, asset)?.unwrap_or(0);
            match balance.checked_sub(*amount) {
                Some(remaining) => {
                    wsv.set_balance(creator, asset, remaining);
                    Ok(())
                }
                None => fail(CommandError::InsufficientBalance {
                    account: creator.clone(),
                    asset: asset.clone(),
                    balance,
                    amount: *amount,
                }),
            }
        }

        Command::TransferAsset {
            source,
            destination,
            asset,
            amount,
            ..
        } => {
            let source_balance = wsv.balance(source, asset)?.unwrap_or(0);
            let remaining = match source_balance.checked_sub(*amount) {
                Some(remaining) => remaining,
                None => {
                    return fail(CommandError::InsufficientBalance {
                        account: source.clone(),
                        asset: asset.clone(),
                        balance: source_balance,
                        amount: *amount,
                    })
                }
            };
            wsv.set_balance(source, asset, remaining);
            add_to_balance(wsv, destination, asset, *amount)
        }
    }
}

fn fail<T>(error: CommandError) -> Result<T, Abort> {
    Err(Abort::Command(error))
}

fn expect_account<S: KVGet>(
    wsv: &WorldStateView<S>,
    account: &AccountId,
) -> Result<AccountRecord, Abort> {
    match wsv.account(account)? {
        Some(record) => Ok(record),
        None => fail(CommandError::AccountNotFound(account.clone())),
    }
}

fn add_to_balance<S: KVGet>(
    wsv: &mut WorldStateView<S>,
    account: &AccountId,
    asset: &AssetId,
    amount: u128,
) -> Result<(), Abort> {
    let balance = wsv.balance(account, asset)?.unwrap_or(0);
    match balance.checked_add(amount) {
        Some(total) => {
            wsv.set_balance(account, asset, total);
            Ok(())
        }
        None => fail(CommandError::BalanceOverflow {
            account: account.clone(),
            asset: asset.clone(),
        }),
    }
}
