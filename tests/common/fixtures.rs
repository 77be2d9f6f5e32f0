/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A small fixed world the integration tests run against, plus builders for transactions, blocks,
//! and chains over it.
//!
//! The world has one domain, "wonderland", whose default role "citizen" only carries
//! [Permission::Receive]. `alice` additionally holds the "treasurer" role, which carries every
//! permission; `bob` is a plain citizen; `mallory` holds no roles at all. A single asset "coin"
//! exists, and `alice` starts with [ALICE_INITIAL_COINS] of it.

use std::collections::BTreeMap;
use std::sync::Arc;

use ed25519_dalek::SigningKey;
use rand_core::OsRng;

use commitflow_rs::commands::{Command, Permission, PermissionSet, PublicKeyBytes};
use commitflow_rs::state::write_set::WriteSet;
use commitflow_rs::state::wsv::{AccountRecord, AssetRecord, DomainRecord, WorldStateView};
use commitflow_rs::types::basic::{BlockHeight, CryptoHash, SignatureBytes, Timestamp};
use commitflow_rs::types::block::{Block, BlockSignature, EmptyBlock};
use commitflow_rs::types::identifiers::{AccountId, AssetId, DomainId, RoleId};
use commitflow_rs::types::transaction::Transaction;

pub const ALICE_INITIAL_COINS: u128 = 1000;

pub fn wonderland() -> DomainId {
    DomainId::new("wonderland")
}

pub fn citizen() -> RoleId {
    RoleId::new("citizen")
}

pub fn treasurer() -> RoleId {
    RoleId::new("treasurer")
}

pub fn alice() -> AccountId {
    AccountId::new("alice", wonderland())
}

pub fn bob() -> AccountId {
    AccountId::new("bob", wonderland())
}

pub fn mallory() -> AccountId {
    AccountId::new("mallory", wonderland())
}

pub fn coin() -> AssetId {
    AssetId::new("coin", wonderland())
}

/// Build the initial world state described in the module docs, ready to be passed to
/// `Node::initialize` or `Storage::initialize`.
pub fn initial_state() -> WriteSet {
    let mut genesis = WorldStateView::genesis();

    genesis.set_domain(
        &wonderland(),
        &DomainRecord {
            default_role: citizen(),
        },
    );
    genesis.set_role(&citizen(), &PermissionSet::from_iter([Permission::Receive]));
    genesis.set_role(&treasurer(), &all_permissions());
    genesis.set_asset(&coin(), &AssetRecord { precision: 2 });

    genesis.set_account(&alice(), &account_with_roles(vec![citizen(), treasurer()]));
    genesis.set_signatories(&alice(), &vec![[1u8; 32]]);
    genesis.set_balance(&alice(), &coin(), ALICE_INITIAL_COINS);

    genesis.set_account(&bob(), &account_with_roles(vec![citizen()]));
    genesis.set_signatories(&bob(), &vec![[2u8; 32]]);

    genesis.set_account(&mallory(), &account_with_roles(Vec::new()));
    genesis.set_signatories(&mallory(), &vec![[3u8; 32]]);

    genesis.into_write_set()
}

fn account_with_roles(roles: Vec<RoleId>) -> AccountRecord {
    AccountRecord {
        quorum: 1,
        details: BTreeMap::new(),
        roles,
    }
}

fn all_permissions() -> PermissionSet {
    PermissionSet::from_iter([
        Permission::AddAssetQuantity,
        Permission::AddPeer,
        Permission::AddSignatory,
        Permission::AppendRole,
        Permission::CreateAccount,
        Permission::CreateAsset,
        Permission::CreateDomain,
        Permission::CreateRole,
        Permission::DetachRole,
        Permission::Grant,
        Permission::Receive,
        Permission::RemoveSignatory,
        Permission::SetDetail,
        Permission::SetQuorum,
        Permission::SubtractAssetQuantity,
        Permission::Transfer,
    ])
}

/// Generate a fresh Ed25519 verifying key, for use as a block signer or peer identity.
pub fn random_signer() -> PublicKeyBytes {
    SigningKey::generate(&mut OsRng).verifying_key().to_bytes()
}

pub fn transaction(creator: AccountId, commands: Vec<Command>) -> Arc<Transaction> {
    Arc::new(Transaction::new(creator, commands, Timestamp::now(), None))
}

pub fn transfer(source: AccountId, destination: AccountId, amount: u128) -> Command {
    Command::TransferAsset {
        source,
        destination,
        asset: coin(),
        description: String::new(),
        amount,
    }
}

pub fn mint(amount: u128) -> Command {
    Command::AddAssetQuantity {
        asset: coin(),
        amount,
    }
}

pub fn signed_block(
    height: u64,
    prev_hash: CryptoHash,
    transactions: Vec<Transaction>,
    signer: PublicKeyBytes,
) -> Arc<Block> {
    Arc::new(Block::new(
        BlockHeight::new(height),
        prev_hash,
        Timestamp::now(),
        transactions,
        vec![BlockSignature {
            signer,
            signature: SignatureBytes::new([0u8; 64]),
        }],
    ))
}

pub fn signed_empty_block(
    height: u64,
    prev_hash: CryptoHash,
    signer: PublicKeyBytes,
) -> Arc<EmptyBlock> {
    Arc::new(EmptyBlock::new(
        BlockHeight::new(height),
        prev_hash,
        vec![BlockSignature {
            signer,
            signature: SignatureBytes::new([0u8; 64]),
        }],
    ))
}

/// Build a chain of `length` blocks on top of the genesis hash, each carrying one transaction in
/// which `alice` mints 10 coins.
pub fn mint_chain(length: u64, signer: PublicKeyBytes) -> Vec<Arc<Block>> {
    let mut chain = Vec::new();
    let mut prev_hash = CryptoHash::genesis();
    for height in 1..=length {
        let tx = Transaction::new(alice(), vec![mint(10)], Timestamp::now(), None);
        let block = signed_block(height, prev_hash, vec![tx], signer);
        prev_hash = block.hash;
        chain.push(block);
    }
    chain
}
