/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to store small values, and do not have any major "active" behavior.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::{Add, AddAssign, Sub},
};

use borsh::{BorshDeserialize, BorshSerialize};

/// Height of a block in the chain.
///
/// Starts at 0 for the genesis state (before any block has been committed), and increases by 1 for
/// every committed block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct BlockHeight(u64);

impl BlockHeight {
    /// Create a new `BlockHeight` with an `int` inner value.
    pub fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the inner `u64` value of this `BlockHeight`.
    pub const fn int(&self) -> u64 {
        self.0
    }

    /// Get the little-endian representation of the inner `u64` value of this `BlockHeight`.
    pub fn to_le_bytes(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
}

impl Display for BlockHeight {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl AddAssign<u64> for BlockHeight {
    fn add_assign(&mut self, rhs: u64) {
        self.0.add_assign(rhs)
    }
}

impl Add<u64> for BlockHeight {
    type Output = BlockHeight;
    fn add(self, rhs: u64) -> Self::Output {
        BlockHeight::new(self.0.add(rhs))
    }
}

impl Sub<BlockHeight> for BlockHeight {
    type Output = u64;
    fn sub(self, rhs: BlockHeight) -> Self::Output {
        self.0 - rhs.0
    }
}

/// 32-byte cryptographic hash.
///
/// Within commitflow-rs, `CryptoHash`-es are always SHA256 hashes: of a
/// [`Block`](super::block::Block)'s header fields, or of a
/// [`Transaction`](super::transaction::Transaction)'s payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct CryptoHash([u8; 32]);

impl CryptoHash {
    /// Create a new `CryptoHash` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The hash that precedes the first block of every chain.
    pub const fn genesis() -> Self {
        Self([0u8; 32])
    }

    /// Get the inner `[u8; 32]` value of this `CryptoHash`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl From<[u8; 32]> for CryptoHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Display for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Debug for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Ed25519 digital signature.
///
/// Produced and verified with the [`ed25519_dalek`] crate by the consensus layer; this crate only
/// carries signatures around as part of a block's signature set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct SignatureBytes([u8; 64]);

impl SignatureBytes {
    /// Create a new `SignatureBytes` wrapping `bytes`.
    pub fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 64]` value of this `SignatureBytes`.
    pub const fn bytes(&self) -> [u8; 64] {
        self.0
    }
}

/// Time of some occurrence, in milliseconds since the Unix Epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a new `Timestamp` wrapping `millis`.
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Get the current wall-clock time as a `Timestamp`.
    pub fn now() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .map(|duration| duration.as_millis() as u64)
            .unwrap_or(0);
        Self(millis)
    }

    /// Get the inner `u64` value of this `Timestamp`.
    pub const fn int(&self) -> u64 {
        self.0
    }
}

/// Identifier of one consensus attempt.
///
/// `block_round` increments only when a round concludes with a committed block; `reject_round`
/// counts the attempts at the same block height and resets to [`Round::FIRST_REJECT_ROUND`] after
/// a commit.
///
/// Rounds are totally ordered by `(block_round, reject_round)` and usable as map keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct Round {
    pub block_round: u64,
    pub reject_round: u32,
}

impl Round {
    /// The `reject_round` of the first attempt after a successful commit.
    pub const FIRST_REJECT_ROUND: u32 = 1;

    /// Create a new `Round` with the given `block_round` and `reject_round`.
    pub const fn new(block_round: u64, reject_round: u32) -> Self {
        Self {
            block_round,
            reject_round,
        }
    }

    /// Get the round in which a freshly initialized node starts collecting transactions.
    pub const fn initial() -> Self {
        Self::new(1, Self::FIRST_REJECT_ROUND)
    }

    /// Get the round that follows this round when consensus committed a block in it.
    pub const fn successor_on_commit(&self) -> Round {
        Round::new(self.block_round + 1, Self::FIRST_REJECT_ROUND)
    }

    /// Get the round that follows this round when consensus rejected it.
    pub const fn successor_on_reject(&self) -> Round {
        Round::new(self.block_round, self.reject_round + 1)
    }
}

impl Display for Round {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.block_round, self.reject_round)
    }
}
