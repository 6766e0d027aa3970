//! V2 stake modifier block selection
//!
//! A V2 modifier takes one entropy bit from each of 64 ancestor blocks.
//! Round `r` may only pick among blocks timestamped before a stop time that
//! grows by one section per round, so early rounds choose from a narrow,
//! old window and later rounds from progressively wider ones. Within the
//! window the block with the smallest selection hash wins.

use primitive_types::U256;
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::chain::{BlockMetadata, ChainView};
use crate::constants::{MODIFIER_INTERVAL_RATIO, MODIFIER_SELECTION_ROUNDS};
use crate::crypto::{Hash256, HashWriter};
use crate::error::ModifierError;

/// Length of selection section `round` (seconds)
pub fn selection_interval_section(round: usize, modifier_interval: i64) -> i64 {
    debug_assert!(round < MODIFIER_SELECTION_ROUNDS);
    let round = round as i64;
    modifier_interval * 63 / (63 + (63 - round) * (MODIFIER_INTERVAL_RATIO - 1))
}

/// Total span of all selection sections (seconds)
pub fn selection_interval(modifier_interval: i64) -> i64 {
    (0..MODIFIER_SELECTION_ROUNDS)
        .map(|round| selection_interval_section(round, modifier_interval))
        .sum()
}

/// Candidate block, ordered by timestamp then by hash as an integer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub timestamp: i64,
    pub block_hash: Hash256,
}

impl Candidate {
    pub fn of(block: &BlockMetadata) -> Self {
        Self {
            timestamp: block.time(),
            block_hash: block.block_hash,
        }
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.block_hash.to_u256().cmp(&other.block_hash.to_u256()))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One completed selection round
#[derive(Debug, Clone, Copy)]
pub struct SelectionRound<'a> {
    pub round: usize,
    pub interval_stop: i64,
    pub selected: &'a BlockMetadata,
}

/// Selection hash of `block` under the previous modifier.
///
/// Before the modifier update height, proof-of-stake blocks hash a zero
/// proof instead of their block hash. Stake blocks have the hash divided
/// by 2^32 so they win over work blocks.
pub fn selection_hash(block: &BlockMetadata, prev_modifier: u64, use_block_hash: bool) -> U256 {
    let proof = if use_block_hash || !block.is_proof_of_stake {
        block.block_hash
    } else {
        Hash256::zero()
    };
    let mut writer = HashWriter::new();
    writer.write_hash(&proof).write_u64(prev_modifier);
    let hash = writer.finish().to_u256();
    if block.is_proof_of_stake {
        hash >> 32
    } else {
        hash
    }
}

/// Pick the block with the lowest selection hash among `candidates` not
/// yet in `selected`.
///
/// `candidates` must be sorted. The scan stops at the first block past
/// `interval_stop` once something has been picked; until then blocks past
/// the stop are still considered. `None` means every candidate was taken.
pub fn select_block_from_candidates<'a, C: ChainView>(
    chain: &'a C,
    candidates: &[Candidate],
    selected: &HashSet<Hash256>,
    interval_stop: i64,
    prev_modifier: u64,
    modifier_update_height: u32,
) -> Result<Option<&'a BlockMetadata>, ModifierError> {
    let mut best: Option<(U256, &'a BlockMetadata)> = None;
    // Decided by the oldest candidate for the whole call
    let mut use_block_hash = None;

    for candidate in candidates {
        let block = chain
            .block_by_hash(&candidate.block_hash)
            .ok_or(ModifierError::MissingBlock(candidate.block_hash))?;
        if best.is_some() && block.time() > interval_stop {
            break;
        }
        let use_block_hash = *use_block_hash.get_or_insert(block.height >= modifier_update_height);
        if selected.contains(&block.block_hash) {
            continue;
        }

        let hash = selection_hash(block, prev_modifier, use_block_hash);
        match best {
            Some((best_hash, _)) if hash >= best_hash => {}
            _ => best = Some((hash, block)),
        }
    }
    Ok(best.map(|(_, block)| block))
}

/// Run every selection round over `candidates`.
///
/// At most 64 rounds run, fewer when there are fewer candidates. Each
/// round extends the stop time by its section and excludes blocks chosen
/// in earlier rounds.
pub fn select_modifier_blocks<'a, C: ChainView>(
    chain: &'a C,
    candidates: &[Candidate],
    interval_start: i64,
    prev_modifier: u64,
    modifier_interval: i64,
    modifier_update_height: u32,
) -> Result<Vec<SelectionRound<'a>>, ModifierError> {
    let rounds = candidates.len().min(MODIFIER_SELECTION_ROUNDS);
    let mut selected = HashSet::with_capacity(rounds);
    let mut result = Vec::with_capacity(rounds);
    let mut interval_stop = interval_start;

    for round in 0..rounds {
        interval_stop += selection_interval_section(round, modifier_interval);
        let block = select_block_from_candidates(
            chain,
            candidates,
            &selected,
            interval_stop,
            prev_modifier,
            modifier_update_height,
        )?
        .ok_or(ModifierError::SelectionExhausted { round })?;

        selected.insert(block.block_hash);
        result.push(SelectionRound {
            round,
            interval_stop,
            selected: block,
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainParams, MemoryChain};
    use crate::constants::{MODIFIER_INTERVAL, MODIFIER_INTERVAL_TESTNET};

    fn block_hash(height: u32) -> Hash256 {
        let mut writer = HashWriter::new();
        writer.write_u32(height).write_u32(0x5e1e_c7);
        writer.finish()
    }

    /// Chain of `len` blocks spaced 60s, proof-of-stake from height 2 when `pos`
    fn chain(len: u32, pos: bool, modifier_update_height: u32) -> MemoryChain {
        let mut params = ChainParams::regtest();
        params.modifier_update_height = modifier_update_height;
        let mut chain = MemoryChain::new(params);
        for height in 0..len {
            let prev = if height == 0 { Hash256::zero() } else { block_hash(height - 1) };
            let mut meta = BlockMetadata::new(height, 1_000_000 + 60 * height, block_hash(height), prev);
            if pos && height >= 2 {
                meta = meta.with_stake(Default::default(), Hash256::zero());
            }
            chain.connect(meta).unwrap();
        }
        chain
    }

    fn candidates(chain: &MemoryChain) -> Vec<Candidate> {
        let mut candidates: Vec<_> = (0..chain.len() as u32)
            .filter_map(|h| chain.block_at_height(h))
            .map(Candidate::of)
            .collect();
        candidates.sort();
        candidates
    }

    #[test]
    fn test_sections_strictly_increase() {
        for interval in [MODIFIER_INTERVAL, MODIFIER_INTERVAL_TESTNET] {
            for round in 1..MODIFIER_SELECTION_ROUNDS {
                assert!(
                    selection_interval_section(round, interval)
                        > selection_interval_section(round - 1, interval)
                );
            }
        }
    }

    #[test]
    fn test_section_endpoints() {
        // First section is a third of the interval, last is the full interval
        assert_eq!(selection_interval_section(0, MODIFIER_INTERVAL), MODIFIER_INTERVAL / 3);
        assert_eq!(selection_interval_section(63, MODIFIER_INTERVAL), MODIFIER_INTERVAL);
    }

    #[test]
    fn test_selection_interval_is_sum_of_sections() {
        let sum: i64 = (0..64).map(|r| selection_interval_section(r, 1200)).sum();
        assert_eq!(selection_interval(1200), sum);
    }

    #[test]
    fn test_candidate_order_breaks_ties_by_hash_value() {
        let mut low = [0u8; 32];
        low[31] = 1;
        let mut high = [0u8; 32];
        high[0] = 1;
        // Byte 31 is the most significant: `low` is the larger integer
        let a = Candidate { timestamp: 5, block_hash: Hash256(high) };
        let b = Candidate { timestamp: 5, block_hash: Hash256(low) };
        assert!(a < b);
        assert!(Candidate { timestamp: 4, block_hash: Hash256(low) } < a);
    }

    #[test]
    fn test_stake_blocks_are_shifted() {
        let work = BlockMetadata::new(1, 0, block_hash(1), block_hash(0));
        let stake = work.clone().with_stake(Default::default(), Hash256::zero());
        assert_eq!(selection_hash(&stake, 7, true), selection_hash(&work, 7, true) >> 32);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let chain = chain(40, true, 0);
        let candidates = candidates(&chain);
        let start = candidates[0].timestamp;

        let first = select_modifier_blocks(&chain, &candidates, start, 0xfeed, 60, 0).unwrap();
        let second = select_modifier_blocks(&chain, &candidates, start, 0xfeed, 60, 0).unwrap();
        assert_eq!(first.len(), 40);
        let hashes = |rounds: &[SelectionRound<'_>]| -> Vec<Hash256> {
            rounds.iter().map(|r| r.selected.block_hash).collect()
        };
        assert_eq!(hashes(&first), hashes(&second));
    }

    #[test]
    fn test_each_block_selected_once() {
        let chain = chain(30, false, 0);
        let candidates = candidates(&chain);
        let rounds = select_modifier_blocks(&chain, &candidates, candidates[0].timestamp, 1, 60, 0).unwrap();
        let unique: HashSet<_> = rounds.iter().map(|r| r.selected.block_hash).collect();
        assert_eq!(unique.len(), rounds.len());
    }

    #[test]
    fn test_legacy_stake_blocks_tie_and_first_wins() {
        // Below the update height every stake block hashes the same zero
        // proof; strict comparison keeps the earliest one.
        let chain = chain(10, true, u32::MAX);
        let candidates: Vec<_> = candidates(&chain).into_iter().skip(2).collect();
        let picked = select_block_from_candidates(&chain, &candidates, &HashSet::new(), i64::MAX, 9, u32::MAX)
            .unwrap()
            .unwrap();
        assert_eq!(picked.height, 2);
    }

    #[test]
    fn test_scan_continues_past_stop_until_first_pick() {
        let chain = chain(5, false, 0);
        let candidates = candidates(&chain);
        // Stop precedes every candidate, yet the first one is still picked
        let picked = select_block_from_candidates(&chain, &candidates, &HashSet::new(), 0, 3, 0)
            .unwrap()
            .unwrap();
        assert_eq!(picked.height, 0);
    }

    #[test]
    fn test_exhausted_when_all_selected() {
        let chain = chain(3, false, 0);
        let candidates = candidates(&chain);
        let all: HashSet<_> = candidates.iter().map(|c| c.block_hash).collect();
        let picked = select_block_from_candidates(&chain, &candidates, &all, i64::MAX, 3, 0).unwrap();
        assert!(picked.is_none());
    }

    #[test]
    fn test_unindexed_candidate_is_an_error() {
        let chain = chain(2, false, 0);
        let ghost = Candidate { timestamp: 0, block_hash: Hash256([0xee; 32]) };
        let result = select_block_from_candidates(&chain, &[ghost], &HashSet::new(), 0, 0, 0);
        assert_eq!(result.unwrap_err(), ModifierError::MissingBlock(Hash256([0xee; 32])));
    }
}
