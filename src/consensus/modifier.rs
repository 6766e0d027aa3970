//! Stake modifier computation
//!
//! V2 modifiers are 64-bit values assembled from the entropy bits of
//! selected ancestors and regenerated at most once per modifier interval.
//! V3 modifiers, active from the witness height, are a plain hash chain.
//! Every connected block also carries a checksum over its modifier state
//! that is compared against hard checkpoints.

use tracing::{debug, trace, warn, Level};

use super::selector::{select_modifier_blocks, selection_interval, Candidate, SelectionRound};
use crate::chain::{BlockMetadata, ChainParams, ChainView, CheckpointPolicy};
use crate::constants::FIRST_BLOCK_STAKE_MODIFIER;
use crate::crypto::{Hash256, HashWriter};
use crate::error::ModifierError;

/// Result of computing the V2 modifier for a new block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifierOutcome {
    pub modifier: u64,
    /// A fresh modifier was generated rather than inherited
    pub generated: bool,
}

impl ModifierOutcome {
    fn generated(modifier: u64) -> Self {
        Self { modifier, generated: true }
    }

    fn inherited(modifier: u64) -> Self {
        Self { modifier, generated: false }
    }
}

/// V2 modifier used to hash a kernel, and where it was generated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelModifier {
    pub modifier: u64,
    pub height: u32,
    pub time: i64,
}

/// Parent of `block`, `None` at genesis. A missing parent is an error.
fn parent<'a, C: ChainView>(chain: &'a C, block: &BlockMetadata) -> Result<Option<&'a BlockMetadata>, ModifierError> {
    if block.height == 0 {
        return Ok(None);
    }
    chain
        .prev(block)
        .map(Some)
        .ok_or(ModifierError::MissingBlock(block.prev_hash))
}

/// Nearest ancestor of `block` (itself included) that generated a modifier
pub fn last_generated_modifier<'a, C: ChainView>(
    chain: &'a C,
    block: &'a BlockMetadata,
) -> Result<&'a BlockMetadata, ModifierError> {
    let mut cursor = block;
    while !cursor.generated_modifier {
        cursor = match parent(chain, cursor)? {
            Some(prev) => prev,
            None => return Err(ModifierError::NoGeneratedModifier(block.block_hash)),
        };
    }
    Ok(cursor)
}

/// V2 modifier for the block following `prev`.
///
/// `prev` is `None` when computing the genesis modifier.
pub fn compute_next_stake_modifier_v2<C: ChainView>(
    chain: &C,
    prev: Option<&BlockMetadata>,
    params: &ChainParams,
) -> Result<ModifierOutcome, ModifierError> {
    let Some(prev) = prev else {
        return Ok(ModifierOutcome::generated(0));
    };
    if prev.height == 0 {
        return Ok(ModifierOutcome::generated(FIRST_BLOCK_STAKE_MODIFIER));
    }

    let last = last_generated_modifier(chain, prev)?;
    let interval = params.modifier_interval;
    trace!(
        modifier = last.stake_modifier_v2,
        height = last.height,
        time = last.timestamp,
        "Previous stake modifier"
    );
    if last.time() / interval >= prev.time() / interval {
        return Ok(ModifierOutcome::inherited(last.stake_modifier_v2));
    }

    // Every ancestor inside the selection window
    let interval_start = (prev.time() / interval) * interval - selection_interval(interval);
    let mut window = Vec::new();
    let mut cursor = Some(prev);
    let mut first_candidate_height = 0;
    while let Some(block) = cursor {
        if block.time() < interval_start {
            first_candidate_height = block.height + 1;
            break;
        }
        window.push(block);
        cursor = parent(chain, block)?;
    }

    let mut candidates: Vec<Candidate> = window.iter().map(|b| Candidate::of(b)).collect();
    candidates.sort();

    let rounds = select_modifier_blocks(
        chain,
        &candidates,
        interval_start,
        last.stake_modifier_v2,
        interval,
        params.modifier_update_height,
    )?;

    let mut modifier = 0u64;
    for round in &rounds {
        modifier |= u64::from(round.selected.stake_entropy_bit) << round.round;
        trace!(
            round = round.round,
            stop = round.interval_stop,
            height = round.selected.height,
            bit = round.selected.stake_entropy_bit,
            "Selected block"
        );
    }

    if tracing::enabled!(Level::DEBUG) {
        let map = selection_map(&window, &rounds, first_candidate_height, prev.height);
        debug!(height = prev.height, map = %map, "Stake modifier selection map");
    }
    debug!(
        modifier = format_args!("{modifier:#018x}"),
        height = prev.height,
        time = prev.timestamp,
        "Generated new stake modifier"
    );

    Ok(ModifierOutcome::generated(modifier))
}

/// One character per height in the window: `-` work, `=` stake, `W`/`S` selected
fn selection_map(window: &[&BlockMetadata], rounds: &[SelectionRound<'_>], first_height: u32, last_height: u32) -> String {
    let mut map = vec![b'-'; (last_height - first_height + 1) as usize];
    for block in window {
        if block.is_proof_of_stake {
            map[(block.height - first_height) as usize] = b'=';
        }
    }
    for round in rounds {
        let block = round.selected;
        map[(block.height - first_height) as usize] = if block.is_proof_of_stake { b'S' } else { b'W' };
    }
    String::from_utf8_lossy(&map).into_owned()
}

/// V2 modifier to hash a kernel whose coin confirmed in `block_from`.
///
/// This is the modifier generated about one selection interval after the
/// confirmation block, found walking the active chain forward. The walk
/// never passes `max_height`, the height of the block being staked.
pub fn kernel_stake_modifier<C: ChainView>(
    chain: &C,
    block_from: &Hash256,
    max_height: u32,
    params: &ChainParams,
) -> Result<KernelModifier, ModifierError> {
    let from = chain
        .block_by_hash(block_from)
        .ok_or(ModifierError::MissingBlock(*block_from))?;
    let window_end = from.time() + selection_interval(params.modifier_interval);

    let mut current = from;
    let mut next = from.height.checked_add(1).and_then(|h| chain.block_at_height(h));
    let mut height = from.height;
    let mut time = from.time();

    while time < window_end {
        let Some(block) = next else {
            debug!(from = from.height, "Active chain ends before the kernel modifier");
            let modifier = if current.generated_modifier { current.stake_modifier_v2 } else { 0 };
            return Ok(KernelModifier {
                modifier,
                height: from.height,
                time: from.time(),
            });
        };

        current = block;
        next = match block.height.checked_add(1) {
            Some(h) if h < max_height => chain.block_at_height(h),
            _ => None,
        };
        if current.generated_modifier {
            height = current.height;
            time = current.time();
        }
    }

    Ok(KernelModifier {
        modifier: current.stake_modifier_v2,
        height,
        time,
    })
}

/// V3 modifier of `block`: `Hash(kernel seed || parent's V2 modifier)`.
///
/// The seed is the block hash for proof-of-work blocks and the staked
/// outpoint's transaction hash for proof-of-stake blocks. The parent's V2
/// field is hashed even past activation, where it stays zero. Genesis gets
/// the zero hash.
pub fn compute_stake_modifier_v3(prev: Option<&BlockMetadata>, block: &BlockMetadata) -> Hash256 {
    let Some(prev) = prev else {
        return Hash256::zero();
    };
    let kernel = if block.is_proof_of_stake {
        block.prevout_stake.hash
    } else {
        block.block_hash
    };

    let mut writer = HashWriter::new();
    writer.write_hash(&kernel).write_u64(prev.stake_modifier_v2);
    writer.finish()
}

/// Checksum over `block`'s modifier state, chained through the parent's.
pub fn stake_modifier_checksum(block: &BlockMetadata, prev_checksum: Option<u32>) -> u32 {
    let mut writer = HashWriter::new();
    if let Some(prev) = prev_checksum {
        writer.write_u32(prev);
    }
    writer
        .write_u32(block.flags())
        .write_hash(&block.hash_proof_of_stake)
        .write_u64(block.stake_modifier_v2);
    (writer.finish().to_u256() >> 224).low_u64() as u32
}

/// Whether `checksum` agrees with the checkpoint at `height` (if any)
pub fn checkpoint_matches(params: &ChainParams, height: u32, checksum: u32) -> bool {
    params
        .modifier_checkpoint(height)
        .map_or(true, |expected| expected == checksum)
}

/// Apply the configured checkpoint policy to `checksum`
pub fn verify_checkpoint(params: &ChainParams, height: u32, checksum: u32) -> Result<(), ModifierError> {
    let Some(expected) = params.modifier_checkpoint(height) else {
        return Ok(());
    };
    if expected == checksum {
        return Ok(());
    }
    match params.checkpoint_policy {
        CheckpointPolicy::Advisory => {
            warn!(
                height,
                checksum = format_args!("{checksum:#010x}"),
                expected = format_args!("{expected:#010x}"),
                "Stake modifier checkpoint mismatch"
            );
            Ok(())
        }
        CheckpointPolicy::Enforce => Err(ModifierError::CheckpointMismatch {
            height,
            got: checksum,
            expected,
        }),
    }
}

/// Assign the modifier fields of `block`, which is being connected on top
/// of its parent in `chain`.
///
/// At and above the witness height only the V3 modifier is set. Below it
/// the V2 modifier, generation flag and checksum are set and the checksum
/// is checked against the checkpoint table.
pub fn compute_and_set_stake_modifier<C: ChainView>(
    chain: &C,
    block: &mut BlockMetadata,
    params: &ChainParams,
) -> Result<(), ModifierError> {
    let prev = parent(chain, block)?;

    if params.is_witness_enabled(block.height) {
        block.stake_modifier_v3 = compute_stake_modifier_v3(prev, block);
        return Ok(());
    }

    let outcome = compute_next_stake_modifier_v2(chain, prev, params)?;
    block.set_stake_modifier(outcome.modifier, outcome.generated);
    block.stake_modifier_checksum = stake_modifier_checksum(block, prev.map(|p| p.stake_modifier_checksum));
    verify_checkpoint(params, block.height, block.stake_modifier_checksum)
}
