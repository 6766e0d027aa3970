//! Genesis block generation
//!
//! The genesis block of a synthetic chain. It is never validated, only
//! connected, so it carries no proof of any kind.

use crate::chain::{ChainParams, Network};
use crate::crypto::Hash256;
use crate::validation::{Block, BlockHeader, Script, Transaction};

/// Compact target carried by every synthetic block.
///
/// `0xffff << 232`: a 100 coin stake at full age passes almost every
/// attempt without the weighted target wrapping.
pub const GENESIS_BITS: u32 = 0x2000_ffff;

/// Genesis timestamp per network
pub fn genesis_timestamp(network: Network) -> u32 {
    match network {
        Network::Mainnet => 1_537_971_708,
        Network::Testnet => 1_537_971_709,
        Network::Regtest => 1_537_971_710,
    }
}

/// Create the genesis block paying `value` to `script_pubkey`
pub fn create_genesis_block(params: &ChainParams, value: i64, script_pubkey: Script) -> Block {
    let coinbase = Transaction::coinbase(0, value, script_pubkey);
    let header = BlockHeader::new(
        Hash256::zero(),
        Hash256::zero(),
        genesis_timestamp(params.network),
        GENESIS_BITS,
        0,
    );
    Block::new(header, vec![coinbase])
}
