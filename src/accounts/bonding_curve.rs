//! pump.fun BondingCurve 账户解析

use crate::error::DecodeError;
use crate::instr::utils::*;
use serde::{Deserialize, Serialize};

/// BondingCurve 账户 discriminators
pub mod discriminators {
    /// `sha256("account:BondingCurve")[..8]`
    pub const BONDING_CURVE_ACCOUNT: [u8; 8] = [23, 183, 248, 55, 96, 216, 172, 96];
}

/// BondingCurve 数据大小（不含 discriminator）
pub const BONDING_CURVE_SIZE: usize = 8 * 5 + 1;

/// Reserve snapshot of one bonding curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BondingCurveState {
    pub virtual_token_reserves: u64,
    pub virtual_sol_reserves: u64,
    pub real_token_reserves: u64,
    pub real_sol_reserves: u64,
    pub token_total_supply: u64,
    pub complete: bool,
}

/// 解析 BondingCurve 账户
///
/// Bytes after the fixed layout (newer program versions append fields) are ignored.
pub fn decode_curve_state(blob: &[u8]) -> Result<BondingCurveState, DecodeError> {
    let found: [u8; 8] = read_array(blob, 0)?;
    if found != discriminators::BONDING_CURVE_ACCOUNT {
        return Err(DecodeError::DiscriminatorMismatch {
            expected: discriminators::BONDING_CURVE_ACCOUNT,
            found,
        });
    }

    let data = &blob[8..];
    if data.len() < BONDING_CURVE_SIZE {
        return Err(DecodeError::truncated(8, BONDING_CURVE_SIZE, blob.len()));
    }

    let mut offset = 0;
    let virtual_token_reserves = read_u64_le(data, offset)?;
    offset += 8;
    let virtual_sol_reserves = read_u64_le(data, offset)?;
    offset += 8;
    let real_token_reserves = read_u64_le(data, offset)?;
    offset += 8;
    let real_sol_reserves = read_u64_le(data, offset)?;
    offset += 8;
    let token_total_supply = read_u64_le(data, offset)?;
    offset += 8;
    let complete = read_bool(data, offset)?;

    Ok(BondingCurveState {
        virtual_token_reserves,
        virtual_sol_reserves,
        real_token_reserves,
        real_sol_reserves,
        token_total_supply,
        complete,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idl::account_discriminator;
    use borsh::BorshSerialize;

    #[derive(BorshSerialize)]
    struct RawCurve {
        vtok: u64,
        vsol: u64,
        rtok: u64,
        rsol: u64,
        supply: u64,
        complete: bool,
    }

    fn blob(curve: &RawCurve) -> Vec<u8> {
        let mut out = discriminators::BONDING_CURVE_ACCOUNT.to_vec();
        curve.serialize(&mut out).unwrap();
        out
    }

    #[test]
    fn test_discriminator_constant() {
        assert_eq!(discriminators::BONDING_CURVE_ACCOUNT, account_discriminator("BondingCurve"));
    }

    #[test]
    fn test_decode_curve_state() {
        let raw = RawCurve {
            vtok: 1_073_000_000_000_000,
            vsol: 30_000_000_000,
            rtok: 793_100_000_000_000,
            rsol: 0,
            supply: 1_000_000_000_000_000,
            complete: false,
        };
        let state = decode_curve_state(&blob(&raw)).unwrap();
        assert_eq!(state.virtual_token_reserves, raw.vtok);
        assert_eq!(state.virtual_sol_reserves, raw.vsol);
        assert_eq!(state.real_token_reserves, raw.rtok);
        assert_eq!(state.real_sol_reserves, 0);
        assert_eq!(state.token_total_supply, raw.supply);
        assert!(!state.complete);
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let raw = RawCurve { vtok: 1, vsol: 2, rtok: 3, rsol: 4, supply: 5, complete: true };
        let mut data = blob(&raw);
        data.extend_from_slice(&[0xEE; 32]);
        let state = decode_curve_state(&data).unwrap();
        assert!(state.complete);
        assert_eq!(state.token_total_supply, 5);
    }

    #[test]
    fn test_short_blob() {
        let raw = RawCurve { vtok: 1, vsol: 2, rtok: 3, rsol: 4, supply: 5, complete: true };
        let data = blob(&raw);
        assert!(matches!(
            decode_curve_state(&data[..30]),
            Err(DecodeError::Truncated { offset: 8, needed: BONDING_CURVE_SIZE, .. })
        ));
        assert!(matches!(decode_curve_state(&data[..4]), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_wrong_discriminator() {
        let mut data = vec![0u8; 8 + BONDING_CURVE_SIZE];
        data[0] = 1;
        assert!(matches!(
            decode_curve_state(&data),
            Err(DecodeError::DiscriminatorMismatch { .. })
        ));
    }
}
