//! Anchor discriminators
//!
//! `sha256("<namespace>:<name>")[..8]`, compared as a little-endian `u64`.
//! Instruction names are hashed in snake_case (`setParams` -> `global:set_params`),
//! event and account names are hashed verbatim.

use sha2::{Digest, Sha256};

/// Discriminator type alias for clarity
pub type Discriminator = u64;

pub const INSTRUCTION_NAMESPACE: &str = "global";
pub const EVENT_NAMESPACE: &str = "event";
pub const ACCOUNT_NAMESPACE: &str = "account";

/// 8 字节 sighash
#[inline]
pub fn sighash(namespace: &str, name: &str) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b":");
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();

    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

#[inline]
pub fn instruction_discriminator(name: &str) -> Discriminator {
    u64::from_le_bytes(sighash(INSTRUCTION_NAMESPACE, &to_snake_case(name)))
}

#[inline]
pub fn event_discriminator(name: &str) -> Discriminator {
    u64::from_le_bytes(sighash(EVENT_NAMESPACE, name))
}

#[inline]
pub fn account_discriminator(name: &str) -> [u8; 8] {
    sighash(ACCOUNT_NAMESPACE, name)
}

/// Reads the leading 8 bytes of a payload as a discriminator.
#[inline]
pub fn read_discriminator(data: &[u8]) -> Option<Discriminator> {
    let head: [u8; 8] = data.get(..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(head))
}

/// camelCase / PascalCase -> snake_case, matching how Anchor derives instruction sighashes.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower_or_digit = false;
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower_or_digit {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower_or_digit = false;
        } else {
            prev_lower_or_digit = ch.is_ascii_lowercase() || ch.is_ascii_digit();
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_pump_discriminators() {
        assert_eq!(instruction_discriminator("create"), 8576854823835016728);
        assert_eq!(instruction_discriminator("buy"), 16927863322537952870);
        assert_eq!(instruction_discriminator("sell"), 12502976635542562355);
        assert_eq!(
            u64::from_le_bytes(account_discriminator("BondingCurve")),
            6966180631402821399
        );
    }

    #[test]
    fn test_byte_layout_matches_wire() {
        assert_eq!(sighash("global", "create"), [24, 30, 200, 40, 5, 28, 7, 119]);
        assert_eq!(sighash("global", "buy"), [102, 6, 61, 18, 1, 218, 235, 234]);
        assert_eq!(sighash("event", "CreateEvent"), [27, 114, 169, 77, 222, 235, 99, 118]);
        assert_eq!(sighash("event", "TradeEvent"), [189, 219, 127, 211, 78, 230, 97, 238]);
    }

    #[test]
    fn test_camel_case_instruction_is_hashed_snake_case() {
        assert_eq!(to_snake_case("setParams"), "set_params");
        assert_eq!(to_snake_case("create"), "create");
        assert_eq!(to_snake_case("buyExactSolIn"), "buy_exact_sol_in");
        assert_eq!(
            instruction_discriminator("setParams").to_le_bytes(),
            [27, 234, 178, 52, 147, 2, 187, 141]
        );
    }

    #[test]
    fn test_discriminator_is_stable() {
        for name in ["create", "buy", "sell", "withdraw", "setParams"] {
            assert_eq!(instruction_discriminator(name), instruction_discriminator(name));
        }
    }

    #[test]
    fn test_read_discriminator() {
        let mut data = sighash("global", "sell").to_vec();
        data.extend_from_slice(&[1, 2, 3]);
        assert_eq!(read_discriminator(&data), Some(12502976635542562355));
        assert_eq!(read_discriminator(&data[..7]), None);
    }
}
