//! IDL-driven argument decoder
//!
//! Layout: `[8-byte discriminator][arg 1][arg 2]...`, each argument encoded per its
//! declared [`ArgType`]. After the arguments, the account roles listed in
//! [`BOUND_ROLES`] are bound by their position in the instruction's declared
//! account order.

use super::utils::*;
use crate::error::DecodeError;
use crate::idl::{ArgSpec, ArgType, InstructionSpec};
use solana_sdk::pubkey::Pubkey;
use std::fmt;

/// Account roles lifted into named result fields when an instruction declares them.
pub const BOUND_ROLES: &[&str] = &["mint", "bondingCurve", "user"];

/// A decoded argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Bool(bool),
    UInt(u128),
    Int(i128),
    String(String),
    Pubkey(Pubkey),
}

impl ArgValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ArgValue::UInt(v) => u64::try_from(*v).ok(),
            ArgValue::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ArgValue::Int(v) => i64::try_from(*v).ok(),
            ArgValue::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_pubkey(&self) -> Option<Pubkey> {
        match self {
            ArgValue::Pubkey(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Bool(v) => write!(f, "{}", v),
            ArgValue::UInt(v) => write!(f, "{}", v),
            ArgValue::Int(v) => write!(f, "{}", v),
            ArgValue::String(v) => f.write_str(v),
            // base58, the ledger's canonical address form
            ArgValue::Pubkey(v) => write!(f, "{}", v),
        }
    }
}

/// Decoded arguments plus role-bound accounts, both in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedArgs {
    pub values: Vec<(String, ArgValue)>,
    pub roles: Vec<(String, Pubkey)>,
}

impl DecodedArgs {
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(ArgValue::as_u64)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ArgValue::as_i64)
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ArgValue::as_bool)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ArgValue::as_str)
    }

    /// Looks up a pubkey argument first, then a bound account role of the same name.
    pub fn pubkey(&self, name: &str) -> Option<Pubkey> {
        self.get(name).and_then(ArgValue::as_pubkey).or_else(|| self.role(name))
    }

    pub fn role(&self, name: &str) -> Option<Pubkey> {
        self.roles.iter().find(|(n, _)| n == name).map(|(_, k)| *k)
    }
}

/// Reads one value of type `ty` at `offset`; returns the value and bytes consumed.
pub fn read_value(data: &[u8], offset: usize, ty: ArgType) -> Result<(ArgValue, usize), DecodeError> {
    let value = match ty {
        ArgType::String => {
            let (s, consumed) = read_string(data, offset)?;
            return Ok((ArgValue::String(s), consumed));
        }
        ArgType::PublicKey => ArgValue::Pubkey(read_pubkey(data, offset)?),
        ArgType::Bool => ArgValue::Bool(read_bool(data, offset)?),
        ArgType::U8 => ArgValue::UInt(read_u8(data, offset)? as u128),
        ArgType::U16 => ArgValue::UInt(read_u16_le(data, offset)? as u128),
        ArgType::U32 => ArgValue::UInt(read_u32_le(data, offset)? as u128),
        ArgType::U64 => ArgValue::UInt(read_u64_le(data, offset)? as u128),
        ArgType::U128 => ArgValue::UInt(read_u128_le(data, offset)?),
        ArgType::I8 => ArgValue::Int(i8::from_le_bytes(read_array(data, offset)?) as i128),
        ArgType::I16 => ArgValue::Int(i16::from_le_bytes(read_array(data, offset)?) as i128),
        ArgType::I32 => ArgValue::Int(i32::from_le_bytes(read_array(data, offset)?) as i128),
        ArgType::I64 => ArgValue::Int(read_i64_le(data, offset)? as i128),
        ArgType::I128 => ArgValue::Int(i128::from_le_bytes(read_array(data, offset)?)),
    };
    // 定长类型：宽度已知
    Ok((value, ty.fixed_size().unwrap_or(0)))
}

/// Decodes `fields` in order starting at `offset`; returns the values and the end offset.
pub fn decode_fields(
    data: &[u8],
    mut offset: usize,
    fields: &[ArgSpec],
) -> Result<(Vec<(String, ArgValue)>, usize), DecodeError> {
    let mut values = Vec::with_capacity(fields.len());
    for field in fields {
        let (value, consumed) = read_value(data, offset, field.ty)?;
        offset += consumed;
        values.push((field.name.clone(), value));
    }
    Ok((values, offset))
}

/// Decodes an instruction payload (discriminator included) against its `InstructionSpec` and
/// binds the [`BOUND_ROLES`] accounts by position.
pub fn decode_instruction_args(
    payload: &[u8],
    spec: &InstructionSpec,
    accounts: &[Pubkey],
) -> Result<DecodedArgs, DecodeError> {
    if payload.len() < 8 {
        return Err(DecodeError::truncated(0, 8, payload.len()));
    }

    let (values, _end) = decode_fields(payload, 8, &spec.args)?;

    let mut roles = Vec::with_capacity(BOUND_ROLES.len());
    for role in BOUND_ROLES {
        let Some(index) = spec.role_index(role) else {
            continue;
        };
        let key = get_account(accounts, index).ok_or_else(|| DecodeError::AccountIndexOutOfRange {
            role: role.to_string(),
            index,
            len: accounts.len(),
        })?;
        roles.push((role.to_string(), key));
    }

    Ok(DecodedArgs { values, roles })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idl::InterfaceDescriptor;

    fn encode_string(out: &mut Vec<u8>, s: &str) {
        out.extend_from_slice(&(s.len() as u32).to_le_bytes());
        out.extend_from_slice(s.as_bytes());
    }

    fn accounts(n: usize) -> Vec<Pubkey> {
        (0..n).map(|_| Pubkey::new_unique()).collect()
    }

    #[test]
    fn test_create_round_trip() {
        let idl = InterfaceDescriptor::pump_fun().unwrap();
        let spec = idl.instruction("create").unwrap();

        let mut payload = spec.discriminator.to_le_bytes().to_vec();
        encode_string(&mut payload, "Doge Moon");
        encode_string(&mut payload, "DMOON");
        encode_string(&mut payload, "https://ipfs.io/ipfs/Qm");

        let accts = accounts(14);
        let args = decode_instruction_args(&payload, spec, &accts).unwrap();
        assert_eq!(args.string("name"), Some("Doge Moon"));
        assert_eq!(args.string("symbol"), Some("DMOON"));
        assert_eq!(args.string("uri"), Some("https://ipfs.io/ipfs/Qm"));
        assert_eq!(args.role("mint"), Some(accts[0]));
        assert_eq!(args.role("bondingCurve"), Some(accts[2]));
        assert_eq!(args.role("user"), Some(accts[7]));
    }

    #[test]
    fn test_buy_binds_mint_at_program_position() {
        let idl = InterfaceDescriptor::pump_fun().unwrap();
        let spec = idl.instruction("buy").unwrap();

        let mut payload = spec.discriminator.to_le_bytes().to_vec();
        payload.extend_from_slice(&1_000_000u64.to_le_bytes());
        payload.extend_from_slice(&250_000_000u64.to_le_bytes());

        let accts = accounts(12);
        let args = decode_instruction_args(&payload, spec, &accts).unwrap();
        assert_eq!(args.u64("amount"), Some(1_000_000));
        assert_eq!(args.u64("maxSolCost"), Some(250_000_000));
        assert_eq!(args.role("mint"), Some(accts[2]));
        assert_eq!(args.role("bondingCurve"), Some(accts[3]));
        assert_eq!(args.role("user"), Some(accts[6]));
    }

    #[test]
    fn test_pubkey_argument_round_trip() {
        let idl = InterfaceDescriptor::pump_fun().unwrap();
        let spec = idl.instruction("setParams").unwrap();
        let fee_recipient = Pubkey::new_unique();

        let mut payload = spec.discriminator.to_le_bytes().to_vec();
        payload.extend_from_slice(fee_recipient.as_ref());
        for v in [1u64, 2, 3, 4, 100] {
            payload.extend_from_slice(&v.to_le_bytes());
        }

        let args = decode_instruction_args(&payload, spec, &accounts(5)).unwrap();
        assert_eq!(args.pubkey("feeRecipient"), Some(fee_recipient));
        assert_eq!(
            args.get("feeRecipient").unwrap().to_string(),
            fee_recipient.to_string()
        );
        assert_eq!(args.u64("feeBasisPoints"), Some(100));
    }

    #[test]
    fn test_account_index_out_of_range() {
        let idl = InterfaceDescriptor::pump_fun().unwrap();
        let spec = idl.instruction("sell").unwrap();
        let mut payload = spec.discriminator.to_le_bytes().to_vec();
        payload.extend_from_slice(&[0u8; 16]);

        let err = decode_instruction_args(&payload, spec, &accounts(2)).unwrap_err();
        assert_eq!(
            err,
            DecodeError::AccountIndexOutOfRange { role: "mint".into(), index: 2, len: 2 }
        );
    }

    #[test]
    fn test_truncated_argument() {
        let idl = InterfaceDescriptor::pump_fun().unwrap();
        let spec = idl.instruction("buy").unwrap();
        let mut payload = spec.discriminator.to_le_bytes().to_vec();
        payload.extend_from_slice(&[1, 2, 3]);

        let err = decode_instruction_args(&payload, spec, &accounts(12)).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { offset: 8, needed: 8, remaining: 3 }));
    }

    #[test]
    fn test_invalid_utf8_string() {
        let idl = InterfaceDescriptor::pump_fun().unwrap();
        let spec = idl.instruction("create").unwrap();
        let mut payload = spec.discriminator.to_le_bytes().to_vec();
        payload.extend_from_slice(&2u32.to_le_bytes());
        payload.extend_from_slice(&[0xc3, 0x28]);

        let err = decode_instruction_args(&payload, spec, &accounts(14)).unwrap_err();
        assert_eq!(err, DecodeError::InvalidUtf8 { offset: 12 });
    }

    #[test]
    fn test_signed_and_wide_values() {
        let fields = vec![
            ArgSpec { name: "a".into(), ty: ArgType::I64 },
            ArgSpec { name: "b".into(), ty: ArgType::U128 },
            ArgSpec { name: "c".into(), ty: ArgType::I8 },
            ArgSpec { name: "d".into(), ty: ArgType::Bool },
        ];
        let mut data = (-5i64).to_le_bytes().to_vec();
        data.extend_from_slice(&(u64::MAX as u128 + 1).to_le_bytes());
        data.push(0xff);
        data.push(1);

        let (values, end) = decode_fields(&data, 0, &fields).unwrap();
        assert_eq!(end, 8 + 16 + 1 + 1);
        assert_eq!(values[0].1, ArgValue::Int(-5));
        assert_eq!(values[1].1.as_u64(), None);
        assert_eq!(values[2].1, ArgValue::Int(-1));
        assert_eq!(values[3].1, ArgValue::Bool(true));
    }
}
