//! 指令解析器模块
//!
//! Classifies a top-level instruction: the observed program is decoded against the
//! interface descriptor, everything else gets a well-known label or `"External"`.

pub mod decoder;
pub mod program_ids;
pub mod utils;

pub use decoder::{decode_fields, decode_instruction_args, ArgValue, DecodedArgs, BOUND_ROLES};
pub use utils::*;

use crate::core::events::DecodedInstruction;
use crate::error::DecodeError;
use crate::idl::{read_discriminator, InterfaceDescriptor};
use program_ids::*;
use solana_sdk::pubkey::Pubkey;

pub const EXTERNAL_LABEL: &str = "External";

/// Human-readable label for an instruction of a program other than the observed one.
///
/// Keyed on the program and the leading byte of the payload.
#[inline]
pub fn external_label(program: &Pubkey, data: &[u8]) -> &'static str {
    let tag = data.first().copied();
    if *program == COMPUTE_BUDGET_PROGRAM_ID {
        match tag {
            Some(0x02) => "ComputeBudget: Set compute unit limit",
            Some(0x03) => "ComputeBudget: Set compute unit price",
            _ => EXTERNAL_LABEL,
        }
    } else if *program == ASSOCIATED_TOKEN_PROGRAM_ID {
        match tag {
            None | Some(0x00) => "Associated Token Account: Create",
            Some(0x01) => "Associated Token Account: Create Idempotent",
            _ => EXTERNAL_LABEL,
        }
    } else if *program == SYSTEM_PROGRAM_ID {
        // system instructions are a 4-byte LE enum tag
        match tag {
            Some(0x02) => "System: Transfer",
            _ => EXTERNAL_LABEL,
        }
    } else {
        EXTERNAL_LABEL
    }
}

/// 统一的指令解析入口函数
///
/// `observed` is the program under observation; `accounts` are already resolved
/// from the message's account table.
#[inline]
pub fn classify_instruction(
    descriptor: &InterfaceDescriptor,
    observed: &Pubkey,
    program: Pubkey,
    data: &[u8],
    accounts: Vec<Pubkey>,
) -> Result<DecodedInstruction, DecodeError> {
    if program != *observed {
        return Ok(DecodedInstruction::External {
            program,
            label: external_label(&program, data),
            data: data.to_vec(),
            accounts,
        });
    }

    let Some(spec) = read_discriminator(data).and_then(|d| descriptor.instruction_by_discriminator(d))
    else {
        return Ok(DecodedInstruction::Unknown { data: data.to_vec(), accounts, program });
    };

    let args = decode_instruction_args(data, spec, &accounts)?;
    Ok(DecodedInstruction::Matched { name: spec.name.clone(), args, accounts, program })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_labels() {
        assert_eq!(
            external_label(&COMPUTE_BUDGET_PROGRAM_ID, &[2, 0, 0, 0, 0]),
            "ComputeBudget: Set compute unit limit"
        );
        assert_eq!(
            external_label(&COMPUTE_BUDGET_PROGRAM_ID, &[3, 1, 0, 0, 0, 0, 0, 0, 0]),
            "ComputeBudget: Set compute unit price"
        );
        assert_eq!(external_label(&ASSOCIATED_TOKEN_PROGRAM_ID, &[]), "Associated Token Account: Create");
        assert_eq!(
            external_label(&ASSOCIATED_TOKEN_PROGRAM_ID, &[1]),
            "Associated Token Account: Create Idempotent"
        );
        assert_eq!(external_label(&SYSTEM_PROGRAM_ID, &[2, 0, 0, 0]), "System: Transfer");
        assert_eq!(external_label(&TOKEN_PROGRAM_ID, &[3]), EXTERNAL_LABEL);
    }

    #[test]
    fn test_classify_unknown_discriminator() {
        let idl = InterfaceDescriptor::pump_fun().unwrap();
        let ix = classify_instruction(&idl, &PUMPFUN_PROGRAM_ID, PUMPFUN_PROGRAM_ID, &[0xAB; 12], vec![])
            .unwrap();
        assert!(matches!(ix, DecodedInstruction::Unknown { ref data, .. } if data.len() == 12));
    }

    #[test]
    fn test_classify_short_payload_is_unknown() {
        let idl = InterfaceDescriptor::pump_fun().unwrap();
        let ix =
            classify_instruction(&idl, &PUMPFUN_PROGRAM_ID, PUMPFUN_PROGRAM_ID, &[1, 2, 3], vec![]).unwrap();
        assert_eq!(ix.name(), "Unknown");
    }

    #[test]
    fn test_classify_other_program_is_external() {
        let idl = InterfaceDescriptor::pump_fun().unwrap();
        let ix = classify_instruction(
            &idl,
            &PUMPFUN_PROGRAM_ID,
            COMPUTE_BUDGET_PROGRAM_ID,
            &[3, 0, 0, 0, 0, 0, 0, 0, 0],
            vec![],
        )
        .unwrap();
        assert_eq!(ix.name(), "ComputeBudget: Set compute unit price");
    }

    #[test]
    fn test_classify_sell() {
        let idl = InterfaceDescriptor::pump_fun().unwrap();
        let mut data = idl.discriminator_for("sell").to_le_bytes().to_vec();
        data.extend_from_slice(&7u64.to_le_bytes());
        data.extend_from_slice(&1u64.to_le_bytes());
        let accounts: Vec<Pubkey> = (0..12).map(|_| Pubkey::new_unique()).collect();

        let ix = classify_instruction(&idl, &PUMPFUN_PROGRAM_ID, PUMPFUN_PROGRAM_ID, &data, accounts.clone())
            .unwrap();
        match ix {
            DecodedInstruction::Matched { name, args, .. } => {
                assert_eq!(name, "sell");
                assert_eq!(args.u64("amount"), Some(7));
                assert_eq!(args.u64("minSolOutput"), Some(1));
                assert_eq!(args.role("mint"), Some(accounts[2]));
            }
            other => panic!("expected sell, got {:?}", other),
        }
    }
}
