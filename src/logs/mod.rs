//! Log parser module
//!
//! Walks a transaction's log lines keeping the invoke stack, so `Program data:`
//! and `Program log: Instruction:` lines are attributed to the program that
//! emitted them. Event payloads are `[8-byte event discriminator][fields...]`,
//! decoded against the descriptor's event definitions.

pub mod utils;

pub use utils::{extract_program_data, instruction_log_name, is_program_exit, parse_invoke};

use crate::error::DecodeError;
use crate::idl::{read_discriminator, InterfaceDescriptor};
use crate::instr::{decode_fields, DecodedArgs};

/// One decoded program event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub name: String,
    pub fields: DecodedArgs,
}

/// Everything the observed program logged in one transaction.
#[derive(Debug, Default)]
pub struct ProgramLogs {
    /// Instruction names from `Program log: Instruction: <Name>`, camelCased
    pub instructions: Vec<String>,
    pub events: Vec<LogEvent>,
    /// `Program data:` payloads that failed to decode
    pub errors: Vec<DecodeError>,
}

impl ProgramLogs {
    pub fn mentions_any<S: AsRef<str>>(&self, names: &[S]) -> bool {
        self.instructions.iter().any(|ix| names.iter().any(|n| n.as_ref() == ix))
    }
}

/// Decodes one `Program data:` payload. `Ok(None)` for events the descriptor does not declare.
pub fn decode_program_data(
    descriptor: &InterfaceDescriptor,
    data: &[u8],
) -> Result<Option<LogEvent>, DecodeError> {
    let Some(spec) = read_discriminator(data).and_then(|d| descriptor.event_by_discriminator(d))
    else {
        return Ok(None);
    };
    let (values, _end) = decode_fields(data, 8, &spec.fields)?;
    Ok(Some(LogEvent { name: spec.name.clone(), fields: DecodedArgs { values, roles: Vec::new() } }))
}

/// Collects the instruction names and events logged by `program` (base58).
pub fn scan_program_logs<S: AsRef<str>>(
    descriptor: &InterfaceDescriptor,
    program: &str,
    logs: &[S],
) -> ProgramLogs {
    let mut out = ProgramLogs::default();
    let mut stack: Vec<&str> = Vec::with_capacity(4);

    for log in logs {
        let log = log.as_ref();
        if let Some((invoked, _depth)) = parse_invoke(log) {
            stack.push(invoked);
            continue;
        }
        if is_program_exit(log) {
            stack.pop();
            continue;
        }
        if stack.last() != Some(&program) {
            continue;
        }

        if let Some(name) = instruction_log_name(log) {
            out.instructions.push(name);
        } else if let Some(data) = extract_program_data(log) {
            match decode_program_data(descriptor, &data) {
                Ok(Some(event)) => out.events.push(event),
                Ok(None) => {}
                Err(e) => out.errors.push(e),
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idl::event_discriminator;
    use base64::{engine::general_purpose, Engine as _};
    use solana_sdk::pubkey::Pubkey;

    const PUMP: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";

    fn trade_event_payload(mint: Pubkey, sol: u64, tokens: u64, is_buy: bool) -> Vec<u8> {
        let mut data = event_discriminator("TradeEvent").to_le_bytes().to_vec();
        data.extend_from_slice(mint.as_ref());
        data.extend_from_slice(&sol.to_le_bytes());
        data.extend_from_slice(&tokens.to_le_bytes());
        data.push(is_buy as u8);
        data.extend_from_slice(Pubkey::new_unique().as_ref());
        data.extend_from_slice(&1_700_000_000i64.to_le_bytes());
        data.extend_from_slice(&30_000_000_000u64.to_le_bytes());
        data.extend_from_slice(&1_000_000_000_000u64.to_le_bytes());
        data
    }

    fn data_line(payload: &[u8]) -> String {
        format!("Program data: {}", general_purpose::STANDARD.encode(payload))
    }

    #[test]
    fn test_scan_attributes_data_to_observed_program() {
        let idl = InterfaceDescriptor::pump_fun().unwrap();
        let mint = Pubkey::new_unique();
        let logs = vec![
            "Program ComputeBudget111111111111111111111111111111 invoke [1]".to_string(),
            "Program ComputeBudget111111111111111111111111111111 success".to_string(),
            format!("Program {} invoke [1]", PUMP),
            "Program log: Instruction: Buy".to_string(),
            "Program 11111111111111111111111111111111 invoke [2]".to_string(),
            // emitted by the inner program, not ours
            data_line(&trade_event_payload(Pubkey::new_unique(), 1, 1, false)),
            "Program 11111111111111111111111111111111 success".to_string(),
            data_line(&trade_event_payload(mint, 5_000_000, 42, true)),
            format!("Program {} consumed 30000 of 200000 compute units", PUMP),
            format!("Program {} success", PUMP),
        ];

        let scanned = scan_program_logs(&idl, PUMP, &logs);
        assert_eq!(scanned.instructions, vec!["buy"]);
        assert!(scanned.mentions_any(&["buy", "sell"]));
        assert!(!scanned.mentions_any(&["create"]));
        assert_eq!(scanned.events.len(), 1);

        let event = &scanned.events[0];
        assert_eq!(event.name, "TradeEvent");
        assert_eq!(event.fields.pubkey("mint"), Some(mint));
        assert_eq!(event.fields.u64("solAmount"), Some(5_000_000));
        assert_eq!(event.fields.boolean("isBuy"), Some(true));
        assert_eq!(event.fields.i64("timestamp"), Some(1_700_000_000));
    }

    #[test]
    fn test_truncated_event_reported() {
        let idl = InterfaceDescriptor::pump_fun().unwrap();
        let mut payload = trade_event_payload(Pubkey::new_unique(), 1, 1, true);
        payload.truncate(40);
        let logs = vec![
            format!("Program {} invoke [1]", PUMP),
            data_line(&payload),
            format!("Program {} success", PUMP),
        ];
        let scanned = scan_program_logs(&idl, PUMP, &logs);
        assert!(scanned.events.is_empty());
        assert!(matches!(scanned.errors[0], DecodeError::Truncated { .. }));
    }

    #[test]
    fn test_undeclared_event_ignored() {
        let idl = InterfaceDescriptor::pump_fun().unwrap();
        assert_eq!(decode_program_data(&idl, &[0u8; 16]), Ok(None));
        assert_eq!(decode_program_data(&idl, &[1, 2]), Ok(None));
    }
}
