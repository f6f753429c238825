//! Transaction Parser
//!
//! Turns one notification transaction (`["<base64>", "base64"]` plus meta) into
//! per-instruction candidates. Legacy envelopes (no version tag, or `"legacy"`)
//! decode as a bincode `Transaction`; version `0` decodes as a
//! `VersionedTransaction`, with account indexes past the static keys resolved
//! against `meta.loadedAddresses` (writable first, then readonly).
//! Only top-level instructions are classified.

use crate::core::events::DecodedInstruction;
use crate::error::{DecodeError, DescriptorError, ParseError};
use crate::idl::InterfaceDescriptor;
use crate::instr::classify_instruction;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::Value;
use solana_sdk::message::compiled_instruction::CompiledInstruction;
use solana_sdk::message::VersionedMessage;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::{Transaction, VersionedTransaction};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeVersion {
    Legacy,
    V0,
}

/// `"version"` as sent by the node: `"legacy"` or a number.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum VersionTag {
    Number(u8),
    Label(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoadedAddresses {
    #[serde(default)]
    pub writable: Vec<String>,
    #[serde(default)]
    pub readonly: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMeta {
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub log_messages: Option<Vec<String>>,
    #[serde(default)]
    pub loaded_addresses: Option<LoadedAddresses>,
}

/// One entry of a block notification's `transactions` array.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    /// `[data, encoding]`
    pub transaction: Value,
    #[serde(default)]
    pub meta: Option<RawMeta>,
    #[serde(default)]
    pub version: Option<VersionTag>,
}

impl RawTransaction {
    /// Wraps serialized transaction bytes the way a `base64` notification carries them.
    pub fn from_bytes(bytes: &[u8], version: EnvelopeVersion, meta: Option<RawMeta>) -> Self {
        Self {
            transaction: Value::Array(vec![
                Value::String(general_purpose::STANDARD.encode(bytes)),
                Value::String("base64".to_string()),
            ]),
            meta,
            version: match version {
                EnvelopeVersion::Legacy => None,
                EnvelopeVersion::V0 => Some(VersionTag::Number(0)),
            },
        }
    }

    pub fn envelope_version(&self) -> Result<EnvelopeVersion, ParseError> {
        match &self.version {
            None => Ok(EnvelopeVersion::Legacy),
            Some(VersionTag::Label(label)) if label == "legacy" => Ok(EnvelopeVersion::Legacy),
            Some(VersionTag::Number(0)) => Ok(EnvelopeVersion::V0),
            Some(other) => Err(ParseError::UnsupportedEncoding(format!("version {:?}", other))),
        }
    }

    /// Decoded wire bytes.
    pub fn payload(&self) -> Result<Vec<u8>, ParseError> {
        let parts = self.transaction.as_array().ok_or_else(|| {
            ParseError::UnsupportedEncoding("expected [data, encoding] array".to_string())
        })?;
        let (data, encoding) = match parts.as_slice() {
            [Value::String(data), Value::String(encoding)] => (data, encoding.as_str()),
            _ => return Err(ParseError::MissingField("transaction")),
        };
        match encoding {
            "base64" => general_purpose::STANDARD
                .decode(data)
                .map_err(|e| ParseError::Base64(e.to_string())),
            "base58" => bs58::decode(data)
                .into_vec()
                .map_err(|e| ParseError::Base58(e.to_string())),
            other => Err(ParseError::UnsupportedEncoding(other.to_string())),
        }
    }

    /// `true` when the transaction failed on chain.
    pub fn is_failed(&self) -> bool {
        self.meta.as_ref().is_some_and(|m| m.err.is_some())
    }

    pub fn log_messages(&self) -> &[String] {
        self.meta.as_ref().and_then(|m| m.log_messages.as_deref()).unwrap_or(&[])
    }
}

/// An instruction the parser could not decode; the rest of the transaction still is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedInstruction {
    pub index: usize,
    pub error: DecodeError,
}

#[derive(Debug, Clone)]
pub struct ParsedTransaction {
    pub signature: Signature,
    pub version: EnvelopeVersion,
    pub instructions: Vec<DecodedInstruction>,
    pub skipped: Vec<SkippedInstruction>,
}

impl ParsedTransaction {
    pub fn matched(&self) -> impl Iterator<Item = &DecodedInstruction> {
        self.instructions.iter().filter(|ix| ix.is_matched())
    }
}

/// Message fields common to both envelope versions, with the full key table.
struct ResolvedMessage {
    signature: Signature,
    account_keys: Vec<Pubkey>,
    instructions: Vec<CompiledInstruction>,
}

fn parse_loaded(keys: &[String]) -> Result<Vec<Pubkey>, ParseError> {
    keys.iter()
        .map(|k| {
            Pubkey::from_str(k).map_err(|e| ParseError::Deserialize(format!("loaded address {}: {}", k, e)))
        })
        .collect()
}

fn resolve_message(
    bytes: &[u8],
    version: EnvelopeVersion,
    loaded: Option<&LoadedAddresses>,
) -> Result<ResolvedMessage, ParseError> {
    match version {
        EnvelopeVersion::Legacy => {
            let tx: Transaction =
                bincode::deserialize(bytes).map_err(|e| ParseError::Deserialize(e.to_string()))?;
            Ok(ResolvedMessage {
                signature: tx.signatures.first().copied().unwrap_or_default(),
                account_keys: tx.message.account_keys,
                instructions: tx.message.instructions,
            })
        }
        EnvelopeVersion::V0 => {
            let tx: VersionedTransaction =
                bincode::deserialize(bytes).map_err(|e| ParseError::Deserialize(e.to_string()))?;
            let signature = tx.signatures.first().copied().unwrap_or_default();
            let (mut account_keys, instructions) = match tx.message {
                VersionedMessage::V0(m) => (m.account_keys, m.instructions),
                VersionedMessage::Legacy(m) => (m.account_keys, m.instructions),
            };
            if let Some(loaded) = loaded {
                account_keys.extend(parse_loaded(&loaded.writable)?);
                account_keys.extend(parse_loaded(&loaded.readonly)?);
            }
            Ok(ResolvedMessage { signature, account_keys, instructions })
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransactionParser {
    descriptor: Arc<InterfaceDescriptor>,
    program_id: Pubkey,
}

impl TransactionParser {
    pub fn new(descriptor: Arc<InterfaceDescriptor>, program_id: Pubkey) -> Self {
        Self { descriptor, program_id }
    }

    /// Observes the program named by the descriptor's `metadata.address`.
    pub fn from_descriptor(descriptor: Arc<InterfaceDescriptor>) -> Result<Self, DescriptorError> {
        let program_id = descriptor
            .program_id()
            .ok_or_else(|| DescriptorError::Malformed("descriptor has no program address".to_string()))?;
        Ok(Self::new(descriptor, program_id))
    }

    pub fn descriptor(&self) -> &Arc<InterfaceDescriptor> {
        &self.descriptor
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn parse(&self, envelope: &RawTransaction) -> Result<ParsedTransaction, ParseError> {
        let version = envelope.envelope_version()?;
        let bytes = envelope.payload()?;
        let loaded = envelope.meta.as_ref().and_then(|m| m.loaded_addresses.as_ref());
        let message = resolve_message(&bytes, version, loaded)?;
        let keys = &message.account_keys;

        let mut instructions = Vec::with_capacity(message.instructions.len());
        let mut skipped = Vec::new();

        for (index, ix) in message.instructions.iter().enumerate() {
            match self.classify(ix, keys) {
                Ok(decoded) => instructions.push(decoded),
                Err(error) => skipped.push(SkippedInstruction { index, error }),
            }
        }

        Ok(ParsedTransaction { signature: message.signature, version, instructions, skipped })
    }

    fn classify(&self, ix: &CompiledInstruction, keys: &[Pubkey]) -> Result<DecodedInstruction, DecodeError> {
        let out_of_range = |role: &str, index: usize| DecodeError::AccountIndexOutOfRange {
            role: role.to_string(),
            index,
            len: keys.len(),
        };

        let program_index = ix.program_id_index as usize;
        let program = *keys.get(program_index).ok_or_else(|| out_of_range("program", program_index))?;

        let accounts = ix
            .accounts
            .iter()
            .map(|&i| keys.get(i as usize).copied().ok_or_else(|| out_of_range("account", i as usize)))
            .collect::<Result<Vec<_>, _>>()?;

        classify_instruction(&self.descriptor, &self.program_id, program, &ix.data, accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::program_ids::{COMPUTE_BUDGET_PROGRAM_ID, PUMPFUN_PROGRAM_ID};
    use solana_sdk::hash::Hash;
    use solana_sdk::message::{v0, Message, MessageHeader};

    fn parser() -> TransactionParser {
        TransactionParser::from_descriptor(Arc::new(InterfaceDescriptor::pump_fun().unwrap())).unwrap()
    }

    fn buy_data(amount: u64, max_sol: u64) -> Vec<u8> {
        let mut data = 16927863322537952870u64.to_le_bytes().to_vec();
        data.extend_from_slice(&amount.to_le_bytes());
        data.extend_from_slice(&max_sol.to_le_bytes());
        data
    }

    fn header() -> MessageHeader {
        MessageHeader { num_required_signatures: 1, num_readonly_signed_accounts: 0, num_readonly_unsigned_accounts: 0 }
    }

    #[test]
    fn test_legacy_transaction() {
        // keys: 0..12 buy accounts, 12 pump program, 13 compute budget
        let mut keys: Vec<Pubkey> = (0..12).map(|_| Pubkey::new_unique()).collect();
        keys.push(PUMPFUN_PROGRAM_ID);
        keys.push(COMPUTE_BUDGET_PROGRAM_ID);

        let message = Message {
            header: header(),
            account_keys: keys.clone(),
            recent_blockhash: Hash::default(),
            instructions: vec![
                CompiledInstruction::new_from_raw_parts(13, vec![2, 0x40, 0x0d, 0x03, 0x00], vec![]),
                CompiledInstruction::new_from_raw_parts(12, buy_data(1_000, 2_000), (0..12).collect()),
            ],
        };
        let signature = Signature::from([7u8; 64]);
        let tx = Transaction { signatures: vec![signature], message };
        let raw = RawTransaction::from_bytes(&bincode::serialize(&tx).unwrap(), EnvelopeVersion::Legacy, None);

        let parsed = parser().parse(&raw).unwrap();
        assert_eq!(parsed.signature, signature);
        assert_eq!(parsed.version, EnvelopeVersion::Legacy);
        assert_eq!(parsed.instructions[0].name(), "ComputeBudget: Set compute unit limit");
        match &parsed.instructions[1] {
            DecodedInstruction::Matched { name, args, .. } => {
                assert_eq!(name, "buy");
                assert_eq!(args.u64("amount"), Some(1_000));
                assert_eq!(args.role("mint"), Some(keys[2]));
            }
            other => panic!("expected buy, got {:?}", other),
        }
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn test_v0_resolves_loaded_addresses() {
        let static_keys = vec![Pubkey::new_unique(), PUMPFUN_PROGRAM_ID];
        let writable: Vec<Pubkey> = (0..10).map(|_| Pubkey::new_unique()).collect();
        let readonly = vec![Pubkey::new_unique()];

        // 0 payer(user slot), 1 program, 2..12 writable, 12 readonly
        let mut order: Vec<u8> = (2..12).collect();
        order.insert(6, 0); // user at position 6
        order.push(12);

        let message = v0::Message {
            header: header(),
            account_keys: static_keys.clone(),
            recent_blockhash: Hash::default(),
            instructions: vec![CompiledInstruction::new_from_raw_parts(1, buy_data(5, 6), order)],
            address_table_lookups: vec![],
        };
        let tx = VersionedTransaction {
            signatures: vec![Signature::from([1u8; 64])],
            message: VersionedMessage::V0(message),
        };
        let meta = RawMeta {
            loaded_addresses: Some(LoadedAddresses {
                writable: writable.iter().map(|k| k.to_string()).collect(),
                readonly: readonly.iter().map(|k| k.to_string()).collect(),
            }),
            ..Default::default()
        };
        let raw = RawTransaction::from_bytes(&bincode::serialize(&tx).unwrap(), EnvelopeVersion::V0, Some(meta));

        let parsed = parser().parse(&raw).unwrap();
        assert_eq!(parsed.version, EnvelopeVersion::V0);
        match &parsed.instructions[0] {
            DecodedInstruction::Matched { args, accounts, .. } => {
                assert_eq!(accounts.len(), 12);
                assert_eq!(args.role("mint"), Some(writable[2]));
                assert_eq!(args.role("user"), Some(static_keys[0]));
                assert_eq!(accounts[11], readonly[0]);
            }
            other => panic!("expected buy, got {:?}", other),
        }
    }

    #[test]
    fn test_unresolvable_account_is_skipped() {
        let keys = vec![Pubkey::new_unique(), PUMPFUN_PROGRAM_ID];
        let message = v0::Message {
            header: header(),
            account_keys: keys,
            recent_blockhash: Hash::default(),
            instructions: vec![
                CompiledInstruction::new_from_raw_parts(1, buy_data(1, 1), vec![0, 40]),
                CompiledInstruction::new_from_raw_parts(1, vec![9; 8], vec![0]),
            ],
            address_table_lookups: vec![],
        };
        let tx = VersionedTransaction {
            signatures: vec![Signature::from([2u8; 64])],
            message: VersionedMessage::V0(message),
        };
        let raw = RawTransaction::from_bytes(&bincode::serialize(&tx).unwrap(), EnvelopeVersion::V0, None);

        let parsed = parser().parse(&raw).unwrap();
        assert_eq!(
            parsed.skipped,
            vec![SkippedInstruction {
                index: 0,
                error: DecodeError::AccountIndexOutOfRange { role: "account".into(), index: 40, len: 2 },
            }]
        );
        assert_eq!(parsed.instructions.len(), 1);
        assert_eq!(parsed.instructions[0].name(), "Unknown");
        assert_eq!(parsed.matched().count(), 0);
    }

    #[test]
    fn test_envelope_from_notification_json() {
        let json = serde_json::json!({
            "transaction": ["AQID", "base64"],
            "meta": {"err": {"InstructionError": [0, "Custom"]}, "logMessages": ["a"], "loadedAddresses": {"writable": [], "readonly": []}},
            "version": "legacy"
        });
        let raw: RawTransaction = serde_json::from_value(json).unwrap();
        assert_eq!(raw.envelope_version(), Ok(EnvelopeVersion::Legacy));
        assert_eq!(raw.payload(), Ok(vec![1, 2, 3]));
        assert!(raw.is_failed());
        assert_eq!(raw.log_messages(), &["a".to_string()]);

        let v0: RawTransaction =
            serde_json::from_value(serde_json::json!({"transaction": ["", "base64"], "version": 0})).unwrap();
        assert_eq!(v0.envelope_version(), Ok(EnvelopeVersion::V0));
        assert!(!v0.is_failed());
    }

    #[test]
    fn test_unsupported_encoding() {
        let raw: RawTransaction =
            serde_json::from_value(serde_json::json!({"transaction": {"message": {}}})).unwrap();
        assert!(matches!(raw.payload(), Err(ParseError::UnsupportedEncoding(_))));

        let raw: RawTransaction =
            serde_json::from_value(serde_json::json!({"transaction": ["x", "jsonParsed"]})).unwrap();
        assert_eq!(raw.payload(), Err(ParseError::UnsupportedEncoding("jsonParsed".into())));
    }

    #[test]
    fn test_payload_decode_errors_name_their_encoding() {
        let raw: RawTransaction =
            serde_json::from_value(serde_json::json!({"transaction": ["0OIl", "base58"]})).unwrap();
        let err = raw.payload().unwrap_err();
        assert!(matches!(err, ParseError::Base58(_)));
        assert!(err.to_string().starts_with("failed to decode base58 payload"));

        let raw: RawTransaction =
            serde_json::from_value(serde_json::json!({"transaction": ["!!!", "base64"]})).unwrap();
        assert!(matches!(raw.payload(), Err(ParseError::Base64(_))));

        let raw: RawTransaction =
            serde_json::from_value(serde_json::json!({"transaction": ["Ldp", "base58"]})).unwrap();
        assert_eq!(raw.payload(), Ok(bs58::decode("Ldp").into_vec().unwrap()));
    }

    #[test]
    fn test_garbage_bytes_fail_to_deserialize() {
        let raw = RawTransaction::from_bytes(&[1, 2, 3], EnvelopeVersion::V0, None);
        assert!(matches!(parser().parse(&raw), Err(ParseError::Deserialize(_))));
    }
}
