//! 事件定义
//!
//! `DecodedInstruction` is the per-instruction classification produced by the
//! transaction parser; `PumpEvent` is the typed stream handed to consumers.
//! Typed events are fixed-field records: an undeclared field is a compile error,
//! a missing decoded field is a `DecodeError::MissingField` at conversion time.

use crate::accounts::BondingCurveState;
use crate::error::DecodeError;
use crate::instr::DecodedArgs;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Signature};

/// 基础元数据 - 所有事件共享的字段
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EventMetadata {
    pub signature: Signature,
    pub slot: u64,
    /// Position of the transaction in its notification (0 for log notifications)
    pub tx_index: u64,
    pub recv_us: i64,
}

/// Classification of one top-level instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedInstruction {
    /// Observed program, discriminator found in the descriptor, arguments decoded
    Matched { name: String, args: DecodedArgs, accounts: Vec<Pubkey>, program: Pubkey },
    /// Observed program, discriminator not declared
    Unknown { data: Vec<u8>, accounts: Vec<Pubkey>, program: Pubkey },
    /// Any other program; `label` is a well-known name or `"External"`
    External { program: Pubkey, label: &'static str, data: Vec<u8>, accounts: Vec<Pubkey> },
}

impl DecodedInstruction {
    pub fn name(&self) -> &str {
        match self {
            DecodedInstruction::Matched { name, .. } => name,
            DecodedInstruction::Unknown { .. } => "Unknown",
            DecodedInstruction::External { label, .. } => label,
        }
    }

    pub fn program(&self) -> &Pubkey {
        match self {
            DecodedInstruction::Matched { program, .. }
            | DecodedInstruction::Unknown { program, .. }
            | DecodedInstruction::External { program, .. } => program,
        }
    }

    pub fn accounts(&self) -> &[Pubkey] {
        match self {
            DecodedInstruction::Matched { accounts, .. }
            | DecodedInstruction::Unknown { accounts, .. }
            | DecodedInstruction::External { accounts, .. } => accounts,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, DecodedInstruction::Matched { .. })
    }
}

/// Where an event was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSource {
    Instruction,
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl TradeDirection {
    pub fn from_instruction(name: &str) -> Option<Self> {
        match name {
            "buy" => Some(TradeDirection::Buy),
            "sell" => Some(TradeDirection::Sell),
            _ => None,
        }
    }

    pub fn as_instruction(self) -> &'static str {
        match self {
            TradeDirection::Buy => "buy",
            TradeDirection::Sell => "sell",
        }
    }
}

/// New token created on the bonding curve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCreatedEvent {
    pub metadata: EventMetadata,
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub mint: Pubkey,
    pub bonding_curve: Pubkey,
    pub user: Pubkey,
    pub source: EventSource,
}

/// Buy or sell against a bonding curve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub metadata: EventMetadata,
    pub mint: Pubkey,
    pub user: Pubkey,
    pub direction: TradeDirection,
    /// Token amount (base units)
    pub amount: u64,
    /// Lamports actually moved; known only when the program's TradeEvent log was seen
    pub sol_amount: Option<u64>,
    /// `maxSolCost` for buys, `minSolOutput` for sells
    pub sol_limit: Option<u64>,
    pub observed_at: DateTime<Utc>,
    pub source: EventSource,
}

/// Bonding curve completed (liquidity ready to migrate)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveCompleteEvent {
    pub metadata: EventMetadata,
    pub mint: Pubkey,
    pub bonding_curve: Pubkey,
    pub user: Pubkey,
}

/// Outcome of one bonding-curve price lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceOutcome {
    Priced { price_sol: Decimal, state: BondingCurveState },
    /// Curve account exists but reserves are not usable yet
    NotYetPriced,
    /// Curve account not created yet
    NotInitialized,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEvent {
    pub mint: Pubkey,
    pub bonding_curve: Pubkey,
    pub outcome: PriceOutcome,
    pub observed_at: DateTime<Utc>,
}

/// 统一事件枚举
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PumpEvent {
    TokenCreated(TokenCreatedEvent),
    Trade(TradeEvent),
    CurveComplete(CurveCompleteEvent),
    Price(PriceEvent),
}

impl PumpEvent {
    pub fn mint(&self) -> &Pubkey {
        match self {
            PumpEvent::TokenCreated(e) => &e.mint,
            PumpEvent::Trade(e) => &e.mint,
            PumpEvent::CurveComplete(e) => &e.mint,
            PumpEvent::Price(e) => &e.mint,
        }
    }
}

#[inline]
fn require<T>(owner: &str, field: &str, value: Option<T>) -> Result<T, DecodeError> {
    value.ok_or_else(|| DecodeError::MissingField {
        instruction: owner.to_string(),
        field: field.to_string(),
    })
}

impl TokenCreatedEvent {
    /// From a decoded `create` instruction (strings from args, keys from bound roles)
    /// or a `CreateEvent` log (everything from fields).
    pub fn from_decoded(
        owner: &str,
        metadata: EventMetadata,
        args: &DecodedArgs,
        source: EventSource,
    ) -> Result<Self, DecodeError> {
        Ok(Self {
            metadata,
            name: require(owner, "name", args.string("name"))?.to_string(),
            symbol: require(owner, "symbol", args.string("symbol"))?.to_string(),
            uri: require(owner, "uri", args.string("uri"))?.to_string(),
            mint: require(owner, "mint", args.pubkey("mint"))?,
            bonding_curve: require(owner, "bondingCurve", args.pubkey("bondingCurve"))?,
            user: require(owner, "user", args.pubkey("user"))?,
            source,
        })
    }
}

impl TradeEvent {
    /// From a decoded `buy` / `sell` instruction.
    pub fn from_instruction(
        name: &str,
        metadata: EventMetadata,
        args: &DecodedArgs,
        observed_at: DateTime<Utc>,
    ) -> Result<Self, DecodeError> {
        let direction = require(name, "direction", TradeDirection::from_instruction(name))?;
        let sol_limit = match direction {
            TradeDirection::Buy => args.u64("maxSolCost"),
            TradeDirection::Sell => args.u64("minSolOutput"),
        };
        Ok(Self {
            metadata,
            mint: require(name, "mint", args.pubkey("mint"))?,
            user: require(name, "user", args.pubkey("user"))?,
            direction,
            amount: require(name, "amount", args.u64("amount"))?,
            sol_amount: None,
            sol_limit,
            observed_at,
            source: EventSource::Instruction,
        })
    }

    /// From a `TradeEvent` program-data log.
    pub fn from_log(
        metadata: EventMetadata,
        fields: &DecodedArgs,
        observed_at: DateTime<Utc>,
    ) -> Result<Self, DecodeError> {
        const OWNER: &str = "TradeEvent";
        let is_buy = require(OWNER, "isBuy", fields.boolean("isBuy"))?;
        Ok(Self {
            metadata,
            mint: require(OWNER, "mint", fields.pubkey("mint"))?,
            user: require(OWNER, "user", fields.pubkey("user"))?,
            direction: if is_buy { TradeDirection::Buy } else { TradeDirection::Sell },
            amount: require(OWNER, "tokenAmount", fields.u64("tokenAmount"))?,
            sol_amount: Some(require(OWNER, "solAmount", fields.u64("solAmount"))?),
            sol_limit: None,
            observed_at,
            source: EventSource::Log,
        })
    }
}

impl CurveCompleteEvent {
    pub fn from_log(metadata: EventMetadata, fields: &DecodedArgs) -> Result<Self, DecodeError> {
        const OWNER: &str = "CompleteEvent";
        Ok(Self {
            metadata,
            mint: require(OWNER, "mint", fields.pubkey("mint"))?,
            bonding_curve: require(OWNER, "bondingCurve", fields.pubkey("bondingCurve"))?,
            user: require(OWNER, "user", fields.pubkey("user"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::ArgValue;

    fn trade_args(mint: Pubkey, user: Pubkey) -> DecodedArgs {
        DecodedArgs {
            values: vec![
                ("amount".into(), ArgValue::UInt(500)),
                ("maxSolCost".into(), ArgValue::UInt(9_000)),
            ],
            roles: vec![("mint".into(), mint), ("user".into(), user)],
        }
    }

    #[test]
    fn test_trade_from_instruction() {
        let (mint, user) = (Pubkey::new_unique(), Pubkey::new_unique());
        let now = Utc::now();
        let trade =
            TradeEvent::from_instruction("buy", EventMetadata::default(), &trade_args(mint, user), now)
                .unwrap();
        assert_eq!(trade.direction, TradeDirection::Buy);
        assert_eq!(trade.mint, mint);
        assert_eq!(trade.amount, 500);
        assert_eq!(trade.sol_limit, Some(9_000));
        assert_eq!(trade.sol_amount, None);
    }

    #[test]
    fn test_trade_from_non_trade_instruction_fails() {
        let args = trade_args(Pubkey::new_unique(), Pubkey::new_unique());
        let err = TradeEvent::from_instruction("create", EventMetadata::default(), &args, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DecodeError::MissingField { field, .. } if field == "direction"));
    }

    #[test]
    fn test_created_requires_all_fields() {
        let args = DecodedArgs {
            values: vec![("name".into(), ArgValue::String("A".into()))],
            roles: vec![],
        };
        let err = TokenCreatedEvent::from_decoded(
            "create",
            EventMetadata::default(),
            &args,
            EventSource::Instruction,
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::MissingField { field, .. } if field == "symbol"));
    }

    #[test]
    fn test_decoded_instruction_accessors() {
        let program = Pubkey::new_unique();
        let ix = DecodedInstruction::External {
            program,
            label: "External",
            data: vec![],
            accounts: vec![],
        };
        assert_eq!(ix.name(), "External");
        assert_eq!(ix.program(), &program);
        assert!(!ix.is_matched());
    }
}
