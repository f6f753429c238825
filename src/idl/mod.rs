//! Interface descriptor (Anchor IDL) loader
//!
//! Loads the declarative instruction/event description of the observed program and
//! precomputes every discriminator at load time, so dispatch is a single hash lookup.

pub mod discriminator;

pub use discriminator::{
    account_discriminator, event_discriminator, instruction_discriminator, read_discriminator,
    Discriminator,
};

use crate::error::DescriptorError;
use serde::Deserialize;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

/// Bundled pump.fun IDL
pub const PUMP_FUN_IDL: &str = include_str!("../../idl/pump_fun_idl.json");

/// Semantic type of an instruction argument or event field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    U8,
    U16,
    U32,
    U64,
    U128,
    I8,
    I16,
    I32,
    I64,
    I128,
    Bool,
    /// 4-byte little-endian length prefix followed by UTF-8 bytes
    String,
    /// 32 raw bytes
    PublicKey,
}

impl ArgType {
    /// Parses an IDL `type` entry. Composite types (`defined`, `option`, `vec`, ...) are not supported.
    pub fn from_idl(value: &Value) -> Option<Self> {
        let ty = match value.as_str()? {
            "u8" => ArgType::U8,
            "u16" => ArgType::U16,
            "u32" => ArgType::U32,
            "u64" => ArgType::U64,
            "u128" => ArgType::U128,
            "i8" => ArgType::I8,
            "i16" => ArgType::I16,
            "i32" => ArgType::I32,
            "i64" => ArgType::I64,
            "i128" => ArgType::I128,
            "bool" => ArgType::Bool,
            "string" => ArgType::String,
            "publicKey" | "pubkey" => ArgType::PublicKey,
            _ => return None,
        };
        Some(ty)
    }

    /// Encoded width, `None` for length-prefixed types.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            ArgType::U8 | ArgType::I8 | ArgType::Bool => Some(1),
            ArgType::U16 | ArgType::I16 => Some(2),
            ArgType::U32 | ArgType::I32 => Some(4),
            ArgType::U64 | ArgType::I64 => Some(8),
            ArgType::U128 | ArgType::I128 => Some(16),
            ArgType::PublicKey => Some(32),
            ArgType::String => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: String,
    pub ty: ArgType,
}

/// One instruction of the observed program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionSpec {
    pub name: String,
    pub discriminator: Discriminator,
    pub args: Vec<ArgSpec>,
    /// Account role names in on-chain order
    pub accounts: Vec<String>,
}

impl InstructionSpec {
    /// Position of an account role in this instruction's calling convention.
    #[inline]
    pub fn role_index(&self, role: &str) -> Option<usize> {
        self.accounts.iter().position(|r| r == role)
    }
}

/// One event emitted through `Program data:` logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSpec {
    pub name: String,
    pub discriminator: Discriminator,
    pub fields: Vec<ArgSpec>,
}

#[derive(Debug, Clone)]
pub struct InterfaceDescriptor {
    name: String,
    program_id: Option<Pubkey>,
    instructions: Vec<InstructionSpec>,
    events: Vec<EventSpec>,
    instruction_lut: HashMap<Discriminator, usize>,
    event_lut: HashMap<Discriminator, usize>,
}

// ============================================================================
// Raw IDL shape
// ============================================================================

#[derive(Deserialize)]
struct RawIdl {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    instructions: Option<Vec<RawInstruction>>,
    #[serde(default)]
    events: Vec<RawEvent>,
    #[serde(default)]
    metadata: Option<RawMetadata>,
}

#[derive(Deserialize)]
struct RawInstruction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    accounts: Vec<RawAccount>,
    #[serde(default)]
    args: Option<Vec<RawField>>,
}

#[derive(Deserialize)]
struct RawAccount {
    name: String,
    #[serde(default)]
    accounts: Vec<RawAccount>,
}

#[derive(Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    ty: Option<Value>,
}

#[derive(Deserialize)]
struct RawEvent {
    name: String,
    #[serde(default)]
    fields: Vec<RawField>,
}

#[derive(Deserialize)]
struct RawMetadata {
    #[serde(default)]
    address: Option<String>,
}

fn flatten_accounts(raw: &[RawAccount], out: &mut Vec<String>) {
    for account in raw {
        if account.accounts.is_empty() {
            out.push(account.name.clone());
        } else {
            flatten_accounts(&account.accounts, out);
        }
    }
}

fn convert_fields(owner: &str, raw: &[RawField]) -> Result<Vec<ArgSpec>, DescriptorError> {
    raw.iter()
        .map(|field| {
            let ty_value = field.ty.as_ref().ok_or_else(|| {
                DescriptorError::Malformed(format!("`{}.{}` has no type", owner, field.name))
            })?;
            let ty = ArgType::from_idl(ty_value).ok_or_else(|| {
                DescriptorError::Malformed(format!(
                    "`{}.{}` has unrecognized type {}",
                    owner, field.name, ty_value
                ))
            })?;
            Ok(ArgSpec { name: field.name.clone(), ty })
        })
        .collect()
}

impl InterfaceDescriptor {
    /// Parses an IDL document.
    pub fn load(source: &str) -> Result<Self, DescriptorError> {
        let raw: RawIdl = serde_json::from_str(source)?;

        let raw_instructions = raw
            .instructions
            .ok_or_else(|| DescriptorError::Malformed("missing `instructions`".to_string()))?;
        if raw_instructions.is_empty() {
            return Err(DescriptorError::Malformed("`instructions` is empty".to_string()));
        }

        let mut instructions = Vec::with_capacity(raw_instructions.len());
        let mut instruction_lut = HashMap::with_capacity(raw_instructions.len());
        for (i, raw_ix) in raw_instructions.iter().enumerate() {
            let name = raw_ix
                .name
                .clone()
                .ok_or_else(|| DescriptorError::Malformed(format!("instruction #{} has no name", i)))?;
            let raw_args = raw_ix.args.as_ref().ok_or_else(|| {
                DescriptorError::Malformed(format!("instruction `{}` has no `args`", name))
            })?;
            let args = convert_fields(&name, raw_args)?;
            let mut accounts = Vec::with_capacity(raw_ix.accounts.len());
            flatten_accounts(&raw_ix.accounts, &mut accounts);

            let discriminator = instruction_discriminator(&name);
            if let Some(&prev) = instruction_lut.get(&discriminator) {
                let prev: &InstructionSpec = &instructions[prev];
                return Err(DescriptorError::Malformed(format!(
                    "instruction `{}` collides with `{}`",
                    name, prev.name
                )));
            }
            instruction_lut.insert(discriminator, instructions.len());
            instructions.push(InstructionSpec { name, discriminator, args, accounts });
        }

        let mut events = Vec::with_capacity(raw.events.len());
        let mut event_lut = HashMap::with_capacity(raw.events.len());
        for raw_event in &raw.events {
            let fields = convert_fields(&raw_event.name, &raw_event.fields)?;
            let discriminator = event_discriminator(&raw_event.name);
            if event_lut.insert(discriminator, events.len()).is_some() {
                return Err(DescriptorError::Malformed(format!(
                    "event `{}` is declared twice",
                    raw_event.name
                )));
            }
            events.push(EventSpec { name: raw_event.name.clone(), discriminator, fields });
        }

        let program_id = match raw.metadata.and_then(|m| m.address) {
            Some(address) => Some(Pubkey::from_str(&address).map_err(|e| {
                DescriptorError::Malformed(format!("invalid program address `{}`: {}", address, e))
            })?),
            None => None,
        };

        Ok(Self {
            name: raw.name.unwrap_or_default(),
            program_id,
            instructions,
            events,
            instruction_lut,
            event_lut,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DescriptorError> {
        let source = std::fs::read_to_string(path)?;
        Self::load(&source)
    }

    /// 内置 pump.fun IDL
    pub fn pump_fun() -> Result<Self, DescriptorError> {
        Self::load(PUMP_FUN_IDL)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Program address from `metadata.address`, if the IDL declares one.
    pub fn program_id(&self) -> Option<Pubkey> {
        self.program_id
    }

    pub fn instructions(&self) -> &[InstructionSpec] {
        &self.instructions
    }

    pub fn events(&self) -> &[EventSpec] {
        &self.events
    }

    /// Pure function of the name; does not require the instruction to be declared.
    #[inline]
    pub fn discriminator_for(&self, name: &str) -> Discriminator {
        instruction_discriminator(name)
    }

    #[inline]
    pub fn instruction_by_discriminator(&self, value: Discriminator) -> Option<&InstructionSpec> {
        self.instruction_lut.get(&value).map(|&i| &self.instructions[i])
    }

    pub fn instruction(&self, name: &str) -> Option<&InstructionSpec> {
        self.instructions.iter().find(|ix| ix.name == name)
    }

    #[inline]
    pub fn event_by_discriminator(&self, value: Discriminator) -> Option<&EventSpec> {
        self.event_lut.get(&value).map(|&i| &self.events[i])
    }

    /// Fails with a malformed-descriptor error unless every named instruction is declared.
    pub fn require_instructions<S: AsRef<str>>(&self, names: &[S]) -> Result<(), DescriptorError> {
        for name in names {
            let name = name.as_ref();
            if self.instruction(name).is_none() {
                return Err(DescriptorError::Malformed(format!(
                    "required instruction `{}` not declared by `{}`",
                    name, self.name
                )));
            }
        }
        Ok(())
    }
}
