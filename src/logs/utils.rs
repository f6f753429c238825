//! 日志解析通用工具函数

use base64::{engine::general_purpose, Engine as _};
use memchr::memmem;
use once_cell::sync::Lazy;

const PROGRAM_DATA: &[u8] = b"Program data: ";
const INSTRUCTION_LOG: &str = "Program log: Instruction: ";

static PROGRAM_DATA_FINDER: Lazy<memmem::Finder> = Lazy::new(|| memmem::Finder::new(PROGRAM_DATA));
static INVOKE_FINDER: Lazy<memmem::Finder> = Lazy::new(|| memmem::Finder::new(b" invoke ["));

/// 从日志中提取程序数据（`Program data: <base64>`）
#[inline]
pub fn extract_program_data(log: &str) -> Option<Vec<u8>> {
    let pos = PROGRAM_DATA_FINDER.find(log.as_bytes())?;
    let data_part = &log[pos + PROGRAM_DATA.len()..];
    general_purpose::STANDARD.decode(data_part.trim()).ok()
}

/// `Program <id> invoke [<depth>]` -> (id, depth)
#[inline]
pub fn parse_invoke(log: &str) -> Option<(&str, usize)> {
    let rest = log.strip_prefix("Program ")?;
    let invoke_start = INVOKE_FINDER.find(rest.as_bytes())?;
    let program = &rest[..invoke_start];
    let depth = rest[invoke_start + 9..].strip_suffix(']')?.parse().ok()?;
    Some((program, depth))
}

/// `Program <id> success` / `Program <id> failed: ...`
#[inline]
pub fn is_program_exit(log: &str) -> bool {
    let Some((program, tail)) = log.strip_prefix("Program ").and_then(|r| r.split_once(' ')) else {
        return false;
    };
    // `Program log:` / `Program data:` lines are payload, not frames
    !program.ends_with(':') && (tail == "success" || tail.starts_with("failed"))
}

/// `Program log: Instruction: SetParams` -> `setParams`
#[inline]
pub fn instruction_log_name(log: &str) -> Option<String> {
    let name = log.strip_prefix(INSTRUCTION_LOG)?.trim();
    let mut chars = name.chars();
    let first = chars.next()?;
    Some(first.to_ascii_lowercase().to_string() + chars.as_str())
}
