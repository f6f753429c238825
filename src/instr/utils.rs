//! 指令解析通用工具函数
//!
//! Bounds-checked little-endian readers. Every reader returns the value and never
//! reads past the end of `data`; a short buffer is a `DecodeError::Truncated`.

use crate::error::DecodeError;
use solana_sdk::pubkey::Pubkey;

#[inline(always)]
pub fn read_bytes(data: &[u8], offset: usize, length: usize) -> Result<&[u8], DecodeError> {
    offset
        .checked_add(length)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| DecodeError::truncated(offset, length, data.len()))
}

#[inline(always)]
pub fn read_array<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], DecodeError> {
    let mut out = [0u8; N];
    out.copy_from_slice(read_bytes(data, offset, N)?);
    Ok(out)
}

#[inline(always)]
pub fn read_u8(data: &[u8], offset: usize) -> Result<u8, DecodeError> {
    data.get(offset).copied().ok_or_else(|| DecodeError::truncated(offset, 1, data.len()))
}

#[inline(always)]
pub fn read_u16_le(data: &[u8], offset: usize) -> Result<u16, DecodeError> {
    read_array(data, offset).map(u16::from_le_bytes)
}

#[inline(always)]
pub fn read_u32_le(data: &[u8], offset: usize) -> Result<u32, DecodeError> {
    read_array(data, offset).map(u32::from_le_bytes)
}

#[inline(always)]
pub fn read_u64_le(data: &[u8], offset: usize) -> Result<u64, DecodeError> {
    read_array(data, offset).map(u64::from_le_bytes)
}

#[inline(always)]
pub fn read_u128_le(data: &[u8], offset: usize) -> Result<u128, DecodeError> {
    read_array(data, offset).map(u128::from_le_bytes)
}

#[inline(always)]
pub fn read_i64_le(data: &[u8], offset: usize) -> Result<i64, DecodeError> {
    read_array(data, offset).map(i64::from_le_bytes)
}

/// 读取布尔值（非零即 true）
#[inline(always)]
pub fn read_bool(data: &[u8], offset: usize) -> Result<bool, DecodeError> {
    read_u8(data, offset).map(|b| b != 0)
}

#[inline(always)]
pub fn read_pubkey(data: &[u8], offset: usize) -> Result<Pubkey, DecodeError> {
    read_array::<32>(data, offset).map(Pubkey::new_from_array)
}

/// Read string with 4-byte length prefix (Borsh format)
/// Returns (string, total bytes consumed including length prefix)
pub fn read_string(data: &[u8], offset: usize) -> Result<(String, usize), DecodeError> {
    let len = read_u32_le(data, offset)? as usize;
    let body = read_bytes(data, offset + 4, len)?;
    let s = std::str::from_utf8(body).map_err(|_| DecodeError::InvalidUtf8 { offset: offset + 4 })?;
    Ok((s.to_string(), 4 + len))
}

/// 从账户列表中获取账户
#[inline(always)]
pub fn get_account(accounts: &[Pubkey], index: usize) -> Option<Pubkey> {
    accounts.get(index).copied()
}
