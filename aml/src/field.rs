// aml/src/field.rs
//
// 役割:
// - Field / IndexField の要素が持つ「アクセス規則」と「ビット位置」を表現する。
// - バッファに対するビット単位の読み書き（BufferField / Field 共通）を提供する。
//
// やること:
// - アクセス規則 byte の decode（4bit access type / 1bit lock / 2bit update rule）。
// - access width ごとの自然境界アクセス単位への分割計算。
//
// やらないこと:
// - OpRegion への実アクセス（interp/field.rs が RegionHandler 経由で行う）。

use alloc::vec;
use alloc::vec::Vec;

use crate::error::{AmlError, AmlResult};

bitflags::bitflags! {
    /// Field 定義の先頭 1 byte
    ///
    /// - ACCESS_TYPE: bit3-0（AccessType）
    /// - LOCK: bit4（Global Lock を取るか）
    /// - UPDATE_RULE: bit6-5（UpdateRule）
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FieldFlags: u8 {
        const ACCESS_TYPE = 0x0F;
        const LOCK = 1 << 4;
        const UPDATE_RULE = 0b11 << 5;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessType {
    Any,
    Byte,
    Word,
    DWord,
    QWord,
    Buffer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateRule {
    Preserve,
    WriteAsOnes,
    WriteAsZeros,
}

impl AccessType {
    pub fn from_raw(raw: u8) -> AmlResult<Self> {
        match raw & 0x0F {
            0 => Ok(AccessType::Any),
            1 => Ok(AccessType::Byte),
            2 => Ok(AccessType::Word),
            3 => Ok(AccessType::DWord),
            4 => Ok(AccessType::QWord),
            5 => Ok(AccessType::Buffer),
            other => Err(AmlError::UnsupportedAccessWidth(other)),
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            AccessType::Any => 0,
            AccessType::Byte => 1,
            AccessType::Word => 2,
            AccessType::DWord => 3,
            AccessType::QWord => 4,
            AccessType::Buffer => 5,
        }
    }

    /// 1 回のハードウェアアクセスの bit 幅
    pub fn width_bits(self) -> usize {
        match self {
            AccessType::Any | AccessType::Byte | AccessType::Buffer => 8,
            AccessType::Word => 16,
            AccessType::DWord => 32,
            AccessType::QWord => 64,
        }
    }
}

impl FieldFlags {
    pub fn from_raw(raw: u8) -> Self {
        FieldFlags::from_bits_retain(raw)
    }

    pub fn access_type(self) -> AmlResult<AccessType> {
        AccessType::from_raw(self.bits() & FieldFlags::ACCESS_TYPE.bits())
    }

    pub fn update_rule(self) -> UpdateRule {
        match (self.bits() & FieldFlags::UPDATE_RULE.bits()) >> 5 {
            1 => UpdateRule::WriteAsOnes,
            2 => UpdateRule::WriteAsZeros,
            // 3 は予約。Preserve として扱う
            _ => UpdateRule::Preserve,
        }
    }

    pub fn lock(self) -> bool {
        self.contains(FieldFlags::LOCK)
    }

    /// AccessField による access type の差し替え（lock / update rule は維持）
    pub fn with_access_type(self, access: AccessType) -> Self {
        let kept = self.bits() & !FieldFlags::ACCESS_TYPE.bits();
        FieldFlags::from_bits_retain(kept | access.raw())
    }
}

/// 自然境界に揃えたアクセス単位 1 個分
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessUnit {
    /// region 先頭からの byte offset（width 境界に揃っている）
    pub byte_offset: u64,
    /// この単位の中で field が占める最下位 bit
    pub shift: usize,
    /// この単位の中で field が占める bit 数
    pub bits: usize,
    /// field 全体の中でのこの単位の開始 bit
    pub field_bit: usize,
}

/// [bit_offset, bit_offset + bit_count) を width_bits ごとのアクセス単位に分割する
pub fn access_units(bit_offset: usize, bit_count: usize, width_bits: usize) -> Vec<AccessUnit> {
    let mut units = Vec::new();
    let end = bit_offset + bit_count;
    let mut pos = bit_offset;

    while pos < end {
        let unit_start = pos - (pos % width_bits);
        let shift = pos - unit_start;
        let bits = core::cmp::min(width_bits - shift, end - pos);
        units.push(AccessUnit {
            byte_offset: (unit_start / 8) as u64,
            shift,
            bits,
            field_bit: pos - bit_offset,
        });
        pos += bits;
    }
    units
}

/// bits 本の 1 を下位から並べたマスク（64 まで）
pub fn low_mask(bits: usize) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// bytes の [bit_offset, bit_offset + bit_count) を取り出して LSB 詰めのバッファで返す。
/// 範囲外の bit は 0 として読む。
pub fn read_bits(bytes: &[u8], bit_offset: usize, bit_count: usize) -> Vec<u8> {
    let mut out = vec![0u8; (bit_count + 7) / 8];
    for i in 0..bit_count {
        let src = bit_offset + i;
        let byte = bytes.get(src / 8).copied().unwrap_or(0);
        if (byte >> (src % 8)) & 1 != 0 {
            out[i / 8] |= 1 << (i % 8);
        }
    }
    out
}

/// src（LSB 詰め）の下位 bit_count bit を bytes の bit_offset 以降へ書き込む。
/// src が短ければ残りは 0、bytes をはみ出す分は捨てる。
pub fn write_bits(bytes: &mut [u8], bit_offset: usize, bit_count: usize, src: &[u8]) {
    for i in 0..bit_count {
        let dst = bit_offset + i;
        if dst / 8 >= bytes.len() {
            break;
        }
        let bit = src.get(i / 8).map(|b| (b >> (i % 8)) & 1).unwrap_or(0);
        if bit != 0 {
            bytes[dst / 8] |= 1 << (dst % 8);
        } else {
            bytes[dst / 8] &= !(1 << (dst % 8));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_rule_byte_decodes() {
        // DWordAcc, Lock, WriteAsZeros
        let flags = FieldFlags::from_raw(0x53);
        assert_eq!(flags.access_type().unwrap(), AccessType::DWord);
        assert!(flags.lock());
        assert_eq!(flags.update_rule(), UpdateRule::WriteAsZeros);

        let byte_acc = flags.with_access_type(AccessType::Byte);
        assert_eq!(byte_acc.access_type().unwrap(), AccessType::Byte);
        assert_eq!(byte_acc.update_rule(), UpdateRule::WriteAsZeros);
    }

    #[test]
    fn units_split_on_width_boundaries() {
        // bit 4..20 を byte 単位で読む → [4..8), [8..16), [16..20)
        let units = access_units(4, 16, 8);
        assert_eq!(units.len(), 3);
        assert_eq!(units[0], AccessUnit { byte_offset: 0, shift: 4, bits: 4, field_bit: 0 });
        assert_eq!(units[1], AccessUnit { byte_offset: 1, shift: 0, bits: 8, field_bit: 4 });
        assert_eq!(units[2], AccessUnit { byte_offset: 2, shift: 0, bits: 4, field_bit: 12 });

        // DWord 幅なら 1 単位に収まる
        let dword = access_units(4, 16, 32);
        assert_eq!(dword, vec![AccessUnit { byte_offset: 0, shift: 4, bits: 16, field_bit: 0 }]);
    }

    #[test]
    fn bit_window_read_and_write() {
        let mut bytes = [0xF0u8, 0x0F];
        assert_eq!(read_bits(&bytes, 4, 8), vec![0xFF]);

        write_bits(&mut bytes, 4, 8, &[0x00]);
        assert_eq!(bytes, [0x00, 0x00]);

        write_bits(&mut bytes, 3, 2, &[0b11]);
        assert_eq!(bytes, [0b0001_1000, 0x00]);
    }

    #[test]
    fn low_mask_edges() {
        assert_eq!(low_mask(0), 0);
        assert_eq!(low_mask(8), 0xFF);
        assert_eq!(low_mask(64), u64::MAX);
    }
}
