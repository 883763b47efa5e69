// aml/src/object/convert.rs
//
// 役割:
// - Object 間の暗黙変換 / store / copy / 比較の規則を 1 箇所に集約する。
//
// やること:
// - convert(mask): 受け入れ可能な型のマスクを受け取り、優先順
//   Integer → Buffer → BufferField → FieldUnit → String で最初に成立した表現を返す。
// - store_value(): 格納先自身の型へ変換して in-place 更新し、格納後の値を返す。
// - copy(): by-value セマンティクス用の複製（定数フラグは落とす）。
//
// やらないこと:
// - FieldElement の実アクセス（RegionHandler が要るので interp 側。ここでは FieldAccessRequired）。
//
// 変換規則:
// - Integer → Buffer: 8 byte little-endian
// - Integer → String: 16 桁の大文字 16 進
// - Buffer → Integer: 先頭 8 byte まで little-endian
// - String → Integer: 先頭の 16 進数字列
// - Buffer → String: 2 桁 16 進を空白区切り
// - String → Buffer: ASCII + NUL

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt::Write;

use super::{new_ref, BufferField, Integer, Object, PackageElement};
use crate::error::{AmlError, AmlResult};
use crate::field::{read_bits, write_bits};

bitflags::bitflags! {
    /// 呼び出し側が受け入れられる変換結果の集合
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ConvertMask: u8 {
        const INTEGER = 1 << 0;
        const BUFFER = 1 << 1;
        const BUFFER_FIELD = 1 << 2;
        const FIELD_UNIT = 1 << 3;
        const STRING = 1 << 4;
    }
}

impl Object {
    pub fn convert(&self, mask: ConvertMask) -> AmlResult<Object> {
        match self {
            Object::Reference(target) => target.lock().convert(mask),

            Object::Integer(i) => {
                if mask.contains(ConvertMask::INTEGER) {
                    Ok(Object::integer(i.value))
                } else if mask.contains(ConvertMask::BUFFER) {
                    Ok(Object::Buffer(i.value.to_le_bytes().to_vec()))
                } else if mask.contains(ConvertMask::STRING) {
                    let mut s = String::with_capacity(16);
                    let _ = write!(s, "{:016X}", i.value);
                    Ok(Object::String(s))
                } else {
                    Err(AmlError::IncompatibleType(self.object_type()))
                }
            }

            Object::Buffer(bytes) => {
                if mask.contains(ConvertMask::INTEGER) {
                    Ok(Object::integer(buffer_to_integer(bytes)))
                } else if mask.contains(ConvertMask::BUFFER) {
                    Ok(Object::Buffer(bytes.clone()))
                } else if mask.contains(ConvertMask::STRING) {
                    Ok(Object::String(buffer_to_hex_string(bytes, " ")))
                } else {
                    Err(AmlError::IncompatibleType(self.object_type()))
                }
            }

            Object::String(s) => {
                if mask.contains(ConvertMask::INTEGER) {
                    Ok(Object::integer(parse_hex_prefix(s)))
                } else if mask.contains(ConvertMask::BUFFER) {
                    let mut bytes: Vec<u8> = s.as_bytes().to_vec();
                    bytes.push(0);
                    Ok(Object::Buffer(bytes))
                } else if mask.contains(ConvertMask::STRING) {
                    Ok(Object::String(s.clone()))
                } else {
                    Err(AmlError::IncompatibleType(self.object_type()))
                }
            }

            Object::BufferField(field) => {
                if mask.contains(ConvertMask::BUFFER_FIELD)
                    && !mask.intersects(ConvertMask::INTEGER | ConvertMask::BUFFER)
                {
                    return Ok(self.clone());
                }
                field.read()?.convert(mask)
            }

            Object::FieldElement(_) | Object::IndexFieldElement(_) => {
                if mask.contains(ConvertMask::FIELD_UNIT)
                    && !mask.intersects(ConvertMask::INTEGER | ConvertMask::BUFFER | ConvertMask::BUFFER_FIELD)
                {
                    return Ok(self.clone());
                }
                Err(AmlError::FieldAccessRequired)
            }

            other => Err(AmlError::IncompatibleType(other.object_type())),
        }
    }

    /// Integer として読む（算術 / 論理演算の operand 用）
    pub fn to_integer(&self) -> AmlResult<u64> {
        match self.convert(ConvertMask::INTEGER)? {
            Object::Integer(i) => Ok(i.value),
            other => Err(AmlError::IncompatibleType(other.object_type())),
        }
    }

    pub fn to_buffer(&self) -> AmlResult<Vec<u8>> {
        match self.convert(ConvertMask::BUFFER)? {
            Object::Buffer(bytes) => Ok(bytes),
            other => Err(AmlError::IncompatibleType(other.object_type())),
        }
    }

    pub fn to_aml_string(&self) -> AmlResult<String> {
        match self.convert(ConvertMask::STRING)? {
            Object::String(s) => Ok(s),
            other => Err(AmlError::IncompatibleType(other.object_type())),
        }
    }

    /// by-value 複製。Package は要素ごとに新しい node を作る。Reference は共有のまま。
    pub fn copy(&self) -> Object {
        match self {
            Object::Integer(i) => Object::integer(i.value),
            Object::Package(elements) => Object::Package(
                elements
                    .iter()
                    .map(|e| match e {
                        PackageElement::Value(v) => {
                            let copied = v.lock().copy();
                            PackageElement::Value(new_ref(copied))
                        }
                        deferred => deferred.clone(),
                    })
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// 格納先（self）の型へ value を変換して in-place 更新する。戻り値は格納後の値。
    pub fn store_value(&mut self, value: &Object) -> AmlResult<Object> {
        if self.is_constant() {
            log::error!("(AML) store into constant {:?} rejected", self);
            return Err(AmlError::StoreToConstant);
        }

        match self {
            Object::Reference(target) => {
                let target = target.clone();
                let result = target.lock().store_value(value);
                result
            }

            Object::Integer(i) => {
                let v = value.to_integer()?;
                *i = Integer::new(v);
                Ok(Object::integer(v))
            }

            Object::String(s) => {
                let v = value.to_aml_string()?;
                *s = v.clone();
                Ok(Object::String(v))
            }

            Object::Buffer(bytes) => {
                let mut v = value.to_buffer()?;
                v.resize(bytes.len(), 0);
                *bytes = v.clone();
                Ok(Object::Buffer(v))
            }

            Object::BufferField(field) => field.write(value),

            Object::FieldElement(_) | Object::IndexFieldElement(_) => Err(AmlError::FieldAccessRequired),

            Object::Debug => {
                log::info!("(AML) Debug = {:?}", value);
                Ok(value.copy())
            }

            Object::Uninitialized | Object::Package(_) => {
                *self = value.copy();
                Ok(value.copy())
            }

            other => Err(AmlError::InvalidStoreTarget(other.object_type())),
        }
    }

    /// LEqual / LGreater / LLess の比較。左辺の型で意味が決まる。
    pub fn compare(&self, rhs: &Object) -> AmlResult<Ordering> {
        match self {
            Object::Reference(target) => {
                let lhs = target.lock().clone();
                lhs.compare(rhs)
            }
            Object::Integer(i) => Ok(i.value.cmp(&rhs.to_integer()?)),
            Object::String(s) => {
                let r = rhs.to_aml_string()?;
                Ok(s.as_bytes().cmp(r.as_bytes()))
            }
            Object::Buffer(bytes) => {
                let r = rhs.to_buffer()?;
                Ok(bytes.as_slice().cmp(r.as_slice()))
            }
            Object::BufferField(field) => field.read()?.compare(rhs),
            other => Err(AmlError::NoOrdering(other.object_type())),
        }
    }
}

impl BufferField {
    /// 64bit 以下なら Integer、それより広ければ Buffer。String の上の窓（Index）も読める。
    pub fn read(&self) -> AmlResult<Object> {
        let bits = {
            let buffer = self.buffer.lock();
            let bytes = match &*buffer {
                Object::Buffer(bytes) => bytes.as_slice(),
                Object::String(s) => s.as_bytes(),
                other => return Err(AmlError::IncompatibleType(other.object_type())),
            };
            read_bits(bytes, self.bit_offset, self.bit_count)
        };
        if self.bit_count <= 64 {
            Ok(Object::integer(buffer_to_integer(&bits)))
        } else {
            Ok(Object::Buffer(bits))
        }
    }

    pub fn write(&self, value: &Object) -> AmlResult<Object> {
        let src = to_field_bytes(value)?;

        {
            let mut buffer = self.buffer.lock();
            match &mut *buffer {
                Object::Buffer(bytes) => {
                    self.check_window(bytes.len())?;
                    write_bits(bytes, self.bit_offset, self.bit_count, &src);
                }
                Object::String(s) => {
                    self.check_window(s.len())?;
                    let mut bytes = s.as_bytes().to_vec();
                    write_bits(&mut bytes, self.bit_offset, self.bit_count, &src);
                    if let Some(&b) = bytes.iter().find(|b| !b.is_ascii()) {
                        return Err(AmlError::NonAsciiString(b));
                    }
                    *s = bytes.iter().map(|&b| b as char).collect();
                }
                other => return Err(AmlError::IncompatibleType(other.object_type())),
            }
        }
        self.read()
    }

    /// 窓 [bit_offset, bit_offset + bit_count) が len byte に収まるか
    fn check_window(&self, len: usize) -> AmlResult<()> {
        let end = self.bit_offset.checked_add(self.bit_count);
        match end {
            Some(end) if end / 8 + usize::from(end % 8 != 0) <= len => Ok(()),
            _ => {
                log::error!("(AML) buffer field at bit {} outside {} byte buffer", self.bit_offset, len);
                let index = end.map_or(u64::MAX, |end| (end / 8) as u64);
                Err(AmlError::IndexOutOfBounds { index, len })
            }
        }
    }
}

/// Field / BufferField に書く値の byte 列。Buffer / String はそのまま、それ以外は Integer にしてから。
pub fn to_field_bytes(value: &Object) -> AmlResult<Vec<u8>> {
    match value {
        Object::Buffer(bytes) => Ok(bytes.clone()),
        Object::String(s) => Ok(s.as_bytes().to_vec()),
        other => match other.convert(ConvertMask::INTEGER)? {
            Object::Integer(i) => Ok(i.value.to_le_bytes().to_vec()),
            converted => Err(AmlError::IncompatibleType(converted.object_type())),
        },
    }
}

/// 先頭 8 byte までを little-endian で Integer にする
pub fn buffer_to_integer(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    let n = core::cmp::min(8, bytes.len());
    raw[..n].copy_from_slice(&bytes[..n]);
    u64::from_le_bytes(raw)
}

/// 先頭の 16 進数字列を読む（"0x" は付かない前提、途中で止まる）
pub fn parse_hex_prefix(s: &str) -> u64 {
    let mut value: u64 = 0;
    for c in s.chars().take_while(|c| c.is_ascii_hexdigit()).take(16) {
        value = (value << 4) | c.to_digit(16).unwrap_or(0) as u64;
    }
    value
}

pub fn buffer_to_hex_string(bytes: &[u8], separator: &str) -> String {
    let mut s = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            s.push_str(separator);
        }
        let _ = write!(s, "{:02X}", b);
    }
    s
}

/// ToBuffer などで使う、Buffer の長さ合わせ
pub fn fit_buffer(mut bytes: Vec<u8>, len: usize) -> Vec<u8> {
    if bytes.len() < len {
        bytes.extend(vec![0u8; len - bytes.len()]);
    } else {
        bytes.truncate(len);
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{one, ones, zero, ObjectType};

    #[test]
    fn integer_to_string_is_sixteen_hex_digits() {
        let s = Object::integer(0x1234).convert(ConvertMask::STRING).unwrap();
        assert_eq!(s.to_aml_string().unwrap(), "0000000000001234");
    }

    #[test]
    fn integer_to_buffer_is_little_endian() {
        let b = Object::integer(0x0102).to_buffer().unwrap();
        assert_eq!(b, vec![0x02, 0x01, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn priority_prefers_integer() {
        let mask = ConvertMask::INTEGER | ConvertMask::STRING;
        assert_eq!(Object::string("1F").convert(mask).unwrap().as_integer(), Some(0x1F));
        assert_eq!(Object::Buffer(vec![0xAB, 0x01]).to_aml_string().unwrap(), "AB 01");
        assert_eq!(Object::string("AB").to_buffer().unwrap(), vec![b'A', b'B', 0]);
    }

    #[test]
    fn reference_forwards_convert_and_store() {
        let target = new_ref(Object::integer(5));
        let mut r = Object::Reference(target.clone());
        assert_eq!(r.to_integer().unwrap(), 5);
        r.store_value(&Object::integer(9)).unwrap();
        assert_eq!(target.lock().as_integer(), Some(9));
    }

    #[test]
    fn store_to_constant_fails_and_keeps_value() {
        for (singleton, expected) in [(zero(), 0), (one(), 1), (ones(), u64::MAX)] {
            let result = singleton.lock().store_value(&Object::integer(42));
            assert!(matches!(result, Err(AmlError::StoreToConstant)));
            assert_eq!(singleton.lock().as_integer(), Some(expected));
        }
    }

    #[test]
    fn store_keeps_target_type() {
        let mut s = Object::string("old");
        s.store_value(&Object::integer(0xAB)).unwrap();
        assert_eq!(s.to_aml_string().unwrap(), "00000000000000AB");

        let mut b = Object::Buffer(vec![0; 2]);
        b.store_value(&Object::integer(0x1234_5678)).unwrap();
        assert_eq!(b.to_buffer().unwrap(), vec![0x78, 0x56]);
    }

    #[test]
    fn copy_clears_constant_flag() {
        let copied = zero().lock().copy();
        assert!(!copied.is_constant());
        assert_eq!(copied.as_integer(), Some(0));
    }

    #[test]
    fn compare_uses_lhs_type() {
        assert_eq!(Object::integer(5).compare(&Object::integer(5)).unwrap(), Ordering::Equal);
        assert_eq!(Object::string("abc").compare(&Object::string("abd")).unwrap(), Ordering::Less);
        assert_eq!(
            Object::Buffer(vec![1, 2]).compare(&Object::Buffer(vec![1])).unwrap(),
            Ordering::Greater
        );
        assert_eq!(
            Object::Package(Vec::new()).compare(&Object::integer(0)),
            Err(AmlError::NoOrdering(ObjectType::Package))
        );
    }

    #[test]
    fn buffer_field_reads_and_writes_window() {
        let buffer = new_ref(Object::Buffer(vec![0x00, 0xF0]));
        let field = BufferField { buffer: buffer.clone(), bit_offset: 12, bit_count: 4 };
        assert_eq!(field.read().unwrap().as_integer(), Some(0xF));
        field.write(&Object::integer(0x5)).unwrap();
        assert_eq!(buffer.lock().to_buffer().unwrap(), vec![0x00, 0x50]);
        assert_eq!(Object::BufferField(field).to_integer().unwrap(), 5);
    }

    #[test]
    fn buffer_field_wider_than_an_integer_takes_the_whole_buffer() {
        let buffer = new_ref(Object::Buffer(vec![0; 12]));
        let field = BufferField { buffer: buffer.clone(), bit_offset: 0, bit_count: 96 };
        let value: Vec<u8> = (1..=12).collect();
        field.write(&Object::Buffer(value.clone())).unwrap();
        assert_eq!(buffer.lock().to_buffer().unwrap(), value);
    }

    #[test]
    fn buffer_field_outside_the_buffer_is_rejected() {
        let buffer = new_ref(Object::Buffer(vec![0; 2]));
        let past_end = BufferField { buffer: buffer.clone(), bit_offset: 12, bit_count: 8 };
        assert_eq!(past_end.write(&Object::integer(1)).err(), Some(AmlError::IndexOutOfBounds { index: 2, len: 2 }));

        // bit_offset + bit_count が溢れても panic しない
        let wrapped = BufferField { buffer: buffer.clone(), bit_offset: usize::MAX - 3, bit_count: 8 };
        assert_eq!(
            wrapped.write(&Object::integer(1)).err(),
            Some(AmlError::IndexOutOfBounds { index: u64::MAX, len: 2 })
        );
        assert_eq!(buffer.lock().to_buffer().unwrap(), vec![0, 0]);
    }

    #[test]
    fn buffer_field_over_a_string_keeps_it_ascii() {
        let text = new_ref(Object::string("abc"));
        let field = BufferField { buffer: text.clone(), bit_offset: 8, bit_count: 8 };
        assert_eq!(field.read().unwrap().as_integer(), Some(u64::from(b'b')));

        field.write(&Object::integer(u64::from(b'B'))).unwrap();
        assert_eq!(text.lock().to_aml_string().unwrap(), "aBc");

        assert_eq!(field.write(&Object::integer(0xC3)).err(), Some(AmlError::NonAsciiString(0xC3)));
        assert_eq!(text.lock().to_aml_string().unwrap(), "aBc");
    }
}
