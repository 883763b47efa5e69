// aml/src/parser/pkg_length.rs
//
// PkgLength（1〜4 byte の可変長サイズ前置き）。
// - 値は「PkgLength 自身の byte 数を含む」長さ。
// - framed() は宣言された span をサブビューとして切り出し、外側は span の末尾へ強制的に進める。
//   入れ子の parse が何 byte 消費したかに関係なく、ここで位置が回復する。

use crate::error::{AmlError, AmlResult};

use super::Cursor;

/// 4 byte 形式で表現できる最大値（28 bit）
pub const MAX_PKG_LENGTH: usize = (1 << 28) - 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PkgLength {
    /// 自身の encode 長を含む宣言値
    pub value: usize,
    /// encode に使われた byte 数（1..=4）
    pub encoded_len: usize,
}

impl PkgLength {
    pub fn can_parse(c: Cursor<'_>) -> bool {
        let lead = match c.peek() {
            Ok(b) => b,
            Err(_) => return false,
        };
        let follow = (lead >> 6) as usize;
        if follow > 0 && (lead & 0x30) != 0 {
            return false;
        }
        c.len() > follow
    }

    pub fn parse(c: &mut Cursor<'_>) -> AmlResult<PkgLength> {
        let lead = c.next_byte()?;
        let follow = (lead >> 6) as usize;

        if follow == 0 {
            return Ok(PkgLength { value: (lead & 0x3F) as usize, encoded_len: 1 });
        }

        // 2 byte 以上の形式では bit5-4 は予約（0 固定）
        if (lead & 0x30) != 0 {
            return Err(AmlError::InvalidPkgLength);
        }

        let mut value = (lead & 0x0F) as usize;
        for i in 0..follow {
            let b = c.next_byte()? as usize;
            value |= b << (4 + 8 * i);
        }

        Ok(PkgLength { value, encoded_len: follow + 1 })
    }

    /// span 本体（PkgLength 自身を除いた）の長さ
    pub fn body_len(&self) -> AmlResult<usize> {
        self.value
            .checked_sub(self.encoded_len)
            .ok_or(AmlError::InvalidPkgLength)
    }

    /// value（自身の長さ込み）を encode する。戻り値は (bytes, 使った byte 数)。
    pub fn encode(value: usize) -> AmlResult<([u8; 4], usize)> {
        let mut out = [0u8; 4];

        if value <= 0x3F {
            out[0] = value as u8;
            return Ok((out, 1));
        }
        if value > MAX_PKG_LENGTH {
            return Err(AmlError::InvalidPkgLength);
        }

        let follow = if value < (1 << 12) {
            1
        } else if value < (1 << 20) {
            2
        } else {
            3
        };

        out[0] = ((follow as u8) << 6) | (value & 0x0F) as u8;
        for i in 0..follow {
            out[1 + i] = (value >> (4 + 8 * i)) as u8;
        }
        Ok((out, follow + 1))
    }
}

/// PkgLength を読み、宣言された span 本体をサブビューで返す。
/// 外側の cursor は span 末尾まで進んだ状態になる。
pub fn framed<'a>(c: &mut Cursor<'a>) -> AmlResult<Cursor<'a>> {
    let pkg = PkgLength::parse(c)?;
    let body = pkg.body_len()?;
    if body > c.len() {
        return Err(AmlError::PkgLengthTooLarge(pkg.value));
    }
    c.split(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_form() {
        let bytes = [0x05, 1, 2, 3, 4, 9];
        let mut c = Cursor::new(&bytes);
        let body = framed(&mut c).unwrap();
        assert_eq!(body.remaining(), &[1, 2, 3, 4]);
        assert_eq!(c.remaining(), &[9]);
    }

    #[test]
    fn multi_byte_form_matches_acpi_layout() {
        // 0x4A 0x01 => 1 byte 追加, value = 0xA | (0x01 << 4) = 0x1A
        let mut c = Cursor::new(&[0x4A, 0x01]);
        let pkg = PkgLength::parse(&mut c).unwrap();
        assert_eq!(pkg, PkgLength { value: 0x1A, encoded_len: 2 });
    }

    #[test]
    fn encode_then_parse_returns_same_length() {
        for &len in &[1usize, 0x3F, 0x40, 0x1A0, 0xFFF, 0x1000, 0xF_FFFF, 0x10_0000, MAX_PKG_LENGTH] {
            let (bytes, n) = PkgLength::encode(len).unwrap();
            let mut c = Cursor::new(&bytes[..n]);
            let pkg = PkgLength::parse(&mut c).unwrap();
            assert_eq!(pkg.value, len);
            assert_eq!(pkg.encoded_len, n);
            if len >= n {
                assert_eq!(pkg.body_len().unwrap(), len - n);
            }
        }
    }

    #[test]
    fn reserved_bits_rejected() {
        let mut c = Cursor::new(&[0x70, 0x00]);
        assert_eq!(PkgLength::parse(&mut c), Err(AmlError::InvalidPkgLength));
        assert!(!PkgLength::can_parse(Cursor::new(&[0x70, 0x00])));
    }

    #[test]
    fn span_larger_than_stream_fails() {
        let mut c = Cursor::new(&[0x10, 0x00]);
        assert_eq!(framed(&mut c).unwrap_err(), AmlError::PkgLengthTooLarge(0x10));
    }

    #[test]
    fn framed_skips_unconsumed_bytes() {
        // body は 3 byte。中身を 1 byte しか読まなくても外側は末尾へ進んでいる。
        let bytes = [0x04, 0xAA, 0xBB, 0xCC, 0x99];
        let mut c = Cursor::new(&bytes);
        let mut body = framed(&mut c).unwrap();
        assert_eq!(body.next_byte().unwrap(), 0xAA);
        assert_eq!(c.peek().unwrap(), 0x99);
    }
}
