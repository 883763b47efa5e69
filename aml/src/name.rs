// aml/src/name.rs
//
// 役割:
// - NameSeg（固定 4 文字）と NameString（root / parent 前置き + NameSeg 列）を定義する。
//
// やること:
// - バイトコードからの parse（can_parse / parse の対）。
// - 文字列表現との相互変換（表示は各 segment の末尾 '_' を落として '.' で連結）。
// - base に対する「直接解決」（search rule を使わない resolve_against）。
//
// やらないこと:
// - namespace に実在するかの検証（それは namespace.rs の責務）。

use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use crate::error::{AmlError, AmlResult};
use crate::opcode::{DUAL_NAME_PREFIX, MULTI_NAME_PREFIX, NULL_NAME, PARENT_PREFIX_CHAR, ROOT_CHAR};
use crate::parser::Cursor;

fn is_lead_name_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'_')
}

fn is_name_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'0'..=b'9' | b'_')
}

/// 4 文字固定の名前。等価性は生の 4 byte 比較。
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameSeg([u8; 4]);

impl NameSeg {
    /// 検証済みであることが分かっている定数用
    pub const fn from_raw(bytes: [u8; 4]) -> Self {
        NameSeg(bytes)
    }

    pub fn from_bytes(bytes: [u8; 4]) -> AmlResult<Self> {
        if !is_lead_name_char(bytes[0]) || !bytes[1..].iter().all(|&b| is_name_char(b)) {
            return Err(AmlError::InvalidNameSeg);
        }
        Ok(NameSeg(bytes))
    }

    pub fn can_parse(c: Cursor<'_>) -> bool {
        let bytes = c.remaining();
        bytes.len() >= 4 && is_lead_name_char(bytes[0]) && bytes[1..4].iter().all(|&b| is_name_char(b))
    }

    pub fn parse(c: &mut Cursor<'_>) -> AmlResult<Self> {
        if !Self::can_parse(*c) {
            return Err(AmlError::InvalidNameSeg);
        }
        let raw = c.take(4)?;
        Ok(NameSeg([raw[0], raw[1], raw[2], raw[3]]))
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// padding を含む 4 文字そのまま
    pub fn as_str(&self) -> &str {
        // from_bytes / parse で ASCII のみを通しているので失敗しない
        core::str::from_utf8(&self.0).unwrap_or("????")
    }

    /// 末尾の '_' padding を落とした表示用文字列（最低 1 文字は残す）
    pub fn trimmed(&self) -> &str {
        let mut end = 4;
        while end > 1 && self.0[end - 1] == b'_' {
            end -= 1;
        }
        core::str::from_utf8(&self.0[..end]).unwrap_or("????")
    }
}

impl FromStr for NameSeg {
    type Err = AmlError;

    /// "_SB" → "_SB_" のように 4 文字まで '_' で埋める
    fn from_str(s: &str) -> AmlResult<Self> {
        let bytes = s.as_bytes();
        if bytes.is_empty() || bytes.len() > 4 {
            return Err(AmlError::InvalidNameSeg);
        }
        let mut raw = [b'_'; 4];
        raw[..bytes.len()].copy_from_slice(bytes);
        NameSeg::from_bytes(raw)
    }
}

impl fmt::Display for NameSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.trimmed())
    }
}

impl fmt::Debug for NameSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameSeg({})", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NamePrefix {
    None,
    Root,
    /// '^' の個数
    Parent(u8),
}

/// root / parent 前置き + NameSeg 列。
/// prefix = Root のものが「正規の絶対パス」。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct NameString {
    prefix: NamePrefix,
    segments: Vec<NameSeg>,
}

impl NameString {
    pub fn root() -> Self {
        NameString { prefix: NamePrefix::Root, segments: Vec::new() }
    }

    pub fn new(prefix: NamePrefix, segments: Vec<NameSeg>) -> Self {
        NameString { prefix, segments }
    }

    /// prefix 無しの 1 segment 名（search rule の対象）
    pub fn from_seg(seg: NameSeg) -> Self {
        NameString { prefix: NamePrefix::None, segments: alloc::vec![seg] }
    }

    pub fn prefix(&self) -> NamePrefix {
        self.prefix
    }

    pub fn segments(&self) -> &[NameSeg] {
        &self.segments
    }

    pub fn is_absolute(&self) -> bool {
        self.prefix == NamePrefix::Root
    }

    pub fn is_root(&self) -> bool {
        self.is_absolute() && self.segments.is_empty()
    }

    pub fn is_null(&self) -> bool {
        self.prefix == NamePrefix::None && self.segments.is_empty()
    }

    /// ACPI の search rule が適用される形か（prefix 無し・1 segment）
    pub fn is_search_candidate(&self) -> bool {
        self.prefix == NamePrefix::None && self.segments.len() == 1
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn last_segment(&self) -> Option<NameSeg> {
        self.segments.last().copied()
    }

    /// 絶対パスに 1 segment 追加したもの
    pub fn child(&self, seg: NameSeg) -> NameString {
        let mut segments = self.segments.clone();
        segments.push(seg);
        NameString { prefix: self.prefix, segments }
    }

    /// 末尾 1 segment を落としたもの（root には親が無い）
    pub fn parent(&self) -> Option<NameString> {
        if self.segments.is_empty() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(NameString { prefix: self.prefix, segments })
    }

    /// 先頭 depth 個だけ残した絶対パス
    pub fn truncated(&self, depth: usize) -> NameString {
        let depth = depth.min(self.segments.len());
        NameString { prefix: self.prefix, segments: self.segments[..depth].to_vec() }
    }

    /// base（絶対パス）に対して直接解決する。search rule は使わない。
    /// - Root: そのまま
    /// - Parent(n): base から n segment 落とす（深さ超過は失敗）
    /// - None: base + segments
    pub fn resolve_against(&self, base: &NameString) -> AmlResult<NameString> {
        let mut segments = match self.prefix {
            NamePrefix::Root => return Ok(self.clone()),
            NamePrefix::Parent(n) => {
                let n = n as usize;
                if n > base.segments.len() {
                    return Err(AmlError::ParentDepthExceeded);
                }
                base.segments[..base.segments.len() - n].to_vec()
            }
            NamePrefix::None => base.segments.clone(),
        };
        segments.extend_from_slice(&self.segments);
        Ok(NameString { prefix: NamePrefix::Root, segments })
    }

    pub fn can_parse(c: Cursor<'_>) -> bool {
        match c.peek() {
            Ok(b) => {
                b == ROOT_CHAR
                    || b == PARENT_PREFIX_CHAR
                    || b == DUAL_NAME_PREFIX
                    || b == MULTI_NAME_PREFIX
                    || is_lead_name_char(b)
            }
            Err(_) => false,
        }
    }

    pub fn parse(c: &mut Cursor<'_>) -> AmlResult<Self> {
        let mut prefix = NamePrefix::None;

        if c.peek()? == ROOT_CHAR {
            c.next_byte()?;
            prefix = NamePrefix::Root;
        } else {
            let mut parents: u8 = 0;
            while c.peek()? == PARENT_PREFIX_CHAR {
                c.next_byte()?;
                parents = parents.checked_add(1).ok_or(AmlError::InvalidNameString)?;
            }
            if parents > 0 {
                prefix = NamePrefix::Parent(parents);
            }
        }

        let count = match c.peek()? {
            NULL_NAME => {
                c.next_byte()?;
                0
            }
            DUAL_NAME_PREFIX => {
                c.next_byte()?;
                2
            }
            MULTI_NAME_PREFIX => {
                c.next_byte()?;
                c.next_byte()? as usize
            }
            _ => 1,
        };

        let mut segments = Vec::with_capacity(count);
        for _ in 0..count {
            segments.push(NameSeg::parse(c)?);
        }

        Ok(NameString { prefix, segments })
    }
}

impl FromStr for NameString {
    type Err = AmlError;

    /// "\_SB.PCI0" / "^^FOO" / "FOO" / "\" を受け付ける
    fn from_str(s: &str) -> AmlResult<Self> {
        let mut rest = s;
        let mut prefix = NamePrefix::None;

        if let Some(stripped) = rest.strip_prefix('\\') {
            prefix = NamePrefix::Root;
            rest = stripped;
        } else {
            let mut parents: u8 = 0;
            while let Some(stripped) = rest.strip_prefix('^') {
                parents = parents.checked_add(1).ok_or(AmlError::InvalidNameString)?;
                rest = stripped;
            }
            if parents > 0 {
                prefix = NamePrefix::Parent(parents);
            }
        }

        let mut segments = Vec::new();
        if !rest.is_empty() {
            for part in rest.split('.') {
                segments.push(part.parse::<NameSeg>()?);
            }
        }

        if prefix == NamePrefix::None && segments.is_empty() {
            return Err(AmlError::InvalidNameString);
        }
        Ok(NameString { prefix, segments })
    }
}

impl fmt::Display for NameString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix {
            NamePrefix::Root => f.write_str("\\")?,
            NamePrefix::Parent(n) => {
                for _ in 0..n {
                    f.write_str("^")?;
                }
            }
            NamePrefix::None => {}
        }
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}

impl fmt::Debug for NameString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameString({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn nameseg_parse_keeps_padding() {
        let mut c = Cursor::new(b"_SB_rest");
        let seg = NameSeg::parse(&mut c).unwrap();
        assert_eq!(seg.as_bytes(), b"_SB_");
        assert_eq!(seg.as_str(), "_SB_");
        assert_eq!(seg.to_string(), "_SB");
        assert_eq!(c.remaining(), b"rest");
    }

    #[test]
    fn nameseg_rejects_bad_characters() {
        assert!(NameSeg::parse(&mut Cursor::new(b"1ABC")).is_err());
        assert!(NameSeg::parse(&mut Cursor::new(b"AbCD")).is_err());
        assert!(NameSeg::parse(&mut Cursor::new(b"AB")).is_err());
        assert!("TOOLONG".parse::<NameSeg>().is_err());
    }

    #[test]
    fn nameseg_from_short_str_is_padded() {
        let seg: NameSeg = "PR".parse().unwrap();
        assert_eq!(seg.as_bytes(), b"PR__");
        assert_eq!(seg.to_string(), "PR");
    }

    #[test]
    fn parse_single_segment() {
        let mut c = Cursor::new(b"FOO_");
        let name = NameString::parse(&mut c).unwrap();
        assert!(name.is_search_candidate());
        assert_eq!(name.to_string(), "FOO");
    }

    #[test]
    fn parse_root_dual_name() {
        let mut c = Cursor::new(b"\\\x2E_SB_PCI0");
        let name = NameString::parse(&mut c).unwrap();
        assert!(name.is_absolute());
        assert_eq!(name.depth(), 2);
        assert_eq!(name.to_string(), "\\_SB.PCI0");
    }

    #[test]
    fn parse_parent_multi_name() {
        let mut c = Cursor::new(b"^^\x2F\x03AAAABBBBCCCC");
        let name = NameString::parse(&mut c).unwrap();
        assert_eq!(name.prefix(), NamePrefix::Parent(2));
        assert_eq!(name.to_string(), "^^AAAA.BBBB.CCCC");
    }

    #[test]
    fn parse_root_null_name() {
        let mut c = Cursor::new(b"\\\x00");
        let name = NameString::parse(&mut c).unwrap();
        assert!(name.is_root());
        assert_eq!(name.to_string(), "\\");
    }

    #[test]
    fn inner_nameseg_failure_propagates() {
        let mut c = Cursor::new(b"\x2EABCD1XYZ");
        assert_eq!(NameString::parse(&mut c), Err(AmlError::InvalidNameSeg));
    }

    #[test]
    fn resolve_against_base() {
        let base: NameString = "\\_SB.PCI0.LPCB".parse().unwrap();
        let up: NameString = "^^FOO".parse().unwrap();
        assert_eq!(up.resolve_against(&base).unwrap().to_string(), "\\_SB.FOO");

        let rel: NameString = "EC0.BAT0".parse().unwrap();
        assert_eq!(rel.resolve_against(&base).unwrap().to_string(), "\\_SB.PCI0.LPCB.EC0.BAT0");

        let too_far: NameString = "^^^^FOO".parse().unwrap();
        assert_eq!(too_far.resolve_against(&base), Err(AmlError::ParentDepthExceeded));
    }

    #[test]
    fn from_str_roundtrips_display() {
        for s in ["\\", "\\_SB", "\\_SB.PCI0._PRT", "^FOO", "BAT0"] {
            let name: NameString = s.parse().unwrap();
            assert_eq!(name.to_string(), s);
        }
    }
}
