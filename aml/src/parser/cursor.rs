// aml/src/parser/cursor.rs
//
// 役割:
// - 残りのバイトコードに対する非所有ビュー（&[u8] + テーブル先頭からの offset）。
//
// やること:
// - 消費した分だけ前へスライスする。
// - Copy なので「can_parse は値渡しで覗く / parse は &mut で消費する」が自然に書ける。
//
// やらないこと:
// - バックトラック用のバッファ。失敗時の位置は不定（呼び出し側は構文ごと中断する）。

use crate::error::{AmlError, AmlResult};

#[derive(Clone, Copy, Debug)]
pub struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, offset: 0 }
    }

    /// テーブル先頭からの位置（ログ用）
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn remaining(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn peek(&self) -> AmlResult<u8> {
        self.bytes.first().copied().ok_or(AmlError::UnexpectedEndOfStream)
    }

    pub fn peek_at(&self, index: usize) -> Option<u8> {
        self.bytes.get(index).copied()
    }

    pub fn next_byte(&mut self) -> AmlResult<u8> {
        let b = self.peek()?;
        self.advance(1);
        Ok(b)
    }

    pub fn next_u16(&mut self) -> AmlResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn next_u32(&mut self) -> AmlResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn next_u64(&mut self) -> AmlResult<u64> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_le_bytes(raw))
    }

    /// n byte をそのまま切り出して消費する
    pub fn take(&mut self, n: usize) -> AmlResult<&'a [u8]> {
        if n > self.bytes.len() {
            return Err(AmlError::UnexpectedEndOfStream);
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        self.offset += n;
        Ok(head)
    }

    /// 先頭 n byte をサブビューとして切り出し、自分はその直後へ進む
    pub fn split(&mut self, n: usize) -> AmlResult<Cursor<'a>> {
        let start = self.offset;
        let head = self.take(n)?;
        Ok(Cursor { bytes: head, offset: start })
    }

    fn advance(&mut self, n: usize) {
        let n = n.min(self.bytes.len());
        self.bytes = &self.bytes[n..];
        self.offset += n;
    }
}
