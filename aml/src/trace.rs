// aml/src/trace.rs
//
// 低コスト trace（観測性）を 1 箇所に集約する。
// - 実行した opcode を trace できる
// - namespace への追加 / 削除を trace できる
// - OpRegion への実アクセス（space / address / width / value）を trace できる
//
// 設計方針:
// - 出力は log facade のみ（sink は logging 側 or カーネル側が決める）
// - 呼び出し側は feature の有無を意識しない（off のときは引数を捨てるだけ）
//
// feature:
// - aml_trace_opcodes:   opcode trace を有効化
// - aml_trace_namespace: namespace trace を有効化
// - aml_trace_fields:    region アクセス trace を有効化

use crate::name::NameString;
use crate::region::RegionAccess;

// ★重要：NamespaceEvent / RegionDirection は “常に存在” させる（feature off でもコンパイル可能にする）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NamespaceEvent {
    Added,
    Removed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionDirection {
    Read,
    Write,
}

/// opcode 1 個の実行開始
#[inline(always)]
pub fn trace_opcode(op: u16, offset: usize) {
    #[cfg(feature = "aml_trace_opcodes")]
    log::trace!("(AML) aml_trace_opcodes op={:#06x} offset={:#x}", op, offset);
    #[cfg(not(feature = "aml_trace_opcodes"))]
    {
        let _ = op;
        let _ = offset;
    }
}

/// namespace の変更
#[inline(always)]
pub fn trace_namespace(ev: NamespaceEvent, path: &NameString) {
    #[cfg(feature = "aml_trace_namespace")]
    {
        match ev {
            NamespaceEvent::Added => log::debug!("(AML) aml_trace_namespace add={}", path),
            NamespaceEvent::Removed => log::debug!("(AML) aml_trace_namespace remove={}", path),
        }
    }
    #[cfg(not(feature = "aml_trace_namespace"))]
    {
        let _ = ev;
        let _ = path;
    }
}

/// RegionHandler 越しの 1 アクセス
#[inline(always)]
pub fn trace_region(dir: RegionDirection, access: &RegionAccess, value: u64) {
    #[cfg(feature = "aml_trace_fields")]
    {
        let kind = match dir {
            RegionDirection::Read => "read",
            RegionDirection::Write => "write",
        };
        log::debug!(
            "(AML) aml_trace_fields {} space={:?} addr={:#x} width={} value={:#x}",
            kind,
            access.space,
            access.address,
            access.width_bits,
            value
        );
    }
    #[cfg(not(feature = "aml_trace_fields"))]
    {
        let _ = dir;
        let _ = access;
        let _ = value;
    }
}
