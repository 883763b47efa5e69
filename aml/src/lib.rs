// aml/src/lib.rs
//
// 役割:
// - ACPI の AML（DSDT / SSDT の定義ブロック）を読み込み、namespace を構築し、
//   control method を評価するインタプリタ。
//
// やること:
// - バイト列の解析（parser / name / opcode）。
// - namespace とオブジェクトモデル（namespace / object）。
// - 評価器（interp）と OpRegion / Field アクセス（field / region）。
// - デバイス単位のサービス（device）と、共有用の登録口（global）。
//
// やらないこと:
// - ACPI テーブルの発見 / checksum 検証 / FADT の解釈。
// - 割り込み処理（SCI / GPE の配線は呼び出し側）。
//
// 前提:
// - no_std + alloc。テスト時のみ std。

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod device;
pub mod error;
pub mod field;
pub mod global;
pub mod host;
pub mod interp;
pub mod logging;
pub mod name;
pub mod namespace;
pub mod object;
pub mod opcode;
pub mod parser;
pub mod region;
pub mod trace;

pub use config::AmlConfig;
pub use device::{eisa_id_from_str, eisa_id_to_string};
pub use error::{AmlError, AmlResult};
pub use host::{Host, NullHost};
pub use interp::{AmlContext, LoadedTable, AML_REVISION};
pub use name::{NameSeg, NameString};
pub use namespace::Namespace;
pub use object::{Object, ObjectRef, ObjectType};
pub use region::{RegionAccess, RegionHandler, RegionSpace};
