// aml/src/error.rs
//
// 役割:
// - AML エンジン全体で共有するエラー型を 1 箇所に集約する。
//
// 設計方針:
// - 失敗はすべて AmlError として上へ返す（局所リトライはしない）。
// - ファームウェアに到達され得る状態では panic しない。
//   「定数への store」「範囲外 index」も専用の variant で返す。
// - Display は手書き（no_std / 依存を増やさない）。

use core::fmt;

use crate::name::{NameSeg, NameString};
use crate::object::ObjectType;
use crate::region::RegionSpace;

pub type AmlResult<T> = Result<T, AmlError>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AmlError {
    // --- bytecode ---
    UnexpectedEndOfStream,
    InvalidPkgLength,
    PkgLengthTooLarge(usize),
    InvalidNameSeg,
    InvalidNameString,
    UnknownOpcode(u8),
    UnknownExtOpcode(u8),
    UnsupportedOpcode(u16),
    InvalidFieldElement(u8),
    NonAsciiString(u8),

    // --- namespace ---
    NameNotFound(NameString),
    ParentDepthExceeded,
    NotAScope(NameString),
    DuplicateName(NameSeg),
    CannotRemoveRoot,

    // --- 値 / 型 ---
    IncompatibleType(ObjectType),
    StoreToConstant,
    InvalidStoreTarget(ObjectType),
    NotAReference(ObjectType),
    NotAMethod(NameString),
    NoOrdering(ObjectType),
    UninitializedLocal(u8),
    UninitializedArg(u8),
    TooManyArgs(usize),
    DivideByZero,
    IndexOutOfBounds { index: u64, len: usize },
    ObjectTooLarge(u64),
    FieldAccessRequired,

    // --- 実行制御 ---
    BreakOutsideLoop,
    CallDepthExceeded(usize),
    LoopLimitExceeded(u64),
    Fatal { fatal_type: u8, code: u32, arg: u64 },

    // --- OpRegion ---
    NoRegionHandler(RegionSpace),
    RegionTimeout(RegionSpace),
    RegionAccess(RegionSpace),
    RegionOutOfBounds { offset: u64, length: u64 },
    UnsupportedAccessWidth(u8),
    DanglingRegion,
}

impl fmt::Display for AmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmlError::UnexpectedEndOfStream => write!(f, "unexpected end of AML stream"),
            AmlError::InvalidPkgLength => write!(f, "invalid PkgLength encoding"),
            AmlError::PkgLengthTooLarge(len) => write!(f, "PkgLength {} exceeds remaining stream", len),
            AmlError::InvalidNameSeg => write!(f, "invalid NameSeg"),
            AmlError::InvalidNameString => write!(f, "invalid NameString"),
            AmlError::UnknownOpcode(op) => write!(f, "unknown opcode {:#04x}", op),
            AmlError::UnknownExtOpcode(op) => write!(f, "unknown extended opcode 0x5b {:#04x}", op),
            AmlError::UnsupportedOpcode(op) => write!(f, "unsupported opcode {:#06x}", op),
            AmlError::InvalidFieldElement(tag) => write!(f, "unsupported field element tag {:#04x}", tag),
            AmlError::NonAsciiString(b) => write!(f, "string byte {:#04x} is not ASCII", b),

            AmlError::NameNotFound(name) => write!(f, "name not found: {}", name),
            AmlError::ParentDepthExceeded => write!(f, "parent prefix walks above the root"),
            AmlError::NotAScope(name) => write!(f, "not a scope: {}", name),
            AmlError::DuplicateName(seg) => write!(f, "duplicate name in scope: {}", seg),
            AmlError::CannotRemoveRoot => write!(f, "refusing to remove the namespace root"),

            AmlError::IncompatibleType(ty) => write!(f, "no conversion available from {:?}", ty),
            AmlError::StoreToConstant => write!(f, "store into a constant integer"),
            AmlError::InvalidStoreTarget(ty) => write!(f, "cannot store into {:?}", ty),
            AmlError::NotAReference(ty) => write!(f, "expected a reference, found {:?}", ty),
            AmlError::NotAMethod(name) => write!(f, "not a method: {}", name),
            AmlError::NoOrdering(ty) => write!(f, "{:?} has no defined ordering", ty),
            AmlError::UninitializedLocal(n) => write!(f, "Local{} read before store", n),
            AmlError::UninitializedArg(n) => write!(f, "Arg{} was not passed", n),
            AmlError::TooManyArgs(n) => write!(f, "{} arguments exceed the limit of 7", n),
            AmlError::DivideByZero => write!(f, "divide by zero"),
            AmlError::IndexOutOfBounds { index, len } => {
                write!(f, "index {} out of bounds (len {})", index, len)
            }
            AmlError::ObjectTooLarge(size) => write!(f, "cannot allocate an object of {} elements", size),
            AmlError::FieldAccessRequired => write!(f, "field unit conversion needs region access"),

            AmlError::BreakOutsideLoop => write!(f, "Break/Continue outside of While"),
            AmlError::CallDepthExceeded(depth) => write!(f, "method call depth {} exceeded", depth),
            AmlError::LoopLimitExceeded(limit) => write!(f, "While exceeded {} iterations", limit),
            AmlError::Fatal { fatal_type, code, arg } => write!(
                f,
                "Fatal(type={:#x}, code={:#x}, arg={:#x})",
                fatal_type, code, arg
            ),

            AmlError::NoRegionHandler(space) => write!(f, "no handler for {:?}", space),
            AmlError::RegionTimeout(space) => write!(f, "{:?} access timed out", space),
            AmlError::RegionAccess(space) => write!(f, "{:?} access failed", space),
            AmlError::RegionOutOfBounds { offset, length } => {
                write!(f, "region offset {:#x} outside length {:#x}", offset, length)
            }
            AmlError::UnsupportedAccessWidth(bits) => write!(f, "unsupported access width {}", bits),
            AmlError::DanglingRegion => write!(f, "field refers to a removed OpRegion"),
        }
    }
}
