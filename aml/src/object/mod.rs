// aml/src/object/mod.rs
//
// 役割:
// - namespace / 評価中に現れるすべての値（Node）を 1 つの sum type で表現する。
//
// やること:
// - Object（Integer / String / Buffer / Package / Reference / FieldElement / Scope ...）。
// - 所有は ObjectRef = Arc<spin::Mutex<Object>>。
//   scope → 子は強参照、子 → 親 / FieldElement → OpRegion は Weak（循環を作らない）。
// - Zero / One / Ones はプロセス全体で共有する不変 singleton。
//
// やらないこと:
// - 変換 / store / copy の規則（convert.rs）。
// - ハードウェアに触る Field の読み書き（interp/field.rs）。
//
// 不変条件:
// - 定数 Integer（constant = true）への store は常に失敗する。
// - 1 つの scope 内で子の名前は一意。root 以外の node は親 scope をちょうど 1 つ持つ。
// - どの node の lock も、入れ子の評価 / region アクセス / method 呼び出しをまたいで保持しない。

pub mod convert;

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::fmt;

use spin::{Lazy, Mutex};

use crate::error::{AmlError, AmlResult};
use crate::field::FieldFlags;
use crate::name::{NameSeg, NameString};
use crate::region::RegionSpace;

pub use convert::ConvertMask;

pub type ObjectRef = Arc<Mutex<Object>>;
pub type WeakObjectRef = Weak<Mutex<Object>>;

pub fn new_ref(object: Object) -> ObjectRef {
    Arc::new(Mutex::new(object))
}

static ZERO: Lazy<ObjectRef> = Lazy::new(|| new_ref(Object::Integer(Integer::constant(0))));
static ONE: Lazy<ObjectRef> = Lazy::new(|| new_ref(Object::Integer(Integer::constant(1))));
static ONES: Lazy<ObjectRef> = Lazy::new(|| new_ref(Object::Integer(Integer::constant(u64::MAX))));

/// 共有 singleton Zero
pub fn zero() -> ObjectRef {
    ZERO.clone()
}

/// 共有 singleton One
pub fn one() -> ObjectRef {
    ONE.clone()
}

/// 共有 singleton Ones
pub fn ones() -> ObjectRef {
    ONES.clone()
}

/// 論理演算の結果（真 = Ones, 偽 = Zero の singleton）
pub fn boolean(value: bool) -> ObjectRef {
    if value {
        ones()
    } else {
        zero()
    }
}

/// ObjectType opcode が返す番号（ACPI §19.6.97）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectType {
    Uninitialized = 0,
    Integer = 1,
    String = 2,
    Buffer = 3,
    Package = 4,
    FieldUnit = 5,
    Device = 6,
    Event = 7,
    Method = 8,
    Mutex = 9,
    OpRegion = 10,
    PowerResource = 11,
    Processor = 12,
    ThermalZone = 13,
    BufferField = 14,
    DdbHandle = 15,
    Debug = 16,
    // 以下は ObjectType opcode では 0 を返す内部種別
    Reference = 0x80,
    Scope = 0x81,
}

impl ObjectType {
    pub fn acpi_code(self) -> u64 {
        match self {
            ObjectType::Reference | ObjectType::Scope => 0,
            other => other as u64,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Integer {
    pub value: u64,
    constant: bool,
}

impl Integer {
    pub const fn new(value: u64) -> Self {
        Integer { value, constant: false }
    }

    const fn constant(value: u64) -> Self {
        Integer { value, constant: true }
    }

    pub fn is_constant(&self) -> bool {
        self.constant
    }
}

/// Package の要素。名前参照は遅延解決（scope は定義時の base）。
#[derive(Clone, Debug)]
pub enum PackageElement {
    Value(ObjectRef),
    Deferred { scope: NameString, name: NameString },
}

/// Buffer 上の bit 窓（CreateXxxField / Buffer への Index）
#[derive(Clone, Debug)]
pub struct BufferField {
    pub buffer: ObjectRef,
    pub bit_offset: usize,
    pub bit_count: usize,
}

/// OpRegion に束縛された Field 要素
#[derive(Clone, Debug)]
pub struct FieldElement {
    pub region: WeakObjectRef,
    pub bit_offset: usize,
    pub bit_count: usize,
    pub flags: FieldFlags,
}

/// index / data の FieldElement 対で間接アクセスする要素
#[derive(Clone, Debug)]
pub struct IndexFieldElement {
    pub index: WeakObjectRef,
    pub data: WeakObjectRef,
    pub bit_offset: usize,
    pub bit_count: usize,
    pub flags: FieldFlags,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpRegion {
    pub space: RegionSpace,
    pub offset: u64,
    pub length: u64,
    /// region を定義した scope（PCI_Config の _ADR 探索に使う）
    pub parent: NameString,
}

bitflags::bitflags! {
    /// MethodFlags byte
    ///
    /// - ARG_COUNT: bit2-0
    /// - SERIALIZED: bit3
    /// - SYNC_LEVEL: bit7-4
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MethodFlags: u8 {
        const ARG_COUNT = 0x07;
        const SERIALIZED = 1 << 3;
        const SYNC_LEVEL = 0xF0;
    }
}

impl MethodFlags {
    pub fn arg_count(self) -> usize {
        (self.bits() & MethodFlags::ARG_COUNT.bits()) as usize
    }

    pub fn sync_level(self) -> u8 {
        (self.bits() & MethodFlags::SYNC_LEVEL.bits()) >> 4
    }
}

/// カーネル側で実装する組み込み method（\_OSI など）
pub type NativeMethod = fn(&[Object]) -> AmlResult<Object>;

#[derive(Clone)]
pub enum MethodBody {
    Aml(Arc<[u8]>),
    Native(NativeMethod),
}

#[derive(Clone)]
pub struct Method {
    pub flags: MethodFlags,
    pub body: MethodBody,
    /// 本体内の名前解決の基点（method 自身の正規パス）
    pub scope: NameString,
    /// 実行中に本体が作った名前。戻るときに空になる。
    names: BTreeMap<NameSeg, ObjectRef>,
}

impl Method {
    pub fn new(flags: MethodFlags, body: MethodBody, scope: NameString) -> Self {
        Method { flags, body, scope, names: BTreeMap::new() }
    }

    pub fn local_name(&self, seg: NameSeg) -> Option<ObjectRef> {
        self.names.get(&seg).cloned()
    }

    pub fn local_name_count(&self) -> usize {
        self.names.len()
    }

    pub(crate) fn insert_local(&mut self, seg: NameSeg, object: ObjectRef) -> AmlResult<()> {
        if self.names.contains_key(&seg) {
            return Err(AmlError::DuplicateName(seg));
        }
        self.names.insert(seg, object);
        Ok(())
    }

    pub(crate) fn remove_local(&mut self, seg: NameSeg) -> Option<ObjectRef> {
        self.names.remove(&seg)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match &self.body {
            MethodBody::Aml(code) => code.len(),
            MethodBody::Native(_) => 0,
        };
        write!(
            f,
            "Method(args={}, body={}B, scope={}, {} names)",
            self.flags.arg_count(),
            body,
            self.scope,
            self.names.len()
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AmlMutex {
    pub sync_level: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    Root,
    Plain,
    Device,
    Processor { proc_id: u8, pblk_address: u32, pblk_len: u8 },
    PowerResource { system_level: u8, resource_order: u16 },
    ThermalZone,
}

/// 子を持つ node（root / Scope / Device / Processor / PowerResource / ThermalZone）
#[derive(Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    path: NameString,
    parent: WeakObjectRef,
    children: BTreeMap<NameSeg, ObjectRef>,
}

impl Scope {
    pub fn new(kind: ScopeKind) -> Self {
        Scope {
            kind,
            path: NameString::root(),
            parent: Weak::new(),
            children: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &NameString {
        &self.path
    }

    pub fn parent(&self) -> Option<ObjectRef> {
        self.parent.upgrade()
    }

    pub(crate) fn attach(&mut self, path: NameString, parent: WeakObjectRef) {
        self.path = path;
        self.parent = parent;
    }

    pub fn child(&self, seg: NameSeg) -> Option<ObjectRef> {
        self.children.get(&seg).cloned()
    }

    pub fn has_child(&self, seg: NameSeg) -> bool {
        self.children.contains_key(&seg)
    }

    pub fn children(&self) -> impl Iterator<Item = (&NameSeg, &ObjectRef)> {
        self.children.iter()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub(crate) fn insert(&mut self, seg: NameSeg, object: ObjectRef) -> AmlResult<()> {
        if self.children.contains_key(&seg) {
            return Err(AmlError::DuplicateName(seg));
        }
        self.children.insert(seg, object);
        Ok(())
    }

    pub(crate) fn remove(&mut self, seg: NameSeg) -> Option<ObjectRef> {
        self.children.remove(&seg)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope({:?}, {}, {} children)", self.kind, self.path, self.children.len())
    }
}

#[derive(Clone, Debug)]
pub enum Object {
    Uninitialized,
    Integer(Integer),
    String(String),
    Buffer(Vec<u8>),
    Package(Vec<PackageElement>),
    Reference(ObjectRef),
    BufferField(BufferField),
    FieldElement(FieldElement),
    IndexFieldElement(IndexFieldElement),
    Method(Method),
    Mutex(AmlMutex),
    Event,
    OpRegion(OpRegion),
    Scope(Scope),
    Debug,
}

impl Object {
    pub fn integer(value: u64) -> Object {
        Object::Integer(Integer::new(value))
    }

    pub fn string(s: &str) -> Object {
        Object::String(String::from(s))
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Object::Uninitialized => ObjectType::Uninitialized,
            Object::Integer(_) => ObjectType::Integer,
            Object::String(_) => ObjectType::String,
            Object::Buffer(_) => ObjectType::Buffer,
            Object::Package(_) => ObjectType::Package,
            Object::Reference(_) => ObjectType::Reference,
            Object::BufferField(_) => ObjectType::BufferField,
            Object::FieldElement(_) | Object::IndexFieldElement(_) => ObjectType::FieldUnit,
            Object::Method(_) => ObjectType::Method,
            Object::Mutex(_) => ObjectType::Mutex,
            Object::Event => ObjectType::Event,
            Object::OpRegion(_) => ObjectType::OpRegion,
            Object::Scope(scope) => match scope.kind {
                ScopeKind::Device => ObjectType::Device,
                ScopeKind::Processor { .. } => ObjectType::Processor,
                ScopeKind::PowerResource { .. } => ObjectType::PowerResource,
                ScopeKind::ThermalZone => ObjectType::ThermalZone,
                ScopeKind::Root | ScopeKind::Plain => ObjectType::Scope,
            },
            Object::Debug => ObjectType::Debug,
        }
    }

    pub fn as_integer(&self) -> Option<u64> {
        match self {
            Object::Integer(i) => Some(i.value),
            _ => None,
        }
    }

    pub fn as_scope(&self) -> Option<&Scope> {
        match self {
            Object::Scope(scope) => Some(scope),
            _ => None,
        }
    }

    pub fn as_scope_mut(&mut self) -> Option<&mut Scope> {
        match self {
            Object::Scope(scope) => Some(scope),
            _ => None,
        }
    }

    pub fn is_scope(&self) -> bool {
        matches!(self, Object::Scope(_))
    }

    /// 名前の親になれる node（scope と、実行中に名前を作る method）
    pub fn holds_names(&self) -> bool {
        matches!(self, Object::Scope(_) | Object::Method(_))
    }

    /// scope の子、または method が実行中に作った名前
    pub fn named_child(&self, seg: NameSeg) -> Option<ObjectRef> {
        match self {
            Object::Scope(scope) => scope.child(seg),
            Object::Method(method) => method.local_name(seg),
            _ => None,
        }
    }

    pub fn is_device(&self) -> bool {
        matches!(self, Object::Scope(Scope { kind: ScopeKind::Device, .. }))
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Object::Integer(i) if i.is_constant())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singletons_are_shared_and_constant() {
        assert!(Arc::ptr_eq(&zero(), &zero()));
        assert!(Arc::ptr_eq(&boolean(true), &ones()));
        assert!(!Arc::ptr_eq(&one(), &ones()));
        assert!(zero().lock().is_constant());
        assert_eq!(ones().lock().as_integer(), Some(u64::MAX));
    }

    #[test]
    fn method_flags_decode() {
        let flags = MethodFlags::from_bits_retain(0x3A);
        assert_eq!(flags.arg_count(), 2);
        assert!(flags.contains(MethodFlags::SERIALIZED));
        assert_eq!(flags.sync_level(), 3);
    }

    #[test]
    fn scope_rejects_duplicate_child() {
        let mut scope = Scope::new(ScopeKind::Plain);
        let seg: NameSeg = "FOO".parse().unwrap();
        scope.insert(seg, new_ref(Object::integer(1))).unwrap();
        assert_eq!(scope.insert(seg, new_ref(Object::integer(2))), Err(AmlError::DuplicateName(seg)));
        assert_eq!(scope.child(seg).unwrap().lock().as_integer(), Some(1));
    }

    #[test]
    fn object_type_codes() {
        assert_eq!(Object::integer(0).object_type().acpi_code(), 1);
        assert_eq!(Object::Scope(Scope::new(ScopeKind::Device)).object_type(), ObjectType::Device);
        assert_eq!(Object::Scope(Scope::new(ScopeKind::Plain)).object_type().acpi_code(), 0);
    }
}
