// aml/src/namespace.rs
//
// 役割:
// - ACPI namespace（Scope の木）を所有し、名前解決と追加 / 削除を提供する。
//
// やること:
// - resolve_path: 明示形（root / parent / 複数 segment）は base に対して直接解決、
//   prefix 無し 1 segment は ACPI の search rule（内側の scope から外へ、最初の一致）。
// - add_named_object: 親 scope に挿入し、created log に正規パスを積む。
// - remove_named_object: 絶対パスで引いて親から外す（部分木ごと）。
// - Method も名前の親になれる（実行中に本体が作った Name などがぶら下がる）。
//
// やらないこと:
// - bytecode の解釈（interp）。
// - 削除された部分木への Reference の無効化（共有所有なので参照先は生き続ける）。
//
// 不変条件:
// - 1 scope 内で子の名前は一意。
// - 子 scope は自分の正規パスと親への Weak を持つ。
// - 木を辿る間、node の lock は 1 段ずつ取って即座に離す。

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::error::{AmlError, AmlResult};
use crate::name::{NameSeg, NameString};
use crate::object::{new_ref, Object, ObjectRef, Scope, ScopeKind};
use crate::trace::{trace_namespace, NamespaceEvent};

/// 起動時に必ず存在する root 直下の scope
pub const PREDEFINED_SCOPES: [&str; 5] = ["_GPE", "_PR_", "_SB_", "_SI_", "_TZ_"];

pub struct Namespace {
    root: ObjectRef,
}

impl Namespace {
    pub fn new() -> Self {
        let ns = Namespace { root: new_ref(Object::Scope(Scope::new(ScopeKind::Root))) };

        let mut created = Vec::new();
        for name in PREDEFINED_SCOPES {
            let seg = NameSeg::from_raw(copy_seg(name));
            let path = NameString::root().child(seg);
            // 空の root への挿入なので失敗しない
            let _ = ns.add_named_object(&mut created, &path, new_ref(Object::Scope(Scope::new(ScopeKind::Plain))));
        }
        ns
    }

    pub fn root(&self) -> ObjectRef {
        self.root.clone()
    }

    /// name を base（絶対パス）から見た正規の絶対パスにする。
    pub fn resolve_path(&self, base: &NameString, name: &NameString) -> AmlResult<NameString> {
        if name.is_search_candidate() {
            return self.search(base, name);
        }

        let absolute = name.resolve_against(base)?;
        // 途中の segment はすべて scope として存在している必要がある
        for depth in 0..absolute.depth().saturating_sub(1) {
            let prefix = absolute.truncated(depth + 1);
            let node = self.lookup_absolute(&prefix)?;
            if !is_scope_like(&node) {
                return Err(AmlError::NotAScope(prefix));
            }
        }
        Ok(absolute)
    }

    /// root から base まで 1 段ずつ下り、各段で直接の子に name があるかを記録する。最も深い一致が勝つ。
    fn search(&self, base: &NameString, name: &NameString) -> AmlResult<NameString> {
        let seg = name.last_segment().ok_or(AmlError::InvalidNameString)?;
        let mut found: Option<NameString> = None;
        let mut scope = self.root.clone();
        let mut scope_path = NameString::root();

        for depth in 0..=base.depth() {
            let not_scope = |_| AmlError::NotAScope(scope_path.clone());
            if child_of(&scope, seg).map_err(not_scope)?.is_some() {
                found = Some(scope_path.child(seg));
            }
            if depth == base.depth() {
                break;
            }
            let next = base.segments()[depth];
            match child_of(&scope, next).map_err(not_scope)? {
                Some(node) => {
                    scope = node;
                    scope_path = scope_path.child(next);
                }
                None => break,
            }
        }

        found.ok_or_else(|| AmlError::NameNotFound(name.clone()))
    }

    /// 絶対パスで root から辿る（相対 base は無視）
    pub fn lookup_absolute(&self, path: &NameString) -> AmlResult<ObjectRef> {
        let mut node = self.root.clone();
        for (i, seg) in path.segments().iter().enumerate() {
            node = match child_of(&node, *seg) {
                Ok(Some(child)) => child,
                Ok(None) => return Err(AmlError::NameNotFound(path.clone())),
                Err(_) => return Err(AmlError::NotAScope(path.truncated(i))),
            };
        }
        Ok(node)
    }

    /// 名前解決 + 取得。見つからなければ None。
    pub fn find_object(&self, base: &NameString, name: &NameString) -> Option<(NameString, ObjectRef)> {
        let path = self.resolve_path(base, name).ok()?;
        let node = self.lookup_absolute(&path).ok()?;
        Some((path, node))
    }

    /// path（絶対パス）に object を登録する。
    pub fn add_named_object(
        &self,
        created: &mut Vec<NameString>,
        path: &NameString,
        object: ObjectRef,
    ) -> AmlResult<()> {
        let (parent_path, seg) = match (path.parent(), path.last_segment()) {
            (Some(parent), Some(seg)) if path.is_absolute() => (parent, seg),
            _ => return Err(AmlError::InvalidNameString),
        };
        let parent = self.lookup_absolute(&parent_path)?;

        {
            let mut guard = object.lock();
            if let Some(scope) = guard.as_scope_mut() {
                scope.attach(path.clone(), Arc::downgrade(&parent));
            }
        }

        {
            let mut guard = parent.lock();
            match &mut *guard {
                Object::Scope(scope) => scope.insert(seg, object)?,
                Object::Method(method) => method.insert_local(seg, object)?,
                _ => return Err(AmlError::NotAScope(parent_path)),
            }
        }

        created.push(path.clone());
        trace_namespace(NamespaceEvent::Added, path);
        Ok(())
    }

    /// 絶対パスの node を親から外して返す。子孫は外した node にぶら下がったまま。
    pub fn remove_named_object(&self, path: &NameString) -> AmlResult<ObjectRef> {
        if !path.is_absolute() {
            return Err(AmlError::InvalidNameString);
        }
        let (parent_path, seg) = match (path.parent(), path.last_segment()) {
            (Some(parent), Some(seg)) => (parent, seg),
            _ => return Err(AmlError::CannotRemoveRoot),
        };
        let parent = self.lookup_absolute(&parent_path)?;

        let removed = {
            let mut guard = parent.lock();
            match &mut *guard {
                Object::Scope(scope) => scope.remove(seg),
                Object::Method(method) => method.remove_local(seg),
                _ => return Err(AmlError::NotAScope(parent_path)),
            }
        };

        let removed = removed.ok_or_else(|| AmlError::NameNotFound(path.clone()))?;
        trace_namespace(NamespaceEvent::Removed, path);
        Ok(removed)
    }

    /// scope 直下の子を（lock を離した状態で）列挙する。順序は NameSeg 順。
    pub fn children_of(&self, path: &NameString) -> AmlResult<Vec<(NameString, ObjectRef)>> {
        let node = self.lookup_absolute(path)?;
        let guard = node.lock();
        let scope = guard.as_scope().ok_or_else(|| AmlError::NotAScope(path.clone()))?;
        Ok(scope.children().map(|(seg, child)| (path.child(*seg), child.clone())).collect())
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Namespace::new()
    }
}

fn copy_seg(name: &str) -> [u8; 4] {
    let mut raw = [b'_'; 4];
    for (dst, src) in raw.iter_mut().zip(name.bytes()) {
        *dst = src;
    }
    raw
}

fn is_scope_like(node: &ObjectRef) -> bool {
    let guard = node.lock();
    let holds_names = match &*guard {
        Object::Reference(target) => target.lock().holds_names(),
        other => other.holds_names(),
    };
    holds_names
}

/// node が名前を持てるなら直下の子を引く。Alias（Reference）は 1 段だけ辿る。
/// method の下には実行中に作られた名前だけがある。名前を持てない node なら Err。
fn child_of(node: &ObjectRef, seg: NameSeg) -> Result<Option<ObjectRef>, ()> {
    let alias_target = {
        let guard = node.lock();
        match &*guard {
            Object::Reference(target) => target.clone(),
            other if other.holds_names() => return Ok(other.named_child(seg)),
            _ => return Err(()),
        }
    };
    let guard = alias_target.lock();
    if guard.holds_names() {
        Ok(guard.named_child(seg))
    } else {
        Err(())
    }
}
