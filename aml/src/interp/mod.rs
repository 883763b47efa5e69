// aml/src/interp/mod.rs
//
// 役割:
// - AmlContext（namespace + 評価器 + RegionHandler + Host）を提供し、
//   テーブルのロードと method の評価を受け付ける唯一の入口にする。
//
// やること:
// - load_table: DSDT / SSDT 本体を TermList として実行し、作った名前を LoadedTable に記録する。
//   途中で失敗したらそのテーブルで作った名前をすべて外してエラーを返す（テーブル単位の回復）。
// - method_call / evaluate_node: Method / Reference / Field の間接を解いて値にする。
// - 実行フレーム（Local0-7 / Arg0-6 / method 中に作った名前）の管理。
//
// やらないこと:
// - テーブルの発見 / checksum 検証（テーブルローダの責務）。
// - 並行実行の制御（global.rs の 1 つの lock で直列化する）。
//
// 構成:
// - term.rs:  named object / 制御文（Type1）
// - expr.rs:  式（Type2）
// - value.rs: 値の読み出し / store 先の解釈
// - field.rs: Field / IndexField 定義と OpRegion アクセス

mod expr;
mod field;
mod term;
mod value;

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::config::AmlConfig;
use crate::error::{AmlError, AmlResult};
use crate::host::{Host, NullHost};
use crate::name::{NameSeg, NameString};
use crate::namespace::Namespace;
use crate::object::{new_ref, Method, MethodBody, MethodFlags, Object, ObjectRef};
use crate::parser::Cursor;
use crate::region::{RegionHandler, RegionSpace, SystemIoHandler, SystemMemoryHandler};

pub(crate) use value::Target;

/// _REV が返す値（ACPI 2.0 以降の 64bit integer）
pub const AML_REVISION: u64 = 2;

/// \_OSI が真を返すインタフェース名
const SUPPORTED_OSI: &[&str] = &[
    "Windows 2000",
    "Windows 2001",
    "Windows 2006",
    "Windows 2009",
    "Windows 2012",
    "Windows 2015",
    "Module Device",
    "Processor Device",
    "3.0 Thermal Model",
    "Extended Address Space Descriptor",
];

/// load_table が作った名前の記録。unload_table にそのまま渡す。
#[derive(Clone, Debug, Default)]
pub struct LoadedTable {
    pub created: Vec<NameString>,
}

/// TermList 実行後の制御の行き先
pub(crate) enum Flow {
    Next,
    Return(Object),
    Break,
    Continue,
}

/// 1 回の method 呼び出し（またはテーブルロード）の実行状態
pub(crate) struct Frame {
    /// 名前解決の基点。Scope / Device 本体の中では一時的に差し替わる。
    pub scope: NameString,
    pub locals: [Option<ObjectRef>; 8],
    pub args: [Option<ObjectRef>; 7],
    /// このフレームで namespace に追加した正規パス（作成順）
    pub created: Vec<NameString>,
}

impl Frame {
    fn new(scope: NameString, args: Vec<ObjectRef>) -> Self {
        let mut frame = Frame {
            scope,
            locals: Default::default(),
            args: Default::default(),
            created: Vec::new(),
        };
        for (slot, arg) in frame.args.iter_mut().zip(args) {
            *slot = Some(arg);
        }
        frame
    }
}

pub struct AmlContext {
    namespace: Namespace,
    config: AmlConfig,
    handlers: BTreeMap<RegionSpace, Box<dyn RegionHandler>>,
    host: Box<dyn Host>,
    call_depth: usize,
}

impl AmlContext {
    pub fn new(config: AmlConfig) -> Self {
        Self::with_host(config, Box::new(NullHost))
    }

    pub fn with_host(config: AmlConfig, host: Box<dyn Host>) -> Self {
        let mut ctx = AmlContext {
            namespace: Namespace::new(),
            config,
            handlers: BTreeMap::new(),
            host,
            call_depth: 0,
        };
        ctx.install_predefined();
        ctx
    }

    /// \_OSI / \_OS_ / \_REV
    fn install_predefined(&mut self) {
        let mut created = Vec::new();
        let root = NameString::root();
        let predefined = [
            (
                NameSeg::from_raw(*b"_OSI"),
                Object::Method(Method::new(
                    MethodFlags::from_bits_retain(1),
                    MethodBody::Native(osi),
                    root.child(NameSeg::from_raw(*b"_OSI")),
                )),
            ),
            (NameSeg::from_raw(*b"_OS_"), Object::string("Microsoft Windows NT")),
            (NameSeg::from_raw(*b"_REV"), Object::integer(AML_REVISION)),
        ];
        for (seg, object) in predefined {
            if let Err(e) = self.namespace.add_named_object(&mut created, &root.child(seg), new_ref(object)) {
                log::error!("(AML) predefined {} not installed: {}", seg, e);
            }
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn config(&self) -> &AmlConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: AmlConfig) {
        self.config = config;
    }

    /// space のハンドラを差し替える。以前のハンドラがあれば返す。
    pub fn install_region_handler(
        &mut self,
        space: RegionSpace,
        handler: Box<dyn RegionHandler>,
    ) -> Option<Box<dyn RegionHandler>> {
        log::debug!("(AML) region handler installed for {:?}", space);
        self.handlers.insert(space, handler)
    }

    /// SystemIO と SystemMemory の組み込みハンドラを入れる。
    ///
    /// # Safety
    /// - phys_offset は SystemMemoryHandler::new と同じ契約を満たすこと。
    pub unsafe fn install_default_handlers(&mut self, phys_offset: u64) {
        self.install_region_handler(RegionSpace::SystemIo, Box::new(SystemIoHandler));
        self.install_region_handler(
            RegionSpace::SystemMemory,
            Box::new(SystemMemoryHandler::new(phys_offset)),
        );
    }

    /// DSDT / SSDT の本体（ヘッダの後ろ）を読み込む。
    pub fn load_table(&mut self, aml: &[u8]) -> AmlResult<LoadedTable> {
        let mut frame = Frame::new(NameString::root(), Vec::new());
        let mut c = Cursor::new(aml);

        let result = self.execute_term_list(&mut frame, &mut c);
        let created = core::mem::take(&mut frame.created);

        match result {
            Ok(Flow::Next) | Ok(Flow::Return(_)) => {
                log::info!("(AML) table loaded: {} objects, {} bytes", created.len(), aml.len());
                Ok(LoadedTable { created })
            }
            Ok(Flow::Break) | Ok(Flow::Continue) => {
                self.remove_created(&created);
                Err(AmlError::BreakOutsideLoop)
            }
            Err(e) => {
                log::error!("(AML) table load failed at offset {:#x}: {}", c.offset(), e);
                self.remove_created(&created);
                Err(e)
            }
        }
    }

    /// load_table が作った名前を作成の逆順に外す。
    pub fn unload_table(&mut self, table: LoadedTable) -> AmlResult<()> {
        self.remove_created(&table.created);
        Ok(())
    }

    fn remove_created(&mut self, created: &[NameString]) {
        for path in created.iter().rev() {
            // 親ごと先に外れている子は NameNotFound になる
            match self.namespace.remove_named_object(path) {
                Ok(_) | Err(AmlError::NameNotFound(_)) => {}
                Err(e) => log::warn!("(AML) could not remove {}: {}", path, e),
            }
        }
    }

    pub fn find_named_object(&self, base: &NameString, name: &NameString) -> Option<(NameString, ObjectRef)> {
        self.namespace.find_object(base, name)
    }

    /// node を具体的な値にする（Method は引数無しで呼ぶ、Reference は辿る、Field は読む）。
    pub fn evaluate_node(&mut self, scope: &NameString, node: &ObjectRef) -> AmlResult<Object> {
        let mut node = node.clone();
        loop {
            let next = {
                let guard = node.lock();
                match &*guard {
                    Object::Reference(target) => Some(target.clone()),
                    _ => None,
                }
            };
            match next {
                Some(target) => node = target,
                None => break,
            }
        }

        let is_method = matches!(&*node.lock(), Object::Method(_));
        if is_method {
            return self.method_call(scope, &node, Vec::new());
        }
        self.read_value(&node)
    }

    /// 絶対パスの object を評価する（Method なら args を渡して呼ぶ）。
    pub fn evaluate(&mut self, path: &NameString, args: Vec<Object>) -> AmlResult<Object> {
        let node = self.namespace.lookup_absolute(path)?;
        let is_method = matches!(&*node.lock(), Object::Method(_));
        if is_method {
            self.method_call(path, &node, args)
        } else {
            self.evaluate_node(path, &node)
        }
    }

    /// method を呼ぶ。scope はエラー表示用の呼び出し元の名前。
    pub fn method_call(&mut self, scope: &NameString, method: &ObjectRef, args: Vec<Object>) -> AmlResult<Object> {
        let args = args.into_iter().map(new_ref).collect();
        self.invoke(scope, method, args)
    }

    pub(crate) fn invoke(&mut self, name: &NameString, method: &ObjectRef, args: Vec<ObjectRef>) -> AmlResult<Object> {
        let method = match &*method.lock() {
            Object::Method(m) => m.clone(),
            _ => return Err(AmlError::NotAMethod(name.clone())),
        };
        if args.len() > 7 {
            return Err(AmlError::TooManyArgs(args.len()));
        }
        if self.call_depth >= self.config.max_call_depth {
            log::error!("(AML) call depth {} exceeded at {}", self.config.max_call_depth, name);
            return Err(AmlError::CallDepthExceeded(self.config.max_call_depth));
        }

        match method.body {
            MethodBody::Native(native) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in &args {
                    values.push(self.read_value(arg)?);
                }
                native(&values)
            }
            MethodBody::Aml(code) => {
                let mut frame = Frame::new(method.scope.clone(), args);
                let mut c = Cursor::new(&code);

                self.call_depth += 1;
                let result = self.execute_term_list(&mut frame, &mut c);
                self.call_depth -= 1;

                // method 実行中に作った名前は戻るときに消える
                let created = core::mem::take(&mut frame.created);
                self.remove_created(&created);

                match result {
                    Ok(Flow::Return(value)) => Ok(value),
                    Ok(Flow::Next) => Ok(Object::integer(0)),
                    Ok(Flow::Break) | Ok(Flow::Continue) => Err(AmlError::BreakOutsideLoop),
                    Err(e) => {
                        log::warn!("(AML) method {} failed: {}", name, e);
                        Err(e)
                    }
                }
            }
        }
    }

    pub(crate) fn host(&mut self) -> &mut dyn Host {
        self.host.as_mut()
    }

    pub(crate) fn handler(&mut self, space: RegionSpace) -> AmlResult<&mut Box<dyn RegionHandler>> {
        self.handlers.get_mut(&space).ok_or(AmlError::NoRegionHandler(space))
    }
}

fn osi(args: &[Object]) -> AmlResult<Object> {
    let interface = match args.first() {
        Some(arg) => arg.to_aml_string()?,
        None => return Err(AmlError::UninitializedArg(0)),
    };
    let supported = SUPPORTED_OSI.contains(&interface.as_str());
    log::debug!("(AML) _OSI(\"{}\") = {}", interface, supported);
    Ok(if supported { Object::integer(u64::MAX) } else { Object::integer(0) })
}

pub(crate) fn method_from_body(flags: u8, code: &[u8], scope: NameString) -> Object {
    Object::Method(Method::new(MethodFlags::from_bits_retain(flags), MethodBody::Aml(Arc::from(code)), scope))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predefined_objects_are_installed() {
        let mut ctx = AmlContext::new(AmlConfig::default());
        let rev = ctx.evaluate(&"\\_REV".parse().unwrap(), Vec::new()).unwrap();
        assert_eq!(rev.as_integer(), Some(AML_REVISION));

        let yes = ctx.evaluate(&"\\_OSI".parse().unwrap(), alloc::vec![Object::string("Windows 2009")]).unwrap();
        assert_eq!(yes.as_integer(), Some(u64::MAX));
        let no = ctx.evaluate(&"\\_OSI".parse().unwrap(), alloc::vec![Object::string("Darwin")]).unwrap();
        assert_eq!(no.as_integer(), Some(0));
    }

    #[test]
    fn failed_load_rolls_back_created_names() {
        let mut ctx = AmlContext::new(AmlConfig::default());
        // Name(AAAA, 1) の後に未知の opcode
        let aml = [0x08, b'A', b'A', b'A', b'A', 0x01, 0x02];
        assert!(ctx.load_table(&aml).is_err());
        assert!(ctx.namespace().lookup_absolute(&"\\AAAA".parse().unwrap()).is_err());
    }
}
