// aml/src/device.rs
//
// 役割:
// - ドライバ側から使うデバイス単位のサービスを提供する。
//
// やること:
// - EISA ID（"PNP0C0A" ⇄ 圧縮 32bit）の encode / decode。
// - find_devices_by_hid: _HID / _CID が一致する Device の正規パスを列挙する。
// - initialize_objects: \_INI、\_SB._INI、各 Device の _STA / _INI を実行する。
// - evaluate_query: EC の _Qxx を呼ぶ（GPE ワーカーから）。
//
// やらないこと:
// - _PRT / _CRS の解釈（呼び出し側が evaluate して使う）。
//
// 規則:
// - _STA が無ければ 0x0F（present / enabled / shown / functioning）。
// - present でも functioning でもない Device の子は辿らない。

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{AmlError, AmlResult};
use crate::interp::AmlContext;
use crate::name::{NameSeg, NameString};
use crate::object::{Object, ObjectRef, PackageElement};

/// _STA bit0
pub const STA_PRESENT: u64 = 1 << 0;
/// _STA bit3
pub const STA_FUNCTIONING: u64 = 1 << 3;
/// _STA が無いときの値
pub const STA_DEFAULT: u64 = 0x0F;

/// 圧縮 EISA ID（_HID の Integer 形式）を "PNP0C0A" のような 7 文字にする
pub fn eisa_id_to_string(id: u32) -> String {
    // byte 列は big-endian で読む
    let v = id.swap_bytes();
    let mut s = String::with_capacity(7);
    for shift in [26u32, 21, 16] {
        let c = ((v >> shift) & 0x1F) as u8;
        s.push((b'@' + c) as char);
    }
    for shift in [12u32, 8, 4, 0] {
        let nibble = (v >> shift) & 0xF;
        s.push(core::char::from_digit(nibble, 16).unwrap_or('0').to_ascii_uppercase());
    }
    s
}

/// "PNP0C0A" を圧縮 EISA ID にする（形式が違えば None）
pub fn eisa_id_from_str(s: &str) -> Option<u32> {
    let bytes = s.as_bytes();
    if bytes.len() != 7 {
        return None;
    }
    let mut v: u32 = 0;
    for &b in &bytes[..3] {
        if !(b'A'..=b'Z').contains(&b) {
            return None;
        }
        v = (v << 5) | (b - b'@') as u32;
    }
    for &b in &bytes[3..] {
        let digit = (b as char).to_digit(16)?;
        v = (v << 4) | digit;
    }
    Some(v.swap_bytes())
}

impl AmlContext {
    /// _HID（または _CID）が hid に一致する Device の正規パス
    pub fn find_devices_by_hid(&mut self, hid: &str) -> AmlResult<Vec<NameString>> {
        let mut found = Vec::new();
        let mut pending = alloc::vec![NameString::root()];

        while let Some(scope) = pending.pop() {
            for (path, node) in self.namespace().children_of(&scope)? {
                let (is_scope, is_device) = {
                    let guard = node.lock();
                    (guard.is_scope(), guard.is_device())
                };
                if !is_scope {
                    continue;
                }
                if is_device && self.device_matches(&path, hid)? {
                    found.push(path.clone());
                }
                pending.push(path);
            }
        }

        found.sort_by(|a, b| alloc::format!("{}", a).cmp(&alloc::format!("{}", b)));
        Ok(found)
    }

    fn device_matches(&mut self, path: &NameString, hid: &str) -> AmlResult<bool> {
        for name in [*b"_HID", *b"_CID"] {
            let id_path = path.child(NameSeg::from_raw(name));
            let node = match self.namespace().lookup_absolute(&id_path) {
                Ok(node) => node,
                Err(_) => continue,
            };
            let value = match self.evaluate_node(path, &node) {
                Ok(value) => value,
                Err(e) => {
                    log::warn!("(AML) {} could not be evaluated: {}", id_path, e);
                    continue;
                }
            };
            if id_matches(&value, hid) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// \_INI と \_SB._INI を走らせ、設定に応じて Device を辿って _STA / _INI を実行する
    pub fn initialize_objects(&mut self) -> AmlResult<()> {
        for path in ["\\_INI", "\\_SB._INI"] {
            let path: NameString = path.parse()?;
            if let Ok(node) = self.namespace().lookup_absolute(&path) {
                self.run_ini(&path, &node);
            }
        }

        if !self.config().initialize_devices {
            return Ok(());
        }

        let mut initialized = 0usize;
        let mut pending = alloc::vec![NameString::root()];
        while let Some(scope) = pending.pop() {
            for (path, node) in self.namespace().children_of(&scope)? {
                let (is_scope, is_device) = {
                    let guard = node.lock();
                    (guard.is_scope(), guard.is_device())
                };
                if !is_scope {
                    continue;
                }
                if !is_device {
                    pending.push(path);
                    continue;
                }

                let status = match self.evaluate_optional(&path, *b"_STA") {
                    Ok(status) => status.unwrap_or(STA_DEFAULT),
                    Err(e) => {
                        log::warn!("(AML) {}._STA failed: {}", path, e);
                        0
                    }
                };

                if status & STA_PRESENT != 0 {
                    let ini = path.child(NameSeg::from_raw(*b"_INI"));
                    if let Ok(node) = self.namespace().lookup_absolute(&ini) {
                        self.run_ini(&ini, &node);
                        initialized += 1;
                    }
                }
                if status & (STA_PRESENT | STA_FUNCTIONING) != 0 {
                    pending.push(path);
                }
            }
        }

        log::info!("(AML) device initialization done: {} _INI methods run", initialized);
        Ok(())
    }

    fn run_ini(&mut self, path: &NameString, node: &ObjectRef) {
        if let Err(e) = self.method_call(path, node, Vec::new()) {
            log::warn!("(AML) {} failed: {}", path, e);
        }
    }

    /// EC の query method _Qxx を呼ぶ
    pub fn evaluate_query(&mut self, ec_path: &NameString, query: u8) -> AmlResult<Object> {
        let path = ec_path.child(query_method_name(query));
        let node = self.namespace().lookup_absolute(&path)?;
        if !matches!(&*node.lock(), Object::Method(_)) {
            return Err(AmlError::NotAMethod(path));
        }
        log::debug!("(AML) query {}", path);
        self.method_call(&path, &node, Vec::new())
    }
}

/// Integer（EISA ID）/ String / それらの Package（_CID）
fn id_matches(value: &Object, hid: &str) -> bool {
    match value {
        Object::Integer(i) => eisa_id_to_string(i.value as u32) == hid,
        Object::String(s) => s == hid,
        Object::Package(elements) => elements.iter().any(|e| match e {
            PackageElement::Value(v) => {
                let inner = v.lock().clone();
                id_matches(&inner, hid)
            }
            PackageElement::Deferred { .. } => false,
        }),
        _ => false,
    }
}

/// _Qxx（xx は 2 桁の大文字 16 進）
pub fn query_method_name(query: u8) -> NameSeg {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    NameSeg::from_raw([b'_', b'Q', HEX[(query >> 4) as usize], HEX[(query & 0x0F) as usize]])
}
