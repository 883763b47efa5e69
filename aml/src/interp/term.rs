// aml/src/interp/term.rs
//
// 役割:
// - TermList を 1 term ずつ実行する（named object の定義と制御文）。
//
// やること:
// - Name / Alias / Scope / Device / Method / Mutex / Event / OpRegion / Processor /
//   PowerResource / ThermalZone / CreateXxxField の定義。
// - If / Else / While / Return / Break / Continue / Notify / Sleep / Stall / Fatal など。
// - それ以外の opcode は式文として expr.rs に渡し、結果は捨てる。
//
// やらないこと:
// - Field / IndexField の要素の解釈（field.rs）。
//
// 規則:
// - PkgLength で枠付けされた構文は framed() で切り出したサブビューの上で実行する。
//   外側の cursor は中身の parse 結果に関係なく span の末尾へ進む。
// - 新しい名前は frame.created に積む（method なら戻るときに消える）。

use super::{method_from_body, AmlContext, Flow, Frame};
use crate::error::{AmlError, AmlResult};
use crate::name::NameString;
use crate::object::{new_ref, AmlMutex, BufferField, Object, ObjectRef, OpRegion, Scope, ScopeKind};
use crate::opcode::*;
use crate::parser::{framed, Cursor};
use crate::region::RegionSpace;
use crate::trace::trace_opcode;

impl AmlContext {
    pub(crate) fn execute_term_list(&mut self, frame: &mut Frame, c: &mut Cursor<'_>) -> AmlResult<Flow> {
        while !c.is_empty() {
            match self.execute_term(frame, c)? {
                Flow::Next => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Next)
    }

    fn execute_term(&mut self, frame: &mut Frame, c: &mut Cursor<'_>) -> AmlResult<Flow> {
        let offset = c.offset();
        let op = c.peek()?;

        if op == EXT_OP_PREFIX {
            let ext_op = c.peek_at(1).ok_or(AmlError::UnexpectedEndOfStream)?;
            if let Some(flow) = self.execute_ext_term(frame, c, ext_op, offset)? {
                return Ok(flow);
            }
            // 式文（Acquire / Wait / CondRefOf など）
            self.eval(frame, c)?;
            return Ok(Flow::Next);
        }

        let statement = matches!(
            op,
            NAME_OP
                | ALIAS_OP
                | SCOPE_OP
                | METHOD_OP
                | EXTERNAL_OP
                | IF_OP
                | ELSE_OP
                | WHILE_OP
                | RETURN_OP
                | BREAK_OP
                | CONTINUE_OP
                | NOOP_OP
                | BREAKPOINT_OP
                | NOTIFY_OP
                | CREATE_BIT_FIELD_OP
                | CREATE_BYTE_FIELD_OP
                | CREATE_WORD_FIELD_OP
                | CREATE_DWORD_FIELD_OP
                | CREATE_QWORD_FIELD_OP
        );
        if !statement {
            self.eval(frame, c)?;
            return Ok(Flow::Next);
        }

        trace_opcode(op as u16, offset);
        c.next_byte()?;

        match op {
            NAME_OP => {
                let name = NameString::parse(c)?;
                let value = self.eval_value(frame, c)?;
                self.define(frame, &name, value.copy())?;
            }
            ALIAS_OP => {
                let source = NameString::parse(c)?;
                let alias = NameString::parse(c)?;
                let (_, node) = self.resolve(frame, &source)?;
                self.define(frame, &alias, Object::Reference(node))?;
            }
            SCOPE_OP => {
                let mut body = framed(c)?;
                let name = NameString::parse(&mut body)?;
                let path = self.namespace.resolve_path(&frame.scope, &name)?;
                let node = self.namespace.lookup_absolute(&path)?;
                if !node.lock().is_scope() {
                    return Err(AmlError::NotAScope(path));
                }
                return self.execute_in_scope(frame, path, &mut body);
            }
            METHOD_OP => {
                let mut body = framed(c)?;
                let name = NameString::parse(&mut body)?;
                let flags = body.next_byte()?;
                // 本体は method 自身のパスを基点に名前を解決する
                let path = self.definition_path(frame, &name)?;
                let method = method_from_body(flags, body.remaining(), path.clone());
                self.define_at(frame, path, method)?;
            }
            EXTERNAL_OP => {
                // 他テーブルの名前の宣言。名前空間には何もしない。
                let _name = NameString::parse(c)?;
                let _object_type = c.next_byte()?;
                let _arg_count = c.next_byte()?;
            }

            IF_OP => return self.execute_if(frame, c),
            ELSE_OP => {
                // If に続かない Else は本体ごと読み飛ばす
                framed(c)?;
            }
            WHILE_OP => return self.execute_while(frame, c),
            RETURN_OP => {
                let value = self.eval_value(frame, c)?;
                return Ok(Flow::Return(value.copy()));
            }
            BREAK_OP => return Ok(Flow::Break),
            CONTINUE_OP => return Ok(Flow::Continue),
            NOOP_OP => {}
            BREAKPOINT_OP => log::debug!("(AML) Breakpoint at {:#x}", offset),

            NOTIFY_OP => {
                let path = match c.peek()? {
                    b if is_name_string_lead(b) => {
                        let name = NameString::parse(c)?;
                        self.resolve(frame, &name)?.0
                    }
                    _ => {
                        let target = self.parse_target(frame, c)?;
                        let node = self.target_node(frame, &target)?;
                        scope_path_of(&node).unwrap_or_else(NameString::root)
                    }
                };
                let value = self.eval_integer(frame, c)?;
                self.host().notify(&path, value);
            }

            CREATE_BIT_FIELD_OP | CREATE_BYTE_FIELD_OP | CREATE_WORD_FIELD_OP | CREATE_DWORD_FIELD_OP
            | CREATE_QWORD_FIELD_OP => {
                let source = self.eval(frame, c)?;
                let index = self.eval_integer(frame, c)?;
                let name = NameString::parse(c)?;
                // bit_offset が u64 に収まらなければ None（範囲外として扱う）
                let (bit_offset, bit_count) = match op {
                    CREATE_BIT_FIELD_OP => (Some(index), 1),
                    CREATE_BYTE_FIELD_OP => (index.checked_mul(8), 8),
                    CREATE_WORD_FIELD_OP => (index.checked_mul(8), 16),
                    CREATE_DWORD_FIELD_OP => (index.checked_mul(8), 32),
                    _ => (index.checked_mul(8), 64),
                };
                self.create_buffer_field(frame, source, bit_offset, bit_count, &name)?;
            }

            other => return Err(AmlError::UnknownOpcode(other)),
        }
        Ok(Flow::Next)
    }

    /// 0x5B で始まる term。式なら None を返して呼び出し側に任せる。
    fn execute_ext_term(
        &mut self,
        frame: &mut Frame,
        c: &mut Cursor<'_>,
        ext_op: u8,
        offset: usize,
    ) -> AmlResult<Option<Flow>> {
        let statement = matches!(
            ext_op,
            EXT_MUTEX_OP
                | EXT_EVENT_OP
                | EXT_OP_REGION_OP
                | EXT_FIELD_OP
                | EXT_INDEX_FIELD_OP
                | EXT_BANK_FIELD_OP
                | EXT_DATA_REGION_OP
                | EXT_DEVICE_OP
                | EXT_PROCESSOR_OP
                | EXT_POWER_RES_OP
                | EXT_THERMAL_ZONE_OP
                | EXT_CREATE_FIELD_OP
                | EXT_SLEEP_OP
                | EXT_STALL_OP
                | EXT_RELEASE_OP
                | EXT_SIGNAL_OP
                | EXT_RESET_OP
                | EXT_FATAL_OP
        );
        if !statement {
            return Ok(None);
        }

        trace_opcode(ext(ext_op), offset);
        c.next_byte()?;
        c.next_byte()?;

        match ext_op {
            EXT_MUTEX_OP => {
                let name = NameString::parse(c)?;
                let sync_level = c.next_byte()? & 0x0F;
                self.define(frame, &name, Object::Mutex(AmlMutex { sync_level }))?;
            }
            EXT_EVENT_OP => {
                let name = NameString::parse(c)?;
                self.define(frame, &name, Object::Event)?;
            }
            EXT_OP_REGION_OP => {
                let name = NameString::parse(c)?;
                let space = RegionSpace::from(c.next_byte()?);
                let region_offset = self.eval_integer(frame, c)?;
                let length = self.eval_integer(frame, c)?;
                let region = OpRegion { space, offset: region_offset, length, parent: frame.scope.clone() };
                log::debug!("(AML) OpRegion {} {:?} base={:#x} len={:#x}", name, space, region_offset, length);
                self.define(frame, &name, Object::OpRegion(region))?;
            }
            EXT_FIELD_OP => self.def_field(frame, c)?,
            EXT_INDEX_FIELD_OP => self.def_index_field(frame, c)?,
            EXT_BANK_FIELD_OP => {
                framed(c)?;
                log::warn!("(AML) BankField at {:#x} skipped", offset);
            }
            EXT_DATA_REGION_OP => {
                let name = NameString::parse(c)?;
                for _ in 0..3 {
                    self.eval_value(frame, c)?;
                }
                log::warn!("(AML) DataRegion {} skipped", name);
            }

            EXT_DEVICE_OP => {
                let mut body = framed(c)?;
                let name = NameString::parse(&mut body)?;
                let path = self.define(frame, &name, Object::Scope(Scope::new(ScopeKind::Device)))?;
                return self.execute_in_scope(frame, path, &mut body).map(Some);
            }
            EXT_PROCESSOR_OP => {
                let mut body = framed(c)?;
                let name = NameString::parse(&mut body)?;
                let proc_id = body.next_byte()?;
                let pblk_address = body.next_u32()?;
                let pblk_len = body.next_byte()?;
                let kind = ScopeKind::Processor { proc_id, pblk_address, pblk_len };
                let path = self.define(frame, &name, Object::Scope(Scope::new(kind)))?;
                return self.execute_in_scope(frame, path, &mut body).map(Some);
            }
            EXT_POWER_RES_OP => {
                let mut body = framed(c)?;
                let name = NameString::parse(&mut body)?;
                let system_level = body.next_byte()?;
                let resource_order = body.next_u16()?;
                let kind = ScopeKind::PowerResource { system_level, resource_order };
                let path = self.define(frame, &name, Object::Scope(Scope::new(kind)))?;
                return self.execute_in_scope(frame, path, &mut body).map(Some);
            }
            EXT_THERMAL_ZONE_OP => {
                let mut body = framed(c)?;
                let name = NameString::parse(&mut body)?;
                let path = self.define(frame, &name, Object::Scope(Scope::new(ScopeKind::ThermalZone)))?;
                return self.execute_in_scope(frame, path, &mut body).map(Some);
            }

            EXT_CREATE_FIELD_OP => {
                let source = self.eval(frame, c)?;
                let bit_offset = self.eval_integer(frame, c)?;
                let bit_count = self.eval_integer(frame, c)?;
                let name = NameString::parse(c)?;
                self.create_buffer_field(frame, source, Some(bit_offset), bit_count, &name)?;
            }

            EXT_SLEEP_OP => {
                let ms = self.eval_integer(frame, c)?;
                self.host().sleep(ms);
            }
            EXT_STALL_OP => {
                let us = self.eval_integer(frame, c)?;
                self.host().stall(us);
            }
            EXT_RELEASE_OP | EXT_SIGNAL_OP | EXT_RESET_OP => {
                let target = self.parse_target(frame, c)?;
                self.target_node(frame, &target)?;
            }
            EXT_FATAL_OP => {
                let fatal_type = c.next_byte()?;
                let code = c.next_u32()?;
                let arg = self.eval_integer(frame, c)?;
                log::error!("(AML) Fatal type={:#x} code={:#x} arg={:#x}", fatal_type, code, arg);
                return Err(AmlError::Fatal { fatal_type, code, arg });
            }

            other => return Err(AmlError::UnknownExtOpcode(other)),
        }
        Ok(Some(Flow::Next))
    }

    /// name を frame.scope 基点で正規パスにして namespace に登録する
    pub(crate) fn define(&mut self, frame: &mut Frame, name: &NameString, object: Object) -> AmlResult<NameString> {
        let path = self.definition_path(frame, name)?;
        self.define_at(frame, path, object)
    }

    /// 定義される名前の正規パス。prefix 無し 1 segment は search rule を使わず現在の scope の直下。
    fn definition_path(&self, frame: &Frame, name: &NameString) -> AmlResult<NameString> {
        if name.is_search_candidate() {
            Ok(frame.scope.child(name.last_segment().ok_or(AmlError::InvalidNameString)?))
        } else {
            self.namespace.resolve_path(&frame.scope, name)
        }
    }

    fn define_at(&mut self, frame: &mut Frame, path: NameString, object: Object) -> AmlResult<NameString> {
        self.namespace.add_named_object(&mut frame.created, &path, new_ref(object))?;
        Ok(path)
    }

    /// scope 本体を path を基点に実行する（終わったら元の基点に戻す）
    fn execute_in_scope(&mut self, frame: &mut Frame, path: NameString, body: &mut Cursor<'_>) -> AmlResult<Flow> {
        let saved = core::mem::replace(&mut frame.scope, path);
        let result = self.execute_term_list(frame, body);
        frame.scope = saved;
        result
    }

    fn execute_if(&mut self, frame: &mut Frame, c: &mut Cursor<'_>) -> AmlResult<Flow> {
        let mut body = framed(c)?;
        let predicate = self.eval_integer(frame, &mut body)?;

        let mut flow = Flow::Next;
        if predicate != 0 {
            flow = self.execute_term_list(frame, &mut body)?;
        }

        if c.peek().ok() == Some(ELSE_OP) {
            trace_opcode(ELSE_OP as u16, c.offset());
            c.next_byte()?;
            let mut else_body = framed(c)?;
            if predicate == 0 {
                flow = self.execute_term_list(frame, &mut else_body)?;
            }
        }
        Ok(flow)
    }

    fn execute_while(&mut self, frame: &mut Frame, c: &mut Cursor<'_>) -> AmlResult<Flow> {
        let body = framed(c)?;
        let limit = self.config.while_loop_limit;
        let mut iterations: u64 = 0;

        loop {
            // 毎回、本体の先頭（predicate）から読み直す
            let mut pass = body;
            if self.eval_integer(frame, &mut pass)? == 0 {
                break;
            }

            if let Some(limit) = limit {
                if iterations >= limit {
                    log::error!("(AML) While exceeded {} iterations", limit);
                    return Err(AmlError::LoopLimitExceeded(limit));
                }
            }
            iterations += 1;

            match self.execute_term_list(frame, &mut pass)? {
                Flow::Next | Flow::Continue => {}
                Flow::Break => break,
                ret @ Flow::Return(_) => return Ok(ret),
            }
        }
        Ok(Flow::Next)
    }

    fn create_buffer_field(
        &mut self,
        frame: &mut Frame,
        source: ObjectRef,
        bit_offset: Option<u64>,
        bit_count: u64,
        name: &NameString,
    ) -> AmlResult<()> {
        let buffer = Self::deref_node(&source);
        let len = match &*buffer.lock() {
            Object::Buffer(bytes) => bytes.len(),
            other => return Err(AmlError::IncompatibleType(other.object_type())),
        };

        let window = bit_offset.and_then(|offset| offset.checked_add(bit_count).map(|end| (offset, end)));
        let (offset, end) = match window {
            Some((offset, end)) if end <= (len as u64).saturating_mul(8) => (offset, end),
            _ => {
                log::error!("(AML) buffer field {} outside {} byte buffer", name, len);
                let index = window.map_or(u64::MAX, |(_, end)| end / 8);
                return Err(AmlError::IndexOutOfBounds { index, len });
            }
        };

        let too_large = |_| AmlError::IndexOutOfBounds { index: end / 8, len };
        let bit_offset = usize::try_from(offset).map_err(too_large)?;
        let bit_count = usize::try_from(bit_count).map_err(too_large)?;
        let field = BufferField { buffer, bit_offset, bit_count };
        self.define(frame, name, Object::BufferField(field))?;
        Ok(())
    }
}

fn scope_path_of(node: &ObjectRef) -> Option<NameString> {
    node.lock().as_scope().map(|scope| scope.path().clone())
}
