// aml/src/interp/expr.rs
//
// 役割:
// - TermArg（式）を評価して node を返す。
//
// やること:
// - データ（定数 / Buffer / Package）、Local / Arg、名前参照と method 呼び出し。
// - 算術 / 論理 / 参照 / 変換の各 opcode。
//
// 規則:
// - 返すのは ObjectRef。名前や Local はその node 自身（Increment が in-place で効くように）、
//   演算結果は新しい node、論理演算は共有 singleton（Ones / Zero）。
// - 失敗は ? でそのまま上へ返す。途中までの副作用は巻き戻さない。

use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt::Write;

use super::{AmlContext, Frame, Target};
use crate::error::{AmlError, AmlResult};
use crate::name::NameString;
use crate::object::convert::{buffer_to_hex_string, fit_buffer};
use crate::object::{boolean, new_ref, one, ones, zero, BufferField, Object, ObjectRef, PackageElement};
use crate::opcode::*;
use crate::parser::{framed, Cursor};
use crate::trace::trace_opcode;

impl AmlContext {
    /// frame.scope を基点に名前を解決して node を得る
    pub(crate) fn resolve(&self, frame: &Frame, name: &NameString) -> AmlResult<(NameString, ObjectRef)> {
        let path = self.namespace.resolve_path(&frame.scope, name)?;
        let node = self.namespace.lookup_absolute(&path)?;
        Ok((path, node))
    }

    /// TermArg を評価して値（Field は読み出し済み）にする
    pub(crate) fn eval_value(&mut self, frame: &mut Frame, c: &mut Cursor<'_>) -> AmlResult<Object> {
        let node = self.eval(frame, c)?;
        self.read_value(&node)
    }

    pub(crate) fn eval_integer(&mut self, frame: &mut Frame, c: &mut Cursor<'_>) -> AmlResult<u64> {
        self.eval_value(frame, c)?.to_integer()
    }

    pub(crate) fn eval(&mut self, frame: &mut Frame, c: &mut Cursor<'_>) -> AmlResult<ObjectRef> {
        let offset = c.offset();
        let op = c.peek()?;

        if op == EXT_OP_PREFIX {
            let ext_op = c.peek_at(1).ok_or(AmlError::UnexpectedEndOfStream)?;
            trace_opcode(ext(ext_op), offset);
            c.next_byte()?;
            c.next_byte()?;
            return self.eval_ext(frame, c, ext_op);
        }

        if is_name_string_lead(op) {
            return self.eval_name(frame, c);
        }

        trace_opcode(op as u16, offset);
        c.next_byte()?;

        match op {
            ZERO_OP => Ok(zero()),
            ONE_OP => Ok(one()),
            ONES_OP => Ok(ones()),
            BYTE_PREFIX => Ok(new_ref(Object::integer(c.next_byte()? as u64))),
            WORD_PREFIX => Ok(new_ref(Object::integer(c.next_u16()? as u64))),
            DWORD_PREFIX => Ok(new_ref(Object::integer(c.next_u32()? as u64))),
            QWORD_PREFIX => Ok(new_ref(Object::integer(c.next_u64()?))),
            STRING_PREFIX => Ok(new_ref(Object::String(parse_string(c)?))),
            BUFFER_OP => self.eval_buffer(frame, c),
            PACKAGE_OP => self.eval_package(frame, c, false),
            VAR_PACKAGE_OP => self.eval_package(frame, c, true),

            LOCAL0_OP..=LOCAL7_OP => Self::local(frame, op - LOCAL0_OP),
            ARG0_OP..=ARG6_OP => Self::arg(frame, op - ARG0_OP),

            STORE_OP => {
                let value = self.eval_value(frame, c)?;
                let target = self.parse_target(frame, c)?;
                let stored = self.store_into(frame, &target, value)?;
                Ok(new_ref(stored))
            }
            COPY_OBJECT_OP => {
                let value = self.eval_value(frame, c)?;
                let target = self.parse_target(frame, c)?;
                let copied = self.copy_into(frame, &target, value)?;
                Ok(new_ref(copied))
            }

            ADD_OP | SUBTRACT_OP | MULTIPLY_OP | SHIFT_LEFT_OP | SHIFT_RIGHT_OP | AND_OP | NAND_OP | OR_OP
            | NOR_OP | XOR_OP | MOD_OP => self.eval_binary(frame, c, op),

            DIVIDE_OP => {
                let dividend = self.eval_integer(frame, c)?;
                let divisor = self.eval_integer(frame, c)?;
                let remainder_target = self.parse_target(frame, c)?;
                let quotient_target = self.parse_target(frame, c)?;
                if divisor == 0 {
                    return Err(AmlError::DivideByZero);
                }
                self.store_into(frame, &remainder_target, Object::integer(dividend % divisor))?;
                let quotient = self.store_into(frame, &quotient_target, Object::integer(dividend / divisor))?;
                Ok(new_ref(quotient))
            }

            NOT_OP => self.eval_unary(frame, c, |v| !v),
            FIND_SET_LEFT_BIT_OP => self.eval_unary(frame, c, |v| 64 - v.leading_zeros() as u64),
            FIND_SET_RIGHT_BIT_OP => self.eval_unary(frame, c, |v| if v == 0 { 0 } else { v.trailing_zeros() as u64 + 1 }),

            INCREMENT_OP | DECREMENT_OP => {
                let target = self.parse_target(frame, c)?;
                let node = self.target_node(frame, &target)?;
                self.step_integer(&node, op == INCREMENT_OP)?;
                Ok(node)
            }

            CONCAT_OP => {
                let lhs = self.eval_value(frame, c)?;
                let rhs = self.eval_value(frame, c)?;
                let target = self.parse_target(frame, c)?;
                let result = concat(&lhs, &rhs)?;
                let stored = self.store_into(frame, &target, result)?;
                Ok(new_ref(stored))
            }

            LNOT_OP => {
                let value = self.eval_integer(frame, c)?;
                Ok(boolean(value == 0))
            }
            LAND_OP | LOR_OP => {
                let lhs = self.eval_integer(frame, c)?;
                let rhs = self.eval_integer(frame, c)?;
                let result = if op == LAND_OP { lhs != 0 && rhs != 0 } else { lhs != 0 || rhs != 0 };
                Ok(boolean(result))
            }
            LEQUAL_OP | LGREATER_OP | LLESS_OP => {
                let lhs = self.eval_value(frame, c)?;
                let rhs = self.eval_value(frame, c)?;
                let ordering = lhs.compare(&rhs)?;
                let result = match op {
                    LEQUAL_OP => ordering == Ordering::Equal,
                    LGREATER_OP => ordering == Ordering::Greater,
                    _ => ordering == Ordering::Less,
                };
                Ok(boolean(result))
            }

            REF_OF_OP => {
                let target = self.parse_target(frame, c)?;
                let node = self.target_node(frame, &target)?;
                Ok(new_ref(Object::Reference(node)))
            }
            DEREF_OF_OP => self.eval_deref(frame, c),
            INDEX_OP => self.eval_index(frame, c),

            SIZE_OF_OP => {
                let target = self.parse_target(frame, c)?;
                let node = Self::deref_node(&self.target_node(frame, &target)?);
                let size = match &*node.lock() {
                    Object::String(s) => s.len(),
                    Object::Buffer(b) => b.len(),
                    Object::Package(p) => p.len(),
                    other => return Err(AmlError::IncompatibleType(other.object_type())),
                };
                Ok(new_ref(Object::integer(size as u64)))
            }

            OBJECT_TYPE_OP => {
                let target = self.parse_target(frame, c)?;
                let node = Self::deref_node(&self.target_node(frame, &target)?);
                let code = node.lock().object_type().acpi_code();
                Ok(new_ref(Object::integer(code)))
            }

            TO_BUFFER_OP => {
                let value = self.eval_value(frame, c)?;
                let target = self.parse_target(frame, c)?;
                let buffer = match value {
                    Object::String(s) if s.is_empty() => Vec::new(),
                    other => other.to_buffer()?,
                };
                let stored = self.store_into(frame, &target, Object::Buffer(buffer))?;
                Ok(new_ref(stored))
            }
            TO_HEX_STRING_OP => {
                let value = self.eval_value(frame, c)?;
                let target = self.parse_target(frame, c)?;
                let s = match value {
                    Object::Buffer(bytes) => buffer_to_hex_string(&bytes, ","),
                    other => other.to_aml_string()?,
                };
                let stored = self.store_into(frame, &target, Object::String(s))?;
                Ok(new_ref(stored))
            }
            TO_DECIMAL_STRING_OP => {
                let value = self.eval_value(frame, c)?;
                let target = self.parse_target(frame, c)?;
                let s = to_decimal_string(&value)?;
                let stored = self.store_into(frame, &target, Object::String(s))?;
                Ok(new_ref(stored))
            }
            TO_INTEGER_OP => {
                let value = self.eval_value(frame, c)?;
                let target = self.parse_target(frame, c)?;
                let v = match &value {
                    Object::String(s) => parse_integer_literal(s),
                    other => other.to_integer()?,
                };
                let stored = self.store_into(frame, &target, Object::integer(v))?;
                Ok(new_ref(stored))
            }

            other => Err(AmlError::UnknownOpcode(other)),
        }
    }

    fn eval_ext(&mut self, frame: &mut Frame, c: &mut Cursor<'_>, ext_op: u8) -> AmlResult<ObjectRef> {
        match ext_op {
            EXT_REVISION_OP => Ok(new_ref(Object::integer(super::AML_REVISION))),
            EXT_DEBUG_OP => Ok(new_ref(Object::Debug)),
            EXT_TIMER_OP => {
                let now = self.host().timer();
                Ok(new_ref(Object::integer(now)))
            }

            EXT_COND_REF_OF_OP => {
                let source = self.try_parse_super_name(frame, c)?;
                let target = self.parse_target(frame, c)?;
                match source {
                    Some(node) => {
                        self.store_into(frame, &target, Object::Reference(node))?;
                        Ok(ones())
                    }
                    None => Ok(zero()),
                }
            }

            EXT_FROM_BCD_OP => self.eval_unary(frame, c, from_bcd),
            EXT_TO_BCD_OP => self.eval_unary(frame, c, to_bcd),

            EXT_ACQUIRE_OP => {
                // 評価は global lock 1 つで直列化されているので常に取れる
                let target = self.parse_target(frame, c)?;
                self.target_node(frame, &target)?;
                let _timeout = c.next_u16()?;
                Ok(zero())
            }
            EXT_WAIT_OP => {
                let target = self.parse_target(frame, c)?;
                self.target_node(frame, &target)?;
                let _timeout = self.eval_integer(frame, c)?;
                Ok(zero())
            }

            EXT_LOAD_OP | EXT_LOAD_TABLE_OP | EXT_UNLOAD_OP => Err(AmlError::UnsupportedOpcode(ext(ext_op))),
            other => Err(AmlError::UnknownExtOpcode(other)),
        }
    }

    /// 名前参照。Method なら引数を読んで呼ぶ。
    fn eval_name(&mut self, frame: &mut Frame, c: &mut Cursor<'_>) -> AmlResult<ObjectRef> {
        let name = NameString::parse(c)?;
        let (path, node) = self.resolve(frame, &name)?;

        let arg_count = match &*node.lock() {
            Object::Method(method) => Some(method.flags.arg_count()),
            _ => None,
        };

        match arg_count {
            Some(count) => {
                let args = self.collect_args(frame, c, count)?;
                let result = self.invoke(&path, &node, args)?;
                Ok(new_ref(result))
            }
            None => Ok(node),
        }
    }

    /// CondRefOf 用: 名前が解決できなくても失敗しない
    fn try_parse_super_name(&mut self, frame: &mut Frame, c: &mut Cursor<'_>) -> AmlResult<Option<ObjectRef>> {
        let op = c.peek()?;
        if is_name_string_lead(op) {
            let name = NameString::parse(c)?;
            return Ok(self.resolve(frame, &name).ok().map(|(_, node)| node));
        }
        let target = self.parse_target(frame, c)?;
        match target {
            Target::None => Ok(None),
            other => Ok(self.target_node(frame, &other).ok()),
        }
    }

    fn eval_binary(&mut self, frame: &mut Frame, c: &mut Cursor<'_>, op: u8) -> AmlResult<ObjectRef> {
        let lhs = self.eval_integer(frame, c)?;
        let rhs = self.eval_integer(frame, c)?;
        let target = self.parse_target(frame, c)?;

        let result = match op {
            ADD_OP => lhs.wrapping_add(rhs),
            SUBTRACT_OP => lhs.wrapping_sub(rhs),
            MULTIPLY_OP => lhs.wrapping_mul(rhs),
            SHIFT_LEFT_OP => lhs.checked_shl(rhs.min(64) as u32).unwrap_or(0),
            SHIFT_RIGHT_OP => lhs.checked_shr(rhs.min(64) as u32).unwrap_or(0),
            AND_OP => lhs & rhs,
            NAND_OP => !(lhs & rhs),
            OR_OP => lhs | rhs,
            NOR_OP => !(lhs | rhs),
            XOR_OP => lhs ^ rhs,
            MOD_OP => {
                if rhs == 0 {
                    return Err(AmlError::DivideByZero);
                }
                lhs % rhs
            }
            other => return Err(AmlError::UnknownOpcode(other)),
        };

        let stored = self.store_into(frame, &target, Object::integer(result))?;
        Ok(new_ref(stored))
    }

    fn eval_unary(&mut self, frame: &mut Frame, c: &mut Cursor<'_>, f: fn(u64) -> u64) -> AmlResult<ObjectRef> {
        let operand = self.eval_integer(frame, c)?;
        let target = self.parse_target(frame, c)?;
        let stored = self.store_into(frame, &target, Object::integer(f(operand)))?;
        Ok(new_ref(stored))
    }

    /// Increment / Decrement の in-place 更新
    fn step_integer(&mut self, node: &ObjectRef, up: bool) -> AmlResult<()> {
        let node = Self::deref_node(node);
        let is_field = matches!(&*node.lock(), Object::FieldElement(_) | Object::IndexFieldElement(_));
        if is_field {
            let value = self.read_value(&node)?.to_integer()?;
            let next = if up { value.wrapping_add(1) } else { value.wrapping_sub(1) };
            self.store_node(&node, Object::integer(next))?;
            return Ok(());
        }

        let mut guard = node.lock();
        match &mut *guard {
            Object::Integer(i) if i.is_constant() => {
                log::error!("(AML) Increment/Decrement of a constant rejected");
                Err(AmlError::StoreToConstant)
            }
            Object::Integer(i) => {
                i.value = if up { i.value.wrapping_add(1) } else { i.value.wrapping_sub(1) };
                Ok(())
            }
            other => Err(AmlError::IncompatibleType(other.object_type())),
        }
    }

    fn eval_deref(&mut self, frame: &mut Frame, c: &mut Cursor<'_>) -> AmlResult<ObjectRef> {
        let node = self.eval(frame, c)?;
        let snapshot = node.lock().clone();
        match snapshot {
            Object::Reference(target) => Ok(target),
            Object::BufferField(_) => Ok(node),
            // 文字列は名前として引く
            Object::String(s) => {
                let name: NameString = s.parse()?;
                let (_, target) = self.resolve(frame, &name)?;
                Ok(target)
            }
            other => Err(AmlError::NotAReference(other.object_type())),
        }
    }

    /// Index(source, index, target)
    /// - Buffer / String: 1 byte の BufferField
    /// - Package: 要素への Reference（名前要素はここで解決する）
    fn eval_index(&mut self, frame: &mut Frame, c: &mut Cursor<'_>) -> AmlResult<ObjectRef> {
        let source = Self::deref_node(&self.eval(frame, c)?);
        let index = self.eval_integer(frame, c)?;
        let target = self.parse_target(frame, c)?;

        let picked = {
            let guard = source.lock();
            match &*guard {
                Object::Buffer(bytes) => {
                    check_index(index, bytes.len())?;
                    Ok(Object::BufferField(BufferField {
                        buffer: source.clone(),
                        bit_offset: index as usize * 8,
                        bit_count: 8,
                    }))
                }
                Object::String(text) => {
                    check_index(index, text.len())?;
                    Ok(Object::BufferField(BufferField {
                        buffer: source.clone(),
                        bit_offset: index as usize * 8,
                        bit_count: 8,
                    }))
                }
                Object::Package(elements) => {
                    check_index(index, elements.len())?;
                    match &elements[index as usize] {
                        PackageElement::Value(v) => Ok(Object::Reference(v.clone())),
                        PackageElement::Deferred { scope, name } => Err((scope.clone(), name.clone())),
                    }
                }
                other => return Err(AmlError::IncompatibleType(other.object_type())),
            }
        };

        let element = match picked {
            Ok(element) => element,
            Err((scope, name)) => match self.namespace.find_object(&scope, &name) {
                Some((_, node)) => Object::Reference(node),
                // 解決できない名前は文字列として返す（_PRT の source など）
                None => Object::String(alloc::format!("{}", name)),
            },
        };

        let result = new_ref(element.clone());
        if !matches!(target, Target::None) {
            self.store_into(frame, &target, element)?;
        }
        Ok(result)
    }

    fn eval_buffer(&mut self, frame: &mut Frame, c: &mut Cursor<'_>) -> AmlResult<ObjectRef> {
        let mut body = framed(c)?;
        let size = object_size(self.eval_integer(frame, &mut body)?)?;
        let init = body.remaining();
        let len = core::cmp::max(size, init.len());

        let mut bytes: Vec<u8> = Vec::new();
        bytes.try_reserve_exact(len).map_err(|_| AmlError::ObjectTooLarge(len as u64))?;
        bytes.extend_from_slice(init);
        Ok(new_ref(Object::Buffer(fit_buffer(bytes, len))))
    }

    fn eval_package(&mut self, frame: &mut Frame, c: &mut Cursor<'_>, variable: bool) -> AmlResult<ObjectRef> {
        let mut body = framed(c)?;
        let count = if variable {
            object_size(self.eval_integer(frame, &mut body)?)?
        } else {
            body.next_byte()? as usize
        };

        let mut elements: Vec<PackageElement> = Vec::new();
        elements.try_reserve_exact(count).map_err(|_| AmlError::ObjectTooLarge(count as u64))?;
        while !body.is_empty() {
            if is_name_string_lead(body.peek()?) {
                let name = NameString::parse(&mut body)?;
                elements.push(PackageElement::Deferred { scope: frame.scope.clone(), name });
            } else {
                let value = self.eval_value(frame, &mut body)?;
                elements.push(PackageElement::Value(new_ref(value.copy())));
            }
        }

        if elements.len() < count {
            elements.resize_with(count, || PackageElement::Value(new_ref(Object::Uninitialized)));
        }
        Ok(new_ref(Object::Package(elements)))
    }
}

/// Buffer の BufferSize / VarPackage の NumElements の上限
const MAX_OBJECT_SIZE: u64 = 1 << 24;

fn object_size(size: u64) -> AmlResult<usize> {
    match usize::try_from(size) {
        Ok(n) if size <= MAX_OBJECT_SIZE => Ok(n),
        _ => {
            log::error!("(AML) refusing to allocate an object of {} elements", size);
            Err(AmlError::ObjectTooLarge(size))
        }
    }
}

fn check_index(index: u64, len: usize) -> AmlResult<()> {
    if index >= len as u64 {
        log::error!("(AML) index {} out of bounds (len {})", index, len);
        return Err(AmlError::IndexOutOfBounds { index, len });
    }
    Ok(())
}

/// NUL 終端の ASCII 文字列（0x01..=0x7F）
fn parse_string(c: &mut Cursor<'_>) -> AmlResult<String> {
    let mut s = String::new();
    loop {
        match c.next_byte()? {
            0 => return Ok(s),
            b if b.is_ascii() => s.push(b as char),
            b => return Err(AmlError::NonAsciiString(b)),
        }
    }
}

fn concat(lhs: &Object, rhs: &Object) -> AmlResult<Object> {
    match lhs {
        Object::Integer(i) => {
            let mut bytes = i.value.to_le_bytes().to_vec();
            bytes.extend_from_slice(&Object::integer(rhs.to_integer()?).to_buffer()?);
            Ok(Object::Buffer(bytes))
        }
        Object::String(s) => {
            let mut out = s.clone();
            out.push_str(&rhs.to_aml_string()?);
            Ok(Object::String(out))
        }
        Object::Buffer(bytes) => {
            let mut out = bytes.clone();
            out.extend_from_slice(&rhs.to_buffer()?);
            Ok(Object::Buffer(out))
        }
        other => Err(AmlError::IncompatibleType(other.object_type())),
    }
}

fn to_decimal_string(value: &Object) -> AmlResult<String> {
    let mut s = String::new();
    match value {
        Object::Buffer(bytes) => {
            for (i, b) in bytes.iter().enumerate() {
                if i > 0 {
                    s.push(',');
                }
                let _ = write!(s, "{}", b);
            }
        }
        Object::String(text) => s.push_str(text),
        other => {
            let _ = write!(s, "{}", other.to_integer()?);
        }
    }
    Ok(s)
}

/// ToInteger の文字列: "0x" 付きは 16 進、それ以外は 10 進
fn parse_integer_literal(s: &str) -> u64 {
    let trimmed = s.trim();
    let (digits, radix) = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (trimmed, 10),
    };
    let mut value: u64 = 0;
    for c in digits.chars() {
        match c.to_digit(radix) {
            Some(d) => value = value.wrapping_mul(radix as u64).wrapping_add(d as u64),
            None => break,
        }
    }
    value
}

fn from_bcd(value: u64) -> u64 {
    let mut result = 0;
    let mut scale = 1;
    let mut v = value;
    while v != 0 {
        result += (v & 0xF) * scale;
        scale *= 10;
        v >>= 4;
    }
    result
}

fn to_bcd(value: u64) -> u64 {
    let mut result = 0;
    let mut shift = 0;
    let mut v = value;
    while v != 0 && shift < 64 {
        result |= (v % 10) << shift;
        shift += 4;
        v /= 10;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AmlConfig;
    use alloc::sync::Arc;
    use alloc::vec;

    fn eval_in(ctx: &mut AmlContext, frame: &mut Frame, code: &[u8]) -> AmlResult<ObjectRef> {
        ctx.eval(frame, &mut Cursor::new(code))
    }

    #[test]
    fn add_stores_into_target_and_returns_sum() {
        let mut ctx = AmlContext::new(AmlConfig::default());
        let mut frame = Frame::new(NameString::root(), Vec::new());

        let sum = eval_in(&mut ctx, &mut frame, &[ADD_OP, BYTE_PREFIX, 3, BYTE_PREFIX, 4, NULL_NAME]).unwrap();
        assert_eq!(sum.lock().as_integer(), Some(7));

        eval_in(&mut ctx, &mut frame, &[ADD_OP, BYTE_PREFIX, 3, BYTE_PREFIX, 4, LOCAL0_OP]).unwrap();
        assert_eq!(AmlContext::local(&frame, 0).unwrap().lock().as_integer(), Some(7));
    }

    #[test]
    fn logical_results_are_shared_singletons() {
        let mut ctx = AmlContext::new(AmlConfig::default());
        let mut frame = Frame::new(NameString::root(), Vec::new());

        let equal = eval_in(&mut ctx, &mut frame, &[LEQUAL_OP, BYTE_PREFIX, 5, BYTE_PREFIX, 5]).unwrap();
        assert!(Arc::ptr_eq(&equal, &ones()));
        let differ = eval_in(&mut ctx, &mut frame, &[LEQUAL_OP, BYTE_PREFIX, 5, BYTE_PREFIX, 6]).unwrap();
        assert!(Arc::ptr_eq(&differ, &zero()));
        // LNotEqual は LNot(LEqual)
        let not_equal = eval_in(&mut ctx, &mut frame, &[LNOT_OP, LEQUAL_OP, BYTE_PREFIX, 5, BYTE_PREFIX, 6]).unwrap();
        assert!(Arc::ptr_eq(&not_equal, &ones()));
    }

    #[test]
    fn divide_by_zero_fails() {
        let mut ctx = AmlContext::new(AmlConfig::default());
        let mut frame = Frame::new(NameString::root(), Vec::new());
        let code = [DIVIDE_OP, BYTE_PREFIX, 9, ZERO_OP, NULL_NAME, NULL_NAME];
        assert_eq!(eval_in(&mut ctx, &mut frame, &code).err(), Some(AmlError::DivideByZero));
    }

    #[test]
    fn index_into_package_past_end_fails() {
        let mut ctx = AmlContext::new(AmlConfig::default());
        let mut frame = Frame::new(NameString::root(), Vec::new());
        // Index(Package(1) { 7 }, 1)
        let code = [INDEX_OP, PACKAGE_OP, 0x04, 0x01, BYTE_PREFIX, 7, ONE_OP, NULL_NAME];
        assert_eq!(
            eval_in(&mut ctx, &mut frame, &code).err(),
            Some(AmlError::IndexOutOfBounds { index: 1, len: 1 })
        );
    }

    #[test]
    fn oversized_package_and_buffer_fail_without_allocating() {
        let mut ctx = AmlContext::new(AmlConfig::default());
        let mut frame = Frame::new(NameString::root(), Vec::new());
        let huge = [QWORD_PREFIX, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

        // VarPackage(0xFFFFFFFFFFFFFFFF) {}
        let package = [&[VAR_PACKAGE_OP, 0x0A][..], &huge].concat();
        assert_eq!(eval_in(&mut ctx, &mut frame, &package).err(), Some(AmlError::ObjectTooLarge(u64::MAX)));

        // Buffer(0xFFFFFFFFFFFFFFFF) {}
        let buffer = [&[BUFFER_OP, 0x0A][..], &huge].concat();
        assert_eq!(eval_in(&mut ctx, &mut frame, &buffer).err(), Some(AmlError::ObjectTooLarge(u64::MAX)));

        // 宣言より短い初期値は 0 で埋まる
        let padded = eval_in(&mut ctx, &mut frame, &[BUFFER_OP, 0x04, BYTE_PREFIX, 4, 0xAA]).unwrap();
        assert_eq!(padded.lock().to_buffer().unwrap(), vec![0xAA, 0, 0, 0]);
    }

    #[test]
    fn string_literals_must_be_ascii() {
        let mut ctx = AmlContext::new(AmlConfig::default());
        let mut frame = Frame::new(NameString::root(), Vec::new());
        let ok = eval_in(&mut ctx, &mut frame, &[STRING_PREFIX, b'A', b'B', 0]).unwrap();
        assert_eq!(ok.lock().to_aml_string().unwrap(), "AB");
        assert_eq!(
            eval_in(&mut ctx, &mut frame, &[STRING_PREFIX, b'A', 0xC3, 0xA9, 0]).err(),
            Some(AmlError::NonAsciiString(0xC3))
        );
    }

    #[test]
    fn index_into_string_is_a_byte_field() {
        let mut ctx = AmlContext::new(AmlConfig::default());
        let mut frame = Frame::new(NameString::root(), Vec::new());

        // Index("abc", 1)
        let code = [INDEX_OP, STRING_PREFIX, b'a', b'b', b'c', 0, ONE_OP, NULL_NAME];
        let element = eval_in(&mut ctx, &mut frame, &code).unwrap();
        assert_eq!(element.lock().to_integer().unwrap(), u64::from(b'b'));

        // Index("abc", 3)
        let past_end = [INDEX_OP, STRING_PREFIX, b'a', b'b', b'c', 0, BYTE_PREFIX, 3, NULL_NAME];
        assert_eq!(
            eval_in(&mut ctx, &mut frame, &past_end).err(),
            Some(AmlError::IndexOutOfBounds { index: 3, len: 3 })
        );
    }

    #[test]
    fn bcd_conversions() {
        assert_eq!(from_bcd(0x1234), 1234);
        assert_eq!(to_bcd(1234), 0x1234);
        assert_eq!(to_bcd(0), 0);
    }

    #[test]
    fn integer_literals() {
        assert_eq!(parse_integer_literal("0x1F"), 0x1F);
        assert_eq!(parse_integer_literal("42"), 42);
        assert_eq!(parse_integer_literal("12abc"), 12);
    }

    #[test]
    fn concat_follows_lhs_type() {
        let s = concat(&Object::string("AB"), &Object::integer(0x1F)).unwrap();
        assert_eq!(s.to_aml_string().unwrap(), "AB000000000000001F");
        let b = concat(&Object::Buffer(vec![1]), &Object::Buffer(vec![2, 3])).unwrap();
        assert_eq!(b.to_buffer().unwrap(), vec![1, 2, 3]);
        let i = concat(&Object::integer(1), &Object::integer(2)).unwrap();
        assert_eq!(i.to_buffer().unwrap().len(), 16);
    }

    #[test]
    fn decimal_string() {
        assert_eq!(to_decimal_string(&Object::integer(1234)).unwrap(), "1234");
        assert_eq!(to_decimal_string(&Object::Buffer(vec![1, 20])).unwrap(), "1,20");
    }
}
