// aml/src/interp/value.rs
//
// 役割:
// - node から「値」を取り出す読み出しと、SuperName（store 先）の解釈 / 書き込みを担う。
//
// やること:
// - read_value: FieldElement / IndexFieldElement / BufferField はここで実際に読む。
// - parse_target: Local / Arg / Debug / 名前 / 参照を返す式を Target にする。
// - store_into: Target へ store する（Field はハードウェアへ書く）。
//
// 規則:
// - Local への store は置き換え（by-value のコピーを入れる）。
// - Arg が Reference を持っていれば store はその先へ通す。それ以外は置き換え。
// - 名前付き node への store は格納先の型へ変換する。

use alloc::vec::Vec;

use super::{AmlContext, Frame};
use crate::error::{AmlError, AmlResult};
use crate::name::NameString;
use crate::object::{new_ref, Object, ObjectRef, ObjectType};
use crate::opcode::*;
use crate::parser::Cursor;

/// store 先
pub(crate) enum Target {
    None,
    Local(u8),
    Arg(u8),
    Node(ObjectRef),
    Debug,
}

impl AmlContext {
    /// node の現在値を取り出す（Field はここでハードウェアを読む）
    pub(crate) fn read_value(&mut self, node: &ObjectRef) -> AmlResult<Object> {
        let snapshot = node.lock().clone();
        match snapshot {
            Object::FieldElement(field) => self.read_field(&field),
            Object::IndexFieldElement(field) => self.read_index_field(&field),
            Object::BufferField(field) => field.read(),
            Object::Reference(target) => {
                let is_field = matches!(
                    &*target.lock(),
                    Object::FieldElement(_) | Object::IndexFieldElement(_)
                );
                if is_field {
                    self.read_value(&target)
                } else {
                    Ok(Object::Reference(target))
                }
            }
            other => Ok(other),
        }
    }

    /// Reference を辿り切った先の node
    pub(crate) fn deref_node(node: &ObjectRef) -> ObjectRef {
        let mut node = node.clone();
        loop {
            let next = match &*node.lock() {
                Object::Reference(target) => target.clone(),
                _ => break,
            };
            node = next;
        }
        node
    }

    pub(crate) fn local(frame: &Frame, n: u8) -> AmlResult<ObjectRef> {
        frame.locals[n as usize].clone().ok_or(AmlError::UninitializedLocal(n))
    }

    pub(crate) fn arg(frame: &Frame, n: u8) -> AmlResult<ObjectRef> {
        frame.args[n as usize].clone().ok_or(AmlError::UninitializedArg(n))
    }

    /// SuperName / Target を読む。0x00 は「store 先無し」。
    pub(crate) fn parse_target(&mut self, frame: &mut Frame, c: &mut Cursor<'_>) -> AmlResult<Target> {
        let op = c.peek()?;
        match op {
            NULL_NAME => {
                c.next_byte()?;
                Ok(Target::None)
            }
            LOCAL0_OP..=LOCAL7_OP => {
                c.next_byte()?;
                Ok(Target::Local(op - LOCAL0_OP))
            }
            ARG0_OP..=ARG6_OP => {
                c.next_byte()?;
                Ok(Target::Arg(op - ARG0_OP))
            }
            EXT_OP_PREFIX if c.peek_at(1) == Some(EXT_DEBUG_OP) => {
                c.next_byte()?;
                c.next_byte()?;
                Ok(Target::Debug)
            }
            _ if is_name_string_lead(op) => {
                let name = NameString::parse(c)?;
                let (_, node) = self.resolve(frame, &name)?;
                Ok(Target::Node(node))
            }
            // Index / RefOf / DerefOf などの参照を返す式
            _ => {
                let node = self.eval(frame, c)?;
                Ok(Target::Node(node))
            }
        }
    }

    /// Target の実体 node（Increment / RefOf / SizeOf 用）
    pub(crate) fn target_node(&mut self, frame: &mut Frame, target: &Target) -> AmlResult<ObjectRef> {
        match target {
            Target::Local(n) => Self::local(frame, *n),
            Target::Arg(n) => Self::arg(frame, *n),
            Target::Node(node) => Ok(node.clone()),
            Target::Debug => Ok(new_ref(Object::Debug)),
            Target::None => Err(AmlError::InvalidStoreTarget(ObjectType::Uninitialized)),
        }
    }

    /// value を target へ store し、格納後の値を返す
    pub(crate) fn store_into(&mut self, frame: &mut Frame, target: &Target, value: Object) -> AmlResult<Object> {
        match target {
            Target::None => Ok(value),
            Target::Debug => {
                log::info!("(AML) Debug = {:?}", value);
                Ok(value)
            }
            Target::Local(n) => {
                frame.locals[*n as usize] = Some(new_ref(value.copy()));
                Ok(value)
            }
            Target::Arg(n) => {
                let through = match &frame.args[*n as usize] {
                    Some(arg) => match &*arg.lock() {
                        Object::Reference(target) => Some(target.clone()),
                        _ => None,
                    },
                    None => None,
                };
                match through {
                    Some(node) => self.store_node(&node, value),
                    None => {
                        frame.args[*n as usize] = Some(new_ref(value.copy()));
                        Ok(value)
                    }
                }
            }
            Target::Node(node) => self.store_node(node, value),
        }
    }

    /// 名前付き node（または Index / RefOf の結果）への store
    pub(crate) fn store_node(&mut self, node: &ObjectRef, value: Object) -> AmlResult<Object> {
        let node = Self::deref_node(node);
        let snapshot = {
            let guard = node.lock();
            match &*guard {
                Object::FieldElement(_) | Object::IndexFieldElement(_) => Some(guard.clone()),
                _ => None,
            }
        };

        // Field への書き込み元が別の Field なら先に読んでおく
        let value = match value {
            Object::FieldElement(_) | Object::IndexFieldElement(_) => self.read_value(&new_ref(value))?,
            // 変換が必要な格納先へは参照先の値を渡す（node を lock したまま参照先を lock しない）
            Object::Reference(target) if !matches!(&*node.lock(), Object::Uninitialized | Object::Package(_)) => {
                self.read_value(&Self::deref_node(&target))?
            }
            other => other,
        };

        match snapshot {
            Some(Object::FieldElement(field)) => {
                self.write_field(&field, &value)?;
                Ok(value)
            }
            Some(Object::IndexFieldElement(field)) => {
                self.write_index_field(&field, &value)?;
                Ok(value)
            }
            _ => node.lock().store_value(&value),
        }
    }

    /// CopyObject: 型変換せずに置き換える。Index / RefOf の結果へは参照先を置き換える。
    pub(crate) fn copy_into(&mut self, frame: &mut Frame, target: &Target, value: Object) -> AmlResult<Object> {
        match target {
            Target::Node(node) => {
                let node = Self::deref_node(node);
                let mut guard = node.lock();
                if guard.is_constant() {
                    log::error!("(AML) CopyObject into constant rejected");
                    return Err(AmlError::StoreToConstant);
                }
                if guard.is_scope() {
                    return Err(AmlError::InvalidStoreTarget(guard.object_type()));
                }
                *guard = value.copy();
                Ok(value)
            }
            Target::Arg(n) => {
                frame.args[*n as usize] = Some(new_ref(value.copy()));
                Ok(value)
            }
            other => self.store_into(frame, other, value),
        }
    }

    /// AML から method を呼ぶときの引数の受け渡し。データは値渡し、namespace の実体は共有。
    pub(crate) fn pass_argument(&mut self, node: ObjectRef) -> AmlResult<ObjectRef> {
        let shared = matches!(
            &*node.lock(),
            Object::Scope(_) | Object::Method(_) | Object::Mutex(_) | Object::Event | Object::OpRegion(_)
        );
        if shared {
            return Ok(node);
        }
        let value = self.read_value(&node)?;
        Ok(new_ref(value.copy()))
    }

    pub(crate) fn collect_args(&mut self, frame: &mut Frame, c: &mut Cursor<'_>, count: usize) -> AmlResult<Vec<ObjectRef>> {
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            let node = self.eval(frame, c)?;
            args.push(self.pass_argument(node)?);
        }
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AmlConfig;

    #[test]
    fn store_to_local_replaces_and_copies() {
        let mut ctx = AmlContext::new(AmlConfig::default());
        let mut frame = Frame::new(NameString::root(), Vec::new());
        ctx.store_into(&mut frame, &Target::Local(0), Object::integer(5)).unwrap();
        ctx.store_into(&mut frame, &Target::Local(0), Object::string("x")).unwrap();
        let local = AmlContext::local(&frame, 0).unwrap();
        assert_eq!(local.lock().to_aml_string().unwrap(), "x");
        assert_eq!(AmlContext::local(&frame, 1).err(), Some(AmlError::UninitializedLocal(1)));
    }

    #[test]
    fn store_through_arg_reference() {
        let mut ctx = AmlContext::new(AmlConfig::default());
        let referent = new_ref(Object::integer(1));
        let mut frame = Frame::new(NameString::root(), alloc::vec![new_ref(Object::Reference(referent.clone()))]);
        ctx.store_into(&mut frame, &Target::Arg(0), Object::integer(7)).unwrap();
        assert_eq!(referent.lock().as_integer(), Some(7));
    }

    #[test]
    fn named_store_converts_to_target_type() {
        let mut ctx = AmlContext::new(AmlConfig::default());
        let node = new_ref(Object::Buffer(alloc::vec![0; 4]));
        ctx.store_node(&node, Object::integer(0x0102_0304_0506)).unwrap();
        assert_eq!(node.lock().to_buffer().unwrap(), alloc::vec![0x06, 0x05, 0x04, 0x03]);
    }

    #[test]
    fn copy_object_replaces_the_referent_of_a_reference_target() {
        let mut ctx = AmlContext::new(AmlConfig::default());
        let mut frame = Frame::new(NameString::root(), Vec::new());
        let element = new_ref(Object::integer(1));
        let index_result = new_ref(Object::Reference(element.clone()));

        ctx.copy_into(&mut frame, &Target::Node(index_result), Object::string("ABC")).unwrap();
        // 型ごと置き換わる（Integer へ変換されない）
        assert_eq!(element.lock().object_type(), ObjectType::String);
        assert_eq!(element.lock().to_aml_string().unwrap(), "ABC");
    }
}
