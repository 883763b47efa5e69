// aml/src/interp/field.rs
//
// 役割:
// - Field / IndexField 定義を解釈して要素を namespace に登録する。
// - FieldElement / IndexFieldElement の読み書きを RegionHandler 越しに行う。
//
// やること:
// - 要素リスト: 0x00 = 予約（幅だけ進める）, 0x01 = AccessField（以降の access type を変更）,
//   NameSeg = 名前付き要素。どの要素も bit_offset を幅ぶん進める。
// - アクセスは access width の自然境界単位に分割し、update rule に従って書く。
// - PCI_Config region には _SEG / _BBN / _ADR から求めた PCI アドレスを渡す。
//
// やらないこと:
// - ConnectField (0x02) / ExtendedAccessField (0x03)。定義ごと失敗させる。
// - BankField（term.rs で読み飛ばす）。
// - Global Lock の取得（lock bit は保持するだけ）。

use alloc::vec;

use super::{AmlContext, Frame};
use crate::error::{AmlError, AmlResult};
use crate::field::{access_units, low_mask, read_bits, write_bits, AccessType, FieldFlags, UpdateRule};
use crate::name::{NameSeg, NameString};
use crate::object::convert::{buffer_to_integer, to_field_bytes};
use crate::object::{FieldElement, IndexFieldElement, Object, ObjectRef, OpRegion};
use crate::parser::{framed, Cursor, PkgLength};
use crate::region::{PciAddress, RegionAccess, RegionSpace};
use crate::trace::{trace_region, RegionDirection};

const RESERVED_FIELD: u8 = 0x00;
const ACCESS_FIELD: u8 = 0x01;
const CONNECT_FIELD: u8 = 0x02;
const EXTENDED_ACCESS_FIELD: u8 = 0x03;

/// 要素リスト 1 個分（名前付きのものだけ返す）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FieldLayout {
    pub name: NameSeg,
    pub bit_offset: usize,
    pub bit_count: usize,
    pub flags: FieldFlags,
}

/// flags byte の後ろの要素リストを読んで、名前付き要素の配置を返す
pub(crate) fn parse_field_list(body: &mut Cursor<'_>, flags: FieldFlags) -> AmlResult<alloc::vec::Vec<FieldLayout>> {
    let mut layouts = alloc::vec::Vec::new();
    let mut flags = flags;
    let mut bit_offset: usize = 0;

    while !body.is_empty() {
        match body.peek()? {
            RESERVED_FIELD => {
                body.next_byte()?;
                bit_offset += PkgLength::parse(body)?.value;
            }
            ACCESS_FIELD => {
                body.next_byte()?;
                let access = AccessType::from_raw(body.next_byte()?)?;
                let _attrib = body.next_byte()?;
                flags = flags.with_access_type(access);
            }
            tag @ (CONNECT_FIELD | EXTENDED_ACCESS_FIELD) => {
                log::warn!("(AML) field element tag {:#04x} not supported", tag);
                return Err(AmlError::InvalidFieldElement(tag));
            }
            _ => {
                let name = NameSeg::parse(body)?;
                let bit_count = PkgLength::parse(body)?.value;
                layouts.push(FieldLayout { name, bit_offset, bit_count, flags });
                bit_offset += bit_count;
            }
        }
    }
    Ok(layouts)
}

impl AmlContext {
    /// Field(RegionName, flags) { ... }
    pub(crate) fn def_field(&mut self, frame: &mut Frame, c: &mut Cursor<'_>) -> AmlResult<()> {
        let mut body = framed(c)?;
        let region_name = NameString::parse(&mut body)?;
        let flags = FieldFlags::from_raw(body.next_byte()?);
        flags.access_type()?;

        let (region_path, region) = self.resolve(frame, &region_name)?;
        if !matches!(&*region.lock(), Object::OpRegion(_)) {
            return Err(AmlError::IncompatibleType(region.lock().object_type()));
        }

        for layout in parse_field_list(&mut body, flags)? {
            let element = FieldElement {
                region: alloc::sync::Arc::downgrade(&region),
                bit_offset: layout.bit_offset,
                bit_count: layout.bit_count,
                flags: layout.flags,
            };
            self.define(frame, &NameString::from_seg(layout.name), Object::FieldElement(element))?;
        }
        log::trace!("(AML) Field on {} defined", region_path);
        Ok(())
    }

    /// IndexField(IndexName, DataName, flags) { ... }
    pub(crate) fn def_index_field(&mut self, frame: &mut Frame, c: &mut Cursor<'_>) -> AmlResult<()> {
        let mut body = framed(c)?;
        let index_name = NameString::parse(&mut body)?;
        let data_name = NameString::parse(&mut body)?;
        let flags = FieldFlags::from_raw(body.next_byte()?);
        flags.access_type()?;

        let (_, index) = self.resolve(frame, &index_name)?;
        let (_, data) = self.resolve(frame, &data_name)?;
        for node in [&index, &data] {
            if !matches!(&*node.lock(), Object::FieldElement(_)) {
                return Err(AmlError::IncompatibleType(node.lock().object_type()));
            }
        }

        for layout in parse_field_list(&mut body, flags)? {
            let element = IndexFieldElement {
                index: alloc::sync::Arc::downgrade(&index),
                data: alloc::sync::Arc::downgrade(&data),
                bit_offset: layout.bit_offset,
                bit_count: layout.bit_count,
                flags: layout.flags,
            };
            self.define(frame, &NameString::from_seg(layout.name), Object::IndexFieldElement(element))?;
        }
        Ok(())
    }

    /// 64bit 以下なら Integer、それより広ければ Buffer
    pub(crate) fn read_field(&mut self, field: &FieldElement) -> AmlResult<Object> {
        let region = region_of(&field.region)?;
        let width = field.flags.access_type()?.width_bits();
        let pci = self.pci_address_for(&region)?;

        let mut out = vec![0u8; (field.bit_count + 7) / 8];
        for unit in access_units(field.bit_offset, field.bit_count, width) {
            let access = unit_access(&region, unit.byte_offset, width, pci)?;
            let raw = self.region_read(&access)?;
            let piece = (raw >> unit.shift) & low_mask(unit.bits);
            write_bits(&mut out, unit.field_bit, unit.bits, &piece.to_le_bytes());
        }
        Ok(bits_to_object(out, field.bit_count))
    }

    pub(crate) fn write_field(&mut self, field: &FieldElement, value: &Object) -> AmlResult<()> {
        let region = region_of(&field.region)?;
        let width = field.flags.access_type()?.width_bits();
        let pci = self.pci_address_for(&region)?;
        let src = to_field_bytes(value)?;

        for unit in access_units(field.bit_offset, field.bit_count, width) {
            let access = unit_access(&region, unit.byte_offset, width, pci)?;
            let piece = buffer_to_integer(&read_bits(&src, unit.field_bit, unit.bits));
            let mask = low_mask(unit.bits) << unit.shift;

            let base = if unit.bits == width {
                0
            } else {
                match field.flags.update_rule() {
                    UpdateRule::Preserve => self.region_read(&access)?,
                    UpdateRule::WriteAsOnes => low_mask(width),
                    UpdateRule::WriteAsZeros => 0,
                }
            };
            let raw = (base & !mask) | ((piece << unit.shift) & mask);
            self.region_write(&access, raw)?;
        }
        Ok(())
    }

    /// index 要素にアクセス単位の byte offset を書き、data 要素越しに読む
    pub(crate) fn read_index_field(&mut self, field: &IndexFieldElement) -> AmlResult<Object> {
        let (index, data) = index_pair(field)?;
        let width = field.flags.access_type()?.width_bits();

        let mut out = vec![0u8; (field.bit_count + 7) / 8];
        for unit in access_units(field.bit_offset, field.bit_count, width) {
            self.write_field(&index, &Object::integer(unit.byte_offset))?;
            let raw = self.read_field(&data)?.to_integer()?;
            let piece = (raw >> unit.shift) & low_mask(unit.bits);
            write_bits(&mut out, unit.field_bit, unit.bits, &piece.to_le_bytes());
        }
        Ok(bits_to_object(out, field.bit_count))
    }

    pub(crate) fn write_index_field(&mut self, field: &IndexFieldElement, value: &Object) -> AmlResult<()> {
        let (index, data) = index_pair(field)?;
        let width = field.flags.access_type()?.width_bits();
        let src = to_field_bytes(value)?;

        for unit in access_units(field.bit_offset, field.bit_count, width) {
            let piece = buffer_to_integer(&read_bits(&src, unit.field_bit, unit.bits));
            let mask = low_mask(unit.bits) << unit.shift;

            self.write_field(&index, &Object::integer(unit.byte_offset))?;
            let base = if unit.bits == width {
                0
            } else {
                match field.flags.update_rule() {
                    UpdateRule::Preserve => self.read_field(&data)?.to_integer()?,
                    UpdateRule::WriteAsOnes => low_mask(width),
                    UpdateRule::WriteAsZeros => 0,
                }
            };
            let raw = (base & !mask) | ((piece << unit.shift) & mask);
            self.write_field(&data, &Object::integer(raw))?;
        }
        Ok(())
    }

    fn region_read(&mut self, access: &RegionAccess) -> AmlResult<u64> {
        let result = self.handler(access.space)?.read(access);
        match result {
            Ok(value) => {
                trace_region(RegionDirection::Read, access, value);
                Ok(value)
            }
            Err(e) => {
                log::warn!("(AML) {:?} read at {:#x} failed: {}", access.space, access.address, e);
                Err(e)
            }
        }
    }

    fn region_write(&mut self, access: &RegionAccess, value: u64) -> AmlResult<()> {
        trace_region(RegionDirection::Write, access, value);
        let result = self.handler(access.space)?.write(access, value);
        if let Err(e) = &result {
            log::warn!("(AML) {:?} write at {:#x} failed: {}", access.space, access.address, e);
        }
        result
    }

    /// PCI_Config region なら、region を定義した scope から上へ辿って最初の _ADR / _BBN / _SEG から位置を求める
    fn pci_address_for(&mut self, region: &OpRegion) -> AmlResult<Option<PciAddress>> {
        if region.space != RegionSpace::PciConfig {
            return Ok(None);
        }
        let mut adr = None;
        let mut bus = None;
        let mut segment = None;
        let mut scope = Some(region.parent.clone());
        while let Some(path) = scope {
            // method 内で定義された region は、method を囲む device の _ADR を使う
            if adr.is_none() {
                adr = self.evaluate_optional(&path, *b"_ADR")?;
            }
            if bus.is_none() {
                bus = self.evaluate_optional(&path, *b"_BBN")?;
            }
            if segment.is_none() {
                segment = self.evaluate_optional(&path, *b"_SEG")?;
            }
            if adr.is_some() && bus.is_some() && segment.is_some() {
                break;
            }
            scope = path.parent();
        }

        Ok(Some(PciAddress::from_adr(
            segment.unwrap_or(0) as u16,
            bus.unwrap_or(0) as u8,
            adr.unwrap_or(0),
        )))
    }

    /// scope 直下の name があれば評価して Integer にする
    pub(crate) fn evaluate_optional(&mut self, scope: &NameString, name: [u8; 4]) -> AmlResult<Option<u64>> {
        let path = scope.child(NameSeg::from_raw(name));
        let node = match self.namespace.lookup_absolute(&path) {
            Ok(node) => node,
            Err(AmlError::NameNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let value = self.evaluate_node(&path, &node)?;
        Ok(Some(value.to_integer()?))
    }
}

fn region_of(region: &crate::object::WeakObjectRef) -> AmlResult<OpRegion> {
    let node = region.upgrade().ok_or(AmlError::DanglingRegion)?;
    let guard = node.lock();
    match &*guard {
        Object::OpRegion(region) => Ok(region.clone()),
        other => Err(AmlError::IncompatibleType(other.object_type())),
    }
}

fn index_pair(field: &IndexFieldElement) -> AmlResult<(FieldElement, FieldElement)> {
    Ok((element_of(&field.index)?, element_of(&field.data)?))
}

fn element_of(node: &crate::object::WeakObjectRef) -> AmlResult<FieldElement> {
    let node: ObjectRef = node.upgrade().ok_or(AmlError::DanglingRegion)?;
    let guard = node.lock();
    match &*guard {
        Object::FieldElement(field) => Ok(field.clone()),
        other => Err(AmlError::IncompatibleType(other.object_type())),
    }
}

/// アクセス単位 1 個分の RegionAccess。region の長さを超えるなら失敗。
fn unit_access(region: &OpRegion, byte_offset: u64, width: usize, pci: Option<PciAddress>) -> AmlResult<RegionAccess> {
    let end = byte_offset + (width / 8) as u64;
    if end > region.length {
        log::error!("(AML) field access [{:#x}..{:#x}) outside region of {:#x} bytes", byte_offset, end, region.length);
        return Err(AmlError::RegionOutOfBounds { offset: byte_offset, length: region.length });
    }
    Ok(RegionAccess {
        space: region.space,
        address: region.offset + byte_offset,
        width_bits: width as u8,
        pci,
    })
}

fn bits_to_object(bits: alloc::vec::Vec<u8>, bit_count: usize) -> Object {
    if bit_count <= 64 {
        Object::integer(buffer_to_integer(&bits))
    } else {
        Object::Buffer(bits)
    }
}
