// aml/src/region.rs
//
// 役割:
// - OpRegion のアドレス空間種別と、実ハードウェアアクセスを担う RegionHandler の境界を定義する。
//
// やること:
// - RegionSpace（SystemMemory / SystemIO / PCI_Config / EmbeddedControl ...）の decode。
// - 組み込みハンドラ 2 種:
//   - SystemIoHandler: x86 port I/O（x86_64 crate の Port）
//   - SystemMemoryHandler: 物理メモリ offset マップ越しの volatile アクセス
//
// やらないこと:
// - EC / PCI config / SMBus などの具体プロトコル（ドライバ側がハンドラを実装して install する）。
//
// 設計方針:
// - unsafe はこのファイルの組み込みハンドラ内に閉じ込める。
// - ハンドラはブロックしてよい（EC のコマンドキュー待ちなど）。タイムアウトは RegionTimeout で返す。

use crate::error::{AmlError, AmlResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RegionSpace {
    SystemMemory,
    SystemIo,
    PciConfig,
    EmbeddedControl,
    SmBus,
    SystemCmos,
    PciBarTarget,
    Ipmi,
    GeneralPurposeIo,
    GenericSerialBus,
    Pcc,
    OemDefined(u8),
}

impl From<u8> for RegionSpace {
    fn from(raw: u8) -> Self {
        match raw {
            0x00 => RegionSpace::SystemMemory,
            0x01 => RegionSpace::SystemIo,
            0x02 => RegionSpace::PciConfig,
            0x03 => RegionSpace::EmbeddedControl,
            0x04 => RegionSpace::SmBus,
            0x05 => RegionSpace::SystemCmos,
            0x06 => RegionSpace::PciBarTarget,
            0x07 => RegionSpace::Ipmi,
            0x08 => RegionSpace::GeneralPurposeIo,
            0x09 => RegionSpace::GenericSerialBus,
            0x0A => RegionSpace::Pcc,
            other => RegionSpace::OemDefined(other),
        }
    }
}

/// PCI_Config region がぶら下がるデバイスの位置（_SEG / _BBN / _ADR から計算）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PciAddress {
    pub segment: u16,
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl PciAddress {
    /// _ADR の上位 16bit = device, 下位 16bit = function
    pub fn from_adr(segment: u16, bus: u8, adr: u64) -> Self {
        PciAddress {
            segment,
            bus,
            device: ((adr >> 16) & 0x1F) as u8,
            function: (adr & 0x07) as u8,
        }
    }
}

/// 1 回分のハードウェアアクセス
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionAccess {
    pub space: RegionSpace,
    /// region base + アクセス単位の byte offset
    pub address: u64,
    /// 8 / 16 / 32 / 64
    pub width_bits: u8,
    /// PciConfig のときだけ Some
    pub pci: Option<PciAddress>,
}

/// OpRegion の裏側でハードウェアを読み書きするドライバ境界。
pub trait RegionHandler: Send {
    fn read(&mut self, access: &RegionAccess) -> AmlResult<u64>;
    fn write(&mut self, access: &RegionAccess, value: u64) -> AmlResult<()>;
}

/// x86 の I/O port 空間（SystemIO）
pub struct SystemIoHandler;

impl SystemIoHandler {
    fn port(access: &RegionAccess) -> AmlResult<u16> {
        u16::try_from(access.address).map_err(|_| AmlError::RegionAccess(access.space))
    }
}

impl RegionHandler for SystemIoHandler {
    #[cfg(target_arch = "x86_64")]
    fn read(&mut self, access: &RegionAccess) -> AmlResult<u64> {
        use x86_64::instructions::port::Port;

        let port = Self::port(access)?;
        // Safety: AML が宣言した SystemIO region 内のポートのみを触る
        let value = unsafe {
            match access.width_bits {
                8 => Port::<u8>::new(port).read() as u64,
                16 => Port::<u16>::new(port).read() as u64,
                32 => Port::<u32>::new(port).read() as u64,
                other => return Err(AmlError::UnsupportedAccessWidth(other)),
            }
        };
        Ok(value)
    }

    #[cfg(target_arch = "x86_64")]
    fn write(&mut self, access: &RegionAccess, value: u64) -> AmlResult<()> {
        use x86_64::instructions::port::Port;

        let port = Self::port(access)?;
        unsafe {
            match access.width_bits {
                8 => Port::<u8>::new(port).write(value as u8),
                16 => Port::<u16>::new(port).write(value as u16),
                32 => Port::<u32>::new(port).write(value as u32),
                other => return Err(AmlError::UnsupportedAccessWidth(other)),
            }
        }
        Ok(())
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn read(&mut self, access: &RegionAccess) -> AmlResult<u64> {
        let _ = Self::port(access)?;
        Err(AmlError::RegionAccess(access.space))
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn write(&mut self, access: &RegionAccess, value: u64) -> AmlResult<()> {
        let _ = (Self::port(access)?, value);
        Err(AmlError::RegionAccess(access.space))
    }
}

/// SystemMemory。物理アドレス + phys_offset の仮想アドレスで全物理メモリが見えている前提。
pub struct SystemMemoryHandler {
    phys_offset: u64,
}

impl SystemMemoryHandler {
    /// # Safety
    /// - phys_offset + (AML が宣言する任意の SystemMemory アドレス) が
    ///   読み書き可能にマップされていること。
    pub unsafe fn new(phys_offset: u64) -> Self {
        SystemMemoryHandler { phys_offset }
    }

    fn virt(&self, access: &RegionAccess) -> AmlResult<usize> {
        let virt = self
            .phys_offset
            .checked_add(access.address)
            .ok_or(AmlError::RegionAccess(access.space))?;
        usize::try_from(virt).map_err(|_| AmlError::RegionAccess(access.space))
    }
}

impl RegionHandler for SystemMemoryHandler {
    fn read(&mut self, access: &RegionAccess) -> AmlResult<u64> {
        use volatile::Volatile;

        let virt = self.virt(access)?;
        // Safety: new() の契約により virt はマップ済み
        let value = unsafe {
            match access.width_bits {
                8 => (*(virt as *const Volatile<u8>)).read() as u64,
                16 => (*(virt as *const Volatile<u16>)).read() as u64,
                32 => (*(virt as *const Volatile<u32>)).read() as u64,
                64 => (*(virt as *const Volatile<u64>)).read(),
                other => return Err(AmlError::UnsupportedAccessWidth(other)),
            }
        };
        Ok(value)
    }

    fn write(&mut self, access: &RegionAccess, value: u64) -> AmlResult<()> {
        use volatile::Volatile;

        let virt = self.virt(access)?;
        unsafe {
            match access.width_bits {
                8 => (*(virt as *mut Volatile<u8>)).write(value as u8),
                16 => (*(virt as *mut Volatile<u16>)).write(value as u16),
                32 => (*(virt as *mut Volatile<u32>)).write(value as u32),
                64 => (*(virt as *mut Volatile<u64>)).write(value),
                other => return Err(AmlError::UnsupportedAccessWidth(other)),
            }
        }
        Ok(())
    }
}
