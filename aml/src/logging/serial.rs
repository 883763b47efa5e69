// aml/src/logging/serial.rs
//
// COM1 (0x3F8) へのシリアル出力。
// - init(): 115200bps, 8N1 に初期化（2 回目以降は何もしない）
// - write_str(): 文字列を送信
// - SerialWriter: fmt::Write 経由で log の record を流す

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;
use x86_64::instructions::port::Port;

const COM1: u16 = 0x3F8;

static SERIAL_INITIALIZED: AtomicBool = AtomicBool::new(false);
// 複数 CPU / 割り込みからの行が混ざらないように 1 行単位で取る
static SERIAL_LOCK: Mutex<()> = Mutex::new(());

pub fn init() {
    if SERIAL_INITIALIZED.swap(true, Ordering::AcqRel) {
        return;
    }

    // Safety: COM1 の UART レジスタのみを触る
    unsafe {
        let mut int_en = Port::<u8>::new(COM1 + 1);
        let mut line_ctrl = Port::<u8>::new(COM1 + 3);
        let mut div_low = Port::<u8>::new(COM1);
        let mut div_high = Port::<u8>::new(COM1 + 1);
        let mut fifo_ctrl = Port::<u8>::new(COM1 + 2);
        let mut modem_ctrl = Port::<u8>::new(COM1 + 4);

        int_en.write(0x00);

        // DLAB=1 で divisor 1（115200bps）
        line_ctrl.write(0x80);
        div_low.write(0x01);
        div_high.write(0x00);

        line_ctrl.write(0x03);
        fifo_ctrl.write(0xC7);
        modem_ctrl.write(0x0B);
    }
}

pub fn is_initialized() -> bool {
    SERIAL_INITIALIZED.load(Ordering::Acquire)
}

fn write_byte(byte: u8) {
    // Safety: init() 済みの COM1 の LSR / THR のみ
    unsafe {
        let mut line_status = Port::<u8>::new(COM1 + 5);
        let mut data = Port::<u8>::new(COM1);

        while (line_status.read() & 0x20) == 0 {}

        data.write(byte);
    }
}

pub fn write_str(s: &str) {
    for b in s.bytes() {
        if b == b'\n' {
            write_byte(b'\r');
        }
        write_byte(b);
    }
}

/// 1 行を lock を取ったまま書く
pub fn with_writer<R>(f: impl FnOnce(&mut SerialWriter) -> R) -> R {
    let _guard = SERIAL_LOCK.lock();
    f(&mut SerialWriter)
}

pub struct SerialWriter;

impl fmt::Write for SerialWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        write_str(s);
        Ok(())
    }
}
