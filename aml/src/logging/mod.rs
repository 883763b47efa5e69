// aml/src/logging/mod.rs
//
// 役割:
// - log facade の出力先を用意する（カーネルが自前の logger を持たない場合用）。
//
// やること:
// - SerialLogger: log::Log を実装し、COM1 へ "[LEVEL] target: message" を 1 行で出す。
// - init(level): logger を登録して max level を設定する。
//
// やらないこと:
// - バッファリング / 非同期出力。
// - logger の選択。カーネルが別の logger を set_logger 済みならそちらが使われる。

#[cfg(target_arch = "x86_64")]
pub mod serial;

use core::fmt;

use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Once;

/// "[INFO] aml::namespace: (AML) ..." の形で 1 行書く
pub fn write_record(w: &mut impl fmt::Write, level: Level, target: &str, args: &fmt::Arguments<'_>) -> fmt::Result {
    write!(w, "[{}] ", level)?;
    if !target.is_empty() {
        write!(w, "{}: ", target)?;
    }
    writeln!(w, "{}", args)
}

pub struct SerialLogger {
    level: LevelFilter,
}

impl SerialLogger {
    pub const fn new(level: LevelFilter) -> Self {
        SerialLogger { level }
    }
}

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    #[cfg(target_arch = "x86_64")]
    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        serial::with_writer(|w| {
            let _ = write_record(w, record.level(), record.target(), record.args());
        });
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn log(&self, _record: &Record<'_>) {}

    fn flush(&self) {}
}

static LOGGER: Once<SerialLogger> = Once::new();

/// シリアルを初期化して logger を登録する（1 回だけ成功する）
pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    #[cfg(target_arch = "x86_64")]
    serial::init();

    let logger = LOGGER.call_once(|| SerialLogger::new(level));
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;

    #[test]
    fn record_line_has_level_and_target() {
        let mut out = String::new();
        write_record(&mut out, Level::Warn, "aml::device", &format_args!("(AML) {} failed", "\\_SB.PCI0._INI")).unwrap();
        assert_eq!(out, "[WARN] aml::device: (AML) \\_SB.PCI0._INI failed\n");
    }

    #[test]
    fn empty_target_is_omitted() {
        let mut out = String::new();
        write_record(&mut out, Level::Info, "", &format_args!("ready")).unwrap();
        assert_eq!(out, "[INFO] ready\n");
    }

    #[test]
    fn logger_filters_by_level() {
        let logger = SerialLogger::new(LevelFilter::Warn);
        let error = Metadata::builder().level(Level::Error).target("aml").build();
        let debug = Metadata::builder().level(Level::Debug).target("aml").build();
        assert!(logger.enabled(&error));
        assert!(!logger.enabled(&debug));
    }
}
