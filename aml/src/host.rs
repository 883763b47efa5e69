// aml/src/host.rs
//
// 役割:
// - AML の実行中に必要になるカーネル側サービス（待ち / 通知 / 時刻）の境界を定義する。
//
// やること:
// - Host trait。既定実装はすべて何もしない（カーネルは持っているものだけ上書きする）。
//
// やらないこと:
// - スケジューラとの連携そのもの（sleep の実体はカーネルが決める）。

use crate::name::NameString;

pub trait Host: Send {
    /// Sleep(ms)。スレッドを手放してよい待ち。
    fn sleep(&mut self, ms: u64) {
        let _ = ms;
    }

    /// Stall(us)。busy wait。
    fn stall(&mut self, us: u64) {
        let _ = us;
    }

    /// Notify(object, value)。既定ではログに残すだけ。
    fn notify(&mut self, path: &NameString, value: u64) {
        log::info!("(AML) Notify({}, {:#x}) dropped: no host handler", path, value);
    }

    /// Timer opcode。100ns 単位の単調増加カウンタ。
    fn timer(&mut self) -> u64 {
        0
    }
}

/// 何も提供しない Host（テストや早期ブート用）
pub struct NullHost;

impl Host for NullHost {}
