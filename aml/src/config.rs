// aml/src/config.rs
//
// 役割:
// - インタプリタの実行時上限と起動時動作を 1 つの構造体にまとめる。
//
// やらないこと:
// - 永続化 / コマンドライン解析（カーネル側が組み立てて渡す）。
//
// 既定値:
// - max_call_depth: 64
// - while_loop_limit: None（無制限。ファームウェアの無限ループは止まらない）
// - initialize_devices: true

/// 既定の method 呼び出しの入れ子上限
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AmlConfig {
    /// method 呼び出しの入れ子上限。超えると CallDepthExceeded。
    pub max_call_depth: usize,
    /// 1 つの While が回ってよい最大回数。超えると LoopLimitExceeded。
    pub while_loop_limit: Option<u64>,
    /// initialize_objects() が Device ごとの _STA / _INI まで辿るか
    pub initialize_devices: bool,
}

impl Default for AmlConfig {
    fn default() -> Self {
        AmlConfig {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            while_loop_limit: None,
            initialize_devices: true,
        }
    }
}
