// aml/src/global.rs
//
// 役割:
// - AmlContext を 1 つだけ登録し、ブート処理 / ドライバ / GPE ワーカーから共有する入口を提供する。
//
// やること:
// - register_context(): ACPI 初期化時に AmlContext を登録する（所有はここへ移る）。
// - with_context(): lock を取って &mut AmlContext を貸す（ブロックする）。
// - try_with_context(): lock が取れなければ None（割り込みに近い文脈用）。
//
// やらないこと:
// - Method 単位の細かい排他（Serialized / sync_level は保持するだけ）。
//   namespace の変更と method 実行はこの 1 つの lock で直列化される。

use spin::Mutex;

use crate::interp::AmlContext;

// None なら未登録
static AML_CONTEXT: Mutex<Option<AmlContext>> = Mutex::new(None);

/// AmlContext を登録する。既に登録されていたものは返す。
pub fn register_context(ctx: AmlContext) -> Option<AmlContext> {
    let previous = AML_CONTEXT.lock().replace(ctx);
    log::info!("(AML) context registered");
    previous
}

/// 登録を外して所有権を返す
pub fn unregister_context() -> Option<AmlContext> {
    AML_CONTEXT.lock().take()
}

pub fn is_registered() -> bool {
    AML_CONTEXT.lock().is_some()
}

/// AmlContext を一時的に借用して処理する（未登録なら None）
pub fn with_context<R>(f: impl FnOnce(&mut AmlContext) -> R) -> Option<R> {
    let mut guard = AML_CONTEXT.lock();
    guard.as_mut().map(f)
}

/// lock が取れないときは待たずに None を返す
pub fn try_with_context<R>(f: impl FnOnce(&mut AmlContext) -> R) -> Option<R> {
    let mut guard = AML_CONTEXT.try_lock()?;
    guard.as_mut().map(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AmlConfig;

    // グローバル状態を触るテストはこの 1 本にまとめる
    #[test]
    fn register_borrow_and_unregister() {
        let _ = unregister_context();
        assert!(with_context(|_| ()).is_none());

        assert!(register_context(AmlContext::new(AmlConfig::default())).is_none());
        assert!(is_registered());

        let depth = with_context(|ctx| ctx.config().max_call_depth);
        assert_eq!(depth, Some(64));

        // 保持中は try_with_context が諦める
        let nested = with_context(|_| try_with_context(|_| ()));
        assert_eq!(nested, Some(None));

        assert!(unregister_context().is_some());
        assert!(!is_registered());
    }
}
