//! 通用工具：panic 钩子、跨平台计时、控制台日志。

use std::time::Duration;

#[cfg(target_arch = "wasm32")]
use web_sys::js_sys::Date;

/// `std::time::Instant` 在 wasm32-unknown-unknown 上不可用，这里用 `Date.now()` 代替。
#[derive(Debug, Clone, Copy)]
pub struct WasmInstant {
    #[cfg(target_arch = "wasm32")]
    timestamp: f64,
    #[cfg(not(target_arch = "wasm32"))]
    instant: std::time::Instant,
}

impl WasmInstant {
    #[cfg(target_arch = "wasm32")]
    pub fn now() -> Self {
        Self {
            timestamp: Date::now(),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn now() -> Self {
        Self {
            instant: std::time::Instant::now(),
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn elapsed(&self) -> Duration {
        let elapsed_ms = (Date::now() - self.timestamp).max(0.0);
        Duration::from_secs_f64(elapsed_ms / 1000.0)
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn elapsed(&self) -> Duration {
        self.instant.elapsed()
    }
}

/// 输出一行日志：浏览器中写入 console，原生环境写入 stderr。
pub fn log_line(message: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::log_1(&message.into());

    #[cfg(not(target_arch = "wasm32"))]
    eprintln!("{message}");
}

#[cfg(feature = "console_error_panic_hook")]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
pub fn set_panic_hook() {}
