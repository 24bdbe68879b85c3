//! BridgeLogger - LogPrinter для headless Bevy host'а
//!
//! Error/Warning → stderr, остальное → stdout.

use projectile_sim::{LogLevel, LogPrinter};

pub struct BridgeLogger;

impl LogPrinter for BridgeLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Error | LogLevel::Warning => eprintln!("[{}] {}", level.as_str(), message),
            LogLevel::Debug | LogLevel::Info => println!("[{}] {}", level.as_str(), message),
        }
    }
}
