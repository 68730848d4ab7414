//! Logger handed to components explicitly instead of reached through the
//! global `log` facade, so tests can capture what a component emits.

use std::fmt;
use std::sync::Arc;

use log::{Level, Log, Metadata, Record};

pub type SharedLogger = Arc<dyn Log>;

/// Forwards every record to whatever logger the binary installed.
pub struct GlobalLogger;

impl Log for GlobalLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && log::logger().enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            log::logger().log(record);
        }
    }

    fn flush(&self) {
        log::logger().flush();
    }
}

pub fn global() -> SharedLogger {
    Arc::new(GlobalLogger)
}

pub fn emit(logger: &dyn Log, level: Level, target: &str, args: fmt::Arguments) {
    logger.log(
        &Record::builder()
            .level(level)
            .target(target)
            .args(args)
            .build(),
    );
}
