use chrono::Local;
use env_logger::Builder;
use log::Level;
use std::io::Write;

/// 默认日志级别，可通过 RUST_LOG 覆盖
pub const DEFAULT_FILTER: &str = "info";

pub fn init_logger() {
    init_logger_with(DEFAULT_FILTER);
}

/// Initialise env_logger with `default_filter` unless RUST_LOG is set.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logger_with(default_filter: &str) {
    let _ = Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format(|buf, record| {
            let time = Local::now().format("%H:%M:%S%.3f");
            writeln!(
                buf,
                "{} {}{:<5}\x1b[0m [{}:{}] {}",
                time,
                level_color(record.level()),
                record.level(),
                record.module_path().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args(),
            )
        })
        .try_init();
}

fn level_color(level: Level) -> &'static str {
    match level {
        Level::Error => "\x1b[31m\x1b[1m", // 红色
        Level::Warn => "\x1b[33m\x1b[1m",  // 黄色
        Level::Info => "\x1b[32m\x1b[1m",  // 绿色
        Level::Debug => "\x1b[36m\x1b[1m", // 青色
        Level::Trace => "\x1b[90m\x1b[1m", // 灰色
    }
}
