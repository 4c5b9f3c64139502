//! 日志模块：env_logger 定制（控制台颜色 + 文件镜像 + 启动时轮转）。
//! 由 main 基于 LogConfig 显式构建；文件句柄归属格式化闭包，
//! 不再依赖模块级的全局可变状态。
use crate::config::LogConfig;
use crate::errors::error::AppError;
use env_logger::fmt::Formatter;
use env_logger::{Builder, Target, WriteStyle};
use log::{Level, LevelFilter, Record};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

const LOG_MAX_SIZE_MB: u64 = 10;
const LOG_MAX_ROTATIONS: usize = 5;

// ==================== 初始化日志系统 ====================
pub fn init_logger(config: &LogConfig) -> Result<(), AppError> {
    let level_filter = match config.level.to_uppercase().as_str() {
        "TRACE" => LevelFilter::Trace,
        "DEBUG" => LevelFilter::Debug,
        "INFO" => LevelFilter::Info,
        "WARN" => LevelFilter::Warn,
        "ERROR" => LevelFilter::Error,
        other => {
            eprintln!("⚠️ 无效日志级别「{}」，使用默认 INFO", other);
            LevelFilter::Info
        }
    };

    fs::create_dir_all(&config.dir)?;

    // 轮转在启动时执行一次
    rotate_logs(&config.dir, &config.file_name)?;

    let log_file_path = Path::new(&config.dir).join(&config.file_name);
    // 文件句柄随格式化闭包存活；创建失败时只输出控制台
    let file_writer: Mutex<Option<File>> = Mutex::new(match File::create(&log_file_path) {
        Ok(f) => Some(f),
        Err(e) => {
            eprintln!("❌ 创建日志文件失败: {}", e);
            None
        }
    });

    let mut builder = Builder::new();
    builder
        .filter(None, level_filter)
        .filter(Some("ethers_providers"), LevelFilter::Warn)
        .filter(Some("ethers_signers"), LevelFilter::Warn)
        .write_style(WriteStyle::Always)
        .format(move |f: &mut Formatter, record: &Record| {
            let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S.%3f");

            // 控制台彩色输出
            let level_color = match record.level() {
                Level::Error => "\x1b[91m", // 亮红色
                Level::Warn => "\x1b[93m",  // 亮黄色
                Level::Info => "\x1b[92m",  // 亮绿色
                Level::Debug => "\x1b[96m", // 亮青色
                Level::Trace => "\x1b[95m", // 亮紫色
            };
            let reset = "\x1b[0m";
            let module_color = "\x1b[31m";

            let console_log = writeln!(
                f,
                "[{}] [{}] [{}] - {}",
                now,
                format!("{}{:>5}{}", level_color, record.level(), reset),
                format!(
                    "{}{}{}",
                    module_color,
                    record.module_path().unwrap_or("unknown"),
                    reset
                ),
                record.args()
            );

            // 同步镜像到文件，写入失败不影响控制台输出
            if let Ok(mut guard) = file_writer.lock() {
                if let Some(file) = guard.as_mut() {
                    let file_log = format!(
                        "[{}] [模块: {}] [级别: {}] - {}\n",
                        now,
                        record.module_path().unwrap_or("unknown"),
                        record.level(),
                        record.args()
                    );
                    let _ = file.write_all(file_log.as_bytes());
                }
            }

            console_log
        })
        .target(Target::Stdout);

    builder
        .try_init()
        .map_err(|e| AppError::Internal(format!("日志初始化失败: {}", e)))?;

    log::info!(
        "✅ 日志系统初始化完成 | 级别: {} | 日志文件: {}",
        config.level,
        log_file_path.display()
    );
    Ok(())
}

// ==================== 日志轮转 ====================
fn rotate_logs(log_dir: &str, log_file: &str) -> io::Result<()> {
    let log_path = Path::new(log_dir).join(log_file);

    if !log_path.exists() {
        return Ok(());
    }

    let file_size_mb = fs::metadata(&log_path)?.len() / (1024 * 1024);
    if file_size_mb < LOG_MAX_SIZE_MB {
        return Ok(());
    }

    for i in (1..LOG_MAX_ROTATIONS).rev() {
        let src = Path::new(log_dir).join(format!("{}.{}", log_file, i));
        let dest = Path::new(log_dir).join(format!("{}.{}", log_file, i + 1));
        if src.exists() {
            fs::rename(&src, &dest)?;
        }
    }

    let new_log_1 = Path::new(log_dir).join(format!("{}.1", log_file));
    fs::rename(&log_path, &new_log_1)?;
    File::create(&log_path)?;

    Ok(())
}

// ==================== 便捷日志宏 ====================
#[macro_export]
macro_rules! log_trace { ($($arg:tt)*) => { log::trace!($($arg)*) }; }
#[macro_export]
macro_rules! log_debug { ($($arg:tt)*) => { log::debug!($($arg)*) }; }
#[macro_export]
macro_rules! log_info  { ($($arg:tt)*) => { log::info!($($arg)*) }; }
#[macro_export]
macro_rules! log_warn  { ($($arg:tt)*) => { log::warn!($($arg)*) }; }
#[macro_export]
macro_rules! log_error { ($($arg:tt)*) => { log::error!($($arg)*) }; }
