//! 日志初始化
//!
//! 终端 + 持久日志文件双路输出；`--debug` 降低默认过滤级别，
//! `RUST_LOG` 始终优先。dry-run 模式不落盘（不产生任何文件系统变更）。

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 初始化 tracing 订阅器
///
/// `log_file` 为 `None`（dry-run）时只输出到终端。文件打开失败（例如
/// 非 root 调试运行）降级为终端输出并在 stderr 提示。
pub fn init(debug: bool, log_file: Option<&Path>) {
    let default_filter = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    let file_layer = log_file.and_then(|path| {
        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                eprintln!(
                    "warning: cannot create log directory {}, logging to terminal only",
                    parent.display()
                );
                return None;
            }
        }
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            ),
            Err(e) => {
                eprintln!(
                    "warning: cannot open log file {} ({}), logging to terminal only",
                    path.display(),
                    e
                );
                None
            }
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
}
