//! Mediastack Provisioner - 家庭媒体服务器一键部署
//!
//! 模块化库入口

pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod logging;
pub mod preflight;
pub mod provisioner;
pub mod services;

use tracing::{error, info};

use crate::infra::Executor;

/// 命令行解析结果
#[derive(Clone, Debug, Default)]
pub struct RuntimeConfig {
    pub debug: bool,
    pub dry_run: bool,
}

/// 进程退出码
pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

/// 初始化日志并跑完整个流水线,返回退出码
pub async fn init_and_run(runtime: RuntimeConfig) -> i32 {
    // 验证前先装好配置,日志文件路径也来自它;dry-run 不碰文件系统,
    // 日志只走终端
    let config = config::ProvisionConfig::from_env();
    let log_file = if runtime.dry_run {
        None
    } else {
        Some(config.run_log_path())
    };
    logging::init(runtime.debug, log_file.as_deref());

    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %host,
        dry_run = runtime.dry_run,
        "mediastack provisioner starting"
    );

    if let Err(e) = config.validate() {
        error!(error = %e, "configuration validation failed");
        return EXIT_FAILURE;
    }

    let executor = Executor::new(runtime.dry_run);
    let stdin = std::io::stdin();
    let mut reader = stdin.lock();
    let mut writer = std::io::stdout();

    match provisioner::run(&config, &executor, &mut reader, &mut writer).await {
        Ok(report) => {
            report.log_summary();
            if report.has_failures() {
                error!("one or more stages failed");
                EXIT_FAILURE
            } else {
                info!("provisioning complete");
                EXIT_OK
            }
        }
        Err(e) => {
            error!(error = %e, "provisioning aborted");
            EXIT_FAILURE
        }
    }
}
