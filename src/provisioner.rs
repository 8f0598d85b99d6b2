//! 单趟顺序驱动器
//!
//! 预检 → 磁盘池 → 逐服务安装 → 反代 → TLS → DDNS → 日志留存 →
//! 健康检查 → 菜单,跑完打印阶段汇总。配置/预检失败在任何变更前
//! 中止;单个服务失败只标记该服务阶段,不阻断后续阶段。

use std::io::{BufRead, Write};

use tracing::{error, info};

use crate::config::ProvisionConfig;
use crate::domain::{ProvisionStage, StageStatus};
use crate::error::Result;
use crate::infra::Executor;
use crate::preflight;
use crate::services::{ddns, healthcheck, installer, logrotate, menu, proxy, storage, tls};

/// 一次 provisioning 运行的结果
pub struct ProvisionReport {
    pub stages: Vec<ProvisionStage>,
}

impl ProvisionReport {
    /// 是否存在失败阶段
    pub fn has_failures(&self) -> bool {
        self.stages
            .iter()
            .any(|s| s.status == StageStatus::Failed)
    }

    /// 逐行走 tracing 输出汇总,终端与运行日志文件各得一份
    pub fn log_summary(&self) {
        for line in self.summary().lines() {
            info!("{}", line);
        }
    }

    /// 终端汇总
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str("==== provisioning summary ====\n");
        for stage in &self.stages {
            out.push_str(&format!("{} {}", stage.icon(), stage.display_name));
            if let Some(ms) = stage.duration_ms {
                out.push_str(&format!(" ({ms}ms)"));
            }
            if let Some(message) = &stage.message {
                out.push_str(&format!(" - {message}"));
            }
            out.push('\n');
        }
        out
    }
}

/// 跑完整个流水线
pub async fn run(
    config: &ProvisionConfig,
    executor: &Executor,
    reader: &mut impl BufRead,
    writer: &mut impl Write,
) -> Result<ProvisionReport> {
    let mut stages = Vec::new();

    // 预检失败直接冒泡,此时还没有任何变更
    let mut stage = ProvisionStage::new("preflight", "Preflight");
    stage.start();
    let probe = match preflight::check(executor).await {
        Ok(probe) => {
            stage.finish(true, None);
            stages.push(stage);
            probe
        }
        Err(e) => {
            stage.finish(false, Some(e.to_string()));
            stages.push(stage);
            return Err(e);
        }
    };
    info!(os = %probe.os_id, arch = %probe.arch.release_param(), "preflight passed");

    let mut stage = ProvisionStage::new("storage", "Storage Pool");
    if config.storage.drives.is_empty() {
        stage.skip(Some("no drives configured".to_string()));
        stages.push(stage);
    } else {
        stage.start();
        match storage::apply(executor, config, reader, writer).await {
            Ok(()) => stage.finish(true, None),
            Err(e) => {
                // 中止确认或挂载失败视为致命,磁盘状态不明时不该继续装服务
                stage.finish(false, Some(e.to_string()));
                stages.push(stage);
                return Err(e);
            }
        }
        stages.push(stage);
    }

    let context = installer::InstallContext {
        config,
        executor,
        arch: probe.arch,
        docker_available: probe.docker_available,
    };
    stages.extend(context.install_all().await);

    run_stage(&mut stages, "reverse_proxy", "Reverse Proxy", async {
        proxy::apply(executor, config).await
    })
    .await;
    run_stage(&mut stages, "tls", "Firewall / TLS", async {
        tls::apply(executor, config).await
    })
    .await;
    run_stage(&mut stages, "ddns", "Dynamic DNS", async {
        ddns::apply(executor, config).await
    })
    .await;
    run_stage(&mut stages, "log_retention", "Log Retention", async {
        logrotate::apply(executor, config).await
    })
    .await;
    run_stage(&mut stages, "health_checks", "Health Checks", async {
        healthcheck::apply(executor, config).await.map(|_| ())
    })
    .await;
    run_stage(&mut stages, "menu", "Terminal Menu", async {
        menu::apply(executor, config).await
    })
    .await;

    Ok(ProvisionReport { stages })
}

/// 单个编排阶段:失败记录并继续
async fn run_stage(
    stages: &mut Vec<ProvisionStage>,
    name: &str,
    display_name: &str,
    work: impl std::future::Future<Output = Result<()>>,
) {
    let mut stage = ProvisionStage::new(name, display_name);
    stage.start();
    match work.await {
        Ok(()) => stage.finish(true, None),
        Err(e) => {
            error!(stage = %name, error = %e, "stage failed");
            stage.finish(false, Some(e.to_string()));
        }
    }
    stages.push(stage);
}
