//! 幂等服务安装器
//!
//! 每个目录项走同一套流程：先查询服务管理器/容器列表判断是否已就位，
//! 已就位则跳过破坏性步骤，只收敛生成文件内容；未就位则按安装方式执行
//! 下载/解包/写 unit（或 compose）/启用启动。
//!
//! 失败策略：下载或解包失败对该服务致命，标记该服务的阶段失败后继续
//! 下一个服务；启动后未报告 active 只记录错误，同样继续。

use tracing::{error, info, warn};

use crate::config::ProvisionConfig;
use crate::domain::{
    ArchiveSpec, ContainerSpec, CpuArch, InstallMethod, ProvisionStage, ServiceDefinition,
    ServiceState,
};
use crate::error::Result;
use crate::infra::{download, CommandSpec, Executor};
use crate::services::{compose, healthcheck, systemd};

/// 压缩包服务是否已安装
///
/// unit 在册或安装目录在位即视为已装；运行状态不参与判定，已装但
/// 停止/失败的服务走重新拉起，不重复下载解包。
pub(crate) fn archive_installed(unit_listed: bool, binary_present: bool) -> bool {
    unit_listed || binary_present
}

/// 安装器上下文
pub struct InstallContext<'a> {
    pub config: &'a ProvisionConfig,
    pub executor: &'a Executor,
    pub arch: CpuArch,
    pub docker_available: bool,
}

impl InstallContext<'_> {
    /// 顺序安装目录中的全部服务，返回每个服务的阶段记录
    pub async fn install_all(&self) -> Vec<ProvisionStage> {
        let mut stages = Vec::new();

        for svc in &self.config.services {
            let mut stage = ProvisionStage::new(
                &format!("install_{}", svc.name),
                &format!("Install {}", svc.display_name),
            );

            if !svc.enabled {
                stage.skip(Some("disabled".to_string()));
                stages.push(stage);
                continue;
            }

            if svc.is_container() && !self.docker_available {
                stage.skip(Some("docker not available".to_string()));
                warn!(service = %svc.name, "skipping container service, docker not available");
                stages.push(stage);
                continue;
            }

            stage.start();
            match self.install_service(svc).await {
                Ok(message) => stage.finish(true, message),
                Err(e) => {
                    error!(service = %svc.name, error = %e, "service installation failed");
                    stage.finish(false, Some(e.to_string()));
                }
            }
            stages.push(stage);
        }

        stages
    }

    async fn install_service(&self, svc: &ServiceDefinition) -> Result<Option<String>> {
        match &svc.install {
            InstallMethod::NativePackage { package } => self.install_native(svc, package).await,
            InstallMethod::ReleaseArchive(spec) => self.install_archive(svc, spec).await,
            InstallMethod::Container(spec) => self.install_container(svc, spec).await,
        }
    }

    /// 发行版软件包安装
    async fn install_native(
        &self,
        svc: &ServiceDefinition,
        package: &str,
    ) -> Result<Option<String>> {
        if self.package_installed(package).await? {
            info!(service = %svc.name, package = %package, "package already installed");
        } else {
            info!(service = %svc.name, package = %package, "installing package");
            self.executor
                .run_checked(&CommandSpec::new("apt-get").args(["install", "-y", package]))
                .await?;
        }

        // enable --now 对已启用/已运行的 unit 幂等
        systemd::enable_now(self.executor, &svc.unit_name()).await?;

        Ok(self.verify_active(svc, ServiceState::Enabled).await)
    }

    /// release 压缩包安装
    async fn install_archive(
        &self,
        svc: &ServiceDefinition,
        spec: &ArchiveSpec,
    ) -> Result<Option<String>> {
        // cron 调度的批处理工具：装二进制 + cron 行，不写 unit
        if let Some(schedule) = &spec.cron_schedule {
            return self.install_scheduled_tool(svc, spec, schedule).await;
        }

        let unit_name = svc.unit_name();
        let unit_listed = systemd::unit_present(self.executor, &unit_name).await?;
        let installed = archive_installed(unit_listed, spec.install_dir.exists());
        let already_active =
            installed && systemd::is_active(self.executor, &unit_name).await?;

        if installed {
            info!(service = %svc.name, "already installed, skipping download and extraction");
        } else {
            self.fetch_and_extract(svc, spec).await?;
        }

        // unit 内容始终收敛；内容没变则不触发 daemon-reload
        let unit = systemd::render_unit(
            &spec.description,
            &spec.exec_start,
            &self.config.user,
            &self.config.group,
            Some(&spec.install_dir.display().to_string()),
        );
        let changed = self
            .executor
            .write_file(&systemd::unit_path(&unit_name), &unit, Some(0o644))
            .await?;
        if changed {
            systemd::daemon_reload(self.executor).await?;
        }

        if already_active && !changed {
            return Ok(Some("already active".to_string()));
        }

        systemd::enable_now(self.executor, &unit_name).await?;
        Ok(self.verify_active(svc, ServiceState::Enabled).await)
    }

    /// 下载、校验、解包、归属权
    async fn fetch_and_extract(&self, svc: &ServiceDefinition, spec: &ArchiveSpec) -> Result<()> {
        let url = spec.resolve_url(self.arch);

        if self.executor.is_dry_run() {
            info!(service = %svc.name, url = %url, "[dry-run] would download and extract");
        } else {
            info!(service = %svc.name, url = %url, "downloading release archive");
            let bytes = download::fetch(&url).await?;
            download::verify_gzip(&bytes)?;
            if let Some(expected) = &spec.sha256 {
                download::verify_sha256(&bytes, expected)?;
            }
            tokio::fs::create_dir_all(&spec.install_dir).await?;
            download::extract_tar_gz(&bytes, &spec.install_dir)?;
        }

        // 数据目录与安装目录归属运行用户
        let data_dir = self.config.data_root.join(&svc.name);
        self.executor
            .run_checked(&CommandSpec::new("mkdir").args(["-p", &data_dir.display().to_string()]))
            .await?;
        let owner = format!("{}:{}", self.config.user, self.config.group);
        for dir in [&spec.install_dir, &data_dir] {
            self.executor
                .run_checked(
                    &CommandSpec::new("chown").args(["-R", &owner, &dir.display().to_string()]),
                )
                .await?;
        }
        Ok(())
    }

    /// cron 调度工具：二进制就位 + crontab 行（按 marker 去重）
    async fn install_scheduled_tool(
        &self,
        svc: &ServiceDefinition,
        spec: &ArchiveSpec,
        schedule: &str,
    ) -> Result<Option<String>> {
        let binary_present = spec.install_dir.exists();
        if binary_present {
            info!(service = %svc.name, "binary already present, skipping download");
        } else {
            self.fetch_and_extract(svc, spec).await?;
        }

        let entry = format!(
            "{} {} {}",
            schedule,
            spec.exec_start,
            healthcheck::marker(&svc.name)
        );
        healthcheck::ensure_crontab_lines(self.executor, &[entry]).await?;

        Ok(Some(if binary_present {
            "already installed; schedule converged".to_string()
        } else {
            "installed with cron schedule".to_string()
        }))
    }

    /// 容器安装
    async fn install_container(
        &self,
        svc: &ServiceDefinition,
        spec: &ContainerSpec,
    ) -> Result<Option<String>> {
        let running = compose::container_running(self.executor, &spec.container_name).await?;

        let path = compose::compose_path(&self.config.data_root, &svc.name);
        let rendered = compose::render(spec);
        let changed = self.executor.write_file(&path, &rendered, Some(0o644)).await?;

        if running && !changed {
            info!(service = %svc.name, "container running and compose file unchanged");
            return Ok(Some("already running".to_string()));
        }

        compose::compose_up(self.executor, &path).await?;

        if self.executor.is_dry_run() {
            return Ok(None);
        }

        if compose::container_running(self.executor, &spec.container_name).await? {
            Ok(None)
        } else {
            // 启动后未就位：记录错误但不中断整个运行
            error!(
                service = %svc.name,
                container = %spec.container_name,
                "container failed to report running after compose up"
            );
            Ok(Some("started but not reporting running".to_string()))
        }
    }

    async fn package_installed(&self, package: &str) -> Result<bool> {
        let output = self
            .executor
            .query(&CommandSpec::new("dpkg").args(["-s", package]))
            .await?;
        Ok(output.success)
    }

    /// 启动后验证；失败只记录错误，返回的消息进入阶段汇总
    async fn verify_active(
        &self,
        svc: &ServiceDefinition,
        state: ServiceState,
    ) -> Option<String> {
        if self.executor.is_dry_run() {
            return None;
        }

        match systemd::is_active(self.executor, &svc.unit_name()).await {
            Ok(true) => {
                info!(service = %svc.name, state = ?ServiceState::Active, "service active");
                None
            }
            Ok(false) => {
                error!(
                    service = %svc.name,
                    state = ?state,
                    "service failed to report active after start"
                );
                Some("enabled but not reporting active".to_string())
            }
            Err(e) => {
                error!(service = %svc.name, error = %e, "failed to query service state");
                Some(format!("state query failed: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listed_unit_counts_as_installed_even_when_stopped() {
        // a unit in the systemd list skips download/extraction regardless of
        // whether it is currently active
        assert!(archive_installed(true, false));
        assert!(archive_installed(true, true));
    }

    #[test]
    fn test_binary_on_disk_counts_as_installed() {
        assert!(archive_installed(false, true));
    }

    #[test]
    fn test_fresh_host_needs_fetch() {
        assert!(!archive_installed(false, false));
    }
}
