//! 预检
//!
//! 权限、发行版、CPU 架构与基础工具检查。任何一项不满足都在第一个
//! 变更动作之前终止运行。

use tracing::{info, warn};

use crate::domain::CpuArch;
use crate::error::{ProvisionError, Result};
use crate::infra::{CommandSpec, Executor};

/// 支持的发行版（/etc/os-release 的 ID 字段）
const SUPPORTED_OS_IDS: &[&str] = &["debian", "ubuntu", "raspbian"];

/// 预检结果
#[derive(Debug, Clone)]
pub struct Preflight {
    pub os_id: String,
    pub arch: CpuArch,
    /// docker 是否可用（容器服务需要；缺失只影响容器阶段）
    pub docker_available: bool,
}

/// 执行全部预检
pub async fn check(executor: &Executor) -> Result<Preflight> {
    check_privileges(executor.is_dry_run())?;

    let os_release = tokio::fs::read_to_string("/etc/os-release")
        .await
        .unwrap_or_default();
    let os_id = check_os(&os_release)?;

    let arch = detect_arch(executor).await?;

    require_tool(executor, "apt-get").await?;
    require_tool(executor, "systemctl").await?;

    let docker_available = tool_exists(executor, "docker").await;
    if !docker_available {
        warn!("docker not found on PATH; container services will be skipped");
    }

    info!(
        os = %os_id,
        arch = arch.release_param(),
        docker = docker_available,
        "preflight checks passed"
    );

    Ok(Preflight {
        os_id,
        arch,
        docker_available,
    })
}

/// root 权限检查；dry-run 只警告
fn check_privileges(dry_run: bool) -> Result<()> {
    let euid = unsafe { libc::geteuid() };
    if euid != 0 {
        if dry_run {
            warn!("not running as root; fine for --dry-run, a real run would abort here");
            return Ok(());
        }
        return Err(ProvisionError::Preflight(
            "must run as root (try sudo)".to_string(),
        ));
    }
    Ok(())
}

/// 校验发行版
fn check_os(os_release: &str) -> Result<String> {
    let id = parse_os_release_id(os_release).ok_or_else(|| {
        ProvisionError::Preflight("cannot determine distribution from /etc/os-release".to_string())
    })?;

    if !SUPPORTED_OS_IDS.contains(&id.as_str()) {
        return Err(ProvisionError::Preflight(format!(
            "unsupported distribution '{}' (supported: {})",
            id,
            SUPPORTED_OS_IDS.join(", ")
        )));
    }
    Ok(id)
}

/// 从 /etc/os-release 内容解析 ID 字段
pub fn parse_os_release_id(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("ID="))
        .map(|v| v.trim().trim_matches('"').to_ascii_lowercase())
        .filter(|v| !v.is_empty())
}

/// 检测 CPU 架构并映射到上游下载参数
///
/// 不在支持集内的架构在任何下载之前就判致命。
async fn detect_arch(executor: &Executor) -> Result<CpuArch> {
    let output = executor
        .query(&CommandSpec::new("dpkg").arg("--print-architecture"))
        .await?;

    if !output.success {
        return Err(ProvisionError::Preflight(
            "dpkg --print-architecture failed".to_string(),
        ));
    }

    let raw = output.stdout.trim().to_string();
    CpuArch::from_dpkg(&raw).ok_or_else(|| {
        ProvisionError::Preflight(format!("unsupported CPU architecture '{}'", raw))
    })
}

async fn tool_exists(executor: &Executor, name: &str) -> bool {
    executor
        .query(&CommandSpec::new("which").arg(name))
        .await
        .map(|o| o.success)
        .unwrap_or(false)
}

async fn require_tool(executor: &Executor, name: &str) -> Result<()> {
    if tool_exists(executor, name).await {
        Ok(())
    } else {
        Err(ProvisionError::Preflight(format!(
            "required tool '{}' not found on PATH",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_os_release_id() {
        let debian = "PRETTY_NAME=\"Debian GNU/Linux 12 (bookworm)\"\nID=debian\n";
        assert_eq!(parse_os_release_id(debian), Some("debian".to_string()));

        let ubuntu = "NAME=\"Ubuntu\"\nID=\"ubuntu\"\nID_LIKE=debian\n";
        assert_eq!(parse_os_release_id(ubuntu), Some("ubuntu".to_string()));

        assert_eq!(parse_os_release_id(""), None);
        assert_eq!(parse_os_release_id("NAME=x\n"), None);
    }

    #[test]
    fn test_check_os() {
        assert!(check_os("ID=debian\n").is_ok());
        assert!(check_os("ID=ubuntu\n").is_ok());
        assert!(check_os("ID=raspbian\n").is_ok());

        let err = check_os("ID=arch\n").unwrap_err().to_string();
        assert!(err.contains("arch"));
        assert!(check_os("").is_err());
    }
}
