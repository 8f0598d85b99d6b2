//! TLS 终端配置
//!
//! ufw 放行 + certbot 签发。证书已存在时跳过签发,证书续期由
//! certbot 自带的 systemd timer 负责,这里不重复注册。

use std::path::Path;

use tracing::{info, warn};

use crate::config::ProvisionConfig;
use crate::error::Result;
use crate::infra::{CommandSpec, Executor};

/// 已签发证书的落盘位置
fn live_cert_dir(domain: &str) -> String {
    format!("/etc/letsencrypt/live/{domain}")
}

/// 放行 HTTP/HTTPS/SSH
///
/// ufw 不在位时告警跳过,不视为失败。
pub async fn open_firewall(executor: &Executor) -> Result<()> {
    let present = executor
        .query(&CommandSpec::new("which").arg("ufw"))
        .await?
        .success;
    if !present {
        warn!("ufw not installed, skipping firewall rules");
        return Ok(());
    }

    for rule in ["OpenSSH", "80/tcp", "443/tcp"] {
        executor
            .run_checked(&CommandSpec::new("ufw").args(["allow", rule]))
            .await?;
    }
    Ok(())
}

/// 为配置的域名签发证书并挂到 nginx 站点上
pub async fn apply(executor: &Executor, config: &ProvisionConfig) -> Result<()> {
    if !config.tls.enabled {
        info!("tls disabled, skipping certificate issuance");
        return Ok(());
    }

    open_firewall(executor).await?;

    let domain = config.tls.domain.as_str();
    if !executor.is_dry_run() && Path::new(&live_cert_dir(domain)).exists() {
        info!(domain = %domain, "certificate already issued, skipping certbot");
        return Ok(());
    }

    let certbot = executor
        .query(&CommandSpec::new("which").arg("certbot"))
        .await?
        .success;
    if !certbot {
        executor
            .run_checked(
                &CommandSpec::new("apt-get").args(["install", "-y", "certbot", "python3-certbot-nginx"]),
            )
            .await?;
    }

    info!(domain = %domain, "requesting certificate");
    executor
        .run_checked(&CommandSpec::new("certbot").args([
            "--nginx",
            "--non-interactive",
            "--agree-tos",
            "--redirect",
            "-m",
            config.tls.certbot_email.as_str(),
            "-d",
            domain,
        ]))
        .await?;

    Ok(())
}
