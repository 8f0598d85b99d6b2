//! 动态 DNS (ddclient)
//!
//! 配置文件整体生成覆盖,含密钥所以落盘权限必须是 0600。

use std::path::PathBuf;

use tracing::info;

use crate::config::ProvisionConfig;
use crate::error::Result;
use crate::infra::{CommandSpec, Executor};

const CONF_PATH: &str = "/etc/ddclient.conf";

/// 渲染 ddclient.conf
pub fn render_conf(config: &ProvisionConfig) -> String {
    let ddns = &config.ddns;
    let record = if config.tls.domain.is_empty() {
        ddns.zone.as_str()
    } else {
        config.tls.domain.as_str()
    };

    let mut out = String::new();
    out.push_str("# Generated by mediastack-provisioner; manual edits will be overwritten.\n");
    out.push_str("daemon=300\n");
    out.push_str("syslog=yes\n");
    out.push_str("use=web, web=checkip.dyndns.org\n");
    out.push_str("ssl=yes\n");
    out.push('\n');
    out.push_str(&format!("protocol={}\n", ddns.protocol));
    out.push_str(&format!("login={}\n", ddns.login));
    out.push_str(&format!("password='{}'\n", ddns.password));
    out.push_str(&format!("zone={}\n", ddns.zone));
    out.push_str(&format!("{record}\n"));
    out
}

/// 安装并配置 ddclient,配置变更时重启服务
pub async fn apply(executor: &Executor, config: &ProvisionConfig) -> Result<()> {
    if !config.ddns.enabled {
        info!("ddns disabled, skipping ddclient setup");
        return Ok(());
    }

    let present = executor
        .query(&CommandSpec::new("which").arg("ddclient"))
        .await?
        .success;
    if !present {
        info!("ddclient not found, installing");
        executor
            .run_checked(&CommandSpec::new("apt-get").args(["install", "-y", "ddclient"]))
            .await?;
    }

    let path = PathBuf::from(CONF_PATH);
    executor.backup_file(&path).await?;
    let changed = executor
        .write_file(&path, &render_conf(config), Some(0o600))
        .await?;

    executor
        .run_checked(&CommandSpec::new("systemctl").args(["enable", "--now", "ddclient"]))
        .await?;
    if changed {
        executor
            .run_checked(&CommandSpec::new("systemctl").args(["restart", "ddclient"]))
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DdnsConfig, TlsConfig};

    fn config() -> ProvisionConfig {
        let mut config = crate::config::env::tests::minimal_config();
        config.ddns = DdnsConfig {
            enabled: true,
            protocol: "cloudflare".to_string(),
            login: "ops@example.org".to_string(),
            password: "token-123".to_string(),
            zone: "example.org".to_string(),
        };
        config.tls = TlsConfig {
            enabled: false,
            domain: String::new(),
            certbot_email: String::new(),
        };
        config
    }

    #[test]
    fn test_render_conf_fields() {
        let conf = render_conf(&config());
        assert!(conf.contains("protocol=cloudflare"));
        assert!(conf.contains("login=ops@example.org"));
        assert!(conf.contains("password='token-123'"));
        assert!(conf.contains("zone=example.org"));
        assert!(conf.ends_with("example.org\n"));
    }

    #[test]
    fn test_render_conf_prefers_tls_domain_record() {
        let mut config = config();
        config.tls.domain = "media.example.org".to_string();
        let conf = render_conf(&config);
        assert!(conf.ends_with("media.example.org\n"));
    }
}
