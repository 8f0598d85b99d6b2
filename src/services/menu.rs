//! 终端菜单生成
//!
//! 往 /usr/local/bin/mediastack-menu 写一个小 shell 菜单,内容从启用的
//! 服务目录推导。每次运行整体覆盖,0755。

use std::path::PathBuf;

use tracing::info;

use crate::config::ProvisionConfig;
use crate::error::Result;
use crate::infra::Executor;

const MENU_PATH: &str = "/usr/local/bin/mediastack-menu";

/// 渲染菜单脚本
pub fn render_menu(config: &ProvisionConfig) -> String {
    let mut status_lines = String::new();
    let mut url_lines = String::new();
    let mut restart_cases = String::new();

    for svc in config.enabled_services() {
        // cron 调度的批处理工具没有 unit 和重启语义
        if let crate::domain::InstallMethod::ReleaseArchive(spec) = &svc.install {
            if spec.cron_schedule.is_some() {
                continue;
            }
        }
        if svc.is_container() {
            status_lines.push_str(&format!(
                "        docker ps --filter name={} --format '{}: {{{{.Status}}}}'\n",
                svc.name, svc.display_name
            ));
        } else {
            status_lines.push_str(&format!(
                "        systemctl status {} --no-pager -l | head -n 3\n",
                svc.unit_name()
            ));
        }
        if let Some(port) = svc.port {
            url_lines.push_str(&format!(
                "        echo '{}: http://'\"$host\"':{}/'\n",
                svc.display_name, port
            ));
        }
        restart_cases.push_str(&format!(
            "            {}) {} ;;\n",
            svc.name,
            svc.restart_command()
        ));
    }

    let mut out = String::new();
    out.push_str("#!/usr/bin/env bash\n");
    out.push_str("# Generated by mediastack-provisioner; manual edits will be overwritten.\n");
    out.push_str("set -u\n");
    out.push_str("host=$(hostname -I 2>/dev/null | awk '{print $1}')\n");
    out.push_str("host=${host:-127.0.0.1}\n");
    out.push('\n');
    out.push_str("while true; do\n");
    out.push_str("    echo ''\n");
    out.push_str("    echo '=== mediastack menu ==='\n");
    out.push_str("    echo '1) service status'\n");
    out.push_str("    echo '2) web UI addresses'\n");
    out.push_str("    echo '3) restart a service'\n");
    out.push_str("    echo '4) running containers'\n");
    out.push_str("    echo 'q) quit'\n");
    out.push_str("    read -r -p '> ' choice\n");
    out.push_str("    case \"$choice\" in\n");
    out.push_str("    1)\n");
    out.push_str(&status_lines);
    out.push_str("        ;;\n");
    out.push_str("    2)\n");
    out.push_str(&url_lines);
    out.push_str("        ;;\n");
    out.push_str("    3)\n");
    out.push_str("        read -r -p 'service name: ' name\n");
    out.push_str("        case \"$name\" in\n");
    out.push_str(&restart_cases);
    out.push_str("            *) echo \"unknown service: $name\" ;;\n");
    out.push_str("        esac\n");
    out.push_str("        ;;\n");
    out.push_str("    4)\n");
    out.push_str("        docker ps --format 'table {{.Names}}\\t{{.Status}}\\t{{.Ports}}'\n");
    out.push_str("        ;;\n");
    out.push_str("    q) exit 0 ;;\n");
    out.push_str("    *) echo 'unknown choice' ;;\n");
    out.push_str("    esac\n");
    out.push_str("done\n");
    out
}

/// 写出菜单脚本
pub async fn apply(executor: &Executor, config: &ProvisionConfig) -> Result<()> {
    let changed = executor
        .write_file(&PathBuf::from(MENU_PATH), &render_menu(config), Some(0o755))
        .await?;
    if changed {
        info!(path = MENU_PATH, "terminal menu installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProvisionConfig {
        crate::config::env::tests::minimal_config()
    }

    #[test]
    fn test_menu_lists_enabled_services() {
        let menu = render_menu(&config());
        assert!(menu.starts_with("#!/usr/bin/env bash\n"));
        assert!(menu.contains("systemctl status jellyfin.service"));
        assert!(menu.contains("Jellyfin: http://'\"$host\"':8096/"));
        assert!(menu.contains("jellyfin) systemctl restart jellyfin.service ;;"));
    }

    #[test]
    fn test_menu_containers_use_docker() {
        let menu = render_menu(&config());
        assert!(menu.contains("docker ps --filter name=jellyseerr"));
        assert!(menu.contains("jellyseerr) docker restart jellyseerr ;;"));
    }

    #[test]
    fn test_menu_skips_disabled_services() {
        let mut config = config();
        for svc in &mut config.services {
            if svc.name == "sonarr" {
                svc.enabled = false;
            }
        }
        let menu = render_menu(&config);
        assert!(!menu.contains("sonarr"));
    }

    #[test]
    fn test_menu_omits_cron_driven_tools() {
        let menu = render_menu(&config());
        assert!(!menu.contains("recyclarr"));
    }

    #[test]
    fn test_menu_portless_service_has_no_url() {
        let menu = render_menu(&config());
        assert!(!menu.contains("Watchtower: http://"));
        assert!(menu.contains("watchtower) docker restart watchtower ;;"));
    }
}
