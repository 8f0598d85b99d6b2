//! systemd unit 生成与控制
//!
//! unit 文件由类型化字段渲染（描述、ExecStart、用户/组、工作目录），
//! 不做自由字符串拼接插值。unit registry 以 systemd 自身为准：先查询
//! 再有条件地变更。

use std::path::PathBuf;

use crate::error::Result;
use crate::infra::{CommandSpec, Executor};

/// unit 文件安装目录
const UNIT_DIR: &str = "/etc/systemd/system";

/// unit 文件路径
pub fn unit_path(unit_name: &str) -> PathBuf {
    PathBuf::from(UNIT_DIR).join(unit_name)
}

/// 渲染 service unit 文件
pub fn render_unit(
    description: &str,
    exec_start: &str,
    user: &str,
    group: &str,
    working_dir: Option<&str>,
) -> String {
    let mut out = String::new();
    out.push_str("[Unit]\n");
    out.push_str(&format!("Description={}\n", description));
    out.push_str("After=network.target\n");
    out.push('\n');
    out.push_str("[Service]\n");
    out.push_str("Type=simple\n");
    out.push_str(&format!("User={}\n", user));
    out.push_str(&format!("Group={}\n", group));
    if let Some(dir) = working_dir {
        out.push_str(&format!("WorkingDirectory={}\n", dir));
    }
    out.push_str(&format!("ExecStart={}\n", exec_start));
    out.push_str("Restart=on-failure\n");
    out.push_str("RestartSec=5\n");
    out.push('\n');
    out.push_str("[Install]\n");
    out.push_str("WantedBy=multi-user.target\n");
    out
}

/// unit 是否已注册（`systemctl list-units --all` 中出现）
pub async fn unit_present(executor: &Executor, unit_name: &str) -> Result<bool> {
    let output = executor
        .query(
            &CommandSpec::new("systemctl")
                .args(["list-units", "--all", "--type=service", "--no-legend", "--plain"]),
        )
        .await?;
    Ok(output
        .stdout
        .lines()
        .any(|line| line.split_whitespace().next() == Some(unit_name)))
}

/// unit 是否处于 active 状态
pub async fn is_active(executor: &Executor, unit_name: &str) -> Result<bool> {
    let output = executor
        .query(&CommandSpec::new("systemctl").args(["is-active", unit_name]))
        .await?;
    Ok(output.stdout.trim() == "active")
}

pub async fn daemon_reload(executor: &Executor) -> Result<()> {
    executor
        .run_checked(&CommandSpec::new("systemctl").arg("daemon-reload"))
        .await?;
    Ok(())
}

/// enable + start，一步到位；对已 active 的 unit 幂等
pub async fn enable_now(executor: &Executor, unit_name: &str) -> Result<()> {
    executor
        .run_checked(&CommandSpec::new("systemctl").args(["enable", "--now", unit_name]))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_unit_fields() {
        let unit = render_unit(
            "Sonarr TV series manager",
            "/opt/sonarr/Sonarr/Sonarr -nobrowser -data=/srv/mediastack/sonarr",
            "media",
            "media",
            Some("/opt/sonarr"),
        );
        assert!(unit.contains("Description=Sonarr TV series manager"));
        assert!(unit.contains("ExecStart=/opt/sonarr/Sonarr/Sonarr -nobrowser"));
        assert!(unit.contains("User=media\n"));
        assert!(unit.contains("Group=media\n"));
        assert!(unit.contains("WorkingDirectory=/opt/sonarr\n"));
        assert!(unit.contains("Restart=on-failure"));
        assert!(unit.contains("WantedBy=multi-user.target"));
    }

    #[test]
    fn test_render_unit_without_workdir() {
        let unit = render_unit("X", "/usr/bin/x", "media", "media", None);
        assert!(!unit.contains("WorkingDirectory"));
    }

    #[test]
    fn test_render_unit_stable_across_runs() {
        // the installer relies on byte-identical re-renders for idempotent writes
        let a = render_unit("X", "/usr/bin/x", "media", "media", Some("/opt/x"));
        let b = render_unit("X", "/usr/bin/x", "media", "media", Some("/opt/x"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_unit_path() {
        assert_eq!(
            unit_path("sonarr.service"),
            PathBuf::from("/etc/systemd/system/sonarr.service")
        );
    }
}
