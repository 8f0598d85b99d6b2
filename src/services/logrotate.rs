//! 日志留存策略
//!
//! 两块:docker daemon.json 的容器日志上限,以及本工具自身运行日志的
//! logrotate 规则。daemon.json 只覆盖日志相关键,其余键原样保留。

use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::config::ProvisionConfig;
use crate::error::Result;
use crate::infra::{CommandSpec, Executor};

const DAEMON_JSON: &str = "/etc/docker/daemon.json";
const LOGROTATE_RULE: &str = "/etc/logrotate.d/mediastack";

/// 在已有 daemon.json 上合并日志选项
///
/// 解析失败时告警并从空对象重建,不让一个坏文件卡住整个流程。
pub fn merge_daemon_json(existing: &str, config: &ProvisionConfig) -> String {
    let mut root = match serde_json::from_str::<Value>(existing) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            if !existing.trim().is_empty() {
                warn!(path = DAEMON_JSON, "unparsable daemon.json, rebuilding");
            }
            Map::new()
        }
    };

    root.insert("log-driver".to_string(), json!("json-file"));
    root.insert(
        "log-opts".to_string(),
        json!({
            "max-size": config.log.docker_max_size,
            "max-file": config.log.docker_max_file.to_string(),
        }),
    );

    let mut out = serde_json::to_string_pretty(&Value::Object(root))
        .unwrap_or_else(|_| "{}".to_string());
    out.push('\n');
    out
}

/// logrotate 规则文本
pub fn render_logrotate_rule(config: &ProvisionConfig) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}/*.log {{\n", config.log.dir.display()));
    out.push_str("    daily\n");
    out.push_str(&format!("    rotate {}\n", config.log.keep_days));
    out.push_str("    compress\n");
    out.push_str("    delaycompress\n");
    out.push_str("    missingok\n");
    out.push_str("    notifempty\n");
    out.push_str("    copytruncate\n");
    out.push_str("}\n");
    out
}

/// 应用 docker 日志上限与 logrotate 规则
pub async fn apply(executor: &Executor, config: &ProvisionConfig) -> Result<()> {
    let daemon_path = PathBuf::from(DAEMON_JSON);
    let existing = if executor.is_dry_run() {
        String::new()
    } else {
        read_existing(&daemon_path)
    };
    let merged = merge_daemon_json(&existing, config);

    executor.backup_file(&daemon_path).await?;
    let changed = executor
        .write_file(&daemon_path, &merged, Some(0o644))
        .await?;
    if changed {
        info!("docker log options updated, restarting docker daemon");
        executor
            .run_checked(&CommandSpec::new("systemctl").args(["restart", "docker"]))
            .await?;
    }

    executor
        .write_file(
            &PathBuf::from(LOGROTATE_RULE),
            &render_logrotate_rule(config),
            Some(0o644),
        )
        .await?;
    Ok(())
}

fn read_existing(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProvisionConfig {
        crate::config::env::tests::minimal_config()
    }

    #[test]
    fn test_merge_into_empty() {
        let merged = merge_daemon_json("", &config());
        let value: Value = serde_json::from_str(&merged).unwrap();
        assert_eq!(value["log-driver"], "json-file");
        assert_eq!(value["log-opts"]["max-size"], "10m");
        assert_eq!(value["log-opts"]["max-file"], "3");
    }

    #[test]
    fn test_merge_preserves_foreign_keys() {
        let existing = r#"{"storage-driver":"overlay2","log-opts":{"max-size":"1g"}}"#;
        let merged = merge_daemon_json(existing, &config());
        let value: Value = serde_json::from_str(&merged).unwrap();
        assert_eq!(value["storage-driver"], "overlay2");
        assert_eq!(value["log-opts"]["max-size"], "10m");
    }

    #[test]
    fn test_merge_recovers_from_garbage() {
        let merged = merge_daemon_json("not json at all", &config());
        let value: Value = serde_json::from_str(&merged).unwrap();
        assert_eq!(value["log-driver"], "json-file");
    }

    #[test]
    fn test_merge_is_stable() {
        let first = merge_daemon_json("", &config());
        let second = merge_daemon_json(&first, &config());
        assert_eq!(first, second);
    }

    #[test]
    fn test_logrotate_rule() {
        let rule = render_logrotate_rule(&config());
        assert!(rule.starts_with("/var/log/mediastack/*.log {"));
        assert!(rule.contains("rotate 14"));
        assert!(rule.contains("copytruncate"));
    }
}
