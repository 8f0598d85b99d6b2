//! 健康检查注册器
//!
//! 为每个开启健康检查的服务在 crontab 里维护恰好一条探测：curl 探测端口，
//! 失败则重启。插入前按行尾 marker 子串去重，重复运行不产生重复条目。

use tracing::{debug, info};

use crate::config::ProvisionConfig;
use crate::domain::ServiceDefinition;
use crate::error::Result;
use crate::infra::{CommandSpec, Executor};

/// 去重用的行尾标记
pub fn marker(name: &str) -> String {
    format!("# mediastack:{}", name)
}

/// 生成某个服务的探测行；无端口的服务没有探测
pub fn entry_for(svc: &ServiceDefinition) -> Option<String> {
    let port = svc.port?;
    Some(format!(
        "*/5 * * * * curl -fsS -m 10 http://127.0.0.1:{}/ >/dev/null 2>&1 || {} {}",
        port,
        svc.restart_command(),
        marker(&svc.name)
    ))
}

/// 合并探测行到现有 crontab 内容
///
/// 返回新的 crontab 文本与新增条数。已含对应 marker 的行保持原样，
/// 绝不重复插入。
pub fn merge(existing: &str, entries: &[String]) -> (String, usize) {
    let mut table = existing.trim_end().to_string();
    let mut added = 0;

    for entry in entries {
        let Some(mark) = entry.rsplit("# ").next().map(|m| format!("# {}", m)) else {
            continue;
        };
        if table.contains(&mark) {
            debug!(marker = %mark, "crontab entry already present");
            continue;
        }
        if !table.is_empty() {
            table.push('\n');
        }
        table.push_str(entry);
        added += 1;
    }

    if !table.is_empty() {
        table.push('\n');
    }
    (table, added)
}

/// 读取当前 crontab（没有 crontab 视为空表）
async fn current_crontab(executor: &Executor) -> Result<String> {
    let output = executor
        .query(&CommandSpec::new("crontab").arg("-l"))
        .await?;
    if output.success {
        Ok(output.stdout)
    } else {
        Ok(String::new())
    }
}

/// 确保给定的 cron 行存在（按 marker 去重），有新增时整表写回
pub async fn ensure_crontab_lines(executor: &Executor, entries: &[String]) -> Result<usize> {
    let existing = current_crontab(executor).await?;
    let (table, added) = merge(&existing, entries);

    if added == 0 {
        debug!("crontab already converged");
        return Ok(0);
    }

    let staged = std::env::temp_dir().join("mediastack-crontab");
    executor.write_file(&staged, &table, Some(0o600)).await?;
    executor
        .run_checked(&CommandSpec::new("crontab").arg(staged.display().to_string()))
        .await?;
    info!(added, "crontab entries registered");
    Ok(added)
}

/// 注册全部健康检查探测
pub async fn apply(executor: &Executor, config: &ProvisionConfig) -> Result<usize> {
    let entries: Vec<String> = config
        .enabled_services()
        .filter(|s| s.health_check)
        .filter_map(entry_for)
        .collect();

    ensure_crontab_lines(executor, &entries).await
}
