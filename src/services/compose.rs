//! Docker Compose 文件生成与执行
//!
//! 每个容器服务一个独立 compose 文件，由 [`ContainerSpec`] 的类型化字段
//! 渲染；重复运行覆盖写入（内容不变则跳过）。

use std::path::{Path, PathBuf};

use crate::domain::ContainerSpec;
use crate::error::Result;
use crate::infra::{CommandSpec, Executor};

/// compose 文件路径：`<data_root>/compose/<name>/docker-compose.yml`
pub fn compose_path(data_root: &Path, name: &str) -> PathBuf {
    data_root.join("compose").join(name).join("docker-compose.yml")
}

/// 渲染 compose 文件
pub fn render(spec: &ContainerSpec) -> String {
    let mut out = String::new();
    out.push_str("services:\n");
    out.push_str(&format!("  {}:\n", spec.container_name));
    out.push_str(&format!("    image: {}\n", spec.image));
    out.push_str(&format!("    container_name: {}\n", spec.container_name));
    out.push_str("    restart: unless-stopped\n");

    if !spec.ports.is_empty() {
        out.push_str("    ports:\n");
        for (host, container) in &spec.ports {
            out.push_str(&format!("      - \"{}:{}\"\n", host, container));
        }
    }

    if !spec.environment.is_empty() {
        out.push_str("    environment:\n");
        for (key, value) in &spec.environment {
            out.push_str(&format!("      - {}={}\n", key, value));
        }
    }

    if !spec.volumes.is_empty() {
        out.push_str("    volumes:\n");
        for (host, container) in &spec.volumes {
            out.push_str(&format!("      - {}:{}\n", host, container));
        }
    }

    for line in &spec.extra_lines {
        out.push_str(&format!("    {}\n", line));
    }

    out
}

/// 检测 compose 命令（优先独立的 docker-compose，回退 docker compose）
pub async fn detect_compose_command(executor: &Executor) -> (&'static str, Vec<&'static str>) {
    let check = executor
        .query(&CommandSpec::new("which").arg("docker-compose"))
        .await;

    if check.map(|o| o.success).unwrap_or(false) {
        ("docker-compose", vec![])
    } else {
        ("docker", vec!["compose"])
    }
}

/// `docker compose -f <file> up -d`
pub async fn compose_up(executor: &Executor, compose_file: &Path) -> Result<()> {
    let (program, base_args) = detect_compose_command(executor).await;
    let spec = CommandSpec::new(program)
        .args(base_args)
        .args(["-f", &compose_file.display().to_string(), "up", "-d"]);
    executor.run_checked(&spec).await?;
    Ok(())
}

/// 容器是否在运行（`docker ps` 输出中出现）
pub async fn container_running(executor: &Executor, container_name: &str) -> Result<bool> {
    let output = executor
        .query(&CommandSpec::new("docker").args(["ps", "--format", "{{.Names}}"]))
        .await?;
    Ok(output.stdout.lines().any(|l| l.trim() == container_name))
}
