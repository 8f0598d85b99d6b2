//! 统一错误处理
//!
//! 整个 provisioner 共用的错误类型，分类对齐运行阶段：
//! 预检 / 配置 / 下载 / 归档 / 外部命令 / 挂载 / 操作员中止。

use thiserror::Error;

/// 便捷类型别名
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Provisioning 错误类型
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// 预检失败（权限、发行版、CPU 架构、缺少工具）
    #[error("Preflight check failed: {0}")]
    Preflight(String),

    /// 配置缺失或非法，在任何变更动作之前报告
    #[error("Configuration error: {0}")]
    Config(String),

    /// 下载失败
    #[error("Download failed for {url}: {reason}")]
    Download { url: String, reason: String },

    /// 归档类型或校验和不符
    #[error("Archive verification failed: {0}")]
    Archive(String),

    /// 外部命令返回非零
    #[error("Command `{command}` failed: {reason}")]
    Command { command: String, reason: String },

    /// 挂载 / 存储池失败
    #[error("Mount failed: {0}")]
    Mount(String),

    /// 操作员未通过破坏性操作确认
    #[error("Aborted by operator: {0}")]
    Aborted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProvisionError {
    /// 创建命令错误
    pub fn command(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// 创建下载错误
    pub fn download(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Download {
            url: url.into(),
            reason: reason.into(),
        }
    }
}
