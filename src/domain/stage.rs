//! Provisioning 阶段追踪
//!
//! 每个阶段（预检、存储、每个服务、反代……）记录开始/结束时间与结果，
//! 运行结束后打印汇总。

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 阶段状态
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

/// 单个 provisioning 阶段
#[derive(Clone, Debug, Serialize)]
pub struct ProvisionStage {
    /// 阶段标识 (e.g., "preflight", "install_sonarr", "reverse_proxy")
    pub name: String,
    /// 显示名称 (e.g., "Preflight", "Install Sonarr")
    pub display_name: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub status: StageStatus,
    /// 附加信息（失败原因、跳过原因）
    pub message: Option<String>,
}

impl ProvisionStage {
    /// 创建新的待执行阶段
    pub fn new(name: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            started_at: None,
            finished_at: None,
            duration_ms: None,
            status: StageStatus::Pending,
            message: None,
        }
    }

    /// 开始执行阶段
    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
        self.status = StageStatus::Running;
    }

    /// 完成阶段
    pub fn finish(&mut self, success: bool, message: Option<String>) {
        let now = Utc::now();
        self.finished_at = Some(now);
        self.status = if success {
            StageStatus::Success
        } else {
            StageStatus::Failed
        };
        self.message = message;
        if let Some(started) = self.started_at {
            self.duration_ms = Some((now - started).num_milliseconds());
        }
    }

    /// 跳过阶段
    pub fn skip(&mut self, reason: Option<String>) {
        self.status = StageStatus::Skipped;
        self.message = reason;
    }

    /// 汇总输出用的状态图标
    pub fn icon(&self) -> &'static str {
        match self.status {
            StageStatus::Success => "✓",
            StageStatus::Failed => "✗",
            StageStatus::Skipped => "⊘",
            StageStatus::Running => "⟳",
            StageStatus::Pending => "○",
        }
    }
}
