//! 服务相关领域模型
//!
//! The catalog entry is the single source of truth for one third-party
//! service: its port, whether it is enabled, whether it gets a cron health
//! probe, and how it is installed. Port resolution is an explicit field
//! lookup on this record, never a constructed variable name.

use std::path::PathBuf;

use serde::Serialize;

/// CPU 架构（dpkg 命名），映射到上游 release 的下载参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuArch {
    X64,
    Arm,
    Arm64,
}

impl CpuArch {
    /// 解析 `dpkg --print-architecture` 的输出
    ///
    /// Anything outside the supported set returns `None`; the caller treats
    /// that as a fatal, pre-download error.
    pub fn from_dpkg(raw: &str) -> Option<Self> {
        match raw.trim() {
            "amd64" => Some(CpuArch::X64),
            "armhf" => Some(CpuArch::Arm),
            "arm64" => Some(CpuArch::Arm64),
            _ => None,
        }
    }

    /// 上游 release 下载 URL 中使用的架构参数
    pub fn release_param(&self) -> &'static str {
        match self {
            CpuArch::X64 => "x64",
            CpuArch::Arm => "arm",
            CpuArch::Arm64 => "arm64",
        }
    }
}

/// 安装方式
#[derive(Debug, Clone)]
pub enum InstallMethod {
    /// 发行版软件包（apt）
    NativePackage { package: String },
    /// 上游 release 压缩包 + systemd unit
    ReleaseArchive(ArchiveSpec),
    /// 容器（compose 文件 + docker compose up）
    Container(ContainerSpec),
}

/// Release 压缩包安装描述
#[derive(Debug, Clone)]
pub struct ArchiveSpec {
    /// 下载 URL 模板，`{arch}` 占位符由 [`CpuArch::release_param`] 填充
    pub url_template: String,
    /// 解压目标目录
    pub install_dir: PathBuf,
    /// systemd unit 的 ExecStart 命令行
    pub exec_start: String,
    /// unit Description 字段
    pub description: String,
    /// 可选的 SHA-256 校验和（十六进制）
    pub sha256: Option<String>,
    /// 批处理工具走 cron 调度（`Some(schedule)` 时不生成 systemd unit，
    /// `exec_start` 作为 cron 命令行注册）
    pub cron_schedule: Option<String>,
}

impl ArchiveSpec {
    /// 解析出某个架构的实际下载 URL
    pub fn resolve_url(&self, arch: CpuArch) -> String {
        self.url_template.replace("{arch}", arch.release_param())
    }
}

/// 容器安装描述
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: String,
    pub container_name: String,
    /// (host, container) 端口映射
    pub ports: Vec<(u16, u16)>,
    pub environment: Vec<(String, String)>,
    /// (host path, container path) 卷映射
    pub volumes: Vec<(String, String)>,
    /// 额外的 compose 顶层键值（如 `network_mode`）
    pub extra_lines: Vec<String>,
}

/// 服务定义
///
/// 在配置阶段构建一次，整个 provisioning 过程只读。
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    /// 短名（unit/容器/路由名的基础）
    pub name: String,
    /// 展示名
    pub display_name: String,
    /// Web UI 端口；无端口的服务不产生反代路由和健康检查
    pub port: Option<u16>,
    pub enabled: bool,
    pub health_check: bool,
    pub install: InstallMethod,
}

impl ServiceDefinition {
    /// systemd unit 文件名
    pub fn unit_name(&self) -> String {
        format!("{}.service", self.name)
    }

    /// 健康检查失败时的重启命令行
    pub fn restart_command(&self) -> String {
        match &self.install {
            InstallMethod::Container(spec) => format!("docker restart {}", spec.container_name),
            _ => format!("systemctl restart {}", self.unit_name()),
        }
    }

    /// 是否以容器方式运行
    pub fn is_container(&self) -> bool {
        matches!(self.install, InstallMethod::Container(_))
    }
}

/// 每个服务在一次运行中的收敛状态
///
/// `NotInstalled → Installed → Enabled → Active`；重复运行时已 Active 的
/// 服务停留在 Active（幂等）。单个服务任一步失败只阻断该服务的后续步骤。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    NotInstalled,
    Installed,
    Enabled,
    Active,
}

/// 反向代理路由：服务名 + 后端端口
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseProxyRoute {
    pub name: String,
    pub port: u16,
}
