//! 环境变量配置加载
//!
//! 变量统一使用 `MEDIASTACK_` 前缀。必填项缺失是致命错误，并且在任何
//! 变更动作之前一次性报告全部缺失项。

use std::env;
use std::path::PathBuf;

use crate::config::catalog;
use crate::domain::ServiceDefinition;
use crate::error::{ProvisionError, Result};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "MEDIASTACK_";

/// 完整 provisioning 配置
#[derive(Clone, Debug)]
pub struct ProvisionConfig {
    /// 服务运行用户
    pub user: String,
    /// 服务运行用户组
    pub group: String,
    /// 服务数据根目录（各服务的配置/库目录在其下）
    pub data_root: PathBuf,
    /// 存储池配置
    pub storage: StorageConfig,
    /// TLS / certbot 配置
    pub tls: TlsConfig,
    /// DDNS (ddclient) 配置
    pub ddns: DdnsConfig,
    /// 日志与轮转配置
    pub log: LogConfig,
    /// 服务目录（顺序即安装与反代路由顺序）
    pub services: Vec<ServiceDefinition>,
}

/// 存储池配置
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// 待格式化/挂载的 `设备:挂载点` 列表；为空则整个存储阶段跳过
    pub drives: Vec<DriveSpec>,
    /// mergerfs 池挂载点
    pub pool_mount: PathBuf,
}

impl StorageConfig {
    pub fn enabled(&self) -> bool {
        !self.drives.is_empty()
    }
}

/// 单块数据盘
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriveSpec {
    /// 设备路径，如 `/dev/sdb`
    pub device: String,
    /// 挂载点，如 `/mnt/disk1`
    pub mount_point: PathBuf,
}

impl DriveSpec {
    /// 解析 `MEDIASTACK_DRIVES` 的一项（`/dev/sdb:/mnt/disk1`）
    pub fn parse(raw: &str) -> Option<Self> {
        let (device, mount) = raw.split_once(':')?;
        let device = device.trim();
        let mount = mount.trim();
        if device.is_empty() || mount.is_empty() {
            return None;
        }
        Some(Self {
            device: device.to_string(),
            mount_point: PathBuf::from(mount),
        })
    }
}

/// TLS 配置
#[derive(Clone, Debug)]
pub struct TlsConfig {
    pub enabled: bool,
    pub domain: String,
    pub certbot_email: String,
}

/// DDNS 配置
#[derive(Clone, Debug)]
pub struct DdnsConfig {
    pub enabled: bool,
    pub protocol: String,
    pub login: String,
    pub password: String,
    pub zone: String,
}

/// 日志与轮转配置
#[derive(Clone, Debug)]
pub struct LogConfig {
    /// provisioner 自身日志目录
    pub dir: PathBuf,
    /// docker daemon json-file 驱动单文件上限（如 "10m"）
    pub docker_max_size: String,
    /// docker daemon json-file 驱动文件数上限
    pub docker_max_file: u32,
    /// 自身日志 logrotate 保留天数
    pub keep_days: u32,
}

impl ProvisionConfig {
    /// 从环境变量加载配置
    ///
    /// 只加载，不校验；[`ProvisionConfig::validate`] 负责必填项检查。
    pub fn from_env() -> Self {
        let user = env_string("USER_NAME").unwrap_or_default();
        let group = env_string("GROUP_NAME").unwrap_or_else(|| user.clone());
        let data_root = PathBuf::from(env_string("DATA_ROOT").unwrap_or_default());

        let drives = env_string("DRIVES")
            .map(|raw| {
                raw.split(',')
                    .filter(|s| !s.trim().is_empty())
                    .filter_map(DriveSpec::parse)
                    .collect()
            })
            .unwrap_or_default();

        let storage = StorageConfig {
            drives,
            pool_mount: PathBuf::from(env_string("POOL_MOUNT").unwrap_or_default()),
        };

        let tls = TlsConfig {
            enabled: env_flag("TLS_ENABLED", false),
            domain: env_string("DOMAIN").unwrap_or_default(),
            certbot_email: env_string("CERTBOT_EMAIL").unwrap_or_default(),
        };

        let ddns = DdnsConfig {
            enabled: env_flag("DDNS_ENABLED", false),
            protocol: env_string("DDNS_PROTOCOL").unwrap_or_else(|| "cloudflare".to_string()),
            login: env_string("DDNS_LOGIN").unwrap_or_default(),
            password: env_string("DDNS_PASSWORD").unwrap_or_default(),
            zone: env_string("DDNS_ZONE").unwrap_or_default(),
        };

        let log = LogConfig {
            dir: PathBuf::from(
                env_string("LOG_DIR").unwrap_or_else(|| "/var/log/mediastack".to_string()),
            ),
            docker_max_size: env_string("DOCKER_LOG_MAX_SIZE").unwrap_or_else(|| "10m".to_string()),
            docker_max_file: env_string("DOCKER_LOG_MAX_FILE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            keep_days: env_string("LOG_KEEP_DAYS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(14),
        };

        let services = catalog::build(&data_root);

        Self {
            user,
            group,
            data_root,
            storage,
            tls,
            ddns,
            log,
            services,
        }
    }

    /// 校验必填项，一次性报告所有缺失的变量
    pub fn validate(&self) -> Result<()> {
        let mut missing: Vec<String> = Vec::new();
        let mut require = |ok: bool, key: &str| {
            if !ok {
                missing.push(format!("{}{}", ENV_PREFIX, key));
            }
        };

        require(!self.user.is_empty(), "USER_NAME");
        require(!self.group.is_empty(), "GROUP_NAME");
        require(self.data_root.as_os_str().len() > 0, "DATA_ROOT");

        if self.storage.enabled() {
            require(self.storage.pool_mount.as_os_str().len() > 0, "POOL_MOUNT");
        }

        if self.tls.enabled {
            require(!self.tls.domain.is_empty(), "DOMAIN");
            require(!self.tls.certbot_email.is_empty(), "CERTBOT_EMAIL");
        }

        if self.ddns.enabled {
            require(!self.ddns.protocol.is_empty(), "DDNS_PROTOCOL");
            require(!self.ddns.login.is_empty(), "DDNS_LOGIN");
            require(!self.ddns.password.is_empty(), "DDNS_PASSWORD");
            require(!self.ddns.zone.is_empty(), "DDNS_ZONE");
        }

        if !missing.is_empty() {
            return Err(ProvisionError::Config(format!(
                "missing required configuration: {}",
                missing.join(", ")
            )));
        }

        // 端口冲突也在任何动作之前拦下
        let mut seen: Vec<(u16, &str)> = Vec::new();
        for svc in self.services.iter().filter(|s| s.enabled) {
            if let Some(port) = svc.port {
                if let Some((_, other)) = seen.iter().find(|(p, _)| *p == port) {
                    return Err(ProvisionError::Config(format!(
                        "port {} assigned to both {} and {}",
                        port, other, svc.name
                    )));
                }
                seen.push((port, &svc.name));
            }
        }

        Ok(())
    }

    /// 启用的服务（保持目录顺序）
    pub fn enabled_services(&self) -> impl Iterator<Item = &ServiceDefinition> {
        self.services.iter().filter(|s| s.enabled)
    }

    /// provisioner 运行日志文件路径
    pub fn run_log_path(&self) -> PathBuf {
        self.log.dir.join("provision.log")
    }
}

/// 读取带前缀的环境变量，空串视为未设置
pub(crate) fn env_string(key: &str) -> Option<String> {
    env::var(format!("{}{}", ENV_PREFIX, key))
        .ok()
        .filter(|s| !s.trim().is_empty())
}

/// 读取布尔开关（"1"/"true"/"yes" 为真）
pub(crate) fn env_flag(key: &str, default: bool) -> bool {
    match env_string(key) {
        Some(v) => {
            v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes")
        }
        None => default,
    }
}

/// 读取端口覆盖
pub(crate) fn env_port(key: &str) -> Option<u16> {
    env_string(key).and_then(|v| v.parse().ok())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn minimal_config() -> ProvisionConfig {
        ProvisionConfig {
            user: "media".to_string(),
            group: "media".to_string(),
            data_root: PathBuf::from("/srv/mediastack"),
            storage: StorageConfig {
                drives: vec![],
                pool_mount: PathBuf::new(),
            },
            tls: TlsConfig {
                enabled: false,
                domain: String::new(),
                certbot_email: String::new(),
            },
            ddns: DdnsConfig {
                enabled: false,
                protocol: "cloudflare".to_string(),
                login: String::new(),
                password: String::new(),
                zone: String::new(),
            },
            log: LogConfig {
                dir: PathBuf::from("/var/log/mediastack"),
                docker_max_size: "10m".to_string(),
                docker_max_file: 3,
                keep_days: 14,
            },
            services: catalog::build(&PathBuf::from("/srv/mediastack")),
        }
    }

    #[test]
    fn test_validate_minimal_ok() {
        assert!(minimal_config().validate().is_ok());
    }

    #[test]
    fn test_validate_reports_all_missing_keys() {
        let mut config = minimal_config();
        config.user = String::new();
        config.group = String::new();
        config.data_root = PathBuf::new();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("MEDIASTACK_USER_NAME"));
        assert!(err.contains("MEDIASTACK_GROUP_NAME"));
        assert!(err.contains("MEDIASTACK_DATA_ROOT"));
    }

    #[test]
    fn test_validate_conditional_requirements() {
        let mut config = minimal_config();
        config.tls.enabled = true;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("MEDIASTACK_DOMAIN"));
        assert!(err.contains("MEDIASTACK_CERTBOT_EMAIL"));

        let mut config = minimal_config();
        config.ddns.enabled = true;
        config.ddns.login = "user".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("MEDIASTACK_DDNS_PASSWORD"));
        assert!(err.contains("MEDIASTACK_DDNS_ZONE"));
        assert!(!err.contains("MEDIASTACK_DDNS_LOGIN"));
    }

    #[test]
    fn test_validate_pool_mount_required_only_with_drives() {
        // no drives: storage stage is skipped, pool mount may stay unset
        assert!(minimal_config().validate().is_ok());

        let mut config = minimal_config();
        config.storage.drives = vec![DriveSpec {
            device: "/dev/sdb".to_string(),
            mount_point: PathBuf::from("/mnt/disk1"),
        }];
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("MEDIASTACK_POOL_MOUNT"));
    }

    #[test]
    fn test_validate_rejects_port_conflict() {
        let mut config = minimal_config();
        // force two enabled services onto the same port
        let mut ports = config
            .services
            .iter_mut()
            .filter(|s| s.enabled && s.port.is_some());
        ports.next().unwrap().port = Some(8989);
        ports.next().unwrap().port = Some(8989);

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("8989"));
    }

    #[test]
    fn test_drive_spec_parse() {
        assert_eq!(
            DriveSpec::parse("/dev/sdb:/mnt/disk1"),
            Some(DriveSpec {
                device: "/dev/sdb".to_string(),
                mount_point: PathBuf::from("/mnt/disk1"),
            })
        );
        assert_eq!(DriveSpec::parse("/dev/sdb"), None);
        assert_eq!(DriveSpec::parse(":/mnt/disk1"), None);
        assert_eq!(DriveSpec::parse("/dev/sdb:"), None);
    }

    #[test]
    fn test_env_helpers() {
        // unique names to avoid cross-test interference
        env::set_var("MEDIASTACK_TEST_STR_A", "value");
        assert_eq!(env_string("TEST_STR_A"), Some("value".to_string()));
        env::set_var("MEDIASTACK_TEST_STR_A", "  ");
        assert_eq!(env_string("TEST_STR_A"), None);

        env::set_var("MEDIASTACK_TEST_FLAG_B", "yes");
        assert!(env_flag("TEST_FLAG_B", false));
        env::set_var("MEDIASTACK_TEST_FLAG_B", "0");
        assert!(!env_flag("TEST_FLAG_B", true));
        assert!(env_flag("TEST_FLAG_MISSING", true));

        env::set_var("MEDIASTACK_TEST_PORT_C", "8096");
        assert_eq!(env_port("TEST_PORT_C"), Some(8096));
        env::set_var("MEDIASTACK_TEST_PORT_C", "not-a-port");
        assert_eq!(env_port("TEST_PORT_C"), None);
    }
}
