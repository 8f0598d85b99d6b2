//! 配置模块
//!
//! 环境变量解析与校验。所有配置在启动时加载进一个不可变的
//! [`ProvisionConfig`]，显式传给每个组件，组件内部不做任何隐式查找。

pub mod catalog;
pub mod env;

pub use env::{DdnsConfig, DriveSpec, LogConfig, ProvisionConfig, StorageConfig, TlsConfig};
