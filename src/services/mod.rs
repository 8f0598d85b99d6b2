//! 服务层模块
//!
//! provisioning 各阶段的实现。

pub mod compose;
pub mod ddns;
pub mod healthcheck;
pub mod installer;
pub mod logrotate;
pub mod menu;
pub mod proxy;
pub mod storage;
pub mod systemd;
pub mod tls;
