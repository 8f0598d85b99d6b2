//! 领域模型

pub mod service;
pub mod stage;

pub use service::{
    ArchiveSpec, ContainerSpec, CpuArch, InstallMethod, ReverseProxyRoute, ServiceDefinition,
    ServiceState,
};
pub use stage::{ProvisionStage, StageStatus};
