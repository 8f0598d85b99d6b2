//! 服务目录
//!
//! The full stack, one explicit entry per service. Defaults below mirror the
//! upstream projects' stock ports; every service takes
//! `MEDIASTACK_<NAME>_ENABLED` / `_PORT` / `_HEALTHCHECK` overrides, resolved
//! field by field here rather than by constructing variable names at runtime.

use std::path::{Path, PathBuf};

use crate::config::env::{env_flag, env_port};
use crate::domain::{ArchiveSpec, ContainerSpec, InstallMethod, ServiceDefinition};

/// 构建完整服务目录（目录顺序即安装顺序）
pub fn build(data_root: &Path) -> Vec<ServiceDefinition> {
    vec![
        jellyfin(),
        tdarr(data_root),
        sonarr(data_root),
        radarr(data_root),
        prowlarr(data_root),
        jellyseerr(data_root),
        flaresolverr(),
        watchtower(),
        netdata(),
        recyclarr(data_root),
    ]
}

fn jellyfin() -> ServiceDefinition {
    ServiceDefinition {
        name: "jellyfin".to_string(),
        display_name: "Jellyfin".to_string(),
        port: env_port("JELLYFIN_PORT").or(Some(8096)),
        enabled: env_flag("JELLYFIN_ENABLED", true),
        health_check: env_flag("JELLYFIN_HEALTHCHECK", true),
        install: InstallMethod::NativePackage {
            package: "jellyfin".to_string(),
        },
    }
}

fn tdarr(data_root: &Path) -> ServiceDefinition {
    let install_dir = PathBuf::from("/opt/tdarr");
    ServiceDefinition {
        name: "tdarr".to_string(),
        display_name: "Tdarr".to_string(),
        port: env_port("TDARR_PORT").or(Some(8265)),
        enabled: env_flag("TDARR_ENABLED", true),
        health_check: env_flag("TDARR_HEALTHCHECK", true),
        install: InstallMethod::ReleaseArchive(ArchiveSpec {
            url_template:
                "https://storage.tdarr.io/versions/latest/linux_{arch}/Tdarr_Server.tar.gz"
                    .to_string(),
            exec_start: format!(
                "{}/Tdarr_Server/Tdarr_Server -data {}",
                install_dir.display(),
                data_root.join("tdarr").display()
            ),
            install_dir,
            description: "Tdarr transcoding server".to_string(),
            sha256: None,
            cron_schedule: None,
        }),
    }
}

fn sonarr(data_root: &Path) -> ServiceDefinition {
    let install_dir = PathBuf::from("/opt/sonarr");
    ServiceDefinition {
        name: "sonarr".to_string(),
        display_name: "Sonarr".to_string(),
        port: env_port("SONARR_PORT").or(Some(8989)),
        enabled: env_flag("SONARR_ENABLED", true),
        health_check: env_flag("SONARR_HEALTHCHECK", true),
        install: InstallMethod::ReleaseArchive(ArchiveSpec {
            url_template:
                "https://services.sonarr.tv/v1/download/main/latest?version=4&os=linux&arch={arch}"
                    .to_string(),
            exec_start: format!(
                "{}/Sonarr/Sonarr -nobrowser -data={}",
                install_dir.display(),
                data_root.join("sonarr").display()
            ),
            install_dir,
            description: "Sonarr TV series manager".to_string(),
            sha256: None,
            cron_schedule: None,
        }),
    }
}

fn radarr(data_root: &Path) -> ServiceDefinition {
    let install_dir = PathBuf::from("/opt/radarr");
    ServiceDefinition {
        name: "radarr".to_string(),
        display_name: "Radarr".to_string(),
        port: env_port("RADARR_PORT").or(Some(7878)),
        enabled: env_flag("RADARR_ENABLED", true),
        health_check: env_flag("RADARR_HEALTHCHECK", true),
        install: InstallMethod::ReleaseArchive(ArchiveSpec {
            url_template:
                "https://radarr.servarr.com/v1/update/master/updatefile?os=linux&runtime=netcore&arch={arch}"
                    .to_string(),
            exec_start: format!(
                "{}/Radarr/Radarr -nobrowser -data={}",
                install_dir.display(),
                data_root.join("radarr").display()
            ),
            install_dir,
            description: "Radarr movie manager".to_string(),
            sha256: None,
            cron_schedule: None,
        }),
    }
}

fn prowlarr(data_root: &Path) -> ServiceDefinition {
    let install_dir = PathBuf::from("/opt/prowlarr");
    ServiceDefinition {
        name: "prowlarr".to_string(),
        display_name: "Prowlarr".to_string(),
        port: env_port("PROWLARR_PORT").or(Some(9696)),
        enabled: env_flag("PROWLARR_ENABLED", true),
        health_check: env_flag("PROWLARR_HEALTHCHECK", true),
        install: InstallMethod::ReleaseArchive(ArchiveSpec {
            url_template:
                "https://prowlarr.servarr.com/v1/update/master/updatefile?os=linux&runtime=netcore&arch={arch}"
                    .to_string(),
            exec_start: format!(
                "{}/Prowlarr/Prowlarr -nobrowser -data={}",
                install_dir.display(),
                data_root.join("prowlarr").display()
            ),
            install_dir,
            description: "Prowlarr indexer manager".to_string(),
            sha256: None,
            cron_schedule: None,
        }),
    }
}

fn jellyseerr(data_root: &Path) -> ServiceDefinition {
    let port = env_port("JELLYSEERR_PORT").unwrap_or(5055);
    ServiceDefinition {
        name: "jellyseerr".to_string(),
        display_name: "Jellyseerr".to_string(),
        port: Some(port),
        enabled: env_flag("JELLYSEERR_ENABLED", true),
        health_check: env_flag("JELLYSEERR_HEALTHCHECK", true),
        install: InstallMethod::Container(ContainerSpec {
            image: "fallenbagel/jellyseerr:latest".to_string(),
            container_name: "jellyseerr".to_string(),
            ports: vec![(port, 5055)],
            environment: vec![("TZ".to_string(), "Etc/UTC".to_string())],
            volumes: vec![(
                data_root.join("jellyseerr").display().to_string(),
                "/app/config".to_string(),
            )],
            extra_lines: vec![],
        }),
    }
}

fn flaresolverr() -> ServiceDefinition {
    let port = env_port("FLARESOLVERR_PORT").unwrap_or(8191);
    ServiceDefinition {
        name: "flaresolverr".to_string(),
        display_name: "FlareSolverr".to_string(),
        port: Some(port),
        enabled: env_flag("FLARESOLVERR_ENABLED", true),
        // proxy helper, no meaningful web UI to probe
        health_check: env_flag("FLARESOLVERR_HEALTHCHECK", false),
        install: InstallMethod::Container(ContainerSpec {
            image: "ghcr.io/flaresolverr/flaresolverr:latest".to_string(),
            container_name: "flaresolverr".to_string(),
            ports: vec![(port, 8191)],
            environment: vec![("LOG_LEVEL".to_string(), "info".to_string())],
            volumes: vec![],
            extra_lines: vec![],
        }),
    }
}

fn watchtower() -> ServiceDefinition {
    ServiceDefinition {
        name: "watchtower".to_string(),
        display_name: "Watchtower".to_string(),
        port: None,
        enabled: env_flag("WATCHTOWER_ENABLED", true),
        health_check: false,
        install: InstallMethod::Container(ContainerSpec {
            image: "containrrr/watchtower:latest".to_string(),
            container_name: "watchtower".to_string(),
            ports: vec![],
            environment: vec![
                ("WATCHTOWER_CLEANUP".to_string(), "true".to_string()),
                ("WATCHTOWER_SCHEDULE".to_string(), "0 0 4 * * *".to_string()),
            ],
            volumes: vec![(
                "/var/run/docker.sock".to_string(),
                "/var/run/docker.sock".to_string(),
            )],
            extra_lines: vec![],
        }),
    }
}

fn netdata() -> ServiceDefinition {
    ServiceDefinition {
        name: "netdata".to_string(),
        display_name: "NetData".to_string(),
        port: env_port("NETDATA_PORT").or(Some(19999)),
        enabled: env_flag("NETDATA_ENABLED", true),
        health_check: env_flag("NETDATA_HEALTHCHECK", false),
        install: InstallMethod::NativePackage {
            package: "netdata".to_string(),
        },
    }
}

fn recyclarr(data_root: &Path) -> ServiceDefinition {
    let install_dir = PathBuf::from("/opt/recyclarr");
    ServiceDefinition {
        name: "recyclarr".to_string(),
        display_name: "Recyclarr".to_string(),
        // batch tool driven by its own schedule, no listening port
        port: None,
        enabled: env_flag("RECYCLARR_ENABLED", true),
        health_check: false,
        install: InstallMethod::ReleaseArchive(ArchiveSpec {
            url_template:
                "https://github.com/recyclarr/recyclarr/releases/latest/download/recyclarr-linux-{arch}.tar.gz"
                    .to_string(),
            exec_start: format!(
                "{}/recyclarr sync --app-data {}",
                install_dir.display(),
                data_root.join("recyclarr").display()
            ),
            install_dir,
            description: "Recyclarr TRaSH guide sync".to_string(),
            sha256: None,
            cron_schedule: Some("0 5 * * *".to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_shape() {
        let services = build(Path::new("/srv/mediastack"));
        assert_eq!(services.len(), 10);

        let names: Vec<&str> = services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "jellyfin",
                "tdarr",
                "sonarr",
                "radarr",
                "prowlarr",
                "jellyseerr",
                "flaresolverr",
                "watchtower",
                "netdata",
                "recyclarr"
            ]
        );
    }

    #[test]
    fn test_default_ports() {
        let services = build(Path::new("/srv/mediastack"));
        let port_of = |name: &str| services.iter().find(|s| s.name == name).unwrap().port;

        assert_eq!(port_of("jellyfin"), Some(8096));
        assert_eq!(port_of("sonarr"), Some(8989));
        assert_eq!(port_of("radarr"), Some(7878));
        assert_eq!(port_of("prowlarr"), Some(9696));
        assert_eq!(port_of("jellyseerr"), Some(5055));
        assert_eq!(port_of("netdata"), Some(19999));
        // no route, no health probe for these
        assert_eq!(port_of("watchtower"), None);
        assert_eq!(port_of("recyclarr"), None);
    }

    #[test]
    fn test_archive_urls_carry_arch_placeholder() {
        let services = build(Path::new("/srv/mediastack"));
        for svc in &services {
            if let InstallMethod::ReleaseArchive(spec) = &svc.install {
                assert!(
                    spec.url_template.contains("{arch}"),
                    "{} url lacks arch placeholder",
                    svc.name
                );
            }
        }
    }

    #[test]
    fn test_data_root_flows_into_specs() {
        let services = build(Path::new("/custom/root"));
        let sonarr = services.iter().find(|s| s.name == "sonarr").unwrap();
        if let InstallMethod::ReleaseArchive(spec) = &sonarr.install {
            assert!(spec.exec_start.contains("/custom/root/sonarr"));
        } else {
            panic!("sonarr should be a release archive install");
        }

        let jellyseerr = services.iter().find(|s| s.name == "jellyseerr").unwrap();
        if let InstallMethod::Container(spec) = &jellyseerr.install {
            assert_eq!(spec.volumes[0].0, "/custom/root/jellyseerr");
        } else {
            panic!("jellyseerr should be a container install");
        }
    }
}
