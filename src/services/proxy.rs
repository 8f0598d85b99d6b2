//! 反向代理配置生成
//!
//! 按目录顺序为每个有端口的启用服务生成一个 location 块；端口缺失的
//! 服务告警跳过。重复运行是完整重写：先备份旧文件再覆盖，绝不追加。

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::ProvisionConfig;
use crate::domain::{ReverseProxyRoute, ServiceDefinition};
use crate::error::Result;
use crate::infra::{CommandSpec, Executor};

/// 生成的站点配置路径
const SITE_AVAILABLE: &str = "/etc/nginx/sites-available/mediastack";
const SITE_ENABLED: &str = "/etc/nginx/sites-enabled/mediastack";

/// 从服务目录收集路由
///
/// 返回 (路由, 被跳过的服务名)。一个启用的服务至多一条路由。
pub fn collect_routes<'a>(
    services: impl Iterator<Item = &'a ServiceDefinition>,
) -> (Vec<ReverseProxyRoute>, Vec<String>) {
    let mut routes = Vec::new();
    let mut skipped = Vec::new();

    for svc in services {
        match svc.port {
            Some(port) => routes.push(ReverseProxyRoute {
                name: svc.name.clone(),
                port,
            }),
            None => skipped.push(svc.name.clone()),
        }
    }
    (routes, skipped)
}

/// 渲染完整站点文件
pub fn render_site(routes: &[ReverseProxyRoute], server_name: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str("# Generated by mediastack-provisioner; manual edits will be overwritten.\n");
    out.push_str("server {\n");
    out.push_str("    listen 80;\n");
    out.push_str("    listen [::]:80;\n");
    out.push_str(&format!(
        "    server_name {};\n",
        server_name.unwrap_or("_")
    ));
    out.push('\n');

    for route in routes {
        out.push_str(&render_location(route));
        out.push('\n');
    }

    out.push_str("}\n");
    out
}

/// 单个路由的 location 块
fn render_location(route: &ReverseProxyRoute) -> String {
    let mut out = String::new();
    out.push_str(&format!("    location /{}/ {{\n", route.name));
    out.push_str(&format!(
        "        proxy_pass http://127.0.0.1:{}/;\n",
        route.port
    ));
    out.push_str("        proxy_set_header Host $host;\n");
    out.push_str("        proxy_set_header X-Real-IP $remote_addr;\n");
    out.push_str("        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;\n");
    out.push_str("        proxy_set_header X-Forwarded-Proto $scheme;\n");
    out.push_str("        proxy_http_version 1.1;\n");
    out.push_str("        proxy_set_header Upgrade $http_upgrade;\n");
    out.push_str("        proxy_set_header Connection $http_connection;\n");
    out.push_str("    }\n");
    out
}

/// 生成并应用站点配置
pub async fn apply(executor: &Executor, config: &ProvisionConfig) -> Result<()> {
    ensure_nginx(executor).await?;

    let (routes, skipped) = collect_routes(config.enabled_services());
    for name in &skipped {
        warn!(service = %name, "no port mapping, skipping reverse proxy route");
    }
    info!(route_count = routes.len(), "generating reverse proxy config");

    let server_name = if config.tls.domain.is_empty() {
        None
    } else {
        Some(config.tls.domain.as_str())
    };
    let site = render_site(&routes, server_name);

    let available = PathBuf::from(SITE_AVAILABLE);
    executor.backup_file(&available).await?;
    executor.write_file(&available, &site, Some(0o644)).await?;

    executor
        .run_checked(&CommandSpec::new("ln").args(["-sf", SITE_AVAILABLE, SITE_ENABLED]))
        .await?;

    // 先验配置再 reload，避免把 nginx 打挂
    executor
        .run_checked(&CommandSpec::new("nginx").arg("-t"))
        .await?;
    executor
        .run_checked(&CommandSpec::new("systemctl").args(["reload", "nginx"]))
        .await?;

    Ok(())
}

/// nginx 不在位时装上
async fn ensure_nginx(executor: &Executor) -> Result<()> {
    let present = executor
        .query(&CommandSpec::new("which").arg("nginx"))
        .await?
        .success;
    if !present {
        info!("nginx not found, installing");
        executor
            .run_checked(&CommandSpec::new("apt-get").args(["install", "-y", "nginx"]))
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InstallMethod;

    fn svc(name: &str, port: Option<u16>) -> ServiceDefinition {
        ServiceDefinition {
            name: name.to_string(),
            display_name: name.to_string(),
            port,
            enabled: true,
            health_check: false,
            install: InstallMethod::NativePackage {
                package: name.to_string(),
            },
        }
    }

    #[test]
    fn test_collect_routes_skips_portless() {
        let services = vec![
            svc("jellyfin", Some(8096)),
            svc("watchtower", None),
            svc("sonarr", Some(8989)),
        ];
        let (routes, skipped) = collect_routes(services.iter());
        assert_eq!(routes.len(), 2);
        assert_eq!(skipped, vec!["watchtower".to_string()]);
    }

    #[test]
    fn test_render_exactly_one_block_per_routed_service() {
        let services = vec![svc("jellyfin", Some(8096)), svc("sonarr", Some(8989))];
        let (routes, _) = collect_routes(services.iter());
        let site = render_site(&routes, None);

        assert_eq!(site.matches("location /").count(), 2);
        assert!(site.contains("location /jellyfin/"));
        assert!(site.contains("proxy_pass http://127.0.0.1:8096/;"));
        assert!(site.contains("location /sonarr/"));
        assert!(site.contains("proxy_pass http://127.0.0.1:8989/;"));
    }

    #[test]
    fn test_render_no_block_for_unset_port() {
        let services = vec![svc("jellyfin", Some(8096)), svc("recyclarr", None)];
        let (routes, _) = collect_routes(services.iter());
        let site = render_site(&routes, None);
        assert!(!site.contains("recyclarr"));
    }

    #[test]
    fn test_render_server_name() {
        let site = render_site(&[], Some("media.example.org"));
        assert!(site.contains("server_name media.example.org;"));

        let site = render_site(&[], None);
        assert!(site.contains("server_name _;"));
    }

    #[test]
    fn test_render_proxy_headers() {
        let (routes, _) = collect_routes(vec![svc("jellyfin", Some(8096))].iter());
        let site = render_site(&routes, None);
        assert!(site.contains("proxy_set_header Host $host;"));
        assert!(site.contains("proxy_set_header X-Forwarded-For"));
        assert!(site.contains("proxy_set_header Upgrade $http_upgrade;"));
    }

    #[test]
    fn test_rerender_is_full_rewrite() {
        // identical input renders byte-identical output; repeat runs overwrite
        let (routes, _) = collect_routes(vec![svc("jellyfin", Some(8096))].iter());
        assert_eq!(render_site(&routes, None), render_site(&routes, None));
    }
}
