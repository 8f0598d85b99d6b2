//! Mediastack Provisioner - 家庭媒体服务器一键部署
//!
//! Usage:
//! - Normal mode: `mediastack-provisioner`
//! - Preview mode: `mediastack-provisioner --dry-run`
//! - Verbose logging: `mediastack-provisioner --debug`

use mediastack_provisioner::{RuntimeConfig, EXIT_USAGE};

/// 解析命令行参数
///
/// --help/--debug/--dry-run 互斥;未知参数或组合走 usage 并以 2 退出。
fn parse_args() -> RuntimeConfig {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config = RuntimeConfig::default();
    let mut help = false;

    for arg in &args {
        match arg.as_str() {
            "--help" | "-h" => help = true,
            "--debug" => config.debug = true,
            "--dry-run" => config.dry_run = true,
            other => {
                eprintln!("unknown argument: {other}");
                print_usage(&mut std::io::stderr());
                std::process::exit(EXIT_USAGE);
            }
        }
    }

    let chosen = usize::from(help) + usize::from(config.debug) + usize::from(config.dry_run);
    if chosen > 1 {
        eprintln!("--help, --debug and --dry-run cannot be combined");
        print_usage(&mut std::io::stderr());
        std::process::exit(EXIT_USAGE);
    }
    if help {
        print_usage(&mut std::io::stdout());
        std::process::exit(0);
    }

    config
}

fn print_usage(out: &mut impl std::io::Write) {
    let _ = writeln!(out, "Mediastack Provisioner - 家庭媒体服务器一键部署");
    let _ = writeln!(out);
    let _ = writeln!(out, "USAGE:");
    let _ = writeln!(out, "    mediastack-provisioner [OPTION]");
    let _ = writeln!(out);
    let _ = writeln!(out, "OPTIONS:");
    let _ = writeln!(out, "    --dry-run        Log every action without mutating the system");
    let _ = writeln!(out, "    --debug          Verbose logging");
    let _ = writeln!(out, "    -h, --help       Print help information");
    let _ = writeln!(out);
    let _ = writeln!(out, "CONFIGURATION:");
    let _ = writeln!(out, "    All settings come from MEDIASTACK_* environment variables,");
    let _ = writeln!(out, "    e.g. MEDIASTACK_USER_NAME, MEDIASTACK_DATA_ROOT, MEDIASTACK_DRIVES.");
}

fn main() {
    let config = parse_args();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create runtime: {e}");
            std::process::exit(mediastack_provisioner::EXIT_FAILURE);
        }
    };
    let code = rt.block_on(mediastack_provisioner::init_and_run(config));
    std::process::exit(code);
}
