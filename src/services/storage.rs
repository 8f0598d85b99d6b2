//! 磁盘池搭建
//!
//! 对每个 device:mountpoint:已挂载的跳过;未挂载的要过两道确认
//! (yes/no + 字面量 FORMAT)才允许分区格式化。fstab 按设备子串去重,
//! 最后用 mergerfs 把所有挂载点合成一个池。确认从注入的 reader 读,
//! 方便测试。

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::{DriveSpec, ProvisionConfig};
use crate::error::{ProvisionError, Result};
use crate::infra::{CommandSpec, Executor};

const FSTAB: &str = "/etc/fstab";
/// 格式化确认口令,必须整行精确匹配
const FORMAT_TOKEN: &str = "FORMAT";

/// 两道确认
///
/// 第一道 yes/no,第二道要求输入 `FORMAT` 原文。任何偏差都中止整次
/// 运行,磁盘不动。
pub fn confirm_destruction(
    reader: &mut impl BufRead,
    writer: &mut impl Write,
    device: &str,
) -> Result<()> {
    write!(
        writer,
        "About to partition and format {device}. ALL DATA WILL BE LOST. Continue? [yes/no] "
    )?;
    writer.flush()?;
    let mut answer = String::new();
    reader.read_line(&mut answer)?;
    if answer.trim() != "yes" {
        return Err(ProvisionError::Aborted(format!(
            "format of {device} declined"
        )));
    }

    write!(writer, "Type {FORMAT_TOKEN} to confirm: ")?;
    writer.flush()?;
    let mut token = String::new();
    reader.read_line(&mut token)?;
    if token.trim_end_matches(['\r', '\n']) != FORMAT_TOKEN {
        return Err(ProvisionError::Aborted(format!(
            "confirmation token for {device} did not match"
        )));
    }
    Ok(())
}

/// 设备的首个分区节点
///
/// /dev/sdb → /dev/sdb1,/dev/nvme0n1 → /dev/nvme0n1p1。
pub fn partition_node(device: &str) -> String {
    if device.chars().last().is_some_and(|c| c.is_ascii_digit()) {
        format!("{device}p1")
    } else {
        format!("{device}1")
    }
}

/// device 或其分区是否已出现在挂载表里
pub fn is_mounted(proc_mounts: &str, drive: &DriveSpec) -> bool {
    let mount = drive.mount_point.display().to_string();
    proc_mounts.lines().any(|line| {
        let mut fields = line.split_whitespace();
        let dev = fields.next().unwrap_or("");
        let target = fields.next().unwrap_or("");
        dev == drive.device || dev == partition_node(&drive.device) || target == mount
    })
}

/// fstab 去重合并,marker 是任意子串(设备节点或挂载点)
pub fn merge_fstab(existing: &str, line: &str, marker: &str) -> Option<String> {
    if existing.lines().any(|l| l.contains(marker)) {
        return None;
    }
    let mut out = existing.to_string();
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(line);
    out.push('\n');
    Some(out)
}

/// mergerfs 池的 fstab 行
pub fn pool_fstab_line(drives: &[DriveSpec], pool_mount: &Path) -> String {
    let branches: Vec<String> = drives
        .iter()
        .map(|d| d.mount_point.display().to_string())
        .collect();
    format!(
        "{} {} fuse.mergerfs defaults,allow_other,use_ino,cache.files=partial,dropcacheonclose=true,category.create=mfs 0 0",
        branches.join(":"),
        pool_mount.display()
    )
}

/// 挂载类命令失败归入 Mount 错误,区别于一般外部命令失败
async fn run_mount(executor: &Executor, spec: CommandSpec) -> Result<()> {
    executor
        .run_checked(&spec)
        .await
        .map(|_| ())
        .map_err(|e| ProvisionError::Mount(e.to_string()))
}

async fn mount_all(executor: &Executor) -> Result<()> {
    run_mount(executor, CommandSpec::new("mount").arg("-a")).await
}

async fn ensure_fstab_line(executor: &Executor, line: &str, marker: &str) -> Result<bool> {
    let existing = std::fs::read_to_string(FSTAB).unwrap_or_default();
    match merge_fstab(&existing, line, marker) {
        Some(merged) => {
            executor.backup_file(&PathBuf::from(FSTAB)).await?;
            executor
                .write_file(&PathBuf::from(FSTAB), &merged, Some(0o644))
                .await?;
            Ok(true)
        }
        None => {
            info!(marker = %marker, "fstab entry already present");
            Ok(false)
        }
    }
}

async fn format_drive(
    executor: &Executor,
    reader: &mut impl BufRead,
    writer: &mut impl Write,
    drive: &DriveSpec,
) -> Result<()> {
    confirm_destruction(reader, writer, &drive.device)?;

    let device = drive.device.as_str();
    executor
        .run_checked(&CommandSpec::new("parted").args(["-s", device, "mklabel", "gpt"]))
        .await?;
    executor
        .run_checked(&CommandSpec::new("parted").args([
            "-s", device, "mkpart", "primary", "ext4", "0%", "100%",
        ]))
        .await?;
    let partition = partition_node(device);
    executor
        .run_checked(&CommandSpec::new("mkfs.ext4").args(["-F", &partition]))
        .await?;

    let mount = drive.mount_point.display().to_string();
    executor
        .run_checked(&CommandSpec::new("mkdir").args(["-p", &mount]))
        .await?;
    let line = format!("{partition} {mount} ext4 defaults,noatime 0 2");
    ensure_fstab_line(executor, &line, &partition).await?;
    Ok(())
}

/// 搭好所有盘和池,无盘配置时直接返回
pub async fn apply(
    executor: &Executor,
    config: &ProvisionConfig,
    reader: &mut impl BufRead,
    writer: &mut impl Write,
) -> Result<()> {
    let drives = &config.storage.drives;
    if drives.is_empty() {
        info!("no drives configured, skipping storage pool setup");
        return Ok(());
    }

    let proc_mounts = std::fs::read_to_string("/proc/mounts").unwrap_or_default();
    for drive in drives {
        if is_mounted(&proc_mounts, drive) {
            info!(device = %drive.device, "already mounted, skipping");
            continue;
        }
        warn!(device = %drive.device, "not mounted, formatting requires confirmation");
        format_drive(executor, reader, writer, drive).await?;
    }
    mount_all(executor).await?;

    // mergerfs 池
    executor
        .run_checked(&CommandSpec::new("apt-get").args(["install", "-y", "mergerfs"]))
        .await?;
    let pool = &config.storage.pool_mount;
    let pool_display = pool.display().to_string();
    executor
        .run_checked(&CommandSpec::new("mkdir").args(["-p", &pool_display]))
        .await?;
    let changed = ensure_fstab_line(
        executor,
        &pool_fstab_line(drives, pool),
        &pool_display,
    )
    .await?;
    if changed {
        mount_all(executor).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn drive(device: &str, mount: &str) -> DriveSpec {
        DriveSpec {
            device: device.to_string(),
            mount_point: PathBuf::from(mount),
        }
    }

    #[test]
    fn test_confirm_accepts_yes_then_token() {
        let mut input = Cursor::new(b"yes\nFORMAT\n".to_vec());
        let mut output = Vec::new();
        assert!(confirm_destruction(&mut input, &mut output, "/dev/sdb").is_ok());
        let prompt = String::from_utf8(output).unwrap();
        assert!(prompt.contains("ALL DATA WILL BE LOST"));
    }

    #[test]
    fn test_confirm_aborts_on_no() {
        let mut input = Cursor::new(b"no\n".to_vec());
        let err = confirm_destruction(&mut input, &mut Vec::new(), "/dev/sdb").unwrap_err();
        assert!(matches!(err, ProvisionError::Aborted(_)));
    }

    #[test]
    fn test_confirm_token_is_case_sensitive() {
        let mut input = Cursor::new(b"yes\nformat\n".to_vec());
        let err = confirm_destruction(&mut input, &mut Vec::new(), "/dev/sdb").unwrap_err();
        assert!(matches!(err, ProvisionError::Aborted(_)));
    }

    #[test]
    fn test_partition_node() {
        assert_eq!(partition_node("/dev/sdb"), "/dev/sdb1");
        assert_eq!(partition_node("/dev/nvme0n1"), "/dev/nvme0n1p1");
    }

    #[test]
    fn test_is_mounted_by_device_partition_or_target() {
        let mounts = "/dev/sdb1 /mnt/disk1 ext4 rw 0 0\n/dev/sda2 / ext4 rw 0 0\n";
        assert!(is_mounted(mounts, &drive("/dev/sdb", "/mnt/disk1")));
        assert!(is_mounted(mounts, &drive("/dev/sdc", "/mnt/disk1")));
        assert!(!is_mounted(mounts, &drive("/dev/sdc", "/mnt/disk2")));
    }

    #[test]
    fn test_merge_fstab_dedupes_on_marker() {
        let existing = "UUID=abc / ext4 defaults 0 1\n/dev/sdb1 /mnt/disk1 ext4 defaults 0 2\n";
        assert!(merge_fstab(existing, "/dev/sdb1 /mnt/disk1 ext4 defaults,noatime 0 2", "/dev/sdb1").is_none());

        let merged = merge_fstab(existing, "/dev/sdc1 /mnt/disk2 ext4 defaults,noatime 0 2", "/dev/sdc1")
            .unwrap();
        assert!(merged.starts_with(existing));
        assert!(merged.ends_with("/dev/sdc1 /mnt/disk2 ext4 defaults,noatime 0 2\n"));
    }

    #[test]
    fn test_pool_fstab_line_joins_branches() {
        let drives = vec![drive("/dev/sdb", "/mnt/disk1"), drive("/dev/sdc", "/mnt/disk2")];
        let line = pool_fstab_line(&drives, Path::new("/srv/pool"));
        assert!(line.starts_with("/mnt/disk1:/mnt/disk2 /srv/pool fuse.mergerfs "));
        assert!(line.ends_with(" 0 0"));
    }

    #[tokio::test]
    async fn test_mount_failure_maps_to_mount_error() {
        let executor = Executor::new(false);
        let err = run_mount(
            &executor,
            CommandSpec::new("/nonexistent/mediastack-mount").arg("-a"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProvisionError::Mount(_)));
    }

    #[tokio::test]
    async fn test_dry_run_mount_records_command() {
        let executor = Executor::new(true);
        mount_all(&executor).await.unwrap();
        assert_eq!(
            executor.recorded(),
            vec![crate::infra::PlannedAction::Command("mount -a".to_string())]
        );
    }

    #[tokio::test]
    async fn test_dry_run_declined_confirmation_mutates_nothing() {
        let executor = Executor::new(true);
        let drive = drive("/dev/mediastack-missing", "/mnt/mediastack-test");
        let mut input = Cursor::new(b"no\n".to_vec());
        let err = format_drive(&executor, &mut input, &mut Vec::new(), &drive)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Aborted(_)));
        assert!(executor.recorded().is_empty());
    }
}
