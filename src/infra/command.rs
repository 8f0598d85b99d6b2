//! 命令执行器
//!
//! 提供统一的命令执行接口。所有变更型动作（外部命令、生成文件写入）都必须
//! 经过这里的 [`Executor`]：正常模式下真正执行，dry-run 模式下只记录并打印
//! 等价的命令行。命令永远以 program + 参数列表的形式描述，不构造 shell
//! 字符串再解析。
//!
//! 只读探测（`systemctl list-units`、`docker ps`、`crontab -l`）走
//! [`Executor::query`]，在 dry-run 下照常执行 —— 幂等检查依赖它们的输出。

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{ProvisionError, Result};

/// 类型化的命令描述：程序 + 参数列表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// 日志与 dry-run 记录使用的展示形式
    pub fn display_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// 命令执行结果
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// dry-run 下变更型命令的占位结果
    fn simulated() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// 被执行（或 dry-run 下被记录）的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    /// 外部命令行
    Command(String),
    /// 生成文件写入
    FileWrite { path: PathBuf, bytes: usize },
    /// 已有文件备份
    FileBackup { path: PathBuf },
}

/// 统一执行门
pub struct Executor {
    dry_run: bool,
    recorded: Mutex<Vec<PlannedAction>>,
}

impl Executor {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn record(&self, action: PlannedAction) {
        self.recorded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(action);
    }

    /// 本次运行记录下的所有变更动作（测试与汇总用）
    pub fn recorded(&self) -> Vec<PlannedAction> {
        self.recorded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 执行变更型命令
    ///
    /// dry-run 模式下只记录命令行并返回模拟成功。
    pub async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let line = spec.display_line();
        self.record(PlannedAction::Command(line.clone()));

        if self.dry_run {
            info!(command = %line, "[dry-run] would execute");
            return Ok(CommandOutput::simulated());
        }

        debug!(command = %line, "executing");
        Self::spawn(spec).await
    }

    /// 执行变更型命令，非零退出视为错误
    pub async fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let output = self.run(spec).await?;
        if !output.success {
            let reason = if output.stderr.trim().is_empty() {
                format!("exit code {:?}", output.exit_code)
            } else {
                output.stderr.trim().to_string()
            };
            return Err(ProvisionError::command(spec.display_line(), reason));
        }
        Ok(output)
    }

    /// 执行只读探测命令（dry-run 下也真正执行）
    pub async fn query(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!(command = %spec.display_line(), "querying");
        Self::spawn(spec).await
    }

    async fn spawn(spec: &CommandSpec) -> Result<CommandOutput> {
        let output = Command::new(&spec.program)
            .args(&spec.args)
            .output()
            .await
            .map_err(|e| {
                ProvisionError::command(spec.display_line(), format!("failed to spawn: {}", e))
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// 写生成文件，内容未变化时跳过
    ///
    /// 返回是否发生（或将发生）写入。dry-run 模式下只记录目标路径。
    pub async fn write_file(
        &self,
        path: &Path,
        contents: &str,
        mode: Option<u32>,
    ) -> Result<bool> {
        match tokio::fs::read_to_string(path).await {
            Ok(existing) if existing == contents => {
                debug!(path = %path.display(), "file content unchanged, skipping write");
                return Ok(false);
            }
            _ => {}
        }

        self.record(PlannedAction::FileWrite {
            path: path.to_path_buf(),
            bytes: contents.len(),
        });

        if self.dry_run {
            info!(
                path = %path.display(),
                bytes = contents.len(),
                "[dry-run] would write file"
            );
            return Ok(true);
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;

        #[cfg(unix)]
        if let Some(mode) = mode {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
        }
        #[cfg(not(unix))]
        let _ = mode;

        info!(path = %path.display(), bytes = contents.len(), "file written");
        Ok(true)
    }

    /// 备份已有文件为 `<path>.bak-<timestamp>`
    ///
    /// 文件不存在时为 no-op。覆盖式重写（反代配置、ddclient.conf）前调用，
    /// 重复运行得到完整重写而不是追加累积。
    pub async fn backup_file(&self, path: &Path) -> Result<Option<PathBuf>> {
        if !path.exists() {
            return Ok(None);
        }

        let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
        let backup = PathBuf::from(format!("{}.bak-{}", path.display(), stamp));

        self.record(PlannedAction::FileBackup {
            path: path.to_path_buf(),
        });

        if self.dry_run {
            info!(
                path = %path.display(),
                backup = %backup.display(),
                "[dry-run] would back up file"
            );
            return Ok(Some(backup));
        }

        if let Err(e) = tokio::fs::copy(path, &backup).await {
            warn!(path = %path.display(), error = %e, "failed to back up file, overwriting anyway");
            return Ok(None);
        }
        info!(path = %path.display(), backup = %backup.display(), "backed up prior file");
        Ok(Some(backup))
    }
}
