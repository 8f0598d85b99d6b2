//! Release 产物下载与校验
//!
//! 下载上游 release 压缩包，验证归档类型（gzip 魔数）与可选的 SHA-256
//! 校验和，然后解压到安装目录。下载或校验失败对该服务的安装是致命的。

use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{ProvisionError, Result};

/// GZIP 魔数：1F 8B
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// 下载产物到内存
pub async fn fetch(url: &str) -> Result<Vec<u8>> {
    let response = reqwest::get(url).await?;

    if !response.status().is_success() {
        return Err(ProvisionError::download(
            url,
            format!("status {}", response.status()),
        ));
    }

    let bytes = response.bytes().await?;
    info!(url = %url, size = bytes.len(), "artifact downloaded");
    Ok(bytes.to_vec())
}

/// 验证产物是 gzip 压缩包
///
/// 上游偶尔用 HTML 错误页回应 200，这里用魔数而不是 Content-Type 判断。
pub fn verify_gzip(bytes: &[u8]) -> Result<()> {
    if bytes.len() < 2 || bytes[..2] != GZIP_MAGIC {
        return Err(ProvisionError::Archive(
            "artifact is not a gzip archive (bad magic bytes)".to_string(),
        ));
    }
    Ok(())
}

/// 验证 SHA-256 校验和
pub fn verify_sha256(bytes: &[u8], expected: &str) -> Result<()> {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let actual = format!("{:x}", hasher.finalize());

    if actual != expected.to_lowercase() {
        return Err(ProvisionError::Archive(format!(
            "checksum mismatch: expected {}, got {}",
            expected, actual
        )));
    }
    Ok(())
}

/// 解压 tar.gz 到目标目录
pub fn extract_tar_gz(bytes: &[u8], dest: &Path) -> Result<()> {
    let decoder = flate2::read::GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);
    archive
        .unpack(dest)
        .map_err(|e| ProvisionError::Archive(format!("extraction failed: {}", e)))?;
    info!(dest = %dest.display(), "archive extracted");
    Ok(())
}
