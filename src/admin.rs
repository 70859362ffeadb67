//! Password gate for the admin sidebar and the log export it unlocks.
//!
//! Both the configured secret and the typed input are reduced to SHA-256 hex
//! digests and compared in constant time, so a deployment can store only the
//! digest (`ADMIN_PASSWORD_SHA256`).

use sha2::{Digest, Sha256};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use subtle::ConstantTimeEq;
use time::macros::format_description;
use time::{Date, format_description::FormatItem};

pub const VERIFIED_NOTICE: &str = "✅ 已验证";
pub const REJECTED_NOTICE: &str = "❌ 密码错误";
pub const NO_LOG_NOTICE: &str = "暂无数据记录";

const EXPORT_DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year][month][day]");

fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Clone, PartialEq, Eq)]
pub enum AdminSecret {
    Plain(String),
    /// Lowercase hex SHA-256 digest of the password.
    Sha256(String),
}

impl AdminSecret {
    pub fn from_sha256_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().to_ascii_lowercase();
        if hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(Self::Sha256(hex))
        } else {
            None
        }
    }

    fn digest(&self) -> String {
        match self {
            AdminSecret::Plain(password) => hash_password(password),
            AdminSecret::Sha256(hex) => hex.clone(),
        }
    }
}

impl fmt::Debug for AdminSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminSecret::Plain(_) => f.write_str("AdminSecret::Plain(<redacted>)"),
            AdminSecret::Sha256(_) => f.write_str("AdminSecret::Sha256(<redacted>)"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdminCheck {
    /// Nothing typed yet; show neither success nor rejection.
    Idle,
    Granted,
    Rejected,
}

pub struct AdminGate {
    digest: String,
}

impl AdminGate {
    pub fn new(secret: &AdminSecret) -> Self {
        Self {
            digest: secret.digest(),
        }
    }

    pub fn check(&self, input: &str) -> AdminCheck {
        if input.is_empty() {
            return AdminCheck::Idle;
        }
        let candidate = hash_password(input);
        if bool::from(candidate.as_bytes().ct_eq(self.digest.as_bytes())) {
            AdminCheck::Granted
        } else {
            AdminCheck::Rejected
        }
    }
}

/// Snapshot of the turn log handed to an authenticated admin.
#[derive(Clone, Debug, PartialEq)]
pub struct LogExport {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub row_count: usize,
}

impl LogExport {
    pub fn new(date: Date, bytes: Vec<u8>, row_count: usize) -> Self {
        Self {
            file_name: export_file_name(date),
            bytes,
            row_count,
        }
    }

    pub fn row_count_label(&self) -> String {
        format!("当前累计数据：{} 条", self.row_count)
    }

    /// Writes the export into `dir`, creating it if needed.
    pub fn save_to(&self, dir: &Path) -> io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

pub fn export_file_name(date: Date) -> String {
    let stamp = date
        .format(EXPORT_DATE_FORMAT)
        .unwrap_or_else(|_| "latest".to_string());
    format!("health_logs_{stamp}.csv")
}

/// What the admin sidebar renders after a password check.
#[derive(Clone, Debug, PartialEq)]
pub enum AdminPanel {
    Idle,
    Rejected,
    /// `export` is `None` while no turn has been logged yet.
    Granted { export: Option<LogExport> },
}
