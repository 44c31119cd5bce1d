use std::env;

/// A fixed administrator login. Administrators never expire.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminCredential {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Automatic backup settings
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Enable snapshots, manual and scheduled (default: true)
    pub enabled: bool,

    /// Hours between automatic snapshots (default: 24)
    pub interval_hours: u64,

    /// Maximum number of snapshots kept in history (default: 10)
    pub max_backups: usize,

    /// Capture the file identity list (default: true)
    pub include_files: bool,

    /// Capture account records (default: true)
    pub include_user_data: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: 24,
            max_backups: 10,
            include_files: true,
            include_user_data: true,
        }
    }
}

/// Which key-value backend holds the portal state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Disk,
}

/// Portal configuration
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Key-value backend (default: disk)
    pub storage_backend: StorageBackend,

    /// Directory for the disk backend (default: "./data")
    pub data_dir: String,

    /// Listen address (default: "127.0.0.1:3000")
    pub bind_addr: String,

    /// Administrator logins, read from ADMIN_USERNAME_n / ADMIN_PASSWORD_n
    pub admin_credentials: Vec<AdminCredential>,

    /// Session lifetime in seconds (default: 3600)
    pub session_timeout_secs: u64,

    /// Session token signing key
    pub jwt_secret: String,

    /// Maximum size of a single upload in bytes (default: 50 MB)
    pub max_file_size: usize,

    /// Allowed file extensions, lowercase without dot
    pub allowed_file_types: Vec<String>,

    /// Allowed MIME types
    pub allowed_mime_types: Vec<String>,

    /// Quota assigned when the creator does not supply one (default: 50 MB)
    pub default_quota_mb: f64,

    /// Upper bound for any account quota (default: 500 MB)
    pub max_quota_mb: f64,

    /// Expiry assigned when the creator does not supply one (default: 24 h)
    pub default_expiry_hours: i64,

    /// Upper bound for account expiry (default: 720 h)
    pub max_expiry_hours: i64,

    pub backup: BackupConfig,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::Disk,
            data_dir: "./data".to_string(),
            bind_addr: "127.0.0.1:3000".to_string(),
            admin_credentials: Vec::new(),
            session_timeout_secs: 3600,
            jwt_secret: "secret".to_string(),
            max_file_size: 50 * 1024 * 1024, // 50 MB
            allowed_file_types: ["pdf", "doc", "docx", "xls", "xlsx", "jpg", "jpeg", "png"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allowed_mime_types: [
                "application/pdf",
                "application/msword",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                "application/vnd.ms-excel",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                "image/jpeg",
                "image/jpg",
                "image/png",
                "text/plain",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            default_quota_mb: 50.0,
            max_quota_mb: 500.0,
            default_expiry_hours: 24,
            max_expiry_hours: 720,
            backup: BackupConfig::default(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl PortalConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            storage_backend: match env::var("STORAGE_BACKEND")
                .map(|v| v.to_lowercase())
                .as_deref()
            {
                Ok("memory") => StorageBackend::Memory,
                _ => default.storage_backend,
            },

            data_dir: env::var("DATA_DIR").unwrap_or(default.data_dir),

            bind_addr: env::var("BIND_ADDR").unwrap_or(default.bind_addr),

            admin_credentials: admin_credentials_from_env(),

            session_timeout_secs: env::var("SESSION_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.session_timeout_secs),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| parse_size(&v))
                .unwrap_or(default.max_file_size),

            allowed_file_types: env::var("ALLOWED_FILE_TYPES")
                .ok()
                .map(|v| split_list(&v))
                .unwrap_or(default.allowed_file_types),

            allowed_mime_types: env::var("ALLOWED_MIME_TYPES")
                .ok()
                .map(|v| split_list(&v))
                .unwrap_or(default.allowed_mime_types),

            default_quota_mb: env::var("DEFAULT_QUOTA_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.default_quota_mb),

            max_quota_mb: env::var("MAX_QUOTA_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_quota_mb),

            default_expiry_hours: env::var("DEFAULT_EXPIRY_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.default_expiry_hours),

            max_expiry_hours: env::var("MAX_EXPIRY_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_expiry_hours),

            backup: BackupConfig {
                enabled: env::var("BACKUP_ENABLED")
                    .map(|v| v.to_lowercase() != "false" && v != "0")
                    .unwrap_or(default.backup.enabled),
                interval_hours: env::var("BACKUP_INTERVAL_HOURS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.backup.interval_hours),
                max_backups: env::var("MAX_BACKUPS")
                    .ok()
                    .and_then(|v| parse_max_backups(&v))
                    .unwrap_or(default.backup.max_backups),
                include_files: env::var("BACKUP_INCLUDE_FILES")
                    .map(|v| v.to_lowercase() != "false" && v != "0")
                    .unwrap_or(default.backup.include_files),
                include_user_data: env::var("BACKUP_INCLUDE_USER_DATA")
                    .map(|v| v.to_lowercase() != "false" && v != "0")
                    .unwrap_or(default.backup.include_user_data),
            },

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| split_list(&v))
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development and tests (in-memory state, one known admin)
    pub fn development() -> Self {
        Self {
            storage_backend: StorageBackend::Memory,
            admin_credentials: vec![AdminCredential {
                username: Some("admin".to_string()),
                password: Some("admin".to_string()),
            }],
            allowed_file_types: ["pdf", "txt", "jpg", "jpeg", "png", "bin"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allowed_mime_types: [
                "application/pdf",
                "text/plain",
                "image/jpeg",
                "image/png",
                "application/octet-stream",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            ..Self::default()
        }
    }
}

/// Reads ADMIN_USERNAME_1 / ADMIN_PASSWORD_1, ADMIN_USERNAME_2 / ... until both
/// variables of an index are missing. Slot 1 is always present, possibly empty.
fn admin_credentials_from_env() -> Vec<AdminCredential> {
    let mut credentials = Vec::new();
    for n in 1.. {
        let username = env::var(format!("ADMIN_USERNAME_{n}")).ok();
        let password = env::var(format!("ADMIN_PASSWORD_{n}")).ok();
        if username.is_none() && password.is_none() && n > 1 {
            break;
        }
        credentials.push(AdminCredential { username, password });
    }
    credentials
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Accepts plain bytes ("1048576") or megabytes with a suffix ("50MB").
fn parse_size(value: &str) -> Option<usize> {
    let value = value.trim();
    match value.to_uppercase().strip_suffix("MB") {
        Some(mb) => mb
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|mb| mb.checked_mul(1024 * 1024)),
        None => value.parse().ok(),
    }
}

/// The history must hold at least the newest snapshot.
fn parse_max_backups(value: &str) -> Option<usize> {
    value.trim().parse::<usize>().ok().filter(|n| *n >= 1)
}
