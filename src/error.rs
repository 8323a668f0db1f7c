use std::fmt;

/// CRM 服务的统一错误类型
#[derive(Debug)]
pub enum CrmError {
    /// 请求参数校验失败（格式错误、缺字段等）
    Validation(ValidationError),
    /// 调用方凭证缺失或无效
    Unauthorized(String),
    /// 目标记录不存在
    NotFound(String),
    /// 记录状态不允许该操作
    InvalidState(String),
    /// 唯一性冲突
    Conflict(String),
    /// 存储层错误
    Store(StoreError),
    /// 配置错误
    Config(ConfigError),
    /// IO 错误
    Io(std::io::Error),
    /// 其他错误
    Other(String),
}

/// 请求校验错误
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// 引用格式无效（不是 24 位十六进制）
    InvalidReference { field: String },
    /// 缺少必填字段
    MissingField(String),
    /// 非法的任务状态
    InvalidStatus(String),
    /// 编辑请求中没有任何可更新字段
    NoFieldsToUpdate,
    /// 字段取值无效
    InvalidValue { field: String, message: String },
}

/// 文档存储错误
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// 读写底层文件失败
    IoError(String),
    /// 文档序列化/反序列化失败
    SerializationError(String),
    /// 插入时主键已存在
    DuplicateKey { collection: String, id: String },
    /// 乐观锁版本不一致
    VersionConflict {
        collection: String,
        id: String,
        expected: u64,
        actual: u64,
    },
    /// 要替换的文档不存在
    Missing { collection: String, id: String },
    /// 后端不可用
    Unavailable(String),
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),
    /// 配置解析失败
    ParseFailed(String),
    /// 配置值无效
    InvalidValue { field: String, message: String },
}

impl fmt::Display for CrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrmError::Validation(e) => write!(f, "{}", e),
            CrmError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            CrmError::NotFound(msg) => write!(f, "{}", msg),
            CrmError::InvalidState(msg) => write!(f, "{}", msg),
            CrmError::Conflict(msg) => write!(f, "{}", msg),
            CrmError::Store(e) => write!(f, "Store Error: {}", e),
            CrmError::Config(e) => write!(f, "Config Error: {}", e),
            CrmError::Io(e) => write!(f, "IO Error: {}", e),
            CrmError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidReference { field } => write!(f, "Invalid {} format.", field),
            ValidationError::MissingField(field) => write!(f, "{} is required.", field),
            ValidationError::InvalidStatus(status) => write!(
                f,
                "Invalid status '{}'. Must be 'pending', 'in_progress', or 'completed'.",
                status
            ),
            ValidationError::NoFieldsToUpdate => write!(f, "No fields provided to update."),
            ValidationError::InvalidValue { field, message } => {
                write!(f, "Invalid value for '{}': {}", field, message)
            }
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::IoError(msg) => write!(f, "IO error: {}", msg),
            StoreError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            StoreError::DuplicateKey { collection, id } => {
                write!(f, "Document '{}' already exists in '{}'", id, collection)
            }
            StoreError::VersionConflict {
                collection,
                id,
                expected,
                actual,
            } => write!(
                f,
                "Document '{}' in '{}' was modified concurrently (expected version {}, found {})",
                id, collection, expected, actual
            ),
            StoreError::Missing { collection, id } => {
                write!(f, "Document '{}' not found in '{}'", id, collection)
            }
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseFailed(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, message } => {
                write!(f, "Invalid config value for '{}': {}", field, message)
            }
        }
    }
}

impl std::error::Error for CrmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CrmError::Io(e) => Some(e),
            CrmError::Store(e) => Some(e),
            CrmError::Validation(e) => Some(e),
            CrmError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ValidationError {}
impl std::error::Error for StoreError {}
impl std::error::Error for ConfigError {}

// From 转换实现
impl From<std::io::Error> for CrmError {
    fn from(err: std::io::Error) -> Self {
        CrmError::Io(err)
    }
}

impl From<serde_json::Error> for CrmError {
    fn from(err: serde_json::Error) -> Self {
        CrmError::Store(StoreError::SerializationError(err.to_string()))
    }
}

impl From<serde_yaml::Error> for CrmError {
    fn from(err: serde_yaml::Error) -> Self {
        CrmError::Config(ConfigError::ParseFailed(err.to_string()))
    }
}

impl From<ValidationError> for CrmError {
    fn from(err: ValidationError) -> Self {
        CrmError::Validation(err)
    }
}

impl From<StoreError> for CrmError {
    fn from(err: StoreError) -> Self {
        // 版本冲突 → Conflict（409），其余 → Store（500）
        match err {
            StoreError::VersionConflict { .. } => CrmError::Conflict(err.to_string()),
            other => CrmError::Store(other),
        }
    }
}

impl From<ConfigError> for CrmError {
    fn from(err: ConfigError) -> Self {
        CrmError::Config(err)
    }
}

// 便捷的 Result 类型别名
pub type Result<T> = std::result::Result<T, CrmError>;
