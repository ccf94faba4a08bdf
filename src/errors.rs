use std::fmt;

#[derive(Debug, Clone)]
pub enum LinkpulseError {
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    FileOperation(String),
    Validation(String),
    NotFound(String),
    Serialization(String),
    DateParse(String),
    InvalidDateRange(String),
    AnalyticsQuery(String),
    GeoIpLookup(String),
    Unauthorized(String),
}

impl LinkpulseError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            LinkpulseError::DatabaseConfig(_) => "E001",
            LinkpulseError::DatabaseConnection(_) => "E002",
            LinkpulseError::DatabaseOperation(_) => "E003",
            LinkpulseError::FileOperation(_) => "E004",
            LinkpulseError::Validation(_) => "E005",
            LinkpulseError::NotFound(_) => "E006",
            LinkpulseError::Serialization(_) => "E007",
            LinkpulseError::DateParse(_) => "E008",
            LinkpulseError::InvalidDateRange(_) => "E009",
            LinkpulseError::AnalyticsQuery(_) => "E010",
            LinkpulseError::GeoIpLookup(_) => "E011",
            LinkpulseError::Unauthorized(_) => "E012",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            LinkpulseError::DatabaseConfig(_) => "Database Configuration Error",
            LinkpulseError::DatabaseConnection(_) => "Database Connection Error",
            LinkpulseError::DatabaseOperation(_) => "Database Operation Error",
            LinkpulseError::FileOperation(_) => "File Operation Error",
            LinkpulseError::Validation(_) => "Validation Error",
            LinkpulseError::NotFound(_) => "Resource Not Found",
            LinkpulseError::Serialization(_) => "Serialization Error",
            LinkpulseError::DateParse(_) => "Date Parse Error",
            LinkpulseError::InvalidDateRange(_) => "Invalid Date Range",
            LinkpulseError::AnalyticsQuery(_) => "Analytics Query Error",
            LinkpulseError::GeoIpLookup(_) => "GeoIP Lookup Error",
            LinkpulseError::Unauthorized(_) => "Unauthorized",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            LinkpulseError::DatabaseConfig(msg) => msg,
            LinkpulseError::DatabaseConnection(msg) => msg,
            LinkpulseError::DatabaseOperation(msg) => msg,
            LinkpulseError::FileOperation(msg) => msg,
            LinkpulseError::Validation(msg) => msg,
            LinkpulseError::NotFound(msg) => msg,
            LinkpulseError::Serialization(msg) => msg,
            LinkpulseError::DateParse(msg) => msg,
            LinkpulseError::InvalidDateRange(msg) => msg,
            LinkpulseError::AnalyticsQuery(msg) => msg,
            LinkpulseError::GeoIpLookup(msg) => msg,
            LinkpulseError::Unauthorized(msg) => msg,
        }
    }

    /// 映射为 HTTP 状态码（用于 API 层）
    pub fn http_status(&self) -> u16 {
        match self {
            LinkpulseError::NotFound(_) => 404,
            LinkpulseError::Unauthorized(_) => 401,
            LinkpulseError::Validation(_)
            | LinkpulseError::DateParse(_)
            | LinkpulseError::InvalidDateRange(_) => 400,
            _ => 500,
        }
    }

    /// 格式化为彩色输出（用于 Server 模式）
    #[cfg(feature = "server")]
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出（用于 CLI 模式）
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for LinkpulseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 默认使用简洁格式
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for LinkpulseError {}

// 便捷的构造函数
impl LinkpulseError {
    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::DatabaseOperation(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::FileOperation(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::NotFound(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::Serialization(msg.into())
    }

    pub fn date_parse<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::DateParse(msg.into())
    }

    pub fn invalid_date_range<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::InvalidDateRange(msg.into())
    }

    pub fn analytics_query<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::AnalyticsQuery(msg.into())
    }

    pub fn geoip_lookup<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::GeoIpLookup(msg.into())
    }

    pub fn unauthorized<T: Into<String>>(msg: T) -> Self {
        LinkpulseError::Unauthorized(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for LinkpulseError {
    fn from(err: sea_orm::DbErr) -> Self {
        LinkpulseError::DatabaseOperation(err.to_string())
    }
}

impl From<std::io::Error> for LinkpulseError {
    fn from(err: std::io::Error) -> Self {
        LinkpulseError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for LinkpulseError {
    fn from(err: serde_json::Error) -> Self {
        LinkpulseError::Serialization(err.to_string())
    }
}

impl From<chrono::ParseError> for LinkpulseError {
    fn from(err: chrono::ParseError) -> Self {
        LinkpulseError::DateParse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LinkpulseError>;
