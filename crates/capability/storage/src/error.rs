//! 存储层错误类型
//!
//! 定义统一的存储错误类型，用于封装底层错误：
//! - HTTP 请求错误（InfluxDB 不可达、超时）
//! - InfluxDB 返回的非 2xx 状态
//! - 查询结果 CSV 解析错误
//! - 写缓冲拒绝（已满 / 已关闭）
//!
//! 默认视为可重试；服务端明确拒绝的数据（非 429 的 4xx）为永久错误，
//! 写缓冲不会重发。

#[derive(Debug)]
pub struct StorageError {
    message: String,
    retryable: bool,
}

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// 重发也不会成功的错误（如数据被服务端拒绝）。
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StorageError {}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<csv::Error> for StorageError {
    fn from(err: csv::Error) -> Self {
        Self::new(format!("invalid query result: {err}"))
    }
}
