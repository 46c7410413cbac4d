use thiserror::Error;

/// 扫描流程中的错误类型
#[derive(Debug, Error)]
pub enum ScanError {
    /// 请求中没有任何可用的交易所
    #[error("No active exchanges selected")]
    NoActiveExchanges,

    /// 不支持的交易所标识
    #[error("Unsupported exchange: {0}")]
    UnknownExchange(String),

    /// 请求参数不合法（投资额、价差区间等）
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Bad status {status} for {exchange}")]
    HttpStatus { exchange: String, status: u16 },

    #[error("Request to {exchange} timed out")]
    Timeout { exchange: String },

    #[error("Request to {exchange} failed: {source}")]
    Request {
        exchange: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Malformed JSON from {exchange}: {source}")]
    Decode {
        exchange: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ScanError {
    /// 网络层面的错误可以重试，请求校验错误不可以
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ScanError::HttpStatus { .. }
                | ScanError::Timeout { .. }
                | ScanError::Request { .. }
                | ScanError::Decode { .. }
        )
    }

    pub(crate) fn from_reqwest(exchange: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            ScanError::Timeout {
                exchange: exchange.to_string(),
            }
        } else {
            ScanError::Request {
                exchange: exchange.to_string(),
                source,
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let status = ScanError::HttpStatus {
            exchange: "binance".to_string(),
            status: 503,
        };
        assert!(status.is_transient());
        assert!(ScanError::Timeout { exchange: "okx".to_string() }.is_transient());
        assert!(!ScanError::NoActiveExchanges.is_transient());
        assert!(!ScanError::UnknownExchange("ftx".to_string()).is_transient());
        assert_eq!(status.to_string(), "Bad status 503 for binance");
    }
}
