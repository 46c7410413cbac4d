use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::core::types::MarketType;

/// 期货合约后缀，按顺序尝试，命中第一个即停止
const FUTURES_SUFFIXES: [&str; 5] = ["PERP", "PERPETUAL", "USD", "USDT", "SWAP"];

/// 计价币后缀，按顺序尝试，命中第一个即停止
const QUOTE_SUFFIXES: [&str; 4] = ["USDT", "USDC", "BUSD", "BTC"];

/// 将交易所原始符号归一化为跨交易所可比较的基础资产键
///
/// 转大写、去掉非字母字符，期货先去掉合约后缀，再去掉计价币后缀。
/// 例如现货 `BTCUSDT` 和期货 `BTC-USDT-PERP` 都会归一化为 `BTC`。
pub fn normalize_symbol(raw: &str, market_type: MarketType) -> String {
    let mut symbol: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if market_type == MarketType::Futures {
        strip_first_suffix(&mut symbol, &FUTURES_SUFFIXES);
    }
    strip_first_suffix(&mut symbol, &QUOTE_SUFFIXES);

    symbol
}

// 后缀等于整个符号时不剥离，避免 `USDC` 这类符号被削成空串
fn strip_first_suffix(symbol: &mut String, suffixes: &[&str]) {
    if let Some(suffix) = suffixes.iter().find(|s| symbol.ends_with(*s)) {
        if symbol.len() > suffix.len() {
            symbol.truncate(symbol.len() - suffix.len());
        }
    }
}

/// 计算价差百分比 `(sell_ask - buy_bid) / buy_bid * 100`
pub fn calculate_spread_percent(buy_bid: f64, sell_ask: f64) -> f64 {
    if buy_bid <= 0.0 {
        return 0.0;
    }
    (sell_ask - buy_bid) / buy_bid * 100.0
}

/// 交易所返回的价格可能是字符串也可能是数字
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// serde 辅助：字符串或数字形式的价格
pub fn de_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_number(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected a number, got {}", value)))
}

/// serde 辅助：可选的数量字段，无法解析时视为缺失
pub fn de_opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_number))
}
