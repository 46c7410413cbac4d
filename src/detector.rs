use chrono::Utc;
use log::debug;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::FeeSchedule;
use crate::core::types::{AnalysisTypes, ArbitrageOpportunity, Quote, SymbolQuoteSet};
use crate::utils::calculate_spread_percent;

/// 计入手续费的套利检测器
///
/// 对每个符号枚举所有 (买, 卖) 有序报价对，只保留启用的市场组合、
/// 价差在区间内且扣除手续费后利润为正的组合。
pub struct OpportunityDetector {
    fees: HashMap<String, FeeSchedule>,
    analysis: AnalysisTypes,
}

impl OpportunityDetector {
    pub fn new(fees: HashMap<String, FeeSchedule>, analysis: AnalysisTypes) -> Self {
        Self { fees, analysis }
    }

    pub fn detect(
        &self,
        quotes: &SymbolQuoteSet,
        min_spread_percent: f64,
        max_spread_percent: f64,
        investment: f64,
    ) -> Vec<ArbitrageOpportunity> {
        let mut opportunities = Vec::new();

        for (symbol, symbol_quotes) in quotes {
            if symbol_quotes.len() < 2 {
                continue;
            }

            for buy in symbol_quotes {
                for sell in symbol_quotes {
                    if buy.exchange == sell.exchange {
                        continue;
                    }
                    if let Some(opportunity) = self.evaluate_pair(
                        symbol,
                        buy,
                        sell,
                        min_spread_percent,
                        max_spread_percent,
                        investment,
                    ) {
                        opportunities.push(opportunity);
                    }
                }
            }
        }

        sort_opportunities(&mut opportunities);
        opportunities
    }

    fn evaluate_pair(
        &self,
        symbol: &str,
        buy: &Quote,
        sell: &Quote,
        min_spread_percent: f64,
        max_spread_percent: f64,
        investment: f64,
    ) -> Option<ArbitrageOpportunity> {
        if buy.bid >= sell.ask || !self.analysis.allows(buy.market_type, sell.market_type) {
            return None;
        }

        let spread_percent = calculate_spread_percent(buy.bid, sell.ask);
        if spread_percent < min_spread_percent || spread_percent > max_spread_percent {
            return None;
        }

        let buy_fee_percent = self.fee_for(&buy.exchange, buy)?;
        let sell_fee_percent = self.fee_for(&sell.exchange, sell)?;

        let coins = investment / buy.bid;
        let revenue = coins * sell.ask;
        let fee = investment * buy_fee_percent / 100.0 + revenue * sell_fee_percent / 100.0;
        let profit = revenue - investment - fee;

        if profit <= 0.0 {
            debug!(
                "{}: {} -> {} spread {:.3}% eaten by fees ({:.4})",
                symbol, buy.exchange, sell.exchange, spread_percent, fee
            );
            return None;
        }

        Some(ArbitrageOpportunity {
            symbol: symbol.to_string(),
            buy_exchange: buy.exchange.clone(),
            buy_market_type: buy.market_type,
            buy_price: buy.bid,
            sell_exchange: sell.exchange.clone(),
            sell_market_type: sell.market_type,
            sell_price: sell.ask,
            spread_percent,
            profit_amount: profit,
            investment,
            buy_fee_percent,
            sell_fee_percent,
            buy_volume: buy.bid_volume,
            sell_volume: sell.ask_volume,
            timestamp: Utc::now(),
        })
    }

    // 缺少费率配置的交易所不参与计算，不用默认值代替
    fn fee_for(&self, exchange: &str, quote: &Quote) -> Option<f64> {
        match self.fees.get(exchange) {
            Some(schedule) => Some(schedule.for_market(quote.market_type)),
            None => {
                debug!("{}: no fee schedule, skipping pair", exchange);
                None
            }
        }
    }
}

/// 价差降序，价差相同按利润降序，其余保持检测顺序
pub fn sort_opportunities(opportunities: &mut [ArbitrageOpportunity]) {
    opportunities.sort_by(|a, b| {
        b.spread_percent
            .partial_cmp(&a.spread_percent)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                b.profit_amount
                    .partial_cmp(&a.profit_amount)
                    .unwrap_or(Ordering::Equal)
            })
    });
}
