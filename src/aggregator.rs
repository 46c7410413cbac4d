use futures::future::join_all;
use log::info;

use crate::core::types::{AnalysisTypes, MarketType, Quote, SymbolQuoteSet};
use crate::error::Result;
use crate::exchanges::ExchangeAdapter;
use crate::progress::ProgressReporter;

/// 并发抓取所有交易所行情并按符号合并
pub struct PriceAggregator {
    progress: ProgressReporter,
}

impl PriceAggregator {
    pub fn new(progress: ProgressReporter) -> Self {
        Self { progress }
    }

    /// 每个 (交易所, 市场) 一个任务，全部完成后再合并
    ///
    /// 单个交易所失败只记录日志，贡献零条报价。
    pub async fn fetch_all(
        &self,
        adapters: &[Box<dyn ExchangeAdapter>],
        analysis: &AnalysisTypes,
    ) -> SymbolQuoteSet {
        let markets = analysis.required_markets();
        let markets = markets.as_slice();

        let tasks = adapters.iter().flat_map(move |adapter| {
            markets.iter().map(move |&market_type| async move {
                self.progress.emit(format!(
                    "Fetching {} prices from {}...",
                    market_type.as_str(),
                    adapter.id()
                ));
                let result = adapter.get_prices(market_type).await;
                (adapter.id(), market_type, result)
            })
        });

        let results = join_all(tasks).await;

        let mut quote_set = SymbolQuoteSet::new();
        for (exchange, market_type, result) in results {
            let quotes = self.absorb(exchange, market_type, result);
            merge_quotes(&mut quote_set, quotes);
        }

        info!(
            "Aggregated {} symbols from {} exchanges",
            quote_set.len(),
            adapters.len()
        );
        quote_set
    }

    fn absorb(&self, exchange: &str, market_type: MarketType, result: Result<Vec<Quote>>) -> Vec<Quote> {
        match result {
            Ok(quotes) => {
                self.progress.emit(format!(
                    "{}: received {} {} quotes",
                    exchange,
                    quotes.len(),
                    market_type.as_str()
                ));
                quotes
            }
            Err(e) => {
                self.progress.warn(format!(
                    "{}: failed to fetch {} prices: {}",
                    exchange,
                    market_type.as_str(),
                    e
                ));
                Vec::new()
            }
        }
    }
}

/// 追加到对应符号的列表，不覆盖已有报价
pub fn merge_quotes(quote_set: &mut SymbolQuoteSet, quotes: Vec<Quote>) {
    for quote in quotes {
        quote_set.entry(quote.symbol.clone()).or_default().push(quote);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ExchangeProfile};
    use crate::error::ScanError;
    use async_trait::async_trait;

    struct StubExchange {
        profile: ExchangeProfile,
        spot: Vec<(f64, f64)>,
        futures_fails: bool,
    }

    impl StubExchange {
        fn new(id: &str, spot: Vec<(f64, f64)>, futures_fails: bool) -> Box<dyn ExchangeAdapter> {
            let mut profile = Config::default().get_exchange_config("binance").cloned().unwrap();
            profile.id = id.to_string();
            Box::new(Self {
                profile,
                spot,
                futures_fails,
            })
        }

        fn quotes(&self, market_type: MarketType) -> Vec<Quote> {
            self.spot
                .iter()
                .filter_map(|&(bid, ask)| {
                    Quote::new(&self.profile.id, market_type, "BTC".into(), "BTCUSDT".into(), bid, ask)
                })
                .collect()
        }
    }

    #[async_trait]
    impl ExchangeAdapter for StubExchange {
        fn id(&self) -> &str {
            &self.profile.id
        }

        fn profile(&self) -> &ExchangeProfile {
            &self.profile
        }

        async fn get_spot_prices(&self) -> Result<Vec<Quote>> {
            Ok(self.quotes(MarketType::Spot))
        }

        async fn get_futures_prices(&self) -> Result<Vec<Quote>> {
            if self.futures_fails {
                return Err(ScanError::HttpStatus {
                    exchange: self.profile.id.clone(),
                    status: 500,
                });
            }
            Ok(self.quotes(MarketType::Futures))
        }
    }

    #[tokio::test]
    async fn test_quotes_are_appended_per_symbol() {
        let adapters = vec![
            StubExchange::new("a", vec![(100.0, 100.1)], false),
            StubExchange::new("b", vec![(101.0, 101.1)], false),
        ];
        let set = PriceAggregator::new(ProgressReporter::silent())
            .fetch_all(&adapters, &AnalysisTypes::default())
            .await;

        let btc = &set["BTC"];
        assert_eq!(btc.len(), 2);
        assert_eq!(btc[0].exchange, "a");
        assert_eq!(btc[1].exchange, "b");
        assert!(btc.iter().all(|q| q.market_type == MarketType::Spot));
    }

    #[tokio::test]
    async fn test_failed_market_contributes_nothing() {
        let adapters = vec![
            StubExchange::new("a", vec![(100.0, 100.1)], true),
            StubExchange::new("b", vec![(101.0, 101.1)], false),
        ];
        let analysis = AnalysisTypes {
            spot_spot: false,
            spot_futures: true,
            futures_futures: false,
        };
        let (progress, mut rx) = ProgressReporter::channel();
        let set = PriceAggregator::new(progress).fetch_all(&adapters, &analysis).await;

        let btc = &set["BTC"];
        // a 的现货 + b 的现货和期货
        assert_eq!(btc.len(), 3);
        assert_eq!(
            btc.iter()
                .filter(|q| q.market_type == MarketType::Futures)
                .count(),
            1
        );

        let mut messages = Vec::new();
        while let Ok(line) = rx.try_recv() {
            messages.push(line);
        }
        assert!(messages
            .iter()
            .any(|m| m.starts_with("a: failed to fetch futures prices")));
    }

    #[tokio::test]
    async fn test_no_markets_means_no_fetches() {
        let adapters = vec![StubExchange::new("a", vec![(100.0, 100.1)], true)];
        let analysis = AnalysisTypes {
            spot_spot: false,
            spot_futures: false,
            futures_futures: false,
        };
        let set = PriceAggregator::new(ProgressReporter::silent())
            .fetch_all(&adapters, &analysis)
            .await;
        assert!(set.is_empty());
    }

    #[test]
    fn test_merge_never_overwrites() {
        let mut set = SymbolQuoteSet::new();
        let q = |ex: &str| Quote::new(ex, MarketType::Spot, "ETH".into(), "ETHUSDT".into(), 1.0, 2.0).unwrap();
        merge_quotes(&mut set, vec![q("a")]);
        merge_quotes(&mut set, vec![q("b"), q("c")]);
        assert_eq!(set["ETH"].len(), 3);
    }
}
