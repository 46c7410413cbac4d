use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::{info, warn};
use std::io::Write;
use std::time::Duration;
use tabled::{settings::Style, Table};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::core::types::{AnalysisTypes, ArbitrageOpportunity, ScanRequest};
use crate::exchanges::supported_exchanges;
use crate::monitor::ArbitrageMonitor;
use crate::progress::ProgressReporter;

// 命令行参数常量
const EXCHANGES_ARG: &str = "exchanges";
const ANALYSIS_ARG: &str = "analysis";
const INVESTMENT_ARG: &str = "investment";
const MIN_SPREAD_ARG: &str = "min-spread";
const MAX_SPREAD_ARG: &str = "max-spread";
const CONFIG_ARG: &str = "config";
const INTERVAL_ARG: &str = "interval";
const LIMIT_ARG: &str = "limit";
const LIST_EXCHANGES_ARG: &str = "list-exchanges";

/// CLI应用程序结构
pub struct CliApp {
    monitor: ArbitrageMonitor,
    printer: JoinHandle<()>,
}

impl CliApp {
    /// 加载配置并创建扫描器，进度消息打印到 stderr
    pub fn new(matches: &ArgMatches) -> Result<Self> {
        let config_path = matches.get_one::<String>(CONFIG_ARG).map(String::as_str);
        let config = Config::load(config_path).context("加载配置失败")?;
        info!("配置加载完成");

        Ok(Self::with_output(config, std::io::stderr()))
    }

    fn with_output<W>(config: Config, out: W) -> Self
    where
        W: Write + Send + 'static,
    {
        let (progress, rx) = ProgressReporter::channel();
        let printer = tokio::spawn(print_progress(rx, out));

        Self {
            monitor: ArbitrageMonitor::new(config).with_progress(progress),
            printer,
        }
    }

    /// 构建命令行参数解析器
    pub fn build_cli() -> Command {
        Command::new("arbitrage-scanner")
            .version(env!("CARGO_PKG_VERSION"))
            .about("中心化交易所价差套利扫描")
            .arg(
                Arg::new(EXCHANGES_ARG)
                    .long(EXCHANGES_ARG)
                    .short('e')
                    .help("参与扫描的交易所，逗号分隔 (默认: 所有启用的交易所)")
                    .value_name("IDS")
                    .value_delimiter(','),
            )
            .arg(
                Arg::new(ANALYSIS_ARG)
                    .long(ANALYSIS_ARG)
                    .short('a')
                    .help("分析类型: spot-spot, spot-futures, futures-futures 或 all")
                    .value_name("TYPES")
                    .value_delimiter(',')
                    .default_value("spot-spot"),
            )
            .arg(
                Arg::new(INVESTMENT_ARG)
                    .long(INVESTMENT_ARG)
                    .help("投资金额 (默认取配置)")
                    .value_name("AMOUNT")
                    .value_parser(value_parser!(f64)),
            )
            .arg(
                Arg::new(MIN_SPREAD_ARG)
                    .long(MIN_SPREAD_ARG)
                    .help("最小价差百分比 (默认取配置)")
                    .value_name("PERCENT")
                    .value_parser(value_parser!(f64)),
            )
            .arg(
                Arg::new(MAX_SPREAD_ARG)
                    .long(MAX_SPREAD_ARG)
                    .help("最大价差百分比 (默认取配置)")
                    .value_name("PERCENT")
                    .value_parser(value_parser!(f64)),
            )
            .arg(
                Arg::new(CONFIG_ARG)
                    .long(CONFIG_ARG)
                    .short('c')
                    .help("配置文件路径")
                    .value_name("FILE"),
            )
            .arg(
                Arg::new(INTERVAL_ARG)
                    .long(INTERVAL_ARG)
                    .short('i')
                    .help("持续扫描的间隔秒数，不指定则只扫描一次")
                    .value_name("SECONDS")
                    .value_parser(value_parser!(u64).range(1..)),
            )
            .arg(
                Arg::new(LIMIT_ARG)
                    .long(LIMIT_ARG)
                    .short('n')
                    .help("显示的套利机会数量 (默认: 20)")
                    .value_name("NUMBER")
                    .value_parser(value_parser!(usize))
                    .default_value("20"),
            )
            .arg(
                Arg::new(LIST_EXCHANGES_ARG)
                    .long(LIST_EXCHANGES_ARG)
                    .help("列出支持的交易所")
                    .action(ArgAction::SetTrue),
            )
    }

    /// 运行CLI应用程序，返回前打印完所有进度消息
    pub async fn run(self, matches: &ArgMatches) -> Result<()> {
        let result = self.execute(matches).await;

        // monitor 持有最后一个发送端，drop 后打印任务读完剩余消息即退出
        let Self { monitor, printer } = self;
        drop(monitor);
        if let Err(e) = printer.await {
            warn!("进度输出任务异常退出: {}", e);
        }

        result
    }

    async fn execute(&self, matches: &ArgMatches) -> Result<()> {
        if matches.get_flag(LIST_EXCHANGES_ARG) {
            self.list_exchanges();
            return Ok(());
        }

        let request = build_request(&self.monitor, matches)?;
        let limit = matches.get_one::<usize>(LIMIT_ARG).copied().unwrap_or(20);

        match matches.get_one::<u64>(INTERVAL_ARG) {
            Some(&seconds) => {
                info!("启动持续扫描，间隔 {} 秒", seconds);
                let scan = self
                    .monitor
                    .run_periodic(&request, Duration::from_secs(seconds), |opportunities| {
                        display_opportunities(opportunities, limit);
                        true
                    });
                tokio::select! {
                    result = scan => result?,
                    _ = tokio::signal::ctrl_c() => info!("收到退出信号，停止扫描"),
                }
            }
            None => {
                let opportunities = self.monitor.find_opportunities(&request).await?;
                display_opportunities(&opportunities, limit);
            }
        }

        Ok(())
    }

    fn list_exchanges(&self) {
        let config = self.monitor.config();
        println!("支持的交易所:");
        for id in supported_exchanges() {
            if let Some(profile) = config.get_exchange_config(id) {
                println!(
                    "  {:<8} {:<8} spot fee {:.3}%  futures {}  {}",
                    id,
                    profile.name,
                    profile.fee.spot,
                    if profile.supports_futures() {
                        format!("fee {:.3}%", profile.fee.futures)
                    } else {
                        "n/a".to_string()
                    },
                    if profile.enabled { "enabled" } else { "disabled" }
                );
            }
        }
    }
}

/// 带时间戳逐行输出进度消息，直到所有发送端关闭
async fn print_progress<W: Write>(mut rx: UnboundedReceiver<String>, mut out: W) {
    while let Some(line) = rx.recv().await {
        if writeln!(out, "[{}] {}", Local::now().format("%H:%M:%S%.3f"), line).is_err() {
            break;
        }
    }
    let _ = out.flush();
}

/// 解析分析类型列表，遇到未知值报错
pub fn parse_analysis<'a, I>(values: I) -> Result<AnalysisTypes>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut analysis = AnalysisTypes {
        spot_spot: false,
        spot_futures: false,
        futures_futures: false,
    };

    for value in values {
        match value.trim().to_lowercase().replace('_', "-").as_str() {
            "spot-spot" => analysis.spot_spot = true,
            "spot-futures" => analysis.spot_futures = true,
            "futures-futures" => analysis.futures_futures = true,
            "all" => {
                analysis.spot_spot = true;
                analysis.spot_futures = true;
                analysis.futures_futures = true;
            }
            "" => {}
            other => bail!("未知的分析类型: {}", other),
        }
    }

    Ok(analysis)
}

/// 命令行参数覆盖配置中的默认请求
pub fn build_request(monitor: &ArbitrageMonitor, matches: &ArgMatches) -> Result<ScanRequest> {
    let mut request = monitor.default_request();

    if let Some(ids) = matches.get_many::<String>(EXCHANGES_ARG) {
        request.exchanges = ids
            .map(|id| id.trim().to_lowercase())
            .filter(|id| !id.is_empty())
            .collect();
    }
    if let Some(types) = matches.get_many::<String>(ANALYSIS_ARG) {
        request.analysis = parse_analysis(types.map(String::as_str))?;
    }
    if let Some(&investment) = matches.get_one::<f64>(INVESTMENT_ARG) {
        request.investment = investment;
    }
    if let Some(&min) = matches.get_one::<f64>(MIN_SPREAD_ARG) {
        request.min_spread_percent = min;
    }
    if let Some(&max) = matches.get_one::<f64>(MAX_SPREAD_ARG) {
        request.max_spread_percent = max;
    }

    Ok(request)
}

/// 以表格形式显示套利机会
pub fn display_opportunities(opportunities: &[ArbitrageOpportunity], limit: usize) {
    println!("\n🔍 发现 {} 个套利机会:", opportunities.len());
    if opportunities.is_empty() {
        println!();
        return;
    }

    let shown = &opportunities[..opportunities.len().min(limit)];
    let table = Table::new(shown).with(Style::rounded()).to_string();

    println!("{}", "=".repeat(120));
    println!("{}", table);
    println!("{}", "=".repeat(120));
    if shown.len() < opportunities.len() {
        println!("... 另有 {} 个未显示", opportunities.len() - shown.len());
    }
    println!();
}
