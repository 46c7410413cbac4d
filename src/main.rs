use anyhow::Result;
use log::info;

use arbitrage_scanner::cli::CliApp;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载 .env 文件
    dotenv::dotenv().ok();

    // 初始化日志系统，RUST_LOG 可覆盖默认级别
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("启动交易所套利扫描...");

    let matches = CliApp::build_cli().get_matches();
    let app = CliApp::new(&matches)?;
    app.run(&matches).await
}
