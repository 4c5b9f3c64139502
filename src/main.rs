use crate::config::Config;
use crate::startup::startup::Application;
use crate::utils::logger::init_logger;
use anyhow::Context;

mod config;
mod errors;
mod infrastructure;
mod services;
mod startup;
#[cfg(test)]
mod test_support;
mod utils;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 优先加载，便于本地开发注入 ETH_PRIVATE_KEY
    dotenvy::dotenv().ok();

    // 1. 加载配置
    let config = Config::load().context("Failed to load application configuration")?;

    // 2. 初始化日志（由配置显式构建）
    init_logger(&config.log).context("Logger initialization failed")?;

    log_info!("Starting application initialization...");

    // 3. 构建应用实例 (初始化 provider/钱包/会话存储)
    let application = Application::build(config)
        .await
        .context("Application building failed (provider/wallet initialization)")?;

    log_info!("Application build complete. Starting service loop.");

    // 4. 运行应用核心服务
    application
        .run()
        .await
        .context("Application core service failed during runtime")?;

    Ok(())
}
