use anyhow::Result;
use mc_quality::utils::logging;
use mc_quality::{App, Command, Config, LlmService};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(config.verbose_logging);

    // 解析子命令
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;

    // 初始化并运行应用
    let _stats = App::<LlmService>::initialize(config).await?.run(&command).await?;

    Ok(())
}
