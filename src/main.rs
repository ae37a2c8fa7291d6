// ==========================================
// 印花车间计价系统 - 命令行入口
// ==========================================
// 协议: stdin 每行一个 JSON 请求，stdout 每行一个 JSON 响应
// 日志写 stderr
// ==========================================

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use print_shop_billing::app::{commands, get_default_db_path, AppState};
use print_shop_billing::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", print_shop_billing::APP_NAME);
    tracing::info!("系统版本: {}", print_shop_billing::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path)
        .map_err(anyhow::Error::msg)
        .context("无法初始化AppState")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("读取请求失败")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = commands::handle_line(&state, line).await;
        stdout.write_all(response.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    tracing::info!("输入结束，退出");
    Ok(())
}
