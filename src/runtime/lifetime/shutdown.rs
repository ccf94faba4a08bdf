use sea_orm::DatabaseConnection;
use std::time::Duration;
use tokio::signal;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// 关闭超时时间（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// 单个任务超时时间（秒）
const TASK_TIMEOUT_SECS: u64 = 10;

/// 等待 Ctrl+C 并执行关闭任务
///
/// 点击写入是同步落库的，没有内存缓冲要刷；这里只需要
/// 优雅关闭数据库连接池，等待在途语句完成。
pub async fn listen_for_shutdown(db: &DatabaseConnection) {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, closing connections...");
        }
        Err(e) => {
            warn!(
                "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
                e
            );
        }
    }

    // 将所有关闭任务包裹在超时内
    let shutdown_result = timeout(
        Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
        perform_shutdown_tasks(db),
    )
    .await;

    match shutdown_result {
        Ok(()) => {
            info!("All shutdown tasks completed successfully");
        }
        Err(_) => {
            error!(
                "Shutdown tasks timed out after {} seconds! Forcing exit.",
                SHUTDOWN_TIMEOUT_SECS
            );
            std::process::exit(1);
        }
    }

    info!("Shutting down...");
}

/// 执行所有关闭任务（在超时内调用）
async fn perform_shutdown_tasks(db: &DatabaseConnection) {
    match timeout(Duration::from_secs(TASK_TIMEOUT_SECS), db.clone().close()).await {
        Ok(Ok(())) => {
            info!("Database connection closed");
        }
        Ok(Err(e)) => {
            error!("Failed to close database connection: {}", e);
        }
        Err(_) => {
            error!(
                "Database close timed out after {} seconds",
                TASK_TIMEOUT_SECS
            );
        }
    }
}
