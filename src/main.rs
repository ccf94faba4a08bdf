use std::env;

use dotenvy::dotenv;
use linkpulse::runtime::modes::{self, Mode};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let args: Vec<String> = env::args().collect();
    dotenv().ok();

    // 配置先于日志初始化，日志参数来自配置
    linkpulse::config::init_config();

    match modes::detect_mode(&args) {
        #[cfg(feature = "cli")]
        Mode::Cli => {
            if let Err(e) = modes::run_cli().await {
                eprintln!("{}", e.format_colored());
                std::process::exit(1);
            }
        }
        #[cfg(feature = "server")]
        Mode::Server => {
            let config = linkpulse::config::get_config();
            let _guard = linkpulse::system::init_logging(&config.logging);
            if let Err(e) = modes::run_server().await {
                tracing::error!("Server exited with error: {}", e);
                std::process::exit(1);
            }
        }
        Mode::Unknown => {
            eprintln!("No execution mode available. Rebuild with the server or cli feature.");
            std::process::exit(2);
        }
    }

    Ok(())
}
