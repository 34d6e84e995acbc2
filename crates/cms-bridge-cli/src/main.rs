use cms_bridge_cli::run_cli;
use tracing::error;

#[tokio::main]
async fn main() {
    match run_cli().await {
        Ok(output) => println!("{}", output),
        Err(e) => {
            error!("CLI error: {}", e);
            eprintln!("{}", e);

            std::process::exit(e.exit_code());
        }
    }
}
