use taskii_app::app::{run, AppConfig, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("{err}\n\n{}", taskii_app::app::USAGE);
            std::process::exit(2);
        }
    };

    let config = AppConfig::from_env();
    if let Err(err) = run(config, command).await {
        eprintln!("taskii failed: {err:#}");
        std::process::exit(1);
    }
}
