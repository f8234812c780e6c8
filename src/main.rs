use anyhow::Result;
use clap::Parser;

mod models;
mod repositories;
pub mod server;
pub mod services;
pub mod settings;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    #[arg(short, long)]
    listen: Option<String>,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log4rs).expect("Failed to initialize logging.");
    log::info!("Starting CRM console.");

    let settings = settings::Settings::load(&args.config).expect("Could not load config file.");
    let listen = args
        .listen
        .unwrap_or_else(|| settings.server.listen_addr.clone());

    services::start_services(settings, listen).await?;

    Ok(())
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !std::path::Path::new("logs").exists() {
        std::fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            println!("[*] Logging initialized successfully.");
            Ok(())
        }
        Err(e) => {
            println!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}
