use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "plantid-cli")]
#[command(about = "Command-line client for the plant identification gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show gateway health and breaker states
    Health,
    /// Identify the plant in an image file
    Identify {
        /// Image to upload (JPEG, PNG, WebP or GIF)
        image: PathBuf,
        /// Organ shown in the image (leaf, flower, fruit, bark)
        #[arg(long)]
        organ: Option<String>,
        /// Ask for a disease assessment
        #[arg(long)]
        include_disease: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Identify {
            image,
            organ,
            include_disease,
        } => {
            let bytes = tokio::fs::read(&image).await?;
            let mut query = vec![("include_disease", include_disease.to_string())];
            if let Some(organ) = organ {
                query.push(("organ", organ));
            }
            let res = client
                .post(format!("{}/api/v1/identify", base))
                .query(&query)
                .body(bytes)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if let Some(retry_after) = res.headers().get(reqwest::header::RETRY_AFTER) {
        eprintln!("Retry-After: {}s", retry_after.to_str().unwrap_or("?"));
    }
    let text = res.text().await?;

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
    }
    Ok(())
}
