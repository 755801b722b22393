use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "weather-cli")]
#[command(about = "Management CLI for the weather gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up current weather for a city
    Weather { city: String },
    /// Gateway health and circuit breaker state
    Health,
    /// Readiness probe
    Ready,
    /// Request, cache and latency metrics
    Metrics,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let request = match &cli.command {
        Commands::Weather { city } => client
            .get(format!("{base}/weather"))
            .query(&[("city", city.as_str())]),
        Commands::Health => client.get(format!("{base}/health")),
        Commands::Ready => client.get(format!("{base}/ready")),
        Commands::Metrics => client.get(format!("{base}/metrics")),
    };

    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: gateway returned status {status}");
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }
    Ok(())
}
