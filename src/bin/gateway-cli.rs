use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operational CLI for the integration gateway", long_about = None)]
struct Cli {
    #[arg(short, long, env = "GATEWAY_URL", default_value = "http://localhost:3000")]
    url: String,

    /// Value of METRICS_API_KEY on the gateway.
    #[arg(short, long, env = "METRICS_API_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Liveness, or every probe with --deep
    Health {
        #[arg(long)]
        deep: bool,
    },
    /// Run one named probe (mongodb, crm, openai, ...)
    Probe { name: String },
    /// Circuit breaker states
    Breakers,
    /// Process and request metrics
    Metrics {
        #[arg(long)]
        prometheus: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert("x-api-key", HeaderValue::from_str(key)?);
    }

    let request = match &cli.command {
        Commands::Health { deep } => client
            .get(format!("{}/health", base))
            .query(&[("deep", deep.to_string())]),
        Commands::Probe { name } => client.get(format!("{}/api/test/{}", base, name)),
        Commands::Breakers => client
            .get(format!("{}/api/circuit-breakers", base))
            .headers(headers),
        Commands::Metrics { prometheus } => {
            let request = client.get(format!("{}/metrics", base)).headers(headers);
            if *prometheus {
                request.query(&[("format", "prometheus")])
            } else {
                request
            }
        }
    };

    let res = request.send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }

    if !status.is_success() {
        return Err(format!("gateway returned status {}", status).into());
    }
    Ok(())
}
