use anyhow::Result;
use clap::Parser;
use colored::*;

use testing_tools::api_client::ApiClient;
use testing_tools::output::print_test_summary;
use testing_tools::scenarios;
use testing_tools::sse_client::Connection;

#[derive(Parser)]
#[command(name = "sse-test-client")]
#[command(about = "SSE Integration Testing Tool")]
struct Cli {
    /// Base URL of the notification hub (e.g., http://localhost:4000)
    #[arg(long, default_value = "http://localhost:4000")]
    base_url: String,

    /// Test scenario to run
    #[arg(long, value_enum)]
    scenario: ScenarioChoice,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone)]
enum ScenarioChoice {
    /// Test basic SSE connection without publishing anything
    ConnectionTest,
    /// Test that a published notification reaches both clients
    BroadcastTest,
    /// Test that a burst of notifications arrives in publish order
    OrderingTest,
    /// Run all tests
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    println!("{}", "=== SETUP PHASE ===".bright_white().bold());

    let client = reqwest::Client::new();
    let api_client = ApiClient::new(client, cli.base_url.clone());

    // Establish SSE connections
    println!("{} Establishing SSE connections...", "→".blue());
    let mut sse1 = Connection::establish(&cli.base_url, "Client 1".to_string()).await?;
    let mut sse2 = Connection::establish(&cli.base_url, "Client 2".to_string()).await?;

    println!("{} Client 1 SSE connection established", "✓".green());
    println!("{} Client 2 SSE connection established", "✓".green());

    // Run test scenarios
    println!("\n{}", "=== TEST PHASE ===".bright_white().bold());

    let mut results = Vec::new();

    match cli.scenario {
        ScenarioChoice::ConnectionTest => {
            results.push(scenarios::test_connection(&api_client, &mut sse1, &mut sse2).await?);
        }
        ScenarioChoice::BroadcastTest => {
            results.push(scenarios::test_broadcast(&api_client, &mut sse1, &mut sse2).await?);
        }
        ScenarioChoice::OrderingTest => {
            results.push(scenarios::test_ordering(&api_client, &mut sse1, &mut sse2).await?);
        }
        ScenarioChoice::All => {
            results.push(scenarios::test_connection(&api_client, &mut sse1, &mut sse2).await?);
            results.push(scenarios::test_broadcast(&api_client, &mut sse1, &mut sse2).await?);
            results.push(scenarios::test_ordering(&api_client, &mut sse1, &mut sse2).await?);
        }
    }

    let all_passed = print_test_summary(&results);

    if all_passed {
        println!("\n{}", "All tests passed! ✓".bright_green().bold());
    } else {
        println!("\n{}", "Some tests failed! ✗".bright_red().bold());
    }

    std::process::exit(if all_passed { 0 } else { 1 });
}
