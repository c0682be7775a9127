use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "node-cli")]
#[command(about = "Management CLI for the log node", long_about = None)]
struct Cli {
    /// Base URL of the RPC transport.
    #[arg(short, long, default_value = "http://localhost:8090")]
    rpc_url: String,

    /// Base URL of the HTTP transport.
    #[arg(long, default_value = "http://localhost:8091")]
    http_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe node health
    Health,
    /// Dump Prometheus metrics
    Metrics,
    /// Show debug variables
    Vars,
    /// List trees
    Trees {
        /// Include soft-deleted trees
        #[arg(long)]
        include_deleted: bool,
    },
    /// Create a tree
    CreateTree {
        /// LOG or PREORDERED_LOG
        #[arg(long, default_value = "LOG")]
        tree_type: String,
        #[arg(long, default_value = "")]
        display_name: String,
    },
    /// Soft-delete a tree
    DeleteTree { tree_id: i64 },
    /// Restore a soft-deleted tree
    UndeleteTree { tree_id: i64 },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/healthz", cli.http_url)).send().await?;
            print_text(res).await?;
        }
        Commands::Metrics => {
            let res = client.get(format!("{}/metrics", cli.http_url)).send().await?;
            print_text(res).await?;
        }
        Commands::Vars => {
            let res = client.get(format!("{}/debug/vars", cli.http_url)).send().await?;
            print_response(res).await?;
        }
        Commands::Trees { include_deleted } => {
            let res = client
                .get(format!("{}/v1/trees", cli.rpc_url))
                .query(&[("include_deleted", include_deleted)])
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::CreateTree {
            tree_type,
            display_name,
        } => {
            let res = client
                .post(format!("{}/v1/trees", cli.rpc_url))
                .json(&json!({ "tree_type": tree_type, "display_name": display_name }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::DeleteTree { tree_id } => {
            let res = client
                .delete(format!("{}/v1/trees/{}", cli.rpc_url, tree_id))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::UndeleteTree { tree_id } => {
            let res = client
                .post(format!("{}/v1/trees/{}/undelete", cli.rpc_url, tree_id))
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_text(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if status.is_success() {
        println!("{}", text);
    } else {
        eprintln!("Error: node returned status {}", status);
        eprintln!("Response: {}", text);
    }
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: node returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
