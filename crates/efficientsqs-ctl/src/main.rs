//! efficientsqs-ctl: command-line interface for the efficientsqs daemon.

mod cmd;

use anyhow::{Context, Result};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_ROUTE: &str = "/sqs";

fn print_usage() {
    println!("Usage: efficientsqs-ctl [--port <port>] [--route <path>] <command>");
    println!();
    println!("Commands:");
    println!("  status        Show loop state, counters, and limits");
    println!("  send <text>   Submit one message for consolidation");
    println!();
    println!("Options:");
    println!("  --port <port>   Daemon port (default: {})", DEFAULT_PORT);
    println!("  --route <path>  Ingestion route (default: {})", DEFAULT_ROUTE);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut port = DEFAULT_PORT;
    let mut route = DEFAULT_ROUTE.to_string();
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                port = args
                    .get(i)
                    .context("--port requires a value")?
                    .parse()
                    .context("--port must be a number")?;
            }
            "--route" => {
                i += 1;
                route = args.get(i).context("--route requires a value")?.clone();
            }
            other => remaining.push(other),
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => cmd::status::cmd_status(port).await,
        ["send", text] => cmd::send::cmd_send(port, &route, text).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
