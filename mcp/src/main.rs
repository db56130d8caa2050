use clap::Parser;

use zia_mcp_runtime::{McpCommands, init_tracing, run as run_mcp};

#[derive(Parser)]
#[command(
    name = "zia-mcp",
    version,
    about = "ZIA MCP server: configuration tools over stdio"
)]
struct Cli {
    #[command(subcommand)]
    command: McpCommands,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.command.log_json());

    let code = run_mcp(cli.command).await;
    std::process::exit(code);
}
