use clap::{Parser, Subcommand};

use zia_mcp_runtime::{McpCommands, init_tracing};

mod commands;
mod util;

use util::{exit_error, read_json_arg};

#[derive(Parser)]
#[command(
    name = "zia",
    version,
    about = "ZIA CLI: call Zscaler Internet Access configuration tools or serve them over MCP"
)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, env = "ZIA_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tool definitions
    Tools {
        /// Include create/update/delete tools
        #[arg(long, env = "ZIA_MCP_ENABLE_WRITE_TOOLS")]
        enable_write_tools: bool,
        /// Print only tool names
        #[arg(long)]
        names_only: bool,
    },
    /// Invoke one tool and print its result envelope
    Call {
        /// Tool name (e.g. zia_list_network_apps)
        tool: String,
        /// Arguments as a JSON object, @file, or - for stdin
        #[arg(long, default_value = "{}")]
        args: String,
        /// Confirm a destructive operation
        #[arg(long)]
        confirm: bool,
        /// Allow tools that modify configuration
        #[arg(long, env = "ZIA_MCP_ENABLE_WRITE_TOOLS")]
        enable_write_tools: bool,
    },
    /// MCP server
    Mcp {
        #[command(subcommand)]
        command: McpCommands,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let log_json = match &cli.command {
        Commands::Mcp { command } => cli.log_json || command.log_json(),
        _ => cli.log_json,
    };
    init_tracing(log_json);

    let code = match cli.command {
        Commands::Tools {
            enable_write_tools,
            names_only,
        } => commands::tools::list(enable_write_tools, names_only),
        Commands::Call {
            tool,
            args,
            confirm,
            enable_write_tools,
        } => {
            let args = read_json_arg(&args).unwrap_or_else(|e| {
                exit_error(&e, Some("Pass --args as a JSON object, @path/to/args.json, or -"))
            });
            commands::tools::call(&tool, args, confirm, enable_write_tools).await
        }
        Commands::Mcp { command } => zia_mcp_runtime::run(command).await,
    };
    std::process::exit(code);
}
