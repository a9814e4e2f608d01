use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use token_relay::client::ApiClient;
use token_relay::helpers::jwt::peek_expiry;
use token_relay::helpers::time::remaining_seconds;
use token_relay::request::ApiRequest;
use token_relay::server;
use token_relay::utils::config_loader;
use token_relay::utils::constants::DEFAULT_CONFIG_PATH;
use token_relay::utils::logging::{self, LogLevel};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,
    #[arg(long, env = "LOG_LEVEL" , value_enum)]
    log_level: Option<LogLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the issued credentials
    Login {
        #[arg(long, env = "TOKEN_RELAY_EMAIL")]
        email: String,
        #[arg(long, env = "TOKEN_RELAY_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and store the issued credentials
    Register {
        #[arg(long)]
        name: Option<String>,
        #[arg(long, env = "TOKEN_RELAY_EMAIL")]
        email: String,
        #[arg(long, env = "TOKEN_RELAY_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Revoke the refresh token remotely (best effort) and clear local credentials
    Logout,
    /// Show whether a session is stored and when the access token expires
    Status,
    /// Send one authenticated request and print the response body
    Request {
        method: http::Method,
        path: String,
        /// JSON request body
        #[arg(long)]
        data: Option<String>,
    },
    /// Run the local relay
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Parse args, load YAML config
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(Some(&service_config), args.log_level);

    // -------------------------------
    // 2. Create authenticated client
    // -------------------------------

    let client = ApiClient::from_config(&service_config)?;

    // -------------------------------
    // 3. Run command
    // -------------------------------

    match args.command {
        Command::Login { email, password } => {
            client.login(&json!({ "email": email, "password": password })).await?;
            println!("logged in");
        }
        Command::Register { name, email, password } => {
            client
                .register(&json!({ "name": name, "email": email, "password": password }))
                .await?;
            println!("registered and logged in");
        }
        Command::Logout => {
            client.logout().await;
            println!("logged out");
        }
        Command::Status => print_status(&client),
        Command::Request { method, path, data } => {
            let mut request = ApiRequest::new(method, path);
            if let Some(data) = data {
                let body: Value = serde_json::from_str(&data).context("--data must be JSON")?;
                request = request.json(&body)?;
            }
            let response = client.send(&request).await?;
            println!("{}", response.text());
        }
        Command::Serve => {
            if !client.store().is_established() {
                bail!("no stored session, run `token-relay login` first");
            }
            info!("Relay starting...");
            server::server::start(&service_config.settings, client).await?;
        }
    }

    Ok(())
}

fn print_status(client: &ApiClient) {
    match client.store().get_access() {
        None => println!("no session"),
        Some(access) => match peek_expiry(&access) {
            Some(at) => println!(
                "session established, access token expires at {} ({}s left)",
                at.to_rfc3339(),
                remaining_seconds(&at)
            ),
            None => println!("session established, access token expiry unknown"),
        },
    }
}
