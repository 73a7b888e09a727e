//! Usage: Command-line front end for the synapse backend client.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use synapse_net::infra::logging;
use synapse_net::{ApiClient, ClientConfig, ClientError, ClientResult, RegisterRequest};

/// Talk to a synapse backend from the terminal
#[derive(Parser, Debug)]
#[command(name = "synapse-net", version, about, long_about = None)]
struct Args {
    /// TOML client configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides the config file)
    #[arg(short, long)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a registration captcha
    Captcha {
        /// Write the decoded captcha image here
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Create an account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        captcha_id: String,
        #[arg(long)]
        captcha_code: String,
    },
    /// Log in and print the signed-in profile
    Login {
        #[arg(long)]
        identifier: String,
        #[arg(long)]
        password: String,
    },
}

fn load_config(args: &Args) -> ClientResult<ClientConfig> {
    let config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    Ok(match &args.endpoint {
        Some(endpoint) => config.with_server_endpoint(endpoint),
        None => config,
    })
}

async fn run(client: &ApiClient, command: Command) -> ClientResult<()> {
    match command {
        Command::Captcha { out } => {
            let captcha = client.fetch_captcha().await?;
            println!("captcha id: {}", captcha.id);
            if let Some(path) = out {
                let image = captcha.image_bytes()?;
                std::fs::write(&path, &image).map_err(|e| {
                    ClientError::Config(format!(
                        "failed to write {}: {e}",
                        path.display()
                    ))
                })?;
                println!("image written to {} ({} bytes)", path.display(), image.len());
            }
        }
        Command::Register {
            username,
            email,
            password,
            captcha_id,
            captcha_code,
        } => {
            let account = client
                .register(&RegisterRequest {
                    username,
                    email,
                    password,
                    captcha_id,
                    captcha_code,
                })
                .await?;
            println!("registered: {account}");
        }
        Command::Login {
            identifier,
            password,
        } => {
            client.login(&identifier, &password).await?;
            let profile = client.profile().await?;
            println!("signed in as {} (id {})", profile.display_name(), profile.user_id);
            if let Some(email) = profile.email.as_deref() {
                println!("email: {email}");
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = logging::init(&config.log_filter) {
        eprintln!("{err}");
    }

    let client = match ApiClient::new(config) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    match run(&client, args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(code = err.code(), "command failed: {}", err);
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
