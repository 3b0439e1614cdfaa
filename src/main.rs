use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::Parser;
use lknpd::{Income, IncomeReceipt, ServiceLine, Session, SessionConfig, account, income};
use std::time::Duration;

/// lknpd - client for the self-employed tax service
///
/// Logs in with the taxpayer's INN and password, then queries the account or
/// registers an income.
///
/// Examples:
///   lknpd -u 123456789012 -p secret user
///   lknpd income --name "Consulting" --amount 1500
#[derive(Parser, Debug)]
#[command(author, version = env!("LKNPD_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Taxpayer login (INN)
    #[arg(long, short = 'u', env = "LKNPD_USERNAME", global = true)]
    username: Option<String>,

    /// Taxpayer password
    #[arg(
        long,
        short = 'p',
        env = "LKNPD_PASSWORD",
        hide_env_values = true,
        global = true
    )]
    password: Option<String>,

    /// API URL (defaults to https://lknpd.nalog.ru/api/v1)
    #[arg(long = "api-url", env = "LKNPD_API_URL", value_name = "URL", global = true)]
    api_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 5, global = true)]
    timeout: u64,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Show the taxpayer profile
    User,

    /// Show payment details for the tax due
    Keys,

    /// Register an income and print the receipt URL
    Income(IncomeArgs),
}

#[derive(clap::Args, Debug)]
struct IncomeArgs {
    /// Name of the service provided
    #[arg(long)]
    name: String,

    /// Price of a single unit in rubles, at most two decimal places
    #[arg(long)]
    amount: f64,

    /// Number of units
    #[arg(long, default_value_t = 1)]
    quantity: u32,

    /// Time of the operation, RFC 3339 (defaults to now)
    #[arg(long, value_name = "DATETIME")]
    date: Option<DateTime<Utc>>,
}

impl Cli {
    fn session_config(&self) -> Result<SessionConfig> {
        let mut config = SessionConfig::new(
            self.username.clone().unwrap_or_default(),
            self.password.clone().unwrap_or_default(),
        )?
        .with_timeout(Duration::from_secs(self.timeout));
        if let Some(api_url) = &self.api_url {
            config = config.with_api_url(api_url);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let config = cli.session_config()?;
    let mut session = Session::open(config)
        .await
        .context("Failed to start session")?;

    match cli.command {
        Commands::User => print_json(&account::user_info(&mut session).await?)?,
        Commands::Keys => print_json(&account::payment_keys(&mut session).await?)?,
        Commands::Income(args) => {
            let line = ServiceLine::from_rubles(args.name, args.amount, args.quantity)?;
            let entry = Income::new(args.date.unwrap_or_else(Utc::now)).with_service(line);
            let receipt = income::register_income(&mut session, &entry).await?;
            match receipt {
                IncomeReceipt::Registered { print_url, .. } => println!("{}", print_url),
                rejected @ IncomeReceipt::Rejected { .. } => {
                    if let Some(wrapper) = rejected.error_wrapper() {
                        print_json(&wrapper)?;
                    }
                    bail!("Income was not registered");
                }
            }
        }
    }
    Ok(())
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to format response")?
    );
    Ok(())
}
