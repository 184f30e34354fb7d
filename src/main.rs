use clap::{Parser, Subcommand};
use currency_rates::{
    config::RESET_PERIOD, spawn_reset_task, Config, ExchangeRates, FetchOrchestrator,
    HttpRateFetcher, RateCache, RequestLimiter, RetryPolicy,
};
use std::{process::ExitCode, sync::Arc};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "currency_rates", about = "Convert amounts using live exchange rates")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert an amount from one currency to another
    Convert {
        from: String,
        to: String,
        amount: f64,
    },
    /// List all rates relative to the service's base currency
    List {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let limiter = Arc::new(RequestLimiter::new(config.rate_limit));
    let reset_task = spawn_reset_task(limiter.clone(), RESET_PERIOD, shutdown_rx.clone());

    let orchestrator = FetchOrchestrator::new(
        Arc::new(HttpRateFetcher::new()),
        Arc::new(RateCache::new(config.cache_ttl)),
        limiter,
    )
    .with_policy(RetryPolicy {
        fetch_timeout: config.fetch_timeout,
        ..RetryPolicy::default()
    })
    .with_shutdown(shutdown_rx);

    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            let _ = ctrl_c_tx.send(true);
        }
    });

    let code = match orchestrator.get_exchange_rates(&config.endpoint()).await {
        Ok(rates) => run(cli.command, &rates),
        Err(e) => {
            tracing::error!(error = %e, "Error fetching exchange rates");
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    };

    let _ = shutdown_tx.send(true);
    if let Err(e) = reset_task.await {
        tracing::warn!(error = %e, "Reset task ended abnormally");
    }

    code
}

fn run(command: Command, rates: &ExchangeRates) -> ExitCode {
    let Some(snapshot) = &rates.snapshot else {
        eprintln!(
            "Rate limit reached and no recent rates are cached. Please try again in a minute."
        );
        return ExitCode::FAILURE;
    };

    if rates.from_cache {
        eprintln!("Rate limit reached, using cached rates.");
    }

    match command {
        Command::Convert { from, to, amount } => match snapshot.convert(amount, &from, &to) {
            Ok(converted) => {
                println!("{:.2} {} is {:.2} {}", amount, from, converted, to);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", e.user_message());
                ExitCode::FAILURE
            }
        },
        Command::List { json } => {
            if json {
                match serde_json::to_string_pretty(&**snapshot) {
                    Ok(body) => println!("{}", body),
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to serialize rates");
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                println!("Exchange rates for {}:", snapshot.base_code());
                let mut entries: Vec<_> = snapshot.rates().iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                for (currency, rate) in entries {
                    println!("{}: {}", currency, rate);
                }
            }
            ExitCode::SUCCESS
        }
    }
}
