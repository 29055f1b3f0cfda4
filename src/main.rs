use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use proxy_validator::proxy::{
    IdentityResolver, HttpTransport, Protocol, ProxyParser, ProxyValidator,
    UnknownIdentityPolicy, ValidatorConfig,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Validate proxies by checking that traffic really leaves through them
#[derive(Parser)]
#[command(name = "proxy-validator")]
#[command(about = "Validate proxies by checking that traffic really leaves through them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate proxies from a file and report the working ones
    Validate {
        /// Input file containing proxies
        input: PathBuf,
        /// Output file for verified proxies
        #[arg(short, long)]
        good: Option<PathBuf>,
        /// Output file for rejected proxies
        #[arg(short, long)]
        bad: Option<PathBuf>,
        /// Protocol for entries without a scheme (http, https, socks5)
        #[arg(short = 't', long, default_value = "http")]
        protocol: String,
        /// Per-probe timeout in seconds
        #[arg(long, default_value = "4")]
        timeout: u64,
        /// Timeout for the host identity lookup in seconds
        #[arg(long, default_value = "4")]
        identity_timeout: u64,
        /// URL probed through each proxy
        #[arg(long, default_value = "http://httpbin.org/ip")]
        probe_url: String,
        /// URL that echoes this host's address
        #[arg(long, default_value = "https://ifconfig.me")]
        identity_url: String,
        /// Maximum probes in flight (default: 256)
        #[arg(short = 'n', long)]
        concurrency: Option<usize>,
        /// Count proxies as verified even when the host identity is unknown
        #[arg(long)]
        fail_open: bool,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print this host's public address
    Identity {
        /// URL that echoes this host's address
        #[arg(long, default_value = "https://ifconfig.me")]
        identity_url: String,
        /// Timeout in seconds
        #[arg(long, default_value = "4")]
        timeout: u64,
    },
    /// Parse proxies from a file
    Parse {
        /// Input file containing proxies
        input: PathBuf,
        /// Output file for parsed proxies
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Protocol for entries without a scheme (http, https, socks5)
        #[arg(short = 't', long, default_value = "http")]
        protocol: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_ascii_lowercase()));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match cli.command {
        Commands::Validate {
            input,
            good,
            bad,
            protocol,
            timeout,
            identity_timeout,
            probe_url,
            identity_url,
            concurrency,
            fail_open,
            json,
        } => {
            let protocol = parse_protocol(&protocol)?;
            let proxies = ProxyParser::parse_file(&input, protocol)?;

            let mut config = ValidatorConfig::new()
                .with_probe_timeout(Duration::from_secs(timeout))
                .with_identity_timeout(Duration::from_secs(identity_timeout))
                .with_probe_url(probe_url)
                .with_identity_url(identity_url);
            if let Some(n) = concurrency {
                config = config.with_concurrency(n);
            }
            if fail_open {
                config = config.with_unknown_identity(UnknownIdentityPolicy::FailOpen);
            }

            let validator = ProxyValidator::with_config(config)?;

            if !json {
                let config = validator.config();
                println!("Loaded {} proxies from {:?}", proxies.len(), input);
                println!(
                    "Probe URL: {}, timeout: {:?}, concurrency: {}",
                    config.probe_url,
                    config.probe_timeout,
                    config.concurrency.unwrap_or(proxies.len())
                );
                println!();
            }

            let report = validator.check_proxies(&proxies).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Host identity: {}", report.identity);
            }

            let identity = report.identity;
            let (good_results, bad_results) = report.partition();

            if !json {
                println!(
                    "Results: {} verified, {} rejected",
                    good_results.len(),
                    bad_results.len()
                );
            }

            if let Some(good_path) = good {
                let good_proxies: Vec<_> = good_results.iter().map(|r| r.proxy.clone()).collect();
                ProxyParser::save_to_file(&good_proxies, &good_path, true)?;
                if !json {
                    println!(
                        "Saved {} verified proxies to {:?}",
                        good_proxies.len(),
                        good_path
                    );
                }
            }

            if let Some(bad_path) = bad {
                let bad_proxies: Vec<_> = bad_results.iter().map(|r| r.proxy.clone()).collect();
                ProxyParser::save_to_file(&bad_proxies, &bad_path, true)?;
                if !json {
                    println!("Saved {} rejected proxies to {:?}", bad_proxies.len(), bad_path);
                }
            }

            if !json && !good_results.is_empty() {
                println!("\nVerified proxies (host {}):", identity);
                for result in &good_results {
                    match result.response_time_ms {
                        Some(time) => println!("  {} {} ({}ms)", result.proxy, result.outcome, time),
                        None => println!("  {} {}", result.proxy, result.outcome),
                    }
                }
            }
        }
        Commands::Identity {
            identity_url,
            timeout,
        } => {
            let transport = HttpTransport::new()?;
            let identity =
                IdentityResolver::new(&transport, &identity_url, Duration::from_secs(timeout))
                    .resolve()
                    .await;
            if !identity.is_known() {
                return Err(anyhow!("Could not resolve host identity from {}", identity_url));
            }
            println!("{}", identity);
        }
        Commands::Parse {
            input,
            output,
            protocol,
        } => {
            let protocol = parse_protocol(&protocol)?;
            let proxies = ProxyParser::parse_file(&input, protocol)?;

            println!("Parsed {} proxies from {:?}", proxies.len(), input);

            if let Some(output_path) = output {
                ProxyParser::save_to_file(&proxies, &output_path, true)?;
                println!("Saved parsed proxies to {:?}", output_path);
            } else {
                for proxy in &proxies {
                    println!("{}", proxy);
                }
            }
        }
    }

    Ok(())
}

fn parse_protocol(s: &str) -> Result<Protocol> {
    s.parse::<Protocol>().map_err(|e| anyhow!(e))
}
