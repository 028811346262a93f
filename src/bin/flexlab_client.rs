use std::error::Error;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use flexlab::{Credentials, DEFAULT_PORT, FlexlabClient, TcpTransport};

#[derive(Parser)]
#[command(version, about = "Send get/set commands to the Flexlab external interface")]
struct CommandLine {
    /// interface host name or address
    #[arg(long)]
    host: String,
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    #[arg(short, long)]
    user: String,
    #[arg(short, long, env = "FLEXLAB_PASSWORD", hide_env_values = true)]
    password: String,
    /// connect/read/write timeout in seconds
    #[arg(long, default_value_t = 15)]
    timeout_secs: u64,
    /// log level (v: info, vv: debug, vvv: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read a point, e.g. "WattStopper.HS1--4126F--Light Level-1"
    Get { target: String },
    /// Read a point and parse it as a number
    Level { target: String },
    /// Write a value to a point
    Set { target: String, value: f64 },
    /// Send a command string as-is
    Raw { command: String },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: CommandLine) -> Result<(), Box<dyn Error>> {
    let credentials = Credentials::new(cli.user, cli.password);
    let mut client =
        FlexlabClient::<TcpTransport>::with_timeout(Duration::from_secs(cli.timeout_secs));

    let login = client.open(&cli.host, cli.port, &credentials)?;
    tracing::info!("{login}");

    let outcome = match &cli.command {
        Command::Get { target } => client
            .get_daq(target, &credentials)
            .map(|r| String::from_utf8_lossy(&r).into_owned()),
        Command::Level { target } => client.read_level(target, &credentials).map(|v| v.to_string()),
        Command::Set { target, value } => client
            .set_daq(target, *value, &credentials)
            .map(|r| String::from_utf8_lossy(&r).into_owned()),
        Command::Raw { command } => client
            .cmd(command.as_bytes())
            .map(|r| String::from_utf8_lossy(&r).into_owned()),
    };

    // Close on every path; a failed exchange has already closed the session.
    if let Err(e) = client.close() {
        tracing::debug!(error = %e, "close");
    }

    println!("{}", outcome?);
    Ok(())
}

fn main() -> ExitCode {
    let cli = CommandLine::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Failure - {e}");
            ExitCode::FAILURE
        }
    }
}
