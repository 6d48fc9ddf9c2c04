use std::env;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use log::{LevelFilter, debug, info, warn};

use sensorcast::api::{AppState, SocketSettings};
use sensorcast::config::{APP_NAME, AppConfig, config_file_path};
use sensorcast::sensor::WeatherApiClient;
use sensorcast::server::{Server, shutdown_signal};
use sensorcast::stream::PollSchedule;

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn async_main(ctx: RuntimeContext, cmd: ServeCommand) -> Result<()> {
    handle_serve(ctx, cmd).await
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone())?;
    LogSetup::resolve(&ctx.common, &ctx.config).install();
    debug!("resolved config file: {}", ctx.config_file.display());

    match cli.command {
        Command::Serve(cmd) => async_main(ctx, cmd),
        Command::Init(cmd) => handle_init(&ctx, cmd),
        Command::Config { command } => handle_config(&ctx, command),
        Command::Completions { shell } => handle_completions(shell),
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Sensorcast - stream landmark temperature and humidity over WebSocket.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
    /// More log output; -v for debug, -vv for trace
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// JSON log lines and JSON `config show` output
    #[arg(long, global = true)]
    json: bool,
    /// When to colour log output
    #[arg(long, value_enum, default_value_t = ColorOption::Auto, global = true)]
    color: ColorOption,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorOption {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the WebSocket server
    Serve(ServeCommand),
    /// Create a default config file
    Init(InitCommand),
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Args)]
struct ServeCommand {
    /// Address to bind (overrides config)
    #[arg(long, value_name = "HOST")]
    host: Option<String>,
    /// Port to listen on (overrides config)
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,
}

#[derive(Debug, Clone, Args)]
struct InitCommand {
    /// Recreate configuration even if it already exists
    #[arg(long = "force")]
    force: bool,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Output the effective configuration
    Show,
    /// Print the resolved config file path
    Path,
}

#[derive(Debug, Clone)]
struct RuntimeContext {
    common: CommonOpts,
    config_file: PathBuf,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let config_file = config_file_path(common.config.clone())?;
        let config = AppConfig::load(&config_file)
            .with_context(|| format!("loading config from {}", config_file.display()))?;
        Ok(Self {
            common,
            config_file,
            config,
        })
    }
}

/// Logging choices resolved from flags and config.
#[derive(Debug, Clone, Copy)]
struct LogSetup {
    level: LevelFilter,
    json: bool,
    ansi: bool,
}

impl LogSetup {
    fn resolve(common: &CommonOpts, config: &AppConfig) -> Self {
        let level = match (common.quiet, common.verbose) {
            (true, _) => LevelFilter::Error,
            (false, 0) => config.logging.level.parse().unwrap_or(LevelFilter::Info),
            (false, 1) => LevelFilter::Debug,
            (false, _) => LevelFilter::Trace,
        };
        let ansi = match common.color {
            ColorOption::Always => true,
            ColorOption::Never => false,
            ColorOption::Auto => env::var_os("NO_COLOR").is_none() && io::stderr().is_terminal(),
        };
        Self {
            level,
            json: common.json,
            ansi,
        }
    }

    /// Install the tracing subscriber, with env_logger behind it for `log` users.
    fn install(self) {
        use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

        let directive = self.level.as_str().to_ascii_lowercase();
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{APP_NAME}={directive},tower_http={directive}"))
        });

        let fmt_layer = tracing_subscriber::fmt::layer().with_ansi(self.ansi);
        let registry = tracing_subscriber::registry().with(filter);
        if self.json {
            let _ = registry.with(fmt_layer.json()).try_init();
        } else {
            let _ = registry.with(fmt_layer).try_init();
        }

        let style = if self.ansi {
            env_logger::WriteStyle::Always
        } else {
            env_logger::WriteStyle::Never
        };
        let _ = env_logger::Builder::new()
            .filter_level(self.level)
            .write_style(style)
            .try_init();
    }
}

fn handle_init(ctx: &RuntimeContext, cmd: InitCommand) -> Result<()> {
    if ctx.config_file.exists() && !cmd.force {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            ctx.config_file.display()
        ));
    }

    AppConfig::write_default(&ctx.config_file)?;
    info!("wrote default config to {}", ctx.config_file.display());
    Ok(())
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            // Never print the provider key
            let mut shown = ctx.config.clone();
            if shown.provider.api_key.is_some() {
                shown.provider.api_key = Some("<redacted>".to_string());
            }
            if ctx.common.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&shown).context("serializing config to JSON")?
                );
            } else {
                println!(
                    "{}",
                    toml::to_string_pretty(&shown).context("serializing config to TOML")?
                );
            }
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", ctx.config_file.display());
            Ok(())
        }
    }
}

fn handle_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
    Ok(())
}

async fn handle_serve(ctx: RuntimeContext, cmd: ServeCommand) -> Result<()> {
    let mut config = ctx.config;
    if let Some(host) = cmd.host {
        config.server.host = host;
    }
    if let Some(port) = cmd.port {
        config.server.port = port;
    }

    if config.provider.api_key.is_none() {
        warn!(
            "No provider API key configured; set provider.api_key or WEATHER_API_KEY. \
             Every fetch will fail until one is provided."
        );
    }

    let client = WeatherApiClient::new(&config.provider).context("building provider client")?;
    info!("Polling {} every {}s", config.provider.base_url, config.polling.interval_secs);

    let state = AppState::new(
        Arc::new(client),
        PollSchedule::from(&config.polling),
        SocketSettings::from(&config.server),
    );

    let server = Server::bind(&config.server, state).await?;
    server.run(shutdown_signal()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(args: &[&str], config_level: &str) -> LogSetup {
        let cli = Cli::try_parse_from(args).unwrap();
        let mut config = AppConfig::default();
        config.logging.level = config_level.to_string();
        LogSetup::resolve(&cli.common, &config)
    }

    #[test]
    fn test_log_level_from_config_and_flags() {
        let base = ["sensorcast", "config", "path"];
        assert_eq!(setup(&base, "warn").level, LevelFilter::Warn);
        assert_eq!(setup(&base, "nonsense").level, LevelFilter::Info);
        let verbose = ["sensorcast", "-v", "config", "path"];
        assert_eq!(setup(&verbose, "warn").level, LevelFilter::Debug);
        let trace = ["sensorcast", "config", "path", "-vv"];
        assert_eq!(setup(&trace, "warn").level, LevelFilter::Trace);
        let quiet = ["sensorcast", "-q", "-vv", "serve"];
        assert_eq!(setup(&quiet, "trace").level, LevelFilter::Error);
    }

    #[test]
    fn test_color_and_json_flags() {
        let plain = setup(&["sensorcast", "--color", "never", "serve"], "info");
        assert!(!plain.ansi);
        assert!(!plain.json);

        let forced = setup(&["sensorcast", "--color", "always", "--json", "serve"], "info");
        assert!(forced.ansi);
        assert!(forced.json);
    }

    #[test]
    fn test_unknown_flags_are_rejected() {
        assert!(Cli::try_parse_from(["sensorcast", "--no-color", "serve"]).is_err());
        assert!(Cli::try_parse_from(["sensorcast", "--diagnostics", "serve"]).is_err());
    }
}
