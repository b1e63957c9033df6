use anyhow::Result;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use tracing_subscriber::filter::LevelFilter;
use trillcast::app::{run_analyze_command, run_capture_command};
use trillcast::audio::capture::{list_devices, list_hosts};
use trillcast::cli::{Cli, Commands, ConfigAction};
use trillcast::config::Config;
use trillcast::pipeline::{Mode, Output};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    match &cli.command {
        None => {
            let config = load_config(&cli)?;
            run_capture_command(config, Mode::Both, cli.audio_host.as_deref(), cli.quiet).await?;
        }
        Some(Commands::Analyze {
            file,
            mode,
            stdout,
            json,
        }) => {
            let config = load_config(&cli)?;
            let output = if *stdout { Output::Stdout } else { Output::Udp };
            run_analyze_command(&config, file, *mode, output, cli.quiet || *json, *json)?;
        }
        Some(Commands::Devices) => {
            list_audio_devices(cli.audio_host.as_deref())?;
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, &cli)?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(*shell, &mut Cli::command(), "trillcast", &mut std::io::stdout());
        }
        Some(command) => {
            if let Some(mode) = command.capture_mode() {
                let config = load_config(&cli)?;
                run_capture_command(config, mode, cli.audio_host.as_deref(), cli.quiet).await?;
            }
        }
    }

    Ok(())
}

/// Route log output to stderr at the level chosen by `-q` / `-v`.
fn init_logging(quiet: bool, verbose: u8) {
    let level = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order (later wins):
/// 1. Built-in defaults
/// 2. Config file (--config, or ~/.config/trillcast/config.toml if present)
/// 3. Environment variable overrides
/// 4. CLI flags (--device, --host)
fn load_config(cli: &Cli) -> Result<Config> {
    let config = if let Some(path) = cli.config.as_deref() {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path())?
    };
    let mut config = config.with_env_overrides();

    if let Some(device) = &cli.device {
        config.audio.device = Some(device.clone());
    }
    if let Some(host) = &cli.host {
        config.emitter.host = host.clone();
    }

    config.validate()?;
    Ok(config)
}

/// List available audio input devices, grouped by host.
fn list_audio_devices(host: Option<&str>) -> Result<()> {
    let hosts = match host {
        Some(name) => vec![name.to_string()],
        None => list_hosts(),
    };

    let mut found = false;
    for host_name in &hosts {
        let devices = list_devices(Some(host_name.as_str()))?;
        if devices.is_empty() {
            continue;
        }
        found = true;
        println!("{}:", host_name.bold());
        for (idx, device) in devices.iter().enumerate() {
            if device.ends_with("[default]") {
                println!("  [{}] {}", idx, device.green());
            } else {
                println!("  [{}] {}", idx, device);
            }
        }
    }

    if !found {
        eprintln!("No audio input devices found");
        std::process::exit(1);
    }
    Ok(())
}

/// Handle configuration commands.
fn handle_config_command(action: &ConfigAction, cli: &Cli) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(cli)?;
            print!("{}", config.to_toml_string()?);
        }
        ConfigAction::Path => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let status = if path.exists() {
                "exists".green().to_string()
            } else {
                "not found, using defaults".yellow().to_string()
            };
            println!("{} ({})", path.display(), status);
        }
    }
    Ok(())
}
