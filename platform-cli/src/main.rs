// =============================================================================
// RANSIM CLI - platform-cli/src/main.rs
// Operator command line entry point
// =============================================================================

// External runtime dependencies
use anyhow::{Context, Result as AnyhowResult};
use clap::{Arg, ArgAction, ArgMatches, Command};
use env_logger::Builder as LogBuilder;
use log::{debug, info, LevelFilter};
use std::path::PathBuf;

// Simulator library imports
use ransim::SimulatorConfiguration;

mod commands;

use commands::{KeygenArgs, SentinelArgs, SimulateArgs};

#[tokio::main]
async fn main() -> AnyhowResult<()> {
    let cli_args = parse_command_line_arguments();

    let level = match cli_args.get_count("verbose") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    LogBuilder::new().filter_level(level).parse_default_env().init();

    info!("ransim {} starting", env!("CARGO_PKG_VERSION"));

    let config = load_configuration(cli_args.get_one::<PathBuf>("config"))?;

    match cli_args.subcommand() {
        Some(command) => handle_cli_command(config, command).await,
        None => Err(anyhow::anyhow!("No command given; see --help")),
    }
}

fn load_configuration(path: Option<&PathBuf>) -> AnyhowResult<SimulatorConfiguration> {
    match path {
        Some(path) => SimulatorConfiguration::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => SimulatorConfiguration::load_default().context("Default configuration is invalid"),
    }
}

fn parse_command_line_arguments() -> ArgMatches {
    Command::new("ransim")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Sandboxed ransomware simulator and canary sentinel")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true)
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::Count)
                .global(true)
                .help("Increase logging verbosity"),
        )
        .subcommand(Command::new("populate").about("Create the sandbox and fill it with dummy files"))
        .subcommand(
            Command::new("simulate")
                .about("Run a copy-only encryption simulation inside the sandbox")
                .arg(path_arg("root", "DIR", "Directory to attack (defaults to the sandbox root)"))
                .arg(
                    Arg::new("algorithm")
                        .long("algorithm")
                        .short('a')
                        .value_name("ALGORITHM")
                        .help("aes-256-gcm, chacha20-poly1305 or rsa-hybrid"),
                )
                .arg(
                    Arg::new("all-files")
                        .long("all-files")
                        .action(ArgAction::SetTrue)
                        .help("Target every regular file regardless of extension"),
                )
                .arg(
                    Arg::new("ext")
                        .long("ext")
                        .value_name("EXT")
                        .action(ArgAction::Append)
                        .help("Target extension, e.g. .txt (repeatable)"),
                )
                .arg(path_arg("note-file", "FILE", "Drop this file's text as README.txt in every directory"))
                .arg(path_arg("public-key", "PEM", "Operator RSA public key for rsa-hybrid"))
                .arg(decoy_arg().required(false))
                .arg(path_arg("output", "FILE", "Write metrics JSON here (inside the sandbox) instead of stdout")),
        )
        .subcommand(
            Command::new("keygen")
                .about("Generate an operator RSA key pair for hybrid runs")
                .arg(path_arg("out-dir", "DIR", "Directory for the PEM files (inside the sandbox)"))
                .arg(
                    Arg::new("bits")
                        .long("bits")
                        .value_name("N")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("3072")
                        .help("RSA modulus size"),
                ),
        )
        .subcommand(
            Command::new("sentinel")
                .about("Deploy canary decoys and watch them until interrupted")
                .arg(path_arg("dir", "DIR", "Deployment directory (defaults to the sandbox root)"))
                .arg(decoy_arg().required(true))
                .arg(
                    Arg::new("log-triggers")
                        .long("log-triggers")
                        .action(ArgAction::SetTrue)
                        .help("Log full details when a decoy triggers"),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Validate the effective configuration")
                .arg(
                    Arg::new("show")
                        .long("show")
                        .action(ArgAction::SetTrue)
                        .help("Print the effective configuration as TOML"),
                ),
        )
        .get_matches()
}

fn path_arg(name: &'static str, value_name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_name(value_name)
        .value_parser(clap::value_parser!(PathBuf))
        .help(help)
}

fn decoy_arg() -> Arg {
    Arg::new("decoy")
        .long("decoy")
        .value_name("NAME.EXT")
        .action(ArgAction::Append)
        .help("Decoy file to deploy (repeatable)")
}

async fn handle_cli_command(
    config: SimulatorConfiguration,
    command: (&str, &ArgMatches),
) -> AnyhowResult<()> {
    let (name, matches) = command;
    debug!("Dispatching '{}' command", name);

    match name {
        "populate" => commands::populate(&config),

        "simulate" => {
            let args = SimulateArgs {
                root: matches.get_one::<PathBuf>("root").cloned(),
                algorithm: matches.get_one::<String>("algorithm").cloned(),
                all_files: matches.get_flag("all-files"),
                extensions: strings(matches, "ext"),
                note_file: matches.get_one::<PathBuf>("note-file").cloned(),
                public_key: matches.get_one::<PathBuf>("public-key").cloned(),
                decoys: strings(matches, "decoy"),
                output: matches.get_one::<PathBuf>("output").cloned(),
            };
            commands::simulate(config, args).await
        }

        "keygen" => commands::keygen(
            &config,
            KeygenArgs {
                out_dir: matches.get_one::<PathBuf>("out-dir").cloned(),
                bits: matches.get_one::<usize>("bits").copied().unwrap_or(3072),
            },
        ),

        "sentinel" => {
            let args = SentinelArgs {
                dir: matches.get_one::<PathBuf>("dir").cloned(),
                decoys: strings(matches, "decoy"),
                log_triggers: matches.get_flag("log-triggers"),
            };
            commands::sentinel(&config, args).await
        }

        "config" => commands::show_config(&config, matches.get_flag("show")),

        other => Err(anyhow::anyhow!("Unknown command: {}", other)),
    }
}

fn strings(matches: &ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}
