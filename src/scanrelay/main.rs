// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{io::Read, process::ExitCode, str::FromStr};

use scanrelay::{
    config::Config,
    scan::{Runner, ScanStrategy},
};

fn command() -> clap::Command {
    Config::command()
        .about("Runs the scan request read from stdin and delivers its report.")
        .arg(
            clap::Arg::new("strategy")
                .short('s')
                .long("strategy")
                .env("SCANRELAY_STRATEGY")
                .default_value("lightweight")
                .value_parser(ScanStrategy::from_str)
                .help("lightweight (discovery and lookup) or heavyweight (full backend scan)"),
        )
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = command().get_matches();
    let config = match Config::from_matches(&matches) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::from(2);
        }
    };
    config.log.init();
    tracing::debug!("using configuration:\n{config}");
    let strategy = matches
        .get_one::<ScanStrategy>("strategy")
        .copied()
        .unwrap_or_default();

    let runner = match Runner::from_config(&config) {
        Ok(runner) => runner,
        Err(error) => {
            tracing::error!(%error, "Unable to start");
            return ExitCode::from(2);
        }
    };
    let mut input = String::new();
    if let Err(error) = std::io::stdin().read_to_string(&mut input) {
        tracing::error!(%error, "Unable to read request from stdin");
        return ExitCode::from(2);
    }

    match runner.handle(strategy, &input).await {
        Ok(response) => {
            match strategy {
                ScanStrategy::Lightweight => match serde_json::to_string_pretty(&response) {
                    Ok(json) => println!("{json}"),
                    Err(error) => tracing::warn!(%error, "Unable to print response"),
                },
                ScanStrategy::Heavyweight => println!(
                    "scan {} completed with {} findings",
                    response.scan_id, response.findings_found
                ),
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            match strategy {
                ScanStrategy::Lightweight => println!(
                    "{}",
                    serde_json::json!({"success": false, "error": error.to_string()})
                ),
                ScanStrategy::Heavyweight => println!("scan failed: {error}"),
            }
            ExitCode::FAILURE
        }
    }
}
