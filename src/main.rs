use std::path::PathBuf;
use std::process::ExitCode;

use deeplink_harness::{
    DeeplinkSession, HarnessConfig, RemoteDriver, Scenario, SequenceReport, SimulatedDevice,
    UiDriver,
};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: deeplink-harness <scenario.yaml> [--config <path>] [--simulate]";

struct Args {
    scenario: PathBuf,
    config: Option<PathBuf>,
    simulate: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut scenario = None;
    let mut config = None;
    let mut simulate = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--simulate" => simulate = true,
            "--config" => {
                let path = args.next().ok_or("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            other if other.starts_with("--") => return Err(format!("unknown flag {other}")),
            other => {
                if scenario.replace(PathBuf::from(other)).is_some() {
                    return Err("only one scenario file may be given".into());
                }
            }
        }
    }

    Ok(Args {
        scenario: scenario.ok_or_else(|| USAGE.to_string())?,
        config,
        simulate,
    })
}

fn main() -> ExitCode {
    let subscriber_result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
    if subscriber_result.is_err() {
        // tracing was already initialised; continue silently
    }

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(2);
        }
    };

    let config_path = args.config.clone().or_else(HarnessConfig::default_path);
    let config = match HarnessConfig::load(config_path) {
        Ok(config) => config.apply_env(),
        Err(err) => {
            eprintln!("Failed to load harness configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let scenario = match Scenario::load(&args.scenario) {
        Ok(scenario) => scenario,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    if args.simulate {
        let device = SimulatedDevice::new(&config);
        return run(&scenario, device, config);
    }

    let driver = match RemoteDriver::connect(&config.agent) {
        Ok(driver) => driver,
        Err(err) => {
            eprintln!("Failed to reach automation agent at {}: {err:#}", config.agent.url);
            return ExitCode::FAILURE;
        }
    };
    run(&scenario, driver, config)
}

fn run<D: UiDriver>(scenario: &Scenario, driver: D, config: HarnessConfig) -> ExitCode {
    let mut session = match scenario.session(driver, config) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        target = "staging",
        key = %session.descriptor().key(),
        links = scenario.links.len(),
        "running scenario"
    );
    match execute(scenario, &mut session) {
        Ok(report) => {
            print_report(&report);
            if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn execute<D: UiDriver>(
    scenario: &Scenario,
    session: &mut DeeplinkSession<D>,
) -> deeplink_harness::Result<SequenceReport> {
    for item in &scenario.cleanup {
        session.remove_element(&item.name, item.folder)?;
    }
    session.prepare_target()?;
    session.run_sequence(&scenario.links)
}

fn print_report(report: &SequenceReport) {
    for verification in &report.verifications {
        let link = &verification.link;
        if verification.is_match() {
            println!("ok   {} {} -> {}", verification.ordinal, link.name, link.target);
        } else {
            let details: Vec<String> = verification
                .mismatches
                .iter()
                .map(ToString::to_string)
                .collect();
            println!(
                "FAIL {} {} -> {}: {}",
                verification.ordinal,
                link.name,
                link.target,
                details.join("; ")
            );
        }
    }
    if report.stopped_early {
        println!("stopped after the first mismatch");
    }
}
