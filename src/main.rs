//! Energy benchmark driver for remote Raspberry Pi targets.

use std::fs;
use std::process;

use log::{error, info, warn};
use powerbench_common::hw::{Otii, OtiiClient};
use powerbench_common::output::csv::CSVRecorder;
use powerbench_common::remote::SshConnector;
use powerbench_common::testbed::{Testbed, TrialReport};

mod input;
mod logging;
mod opts;

fn main() {
    let configuration = match opts::parse() {
        Ok(configuration) => configuration,
        Err(e) => {
            use opts::Error::*;
            match &e {
                Help(msg) => println!("{}", msg),
                _ => println!("Initialization failed.\n{}", e),
            };
            process::exit(1);
        },
    };

    if let Err(e) = logging::setup(configuration.get_log_level()) {
        println!("Failed to initialize logging.\n{}", e);
        process::exit(1);
    }

    let mut plan = match configuration.get_plan_provider().plan() {
        Ok(plan) => plan,
        Err(e) => {
            error!("Failed to read the run plan: {}", e);
            process::exit(1);
        },
    };
    if let Some(iterations) = configuration.get_iterations() {
        plan = plan.with_iterations(iterations);
    }
    if let Some(results_dir) = configuration.get_results_dir() {
        plan = plan.with_results_dir(results_dir);
    }

    let recorder = CSVRecorder::new(&plan.results_dir);

    if configuration.is_dry_run() {
        println!("{} trials:", plan.iteration_total());
        for config in &plan.configurations {
            println!("  {} -> {}", config, recorder.path_for(config).display());
        }
        return;
    }

    if let Err(e) = fs::create_dir_all(&plan.results_dir) {
        error!("Cannot create results directory '{}': {}", plan.results_dir.display(), e);
        process::exit(1);
    }

    let credentials = match input::read_credentials(configuration.get_credentials_path()) {
        Ok(credentials) => credentials,
        Err(e) => {
            error!("Failed to read credentials from '{}': {}",
                   configuration.get_credentials_path().display(), e);
            process::exit(1);
        },
    };
    info!("driver: target is {}", credentials.destination());

    let analyzer = OtiiClient::connect(&plan.analyzer.host, plan.analyzer.port)
        .and_then(|client| Otii::setup(client, &plan.analyzer));
    let analyzer = match analyzer {
        Ok(analyzer) => analyzer,
        Err(e) => {
            error!("Failed to set up the power analyzer at {}:{}: {}",
                   plan.analyzer.host, plan.analyzer.port, e);
            process::exit(1);
        },
    };

    let mut testbed = Testbed::new(
        Box::new(SshConnector::new(credentials)),
        Box::new(analyzer),
        Box::new(recorder),
        &plan.channel)
        .with_commands(plan.commands.clone())
        .with_pacing(plan.pacing);

    let reports = testbed.execute(&plan.configurations);

    println!("Results Summary:");
    for config in &plan.configurations {
        let config_reports: Vec<&TrialReport> = reports.iter()
            .filter(|r| r.config() == config)
            .collect();
        let recorded = config_reports.iter().filter(|r| r.recorded()).count();
        let abandoned = config_reports.len() - recorded;
        println!("{}: {} recorded, {} abandoned", config, recorded, abandoned);
        if abandoned > 0 {
            warn!("driver: {} iteration(s) of {} were abandoned", abandoned, config.key());
        }
    }
}
