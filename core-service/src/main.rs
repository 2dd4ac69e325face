//! Hazard Risk - Offline trainer
//!
//! Trains, evaluates and persists the ensemble for every hazard (or only the
//! hazards named on the command line) into `HAZARD_MODEL_DIR`.
//!
//! ```text
//! train-models                 # all hazards
//! train-models flood cyclone   # a subset
//! ```

use std::process::ExitCode;

use hazard_core::{HazardEngine, HazardType};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let hazards = match std::env::args()
        .skip(1)
        .map(|arg| arg.parse::<HazardType>())
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(list) if list.is_empty() => HazardType::ALL.to_vec(),
        Ok(list) => list,
        Err(e) => {
            log::error!("{}", e);
            eprintln!(
                "usage: train-models [{}]...",
                HazardType::ALL.map(|h| h.as_str()).join("|")
            );
            return ExitCode::from(2);
        }
    };

    let engine = HazardEngine::from_env();
    log::info!("Training {} hazard(s) with {:?}", hazards.len(), engine.config());

    let mut failures = 0;
    for hazard in hazards {
        match engine.retrain(hazard) {
            Ok(accuracy) => {
                println!("{:<12} ensemble accuracy {:.4}", hazard.as_str(), accuracy);
            }
            Err(e) => {
                failures += 1;
                println!("{:<12} FAILED: {}", hazard.as_str(), e);
            }
        }
    }

    for (hazard, report) in engine.get_accuracies() {
        let learners: Vec<String> = report
            .learners
            .iter()
            .map(|(kind, acc)| format!("{}={:.3}", kind, acc))
            .collect();
        println!("{:<12} {}", hazard.as_str(), learners.join(" "));
    }

    if failures > 0 {
        log::error!("{} hazard(s) failed to train", failures);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
