use dpm_detector::config::load_detect_config;
use dpm_detector::image::io::{load_image, write_json_file};
use dpm_detector::{Detector, MixtureModel};
use std::env;
use std::path::Path;

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    env_logger::init();
    let config_path = env::args().nth(1).ok_or_else(usage)?;
    let config = load_detect_config(Path::new(&config_path)).map_err(|e| e.to_string())?;

    let image = load_image(&config.input_path, config.grayscale).map_err(|e| e.to_string())?;
    let models = config
        .models
        .iter()
        .map(|p| MixtureModel::load(p))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;

    let detector = Detector::new(config.params.clone());
    let report = detector.detect_with_report(&image, &models);

    match &config.output.json_out {
        Some(path) => {
            write_json_file(path, &report).map_err(|e| e.to_string())?;
            println!(
                "Saved {} detections to {} ({:.1} ms)",
                report.detections.len(),
                path.display(),
                report.timings.total_ms
            );
        }
        None => {
            let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
            println!("{json}");
        }
    }
    Ok(())
}

fn usage() -> String {
    "Usage: dpm_detect <config.json>".to_string()
}
