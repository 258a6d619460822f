use dpm_detector::config::load_train_config;
use dpm_detector::diagnostics::LogSink;
use dpm_detector::Trainer;
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
    let config = load_train_config(Path::new(&config_path)).map_err(|e| e.to_string())?;

    let trainer = Trainer::new(config.params.clone(), &config.workdir);
    let model = trainer
        .train(&config.training_data(), &mut LogSink)
        .map_err(|e| e.to_string())?;

    println!(
        "Trained {} components; model saved to {}",
        model.len(),
        trainer.workdir().join("model").display()
    );
    Ok(())
}

fn usage() -> String {
    "Usage: dpm_train <config.json>".to_string()
}
