//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;

use log::{info, warn};

use crate::config::LofiConfig;
use crate::dsp::{LofiPipeline, LofiSettings, NormalizedParameters, Preset};
use crate::engine::{export_audio, import_audio, AudioAnalysis, ExportFormat};
use crate::error::Result;
use crate::service::{ExtractRequest, LofiService, ProcessRequest};

/// Warn about values that will be clamped
fn check_settings(settings: &LofiSettings) {
    if let Err(e) = settings.validate() {
        warn!("{} (the value will be clamped)", e);
    }
}

/// Convert a WAV file in place on this thread.
pub fn process_file(
    input: &Path,
    output: &Path,
    settings: &LofiSettings,
    bit_depth: u16,
) -> Result<()> {
    info!("Processing {} -> {}", input.display(), output.display());
    check_settings(settings);
    let format = ExportFormat::new(bit_depth)?;

    let buffer = import_audio(input)?;
    let input_secs = buffer.duration_secs();

    let processed = LofiPipeline::new().process(buffer, settings)?;
    export_audio(&processed, output, format)?;

    println!("Processed: {}", output.display());
    println!(
        "Duration: {:.2}s -> {:.2}s",
        input_secs,
        processed.duration_secs()
    );

    Ok(())
}

/// Store source audio as an upload.
pub fn extract(locator: &str, config: Option<&Path>) -> Result<()> {
    let config = LofiConfig::resolve(config)?;
    let service = LofiService::from_config(&config)?;

    let response = service.extract(&ExtractRequest {
        youtube_url: locator.to_string(),
    })?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Process a stored upload through the service.
pub fn render(audio_url: &str, settings: &LofiSettings, config: Option<&Path>) -> Result<()> {
    check_settings(settings);
    let config = LofiConfig::resolve(config)?;
    let service = LofiService::from_config(&config)?;

    let response = service.process_blocking(&ProcessRequest {
        audio_url: audio_url.to_string(),
        settings: Some(*settings),
    })?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Print normalized parameters and the stages they enable.
pub fn show_params(settings: &LofiSettings) -> Result<()> {
    check_settings(settings);
    let params = NormalizedParameters::from_settings(settings);

    println!("{}", serde_json::to_string_pretty(&params)?);
    println!(
        "Active stages: {}",
        LofiPipeline::new().active_stages(&params).join(", ")
    );
    Ok(())
}

/// List presets.
pub fn list_presets() -> Result<()> {
    println!("Presets:");
    for preset in Preset::ALL {
        let s = preset.settings();
        let marker = if s == LofiSettings::default() {
            " (default)"
        } else {
            ""
        };
        println!(
            "  {:<6} {:<14} {}{}",
            preset.name(),
            preset.description(),
            s,
            marker
        );
    }
    Ok(())
}

/// Print an analysis summary of a WAV file.
pub fn analyze(path: &Path) -> Result<()> {
    info!("Analyzing {}", path.display());
    let buffer = import_audio(path)?;
    let analysis = AudioAnalysis::analyze(&buffer);

    println!("{}", path.display());
    println!("{}", analysis.summary());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::generate_test_tone;
    use tempfile::tempdir;

    #[test]
    fn test_process_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.wav");

        let tone = generate_test_tone(440.0, 0.5, 22050);
        export_audio(&tone, &input, ExportFormat::cd_quality()).unwrap();

        let settings = LofiSettings {
            tempo: 80,
            ..LofiSettings::identity()
        };
        process_file(&input, &output, &settings, 24).unwrap();

        let processed = import_audio(&output).unwrap();
        assert_eq!(processed.sample_rate, 22050);
        assert_eq!(processed.len(), (tone.len() as f64 / 0.8).round() as usize);
    }

    #[test]
    fn test_process_file_bad_bit_depth() {
        let dir = tempdir().unwrap();
        let result = process_file(
            &dir.path().join("in.wav"),
            &dir.path().join("out.wav"),
            &LofiSettings::default(),
            12,
        );
        assert!(result.is_err());
    }
}
