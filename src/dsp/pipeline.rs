//! Pipeline orchestrator
//!
//! Runs the stages in their fixed order:
//! 1. Time-Stretch
//! 2. Lowpass
//! 3. Echo
//! 4. Denoise
//! 5. Bit-Reduction
//!
//! Settings are normalized once per invocation. Inactive stages are skipped
//! and the buffer moves on untouched. Every stage output is checked before
//! it is handed on; the first failure aborts the run.

use std::time::Instant;

use log::{debug, info, log_enabled, Level};

use crate::dsp::bitcrush::BitCrush;
use crate::dsp::denoise::Denoise;
use crate::dsp::echo::Echo;
use crate::dsp::lowpass::Lowpass;
use crate::dsp::settings::{LofiSettings, NormalizedParameters};
use crate::dsp::stage::Stage;
use crate::dsp::time_stretch::TimeStretch;
use crate::engine::AudioBuffer;
use crate::error::{LofiError, Result};

/// Ordered collection of stages
pub struct LofiPipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Default for LofiPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl LofiPipeline {
    /// Pipeline with the five standard stages
    pub fn new() -> Self {
        Self::with_stages(vec![
            Box::new(TimeStretch::default()),
            Box::new(Lowpass::default()),
            Box::new(Echo),
            Box::new(Denoise::default()),
            Box::new(BitCrush),
        ])
    }

    /// Pipeline from custom stages, sorted into chain order
    pub fn with_stages(mut stages: Vec<Box<dyn Stage>>) -> Self {
        stages.sort_by_key(|s| s.position());
        Self { stages }
    }

    /// Stage names in execution order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Names of the stages that would run for `params`
    pub fn active_stages(&self, params: &NormalizedParameters) -> Vec<&'static str> {
        self.stages
            .iter()
            .filter(|s| s.is_active(params))
            .map(|s| s.name())
            .collect()
    }

    /// Transform `buffer` according to `settings`
    ///
    /// # Errors
    /// * `UnsupportedBuffer` - if the input violates the buffer invariants
    /// * `StageFailure` - if a stage fails or produces an invalid buffer
    pub fn process(&self, buffer: AudioBuffer, settings: &LofiSettings) -> Result<AudioBuffer> {
        self.process_until(buffer, settings, || false)
    }

    /// Like `process`, but checks `is_cancelled` before each stage
    ///
    /// # Errors
    /// `Cancelled` as soon as the predicate returns true; the partial buffer
    /// is dropped.
    pub fn process_until<F>(
        &self,
        buffer: AudioBuffer,
        settings: &LofiSettings,
        is_cancelled: F,
    ) -> Result<AudioBuffer>
    where
        F: Fn() -> bool,
    {
        buffer.validate()?;

        let params = NormalizedParameters::from_settings(settings);
        info!(
            "Processing {:.2}s, {} ch @ {} Hz with {}",
            buffer.duration_secs(),
            buffer.channels(),
            buffer.sample_rate,
            params.settings
        );
        if log_enabled!(Level::Debug) {
            debug!("Active stages: {:?}", self.active_stages(&params));
        }

        let started = Instant::now();
        let mut current = buffer;

        for stage in &self.stages {
            if is_cancelled() {
                info!("Processing cancelled before {}", stage.name());
                return Err(LofiError::Cancelled);
            }

            if !stage.is_active(&params) {
                debug!("{}: skipped", stage.name());
                continue;
            }

            let stage_start = Instant::now();
            current = stage.apply(current, &params)?;
            check_output(stage.name(), &current)?;

            debug!(
                "{}: {} samples in {:.1} ms",
                stage.name(),
                current.len(),
                stage_start.elapsed().as_secs_f64() * 1000.0
            );
        }

        info!(
            "Processed to {:.2}s in {:.1} ms",
            current.duration_secs(),
            started.elapsed().as_secs_f64() * 1000.0
        );

        Ok(current)
    }
}

/// Reject a stage output that is not a valid, finite buffer
fn check_output(stage: &str, buffer: &AudioBuffer) -> Result<()> {
    buffer
        .validate()
        .map_err(|e| LofiError::stage(stage, format!("produced an invalid buffer: {}", e)))?;

    if !buffer.is_finite() {
        return Err(LofiError::stage(stage, "produced non-finite samples"));
    }

    Ok(())
}

/// Run the standard pipeline once
pub fn process(buffer: AudioBuffer, settings: &LofiSettings) -> Result<AudioBuffer> {
    LofiPipeline::new().process(buffer, settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::stage::StagePosition;
    use crate::engine::io::generate_test_tone;
    use std::cell::Cell;

    /// Stage that always emits NaN
    struct Poison;

    impl Stage for Poison {
        fn position(&self) -> StagePosition {
            StagePosition::Lowpass
        }

        fn is_active(&self, _params: &NormalizedParameters) -> bool {
            true
        }

        fn apply(&self, mut buffer: AudioBuffer, _params: &NormalizedParameters) -> Result<AudioBuffer> {
            buffer.samples[0][0] = f32::NAN;
            Ok(buffer)
        }
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(
            LofiPipeline::new().stage_names(),
            ["time_stretch", "lowpass", "echo", "denoise", "bit_reduction"]
        );

        let shuffled = LofiPipeline::with_stages(vec![
            Box::new(BitCrush),
            Box::new(Echo),
            Box::new(TimeStretch::default()),
        ]);
        assert_eq!(
            shuffled.stage_names(),
            ["time_stretch", "echo", "bit_reduction"]
        );
    }

    #[test]
    fn test_active_stages() {
        let pipeline = LofiPipeline::new();
        let identity = NormalizedParameters::from_settings(&LofiSettings::identity());
        assert!(pipeline.active_stages(&identity).is_empty());

        let chill = NormalizedParameters::from_settings(&LofiSettings::default());
        assert_eq!(pipeline.active_stages(&chill).len(), 5);
    }

    #[test]
    fn test_process_with_debug_logging() {
        let _ = env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::Debug)
            .try_init();

        let buffer = generate_test_tone(440.0, 0.2, 22050);
        let settings = LofiSettings {
            tempo: 100,
            filter: 40,
            ..LofiSettings::identity()
        };
        let out = LofiPipeline::new().process(buffer.clone(), &settings).unwrap();
        assert_eq!(out.len(), buffer.len());
        assert_ne!(out, buffer);
    }

    #[test]
    fn test_identity_settings() {
        let buffer = generate_test_tone(440.0, 0.5, 44100);
        let out = process(buffer.clone(), &LofiSettings::identity()).unwrap();
        assert_eq!(out, buffer);
    }

    #[test]
    fn test_rejects_invalid_buffer() {
        let empty = AudioBuffer::new(1, 0, 44100);
        let err = process(empty, &LofiSettings::default()).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_BUFFER");

        let no_rate = AudioBuffer::new(1, 100, 0);
        assert!(matches!(
            process(no_rate, &LofiSettings::identity()),
            Err(LofiError::UnsupportedBuffer { .. })
        ));
    }

    #[test]
    fn test_non_finite_output_is_stage_failure() {
        let pipeline = LofiPipeline::with_stages(vec![Box::new(Poison)]);
        let buffer = generate_test_tone(440.0, 0.1, 44100);
        let err = pipeline.process(buffer, &LofiSettings::identity()).unwrap_err();
        match err {
            LofiError::StageFailure { stage, .. } => assert_eq!(stage, "lowpass"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cancellation_between_stages() {
        let checks = Cell::new(0);
        let settings = LofiSettings {
            tempo: 100,
            reverb: 50,
            filter: 50,
            noise: 0,
            bitcrusher: 0,
        };
        let buffer = generate_test_tone(440.0, 0.1, 44100);

        let result = LofiPipeline::new().process_until(buffer, &settings, || {
            checks.set(checks.get() + 1);
            checks.get() > 2
        });

        assert!(matches!(result, Err(LofiError::Cancelled)));
        assert_eq!(checks.get(), 3);
    }
}
