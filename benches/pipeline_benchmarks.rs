//! Pipeline Benchmarks
//!
//! Throughput of each stage and of the full chain on ten seconds of audio.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lofi::dsp::{
    BitCrush, Denoise, Echo, EchoParams, LofiPipeline, Lowpass, Preset, TimeStretch,
};
use lofi::engine::generate_test_tone;

fn benchmark_time_stretch(c: &mut Criterion) {
    let buffer = generate_test_tone(440.0, 10.0, 44100);
    let stretcher = TimeStretch::default();

    c.bench_function("time_stretch_0.85_10s", |b| {
        b.iter(|| stretcher.stretch(black_box(buffer.clone()), 0.85).unwrap())
    });
}

fn benchmark_lowpass(c: &mut Criterion) {
    let buffer = generate_test_tone(440.0, 10.0, 44100);
    let lowpass = Lowpass::default();

    c.bench_function("lowpass_14k_10s", |b| {
        b.iter(|| lowpass.filter(black_box(buffer.clone()), 14000.0).unwrap())
    });
}

fn benchmark_echo(c: &mut Criterion) {
    let buffer = generate_test_tone(440.0, 10.0, 44100);
    let params = EchoParams::default();

    c.bench_function("echo_two_taps_10s", |b| {
        b.iter(|| Echo.render(black_box(buffer.clone()), &params).unwrap())
    });
}

fn benchmark_denoise(c: &mut Criterion) {
    let buffer = generate_test_tone(440.0, 10.0, 44100);
    let denoise = Denoise::default();

    c.bench_function("denoise_10s", |b| {
        b.iter(|| denoise.gate(black_box(buffer.clone()), -20.0).unwrap())
    });
}

fn benchmark_bitcrush(c: &mut Criterion) {
    let buffer = generate_test_tone(440.0, 10.0, 44100);
    let crush = BitCrush;

    c.bench_function("bitcrush_8k_10s", |b| {
        b.iter(|| crush.crush(black_box(buffer.clone()), 8000).unwrap())
    });
}

fn benchmark_full_chain(c: &mut Criterion) {
    let buffer = generate_test_tone(440.0, 10.0, 44100);
    let pipeline = LofiPipeline::new();
    let chill = Preset::Chill.settings();

    let mut group = c.benchmark_group("full_chain");
    group.sample_size(10);
    group.bench_function("chill_10s", |b| {
        b.iter(|| pipeline.process(black_box(buffer.clone()), &chill).unwrap())
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_time_stretch,
    benchmark_lowpass,
    benchmark_echo,
    benchmark_denoise,
    benchmark_bitcrush,
    benchmark_full_chain
);
criterion_main!(benches);
