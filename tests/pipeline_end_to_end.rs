//! End-to-end tests: synthetic audio through a block source, the stream
//! drivers and an emitter, checked at the payload level.

use std::f64::consts::PI;
use std::net::UdpSocket;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use trillcast::audio::{BlockSource, MockBlockSource, WavBlockSource};
use trillcast::config::Config;
use trillcast::detect::{PitchTracker, TrillDetector};
use trillcast::pipeline::{
    CollectorEmitter, Mode, Output, PipelineSpec, build_pipelines, decode_pitch, decode_trill,
    finish, start_pipelines,
};

const SR: u32 = 44100;
const TRILL_BLOCK: usize = 17640;

fn tone(freq: f64, amplitude: f64, frames: usize) -> Vec<f32> {
    (0..frames)
        .map(|i| (amplitude * (2.0 * PI * freq * i as f64 / SR as f64).sin()) as f32)
        .collect()
}

fn modulated(carrier: f64, mod_hz: f64, offset: f64, depth: f64, frames: usize) -> Vec<f32> {
    (0..frames)
        .map(|i| {
            let t = i as f64 / SR as f64;
            let amp = offset + depth * (2.0 * PI * mod_hz * t).sin();
            (amp * (2.0 * PI * carrier * t).sin()) as f32
        })
        .collect()
}

/// Run one pitch pipeline over `source` and return its payloads.
fn pitch_payloads(source: &mut dyn BlockSource, config: &Config) -> Vec<String> {
    let emitter = CollectorEmitter::new();
    let payloads = emitter.payloads();
    let specs = vec![PipelineSpec {
        detector: Box::new(PitchTracker::new(&config.pitch, source.sample_rate())),
        emitter: Box::new(emitter),
    }];
    let handles = start_pipelines(source, specs).unwrap();
    finish(handles).unwrap();
    source.stop().unwrap();
    collected(&payloads)
}

/// Run one trill pipeline over `source` and return its payloads.
fn trill_payloads(source: &mut dyn BlockSource, config: &Config) -> Vec<String> {
    let emitter = CollectorEmitter::new();
    let payloads = emitter.payloads();
    let specs = vec![PipelineSpec {
        detector: Box::new(TrillDetector::new(&config.trill, source.sample_rate()).unwrap()),
        emitter: Box::new(emitter),
    }];
    let handles = start_pipelines(source, specs).unwrap();
    finish(handles).unwrap();
    source.stop().unwrap();
    collected(&payloads)
}

fn collected(payloads: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    payloads.lock().unwrap().clone()
}

#[test]
fn test_a4_tone_converges_to_zero_payload() {
    let config = Config::default();
    let mut source = MockBlockSource::new(SR, 1, tone(440.0, 0.5, 512 * 40));

    let payloads = pitch_payloads(&mut source, &config);

    assert!(payloads.len() >= 30, "only {} payloads", payloads.len());
    assert_eq!(payloads.last().map(String::as_str), Some("0.00"));
    for payload in &payloads {
        let value = decode_pitch(payload).unwrap();
        assert!(value.abs() < 0.01, "payload {}", payload);
    }
}

#[test]
fn test_octave_above_reference_reads_twelve() {
    let config = Config::default();
    let mut source = MockBlockSource::new(SR, 1, tone(880.0, 0.5, 512 * 20));

    let payloads = pitch_payloads(&mut source, &config);
    assert_eq!(payloads.last().map(String::as_str), Some("12.00"));
}

#[test]
fn test_silence_produces_no_pitch_payloads() {
    let config = Config::default();
    let mut source = MockBlockSource::new(SR, 1, vec![0.0; 512 * 20]);

    assert!(pitch_payloads(&mut source, &config).is_empty());
}

#[test]
fn test_out_of_range_tone_produces_no_pitch_payloads() {
    let config = Config::default();
    // Above the 1568 Hz ceiling
    let mut source = MockBlockSource::new(SR, 1, tone(2000.0, 0.5, 512 * 20));

    assert!(pitch_payloads(&mut source, &config).is_empty());
}

#[test]
fn test_trill_emits_once_per_block() {
    let config = Config::default();
    let blocks = 5;
    let mut source = MockBlockSource::new(
        SR,
        1,
        modulated(440.0, 20.0, 0.5, 0.25, TRILL_BLOCK * blocks),
    )
    .with_period(441);

    let payloads = trill_payloads(&mut source, &config);

    assert_eq!(payloads.len(), blocks);
    assert!(payloads[1..].iter().all(|p| p == "1"), "{:?}", payloads);
}

#[test]
fn test_constant_tone_is_never_trilling() {
    let config = Config::default();
    let mut source = MockBlockSource::new(SR, 1, tone(440.0, 0.5, TRILL_BLOCK * 4));

    let payloads = trill_payloads(&mut source, &config);

    assert_eq!(payloads.len(), 4);
    assert!(payloads.iter().all(|p| !decode_trill(p).unwrap()));
}

#[test]
fn test_trailing_partial_block_still_emits_not_trilling() {
    let config = Config::default();
    let mut source = MockBlockSource::new(
        SR,
        1,
        modulated(440.0, 20.0, 0.5, 0.25, TRILL_BLOCK * 2 + 1000),
    );

    let payloads = trill_payloads(&mut source, &config);

    // Two full blocks plus the underflowing tail, which is malformed
    assert_eq!(payloads.len(), 3);
    assert_eq!(payloads[2], "0");
}

#[test]
fn test_one_source_feeds_both_pipelines() {
    let config = Config::default();
    let samples = modulated(440.0, 20.0, 0.5, 0.25, TRILL_BLOCK * 3);
    let mut source = MockBlockSource::new(SR, 1, samples);

    let pitch = CollectorEmitter::new();
    let pitch_out = pitch.payloads();
    let trill = CollectorEmitter::new();
    let trill_out = trill.payloads();
    let specs = vec![
        PipelineSpec {
            detector: Box::new(PitchTracker::new(&config.pitch, SR)),
            emitter: Box::new(pitch),
        },
        PipelineSpec {
            detector: Box::new(TrillDetector::new(&config.trill, SR).unwrap()),
            emitter: Box::new(trill),
        },
    ];
    let handles = start_pipelines(&mut source, specs).unwrap();
    let stats = finish(handles).unwrap();
    source.stop().unwrap();

    assert_eq!(stats[0].pipeline, "pitch");
    assert_eq!(stats[1].pipeline, "trill");
    assert_eq!(stats[1].blocks, 3);
    assert_eq!(collected(&trill_out).len(), 3);

    // Amplitude modulation does not move the pitch
    let pitch_payloads = collected(&pitch_out);
    assert!(!pitch_payloads.is_empty());
    let last = decode_pitch(pitch_payloads.last().unwrap()).unwrap();
    assert!(last.abs() < 0.05, "pitch drifted to {}", last);
}

#[test]
fn test_stereo_capture_is_handled_per_detector() {
    let config = Config::default();
    let mono = tone(440.0, 0.5, 512 * 20);
    let stereo: Vec<f32> = mono.iter().flat_map(|&s| [s, s]).collect();
    let mut source = MockBlockSource::new(SR, 2, stereo);

    let payloads = pitch_payloads(&mut source, &config);
    assert_eq!(payloads.last().map(String::as_str), Some("0.00"));
}

#[test]
fn test_stream_failure_ends_the_session_with_an_error() {
    let config = Config::default();
    let mut source = MockBlockSource::new(SR, 1, tone(440.0, 0.5, 512 * 4))
        .with_stream_failure("audio device is no longer available");
    let specs = vec![PipelineSpec {
        detector: Box::new(PitchTracker::new(&config.pitch, SR)),
        emitter: Box::new(CollectorEmitter::new()),
    }];

    let handles = start_pipelines(&mut source, specs).unwrap();
    let err = finish(handles).unwrap_err();
    source.stop().unwrap();

    assert!(
        err.to_string().contains("audio device is no longer available"),
        "{}",
        err
    );
}

#[test]
fn test_udp_datagrams_reach_configured_ports() {
    let pitch_rx = UdpSocket::bind("127.0.0.1:0").unwrap();
    let trill_rx = UdpSocket::bind("127.0.0.1:0").unwrap();
    for socket in [&pitch_rx, &trill_rx] {
        socket
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
    }

    let mut config = Config::default();
    config.emitter.host = "127.0.0.1".to_string();
    config.emitter.pitch_port = pitch_rx.local_addr().unwrap().port();
    config.emitter.trill_port = trill_rx.local_addr().unwrap().port();

    let mut source = MockBlockSource::new(SR, 1, tone(440.0, 0.5, TRILL_BLOCK));
    let specs = build_pipelines(&config, Mode::Both, Output::Udp, SR).unwrap();
    let handles = start_pipelines(&mut source, specs).unwrap();
    finish(handles).unwrap();
    source.stop().unwrap();

    let mut buf = [0u8; 64];
    let (len, _) = pitch_rx.recv_from(&mut buf).unwrap();
    let pitch = std::str::from_utf8(&buf[..len]).unwrap();
    assert!(decode_pitch(pitch).unwrap().abs() < 0.01, "{}", pitch);

    let (len, _) = trill_rx.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..len], b"0");
}

#[test]
fn test_wav_file_replays_through_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a4.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SR,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for s in tone(440.0, 0.5, 512 * 30) {
        writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();

    let config = Config::default();
    let mut source = WavBlockSource::open(&path).unwrap();
    source.require_sample_rate(config.audio.sample_rate).unwrap();

    let payloads = pitch_payloads(&mut source, &config);
    assert_eq!(payloads.last().map(String::as_str), Some("0.00"));
}
