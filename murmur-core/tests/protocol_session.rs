use std::io::{BufRead, Cursor};
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use anyhow::bail;
use murmur_core::engine::pipeline::TranscriptionPipeline;
use murmur_core::engine::{EngineConfig, PunctuationMode};
use murmur_core::inference::{
    Capability, EngineInfo, Punctuator, RecognitionEngine, RecognitionOutput, Segmenter,
    SpeechSpan, Transcriber, TranscriptionRequest,
};
use murmur_core::{Server, ShutdownFlag, StopReason};
use serde_json::{json, Value};

#[derive(Debug, Default)]
struct Counters {
    loads: AtomicUsize,
    transcribe: AtomicUsize,
    segment: AtomicUsize,
    punctuate: AtomicUsize,
}

impl Counters {
    fn engine_calls(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
            + self.transcribe.load(Ordering::SeqCst)
            + self.segment.load(Ordering::SeqCst)
            + self.punctuate.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
enum Outcome {
    Ok(Value),
    Fail(&'static str),
    Panic,
}

#[derive(Debug, Clone)]
struct Script {
    installed: bool,
    failing_load: Option<Capability>,
    segmentation: Outcome,
    transcription: Outcome,
    punctuation: Outcome,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            installed: true,
            failing_load: None,
            segmentation: Outcome::Ok(json!([{"start_ms": 0, "end_ms": 500}])),
            transcription: Outcome::Ok(json!([{"text": "你好世界"}])),
            punctuation: Outcome::Ok(json!("你好，世界。")),
        }
    }
}

fn play(outcome: &Outcome) -> anyhow::Result<RecognitionOutput> {
    match outcome {
        Outcome::Ok(value) => Ok(RecognitionOutput::from_json(value.clone())),
        Outcome::Fail(msg) => bail!("{msg}"),
        Outcome::Panic => panic!("engine crashed"),
    }
}

struct ScriptedEngine {
    script: Script,
    counters: Arc<Counters>,
}

struct ScriptedHandle {
    script: Script,
    counters: Arc<Counters>,
}

impl Transcriber for ScriptedHandle {
    fn transcribe(&mut self, _request: &TranscriptionRequest<'_>) -> anyhow::Result<RecognitionOutput> {
        self.counters.transcribe.fetch_add(1, Ordering::SeqCst);
        play(&self.script.transcription)
    }
}

impl Segmenter for ScriptedHandle {
    fn segment(&mut self, _audio_path: &Path, _batch_window_secs: f64) -> anyhow::Result<Vec<SpeechSpan>> {
        self.counters.segment.fetch_add(1, Ordering::SeqCst);
        match &self.script.segmentation {
            Outcome::Ok(spans) => Ok(serde_json::from_value(spans.clone())?),
            Outcome::Fail(msg) => bail!("{msg}"),
            Outcome::Panic => panic!("segmenter crashed"),
        }
    }
}

impl Punctuator for ScriptedHandle {
    fn restore(&mut self, _text: &str) -> anyhow::Result<RecognitionOutput> {
        self.counters.punctuate.fetch_add(1, Ordering::SeqCst);
        play(&self.script.punctuation)
    }
}

impl ScriptedEngine {
    fn load(&self, capability: Capability) -> anyhow::Result<ScriptedHandle> {
        self.counters.loads.fetch_add(1, Ordering::SeqCst);
        if self.script.failing_load == Some(capability) {
            bail!("{capability} weights missing");
        }
        Ok(ScriptedHandle {
            script: self.script.clone(),
            counters: Arc::clone(&self.counters),
        })
    }
}

impl RecognitionEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn detect(&self) -> Option<EngineInfo> {
        self.script.installed.then(|| EngineInfo {
            version: Some("1.2.3".into()),
        })
    }

    fn load_transcriber(&mut self) -> anyhow::Result<Box<dyn Transcriber>> {
        Ok(Box::new(self.load(Capability::Transcription)?))
    }

    fn load_segmenter(&mut self) -> anyhow::Result<Box<dyn Segmenter>> {
        Ok(Box::new(self.load(Capability::Segmentation)?))
    }

    fn load_punctuator(&mut self) -> anyhow::Result<Box<dyn Punctuator>> {
        Ok(Box::new(self.load(Capability::Punctuation)?))
    }
}

fn server_with(script: Script, mode: PunctuationMode) -> (Server, Arc<Counters>, ShutdownFlag) {
    let counters = Arc::new(Counters::default());
    let engine = ScriptedEngine {
        script,
        counters: Arc::clone(&counters),
    };
    let config = EngineConfig {
        punctuation_mode: mode,
        ..EngineConfig::default()
    };
    let shutdown = ShutdownFlag::new();
    let server = Server::new(
        TranscriptionPipeline::new(config, Box::new(engine)),
        shutdown.clone(),
    );
    (server, counters, shutdown)
}

/// Feed `input` through the loop; returns parsed response lines and the stop reason.
fn session(server: &mut Server, input: &str) -> (Vec<Value>, StopReason) {
    let mut output = Vec::new();
    let reason = server
        .run(Cursor::new(input.as_bytes().to_vec()), &mut output)
        .expect("run");
    let text = String::from_utf8(output).expect("utf-8 output");
    let responses = text
        .lines()
        .map(|l| serde_json::from_str(l).expect("every output line is JSON"))
        .collect();
    (responses, reason)
}

fn audio_fixture() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("utterance.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).expect("create wav");
    for _ in 0..32_000 {
        writer.write_sample(0i16).expect("write sample");
    }
    writer.finalize().expect("finalize wav");
    (dir, path)
}

fn transcribe_line(path: &Path, options: Value) -> String {
    json!({"action": "transcribe", "audio_path": path, "options": options}).to_string()
}

#[test]
fn startup_line_reports_eager_initialization() {
    let (mut server, counters, _) = server_with(Script::default(), PunctuationMode::Engine);
    let (responses, reason) = session(&mut server, "");

    assert_eq!(reason, StopReason::EndOfInput);
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["success"], true);
    assert_eq!(counters.loads.load(Ordering::SeqCst), 3);
}

#[test]
fn punctuated_transcript_keeps_raw_text() {
    let (_dir, audio) = audio_fixture();
    let (mut server, _, _) = server_with(Script::default(), PunctuationMode::Engine);
    let input = transcribe_line(&audio, json!({"use_punc": true})) + "\n";

    let (responses, _) = session(&mut server, &input);
    let reply = &responses[1];
    assert_eq!(reply["success"], true);
    assert_eq!(reply["text"], "你好，世界。");
    assert_eq!(reply["raw_text"], "你好世界");
    assert_eq!(reply["confidence"], 0.0);
    assert_eq!(reply["language"], "zh-CN");
    assert!((reply["duration"].as_f64().unwrap() - 2.0).abs() < 1e-9);
}

#[test]
fn punctuation_failure_degrades_to_raw_text() {
    let (_dir, audio) = audio_fixture();
    let script = Script {
        punctuation: Outcome::Fail("punc model exploded"),
        ..Script::default()
    };
    let (mut server, counters, _) = server_with(script, PunctuationMode::Engine);

    let (responses, _) = session(&mut server, &(transcribe_line(&audio, json!({})) + "\n"));
    let reply = &responses[1];
    assert_eq!(reply["success"], true);
    assert_eq!(reply["text"], reply["raw_text"]);
    assert_eq!(reply["text"], "你好世界");
    assert_eq!(counters.punctuate.load(Ordering::SeqCst), 1);
}

#[test]
fn external_punctuation_mode_skips_punctuation() {
    let (_dir, audio) = audio_fixture();
    let (mut server, counters, _) = server_with(Script::default(), PunctuationMode::External);

    let input = format!(
        "{}\n{}\n",
        transcribe_line(&audio, json!({})),
        transcribe_line(&audio, json!({"use_punc": true}))
    );
    let (responses, _) = session(&mut server, &input);
    for reply in &responses[1..] {
        assert_eq!(reply["text"], "你好世界");
    }
    assert_eq!(counters.punctuate.load(Ordering::SeqCst), 0);
    assert_eq!(counters.loads.load(Ordering::SeqCst), 2);
}

#[test]
fn segmentation_can_be_switched_off_per_request() {
    let (_dir, audio) = audio_fixture();
    let (mut server, counters, _) = server_with(Script::default(), PunctuationMode::Engine);

    let input = format!(
        "{}\n{}\n",
        transcribe_line(&audio, json!({"use_vad": false})),
        transcribe_line(&audio, json!({}))
    );
    session(&mut server, &input);
    assert_eq!(counters.segment.load(Ordering::SeqCst), 1);
    assert_eq!(counters.transcribe.load(Ordering::SeqCst), 2);
}

#[test]
fn missing_audio_never_reaches_the_engine() {
    let (mut server, counters, _) = server_with(Script::default(), PunctuationMode::Engine);

    let reply = server
        .handle_line(r#"{"action":"transcribe","audio_path":"/nonexistent/murmur.wav"}"#)
        .expect("response")
        .0;
    let value = serde_json::to_value(&reply).unwrap();
    assert_eq!(value["success"], false);
    assert_eq!(value["type"], "file_not_found");
    assert_eq!(counters.engine_calls(), 0);
}

#[test]
fn transcription_failure_is_reported_with_detail() {
    let (_dir, audio) = audio_fixture();
    let script = Script {
        transcription: Outcome::Fail("CUDA out of memory"),
        ..Script::default()
    };
    let (mut server, _, _) = server_with(script, PunctuationMode::Engine);

    let (responses, _) = session(&mut server, &(transcribe_line(&audio, json!({})) + "\n"));
    let reply = &responses[1];
    assert_eq!(reply["success"], false);
    assert_eq!(reply["type"], "transcription_error");
    assert!(reply["error"].as_str().unwrap().contains("CUDA out of memory"));
    assert!(reply["traceback"].is_string());
}

#[test]
fn segmentation_failure_fails_before_transcription() {
    let (_dir, audio) = audio_fixture();
    let script = Script {
        segmentation: Outcome::Fail("vad weights corrupt"),
        ..Script::default()
    };
    let (mut server, counters, _) = server_with(script, PunctuationMode::Engine);

    let (responses, _) = session(&mut server, &(transcribe_line(&audio, json!({})) + "\n"));
    let reply = &responses[1];
    assert_eq!(reply["success"], false);
    assert_eq!(reply["type"], "transcription_error");
    assert!(reply["error"].as_str().unwrap().contains("vad weights corrupt"));
    assert_eq!(counters.segment.load(Ordering::SeqCst), 1);
    assert_eq!(counters.transcribe.load(Ordering::SeqCst), 0);
    assert_eq!(counters.punctuate.load(Ordering::SeqCst), 0);
}

#[test]
fn unreadable_duration_reports_zero() {
    let dir = tempfile::tempdir().expect("tempdir");
    let audio = dir.path().join("clip.mp3");
    std::fs::write(&audio, b"ID3 not a wav header").expect("write audio");
    let (mut server, _, _) = server_with(Script::default(), PunctuationMode::Engine);

    let (responses, _) = session(&mut server, &(transcribe_line(&audio, json!({})) + "\n"));
    let reply = &responses[1];
    assert_eq!(reply["success"], true);
    assert_eq!(reply["text"], "你好，世界。");
    assert_eq!(reply["duration"], 0.0);
}

#[test]
fn malformed_and_unknown_lines_keep_the_loop_alive() {
    let (mut server, _, _) = server_with(Script::default(), PunctuationMode::Engine);
    let input = "{not json\n\n   \n{\"action\":\"dance\"}\n{\"action\":\"status\"}\n";

    let (responses, reason) = session(&mut server, input);
    assert_eq!(reason, StopReason::EndOfInput);
    // startup + malformed + unknown + status; blank lines produce nothing
    assert_eq!(responses.len(), 4);
    assert_eq!(responses[1]["type"], "malformed_command");
    assert_eq!(responses[2]["type"], "unknown_action");
    assert_eq!(responses[3]["success"], true);
    assert_eq!(responses[3]["initialized"], true);
}

#[test]
fn non_utf8_line_is_malformed() {
    let (mut server, _, _) = server_with(Script::default(), PunctuationMode::Engine);
    let mut input = vec![0xff, 0xfe, b'\n'];
    input.extend_from_slice(b"{\"action\":\"status\"}\n");

    let mut output = Vec::new();
    server.run(Cursor::new(input), &mut output).expect("run");
    let lines: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1]["type"], "malformed_command");
    assert_eq!(lines[2]["success"], true);
}

#[test]
fn exit_stops_reading() {
    let (mut server, _, _) = server_with(Script::default(), PunctuationMode::Engine);
    let first = "{\"action\":\"exit\"}\n";
    let mut input = Cursor::new(format!("{first}{{\"action\":\"status\"}}\n").into_bytes());

    let mut output = Vec::new();
    let reason = server.run(&mut input, &mut output).expect("run");

    assert_eq!(reason, StopReason::ExitCommand);
    assert_eq!(input.position() as usize, first.len());
    let remaining = input.fill_buf().expect("fill").to_vec();
    assert_eq!(remaining, b"{\"action\":\"status\"}\n");

    let lines: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1], json!({"success": true, "message": "server exiting"}));
}

#[test]
fn shutdown_flag_stops_before_next_read() {
    let (mut server, _, shutdown) = server_with(Script::default(), PunctuationMode::Engine);
    shutdown.request();

    let (responses, reason) = session(&mut server, "{\"action\":\"status\"}\n");
    assert_eq!(reason, StopReason::Shutdown);
    assert_eq!(responses.len(), 1, "only the startup line is written");
}

#[test]
fn status_before_initialization() {
    let (mut server, counters, _) = server_with(Script::default(), PunctuationMode::Engine);

    let (reply, _) = server.handle_line(r#"{"action":"status"}"#).expect("response");
    let value = serde_json::to_value(&reply).unwrap();
    assert_eq!(
        value,
        json!({
            "success": true,
            "installed": true,
            "initialized": false,
            "state": "uninitialized",
            "version": "1.2.3",
            "models": {"asr": false, "vad": false, "punc": false}
        })
    );
    assert_eq!(counters.loads.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_engine_still_serves_status() {
    let script = Script {
        installed: false,
        ..Script::default()
    };
    let (mut server, _, _) = server_with(script, PunctuationMode::Engine);

    let (responses, _) = session(&mut server, "{\"action\":\"status\"}\n");
    assert_eq!(responses[0]["success"], false);
    assert_eq!(responses[0]["type"], "import_error");
    assert_eq!(responses[1]["success"], true);
    assert_eq!(responses[1]["installed"], false);
    assert_eq!(responses[1]["initialized"], false);
    assert_eq!(responses[1]["version"], "unknown");
}

#[test]
fn failed_startup_is_retried_by_transcribe() {
    let (_dir, audio) = audio_fixture();
    let script = Script {
        failing_load: Some(Capability::Punctuation),
        ..Script::default()
    };
    let (mut server, counters, _) = server_with(script, PunctuationMode::Engine);

    let (responses, _) = session(&mut server, &(transcribe_line(&audio, json!({})) + "\n"));
    assert_eq!(responses[0]["type"], "init_error");
    assert!(responses[0]["error"]
        .as_str()
        .unwrap()
        .contains("punctuation weights missing"));
    assert_eq!(responses[1]["type"], "init_error");
    // asr + vad + punc at startup, then only punc again on retry
    assert_eq!(counters.loads.load(Ordering::SeqCst), 4);
    assert_eq!(counters.transcribe.load(Ordering::SeqCst), 0);
}

#[test]
fn engine_panic_becomes_internal_error() {
    let (_dir, audio) = audio_fixture();
    let script = Script {
        transcription: Outcome::Panic,
        ..Script::default()
    };
    let (mut server, _, _) = server_with(script, PunctuationMode::Engine);

    let input = format!("{}\n{{\"action\":\"status\"}}\n", transcribe_line(&audio, json!({})));
    let (responses, reason) = session(&mut server, &input);
    assert_eq!(reason, StopReason::EndOfInput);
    assert_eq!(responses[1]["success"], false);
    assert_eq!(responses[1]["type"], "internal_error");
    assert_eq!(responses[1]["error"], "engine crashed");
    assert_eq!(responses[2]["success"], true);
}

#[test]
fn empty_alternatives_stringify() {
    let (_dir, audio) = audio_fixture();
    let script = Script {
        transcription: Outcome::Ok(json!([])),
        ..Script::default()
    };
    let (mut server, counters, _) = server_with(script, PunctuationMode::Engine);

    let (responses, _) = session(&mut server, &(transcribe_line(&audio, json!({})) + "\n"));
    assert_eq!(responses[1]["raw_text"], "[]");
    // "[]" is not blank, so punctuation still runs
    assert_eq!(counters.punctuate.load(Ordering::SeqCst), 1);
}

#[test]
fn blank_transcript_skips_punctuation() {
    let (_dir, audio) = audio_fixture();
    let script = Script {
        transcription: Outcome::Ok(json!([{"text": "   "}])),
        ..Script::default()
    };
    let (mut server, counters, _) = server_with(script, PunctuationMode::Engine);

    let (responses, _) = session(&mut server, &(transcribe_line(&audio, json!({})) + "\n"));
    assert_eq!(responses[1]["text"], "   ");
    assert_eq!(counters.punctuate.load(Ordering::SeqCst), 0);
}
