//! Text-to-speech with `piper-rs`, cached as WAV under `.cache/tts`.
//!
//! A dedicated worker thread owns the synthesizer and the audio output
//! (neither may cross threads). Each utterance is synthesized once per
//! model/text/rate and replayed from the cache afterwards.

use super::{SpeechEngine, SpeechError, SpeechEvent, SpeechSink, UtteranceId};
use crate::cache::{commit_temp, speech_dir, unique_temp_path};
use crate::cancellation::CancellationToken;
use crate::config::{MAX_TTS_RATE, MIN_TTS_RATE};
use anyhow::{Context, Result};
use hound::WavSpec;
use piper_rs::from_config_path;
use piper_rs::synth::{AudioOutputConfig, PiperSpeechSynthesizer};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use sha2::{Digest, Sha256};
use std::env;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

const PLAYBACK_POLL: Duration = Duration::from_millis(20);

enum Command {
    Speak {
        text: String,
        utterance: UtteranceId,
        rate: f32,
        token: CancellationToken,
    },
    LoadModel(PathBuf),
    Shutdown,
}

pub struct PiperSpeechEngine {
    commands: mpsc::Sender<Command>,
    worker: Option<JoinHandle<()>>,
    rate: f32,
    current: Option<CancellationToken>,
}

impl PiperSpeechEngine {
    pub fn new(
        model_path: PathBuf,
        espeak_path: PathBuf,
        sink: SpeechSink,
    ) -> Result<Self, SpeechError> {
        let espeak_path = sanitize_espeak_root(espeak_path);
        if env::var_os("PIPER_ESPEAKNG_DATA_DIRECTORY").is_none() {
            // Safe because we set a deterministic value before the worker starts.
            unsafe {
                env::set_var("PIPER_ESPEAKNG_DATA_DIRECTORY", &espeak_path);
            }
        }
        info!(
            model = %model_path.display(),
            espeak_root = %espeak_path.display(),
            "Initializing TTS engine"
        );

        let (commands, inbox) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("piper-tts".into())
            .spawn(move || run_worker(model_path, inbox, ready_tx, sink))
            .map_err(|err| SpeechError::Init(err.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                commands,
                worker: Some(worker),
                rate: 1.0,
                current: None,
            }),
            Ok(Err(err)) => {
                let _ = worker.join();
                Err(err)
            }
            Err(_) => {
                let _ = worker.join();
                Err(SpeechError::Init("TTS worker exited during startup".into()))
            }
        }
    }
}

impl SpeechEngine for PiperSpeechEngine {
    fn speak(&mut self, text: &str, utterance: UtteranceId) -> Result<(), SpeechError> {
        self.stop();
        let token = CancellationToken::new();
        self.current = Some(token.clone());
        self.commands
            .send(Command::Speak {
                text: text.to_string(),
                utterance,
                rate: self.rate,
                token,
            })
            .map_err(|_| SpeechError::Synthesis("TTS worker is gone".into()))
    }

    fn stop(&mut self) {
        if let Some(token) = self.current.take() {
            token.cancel();
        }
    }

    fn set_rate(&mut self, rate: f32) {
        self.rate = rate.clamp(MIN_TTS_RATE, MAX_TTS_RATE);
    }

    /// Piper voices are model files; `voice` is the path of another model.
    /// The model loads on the worker; a load failure comes back through the
    /// sink as [`SpeechEvent::VoiceRejected`] and the previous voice stays.
    fn set_voice(&mut self, voice: &str) -> Result<(), SpeechError> {
        let path = PathBuf::from(voice);
        if !resolve_piper_config(&path).exists() {
            return Err(SpeechError::UnknownVoice(voice.to_string()));
        }
        self.commands
            .send(Command::LoadModel(path))
            .map_err(|_| SpeechError::Init("TTS worker is gone".into()))
    }
}

impl Drop for PiperSpeechEngine {
    fn drop(&mut self) {
        self.stop();
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

struct Voice {
    model_path: PathBuf,
    piper: PiperSpeechSynthesizer,
}

impl Voice {
    fn load(model_path: PathBuf) -> Result<Self> {
        let config_path = resolve_piper_config(&model_path);
        if !config_path.exists() {
            anyhow::bail!(
                "Piper config not found at {} (expected from {})",
                config_path.display(),
                model_path.display()
            );
        }
        let model = from_config_path(&config_path).context("Loading Piper model")?;
        let piper = PiperSpeechSynthesizer::new(model).context("Preparing Piper synthesizer")?;
        Ok(Self { model_path, piper })
    }
}

fn run_worker(
    model_path: PathBuf,
    inbox: mpsc::Receiver<Command>,
    ready: mpsc::Sender<Result<(), SpeechError>>,
    sink: SpeechSink,
) {
    let audio = OutputStream::try_default().context("Opening audio output");
    let voice = Voice::load(model_path);
    let ((_stream, handle), mut voice) = match (audio, voice) {
        (Ok(audio), Ok(voice)) => {
            let _ = ready.send(Ok(()));
            (audio, voice)
        }
        (Err(err), _) | (_, Err(err)) => {
            let _ = ready.send(Err(SpeechError::Init(format!("{err:#}"))));
            return;
        }
    };

    while let Ok(command) = inbox.recv() {
        match command {
            Command::Speak {
                text,
                utterance,
                rate,
                token,
            } => match speak_one(&voice, &handle, &text, rate, &token) {
                Ok(true) => sink(SpeechEvent::Done(utterance)),
                Ok(false) => debug!(%utterance, "Utterance cancelled"),
                Err(err) => {
                    warn!(%utterance, "Failed to speak utterance: {err:#}");
                    if !token.is_cancelled() {
                        sink(SpeechEvent::Failed {
                            utterance: Some(utterance),
                            error: format!("{err:#}"),
                        });
                    }
                }
            },
            Command::LoadModel(path) => match Voice::load(path.clone()) {
                Ok(loaded) => {
                    info!(model = %path.display(), "Switched Piper voice");
                    voice = loaded;
                }
                Err(err) => {
                    warn!(model = %path.display(), "Failed to load Piper voice: {err:#}");
                    sink(SpeechEvent::VoiceRejected {
                        voice: path.display().to_string(),
                        error: format!("{err:#}"),
                    });
                }
            },
            Command::Shutdown => break,
        }
    }
    debug!("TTS worker stopped");
}

/// Returns `Ok(false)` when cancelled before playback finished.
fn speak_one(
    voice: &Voice,
    handle: &OutputStreamHandle,
    text: &str,
    rate: f32,
    token: &CancellationToken,
) -> Result<bool> {
    let path = cache_path(&speech_dir(), &voice.model_path, text, rate);
    if !path.exists() {
        debug!(path = %path.display(), "Synthesizing new utterance");
        synthesize_to_wav(&voice.piper, &path, text, rate)?;
    }
    if token.is_cancelled() {
        return Ok(false);
    }

    let player = Sink::try_new(handle).context("Creating sink")?;
    let reader = BufReader::new(File::open(&path).context("Opening cached audio")?);
    player.append(Decoder::new(reader).context("Decoding cached audio")?);
    player.play();
    loop {
        if token.is_cancelled() {
            player.stop();
            return Ok(false);
        }
        if player.empty() {
            return Ok(true);
        }
        token.sleep(PLAYBACK_POLL);
    }
}

fn synthesize_to_wav(
    piper: &PiperSpeechSynthesizer,
    path: &Path,
    text: &str,
    rate: f32,
) -> Result<()> {
    let output_config = if (rate - 1.0).abs() <= f32::EPSILON {
        None
    } else {
        Some(AudioOutputConfig {
            rate: Some(speed_to_rate_percent(rate)),
            volume: None,
            pitch: None,
            appended_silence_ms: None,
        })
    };

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate: Option<u32> = None;
    let mut channels: Option<u16> = None;
    for chunk in piper.synthesize_lazy(text.to_string(), output_config)? {
        let chunk = chunk?;
        if sample_rate.is_none() {
            sample_rate = Some(chunk.info.sample_rate as u32);
            channels = Some(chunk.info.num_channels as u16);
        }
        samples.extend_from_slice(chunk.samples.as_slice());
    }
    if samples.is_empty() {
        anyhow::bail!("No speech data to write");
    }

    write_wav(
        path,
        sample_rate.unwrap_or(22050),
        channels.unwrap_or(1),
        &samples,
    )
}

fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[f32]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Creating TTS cache directory")?;
    }
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let temp_path = unique_temp_path(path);
    let mut writer = hound::WavWriter::create(&temp_path, spec)?;
    for &s in samples {
        let clamped = (s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        writer.write_sample(clamped)?;
    }
    writer.finalize()?;
    commit_temp(&temp_path, path)?;
    Ok(())
}

fn cache_path(base: &Path, model_path: &Path, text: &str, rate: f32) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(model_path.as_os_str().to_string_lossy().as_bytes());
    hasher.update(text.as_bytes());
    hasher.update(rate.to_le_bytes());
    let hash = format!("{:x}", hasher.finalize());
    base.join(format!("tts-{hash}.wav"))
}

/// Piper expects the parent directory that contains `espeak-ng-data/phonindex`.
/// Users often point directly at `.../espeak-ng-data`; trim that suffix.
fn sanitize_espeak_root(path: PathBuf) -> PathBuf {
    if path
        .file_name()
        .map(|n| n == "espeak-ng-data")
        .unwrap_or(false)
    {
        if let Some(parent) = path.parent() {
            debug!(
                original = %path.display(),
                sanitized = %parent.display(),
                "Trimming espeak-ng-data suffix"
            );
            return parent.to_path_buf();
        }
    }
    path
}

fn resolve_piper_config(model_path: &Path) -> PathBuf {
    if model_path
        .extension()
        .map(|ext| ext == "onnx")
        .unwrap_or(false)
    {
        return model_path.with_extension("onnx.json");
    }
    model_path.to_path_buf()
}

/// Map a playback rate onto piper's 0-100 rate percentage.
fn speed_to_rate_percent(speed: f32) -> u8 {
    let clamped = speed.clamp(0.5, 5.5);
    let percent = ((clamped - 0.5) / 5.0) * 100.0;
    percent.round().clamp(0.0, 100.0) as u8
}
