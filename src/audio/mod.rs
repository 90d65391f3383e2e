pub mod chime;

use chime::Chime;

use anyhow::{anyhow, bail, Context, Result};
use rodio::{Decoder, OutputStream, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;

use crate::log_error;

const ENABLE_LOGS: bool = true;

/// Fire-and-forget alarm playback. An error means the sound could not even be
/// prepared (unknown id, unsupported file); callers log it and carry on.
pub trait AlarmPlayer: Send + Sync {
    fn play(&self, sound_id: &str, volume: f32) -> Result<()>;

    /// Cuts off whatever is ringing and releases the output device.
    fn stop(&self) {}
}

type AlarmSource = Box<dyn Source<Item = f32> + Send>;

enum AudioCommand {
    Play { source: AlarmSource, volume: f32 },
    Stop,
}

/// Plays alarms through the default output device on a dedicated thread,
/// which owns the non-`Send` output stream. A new alarm cuts off the one
/// still ringing.
pub struct RodioAlarmPlayer {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
    sounds_dir: Option<PathBuf>,
}

impl RodioAlarmPlayer {
    /// Sound ids that are not built-in tones are looked up as files under
    /// `sounds_dir`, or as plain paths when it is `None`.
    pub fn new(sounds_dir: Option<PathBuf>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
            sounds_dir,
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|_| anyhow!("audio sender lock poisoned"))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();

        thread::Builder::new()
            .name("audio-alarm".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                fn open_sink(stream: &mut Option<OutputStream>) -> Result<Sink, String> {
                    let (s, handle) = OutputStream::try_default()
                        .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                    let new_sink = Sink::try_new(&handle)
                        .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                    *stream = Some(s);
                    Ok(new_sink)
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Play { source, volume } => {
                            if let Some(old) = sink.take() {
                                old.stop();
                            }
                            match open_sink(&mut _stream) {
                                Ok(new_sink) => {
                                    new_sink.set_volume(volume.clamp(0.0, 1.0));
                                    new_sink.append(source);
                                    sink = Some(new_sink);
                                }
                                Err(err) => log_error!("Alarm playback failed: {err}"),
                            }
                        }
                        AudioCommand::Stop => {
                            if let Some(old) = sink.take() {
                                old.stop();
                            }
                            _stream = None;
                        }
                    }
                }
            })
            .context("failed to spawn audio thread")?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    fn source_for(&self, sound_id: &str) -> Result<AlarmSource> {
        if let Some(chime) = Chime::builtin(sound_id) {
            return Ok(Box::new(chime));
        }

        let path = match &self.sounds_dir {
            Some(dir) => dir.join(sound_id),
            None => PathBuf::from(sound_id),
        };
        if path.is_file() {
            return decode_file(&path);
        }

        // Older settings stored paths such as "sounds/alarm1.mp3".
        let stem = Path::new(sound_id)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        if let Some(chime) = Chime::builtin(stem) {
            return Ok(Box::new(chime));
        }

        bail!("unknown alarm sound '{sound_id}'")
    }
}

fn decode_file(path: &Path) -> Result<AlarmSource> {
    let file = File::open(path)
        .with_context(|| format!("failed to open alarm sound {}", path.display()))?;
    let decoder = Decoder::new(BufReader::new(file))
        .with_context(|| format!("unsupported alarm sound {}", path.display()))?;
    Ok(Box::new(decoder.convert_samples::<f32>()))
}

impl AlarmPlayer for RodioAlarmPlayer {
    fn play(&self, sound_id: &str, volume: f32) -> Result<()> {
        let source = self.source_for(sound_id)?;
        let tx = self.ensure_thread()?;
        tx.send(AudioCommand::Play { source, volume })
            .map_err(|e| anyhow!("audio thread is gone: {e}"))
    }

    fn stop(&self) {
        if let Ok(Some(tx)) = self.tx.lock().map(|g| g.clone()) {
            let _ = tx.send(AudioCommand::Stop);
        }
    }
}
