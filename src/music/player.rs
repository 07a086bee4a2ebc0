// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::{Receiver, TryRecvError};
use rustysynth::SoundFont;
use tracing::{debug, info, span, warn, Level};

use super::{Decoder, FormatError};
use crate::assets::AssetStore;
use crate::audio::sample_source::{
    BufferFillPool, BufferedSampleSource, PcmStreamSource, SampleSourceError, WavSampleSource,
};
use crate::audio::{PlaybackSink, SinkState};
use crate::config::{self, MAX_VOLUME};
use crate::playsync::CancelHandle;
use crate::stream::{PcmStream, StreamError};
use crate::synth::{self, SynthError, Synthesizer};

/// Lump name prefix of music tracks.
pub const MUSIC_PREFIX: &str = "D_";

/// Frames rendered ahead of the output in streaming mode.
const READ_AHEAD_FRAMES: usize = 4096;

/// Bytes pulled from the stream per step of a background render.
const RENDER_CHUNK_BYTES: usize = 64 * 1024;

/// Errors raised while starting or rendering music.
#[derive(Debug, thiserror::Error)]
pub enum MusicError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Synth(#[from] SynthError),

    #[error(transparent)]
    Source(#[from] SampleSourceError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("unable to create the read-ahead pool: {0}")]
    Pool(String),

    #[error("unable to write {path}: {err}")]
    Cache { path: PathBuf, err: std::io::Error },

    #[error("render cancelled")]
    Cancelled,
}

/// A boxed synthesizer the player can hand to a worker thread.
pub type BoxedSynthesizer = Box<dyn Synthesizer + Send>;

/// Creates a fresh synthesizer for each track.
pub type SynthFactory = Arc<dyn Fn() -> Result<BoxedSynthesizer, SynthError> + Send + Sync>;

/// A factory producing SoundFont synthesizers sharing one loaded SoundFont.
pub fn soundfont_factory(soundfont: Arc<SoundFont>, effects: bool) -> SynthFactory {
    Arc::new(move || {
        let synth: BoxedSynthesizer = Box::new(synth::create(&soundfont, effects)?);
        Ok(synth)
    })
}

/// The name of the lump holding a track.
pub fn lump_name(track: &str) -> String {
    format!("{MUSIC_PREFIX}{}", track.to_uppercase())
}

/// Renders a whole track, without looping, to a WAV file. Returns the number
/// of PCM data bytes written.
pub fn render_to_file<S: Synthesizer>(
    synth: S,
    data: Arc<[u8]>,
    path: &Path,
    cancel: Option<&CancelHandle>,
) -> Result<u64, MusicError> {
    let span = span!(Level::INFO, "render track");
    let _enter = span.enter();

    let decoder = Decoder::new(data, false)?;
    let format = decoder.format();
    let mut stream = PcmStream::new(synth, decoder);
    let mut chunk = vec![0u8; RENDER_CHUNK_BYTES];
    loop {
        if cancel.is_some_and(CancelHandle::is_cancelled) {
            return Err(MusicError::Cancelled);
        }
        if stream.read_bytes(&mut chunk)? == 0 {
            break;
        }
    }

    fs::write(path, stream.bytes()).map_err(|err| MusicError::Cache {
        path: path.to_path_buf(),
        err,
    })?;
    let data_bytes = stream.total_len().unwrap_or(0).saturating_sub(44);
    info!(path = ?path, format = %format, bytes = data_bytes, "Rendered track");
    Ok(data_bytes)
}

/// A background render on its way into the cache.
struct PendingRender {
    generation: u64,
    path: PathBuf,
    cancel_handle: CancelHandle,
    receiver: Receiver<(u64, Result<u64, MusicError>)>,
}

/// Plays one music track at a time through a sink.
pub struct MusicPlayer {
    assets: Arc<dyn AssetStore>,
    sink: Box<dyn PlaybackSink>,
    synth_factory: SynthFactory,
    pool: Arc<BufferFillPool>,
    cache: Option<PathBuf>,
    current: Option<String>,
    volume: u8,
    generation: u64,
    pending: Option<PendingRender>,
}

impl MusicPlayer {
    pub fn new(
        assets: Arc<dyn AssetStore>,
        sink: Box<dyn PlaybackSink>,
        synth_factory: SynthFactory,
        config: &config::Audio,
    ) -> Result<MusicPlayer, MusicError> {
        let pool = BufferFillPool::new(config.buffer_threads()).map_err(MusicError::Pool)?;
        let mut player = MusicPlayer {
            assets,
            sink,
            synth_factory,
            pool: Arc::new(pool),
            cache: config.music_cache().map(Path::to_path_buf),
            current: None,
            volume: config.music_volume(),
            generation: 0,
            pending: None,
        };
        player.apply_volume();
        Ok(player)
    }

    /// Starts a track. Starting the track that is already playing does
    /// nothing. Missing tracks are skipped.
    pub fn start_music(&mut self, track: &str, looping: bool) -> Result<(), MusicError> {
        let track = track.to_uppercase();
        if self.current.as_deref() == Some(track.as_str()) {
            return Ok(());
        }
        self.stop_music();

        let lump = lump_name(&track);
        let Some(data) = self.assets.read(&lump) else {
            debug!(lump, "Music track missing, skipping");
            return Ok(());
        };

        let span = span!(Level::INFO, "start music");
        let _enter = span.enter();

        match self.cache.clone() {
            Some(cache) => self.start_cached(&cache, &lump, data, looping)?,
            None => self.start_streaming(data, looping)?,
        }
        self.current = Some(track);
        info!(lump, looping, "Music started");
        Ok(())
    }

    fn start_streaming(&mut self, data: Arc<[u8]>, looping: bool) -> Result<(), MusicError> {
        let decoder = Decoder::new(data, looping)?;
        let synth = (self.synth_factory)()?;
        let source = PcmStreamSource::new(PcmStream::new(synth, decoder))?;
        let source = BufferedSampleSource::new(Box::new(source), self.pool.clone(), READ_AHEAD_FRAMES);

        self.sink.set_looping(false);
        self.sink.set_source(Some(Box::new(source)));
        self.sink.play();
        Ok(())
    }

    fn start_cached(
        &mut self,
        cache: &Path,
        lump: &str,
        data: Arc<[u8]>,
        looping: bool,
    ) -> Result<(), MusicError> {
        let path = cache.join(format!("{lump}.wav"));
        self.sink.set_looping(looping);

        if path.exists() {
            debug!(path = ?path, "Playing cached track");
            let source = self.cached_source(&path)?;
            self.sink.set_source(Some(Box::new(source)));
            self.sink.play();
            return Ok(());
        }

        // Surface format errors now rather than from the worker.
        Decoder::new(data.clone(), false)?;

        // Playback starts once the render lands.
        self.sink.play();

        let generation = self.generation;
        let cancel_handle = CancelHandle::new();
        let (sender, receiver) = crossbeam_channel::bounded(1);
        {
            let factory = self.synth_factory.clone();
            let cancel_handle = cancel_handle.clone();
            let path = path.clone();
            self.pool.spawn(move || {
                let result = render_cached(&factory, data, &path, &cancel_handle);
                let _ = sender.send((generation, result));
            });
        }

        self.pending = Some(PendingRender {
            generation,
            path,
            cancel_handle,
            receiver,
        });
        Ok(())
    }

    /// Opens a cached render behind the read-ahead buffer so the file is
    /// never read on the audio thread.
    fn cached_source(&self, path: &Path) -> Result<BufferedSampleSource, MusicError> {
        let source = WavSampleSource::from_file(path)?;
        Ok(BufferedSampleSource::new(
            Box::new(source),
            self.pool.clone(),
            READ_AHEAD_FRAMES,
        ))
    }

    /// Gives up on the current track after its render failed, so that it can
    /// be started again.
    fn abandon_render(&mut self) {
        self.sink.stop();
        self.current = None;
    }

    /// Swaps in a finished background render. Call once per tick.
    pub fn update(&mut self) {
        let Some(pending) = self.pending.as_ref() else {
            return;
        };

        let (generation, result) = match pending.receiver.try_recv() {
            Ok(message) => message,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => {
                warn!("Music render worker went away");
                self.pending = None;
                self.abandon_render();
                return;
            }
        };
        let Some(pending) = self.pending.take() else {
            return;
        };

        if generation != self.generation || pending.cancel_handle.is_cancelled() {
            debug!(generation, "Ignoring stale music render");
            return;
        }

        match result.and_then(|_| self.cached_source(&pending.path)) {
            Ok(source) => {
                debug!(path = ?pending.path, "Cached track ready");
                self.sink.set_source(Some(Box::new(source)));
            }
            Err(e) => {
                warn!(err = %e, path = ?pending.path, "Unable to render music");
                self.abandon_render();
            }
        }
    }

    /// Stops the current track and abandons any render in flight.
    pub fn stop_music(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel_handle.cancel();
        }
        self.generation += 1;
        self.sink.stop();
        self.current = None;
    }

    /// The track currently playing, upper-cased.
    pub fn current_track(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// The state of the music sink.
    pub fn state(&self) -> SinkState {
        self.sink.state()
    }

    /// True while a background render is outstanding.
    pub fn is_rendering(&self) -> bool {
        self.pending.is_some()
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Sets the music volume on the 0-15 scale.
    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(MAX_VOLUME);
        self.apply_volume();
    }

    pub fn max_volume(&self) -> u8 {
        MAX_VOLUME
    }

    fn apply_volume(&mut self) {
        self.sink
            .set_volume(f32::from(self.volume) / f32::from(MAX_VOLUME));
    }
}

impl Drop for MusicPlayer {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel_handle.cancel();
        }
    }
}

/// Renders into a temporary file next to the cache entry, then moves it into
/// place so a half-written file is never picked up.
fn render_cached(
    factory: &SynthFactory,
    data: Arc<[u8]>,
    path: &Path,
    cancel_handle: &CancelHandle,
) -> Result<u64, MusicError> {
    let partial = path.with_extension("wav.partial");
    let synth = factory()?;
    let result = render_to_file(synth, data, &partial, Some(cancel_handle));
    match result {
        Ok(bytes) => {
            fs::rename(&partial, path).map_err(|err| MusicError::Cache {
                path: path.to_path_buf(),
                err,
            })?;
            Ok(bytes)
        }
        Err(e) => {
            let _ = fs::remove_file(&partial);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::assets::MemoryAssets;
    use crate::audio::mock::Sink;
    use crate::synth::mock::RecordingSynthesizer;
    use crate::testutil::{eventually, score_of_ticks, write_wav};

    fn factory() -> SynthFactory {
        Arc::new(|| {
            let synth: BoxedSynthesizer = Box::new(RecordingSynthesizer::new().with_levels(0.5, 0.5));
            Ok(synth)
        })
    }

    fn assets() -> Arc<MemoryAssets> {
        let mut assets = MemoryAssets::new();
        assets.insert("D_E1M1", score_of_ticks(14));
        assets.insert("D_E1M2", score_of_ticks(28));
        assets.insert("D_BROKEN", b"OggS not music".to_vec());
        Arc::new(assets)
    }

    fn player(config: &config::Audio) -> (MusicPlayer, Sink) {
        let sink = Sink::new();
        let player =
            MusicPlayer::new(assets(), Box::new(sink.clone()), factory(), config).unwrap();
        (player, sink)
    }

    fn wait_for_state(player: &mut MusicPlayer, sink: &Sink, state: SinkState) {
        for _ in 0..1000 {
            player.update();
            if sink.state() == state {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("sink never reached {state}");
    }

    #[test]
    fn test_lump_name() {
        assert_eq!(lump_name("e1m1"), "D_E1M1");
    }

    #[test]
    fn test_streaming_start_is_idempotent() {
        let (mut player, sink) = player(&config::Audio::default());
        player.start_music("e1m1", true).unwrap();
        assert_eq!(player.current_track(), Some("E1M1"));

        let snapshot = sink.snapshot();
        assert_eq!(snapshot.state, SinkState::Playing);
        assert_eq!(snapshot.source_rate, Some(44100));
        assert!(!snapshot.looping);
        assert_eq!(snapshot.plays, 1);

        player.start_music("E1M1", true).unwrap();
        assert_eq!(sink.snapshot().plays, 1);

        player.start_music("e1m2", false).unwrap();
        let snapshot = sink.snapshot();
        assert_eq!(snapshot.stops, 1);
        assert_eq!(snapshot.plays, 2);
        assert_eq!(player.current_track(), Some("E1M2"));
    }

    #[test]
    fn test_missing_track_is_skipped() {
        let (mut player, sink) = player(&config::Audio::default());
        player.start_music("e1m1", false).unwrap();
        player.start_music("e9m9", false).unwrap();
        assert_eq!(player.current_track(), None);
        assert_eq!(sink.snapshot().state, SinkState::Stopped);
    }

    #[test]
    fn test_unknown_format() {
        let (mut player, sink) = player(&config::Audio::default());
        assert!(matches!(
            player.start_music("broken", false),
            Err(MusicError::Format(FormatError::UnknownFormat))
        ));
        assert_eq!(player.current_track(), None);
        assert_eq!(sink.snapshot().plays, 0);
    }

    #[test]
    fn test_stop_and_volume() {
        let (mut player, sink) = player(&config::Audio::default());
        assert!((sink.snapshot().volume - 8.0 / 15.0).abs() < 1e-6);

        player.set_volume(40);
        assert_eq!(player.volume(), 15);
        assert_eq!(player.max_volume(), 15);
        assert_eq!(sink.snapshot().volume, 1.0);

        player.start_music("e1m1", true).unwrap();
        player.stop_music();
        assert_eq!(sink.snapshot().state, SinkState::Stopped);
        assert_eq!(player.current_track(), None);
    }

    #[test]
    fn test_cached_render_swaps_in() {
        let dir = tempfile::tempdir().unwrap();
        let config = config::Audio::default().with_music_cache(dir.path());
        let (mut player, sink) = player(&config);

        player.start_music("e1m1", true).unwrap();
        assert!(player.is_rendering());
        let snapshot = sink.snapshot();
        assert!(snapshot.looping);
        assert!(!snapshot.has_source);
        assert_eq!(snapshot.state, SinkState::Opening);

        // The render lands on disk without help, but only update() swaps it in.
        let path = dir.path().join("D_E1M1.wav");
        eventually(|| path.exists(), "cached render never landed");
        assert_eq!(sink.snapshot().state, SinkState::Opening);

        wait_for_state(&mut player, &sink, SinkState::Playing);
        assert!(!player.is_rendering());
        assert_eq!(sink.snapshot().source_rate, Some(44100));

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.duration() as usize, 14 * crate::synth::BLOCK_LENGTH);
        assert!(!dir.path().join("D_E1M1.wav.partial").exists());
    }

    #[test]
    fn test_failed_render_stops_and_allows_retry() {
        let dir = tempfile::tempdir().unwrap();
        let config = config::Audio::default().with_music_cache(&dir.path().join("missing"));
        let (mut player, sink) = player(&config);

        player.start_music("e1m1", false).unwrap();
        assert_eq!(sink.snapshot().state, SinkState::Opening);

        wait_for_state(&mut player, &sink, SinkState::Stopped);
        assert!(!player.is_rendering());
        assert_eq!(player.current_track(), None);
        assert!(player.state().is_finished());

        player.start_music("e1m1", false).unwrap();
        assert_eq!(player.current_track(), Some("E1M1"));
        assert!(player.is_rendering());
        assert_eq!(sink.snapshot().plays, 2);
    }

    #[test]
    fn test_cached_file_plays_immediately() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("D_E1M2.wav"), &[0, 0, 100, 100], 2, 22050).unwrap();
        let config = config::Audio::default().with_music_cache(dir.path());
        let (mut player, sink) = player(&config);

        player.start_music("e1m2", false).unwrap();
        assert!(!player.is_rendering());
        let snapshot = sink.snapshot();
        assert_eq!(snapshot.state, SinkState::Playing);
        assert_eq!(snapshot.source_rate, Some(22050));
    }

    #[test]
    fn test_stale_render_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("D_E1M2.wav"), &[0, 0, 100, 100], 2, 22050).unwrap();
        let config = config::Audio::default().with_music_cache(dir.path());
        let (mut player, sink) = player(&config);

        player.start_music("e1m1", false).unwrap();
        player.start_music("e1m2", false).unwrap();
        assert!(!player.is_rendering());

        for _ in 0..20 {
            player.update();
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(sink.snapshot().source_rate, Some(22050));
        assert_eq!(player.current_track(), Some("E1M2"));
    }

    #[test]
    fn test_render_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let bytes = render_to_file(
            RecordingSynthesizer::new(),
            Arc::from(score_of_ticks(140)),
            &path,
            None,
        )
        .unwrap();
        assert_eq!(bytes, 176400);
        assert_eq!(fs::metadata(&path).unwrap().len(), 176444);
    }

    #[test]
    fn test_cancelled_render() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let cancel_handle = CancelHandle::new();
        cancel_handle.cancel();
        let result = render_to_file(
            RecordingSynthesizer::new(),
            Arc::from(score_of_ticks(140)),
            &path,
            Some(&cancel_handle),
        );
        assert!(matches!(result, Err(MusicError::Cancelled)));
        assert!(!path.exists());
    }
}
