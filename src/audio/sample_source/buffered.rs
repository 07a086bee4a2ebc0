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
// Buffered SampleSource used for music playback. Renders ahead on a shared
// Rayon thread pool into a ring buffer so the audio callback never runs the
// synthesizer itself.
//

use std::cmp;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use rayon::ThreadPoolBuilder;
use tracing::warn;

use super::error::SampleSourceError;
use super::traits::{prepare_output, SampleSource};

/// Frames pulled from the inner source per fill step.
const FILL_CHUNK_FRAMES: usize = 1024;

/// Worker threads that render music ahead of playback. One pool is shared by
/// every read-ahead source and by background cache renders.
pub struct BufferFillPool {
    pool: rayon::ThreadPool,
}

impl BufferFillPool {
    /// Creates a pool with at least one worker.
    pub fn new(num_threads: usize) -> Result<Self, String> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads.max(1))
            .thread_name(|i| format!("retrosound-buffer-fill-{i}"))
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self { pool })
    }

    /// Spawns a one-shot job on the pool.
    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(job);
    }
}

/// Ring of interleaved frames shared between the fill task and the reader.
struct BufferState {
    data: Vec<f32>,
    read_index: usize,
    write_index: usize,
    len_frames: usize,
    /// Set at end of stream or on a render error.
    finished: bool,
    /// At most one fill task runs per buffer.
    refill_in_progress: bool,
}

impl BufferState {
    fn push_frames(&mut self, chunk: &[Vec<f32>], frames: usize, capacity_frames: usize) {
        let channels = chunk.len();
        for frame in 0..frames {
            let base = self.write_index * channels;
            for (ch, samples) in chunk.iter().enumerate() {
                self.data[base + ch] = samples[frame];
            }
            self.write_index = (self.write_index + 1) % capacity_frames;
        }
        self.len_frames += frames;
    }
}

struct BufferInner {
    state: Mutex<BufferState>,
    condvar: Condvar,
}

type SharedSource = Arc<Mutex<Box<dyn SampleSource>>>;

/// Read-ahead wrapper for any SampleSource. The audio callback only reads
/// from the ring buffer; all rendering runs on the BufferFillPool workers.
pub struct BufferedSampleSource {
    inner: SharedSource,
    buffer: Arc<BufferInner>,
    pool: Arc<BufferFillPool>,
    channels: u16,
    sample_rate: u32,
    duration: Option<Duration>,
    capacity_frames: usize,
    refill_threshold_frames: usize,
    warmup_min_frames: usize,
    cancelled: Arc<AtomicBool>,
}

impl BufferedSampleSource {
    /// Wraps a source and blocks until one device buffer of frames, or the
    /// whole source if it is shorter, has been rendered. The ring holds four
    /// device buffers.
    pub fn new(
        inner: Box<dyn SampleSource>,
        pool: Arc<BufferFillPool>,
        device_buffer_frames: usize,
    ) -> Self {
        let channels = inner.channel_count();
        let sample_rate = inner.sample_rate();
        let duration = inner.duration();
        let capacity_frames = cmp::max(device_buffer_frames * 4, device_buffer_frames.max(1));
        let warmup_min_frames = device_buffer_frames.max(1);
        let refill_threshold_frames = capacity_frames / 2;

        let buffer = Arc::new(BufferInner {
            state: Mutex::new(BufferState {
                data: vec![0.0; capacity_frames * channels as usize],
                read_index: 0,
                write_index: 0,
                len_frames: 0,
                finished: false,
                refill_in_progress: true,
            }),
            condvar: Condvar::new(),
        });

        let this = Self {
            inner: Arc::new(Mutex::new(inner)),
            buffer,
            pool,
            channels,
            sample_rate,
            duration,
            capacity_frames,
            refill_threshold_frames,
            warmup_min_frames,
            cancelled: Arc::new(AtomicBool::new(false)),
        };

        this.spawn_fill_task();

        // Runs on the game thread, never the audio callback.
        {
            let mut state = this.buffer.state.lock();
            while !state.finished && state.len_frames < warmup_min_frames {
                this.buffer.condvar.wait(&mut state);
            }
        }

        this
    }

    fn spawn_refill_if_needed(&self) {
        let should_spawn = {
            let mut state = self.buffer.state.lock();
            if !state.finished
                && !state.refill_in_progress
                && state.len_frames <= self.refill_threshold_frames
            {
                state.refill_in_progress = true;
                true
            } else {
                false
            }
        };

        if should_spawn {
            self.spawn_fill_task();
        }
    }

    fn spawn_fill_task(&self) {
        let inner = self.inner.clone();
        let buffer = self.buffer.clone();
        let cancelled = self.cancelled.clone();
        let channels = self.channels as usize;
        let capacity_frames = self.capacity_frames;
        let warmup_min_frames = self.warmup_min_frames;

        self.pool.spawn(move || {
            let mut chunk = vec![Vec::with_capacity(FILL_CHUNK_FRAMES); channels];

            loop {
                // The source stays locked until the frames are queued so an
                // underrun read or a rewind can't overtake them.
                let mut source = inner.lock();
                if cancelled.load(Ordering::Relaxed) {
                    break;
                }

                let frames_to_fill = {
                    let state = buffer.state.lock();
                    if state.finished {
                        0
                    } else {
                        cmp::min(
                            FILL_CHUNK_FRAMES,
                            capacity_frames.saturating_sub(state.len_frames),
                        )
                    }
                };
                if frames_to_fill == 0 {
                    break;
                }

                // Pull from the inner source with no lock held on the buffer.
                let result = source.next_chunk(&mut chunk, frames_to_fill);

                let mut state = buffer.state.lock();
                match result {
                    Ok(0) => {
                        state.finished = true;
                    }
                    Ok(frames) => {
                        state.push_frames(&chunk, frames, capacity_frames);
                    }
                    Err(e) => {
                        warn!(err = %e, "Read-ahead source failed");
                        state.finished = true;
                    }
                }
                if state.finished || state.len_frames >= warmup_min_frames {
                    buffer.condvar.notify_all();
                }
            }

            let mut state = buffer.state.lock();
            state.refill_in_progress = false;
            buffer.condvar.notify_all();
        });
    }

    /// True once the inner source is exhausted and everything buffered has
    /// been read.
    pub fn is_drained(&self) -> bool {
        let state = self.buffer.state.lock();
        state.finished && state.len_frames == 0
    }
}

impl SampleSource for BufferedSampleSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        prepare_output(output, self.channels)?;

        let channels = self.channels as usize;
        let frames;
        {
            let mut state = self.buffer.state.lock();

            if state.len_frames == 0 && !state.finished {
                // Ring buffer underrun: defer to the underlying source rather
                // than treating this as end of stream. This only happens when
                // the prefetch falls behind.
                drop(state);
                let mut inner = self.inner.lock();
                state = self.buffer.state.lock();
                if state.len_frames == 0 && !state.finished {
                    drop(state);
                    let result = inner.next_chunk(output, max_frames);
                    if !matches!(result, Ok(n) if n > 0) {
                        self.buffer.state.lock().finished = true;
                    }
                    return result;
                }
            }
            if state.len_frames == 0 {
                return Ok(0);
            }

            frames = cmp::min(max_frames, state.len_frames);
            for _ in 0..frames {
                let base = state.read_index * channels;
                for (ch, out_ch) in output.iter_mut().enumerate() {
                    out_ch.push(state.data[base + ch]);
                }
                state.read_index = (state.read_index + 1) % self.capacity_frames;
            }
            state.len_frames -= frames;
        }

        self.spawn_refill_if_needed();
        Ok(frames)
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Rewinds the inner source and starts filling the ring again from the
    /// beginning. Fill tasks from before the rewind are cancelled.
    fn rewind(&mut self) -> Result<bool, SampleSourceError> {
        self.cancelled.store(true, Ordering::Relaxed);
        self.cancelled = Arc::new(AtomicBool::new(false));
        {
            let mut inner = self.inner.lock();
            if !inner.rewind()? {
                return Ok(false);
            }
            let mut state = self.buffer.state.lock();
            state.read_index = 0;
            state.write_index = 0;
            state.len_frames = 0;
            state.finished = false;
            state.refill_in_progress = true;
        }
        self.spawn_fill_task();
        Ok(true)
    }
}

impl Drop for BufferedSampleSource {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sample_source::MemorySampleSource;

    fn ramp(frames: usize) -> Vec<f32> {
        (0..frames)
            .flat_map(|i| [i as f32, -(i as f32)])
            .collect()
    }

    #[test]
    fn test_buffered_matches_inner() {
        let pool = Arc::new(BufferFillPool::new(1).unwrap());
        let inner = MemorySampleSource::new(ramp(5000), 2, 44100);
        let mut source = BufferedSampleSource::new(Box::new(inner), pool, 256);
        assert_eq!(source.channel_count(), 2);
        assert_eq!(source.sample_rate(), 44100);

        let mut output = vec![Vec::new(), Vec::new()];
        let mut left = Vec::new();
        let mut right = Vec::new();
        loop {
            let frames = source.next_chunk(&mut output, 300).unwrap();
            if frames == 0 {
                break;
            }
            left.extend_from_slice(&output[0]);
            right.extend_from_slice(&output[1]);
        }

        assert_eq!(left.len(), 5000);
        assert!(left.iter().enumerate().all(|(i, s)| *s == i as f32));
        assert!(right.iter().enumerate().all(|(i, s)| *s == -(i as f32)));
        assert!(source.is_drained());
    }

    #[test]
    fn test_short_source_finishes_warmup() {
        let pool = Arc::new(BufferFillPool::new(1).unwrap());
        let inner = MemorySampleSource::new(ramp(10), 2, 44100);
        let mut source = BufferedSampleSource::new(Box::new(inner), pool, 1024);

        let mut output = vec![Vec::new(), Vec::new()];
        assert_eq!(source.next_chunk(&mut output, 1024).unwrap(), 10);
        assert_eq!(source.next_chunk(&mut output, 1024).unwrap(), 0);
    }

    #[test]
    fn test_rewind_replays_from_start() {
        let pool = Arc::new(BufferFillPool::new(1).unwrap());
        let inner = MemorySampleSource::new(ramp(3000), 2, 44100);
        let mut source = BufferedSampleSource::new(Box::new(inner), pool, 256);

        let mut output = vec![Vec::new(), Vec::new()];
        assert_eq!(source.next_chunk(&mut output, 500).unwrap(), 500);
        assert_eq!(output[0][499], 499.0);

        assert!(source.rewind().unwrap());
        let mut left = Vec::new();
        loop {
            let frames = source.next_chunk(&mut output, 700).unwrap();
            if frames == 0 {
                break;
            }
            left.extend_from_slice(&output[0]);
        }
        assert_eq!(left.len(), 3000);
        assert!(left.iter().enumerate().all(|(i, s)| *s == i as f32));
    }
}
