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
use std::time::Duration;

/// Formats a duration as minutes, seconds and hundredths, e.g. `1:05.20`.
/// Sound effects are usually well under a second, so the fraction matters.
pub fn duration_display(duration: Duration) -> String {
    let hundredths = duration.as_millis() / 10;
    let minutes = hundredths / 6000;
    let seconds = (hundredths / 100) % 60;
    format!("{}:{:02}.{:02}", minutes, seconds, hundredths % 100)
}

/// Duration of interleaved 16 bit PCM data.
pub fn pcm_duration(data_bytes: u64, channels: u16, sample_rate: u32) -> Duration {
    let bytes_per_second = u64::from(channels) * 2 * u64::from(sample_rate);
    if bytes_per_second == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(data_bytes as f64 / bytes_per_second as f64)
}
