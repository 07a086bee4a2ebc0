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
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use retrosound::assets::{AssetStore, DirectoryAssets};
use retrosound::audio::cpal::Output;
use retrosound::config::{self, Audio};
use retrosound::music::player::{self, MusicPlayer};
use retrosound::sound::SoundLibrary;
use retrosound::synth;
use retrosound::util::{duration_display, pcm_duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Game music and sound effect playback."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the sound effects found in a lump directory.
    Sounds {
        /// The directory of extracted lumps.
        assets: String,
    },
    /// Writes every sound effect in a lump directory out as a WAV file.
    ExportSounds {
        /// The directory of extracted lumps.
        assets: String,
        /// The directory to write WAV files to.
        out_dir: String,
    },
    /// Renders a music track to a WAV file.
    Render {
        /// The path to the audio config.
        config: String,
        /// The track to render, e.g. e1m1.
        track: String,
        /// The WAV file to write.
        output: String,
    },
    /// Plays a music track through the default output device.
    Play {
        /// The path to the audio config.
        config: String,
        /// The track to play, e.g. e1m1.
        track: String,
        /// Loop the track until interrupted.
        #[arg(short, long = "loop")]
        looping: bool,
    },
}

fn asset_store(config: &Audio) -> Result<Arc<dyn AssetStore>, Box<dyn Error>> {
    let path = config
        .assets()
        .ok_or("the config does not name an assets directory")?;
    Ok(Arc::new(DirectoryAssets::new(path)?))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sounds { assets } => {
            let store = DirectoryAssets::new(Path::new(&assets))?;
            let library = SoundLibrary::load_all(&store);

            if library.is_empty() {
                println!("No sounds found in {}.", assets);
                return Ok(());
            }

            println!("Sounds (count: {}):", library.len());
            for (_, asset) in library.iter() {
                println!(
                    "- {} ({}Hz, {}, amplitude {:.2})",
                    asset.name(),
                    asset.sample_rate(),
                    duration_display(asset.duration()),
                    asset.amplitude()
                );
            }
        }
        Commands::ExportSounds { assets, out_dir } => {
            let store = DirectoryAssets::new(Path::new(&assets))?;
            let library = SoundLibrary::load_all(&store);
            let out_dir = PathBuf::from(out_dir);
            fs::create_dir_all(&out_dir)?;

            for (_, asset) in library.iter() {
                let path = out_dir.join(format!("{}.wav", asset.name().to_lowercase()));
                asset.save_wav(&path)?;
                println!("- {}", path.display());
            }
            println!("Exported {} sounds.", library.len());
        }
        Commands::Render {
            config,
            track,
            output,
        } => {
            let config = config::load(Path::new(&config))?;
            let store = asset_store(&config)?;
            let lump = player::lump_name(&track);
            let data = store
                .read(&lump)
                .ok_or_else(|| format!("track {} not found", lump))?;

            let soundfont = synth::load_soundfont(&config.soundfont()?)?;
            let synthesizer = synth::create(&soundfont, config.music_effects())?;
            let bytes = player::render_to_file(synthesizer, data, Path::new(&output), None)?;

            println!(
                "Rendered {} to {} ({})",
                lump,
                output,
                duration_display(pcm_duration(bytes, 2, synth::SAMPLE_RATE))
            );
        }
        Commands::Play {
            config,
            track,
            looping,
        } => {
            let config = config::load(Path::new(&config))?;
            let store = asset_store(&config)?;
            let soundfont = synth::load_soundfont(&config.soundfont()?)?;

            let output = Output::open(config.sample_rate())?;
            info!(output = %output, "Audio output ready");

            let mut music = MusicPlayer::new(
                store,
                Box::new(output.mixer().create_sink()),
                player::soundfont_factory(soundfont, config.music_effects()),
                &config,
            )?;
            music.start_music(&track, looping)?;
            if music.current_track().is_none() {
                return Err(format!("track {} not found", player::lump_name(&track)).into());
            }

            let mut interval = tokio::time::interval(Duration::from_millis(10));
            loop {
                interval.tick().await;
                music.update();
                if music.state().is_finished() {
                    break;
                }
            }
            info!(track, state = %music.state(), "Playback finished");
        }
    }

    Ok(())
}
