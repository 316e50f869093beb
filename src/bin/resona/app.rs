//! Audio device setup and the audio/UI thread split

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use rtrb::RingBuffer;

use resona::{Instrument, InstrumentConfig};

use super::ui::{UiApp, UiStateUpdate, VoiceView};

/// Samples buffered for the oscilloscope and spectrum.
const AUDIO_QUEUE: usize = 16_384;
/// Voice-state snapshots buffered for the UI.
const STATE_QUEUE: usize = 64;

pub struct Resona {
    config: InstrumentConfig,
    demo: bool,
}

impl Resona {
    pub fn new(config: InstrumentConfig) -> Self {
        Self {
            config,
            demo: false,
        }
    }

    /// Play the demo phrase as soon as the UI is up.
    pub fn demo(mut self, enabled: bool) -> Self {
        self.demo = enabled;
        self
    }

    /// Open the default output device, start the stream and hand the
    /// terminal to the UI until the user quits.
    pub fn run(self) -> EyreResult<()> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| eyre!("no default output device available"))?;
        let stream_config = device
            .default_output_config()
            .wrap_err("failed to fetch default output config")?;

        let sample_rate = stream_config.sample_rate().0 as f32;
        let channels = stream_config.channels() as usize;

        let config = self.config.with_sample_rate(sample_rate);
        let (controller, mut instrument) = Instrument::new(config);
        log::info!("output: {sample_rate} Hz, {channels} channels");

        let (mut audio_tx, audio_rx) = RingBuffer::<f32>::new(AUDIO_QUEUE);
        let (mut state_tx, state_rx) = RingBuffer::<UiStateUpdate>::new(STATE_QUEUE);

        let stream = device.build_output_stream(
            &stream_config.into(),
            move |data: &mut [f32], _| {
                instrument.process_interleaved(data, channels);

                // Scope taps the first channel; drop samples if the UI lags.
                for frame in data.chunks_exact(channels) {
                    if audio_tx.push(frame[0]).is_err() {
                        break;
                    }
                }

                let mut update = UiStateUpdate::default();
                let pool = instrument.voices();
                for (view, voice) in update.voices.iter_mut().zip(pool.voices()) {
                    *view = VoiceView {
                        note: voice.note(),
                        state: voice.state(),
                        articulation: voice.articulation_state(),
                        energy: voice.energy(),
                    };
                }
                update.voice_count = pool.capacity() as u8;
                update.active = pool.active_voice_count() as u8;
                update.bridge_motion = pool.bridge_motion();
                let _ = state_tx.push(update);
            },
            |err| log::error!("audio stream error: {err}"),
            None,
        )?;

        stream.play()?;

        let mut terminal = ratatui::init();
        let mut ui = UiApp::new(controller, audio_rx, state_rx, config, sample_rate);
        if self.demo {
            ui.start_demo();
        }
        let result = ui.run(&mut terminal);
        ratatui::restore();

        result
    }
}
