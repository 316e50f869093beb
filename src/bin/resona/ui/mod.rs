//! Terminal front end
//!
//! The keyboard plays the instrument through its `Controller`; the audio
//! callback feeds samples and voice snapshots back over ring buffers.

mod spectrum;
pub mod state;
mod voices;
mod waveform;

use color_eyre::eyre::Result as EyreResult;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    DefaultTerminal, Frame,
};
use resona::{synth::Gesture, synth::ParamId, Controller, InstrumentConfig};
use rtrb::Consumer;
use std::time::{Duration, Instant};

pub use state::{UiStateUpdate, VoiceView};

use spectrum::{render_spectrum, SpectrumAnalyzer};
use voices::render_voices;
use waveform::render_waveform;

const VIS_BUFFER_SIZE: usize = 2048;

/// Home-row piano: a s d f g h j k are the white keys, w e t y u the black.
const KEY_MAP: [(char, u8); 13] = [
    ('a', 0),
    ('w', 1),
    ('s', 2),
    ('e', 3),
    ('d', 4),
    ('f', 5),
    ('t', 6),
    ('g', 7),
    ('y', 8),
    ('h', 9),
    ('u', 10),
    ('j', 11),
    ('k', 12),
];

/// Demo phrase: (milliseconds from start, note, gesture).
const DEMO: [(u64, u8, Gesture); 10] = [
    (0, 43, Gesture::Pluck),
    (400, 50, Gesture::Pluck),
    (800, 55, Gesture::Pluck),
    (1_200, 59, Gesture::Pluck),
    (1_600, 62, Gesture::Harmonic),
    (2_400, 67, Gesture::Pluck),
    (2_600, 71, Gesture::Pluck),
    (2_800, 74, Gesture::Scrape),
    (3_600, 43, Gesture::Pluck),
    (3_610, 55, Gesture::Pluck),
];

pub struct UiApp {
    controller: Controller,
    audio_rx: Consumer<f32>,
    state_rx: Consumer<UiStateUpdate>,
    current_state: UiStateUpdate,
    audio_buffer: Vec<f32>,
    analyzer: SpectrumAnalyzer,
    config: InstrumentConfig,
    gesture: Gesture,
    octave: u8,
    /// Notes currently sounding under a sustained gesture; a second press
    /// releases them.
    held: [bool; 128],
    dropped_events: usize,
    demo_start: Option<Instant>,
    demo_next: usize,
    should_quit: bool,
}

impl UiApp {
    pub fn new(
        controller: Controller,
        audio_rx: Consumer<f32>,
        state_rx: Consumer<UiStateUpdate>,
        config: InstrumentConfig,
        sample_rate: f32,
    ) -> Self {
        Self {
            controller,
            audio_rx,
            state_rx,
            current_state: UiStateUpdate::default(),
            audio_buffer: vec![0.0; VIS_BUFFER_SIZE],
            analyzer: SpectrumAnalyzer::new(VIS_BUFFER_SIZE, sample_rate),
            gesture: config.kind.default_gesture(),
            config,
            octave: 4,
            held: [false; 128],
            dropped_events: 0,
            demo_start: None,
            demo_next: 0,
            should_quit: false,
        }
    }

    pub fn start_demo(&mut self) {
        self.demo_start = Some(Instant::now());
        self.demo_next = 0;
    }

    fn advance_demo(&mut self) {
        let Some(start) = self.demo_start else {
            return;
        };
        let elapsed = start.elapsed().as_millis() as u64;
        while let Some(&(at, note, gesture)) = DEMO.get(self.demo_next) {
            if at > elapsed {
                return;
            }
            self.send(|c| c.note_on_with(note, 0.8, gesture));
            self.demo_next += 1;
        }
        self.demo_start = None;
    }

    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        while !self.should_quit {
            self.advance_demo();
            self.poll_audio();
            self.poll_state();

            terminal.draw(|frame| self.render(frame))?;

            if event::poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }

        let _ = self.controller.all_notes_off();
        Ok(())
    }

    fn poll_audio(&mut self) {
        let available = self.audio_rx.slots();
        if available == 0 {
            return;
        }
        self.audio_buffer.reserve(available);
        while let Ok(sample) = self.audio_rx.pop() {
            self.audio_buffer.push(sample);
        }
        if self.audio_buffer.len() > VIS_BUFFER_SIZE {
            let excess = self.audio_buffer.len() - VIS_BUFFER_SIZE;
            self.audio_buffer.drain(0..excess);
        }
        self.analyzer.update(&self.audio_buffer);
    }

    fn poll_state(&mut self) {
        while let Ok(state) = self.state_rx.pop() {
            self.current_state = state;
        }
    }

    fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char(' ') => {
                self.held = [false; 128];
                self.send(|c| c.all_notes_off());
            }
            KeyCode::Char('p') => self.start_demo(),
            KeyCode::Char('1') => self.gesture = Gesture::Pluck,
            KeyCode::Char('2') => self.gesture = Gesture::Bow,
            KeyCode::Char('3') => self.gesture = Gesture::Scrape,
            KeyCode::Char('4') => self.gesture = Gesture::Harmonic,
            KeyCode::Char('z') => self.octave = self.octave.saturating_sub(1).max(1),
            KeyCode::Char('x') => self.octave = (self.octave + 1).min(7),
            KeyCode::Char('[') => self.nudge(ParamId::Damping, -0.05),
            KeyCode::Char(']') => self.nudge(ParamId::Damping, 0.05),
            KeyCode::Char('-') => self.nudge(ParamId::ScaleSize, -0.25),
            KeyCode::Char('=') => self.nudge(ParamId::ScaleSize, 0.25),
            KeyCode::Char(c) => {
                if let Some(&(_, offset)) = KEY_MAP.iter().find(|(k, _)| *k == c) {
                    self.play(12 * (self.octave + 1) + offset);
                }
            }
            _ => {}
        }
    }

    fn play(&mut self, note: u8) {
        let gesture = self.gesture;
        if gesture == Gesture::Bow {
            if self.held[note as usize] {
                self.held[note as usize] = false;
                self.send(|c| c.note_off(note));
                return;
            }
            self.held[note as usize] = true;
        }
        self.send(|c| c.note_on_with(note, 0.8, gesture));
    }

    fn nudge(&mut self, id: ParamId, delta: f32) {
        let value = self.controller.param(id) + delta;
        self.controller.params().set(id, value);
    }

    fn send<E>(&mut self, push: impl FnOnce(&mut Controller) -> Result<(), E>) {
        if push(&mut self.controller).is_err() {
            self.dropped_events += 1;
            log::warn!("event queue full, {} events dropped", self.dropped_events);
        }
    }

    fn render(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),  // Status
                Constraint::Min(6),     // Voices
                Constraint::Length(8),  // Output
                Constraint::Length(10), // Spectrum
                Constraint::Length(1),  // Help
            ])
            .split(frame.area());

        self.render_status(frame, chunks[0]);
        render_voices(frame, chunks[1], &self.current_state);
        render_waveform(frame, chunks[2], &self.audio_buffer);
        render_spectrum(frame, chunks[3], self.analyzer.data());

        let help = Paragraph::new(
            " [a-k] Play  [1-4] Pluck/Bow/Scrape/Harmonic  [z/x] Octave  [ [ ] ] Damping  [-/=] Size  [P] Demo  [Space] All off  [Q] Quit",
        )
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, chunks[4]);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().title(" resona ").borders(Borders::ALL);
        let line = Line::from(vec![
            Span::styled(format!("{:?}", self.config.kind), Style::default().fg(Color::Cyan)),
            Span::raw(format!("  gesture {:?}", self.gesture)),
            Span::raw(format!("  octave {}", self.octave)),
            Span::raw(format!(
                "  damping {:.2}  size {:.2}",
                self.controller.param(ParamId::Damping),
                self.controller.param(ParamId::ScaleSize)
            )),
            Span::styled(
                format!("  bridge {:+.4}", self.current_state.bridge_motion),
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        frame.render_widget(Paragraph::new(line).block(block), area);
    }
}
