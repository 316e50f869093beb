//! Voice pool panel: one row per slot

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use resona::synth::{ArticulationState, VoiceState};

use super::UiStateUpdate;

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

fn note_name(note: u8) -> String {
    let octave = note as i32 / 12 - 1;
    format!("{}{}", NOTE_NAMES[note as usize % 12], octave)
}

fn articulation_label(state: ArticulationState) -> &'static str {
    match state {
        ArticulationState::Idle => "idle",
        ArticulationState::AttackPluck => "pluck",
        ArticulationState::AttackBowSustain => "bow",
        ArticulationState::AttackScrape => "scrape",
        ArticulationState::AttackHarmonic => "harmonic",
        ArticulationState::Decay => "decay",
        ArticulationState::ReleaseDamp => "damp",
        ArticulationState::ReleaseGhost => "ghost",
    }
}

pub fn render_voices(frame: &mut Frame, area: Rect, state: &UiStateUpdate) {
    let block = Block::default()
        .title(format!(" Voices {}/{} ", state.active, state.voice_count))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let meter_width = inner.width.saturating_sub(24) as usize;
    let lines: Vec<Line> = state
        .voices
        .iter()
        .take(state.voice_count as usize)
        .enumerate()
        .take(inner.height as usize)
        .map(|(slot, voice)| {
            if voice.state == VoiceState::Free {
                return Line::from(Span::styled(
                    format!("{slot:>2}  -"),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            // Energy is squared amplitude; show it on a dB scale from -60
            let db = 10.0 * voice.energy.max(1e-9).log10();
            let fill = (((db + 60.0) / 60.0).clamp(0.0, 1.0) * meter_width as f32) as usize;
            let colour = match voice.state {
                VoiceState::Releasing => Color::Yellow,
                _ => Color::Green,
            };
            Line::from(vec![
                Span::raw(format!("{slot:>2}  ")),
                Span::styled(format!("{:<4} ", note_name(voice.note)), Style::default().fg(Color::White)),
                Span::styled(
                    format!("{:<9}", articulation_label(voice.articulation)),
                    Style::default().fg(colour),
                ),
                Span::styled("█".repeat(fill), Style::default().fg(colour)),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}
