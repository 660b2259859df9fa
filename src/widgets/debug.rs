use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::{Paragraph, Widget},
};

/// Counters shown on the status line when running with --debug.
#[derive(Debug, Default)]
pub struct DebugState {
    pub enabled: bool,
    pub num_events: usize,
    pub num_frames: usize,
    pub num_key_events: usize,
    pub last_key_event_name: String,
    /// Snapshot of the session taken at render time.
    pub generation: u64,
    pub pipeline: String,
    pub failed_charts: usize,
}

impl DebugState {
    pub fn on_key(&mut self, event: &crossterm::event::KeyEvent) {
        self.num_key_events += 1;
        self.last_key_event_name = format!("{:?}", event.code);
    }
}

impl Widget for &DebugState {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Paragraph::new(format!(
            "events={} keys={} last_key={} frames={} generation={} state={} failed={}",
            self.num_events,
            self.num_key_events,
            self.last_key_event_name,
            self.num_frames,
            self.generation,
            self.pipeline,
            self.failed_charts,
        ))
        .style(Style::default().fg(Color::DarkGray))
        .render(area, buf);
    }
}
