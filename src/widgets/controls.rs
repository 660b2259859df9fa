use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style, Stylize},
    widgets::{Paragraph, Widget},
};

const CHART_CONTROLS: [(&str, &str); 8] = [
    ("Tab", "Tab"),
    ("←→", "Chart"),
    ("f", "Filters"),
    ("h/l", "Rotate"),
    ("e", "Export"),
    ("E", "Export all"),
    ("?", "Help"),
    ("q", "Quit"),
];

const FILTER_CONTROLS: [(&str, &str); 7] = [
    ("↑↓", "Move"),
    ("Space", "Toggle"),
    ("a", "All"),
    ("n", "None"),
    ("[]", "Column"),
    ("Esc", "Charts"),
    ("?", "Help"),
];

/// Bottom key-hint bar with the filtered row count on the right.
#[derive(Default)]
pub struct Controls {
    /// (filtered, total)
    pub rows: Option<(usize, usize)>,
    pub filters_focused: bool,
    pub dimmed: bool,
    pub background: Option<Color>,
}

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, filtered: usize, total: usize) -> Self {
        self.rows = Some((filtered, total));
        self
    }

    pub fn with_filters_focused(mut self, focused: bool) -> Self {
        self.filters_focused = focused;
        self
    }

    pub fn with_dimmed(mut self, dimmed: bool) -> Self {
        self.dimmed = dimmed;
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background = Some(color);
        self
    }

    fn controls(&self) -> &'static [(&'static str, &'static str)] {
        if self.filters_focused {
            &FILTER_CONTROLS
        } else {
            &CHART_CONTROLS
        }
    }
}

impl Widget for &Controls {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let controls = self.controls();
        let mut constraints = controls.iter().fold(vec![], |mut acc, (key, action)| {
            acc.push(Constraint::Length(key.chars().count() as u16 + 2));
            acc.push(Constraint::Length(action.chars().count() as u16 + 1));
            acc
        });
        constraints.push(Constraint::Fill(1));
        if self.rows.is_some() {
            constraints.push(Constraint::Length(24)); // "Rows: 1234 / 1470"
        }

        let layout = Layout::new(Direction::Horizontal, constraints).split(area);
        let color = self.background.unwrap_or(Color::DarkGray);
        let base_style = if self.dimmed {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        for (i, (key, action)) in controls.iter().enumerate() {
            let j = i * 2;
            Paragraph::new(*key)
                .style(base_style.bold())
                .centered()
                .render(layout[j], buf);
            Paragraph::new(*action)
                .style(base_style.bg(color))
                .render(layout[j + 1], buf);
        }

        let fill_idx = controls.len() * 2;
        Paragraph::new("")
            .style(base_style.bg(color))
            .render(layout[fill_idx], buf);

        if let Some((filtered, total)) = self.rows {
            Paragraph::new(format!("Rows: {filtered} / {total} "))
                .style(base_style.bg(color).fg(if self.dimmed {
                    Color::DarkGray
                } else {
                    Color::White
                }))
                .right_aligned()
                .render(layout[fill_idx + 1], buf);
        }
    }
}
