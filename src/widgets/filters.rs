//! Sidebar of multi-select lists, one per filter column.

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, List, ListItem, ListState, StatefulWidget, Widget},
};

use crate::config::Theme;
use crate::filter::{FilterRegistry, FilterSelection, FilterValue};

/// Which column is open and where the cursor sits in each column's list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCursor {
    column: usize,
    rows: Vec<usize>,
}

impl FilterCursor {
    pub fn new(columns: usize) -> Self {
        Self {
            column: 0,
            rows: vec![0; columns],
        }
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn row(&self) -> usize {
        self.rows.get(self.column).copied().unwrap_or(0)
    }

    pub fn next_column(&mut self) {
        if !self.rows.is_empty() {
            self.column = (self.column + 1) % self.rows.len();
        }
    }

    pub fn previous_column(&mut self) {
        if !self.rows.is_empty() {
            self.column = (self.column + self.rows.len() - 1) % self.rows.len();
        }
    }

    /// Move the cursor within a list of `len` values, wrapping at the ends.
    pub fn move_by(&mut self, delta: isize, len: usize) {
        if len == 0 {
            return;
        }
        if let Some(row) = self.rows.get_mut(self.column) {
            *row = (*row as isize + delta).rem_euclid(len as isize) as usize;
        }
    }

    /// Column name and value under the cursor.
    pub fn current<'r>(&self, registry: &'r FilterRegistry) -> Option<(&'r str, &'r FilterValue)> {
        let column = registry.columns().get(self.column)?;
        let value = registry.domain(column)?.iter().nth(self.row())?;
        Some((column.as_str(), value))
    }
}

pub struct FilterSidebar<'a> {
    registry: &'a FilterRegistry,
    selection: &'a FilterSelection,
    cursor: &'a FilterCursor,
    theme: &'a Theme,
    focused: bool,
}

impl<'a> FilterSidebar<'a> {
    pub fn new(
        registry: &'a FilterRegistry,
        selection: &'a FilterSelection,
        cursor: &'a FilterCursor,
        theme: &'a Theme,
    ) -> Self {
        Self {
            registry,
            selection,
            cursor,
            theme,
            focused: false,
        }
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    fn selected_count(&self, column: &str) -> usize {
        self.selection.get(column).map_or(0, |values| values.len())
    }
}

impl Widget for FilterSidebar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border = if self.focused {
            self.theme.get("sidebar_selected")
        } else {
            self.theme.get("sidebar_border")
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(border))
            .title(" Filters ");
        let inner = block.inner(area);
        block.render(area, buf);

        let columns = self.registry.columns();
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(columns.len() as u16 + 1), Constraint::Fill(1)])
            .split(inner);

        let summary: Vec<Line> = columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let total = self.registry.domain(column).map_or(0, |d| d.len());
                let selected = self.selected_count(column);
                let active = i == self.cursor.column();
                let marker = if active { "▸ " } else { "  " };
                let name_style = if active {
                    Style::default()
                        .fg(self.theme.get("primary"))
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(self.theme.get("text_primary"))
                };
                let count_style = if selected < total {
                    Style::default().fg(self.theme.get("secondary"))
                } else {
                    Style::default().fg(self.theme.get("dimmed"))
                };
                Line::from(vec![
                    Span::raw(marker),
                    Span::styled(column.as_str(), name_style),
                    Span::styled(format!(" {selected}/{total}"), count_style),
                ])
            })
            .collect();
        Widget::render(ratatui::widgets::Paragraph::new(summary), layout[0], buf);

        let Some(column) = columns.get(self.cursor.column()) else {
            return;
        };
        let Some(domain) = self.registry.domain(column) else {
            return;
        };
        let items: Vec<ListItem> = domain
            .iter()
            .map(|value| {
                let checked = self.selection.is_selected(column, value);
                let mark = if checked { "[x] " } else { "[ ] " };
                let style = if checked {
                    Style::default().fg(self.theme.get("text_primary"))
                } else {
                    Style::default().fg(self.theme.get("dimmed"))
                };
                ListItem::new(Line::from(vec![
                    Span::raw(mark),
                    Span::styled(value.to_string(), style),
                ]))
            })
            .collect();
        let highlight = if self.focused {
            Style::default()
                .fg(self.theme.get("text_inverse"))
                .bg(self.theme.get("sidebar_selected"))
        } else {
            Style::default().add_modifier(Modifier::UNDERLINED)
        };
        let list = List::new(items)
            .block(Block::default().borders(Borders::TOP).title(column.as_str()))
            .highlight_style(highlight);
        let mut state = ListState::default().with_selected(Some(self.cursor.row()));
        StatefulWidget::render(list, layout[1], buf, &mut state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_wraps_within_lists_and_columns() {
        let mut cursor = FilterCursor::new(3);
        cursor.move_by(-1, 4);
        assert_eq!(cursor.row(), 3);
        cursor.move_by(1, 4);
        assert_eq!(cursor.row(), 0);

        cursor.previous_column();
        assert_eq!(cursor.column(), 2);
        assert_eq!(cursor.row(), 0);
        cursor.next_column();
        cursor.next_column();
        assert_eq!(cursor.column(), 1);
    }

    #[test]
    fn empty_cursor_is_inert() {
        let mut cursor = FilterCursor::new(0);
        cursor.next_column();
        cursor.move_by(1, 0);
        assert_eq!((cursor.column(), cursor.row()), (0, 0));
    }
}
