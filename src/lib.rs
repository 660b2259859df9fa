use color_eyre::eyre::eyre;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::PathBuf;
use tracing::{info, warn};

use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap};
use ratatui::{buffer::Buffer, layout::Rect, widgets::Widget};

pub mod cache;
pub mod chart_data;
pub mod chart_export;
pub mod chart_spec;
pub mod config;
pub mod dataset;
pub mod error;
pub mod filter;
pub mod filter_engine;
pub mod session;
pub mod statistics;
pub mod widgets;

pub use attrition_dash_cli::{Args, CompressionFormat, ExportFormat, TabName};
pub use cache::CacheManager;
pub use chart_data::{render, Chart};
pub use chart_export::{export_chart, export_dashboard, ExportManifest, ExportOptions};
pub use chart_spec::{BarMode, ChartCatalog, ChartKind, ChartSpec, DashboardTab};
pub use config::{AppConfig, ColorParser, ConfigManager, Theme};
pub use dataset::{DatasetLoader, LoadOptions, Table};
pub use error::DashboardError;
pub use filter::{FilterRegistry, FilterSelection, FilterValue};
pub use filter_engine::{apply, FilteredView};
pub use session::{ChartOutcome, PipelineState, RenderPass, Session};

use widgets::chart::ChartView;
use widgets::controls::Controls;
use widgets::debug::DebugState;
use widgets::filters::{FilterCursor, FilterSidebar};

/// Application name used for config directory and other app-specific paths
pub const APP_NAME: &str = "attrition-dash";

/// Dataset read when neither the command line nor the config names one.
pub const DEFAULT_DATASET: &str = "EA.csv";

/// Directory for in-app exports when the config does not name one.
pub const DEFAULT_EXPORT_DIR: &str = "attrition-dash-export";

/// Data file to open: command line, then config, then `EA.csv`.
pub fn dataset_path(args: &Args, config: &AppConfig) -> PathBuf {
    args.path
        .clone()
        .or_else(|| config.dataset.path.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET))
}

impl LoadOptions {
    /// Reader options layered config → command line.
    pub fn from_args_and_config(args: &Args, config: &AppConfig) -> Result<Self> {
        let mut options = LoadOptions::new();
        if let Some(delimiter) = args.delimiter.or(config.dataset.delimiter) {
            if !delimiter.is_ascii() {
                return Err(eyre!("delimiter must be a single ASCII character"));
            }
            options = options.with_delimiter(delimiter as u8);
        }
        let has_header = if args.no_header {
            false
        } else {
            config.dataset.has_header.unwrap_or(true)
        };
        options = options.with_has_header(has_header);

        let compression = args.compression.or_else(|| {
            config
                .dataset
                .compression
                .as_deref()
                .and_then(CompressionFormat::from_name)
        });
        if let Some(compression) = compression {
            options = options.with_compression(compression);
        }
        Ok(options)
    }
}

impl ExportOptions {
    pub fn from_args_and_config(args: &Args, config: &AppConfig) -> Self {
        Self {
            format: args
                .format
                .or_else(|| config.export_format())
                .unwrap_or_default(),
            width: config.export.width,
            height: config.export.height,
            ..Self::default()
        }
    }
}

/// Chart catalog: `--charts`, then `[charts] catalog`, then the built-in one.
pub fn load_catalog(args: &Args, config: &AppConfig) -> Result<ChartCatalog> {
    let path = args
        .charts
        .clone()
        .or_else(|| config.charts.catalog.as_ref().map(PathBuf::from));
    let catalog = match path {
        Some(path) => {
            info!(path = %path.display(), "loading chart catalog");
            ChartCatalog::load(&path)?
        }
        None => ChartCatalog::builtin(),
    };
    catalog.validate()?;
    Ok(catalog)
}

/// Load the dataset, build the filter registry and catalog, and render the
/// first pass with any `--filter` assignments applied.
pub fn open_session(args: &Args, config: &AppConfig) -> Result<Session> {
    let path = dataset_path(args, config);
    let loader = DatasetLoader::new(path, LoadOptions::from_args_and_config(args, config)?);
    let table = loader.load()?;

    let registry = FilterRegistry::new(&table, &config.filters.columns)?;
    let catalog = load_catalog(args, config)?;
    for (chart, column) in catalog.unknown_columns(&table) {
        warn!(chart = %chart, column = %column, "chart names a column the dataset does not have");
    }
    let selection = registry.selection_from_assignments(&args.filter)?;

    Ok(Session::with_selection(
        table,
        std::sync::Arc::new(registry),
        std::sync::Arc::new(catalog),
        selection,
    )?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportScope {
    /// The chart on screen
    Current,
    /// Every chart in the catalog, with a manifest
    All,
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    Key(KeyEvent),
    Export(ExportScope),
    Exit,
    Resize(u16, u16), // resized (width, height)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    #[default]
    Charts,
    Filters,
}

#[derive(Default)]
pub struct ErrorModal {
    pub active: bool,
    pub message: String,
}

impl ErrorModal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&mut self, message: String) {
        self.active = true;
        self.message = message;
    }

    pub fn hide(&mut self) {
        self.active = false;
        self.message.clear();
    }
}

const HELP_TEXT: &str = "\
Tab / Shift-Tab   next / previous tab
1-4               jump to a tab
← / →             previous / next chart in the tab
f                 focus the filter sidebar
↑ / ↓  (k / j)    move within a filter list
Space / Enter     toggle the value under the cursor
a / n             select all / none in the open column
[ / ]             previous / next filter column
h / l             rotate 3-D views
e / E             export the current chart / every chart
?                 toggle this help
Esc               leave the sidebar, close overlays, quit
q                 quit";

pub struct App {
    session: Session,
    theme: Theme,
    tab: DashboardTab,
    /// Chart shown on each tab, indexed by `DashboardTab::index`
    chart_index: [usize; 4],
    focus: Focus,
    cursor: FilterCursor,
    yaw: f64,
    rotation_step: f64,
    show_help: bool,
    error_modal: ErrorModal,
    status: Option<String>,
    export_options: ExportOptions,
    export_dir: PathBuf,
    sidebar_width: u16,
    debug: DebugState,
}

impl App {
    pub fn new(session: Session) -> App {
        Self::new_with_config(session, Theme::default(), &AppConfig::default())
    }

    pub fn new_with_config(session: Session, theme: Theme, config: &AppConfig) -> App {
        let cursor = FilterCursor::new(session.registry().columns().len());
        let export_dir = config
            .export
            .directory
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_DIR));
        let export_options = ExportOptions {
            format: config.export_format().unwrap_or_default(),
            width: config.export.width,
            height: config.export.height,
            ..ExportOptions::default()
        };
        App {
            session,
            theme,
            tab: config.display.default_tab,
            chart_index: [0; 4],
            focus: Focus::Charts,
            cursor,
            yaw: export_options.yaw,
            rotation_step: config.display.rotation_step_degrees.to_radians(),
            show_help: false,
            error_modal: ErrorModal::new(),
            status: None,
            export_options,
            export_dir,
            sidebar_width: config.display.sidebar_width,
            debug: DebugState {
                enabled: config.debug.enabled,
                ..DebugState::default()
            },
        }
    }

    pub fn enable_debug(&mut self) {
        self.debug.enabled = true;
    }

    pub fn with_tab(mut self, tab: DashboardTab) -> Self {
        self.tab = tab;
        self
    }

    pub fn with_export_options(mut self, options: ExportOptions) -> Self {
        self.yaw = options.yaw;
        self.export_options = options;
        self
    }

    pub fn with_export_dir(mut self, dir: PathBuf) -> Self {
        self.export_dir = dir;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn tab(&self) -> DashboardTab {
        self.tab
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn cursor(&self) -> &FilterCursor {
        &self.cursor
    }

    pub fn yaw(&self) -> f64 {
        self.yaw
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_modal
            .active
            .then_some(self.error_modal.message.as_str())
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Catalog position of the chart on screen, if the tab has any.
    pub fn current_position(&self) -> Option<usize> {
        let charts = self.session.catalog().positions_for_tab(self.tab);
        charts
            .get(self.chart_index[self.tab.index()].min(charts.len().saturating_sub(1)))
            .copied()
    }

    fn color(&self, name: &str) -> ratatui::style::Color {
        self.theme.get(name)
    }

    fn report(&mut self, err: impl std::fmt::Display) {
        warn!(error = %err, "action failed");
        self.error_modal.show(err.to_string());
    }

    fn step_chart(&mut self, delta: isize) {
        let count = self.session.catalog().positions_for_tab(self.tab).len();
        if count == 0 {
            return;
        }
        let slot = &mut self.chart_index[self.tab.index()];
        *slot = (*slot as isize + delta).rem_euclid(count as isize) as usize;
    }

    fn current_domain_len(&self) -> usize {
        self.session
            .registry()
            .columns()
            .get(self.cursor.column())
            .and_then(|column| self.session.registry().domain(column))
            .map_or(0, |domain| domain.len())
    }

    fn current_column(&self) -> Option<String> {
        self.session
            .registry()
            .columns()
            .get(self.cursor.column())
            .cloned()
    }

    fn toggle_under_cursor(&mut self) {
        let Some((column, value)) = self
            .cursor
            .current(self.session.registry())
            .map(|(c, v)| (c.to_string(), v.clone()))
        else {
            return;
        };
        match self.session.toggle(&column, &value) {
            Ok(selected) => {
                let verb = if selected { "selected" } else { "deselected" };
                self.status = Some(format!("{column}: {value} {verb}"));
            }
            Err(err) => self.report(err),
        }
    }

    fn select_all_in_column(&mut self) {
        if let Some(column) = self.current_column() {
            if let Err(err) = self.session.select_all(&column) {
                self.report(err);
            }
        }
    }

    fn clear_column(&mut self) {
        if let Some(column) = self.current_column() {
            if let Err(err) = self.session.clear(&column) {
                self.report(err);
            }
        }
    }

    fn key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        self.debug.on_key(event);

        if self.error_modal.active {
            if matches!(event.code, KeyCode::Esc | KeyCode::Enter) {
                self.error_modal.hide();
            }
            return None;
        }

        if self.show_help {
            match event.code {
                KeyCode::Esc | KeyCode::Char('?') => self.show_help = false,
                KeyCode::Char('q') => return Some(AppEvent::Exit),
                _ => {}
            }
            return None;
        }

        if event.code == KeyCode::Char('c') && event.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(AppEvent::Exit);
        }

        match event.code {
            KeyCode::Char('q') => return Some(AppEvent::Exit),
            KeyCode::Esc => {
                if self.focus == Focus::Filters {
                    self.focus = Focus::Charts;
                } else {
                    return Some(AppEvent::Exit);
                }
            }
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Tab => self.tab = self.tab.next(),
            KeyCode::BackTab => self.tab = self.tab.previous(),
            KeyCode::Char(c @ '1'..='4') => {
                let idx = c as usize - '1' as usize;
                self.tab = DashboardTab::ALL[idx];
            }
            KeyCode::Left => self.step_chart(-1),
            KeyCode::Right => self.step_chart(1),
            KeyCode::Char('f') => {
                self.focus = match self.focus {
                    Focus::Charts => Focus::Filters,
                    Focus::Filters => Focus::Charts,
                };
            }
            KeyCode::Char('h') => self.yaw -= self.rotation_step,
            KeyCode::Char('l') => self.yaw += self.rotation_step,
            KeyCode::Char('e') => return Some(AppEvent::Export(ExportScope::Current)),
            KeyCode::Char('E') => return Some(AppEvent::Export(ExportScope::All)),
            KeyCode::Up | KeyCode::Char('k') if self.focus == Focus::Filters => {
                let len = self.current_domain_len();
                self.cursor.move_by(-1, len);
            }
            KeyCode::Down | KeyCode::Char('j') if self.focus == Focus::Filters => {
                let len = self.current_domain_len();
                self.cursor.move_by(1, len);
            }
            KeyCode::Char(' ') | KeyCode::Enter if self.focus == Focus::Filters => {
                self.toggle_under_cursor();
            }
            KeyCode::Char('a') if self.focus == Focus::Filters => self.select_all_in_column(),
            KeyCode::Char('n') if self.focus == Focus::Filters => self.clear_column(),
            KeyCode::Char('[') => self.cursor.previous_column(),
            KeyCode::Char(']') => self.cursor.next_column(),
            _ => {}
        }
        None
    }

    fn export(&mut self, scope: ExportScope) {
        let options = ExportOptions {
            yaw: self.yaw,
            ..self.export_options
        };
        match scope {
            ExportScope::Current => {
                let Some(position) = self.current_position() else {
                    self.status = Some("No chart on this tab".to_string());
                    return;
                };
                match export_chart(&self.session, position, &self.export_dir, &options) {
                    Ok(path) => self.status = Some(format!("Exported {}", path.display())),
                    Err(err) => self.report(err),
                }
            }
            ExportScope::All => match export_dashboard(&self.session, &self.export_dir, &options) {
                Ok(manifest) => {
                    self.status = Some(format!(
                        "Exported {} charts to {} ({} failed)",
                        manifest.charts.len(),
                        self.export_dir.display(),
                        manifest.failed()
                    ));
                }
                Err(err) => self.report(err),
            },
        }
    }

    pub fn event(&mut self, event: &AppEvent) -> Option<AppEvent> {
        self.debug.num_events += 1;
        match event {
            AppEvent::Key(key) => self.key(key),
            AppEvent::Export(scope) => {
                self.export(*scope);
                None
            }
            AppEvent::Exit | AppEvent::Resize(..) => None,
        }
    }

    fn render_tabs(&self, area: Rect, buf: &mut Buffer) {
        let layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Fill(1), Constraint::Fill(1)])
            .split(area);
        let titles: Vec<Line> = DashboardTab::ALL
            .iter()
            .enumerate()
            .map(|(i, tab)| Line::from(format!("{} {}", i + 1, tab.title())))
            .collect();
        Tabs::new(titles)
            .select(self.tab.index())
            .style(Style::default().fg(self.color("text_secondary")))
            .highlight_style(
                Style::default()
                    .fg(self.color("primary"))
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            )
            .render(layout[0], buf);
        if let Some(status) = &self.status {
            Paragraph::new(status.as_str())
                .style(Style::default().fg(self.color("secondary")))
                .right_aligned()
                .render(layout[1], buf);
        }
    }

    fn render_chart_area(&self, area: Rect, buf: &mut Buffer) {
        let charts = self.session.charts_on(self.tab);
        let Some(position) = self.current_position() else {
            Paragraph::new("No charts on this tab")
                .centered()
                .style(Style::default().fg(self.color("dimmed")))
                .block(Block::default().borders(Borders::ALL))
                .render(area, buf);
            return;
        };
        let index = charts
            .iter()
            .position(|(p, _)| *p == position)
            .unwrap_or(0);
        let Some((_, spec)) = charts.get(index) else {
            return;
        };
        ChartView::new(spec, self.session.outcome(position), &self.theme)
            .with_yaw(self.yaw)
            .with_counter(index + 1, charts.len())
            .render(area, buf);
    }
}

impl Widget for &mut App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        self.debug.num_frames += 1;

        let mut constraints = vec![
            Constraint::Length(1), // Tabs
            Constraint::Fill(1),
            Constraint::Length(1), // Controls
        ];
        if self.debug.enabled {
            constraints.push(Constraint::Length(1));
        }
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        self.render_tabs(layout[0], buf);

        let main = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(self.sidebar_width), Constraint::Fill(1)])
            .split(layout[1]);
        FilterSidebar::new(
            self.session.registry(),
            self.session.selection(),
            &self.cursor,
            &self.theme,
        )
        .focused(self.focus == Focus::Filters)
        .render(main[0], buf);
        self.render_chart_area(main[1], buf);

        let rows = self.session.last_pass().map_or(0, |pass| pass.rows);
        let controls = Controls::new()
            .with_rows(rows, self.session.table().height())
            .with_filters_focused(self.focus == Focus::Filters)
            .with_dimmed(self.show_help || self.error_modal.active)
            .with_background(self.color("controls_bg"));
        (&controls).render(layout[2], buf);

        if self.debug.enabled {
            self.debug.generation = self.session.generation();
            self.debug.pipeline = format!("{:?}", self.session.state());
            self.debug.failed_charts = self
                .session
                .last_pass()
                .map_or(0, |pass| pass.failures().count());
            (&self.debug).render(layout[3], buf);
        }

        if self.show_help {
            let popup_area = centered_rect(area, 60, 60);
            Clear.render(popup_area, buf);
            Paragraph::new(HELP_TEXT)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(" Help ")
                        .border_style(Style::default().fg(self.color("primary"))),
                )
                .render(popup_area, buf);
        }

        if self.error_modal.active {
            let popup_area = centered_rect(area, 70, 40);
            Clear.render(popup_area, buf);
            let block = Block::default()
                .borders(Borders::ALL)
                .title(" Error ")
                .border_style(Style::default().fg(self.color("error")));
            let inner_area = block.inner(popup_area);
            block.render(popup_area, buf);

            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(1)])
                .split(inner_area);
            Paragraph::new(self.error_modal.message.as_str())
                .style(Style::default().fg(self.color("error")))
                .wrap(Wrap { trim: true })
                .render(chunks[0], buf);
            Paragraph::new(Line::from(vec![
                Span::styled("[ OK ]", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw("  Enter / Esc"),
            ]))
            .centered()
            .render(chunks[1], buf);
        }
    }
}

/// Helper function to create a centered rectangle
fn centered_rect(r: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
