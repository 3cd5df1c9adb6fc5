use std::time::Instant;

use ratatui::{
    Frame,
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Bar, BarChart, BarGroup, Block, Cell, Clear, Paragraph, Row, StatefulWidget, Table,
        TableState, Widget, Wrap,
    },
};
use tracing::trace;

use crate::chart::{CHART_HEADING, chart_title, dataset_label};
use crate::domain::{Metric, TVConfig};
use crate::model::{Model, Status, UIData};
use crate::table::page_label;

pub const SEARCH_HEIGHT: u16 = 3;
pub const PAGER_HEIGHT: u16 = 1;
pub const STATUSLINE_HEIGHT: u16 = 1;
pub const TABLE_HEADER_HEIGHT: u16 = 1;

pub const LOADING_TEXT: &str = "Loading...";
pub const ERROR_TEXT: &str = "Error: Failed to fetch countries";
pub const SEARCH_PLACEHOLDER: &str = "Search by country name";

const COLUMN_WIDTHS: [Constraint; 5] = [
    Constraint::Length(4),
    Constraint::Fill(2),
    Constraint::Fill(2),
    Constraint::Length(13),
    Constraint::Length(14),
];

#[derive(Debug)]
pub struct TableUI {
    last_drawn: Instant,
}

impl TableUI {
    pub fn new(_config: &TVConfig) -> Self {
        Self {
            last_drawn: Instant::now(),
        }
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        if uidata.last_update > self.last_drawn {
            trace!(
                "Drawing {:?}, page {}/{}",
                uidata.status, uidata.current_page, uidata.total_pages
            );
        }

        frame.render_widget(AppView { uidata }, frame.area());

        if uidata.active_search && !uidata.show_popup {
            let layout = AppLayout::new(frame.area());
            let inner_width = layout.search.width.saturating_sub(2);
            let x = std::cmp::min(uidata.search.cursor_pos as u16, inner_width);
            frame.set_cursor_position(Position::new(
                layout.search.x + 1 + x,
                layout.search.y + 1,
            ));
        }
        self.last_drawn = Instant::now();
    }
}

struct AppLayout {
    search: Rect,
    body: Rect,
    table: Rect,
    pager: Rect,
    chart: Rect,
    statusline: Rect,
}

impl AppLayout {
    fn new(area: Rect) -> Self {
        let [search, body, statusline] = Layout::vertical([
            Constraint::Length(SEARCH_HEIGHT),
            Constraint::Min(0),
            Constraint::Length(STATUSLINE_HEIGHT),
        ])
        .areas(area);
        let [table_area, chart] =
            Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)])
                .areas(body);
        let [table, pager] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(PAGER_HEIGHT)])
                .areas(table_area);
        AppLayout {
            search,
            body,
            table,
            pager,
            chart,
            statusline,
        }
    }
}

/// Full screen view of one UIData snapshot.
pub struct AppView<'a> {
    pub uidata: &'a UIData,
}

impl Widget for AppView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let uidata = self.uidata;
        let layout = AppLayout::new(area);

        match uidata.status {
            Status::LOADING => render_centered(Line::from(LOADING_TEXT), layout.body, buf),
            Status::FAILED => render_centered(
                Line::from(ERROR_TEXT.red().bold()),
                layout.body,
                buf,
            ),
            Status::READY | Status::QUITTING => {
                SearchBar { uidata }.render(layout.search, buf);
                CountryTable { uidata }.render(layout.table, buf);
                PageControl { uidata }.render(layout.pager, buf);
                ChartPanel { uidata }.render(layout.chart, buf);
            }
        }
        StatusLine { uidata }.render(layout.statusline, buf);

        if uidata.show_popup {
            Popup {
                title: &uidata.popup_title,
                message: &uidata.popup_message,
            }
            .render(area, buf);
        }
    }
}

fn render_centered(line: Line, area: Rect, buf: &mut Buffer) {
    let [_, middle, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(1),
        Constraint::Fill(1),
    ])
    .areas(area);
    Paragraph::new(line).centered().render(middle, buf);
}

struct SearchBar<'a> {
    uidata: &'a UIData,
}

impl Widget for SearchBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut block = Block::bordered().title(" Search ");
        if self.uidata.active_search {
            block = block.border_style(Style::new().yellow());
        }
        let text = if self.uidata.search.input.is_empty() && !self.uidata.active_search {
            Line::from(SEARCH_PLACEHOLDER.dark_gray())
        } else {
            Line::from(self.uidata.search.input.as_str())
        };
        Paragraph::new(text).block(block).render(area, buf);
    }
}

struct CountryTable<'a> {
    uidata: &'a UIData,
}

impl Widget for CountryTable<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let uidata = self.uidata;
        let header = Row::new(uidata.headers.iter().map(|h| Cell::from(h.as_str())))
            .style(Style::new().bold())
            .height(TABLE_HEADER_HEIGHT);

        let rows = uidata.rows.iter().map(|cells| {
            Row::new(cells.iter().enumerate().map(|(idx, value)| {
                // Numbers are right aligned
                let line = Line::from(value.as_str());
                if idx >= 3 {
                    Cell::from(line.right_aligned())
                } else {
                    Cell::from(line)
                }
            }))
        });

        let title = Line::from(vec![
            " Countries ".bold(),
            format!("{} of {} ", uidata.nfiltered, uidata.ntotal).into(),
        ]);
        let table = Table::new(rows, COLUMN_WIDTHS)
            .header(header)
            .block(Block::bordered().title(title))
            .column_spacing(1)
            .row_highlight_style(Style::new().reversed());

        let mut state = TableState::default();
        if !uidata.rows.is_empty() {
            state.select(Some(uidata.selected_row));
        }
        StatefulWidget::render(table, area, buf, &mut state);

        if uidata.rows.is_empty() {
            let inner = Rect {
                y: area.y.saturating_add(1 + TABLE_HEADER_HEIGHT),
                height: 1,
                ..area.inner(ratatui::layout::Margin::new(1, 0))
            };
            if area.height > 2 + TABLE_HEADER_HEIGHT {
                Paragraph::new("No countries found".dark_gray())
                    .centered()
                    .render(inner, buf);
            }
        }
    }
}

struct PageControl<'a> {
    uidata: &'a UIData,
}

impl Widget for PageControl<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let uidata = self.uidata;
        let [previous, label, next] = Layout::horizontal([
            Constraint::Length(12),
            Constraint::Fill(1),
            Constraint::Length(8),
        ])
        .areas(area);

        let button = |text: &'static str, enabled: bool| -> Span<'static> {
            if enabled {
                text.bold()
            } else {
                text.dark_gray()
            }
        };

        Paragraph::new(button(" ◀ Previous", uidata.current_page > 1)).render(previous, buf);
        Paragraph::new(page_label(uidata.current_page, uidata.total_pages))
            .centered()
            .render(label, buf);
        Paragraph::new(button("Next ▶ ", uidata.current_page < uidata.total_pages))
            .right_aligned()
            .render(next, buf);
    }
}

struct ChartPanel<'a> {
    uidata: &'a UIData,
}

impl Widget for ChartPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let uidata = self.uidata;
        let block = Block::bordered().title(Line::from(format!(" {CHART_HEADING} ").bold()));
        let inner = block.inner(area);
        block.render(area, buf);

        let [selector, title, chart] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .areas(inner);

        let option = |metric: Metric| -> Span<'static> {
            let label = format!(" {} ", metric.name());
            if metric == uidata.metric {
                label.reversed()
            } else {
                label.into()
            }
        };
        Paragraph::new(Line::from(vec![
            "Metric: ".into(),
            option(Metric::Population),
            " ".into(),
            option(Metric::Area),
            "  (m)".dark_gray(),
        ]))
        .render(selector, buf);

        Paragraph::new(chart_title(uidata.metric).bold())
            .centered()
            .render(title, buf);

        if uidata.chart.is_empty() {
            render_centered(Line::from("No data".dark_gray()), chart, buf);
            return;
        }

        let bars: Vec<Bar> = uidata
            .chart
            .iter()
            .map(|entry| {
                Bar::default()
                    .label(Line::from(entry.label.as_str()))
                    .value(entry.value)
                    .text_value(entry.text.clone())
            })
            .collect();

        BarChart::default()
            .block(Block::new().title(dataset_label(uidata.metric)))
            .direction(Direction::Horizontal)
            .bar_width(1)
            .bar_gap(0)
            .bar_style(Style::new().cyan())
            .value_style(Style::new().black().on_cyan())
            .data(BarGroup::default().bars(&bars))
            .render(chart, buf);
    }
}

struct StatusLine<'a> {
    uidata: &'a UIData,
}

impl Widget for StatusLine<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let uidata = self.uidata;
        let summary = if uidata.status == Status::READY {
            format!("{}/{} countries | ? help ", uidata.nfiltered, uidata.ntotal)
        } else {
            "? help | q quit ".to_string()
        };
        let [message, right] = Layout::horizontal([
            Constraint::Fill(1),
            Constraint::Length(summary.chars().count() as u16),
        ])
        .areas(area);

        Paragraph::new(format!(" {}", uidata.status_message)).render(message, buf);
        Paragraph::new(summary.dark_gray())
            .right_aligned()
            .render(right, buf);
    }
}

struct Popup<'a> {
    title: &'a str,
    message: &'a str,
}

impl Widget for Popup<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let popup = popup_area(area, 60, 70);
        Clear.render(popup, buf);
        Paragraph::new(Text::from(self.message))
            .block(
                Block::bordered()
                    .title(Line::from(format!(" {} ", self.title).bold()))
                    .title_bottom(Line::from(" <Esc> close ").centered()),
            )
            .wrap(Wrap { trim: false })
            .render(popup, buf);
    }
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [_, middle, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Percentage(percent_y),
        Constraint::Fill(1),
    ])
    .areas(area);
    let [_, center, _] = Layout::horizontal([
        Constraint::Fill(1),
        Constraint::Percentage(percent_x),
        Constraint::Fill(1),
    ])
    .areas(middle);
    center
}
