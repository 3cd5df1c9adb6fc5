use ratatui::crossterm::event::KeyEvent;
use std::time::Instant;
use tracing::{debug, info, trace};

use crate::chart::{ChartEntry, chart_entries};
use crate::country::Country;
use crate::domain::{HELP_TEXT, Message, Metric, TVConfig, TVError};
use crate::inputter::{InputResult, Inputter};
use crate::pipeline::Pipeline;
use crate::source::{DataSource, FetchState};
use crate::table::{capital_cell, format_decimal, group_thousands, header_labels, row_cells};

pub const RETRY_HINT: &str = "Press r to retry";

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Status {
    LOADING,
    READY,
    FAILED,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    CMDINPUT,
}

/// Everything the UI needs for one frame. Rebuilt after every state change.
pub struct UIData {
    pub status: Status,
    pub search: InputResult,
    pub active_search: bool,
    pub headers: [String; 5],
    pub rows: Vec<[String; 5]>,
    pub selected_row: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub nfiltered: usize,
    pub ntotal: usize,
    pub metric: Metric,
    pub chart: Vec<ChartEntry>,
    pub show_popup: bool,
    pub popup_title: String,
    pub popup_message: String,
    pub status_message: String,
    pub last_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            status: Status::LOADING,
            search: InputResult::default(),
            active_search: false,
            headers: Default::default(),
            rows: Vec::new(),
            selected_row: 0,
            current_page: 1,
            total_pages: 1,
            nfiltered: 0,
            ntotal: 0,
            metric: Metric::default(),
            chart: Vec::new(),
            show_popup: false,
            popup_title: String::new(),
            popup_message: String::new(),
            status_message: String::new(),
            last_update: Instant::now(),
        }
    }
}

pub struct Model {
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    source: DataSource,
    pipeline: Pipeline,
    metric: Metric,
    cursor_row: usize, // Row of the current page
    input: Inputter,
    last_input: InputResult,
    popup_title: String,
    popup_message: String,
    status_message: String,
    uidata: UIData,
}

impl Model {
    pub fn init(config: &TVConfig) -> Self {
        info!("Fetching countries from {}", config.source);
        Model::with_source(DataSource::spawn(config))
    }

    pub fn with_source(source: DataSource) -> Self {
        let mut model = Self {
            status: Status::LOADING,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            source,
            pipeline: Pipeline::default(),
            metric: Metric::default(),
            cursor_row: 0,
            input: Inputter::default(),
            last_input: InputResult::default(),
            popup_title: String::new(),
            popup_message: String::new(),
            status_message: String::new(),
            uidata: UIData::empty(),
        };
        model.apply_fetch_state();
        model.update_uidata();
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), TVError> {
        let mut changed = false;
        if self.source.poll() {
            self.apply_fetch_state();
            changed = true;
        }

        if let Some(msg) = message {
            trace!("Update: Modus {:?}, Message {:?}", self.modus, msg);
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::Help => self.show_help(),
                    Message::Retry => self.retry(),
                    Message::Exit => self.exit(),
                    _ if self.status != Status::READY => {
                        trace!("Ignoring {:?} while {:?}", msg, self.status)
                    }
                    Message::MoveUp => self.move_selection_up(),
                    Message::MoveDown => self.move_selection_down(),
                    Message::NextPage => {
                        self.pipeline.next_page();
                        self.cursor_row = 0;
                    }
                    Message::PreviousPage => {
                        self.pipeline.previous_page();
                        self.cursor_row = 0;
                    }
                    Message::FirstPage => {
                        self.pipeline.first_page();
                        self.cursor_row = 0;
                    }
                    Message::LastPage => {
                        self.pipeline.last_page();
                        self.cursor_row = 0;
                    }
                    Message::SortBy(column) => {
                        self.pipeline.set_sort(column);
                        self.cursor_row = 0;
                    }
                    Message::ToggleMetric => {
                        self.metric = self.metric.toggle();
                        debug!("Chart metric {:?}", self.metric);
                    }
                    Message::Search => self.enter_search_mode(),
                    Message::Enter => self.show_record(),
                    Message::RawKey(_) => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Enter | Message::Help => self.close_popup(),
                    _ => (),
                },
                Modus::CMDINPUT => match msg {
                    Message::Quit => self.quit(),
                    Message::RawKey(key) => self.raw_input(key),
                    _ => (),
                },
            }
            changed = true;
        }

        if changed {
            self.update_uidata();
        }
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn apply_fetch_state(&mut self) {
        match self.source.state().clone() {
            FetchState::Pending => {
                self.status = Status::LOADING;
                self.set_status_message("Loading ...");
            }
            FetchState::Success(dataset) => {
                let ncountries = dataset.len();
                self.pipeline.set_dataset(dataset);
                self.cursor_row = 0;
                self.status = Status::READY;
                let rejected = self.source.rejected();
                if rejected > 0 {
                    self.set_status_message(format!(
                        "Loaded {ncountries} countries, skipped {rejected} malformed records"
                    ));
                } else {
                    self.set_status_message(format!("Loaded {ncountries} countries"));
                }
            }
            FetchState::Failed(reason) => {
                // The body carries the only error indicator, the reason goes to the log
                debug!("Fetch failed: {reason}");
                self.status = Status::FAILED;
                self.set_status_message(RETRY_HINT);
            }
        }
    }

    fn retry(&mut self) {
        if self.status == Status::FAILED && self.source.retry() {
            self.apply_fetch_state();
        }
    }

    fn exit(&mut self) {
        // Esc on the table drops an active search
        if !self.pipeline.state().search_term.is_empty() {
            self.pipeline.set_search_term("");
            self.cursor_row = 0;
            self.set_status_message("Search cleared");
        }
    }

    fn show_help(&mut self) {
        self.open_popup("Help".to_string(), HELP_TEXT.to_string());
    }

    fn show_record(&mut self) {
        let Some(country) = self.pipeline.page_slice().nth(self.cursor_row) else {
            return;
        };
        let (title, message) = (country.display_name.clone(), record_text(country));
        self.open_popup(title, message);
    }

    fn open_popup(&mut self, title: String, message: String) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.popup_title = title;
        self.popup_message = message;
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
    }

    fn enter_search_mode(&mut self) {
        trace!("Entering search mode ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.input.set(&self.pipeline.state().search_term);
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);

        // Filter while typing
        if self.last_input.input != self.pipeline.state().search_term {
            self.pipeline.set_search_term(&self.last_input.input);
            self.cursor_row = 0;
        }

        if self.last_input.finished {
            self.modus = self.previous_modus;
            self.previous_modus = Modus::CMDINPUT;
            let nmatches = self.pipeline.view().filtered.len();
            if self.last_input.canceled {
                self.set_status_message("Search cleared");
            } else {
                self.set_status_message(format!("Found {nmatches} countries"));
            }
        }
    }

    fn move_selection_up(&mut self) {
        if self.cursor_row > 0 {
            self.cursor_row -= 1;
        } else if self.pipeline.state().current_page > 1 {
            // At the top, continue on the last row of the previous page
            self.pipeline.previous_page();
            self.cursor_row = self.pipeline.view().page_slice.len().saturating_sub(1);
        }
    }

    fn move_selection_down(&mut self) {
        let nrows = self.pipeline.view().page_slice.len();
        let state = self.pipeline.state();
        if self.cursor_row + 1 < nrows {
            self.cursor_row += 1;
        } else if state.current_page < self.pipeline.total_pages() {
            self.pipeline.next_page();
            self.cursor_row = 0;
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    fn update_uidata(&mut self) {
        let state = self.pipeline.state();
        let view = self.pipeline.view();
        let active_search = self.modus == Modus::CMDINPUT
            || (self.modus == Modus::POPUP && self.previous_modus == Modus::CMDINPUT);

        let search = if active_search {
            self.last_input.clone()
        } else {
            InputResult {
                input: state.search_term.clone(),
                cursor_pos: state.search_term.chars().count(),
                ..InputResult::default()
            }
        };

        self.uidata = UIData {
            status: self.status,
            search,
            active_search,
            headers: header_labels(state.sort_column, state.sort_direction),
            rows: self.pipeline.page_slice().map(row_cells).collect(),
            selected_row: self.cursor_row,
            current_page: state.current_page,
            total_pages: view.total_pages,
            nfiltered: view.filtered.len(),
            ntotal: self.pipeline.dataset().len(),
            metric: self.metric,
            chart: chart_entries(self.pipeline.filtered_countries(), self.metric),
            show_popup: self.modus == Modus::POPUP,
            popup_title: self.popup_title.clone(),
            popup_message: self.popup_message.clone(),
            status_message: self.status_message.clone(),
            last_update: Instant::now(),
        };
    }
}

fn record_text(country: &Country) -> String {
    let capital = if country.capital.len() > 1 {
        country.capital.join(", ")
    } else {
        capital_cell(country)
    };
    format!(
        "Capital:     {}\nPopulation:  {}\nArea:        {} km²\nFlag:        {}",
        capital,
        group_thousands(country.population),
        format_decimal(country.area),
        country.flag_image_url,
    )
}
