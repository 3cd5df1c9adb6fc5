use rayon::prelude::*;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

use crate::country::{Country, Dataset};
use crate::domain::{SortColumn, SortDirection};

pub const PAGE_SIZE: usize = 10;

/// User selection driving the derived views.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub search_term: String,
    pub sort_column: SortColumn,
    pub sort_direction: SortDirection,
    pub current_page: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            search_term: String::new(),
            sort_column: SortColumn::Name,
            sort_direction: SortDirection::Asc,
            current_page: 1,
        }
    }
}

/// Derived views as row mappings into the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedView {
    pub filtered: Arc<Vec<usize>>,
    pub sorted: Arc<Vec<usize>>,
    pub page_slice: Vec<usize>,
    pub total_pages: usize,
}

impl DerivedView {
    fn empty() -> Self {
        DerivedView {
            filtered: Arc::new(Vec::new()),
            sorted: Arc::new(Vec::new()),
            page_slice: Vec::new(),
            total_pages: 1,
        }
    }
}

/// Recompute everything from scratch.
pub fn derive_view(dataset: &[Country], state: &ViewState) -> DerivedView {
    let keys = collation_keys(dataset);
    let filtered = filter_rows(dataset, &state.search_term);
    let sorted = sort_rows(
        dataset,
        &keys,
        &filtered,
        state.sort_column,
        state.sort_direction,
    );
    DerivedView {
        total_pages: total_pages(filtered.len()),
        page_slice: page_window(&sorted, state.current_page),
        filtered: Arc::new(filtered),
        sorted: Arc::new(sorted),
    }
}

/// Rows whose name contains `term`, ignoring case. Keeps dataset order.
pub fn filter_rows(dataset: &[Country], term: &str) -> Vec<usize> {
    let needle = term.to_lowercase();
    if needle.is_empty() {
        return (0..dataset.len()).collect();
    }
    dataset
        .par_iter()
        .enumerate()
        .filter(|(_, c)| c.display_name.to_lowercase().contains(&needle))
        .map(|(idx, _)| idx)
        .collect()
}

pub fn sort_rows(
    dataset: &[Country],
    keys: &[String],
    rows: &[usize],
    column: SortColumn,
    direction: SortDirection,
) -> Vec<usize> {
    let mut sorted = rows.to_vec();
    sorted.sort_unstable_by(|&a, &b| {
        let ordering = compare(dataset, keys, a, b, column);
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
    sorted
}

fn compare(
    dataset: &[Country],
    keys: &[String],
    a: usize,
    b: usize,
    column: SortColumn,
) -> Ordering {
    let (ca, cb) = (&dataset[a], &dataset[b]);
    match column {
        SortColumn::Name => keys[a]
            .cmp(&keys[b])
            .then_with(|| ca.display_name.cmp(&cb.display_name)),
        SortColumn::Population => ca.population.cmp(&cb.population),
        SortColumn::Area => ca.area.total_cmp(&cb.area),
    }
}

pub fn total_pages(nrows: usize) -> usize {
    std::cmp::max(1, nrows.div_ceil(PAGE_SIZE))
}

/// Rows of the 1 based `page`. Pages past the end are empty.
pub fn page_window(sorted: &[usize], page: usize) -> Vec<usize> {
    let page = std::cmp::max(page, 1);
    let begin = std::cmp::min((page - 1) * PAGE_SIZE, sorted.len());
    let end = std::cmp::min(page * PAGE_SIZE, sorted.len());
    sorted[begin..end].to_vec()
}

pub fn collation_keys(dataset: &[Country]) -> Vec<String> {
    dataset
        .iter()
        .map(|c| collation_key(&c.display_name))
        .collect()
}

/// Case and accent folded sort key, so that "Åland" sorts next to "Algeria".
pub fn collation_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        match c {
            'à'..='å' | 'ā' | 'ă' | 'ą' => key.push('a'),
            'æ' => key.push_str("ae"),
            'ç' | 'ć' | 'č' => key.push('c'),
            'ď' | 'ð' => key.push('d'),
            'è'..='ë' | 'ē' | 'ė' | 'ę' | 'ě' => key.push('e'),
            'ì'..='ï' | 'ī' | 'į' | 'ı' => key.push('i'),
            'ł' => key.push('l'),
            'ñ' | 'ń' | 'ň' => key.push('n'),
            'ò'..='ö' | 'ø' | 'ō' | 'ő' => key.push('o'),
            'ř' => key.push('r'),
            'ß' => key.push_str("ss"),
            'ś' | 'š' | 'ş' => key.push('s'),
            'ť' | 'ţ' => key.push('t'),
            'þ' => key.push_str("th"),
            'ù'..='ü' | 'ū' | 'ů' | 'ű' => key.push('u'),
            'ý' | 'ÿ' => key.push('y'),
            'ź' | 'ż' | 'ž' => key.push('z'),
            other => key.push(other),
        }
    }
    key
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Filter,
    Sort,
    Page,
}

/// Owns the dataset and the view state, keeps the derived views in sync.
///
/// Every mutating call recomputes the derived views exactly once, starting
/// at the first stage the mutation invalidates. Earlier stages are reused.
pub struct Pipeline {
    dataset: Dataset,
    keys: Vec<String>,
    state: ViewState,
    view: DerivedView,
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline::new(Arc::new(Vec::new()))
    }
}

impl Pipeline {
    pub fn new(dataset: Dataset) -> Self {
        let mut pipeline = Pipeline {
            keys: collation_keys(&dataset),
            dataset,
            state: ViewState::default(),
            view: DerivedView::empty(),
        };
        pipeline.recompute(Stage::Filter);
        pipeline
    }

    /// Replace the dataset as a whole. The view state is kept.
    pub fn set_dataset(&mut self, dataset: Dataset) {
        self.keys = collation_keys(&dataset);
        self.dataset = dataset;
        self.recompute(Stage::Filter);
    }

    pub fn set_search_term(&mut self, term: &str) {
        self.state.current_page = 1;
        if self.state.search_term == term {
            self.recompute(Stage::Page);
        } else {
            self.state.search_term = term.to_string();
            self.recompute(Stage::Filter);
        }
    }

    pub fn set_sort(&mut self, column: SortColumn) {
        if self.state.sort_column == column {
            self.state.sort_direction = self.state.sort_direction.flip();
        } else {
            self.state.sort_column = column;
            self.state.sort_direction = SortDirection::Asc;
        }
        self.recompute(Stage::Sort);
    }

    /// Out of range pages are clamped, never rejected.
    pub fn set_page(&mut self, page: usize) {
        self.state.current_page = page.clamp(1, self.view.total_pages);
        self.recompute(Stage::Page);
    }

    pub fn next_page(&mut self) {
        self.set_page(self.state.current_page + 1);
    }

    pub fn previous_page(&mut self) {
        self.set_page(self.state.current_page.saturating_sub(1));
    }

    pub fn first_page(&mut self) {
        self.set_page(1);
    }

    pub fn last_page(&mut self) {
        self.set_page(self.view.total_pages);
    }

    fn recompute(&mut self, from: Stage) {
        let start_time = Instant::now();

        if from <= Stage::Filter {
            self.view.filtered = Arc::new(filter_rows(&self.dataset, &self.state.search_term));
            self.view.total_pages = total_pages(self.view.filtered.len());
        }
        if from <= Stage::Sort {
            self.view.sorted = Arc::new(sort_rows(
                &self.dataset,
                &self.keys,
                &self.view.filtered,
                self.state.sort_column,
                self.state.sort_direction,
            ));
        }
        // A shrinking filter result or a new dataset can strand the current page
        self.state.current_page = self.state.current_page.clamp(1, self.view.total_pages);
        self.view.page_slice = page_window(&self.view.sorted, self.state.current_page);

        trace!("Pipeline state {:?}", self.state);
        debug!(
            "Recomputed from {:?} in {}µs: {} of {} rows, page {}/{}",
            from,
            start_time.elapsed().as_micros(),
            self.view.filtered.len(),
            self.dataset.len(),
            self.state.current_page,
            self.view.total_pages
        );
        debug_assert_eq!(self.view, derive_view(&self.dataset, &self.state));
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn view(&self) -> &DerivedView {
        &self.view
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn filtered_countries(&self) -> impl Iterator<Item = &Country> {
        self.view.filtered.iter().map(|&idx| &self.dataset[idx])
    }

    #[cfg(test)]
    pub fn sorted_countries(&self) -> impl Iterator<Item = &Country> {
        self.view.sorted.iter().map(|&idx| &self.dataset[idx])
    }

    pub fn page_slice(&self) -> impl Iterator<Item = &Country> {
        self.view.page_slice.iter().map(|&idx| &self.dataset[idx])
    }

    pub fn total_pages(&self) -> usize {
        self.view.total_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::country::tests::country;

    fn names<'a>(countries: impl Iterator<Item = &'a Country>) -> Vec<&'a str> {
        countries.map(|c| c.display_name.as_str()).collect()
    }

    fn three_countries() -> Dataset {
        Arc::new(vec![
            country("Botswana", 2_351_625, 582_000.0),
            country("Tonga", 105_697, 747.0),
            country("Greece", 10_715_549, 131_990.0),
        ])
    }

    fn alphabet(n: u8) -> Dataset {
        Arc::new(
            (0..n)
                .map(|i| {
                    let letter = (b'A' + i) as char;
                    country(
                        &format!("Country {letter}"),
                        1_000_000 * (i as u64 + 1),
                        1000.0 * (i as f64 + 1.0),
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn default_state_sorts_by_name_ascending() {
        let mut pipeline = Pipeline::new(three_countries());
        assert_eq!(names(pipeline.page_slice()), ["Botswana", "Greece", "Tonga"]);

        pipeline.set_sort(SortColumn::Name);
        assert_eq!(pipeline.state().sort_direction, SortDirection::Desc);
        assert_eq!(names(pipeline.page_slice()), ["Tonga", "Greece", "Botswana"]);

        pipeline.set_sort(SortColumn::Name);
        assert_eq!(names(pipeline.page_slice()), ["Botswana", "Greece", "Tonga"]);
    }

    #[test]
    fn new_column_starts_ascending() {
        let mut pipeline = Pipeline::new(three_countries());
        pipeline.set_sort(SortColumn::Name);
        pipeline.set_sort(SortColumn::Population);
        assert_eq!(pipeline.state().sort_column, SortColumn::Population);
        assert_eq!(pipeline.state().sort_direction, SortDirection::Asc);
        assert_eq!(names(pipeline.page_slice()), ["Tonga", "Botswana", "Greece"]);

        pipeline.set_sort(SortColumn::Area);
        assert_eq!(names(pipeline.page_slice()), ["Tonga", "Greece", "Botswana"]);
        pipeline.set_sort(SortColumn::Area);
        assert_eq!(names(pipeline.page_slice()), ["Botswana", "Greece", "Tonga"]);
    }

    #[test]
    fn paginates_in_windows_of_ten() {
        let mut pipeline = Pipeline::new(alphabet(12));
        let first = names(pipeline.page_slice());
        assert_eq!(first.len(), 10);
        assert_eq!(first.first(), Some(&"Country A"));
        assert_eq!(first.last(), Some(&"Country J"));
        assert_eq!(pipeline.total_pages(), 2);

        pipeline.set_page(2);
        assert_eq!(names(pipeline.page_slice()), ["Country K", "Country L"]);
    }

    #[test]
    fn set_page_clamps() {
        let mut pipeline = Pipeline::new(alphabet(25));
        assert_eq!(pipeline.total_pages(), 3);

        pipeline.set_page(0);
        assert_eq!(pipeline.state().current_page, 1);
        pipeline.set_page(pipeline.total_pages() + 5);
        assert_eq!(pipeline.state().current_page, 3);
        assert_eq!(pipeline.page_slice().count(), 5);

        pipeline.next_page();
        assert_eq!(pipeline.state().current_page, 3);
        pipeline.first_page();
        pipeline.previous_page();
        assert_eq!(pipeline.state().current_page, 1);
        pipeline.last_page();
        assert_eq!(pipeline.state().current_page, 3);
    }

    #[test]
    fn search_filters_case_insensitively_and_resets_page() {
        let mut pipeline = Pipeline::new(alphabet(12));
        pipeline.set_page(2);

        pipeline.set_search_term("country k");
        assert_eq!(pipeline.state().current_page, 1);
        assert_eq!(names(pipeline.filtered_countries()), ["Country K"]);

        pipeline.set_page(1);
        pipeline.set_search_term("COUNTRY");
        assert_eq!(pipeline.filtered_countries().count(), 12);
        pipeline.set_page(2);
        pipeline.set_search_term("COUNTRY");
        assert_eq!(pipeline.state().current_page, 1);
    }

    #[test]
    fn every_filtered_row_contains_the_term() {
        let dataset = Arc::new(vec![
            country("Botswana", 1, 1.0),
            country("Tonga", 1, 1.0),
            country("Greece", 1, 1.0),
            country("Bosnia and Herzegovina", 1, 1.0),
            country("Togo", 1, 1.0),
        ]);
        let mut pipeline = Pipeline::new(dataset.clone());
        for term in ["o", "BO", "go", "na", "zz", "e"] {
            pipeline.set_search_term(term);
            let needle = term.to_lowercase();
            assert!(
                pipeline
                    .filtered_countries()
                    .all(|c| c.display_name.to_lowercase().contains(&needle))
            );
            let expected = dataset
                .iter()
                .filter(|c| c.display_name.to_lowercase().contains(&needle))
                .count();
            assert_eq!(pipeline.filtered_countries().count(), expected);
        }

        pipeline.set_search_term("");
        assert!(pipeline.filtered_countries().eq(dataset.iter()));
    }

    #[test]
    fn filter_keeps_dataset_order() {
        let dataset = alphabet(30);
        let rows = filter_rows(&dataset, "country");
        assert_eq!(rows, (0..30).collect::<Vec<_>>());
    }

    #[test]
    fn empty_dataset() {
        let mut pipeline = Pipeline::default();
        assert_eq!(pipeline.filtered_countries().count(), 0);
        assert_eq!(pipeline.page_slice().count(), 0);
        assert_eq!(pipeline.total_pages(), 1);

        pipeline.set_page(4);
        assert_eq!(pipeline.state().current_page, 1);
    }

    #[test]
    fn no_match_still_has_one_page() {
        let mut pipeline = Pipeline::new(three_countries());
        pipeline.set_search_term("atlantis");
        assert_eq!(pipeline.total_pages(), 1);
        assert_eq!(pipeline.page_slice().count(), 0);
    }

    #[test]
    fn names_sort_locale_aware() {
        let dataset = Arc::new(vec![
            country("Zambia", 1, 1.0),
            country("Åland Islands", 1, 1.0),
            country("algeria", 1, 1.0),
            country("Albania", 1, 1.0),
        ]);
        let pipeline = Pipeline::new(dataset);
        assert_eq!(
            names(pipeline.sorted_countries()),
            ["Åland Islands", "Albania", "algeria", "Zambia"]
        );
    }

    #[test]
    fn replacing_the_dataset_keeps_state_and_clamps_page() {
        let mut pipeline = Pipeline::new(alphabet(25));
        pipeline.set_sort(SortColumn::Population);
        pipeline.set_page(3);

        pipeline.set_dataset(alphabet(12));
        assert_eq!(pipeline.state().sort_column, SortColumn::Population);
        assert_eq!(pipeline.state().current_page, 2);
        assert_eq!(names(pipeline.page_slice()), ["Country K", "Country L"]);
    }

    #[test]
    fn cached_stages_match_full_derivation() {
        let mut pipeline = Pipeline::new(alphabet(26));
        let steps: [fn(&mut Pipeline); 10] = [
            |p| p.set_search_term("country"),
            |p| p.set_sort(SortColumn::Area),
            |p| p.set_page(3),
            |p| p.set_sort(SortColumn::Area),
            |p| p.set_search_term("y a"),
            |p| p.set_search_term(""),
            |p| p.last_page(),
            |p| p.set_sort(SortColumn::Name),
            |p| p.set_dataset(alphabet(7)),
            |p| p.previous_page(),
        ];

        for step in steps {
            step(&mut pipeline);
            let expected = derive_view(pipeline.dataset(), pipeline.state());
            assert_eq!(pipeline.view(), &expected, "state {:?}", pipeline.state());
        }
    }

    #[test]
    fn page_window_past_the_end_is_empty() {
        let rows: Vec<usize> = (0..12).collect();
        assert_eq!(page_window(&rows, 2), vec![10, 11]);
        assert!(page_window(&rows, 3).is_empty());
        assert_eq!(page_window(&rows, 0), page_window(&rows, 1));
    }

    #[test]
    fn folds_accents() {
        assert_eq!(collation_key("Côte d'Ivoire"), "cote d'ivoire");
        assert_eq!(collation_key("São Tomé and Príncipe"), "sao tome and principe");
        assert_eq!(collation_key("Curaçao"), "curacao");
    }
}
