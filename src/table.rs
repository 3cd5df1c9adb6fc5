use crate::country::Country;
use crate::domain::{SortColumn, SortDirection};

pub const HEADERS: [&str; 5] = ["Flag", "Country Name", "Capital", "Population", "Area (km²)"];
pub const MISSING_CAPITAL: &str = "N/A";
const MISSING_FLAG: &str = "⚑";

/// Header labels, the active sort column carries a direction marker.
pub fn header_labels(column: SortColumn, direction: SortDirection) -> [String; 5] {
    let active = match column {
        SortColumn::Name => 1,
        SortColumn::Population => 3,
        SortColumn::Area => 4,
    };
    let marker = match direction {
        SortDirection::Asc => "▲",
        SortDirection::Desc => "▼",
    };
    std::array::from_fn(|idx| {
        if idx == active {
            format!("{} {marker}", HEADERS[idx])
        } else {
            HEADERS[idx].to_string()
        }
    })
}

pub fn row_cells(country: &Country) -> [String; 5] {
    [
        flag_code(&country.flag_image_url),
        country.display_name.clone(),
        capital_cell(country),
        group_thousands(country.population),
        format_decimal(country.area),
    ]
}

pub fn capital_cell(country: &Country) -> String {
    country
        .capital
        .first()
        .filter(|c| !c.is_empty())
        .cloned()
        .unwrap_or_else(|| MISSING_CAPITAL.to_string())
}

/// Country code of a flag image like `https://flagcdn.com/w320/bw.png` -> `BW`.
pub fn flag_code(url: &str) -> String {
    let stem = url
        .rsplit('/')
        .next()
        .and_then(|file| file.split('.').next())
        .unwrap_or("");
    if stem.len() == 2 && stem.chars().all(|c| c.is_ascii_alphabetic()) {
        stem.to_ascii_uppercase()
    } else {
        MISSING_FLAG.to_string()
    }
}

pub fn page_label(current_page: usize, total_pages: usize) -> String {
    format!("Page {current_page} of {total_pages}")
}

pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, c) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Grouped integer part and at most three fraction digits, trailing zeros dropped.
pub fn format_decimal(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    let integer = rounded.trunc();
    let fraction = ((rounded - integer) * 1000.0).round() as u64;
    if fraction == 0 {
        group_thousands(integer as u64)
    } else {
        let digits = format!("{fraction:03}");
        format!(
            "{}.{}",
            group_thousands(integer as u64),
            digits.trim_end_matches('0')
        )
    }
}
