//! TLE parsing utilities

use anyhow::bail;
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

use crate::tle::types::CatalogId;

/// Marker Celestrak returns for an unknown catalog number or group.
pub const NO_DATA_MARKER: &str = "No GP data found";

/// One name/line1/line2 triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TleBlock {
    pub name: Option<String>,
    pub line1: String,
    pub line2: String,
}

impl TleBlock {
    /// Satellite number field of line 1 (columns 3-7).
    pub fn catalog_field(&self) -> Option<&str> {
        catalog_field(&self.line1)
    }

    /// Block text in canonical three-line form.
    pub fn to_text(&self) -> String {
        match &self.name {
            Some(name) => format!("{}\n{}\n{}\n", name, self.line1, self.line2),
            None => format!("{}\n{}\n", self.line1, self.line2),
        }
    }
}

/// Parse TLE epoch from line 1 to UTC DateTime
pub fn parse_tle_epoch_to_utc(line1: &str) -> Option<DateTime<Utc>> {
    // Epoch field: columns 19-32 (1-based), YYDDD.DDDDDDDD
    let field = line1.get(18..32)?.trim();
    let (yyddd, frac) = field.split_once('.').unwrap_or((field, "0"));
    if yyddd.len() != 5 || !yyddd.is_ascii() {
        return None;
    }
    let yy: i32 = yyddd.get(..2)?.parse().ok()?;
    let day_of_year: i64 = yyddd.get(2..)?.parse().ok()?;
    if !(1..=366).contains(&day_of_year) {
        return None;
    }
    let year = if yy >= 57 { 1900 + yy } else { 2000 + yy };
    let day_fraction: f64 = format!("0.{}", frac).parse().ok()?;

    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)?;
    let offset = TimeDelta::days(day_of_year - 1)
        + TimeDelta::nanoseconds((day_fraction * 86_400.0 * 1e9).round() as i64);
    Some(jan1.checked_add_signed(offset)?.and_utc())
}

fn catalog_field(line: &str) -> Option<&str> {
    line.get(2..7).map(str::trim)
}

fn catalog_matches(field: &str, catalog_id: &CatalogId) -> bool {
    match (field.parse::<u32>(), catalog_id.norad_number()) {
        (Ok(a), Some(b)) => a == b,
        _ => field.eq_ignore_ascii_case(catalog_id.as_str()),
    }
}

fn clean_lines(body: &str) -> Vec<&str> {
    body.lines()
        .map(|raw| raw.trim_matches(|c| c == '\u{feff}' || c == '\r' || c == '\n' || c == ' '))
        .filter(|line| !line.is_empty())
        .collect()
}

fn is_element_line(line: &str) -> bool {
    line.starts_with("1 ") || line.starts_with("2 ")
}

/// Scan arbitrary provider text for every line1/line2 pair, each with the
/// preceding name line when there is one.
pub fn parse_tle_blocks(body: &str) -> Vec<TleBlock> {
    let lines = clean_lines(body);
    let mut blocks = Vec::new();
    let mut i = 0usize;
    while i + 1 < lines.len() {
        let (l1, l2) = (lines[i], lines[i + 1]);
        let paired = l1.starts_with("1 ")
            && l2.starts_with("2 ")
            && catalog_field(l1).is_some()
            && catalog_field(l1) == catalog_field(l2);
        if !paired {
            i += 1;
            continue;
        }
        let name = i
            .checked_sub(1)
            .map(|n| lines[n])
            .filter(|prev| !is_element_line(prev))
            .map(str::to_string);
        blocks.push(TleBlock {
            name,
            line1: l1.to_string(),
            line2: l2.to_string(),
        });
        i += 2;
    }
    blocks
}

/// First block in `body` whose satellite number matches `catalog_id`.
pub fn extract_tle_block(body: &str, catalog_id: &CatalogId) -> anyhow::Result<TleBlock> {
    if let Some(block) = parse_tle_blocks(body)
        .into_iter()
        .find(|b| b.catalog_field().is_some_and(|f| catalog_matches(f, catalog_id)))
    {
        return Ok(block);
    }
    let sample: String = body.lines().take(6).collect::<Vec<_>>().join("\\n");
    bail!("no valid TLE pair found for {}. Sample: {}", catalog_id, sample);
}

/// True when the provider body says the requested object or group does not exist.
pub fn is_no_data_body(body: &str) -> bool {
    body.contains(NO_DATA_MARKER)
}
