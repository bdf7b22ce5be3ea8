//! Loading and validation of the static reference datasets.
//!
//! Everything here runs once at start-up. Any malformed record aborts the load:
//! serving predictions or aggregates from a half-valid dataset is worse than
//! refusing to start.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{DataError, DataResult};
use crate::models::{Category, CompanyPlacement, Config, CutoffRecord, PlacementYearRecord};

/// An (institution, program) pair that may publish cutoffs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Offering {
    pub institution: String,
    pub program: String,
}

/// Cutoffs of one offering for one category in the two reference years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CutoffHistory {
    pub latest: Option<u32>,
    pub prior: Option<u32>,
}

impl CutoffHistory {
    pub fn is_empty(&self) -> bool {
        self.latest.is_none() && self.prior.is_none()
    }
}

/// Immutable cutoff lookup built from validated records.
#[derive(Debug, Clone, Default)]
pub struct CutoffTable {
    offerings: BTreeMap<Offering, BTreeMap<(Category, u16), u32>>,
    latest_year: Option<u16>,
    prior_year: Option<u16>,
    record_count: usize,
}

impl CutoffTable {
    /// Index records, skipping rows without a cutoff value.
    pub fn from_records<I>(records: I) -> DataResult<Self>
    where
        I: IntoIterator<Item = CutoffRecord>,
    {
        let mut offerings: BTreeMap<Offering, BTreeMap<(Category, u16), u32>> = BTreeMap::new();
        let mut years: Vec<u16> = Vec::new();
        let mut record_count = 0usize;
        // Every key, including no-seat rows, may appear only once.
        let mut seen: HashSet<(Offering, Category, u16)> = HashSet::new();

        for record in records {
            let institution = record.institution.trim().to_string();
            let program = record.program.trim().to_string();
            if institution.is_empty() || program.is_empty() {
                return Err(DataError::UnnamedOffering {
                    origin: "cutoff data".to_string(),
                });
            }

            let offering = Offering {
                institution,
                program,
            };
            if !seen.insert((offering.clone(), record.category, record.year)) {
                return Err(DataError::DuplicateCutoff {
                    institution: offering.institution,
                    program: offering.program,
                    category: record.category.to_string(),
                    year: record.year,
                });
            }

            let Some(raw_cutoff) = record.cutoff else {
                continue;
            };
            let cutoff = match u32::try_from(raw_cutoff) {
                Ok(value) if value > 0 => value,
                _ => {
                    return Err(DataError::NonPositiveCutoff {
                        origin: "cutoff data".to_string(),
                        institution: offering.institution,
                        program: offering.program,
                        cutoff: raw_cutoff,
                    })
                }
            };

            offerings
                .entry(offering)
                .or_default()
                .insert((record.category, record.year), cutoff);

            if !years.contains(&record.year) {
                years.push(record.year);
            }
            record_count += 1;
        }

        years.sort_unstable_by(|a, b| b.cmp(a));

        Ok(Self {
            offerings,
            latest_year: years.first().copied(),
            prior_year: years.get(1).copied(),
            record_count,
        })
    }

    pub fn latest_year(&self) -> Option<u16> {
        self.latest_year
    }

    pub fn prior_year(&self) -> Option<u16> {
        self.prior_year
    }

    pub fn len(&self) -> usize {
        self.record_count
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    pub fn offering_count(&self) -> usize {
        self.offerings.len()
    }

    pub fn cutoff(&self, offering: &Offering, category: Category, year: u16) -> Option<u32> {
        self.offerings
            .get(offering)
            .and_then(|cutoffs| cutoffs.get(&(category, year)))
            .copied()
    }

    /// Latest and prior-year cutoffs of every offering that has at least one of
    /// them for `category`. Offerings with no data are left out.
    pub fn histories(&self, category: Category) -> Vec<(&Offering, CutoffHistory)> {
        self.offerings
            .iter()
            .filter_map(|(offering, cutoffs)| {
                let lookup = |year: Option<u16>| year.and_then(|y| cutoffs.get(&(category, y)).copied());
                let history = CutoffHistory {
                    latest: lookup(self.latest_year),
                    prior: lookup(self.prior_year),
                };
                (!history.is_empty()).then_some((offering, history))
            })
            .collect()
    }
}

/// Everything the analytics read. Loaded once, shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub cutoffs: CutoffTable,
    pub placements: Vec<PlacementYearRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum YearLabel {
    Text(String),
    Number(u64),
}

impl YearLabel {
    fn into_label(self) -> String {
        match self {
            YearLabel::Text(text) => text.trim().to_string(),
            YearLabel::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCompany {
    company: String,
    offers: i64,
    #[serde(default)]
    remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawYear {
    year: YearLabel,
    companies: Vec<RawCompany>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum YearFile {
    Record(RawYear),
    Companies(Vec<RawCompany>),
}

#[derive(Debug, Deserialize)]
struct CsvPlacementRow {
    year: String,
    company: String,
    offers: i64,
    #[serde(default)]
    remarks: Option<String>,
}

fn validate_year(year: String, companies: Vec<RawCompany>, origin: &str) -> DataResult<PlacementYearRecord> {
    if year.is_empty() {
        return Err(DataError::EmptyYear {
            origin: origin.to_string(),
        });
    }

    let mut validated = Vec::with_capacity(companies.len());
    for raw in companies {
        let company = raw.company.trim().to_string();
        if company.is_empty() {
            return Err(DataError::EmptyCompany {
                origin: origin.to_string(),
                year,
            });
        }
        let offers = u32::try_from(raw.offers).map_err(|_| DataError::NegativeOffers {
            origin: origin.to_string(),
            year: year.clone(),
            company: company.clone(),
            offers: raw.offers,
        })?;
        let remarks = raw
            .remarks
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        validated.push(CompanyPlacement {
            company,
            offers,
            remarks,
        });
    }

    Ok(PlacementYearRecord {
        year,
        companies: validated,
    })
}

/// Reject repeated year labels and order the series by label.
pub fn merge_years(records: Vec<PlacementYearRecord>) -> DataResult<Vec<PlacementYearRecord>> {
    let mut seen = HashSet::new();
    for record in &records {
        if !seen.insert(record.year.clone()) {
            return Err(DataError::DuplicateYear {
                year: record.year.clone(),
            });
        }
    }

    let mut records = records;
    records.sort_by(|a, b| a.year.cmp(&b.year));
    Ok(records)
}

fn parse_error(origin: &str, err: impl std::fmt::Display) -> DataError {
    DataError::Parse {
        origin: origin.to_string(),
        message: err.to_string(),
    }
}

pub fn parse_cutoffs_json(content: &str, origin: &str) -> DataResult<Vec<CutoffRecord>> {
    serde_json::from_str(content).map_err(|e| parse_error(origin, e))
}

pub fn parse_cutoffs_csv<R: std::io::Read>(reader: R, origin: &str) -> DataResult<Vec<CutoffRecord>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    reader
        .deserialize::<CutoffRecord>()
        .map(|row| row.map_err(|e| parse_error(origin, e)))
        .collect()
}

pub fn parse_placements_json(content: &str, origin: &str) -> DataResult<Vec<PlacementYearRecord>> {
    let raw: Vec<RawYear> = serde_json::from_str(content).map_err(|e| parse_error(origin, e))?;
    raw.into_iter()
        .map(|year| validate_year(year.year.into_label(), year.companies, origin))
        .collect()
}

/// CSV rows are grouped by year in order of first appearance.
pub fn parse_placements_csv<R: std::io::Read>(reader: R, origin: &str) -> DataResult<Vec<PlacementYearRecord>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut grouped: Vec<(String, Vec<RawCompany>)> = Vec::new();

    for row in reader.deserialize::<CsvPlacementRow>() {
        let row = row.map_err(|e| parse_error(origin, e))?;
        let company = RawCompany {
            company: row.company,
            offers: row.offers,
            remarks: row.remarks,
        };
        match grouped.iter().position(|(year, _)| *year == row.year) {
            Some(index) => grouped[index].1.push(company),
            None => grouped.push((row.year, vec![company])),
        }
    }

    grouped
        .into_iter()
        .map(|(year, companies)| validate_year(year, companies, origin))
        .collect()
}

/// One year per file; a bare company array takes its year from the file stem.
pub fn parse_placement_year_file(content: &str, path: &Path) -> DataResult<PlacementYearRecord> {
    let origin = path.display().to_string();
    let parsed: YearFile = serde_json::from_str(content).map_err(|e| parse_error(&origin, e))?;
    match parsed {
        YearFile::Record(record) => validate_year(record.year.into_label(), record.companies, &origin),
        YearFile::Companies(companies) => {
            let year = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_default()
                .trim()
                .to_string();
            validate_year(year, companies, &origin)
        }
    }
}

fn read_file(path: &Path) -> DataResult<String> {
    fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

pub fn load_cutoff_file(path: &Path) -> DataResult<Vec<CutoffRecord>> {
    let origin = path.display().to_string();
    match extension(path).as_deref() {
        Some("json") => parse_cutoffs_json(&read_file(path)?, &origin),
        Some("csv") => parse_cutoffs_csv(read_file(path)?.as_bytes(), &origin),
        _ => Err(DataError::UnsupportedFormat(path.to_path_buf())),
    }
}

pub fn load_placement_file(path: &Path) -> DataResult<Vec<PlacementYearRecord>> {
    let origin = path.display().to_string();
    match extension(path).as_deref() {
        Some("json") => parse_placements_json(&read_file(path)?, &origin),
        Some("csv") => parse_placements_csv(read_file(path)?.as_bytes(), &origin),
        _ => Err(DataError::UnsupportedFormat(path.to_path_buf())),
    }
}

pub fn load_placement_dir(dir: &Path) -> DataResult<Vec<PlacementYearRecord>> {
    let entries = fs::read_dir(dir).map_err(|source| DataError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DataError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if extension(&path).as_deref() == Some("json") {
            paths.push(path);
        } else {
            debug!(path = %path.display(), "Skipping non-JSON file in placement directory");
        }
    }
    paths.sort();

    paths
        .iter()
        .map(|path| parse_placement_year_file(&read_file(path)?, path))
        .collect()
}

fn first_existing(dir: &Path, stem: &str) -> Option<PathBuf> {
    ["json", "csv"]
        .iter()
        .map(|ext| dir.join(format!("{stem}.{ext}")))
        .find(|path| path.is_file())
}

pub struct DataLoader {
    client: reqwest::Client,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Load and validate every dataset the configuration points at.
    pub async fn load(&self, config: &Config) -> DataResult<ReferenceData> {
        let mode = config.data_source_mode;
        let mut cutoff_records = Vec::new();
        let mut placement_years = Vec::new();
        let mut cutoff_sources = 0usize;
        let mut placement_sources = 0usize;

        // Local files
        if mode.uses_local() {
            let dir = Path::new(config.data_directory());
            info!(directory = %dir.display(), "Reading local reference data");

            if let Some(path) = first_existing(dir, "cutoffs") {
                cutoff_records.extend(load_cutoff_file(&path)?);
                cutoff_sources += 1;
            } else {
                warn!(directory = %dir.display(), "No cutoffs.json or cutoffs.csv found");
            }

            let placement_dir = dir.join("placements");
            if placement_dir.is_dir() {
                placement_years.extend(load_placement_dir(&placement_dir)?);
                placement_sources += 1;
            } else if let Some(path) = first_existing(dir, "placements") {
                placement_years.extend(load_placement_file(&path)?);
                placement_sources += 1;
            } else {
                warn!(directory = %dir.display(), "No placement data found");
            }
        }

        // Remote datasets
        if mode.uses_internet() {
            for url in config.cutoff_urls.iter().flatten() {
                let body = self.fetch(url).await?;
                cutoff_records.extend(parse_cutoffs_json(&body, url)?);
                cutoff_sources += 1;
            }
            for url in config.placement_urls.iter().flatten() {
                let body = self.fetch(url).await?;
                placement_years.extend(parse_placements_json(&body, url)?);
                placement_sources += 1;
            }
        }

        // Validate and index
        if cutoff_sources == 0 {
            return Err(DataError::NoSource("cutoff"));
        }
        if placement_sources == 0 {
            return Err(DataError::NoSource("placement"));
        }

        let cutoffs = CutoffTable::from_records(cutoff_records)?;
        let placements = merge_years(placement_years)?;

        info!(
            cutoffs = cutoffs.len(),
            offerings = cutoffs.offering_count(),
            latest_year = ?cutoffs.latest_year(),
            placement_years = placements.len(),
            "Reference data loaded"
        );

        Ok(ReferenceData {
            cutoffs,
            placements,
        })
    }

    pub async fn fetch(&self, url: &str) -> DataResult<String> {
        info!(url, "Fetching reference data");
        let fetch_error = |message: String| DataError::Fetch {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(fetch_error(format!("HTTP status {}", response.status())));
        }

        response.text().await.map_err(|e| fetch_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(institution: &str, program: &str, category: Category, year: u16, cutoff: Option<i64>) -> CutoffRecord {
        CutoffRecord {
            institution: institution.to_string(),
            program: program.to_string(),
            category,
            year,
            cutoff,
        }
    }

    #[test]
    fn table_picks_two_most_recent_years() {
        let table = CutoffTable::from_records(vec![
            record("LDCE", "Computer", Category::Open, 2023, Some(9000)),
            record("LDCE", "Computer", Category::Open, 2025, Some(10000)),
            record("LDCE", "Computer", Category::Open, 2024, Some(12000)),
        ])
        .unwrap();

        assert_eq!(table.latest_year(), Some(2025));
        assert_eq!(table.prior_year(), Some(2024));
        let offering = Offering {
            institution: "LDCE".to_string(),
            program: "Computer".to_string(),
        };
        assert_eq!(table.cutoff(&offering, Category::Open, 2023), Some(9000));
        assert_eq!(table.cutoff(&offering, Category::Sc, 2023), None);

        let histories = table.histories(Category::Open);
        assert_eq!(histories.len(), 1);
        assert_eq!(
            histories[0].1,
            CutoffHistory {
                latest: Some(10000),
                prior: Some(12000)
            }
        );
    }

    #[test]
    fn missing_cutoff_is_no_seat_not_zero() {
        let table = CutoffTable::from_records(vec![
            record("VGEC", "Civil", Category::Sc, 2025, None),
            record("VGEC", "Civil", Category::Sc, 2024, Some(40000)),
        ])
        .unwrap();

        assert_eq!(table.len(), 1);
        let histories = table.histories(Category::Sc);
        assert_eq!(histories[0].1.latest, None);
        assert_eq!(histories[0].1.prior, Some(40000));
        assert!(table.histories(Category::St).is_empty());
    }

    #[test]
    fn rejects_duplicate_and_non_positive_cutoffs() {
        let duplicate = CutoffTable::from_records(vec![
            record("LDCE", "IT", Category::Ews, 2025, Some(100)),
            record("LDCE", "IT", Category::Ews, 2025, Some(120)),
        ]);
        assert!(matches!(duplicate, Err(DataError::DuplicateCutoff { year: 2025, .. })));

        let zero = CutoffTable::from_records(vec![record("LDCE", "IT", Category::Ews, 2025, Some(0))]);
        assert!(matches!(zero, Err(DataError::NonPositiveCutoff { cutoff: 0, .. })));
    }

    #[test]
    fn no_seat_row_still_claims_its_key() {
        let null_then_value = CutoffTable::from_records(vec![
            record("LDCE", "IT", Category::Open, 2025, None),
            record("LDCE", "IT", Category::Open, 2025, Some(10)),
        ]);
        assert!(matches!(
            null_then_value,
            Err(DataError::DuplicateCutoff { year: 2025, .. })
        ));

        let value_then_null = CutoffTable::from_records(vec![
            record("LDCE", "IT", Category::Open, 2025, Some(10)),
            record("LDCE", "IT", Category::Open, 2025, None),
        ]);
        assert!(matches!(
            value_then_null,
            Err(DataError::DuplicateCutoff { year: 2025, .. })
        ));

        // Same offering in another category or year is a different key.
        let distinct = CutoffTable::from_records(vec![
            record("LDCE", "IT", Category::Open, 2025, None),
            record("LDCE", "IT", Category::Sc, 2025, Some(10)),
            record("LDCE", "IT", Category::Open, 2024, Some(12)),
        ])
        .unwrap();
        assert_eq!(distinct.len(), 2);
    }

    #[test]
    fn cutoff_csv_accepts_empty_cells() {
        let csv = "institution,program,category,year,cutoff\n\
                   LDCE,Computer,OPEN,2025,10000\n\
                   LDCE,Computer,SEBC,2025,\n";
        let records = parse_cutoffs_csv(csv.as_bytes(), "inline").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].cutoff, None);
    }

    #[test]
    fn non_numeric_cutoff_is_a_parse_error() {
        let json = r#"[{"institution":"LDCE","program":"IT","category":"OPEN","year":2025,"cutoff":"abc"}]"#;
        assert!(matches!(parse_cutoffs_json(json, "inline"), Err(DataError::Parse { .. })));
    }

    #[test]
    fn placements_json_accepts_numeric_year_labels() {
        let json = r#"[
            {"year": 2019, "companies": [{"company": " TCS ", "offers": 5, "remarks": ""}]},
            {"year": "2020", "companies": [{"company": "Infosys", "offers": 3, "remarks": "Dream"}]}
        ]"#;
        let years = parse_placements_json(json, "inline").unwrap();
        assert_eq!(years[0].year, "2019");
        assert_eq!(years[0].companies[0].company, "TCS");
        assert_eq!(years[0].companies[0].remarks, None);
        assert_eq!(years[1].companies[0].remarks.as_deref(), Some("Dream"));
    }

    #[test]
    fn negative_offers_are_fatal() {
        let json = r#"[{"year": "2021", "companies": [{"company": "Wipro", "offers": -2}]}]"#;
        let err = parse_placements_json(json, "inline").unwrap_err();
        assert!(matches!(err, DataError::NegativeOffers { offers: -2, .. }));
    }

    #[test]
    fn empty_company_name_is_fatal() {
        let json = r#"[{"year": "2021", "companies": [{"company": "  ", "offers": 2}]}]"#;
        assert!(matches!(
            parse_placements_json(json, "inline"),
            Err(DataError::EmptyCompany { .. })
        ));
    }

    #[test]
    fn placements_csv_groups_rows_by_year() {
        let csv = "year,company,offers,remarks\n\
                   2020,TCS,4,\n\
                   2019,TCS,5,\n\
                   2020,Infosys,2,Mass hiring\n";
        let years = parse_placements_csv(csv.as_bytes(), "inline").unwrap();
        assert_eq!(years.len(), 2);
        assert_eq!(years[0].year, "2020");
        assert_eq!(years[0].companies.len(), 2);

        let merged = merge_years(years).unwrap();
        assert_eq!(merged[0].year, "2019");
    }

    #[test]
    fn merge_rejects_repeated_years() {
        let year = PlacementYearRecord {
            year: "2022".to_string(),
            companies: Vec::new(),
        };
        assert!(matches!(
            merge_years(vec![year.clone(), year]),
            Err(DataError::DuplicateYear { .. })
        ));
    }

    #[test]
    fn year_directory_uses_file_stem_for_bare_arrays() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2022.json"), r#"[{"company": "TCS", "offers": 8}]"#).unwrap();
        fs::write(
            dir.path().join("other.json"),
            r#"{"year": "2019", "companies": [{"company": "TCS", "offers": 5}]}"#,
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let years = merge_years(load_placement_dir(dir.path()).unwrap()).unwrap();
        assert_eq!(years.len(), 2);
        assert_eq!(years[0].year, "2019");
        assert_eq!(years[1].year, "2022");
        assert_eq!(years[1].companies[0].offers, 8);
    }

    #[tokio::test]
    async fn loader_reports_missing_sources() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_directory: Some(dir.path().display().to_string()),
            ..Config::default()
        };

        let err = DataLoader::new().load(&config).await.unwrap_err();
        assert!(matches!(err, DataError::NoSource("cutoff")));
    }
}
