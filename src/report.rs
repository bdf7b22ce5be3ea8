use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use csv::Writer;

use crate::placements::{CompanyAggregate, PlacementOverview, YearSummary};
use crate::predictor::{Chance, Prediction, ProgramOutlook, TrendDirection};

pub const PLACEMENT_SUMMARY_FILE: &str = "placement_summary.txt";
pub const YEAR_SUMMARY_FILE: &str = "year_summary.csv";
pub const COMPANY_TOTALS_FILE: &str = "company_totals.csv";
pub const PREDICTION_TEXT_FILE: &str = "prediction.txt";
pub const PREDICTION_CSV_FILE: &str = "prediction.csv";

const GENERATED_FILES: [&str; 5] = [
    PLACEMENT_SUMMARY_FILE,
    YEAR_SUMMARY_FILE,
    COMPANY_TOTALS_FILE,
    PREDICTION_TEXT_FILE,
    PREDICTION_CSV_FILE,
];

fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

fn describe_trend(outlook: &ProgramOutlook) -> String {
    match outlook.trend.direction {
        TrendDirection::Increasing => format!("increasing by {}", outlook.trend.magnitude),
        TrendDirection::Decreasing => format!("decreasing by {}", outlook.trend.magnitude),
        TrendDirection::Stable => "stable".to_string(),
        TrendDirection::Unknown => "n/a".to_string(),
    }
}

fn cutoff_cell(cutoff: Option<u32>) -> String {
    cutoff.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string())
}

fn chance_label(chance: Chance) -> &'static str {
    match chance {
        Chance::Eligible => "eligible",
        Chance::Borderline => "borderline",
        Chance::NotEligible => "not eligible",
    }
}

pub fn render_placement_summary(
    overview: &PlacementOverview,
    summaries: &[YearSummary],
    companies: &[CompanyAggregate],
    top: usize,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Placement Summary");
    let _ = writeln!(output, "=================");
    let _ = writeln!(output);
    let _ = writeln!(output, "Years covered: {}", overview.years);
    let _ = writeln!(output, "Total offers: {}", overview.total_offers);
    let _ = writeln!(output, "Distinct companies: {}", overview.distinct_companies);
    let _ = writeln!(output, "Average offers per year: {:.1}", overview.average_offers_per_year);
    if let Some(peak) = &overview.peak_year {
        let _ = writeln!(output, "Peak year: {peak}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Year by Year");
    let _ = writeln!(output, "------------");
    if summaries.is_empty() {
        let _ = writeln!(output, "No placement years recorded.");
    }
    for summary in summaries {
        let _ = writeln!(
            output,
            "{}: {} offers from {} companies ({} hiring, success {}), placement rate ~{}, growth {}, cumulative {}",
            summary.year,
            summary.total_offers,
            summary.total_companies,
            summary.companies_with_offers,
            percent(summary.company_success_rate),
            percent(summary.placement_rate),
            percent(summary.growth),
            summary.cumulative_offers
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Top Recruiters");
    let _ = writeln!(output, "--------------");
    if companies.is_empty() {
        let _ = writeln!(output, "No companies recorded.");
    }
    for (i, company) in companies.iter().take(top).enumerate() {
        let years: Vec<&str> = company.years_active.iter().map(String::as_str).collect();
        let _ = writeln!(
            output,
            "{}. {} - {} offers ({})",
            i + 1,
            company.company,
            company.total_offers,
            years.join(", ")
        );
    }

    output
}

pub fn render_prediction(prediction: &Prediction) -> String {
    let mut output = String::new();
    let query = &prediction.query;

    let _ = writeln!(output, "Admission Outlook");
    let _ = writeln!(output, "=================");
    let _ = writeln!(
        output,
        "Rank {} / category {} / stream {}",
        query.rank, query.category, query.stream
    );
    if let (Some(latest), Some(prior)) = (prediction.latest_year, prediction.prior_year) {
        let _ = writeln!(output, "Based on cutoffs from {prior} and {latest}");
    } else if let Some(latest) = prediction.latest_year {
        let _ = writeln!(output, "Based on cutoffs from {latest}");
    }

    for (title, outlooks) in [
        ("Eligible", &prediction.eligible),
        ("Borderline", &prediction.borderline),
        ("Not eligible", &prediction.not_eligible),
    ] {
        let _ = writeln!(output);
        let _ = writeln!(output, "{title} ({})", outlooks.len());
        for outlook in outlooks {
            let _ = writeln!(
                output,
                "- {} / {}: projected {:.0} (latest {}, prior {}, trend {}, confidence {:?})",
                outlook.institution,
                outlook.program,
                outlook.projected_cutoff,
                cutoff_cell(outlook.latest_cutoff),
                cutoff_cell(outlook.prior_cutoff),
                describe_trend(outlook),
                outlook.confidence
            );
        }
    }

    if !prediction.alternatives.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "Suggested programs");
        for alternative in &prediction.alternatives {
            let _ = writeln!(output, "- {}", alternative.program);
        }
    }

    output
}

pub fn write_year_summary_csv(summaries: &[YearSummary], path: &Path) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record([
        "Year",
        "Total_Offers",
        "Total_Companies",
        "Companies_With_Offers",
        "Company_Success_Rate",
        "Placement_Rate",
        "Growth",
        "Cumulative_Offers",
    ])?;

    for summary in summaries {
        writer.write_record([
            summary.year.clone(),
            summary.total_offers.to_string(),
            summary.total_companies.to_string(),
            summary.companies_with_offers.to_string(),
            format!("{:.4}", summary.company_success_rate),
            format!("{:.4}", summary.placement_rate),
            format!("{:.4}", summary.growth),
            summary.cumulative_offers.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_company_totals_csv(companies: &[CompanyAggregate], path: &Path) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(["Company", "Total_Offers", "Years_Active", "Per_Year_Offers"])?;

    for company in companies {
        let years: Vec<&str> = company.years_active.iter().map(String::as_str).collect();
        let per_year: Vec<String> = company
            .per_year_offers
            .iter()
            .map(|(year, offers)| format!("{year}:{offers}"))
            .collect();
        writer.write_record([
            company.company.clone(),
            company.total_offers.to_string(),
            years.join(";"),
            per_year.join(";"),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_prediction_csv(prediction: &Prediction, path: &Path) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record([
        "Institution",
        "Program",
        "Chance",
        "Projected_Cutoff",
        "Latest_Cutoff",
        "Prior_Cutoff",
        "Trend",
        "Confidence",
    ])?;

    for outlook in prediction.all_outlooks() {
        writer.write_record([
            outlook.institution.clone(),
            outlook.program.clone(),
            chance_label(outlook.chance).to_string(),
            format!("{:.1}", outlook.projected_cutoff),
            cutoff_cell(outlook.latest_cutoff),
            cutoff_cell(outlook.prior_cutoff),
            describe_trend(outlook),
            format!("{:?}", outlook.confidence),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Remove files a previous run generated; anything else in the directory stays.
pub fn clean_output_directory(output_dir: &Path) -> Result<usize> {
    if !output_dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for item in GENERATED_FILES {
        let path = output_dir.join(item);
        if path.is_file() {
            fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
            removed += 1;
        }
    }
    Ok(removed)
}

pub struct PlacementReport<'a> {
    pub overview: &'a PlacementOverview,
    pub summaries: &'a [YearSummary],
    pub companies: &'a [CompanyAggregate],
}

/// Write every report into `output_dir`, returning the file names written.
pub fn write_reports(
    output_dir: &Path,
    placements: &PlacementReport<'_>,
    prediction: Option<&Prediction>,
) -> Result<Vec<&'static str>> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    // Clean up previous results
    clean_output_directory(output_dir)?;

    // Placement reports

    let summary = render_placement_summary(placements.overview, placements.summaries, placements.companies, 10);
    fs::write(output_dir.join(PLACEMENT_SUMMARY_FILE), summary)?;
    write_year_summary_csv(placements.summaries, &output_dir.join(YEAR_SUMMARY_FILE))?;
    write_company_totals_csv(placements.companies, &output_dir.join(COMPANY_TOTALS_FILE))?;

    let mut written = vec![PLACEMENT_SUMMARY_FILE, YEAR_SUMMARY_FILE, COMPANY_TOTALS_FILE];

    // Prediction reports, only when a query was given
    if let Some(prediction) = prediction {
        fs::write(output_dir.join(PREDICTION_TEXT_FILE), render_prediction(prediction))?;
        write_prediction_csv(prediction, &output_dir.join(PREDICTION_CSV_FILE))?;
        written.push(PREDICTION_TEXT_FILE);
        written.push(PREDICTION_CSV_FILE);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CutoffTable;
    use crate::models::{
        Category, CompanyPlacement, CutoffRecord, PlacementSettings, PlacementYearRecord, PredictionSettings, Stream,
    };
    use crate::placements::{aggregate_by_company, PlacementAggregator};
    use crate::predictor::{CutoffMatcher, PredictionQuery};

    fn years() -> Vec<PlacementYearRecord> {
        vec![
            PlacementYearRecord {
                year: "2019".to_string(),
                companies: vec![CompanyPlacement {
                    company: "TCS".to_string(),
                    offers: 5,
                    remarks: None,
                }],
            },
            PlacementYearRecord {
                year: "2022".to_string(),
                companies: vec![CompanyPlacement {
                    company: "TCS".to_string(),
                    offers: 8,
                    remarks: Some("Digital role".to_string()),
                }],
            },
        ]
    }

    fn prediction() -> Prediction {
        let table = CutoffTable::from_records(vec![
            CutoffRecord {
                institution: "LDCE".to_string(),
                program: "Computer".to_string(),
                category: Category::Open,
                year: 2024,
                cutoff: Some(12000),
            },
            CutoffRecord {
                institution: "LDCE".to_string(),
                program: "Computer".to_string(),
                category: Category::Open,
                year: 2025,
                cutoff: Some(10000),
            },
        ])
        .unwrap();
        let settings = PredictionSettings::default();
        let query = PredictionQuery::new(9000, Category::Open, Stream::Science).unwrap();
        CutoffMatcher::new(&table, &settings).predict(&query)
    }

    #[test]
    fn placement_summary_lists_top_recruiters() {
        let settings = PlacementSettings::default();
        let aggregator = PlacementAggregator::new(&settings);
        let years = years();
        let text = render_placement_summary(
            &aggregator.overview(&years),
            &aggregator.summarize_by_year(&years),
            &aggregate_by_company(&years),
            5,
        );

        assert!(text.contains("Total offers: 13"));
        assert!(text.contains("Peak year: 2022"));
        assert!(text.contains("1. TCS - 13 offers (2019, 2022)"));
    }

    #[test]
    fn prediction_text_groups_by_chance() {
        let text = render_prediction(&prediction());
        assert!(text.contains("Based on cutoffs from 2024 and 2025"));
        assert!(text.contains("Eligible (1)"));
        assert!(text.contains("LDCE / Computer: projected 9400"));
        assert!(text.contains("trend decreasing by 2000"));
    }

    #[test]
    fn writes_and_cleans_generated_files() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PlacementSettings::default();
        let aggregator = PlacementAggregator::new(&settings);
        let years = years();
        let overview = aggregator.overview(&years);
        let summaries = aggregator.summarize_by_year(&years);
        let companies = aggregate_by_company(&years);
        let report = PlacementReport {
            overview: &overview,
            summaries: &summaries,
            companies: &companies,
        };

        fs::write(dir.path().join("keep.txt"), "user file").unwrap();
        let prediction = prediction();
        let written = write_reports(dir.path(), &report, Some(&prediction)).unwrap();
        assert_eq!(written.len(), 5);

        let totals = fs::read_to_string(dir.path().join(COMPANY_TOTALS_FILE)).unwrap();
        assert!(totals.contains("TCS,13,2019;2022,2019:5;2022:8"));

        let written = write_reports(dir.path(), &report, None).unwrap();
        assert_eq!(written.len(), 3);
        assert!(!dir.path().join(PREDICTION_CSV_FILE).exists());
        assert!(dir.path().join("keep.txt").exists());
    }
}
