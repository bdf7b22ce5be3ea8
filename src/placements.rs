use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::models::{PlacementSettings, PlacementYearRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearSummary {
    pub year: String,
    pub total_offers: u64,
    pub total_companies: usize,
    pub companies_with_offers: usize,
    pub company_success_rate: f64,
    /// Offers against the assumed batch size, capped at 1. An estimate only.
    pub placement_rate: f64,
    /// Change in total offers relative to the previous year; 0 for the first
    /// year or when the previous year had no offers.
    pub growth: f64,
    pub cumulative_offers: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyAggregate {
    pub company: String,
    pub total_offers: u64,
    pub years_active: BTreeSet<String>,
    pub per_year_offers: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacementOverview {
    pub years: usize,
    pub total_offers: u64,
    pub distinct_companies: usize,
    pub average_offers_per_year: f64,
    pub peak_year: Option<String>,
}

pub struct PlacementAggregator<'a> {
    settings: &'a PlacementSettings,
}

impl<'a> PlacementAggregator<'a> {
    pub fn new(settings: &'a PlacementSettings) -> Self {
        Self { settings }
    }

    /// Per-year statistics plus growth and cumulative series, in input order.
    pub fn summarize_by_year(&self, years: &[PlacementYearRecord]) -> Vec<YearSummary> {
        let batch_size = f64::from(self.settings.assumed_batch_size.max(1));
        let mut summaries: Vec<YearSummary> = Vec::with_capacity(years.len());
        let mut cumulative = 0u64;

        for record in years {
            let total_offers: u64 = record.companies.iter().map(|c| u64::from(c.offers)).sum();
            let total_companies = record.companies.len();
            let companies_with_offers = record.companies.iter().filter(|c| c.offers > 0).count();

            let company_success_rate = if total_companies == 0 {
                0.0
            } else {
                companies_with_offers as f64 / total_companies as f64
            };

            let growth = match summaries.last() {
                Some(previous) if previous.total_offers > 0 => {
                    (total_offers as f64 - previous.total_offers as f64) / previous.total_offers as f64
                }
                _ => 0.0,
            };

            cumulative += total_offers;

            summaries.push(YearSummary {
                year: record.year.clone(),
                total_offers,
                total_companies,
                companies_with_offers,
                company_success_rate,
                placement_rate: (total_offers as f64 / batch_size).min(1.0),
                growth,
                cumulative_offers: cumulative,
            });
        }

        summaries
    }

    pub fn overview(&self, years: &[PlacementYearRecord]) -> PlacementOverview {
        let summaries = self.summarize_by_year(years);
        let total_offers: u64 = summaries.iter().map(|s| s.total_offers).sum();

        let distinct_companies = years
            .iter()
            .flat_map(|record| record.companies.iter().map(|c| c.company.as_str()))
            .collect::<BTreeSet<_>>()
            .len();

        // Earliest year wins a tie for the peak.
        let peak_year = summaries
            .iter()
            .fold(None::<&YearSummary>, |best, current| match best {
                Some(best) if best.total_offers >= current.total_offers => Some(best),
                _ => Some(current),
            })
            .map(|s| s.year.clone());

        PlacementOverview {
            years: summaries.len(),
            total_offers,
            distinct_companies,
            average_offers_per_year: if summaries.is_empty() {
                0.0
            } else {
                total_offers as f64 / summaries.len() as f64
            },
            peak_year,
        }
    }
}

/// Fold every company entry across every year. Sorted by total offers
/// descending, then company name ascending.
pub fn aggregate_by_company(years: &[PlacementYearRecord]) -> Vec<CompanyAggregate> {
    let mut by_company: HashMap<&str, CompanyAggregate> = HashMap::new();

    for record in years {
        for placement in &record.companies {
            let offers = u64::from(placement.offers);
            let entry = by_company
                .entry(placement.company.as_str())
                .or_insert_with(|| CompanyAggregate {
                    company: placement.company.clone(),
                    total_offers: 0,
                    years_active: BTreeSet::new(),
                    per_year_offers: BTreeMap::new(),
                });

            entry.total_offers += offers;
            entry.years_active.insert(record.year.clone());
            *entry.per_year_offers.entry(record.year.clone()).or_insert(0) += offers;
        }
    }

    let mut companies: Vec<CompanyAggregate> = by_company.into_values().collect();
    companies.sort_by(compare_companies);
    companies
}

fn compare_companies(a: &CompanyAggregate, b: &CompanyAggregate) -> Ordering {
    b.total_offers
        .cmp(&a.total_offers)
        .then_with(|| a.company.cmp(&b.company))
}

/// Case-insensitive substring match on the company name, keeping input order.
pub fn filter_companies<'c>(query: &str, companies: &'c [CompanyAggregate]) -> Vec<&'c CompanyAggregate> {
    let needle = query.trim().to_lowercase();
    companies
        .iter()
        .filter(|c| needle.is_empty() || c.company.to_lowercase().contains(&needle))
        .collect()
}

pub fn top_companies(companies: &[CompanyAggregate], limit: usize) -> &[CompanyAggregate] {
    &companies[..limit.min(companies.len())]
}
