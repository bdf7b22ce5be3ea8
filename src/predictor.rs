use std::cmp::Ordering;

use serde::Serialize;

use crate::data::{CutoffHistory, CutoffTable};
use crate::error::ValidationError;
use crate::models::{Category, PredictionSettings, Stream};

/// A validated prediction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PredictionQuery {
    pub rank: u32,
    pub category: Category,
    pub stream: Stream,
}

impl PredictionQuery {
    pub fn new(rank: i64, category: Category, stream: Stream) -> Result<Self, ValidationError> {
        if rank <= 0 {
            return Err(ValidationError::NonPositiveRank(rank));
        }
        let rank = u32::try_from(rank).map_err(|_| ValidationError::RankTooLarge(rank))?;
        Ok(Self {
            rank,
            category,
            stream,
        })
    }

    /// Build a query from raw text input (CLI flags, query strings).
    pub fn parse(rank: &str, category: &str, stream: Option<&str>) -> Result<Self, ValidationError> {
        let rank = rank.trim();
        if rank.is_empty() {
            return Err(ValidationError::MissingRank);
        }
        let rank: i64 = rank
            .parse()
            .map_err(|_| ValidationError::InvalidRank(rank.to_string()))?;
        if category.trim().is_empty() {
            return Err(ValidationError::MissingCategory);
        }
        let category = category.parse()?;
        let stream = match stream {
            Some(value) if !value.trim().is_empty() => value.parse()?,
            _ => Stream::default(),
        };
        Self::new(rank, category, stream)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Chance {
    Eligible,
    Borderline,
    NotEligible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    /// Only one year of data; no direction can be read.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Trend {
    pub direction: TrendDirection,
    /// Absolute year-on-year change in cutoff rank.
    pub magnitude: u32,
}

impl Trend {
    fn unknown() -> Self {
        Self {
            direction: TrendDirection::Unknown,
            magnitude: 0,
        }
    }
}

/// Outlook of one (institution, program) offering for the queried candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramOutlook {
    pub institution: String,
    pub program: String,
    pub latest_cutoff: Option<u32>,
    pub prior_cutoff: Option<u32>,
    pub trend: Trend,
    pub confidence: Confidence,
    pub projected_cutoff: f64,
    pub chance: Chance,
}

/// A program suggested without cutoff matching; always eligible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alternative {
    pub program: String,
    pub chance: Chance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionOutcome {
    /// At least one offering is eligible or borderline.
    Matched,
    /// Nothing within reach; alternatives suggested instead.
    NoMatchFallback,
    /// Commerce applicants skip engineering cutoffs entirely.
    CommerceStream,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub query: PredictionQuery,
    pub outcome: PredictionOutcome,
    pub latest_year: Option<u16>,
    pub prior_year: Option<u16>,
    pub eligible: Vec<ProgramOutlook>,
    pub borderline: Vec<ProgramOutlook>,
    pub not_eligible: Vec<ProgramOutlook>,
    pub alternatives: Vec<Alternative>,
}

/// Projection for one offering before the candidate is placed against it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub trend: Trend,
    pub confidence: Confidence,
    pub projected_cutoff: f64,
}

pub struct CutoffMatcher<'a> {
    table: &'a CutoffTable,
    settings: &'a PredictionSettings,
}

impl<'a> CutoffMatcher<'a> {
    pub fn new(table: &'a CutoffTable, settings: &'a PredictionSettings) -> Self {
        Self { table, settings }
    }

    /// Classify the candidate against every offering with data for the category.
    pub fn predict(&self, query: &PredictionQuery) -> Prediction {
        let mut prediction = Prediction {
            query: *query,
            outcome: PredictionOutcome::Matched,
            latest_year: self.table.latest_year(),
            prior_year: self.table.prior_year(),
            eligible: Vec::new(),
            borderline: Vec::new(),
            not_eligible: Vec::new(),
            alternatives: Vec::new(),
        };

        if query.stream == Stream::Commerce {
            prediction.outcome = PredictionOutcome::CommerceStream;
            prediction.alternatives = alternatives(&self.settings.commerce_programs);
            return prediction;
        }

        for (offering, history) in self.table.histories(query.category) {
            let Some(projection) = self.project(history) else {
                continue;
            };
            let chance = self.classify(query.rank, projection.projected_cutoff);
            let outlook = ProgramOutlook {
                institution: offering.institution.clone(),
                program: offering.program.clone(),
                latest_cutoff: history.latest,
                prior_cutoff: history.prior,
                trend: projection.trend,
                confidence: projection.confidence,
                projected_cutoff: projection.projected_cutoff,
                chance,
            };

            match chance {
                Chance::Eligible => prediction.eligible.push(outlook),
                Chance::Borderline => prediction.borderline.push(outlook),
                Chance::NotEligible => prediction.not_eligible.push(outlook),
            }
        }

        prediction.eligible.sort_by(|a, b| self.compare_outlooks(a, b));
        prediction.borderline.sort_by(|a, b| self.compare_outlooks(a, b));
        prediction.not_eligible.sort_by(|a, b| {
            b.projected_cutoff
                .partial_cmp(&a.projected_cutoff)
                .unwrap_or(Ordering::Equal)
                .then_with(|| by_name(a, b))
        });

        if prediction.eligible.is_empty() && prediction.borderline.is_empty() {
            prediction.outcome = PredictionOutcome::NoMatchFallback;
            prediction.alternatives = alternatives(&self.settings.alternative_programs);
        }

        prediction
    }

    /// Project next year's cutoff from the latest and prior-year values.
    pub fn project(&self, history: CutoffHistory) -> Option<Projection> {
        match (history.prior, history.latest) {
            (Some(prior), Some(latest)) => {
                let delta = i64::from(latest) - i64::from(prior);
                let magnitude = delta.unsigned_abs() as u32;
                let (direction, projected_cutoff) = match delta.cmp(&0) {
                    Ordering::Greater => (
                        TrendDirection::Increasing,
                        f64::from(latest) + self.settings.increase_factor * f64::from(magnitude),
                    ),
                    Ordering::Less => (
                        TrendDirection::Decreasing,
                        f64::from(latest) - self.settings.decrease_factor * f64::from(magnitude),
                    ),
                    Ordering::Equal => (TrendDirection::Stable, f64::from(latest)),
                };
                let confidence = if delta == 0 {
                    Confidence::High
                } else {
                    Confidence::Medium
                };
                Some(Projection {
                    trend: Trend {
                        direction,
                        magnitude,
                    },
                    confidence,
                    projected_cutoff,
                })
            }
            (None, Some(latest)) => Some(Projection {
                trend: Trend::unknown(),
                confidence: Confidence::Medium,
                projected_cutoff: f64::from(latest),
            }),
            (Some(prior), None) => Some(Projection {
                trend: Trend::unknown(),
                confidence: Confidence::Low,
                projected_cutoff: f64::from(prior) + f64::from(self.settings.older_year_buffer),
            }),
            (None, None) => None,
        }
    }

    pub fn classify(&self, rank: u32, projected_cutoff: f64) -> Chance {
        let rank = f64::from(rank);
        if rank <= projected_cutoff {
            Chance::Eligible
        } else if rank <= projected_cutoff + f64::from(self.settings.borderline_window) {
            Chance::Borderline
        } else {
            Chance::NotEligible
        }
    }

    fn priority_of(&self, institution: &str) -> usize {
        self.settings
            .priority_institutions
            .iter()
            .position(|preferred| preferred.eq_ignore_ascii_case(institution))
            .unwrap_or(usize::MAX)
    }

    fn compare_outlooks(&self, a: &ProgramOutlook, b: &ProgramOutlook) -> Ordering {
        self.priority_of(&a.institution)
            .cmp(&self.priority_of(&b.institution))
            .then_with(|| {
                a.projected_cutoff
                    .partial_cmp(&b.projected_cutoff)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| by_name(a, b))
    }
}

fn by_name(a: &ProgramOutlook, b: &ProgramOutlook) -> Ordering {
    a.institution
        .cmp(&b.institution)
        .then_with(|| a.program.cmp(&b.program))
}

fn alternatives(programs: &[String]) -> Vec<Alternative> {
    programs
        .iter()
        .map(|program| Alternative {
            program: program.clone(),
            chance: Chance::Eligible,
        })
        .collect()
}

impl Prediction {
    pub fn all_outlooks(&self) -> impl Iterator<Item = &ProgramOutlook> {
        self.eligible
            .iter()
            .chain(self.borderline.iter())
            .chain(self.not_eligible.iter())
    }

    pub fn find(&self, institution: &str, program: &str) -> Option<&ProgramOutlook> {
        self.all_outlooks()
            .find(|o| o.institution == institution && o.program == program)
    }
}
