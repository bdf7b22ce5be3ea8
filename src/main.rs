use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing_subscriber::{fmt, EnvFilter};

use campus_insights::data::{DataLoader, ReferenceData};
use campus_insights::models::Config;
use campus_insights::placements::{aggregate_by_company, filter_companies, top_companies, PlacementAggregator};
use campus_insights::predictor::{Chance, CutoffMatcher, Prediction, PredictionQuery};
use campus_insights::report::{self, PlacementReport};
use campus_insights::server::{self, AppState};

fn json_flag() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Print machine-readable JSON")
}

fn rank_arg() -> Arg {
    Arg::new("rank")
        .short('r')
        .long("rank")
        .value_name("RANK")
        .allow_hyphen_values(true)
        .help("Candidate merit rank (positive integer)")
}

fn category_arg() -> Arg {
    Arg::new("category")
        .long("category")
        .value_name("CATEGORY")
        .help("Admission category: OPEN, EWS, SEBC, SC or ST")
}

fn stream_arg() -> Arg {
    Arg::new("stream")
        .long("stream")
        .value_name("STREAM")
        .default_value("science")
        .help("Higher-secondary stream: science or commerce")
}

fn cli() -> Command {
    Command::new("campus-insights")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Predicts admission chances from cutoff history and summarizes campus placements")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .global(true)
                .help("Log level when RUST_LOG is unset (trace, debug, info, warn, error)"),
        )
        .subcommand(
            Command::new("predict")
                .about("Classify a rank against every known offering")
                .arg(rank_arg().required(true))
                .arg(category_arg().required(true))
                .arg(stream_arg())
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("summary")
                .about("Year-by-year placement statistics")
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("companies")
                .about("Company totals across all years")
                .arg(
                    Arg::new("query")
                        .short('q')
                        .long("query")
                        .value_name("TEXT")
                        .help("Case-insensitive company name filter"),
                )
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .value_name("N")
                        .value_parser(clap::value_parser!(usize))
                        .help("Show at most N companies"),
                )
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("report")
                .about("Write placement (and optional prediction) reports to the output directory")
                .arg(rank_arg())
                .arg(category_arg())
                .arg(stream_arg()),
        )
        .subcommand(
            Command::new("serve").about("Serve the analyses over HTTP").arg(
                Arg::new("port")
                    .short('p')
                    .long("port")
                    .value_name("PORT")
                    .value_parser(clap::value_parser!(u16))
                    .help("Override the configured port"),
            ),
        )
        .subcommand(
            Command::new("init-config")
                .about("Write a default configuration file")
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Overwrite an existing file"),
                ),
        )
}

fn init_tracing(matches: &ArgMatches, default_level: &str) {
    let level = matches
        .get_one::<String>("log-level")
        .map(String::as_str)
        .unwrap_or(default_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let default_level = match matches.subcommand_name() {
        Some("serve") => "info",
        _ => "warn",
    };
    init_tracing(&matches, default_level);

    // Load or create configuration
    let config_file = matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    if let Some(("init-config", sub)) = matches.subcommand() {
        return init_config(&config_file, sub.get_flag("force"));
    }

    if !config_file.exists() {
        println!("📝 Creating default configuration file: {}", config_file.display());
        Config::default().save_to_file(&config_file)?;
        println!(
            "⚠️  Please review {} and point data_directory at your datasets, then run the program again.",
            config_file.display()
        );
        return Ok(());
    }

    let config = Config::load_from_file(&config_file)?;

    // Load reference data
    let data = DataLoader::new()
        .load(&config)
        .await
        .context("Reference data could not be loaded")?;

    // Run the requested command
    match matches.subcommand() {
        Some(("predict", sub)) => run_predict(&config, &data, sub),
        Some(("summary", sub)) => run_summary(&config, &data, sub.get_flag("json")),
        Some(("companies", sub)) => run_companies(&data, sub),
        Some(("report", sub)) => run_report(&config, &data, sub),
        Some(("serve", sub)) => {
            let mut config = config;
            if let Some(port) = sub.get_one::<u16>("port") {
                config.server.port = *port;
            }
            println!("🌐 Serving on http://{}:{}", config.server.host, config.server.port);
            server::serve(AppState::new(data, config)).await
        }
        _ => Ok(()),
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Config::default().save_to_file(path)?;
    println!("📝 Wrote default configuration to {}", path.display());
    Ok(())
}

fn query_from(sub: &ArgMatches) -> Result<Option<PredictionQuery>> {
    let rank = sub.get_one::<String>("rank");
    let category = sub.get_one::<String>("category");
    let stream = sub.get_one::<String>("stream").map(String::as_str);

    match (rank, category) {
        (None, None) => Ok(None),
        (rank, category) => {
            let query = PredictionQuery::parse(
                rank.map(String::as_str).unwrap_or_default(),
                category.map(String::as_str).unwrap_or_default(),
                stream,
            )?;
            Ok(Some(query))
        }
    }
}

fn run_predict(config: &Config, data: &ReferenceData, sub: &ArgMatches) -> Result<()> {
    let Some(query) = query_from(sub)? else {
        anyhow::bail!("--rank and --category are required");
    };
    let prediction = CutoffMatcher::new(&data.cutoffs, &config.prediction).predict(&query);

    if sub.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
    } else {
        print_prediction(&prediction);
    }
    Ok(())
}

fn print_prediction(prediction: &Prediction) {
    let query = &prediction.query;
    println!("🎯 Rank {} ({}, {})", query.rank, query.category, query.stream);

    for outlook in prediction.all_outlooks() {
        let marker = match outlook.chance {
            Chance::Eligible => "✅",
            Chance::Borderline => "⚠️ ",
            Chance::NotEligible => "❌",
        };
        println!(
            "   {} {} / {} - projected cutoff {:.0} ({:?} confidence)",
            marker, outlook.institution, outlook.program, outlook.projected_cutoff, outlook.confidence
        );
    }

    if !prediction.alternatives.is_empty() {
        let programs: Vec<&str> = prediction.alternatives.iter().map(|a| a.program.as_str()).collect();
        println!("💡 Suggested programs: {}", programs.join(", "));
    }
}

fn run_summary(config: &Config, data: &ReferenceData, json: bool) -> Result<()> {
    let aggregator = PlacementAggregator::new(&config.placements);
    let summaries = aggregator.summarize_by_year(&data.placements);
    let overview = aggregator.overview(&data.placements);

    if json {
        let body = serde_json::json!({ "overview": overview, "years": summaries });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("📊 Placements across {} years", overview.years);
    for summary in &summaries {
        println!(
            "   {}: {} offers from {} companies (growth {:+.1}%, cumulative {})",
            summary.year,
            summary.total_offers,
            summary.total_companies,
            summary.growth * 100.0,
            summary.cumulative_offers
        );
    }
    println!("📈 Total offers: {}", overview.total_offers);
    if let Some(peak) = &overview.peak_year {
        println!("🏆 Peak year: {peak}");
    }
    Ok(())
}

fn run_companies(data: &ReferenceData, sub: &ArgMatches) -> Result<()> {
    let companies = aggregate_by_company(&data.placements);
    let query = sub.get_one::<String>("query").map(String::as_str).unwrap_or_default();
    let matched: Vec<_> = filter_companies(query, &companies).into_iter().cloned().collect();
    let limit = sub.get_one::<usize>("limit").copied().unwrap_or(matched.len());
    let shown = top_companies(&matched, limit);

    if sub.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(shown)?);
        return Ok(());
    }

    if shown.is_empty() {
        println!("❓ No companies match '{query}'");
        return Ok(());
    }
    for (i, company) in shown.iter().enumerate() {
        let years: Vec<&str> = company.years_active.iter().map(String::as_str).collect();
        println!(
            "   {}. {} - {} offers ({})",
            i + 1,
            company.company,
            company.total_offers,
            years.join(", ")
        );
    }
    Ok(())
}

fn run_report(config: &Config, data: &ReferenceData, sub: &ArgMatches) -> Result<()> {
    let prediction = query_from(sub)?
        .map(|query| CutoffMatcher::new(&data.cutoffs, &config.prediction).predict(&query));

    let aggregator = PlacementAggregator::new(&config.placements);
    let overview = aggregator.overview(&data.placements);
    let summaries = aggregator.summarize_by_year(&data.placements);
    let companies = aggregate_by_company(&data.placements);

    let output_dir = Path::new(config.output_directory());
    let written = report::write_reports(
        output_dir,
        &PlacementReport {
            overview: &overview,
            summaries: &summaries,
            companies: &companies,
        },
        prediction.as_ref(),
    )?;

    for file in written {
        println!("📄 Wrote {}", output_dir.join(file).display());
    }
    Ok(())
}
