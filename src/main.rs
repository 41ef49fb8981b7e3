//! Churnwise: churn risk scoring and product recommendation CLI
//!
//! This is the main entrypoint that wires argument parsing, logging, the
//! resource cache and the console/JSON output for every subcommand.

use anyhow::{Context, Result};
use clap::Parser;
use churnwise::{
    popular_items, viz, Args, Command, ContentIndex, CustomerId, Outcome, PipelineConfig,
    PopularItem, RankBy, Recommendation, ResourceCache, RiskLevel, SimilarProduct,
};
use serde_json::json;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = args.pipeline_config()?;
    debug!(?config, data = %args.data.display(), "Configuration resolved");

    let start_time = Instant::now();
    let mut cache = ResourceCache::new(config);

    match &args.command {
        Command::Churn {
            risk,
            limit,
            plot,
            json,
            ..
        } => run_churn(&mut cache, &args.data, *risk, *limit, plot.as_deref(), *json)?,
        Command::Recommend { json, .. } => {
            let customers = args.parse_customer_ids()?;
            run_recommend(&mut cache, &args.data, &customers, *json)?
        }
        Command::Popular { json, .. } => run_popular(cache.config(), &args.data, *json)?,
        Command::Similar {
            product,
            top_n,
            json,
        } => run_similar(&mut cache, &args.data, product, *top_n, *json)?,
        Command::Health => run_health(&mut cache, &args.data)?,
    }

    let (hits, misses) = cache.stats();
    debug!(hits, misses, "Resource cache stats");
    info!(
        elapsed_secs = start_time.elapsed().as_secs_f64(),
        "Command complete"
    );

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "churnwise=debug"
    } else {
        "churnwise=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Score every customer and list one risk level
fn run_churn(
    cache: &mut ResourceCache,
    data: &Path,
    risk: RiskLevel,
    limit: usize,
    plot: Option<&Path>,
    as_json: bool,
) -> Result<()> {
    let churn = cache
        .churn_features(data)
        .with_context(|| format!("computing churn features from {}", data.display()))?;
    let selected: Vec<_> = churn.by_risk(risk).into_iter().take(limit).collect();

    if as_json {
        let body = json!({
            "reference_date": churn.reference_date,
            "latency_threshold": churn.latency_threshold,
            "monetary_threshold": churn.monetary_threshold,
            "risk_level": risk.to_string(),
            "customers": selected,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        viz::print_churn_summary(&churn);

        println!("\n=== {} Customers (top {} by monetary) ===", risk, selected.len());
        println!("{:<12} {:>10} {:>10} {:>12}", "CustomerID", "Recency", "Frequency", "Monetary");
        for customer in &selected {
            println!(
                "{:<12} {:>10} {:>10} {:>12.2}",
                customer.customer_id.as_str(),
                customer.days_since_last_purchase,
                customer.frequency,
                customer.monetary
            );
        }
    }

    if let Some(path) = plot {
        let bars = viz::generate_churn_report(&churn, path)?;
        info!(scatter = %path.display(), bars = %bars.display(), "Churn plots written");
    }

    Ok(())
}

/// Recommend for each customer, falling back to best-sellers when the
/// collaborative filter has nothing to offer
fn run_recommend(
    cache: &mut ResourceCache,
    data: &Path,
    customers: &[CustomerId],
    as_json: bool,
) -> Result<()> {
    let top_n = cache.config().top_n;
    let rank_by = cache.config().rank_by;
    let mut results = Vec::with_capacity(customers.len());

    for customer in customers {
        match cache.recommend(data, customer, top_n) {
            Outcome::Success(recommendations) => {
                if as_json {
                    results.push(json!({
                        "customer_id": customer,
                        "status": "success",
                        "recommendations": recommendations,
                    }));
                } else {
                    print_recommendations(customer, &recommendations);
                }
            }
            Outcome::Empty(reason) => {
                info!(customer = %customer, %reason, "Falling back to popular items");
                let fallback = popular_items(data, top_n, rank_by)?;
                if as_json {
                    results.push(json!({
                        "customer_id": customer,
                        "status": "empty",
                        "reason": reason,
                        "fallback": fallback,
                    }));
                } else {
                    println!("\n{reason}");
                    print_popular(&fallback, rank_by);
                }
            }
            Outcome::Fatal(e) => {
                error!(code = e.code(), customer = %customer, "Recommendation failed");
                return Err(e).with_context(|| format!("recommending for customer {customer}"));
            }
        }
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }
    Ok(())
}

fn run_popular(config: &PipelineConfig, data: &Path, as_json: bool) -> Result<()> {
    let items = popular_items(data, config.top_n, config.rank_by)?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        print_popular(&items, config.rank_by);
    }
    Ok(())
}

fn run_similar(
    cache: &mut ResourceCache,
    data: &Path,
    query: &str,
    top_n: usize,
    as_json: bool,
) -> Result<()> {
    let resources = cache.recommender_resources(data)?;
    let index = ContentIndex::build(resources.transactions.catalog());
    debug!(
        products = index.len(),
        vocabulary = index.vocabulary_size(),
        "Content index built"
    );

    match index.similar_products(query, top_n) {
        Outcome::Success(products) => {
            if as_json {
                println!("{}", serde_json::to_string_pretty(&products)?);
            } else {
                print_similar(query, &products);
            }
        }
        Outcome::Empty(reason) => {
            if as_json {
                println!("{}", serde_json::to_string_pretty(&reason)?);
            } else {
                println!("{reason}");
            }
        }
        Outcome::Fatal(e) => return Err(e.into()),
    }
    Ok(())
}

fn run_health(cache: &mut ResourceCache, data: &Path) -> Result<()> {
    let resources = cache.recommender_resources(data)?;
    let health = resources.health();
    let report = resources.transactions.report();

    println!("=== Recommender Health ===");
    println!("Transactions kept: {} of {} rows", report.kept, report.raw_rows);
    println!(
        "Interaction matrix: {} customers x {} items",
        health.interaction_shape.0, health.interaction_shape.1
    );
    println!(
        "Similarity matrix: {} x {}",
        health.similarity_shape.0, health.similarity_shape.1
    );
    println!("Aligned: {}", if health.aligned { "yes" } else { "no" });
    Ok(())
}

fn print_recommendations(customer: &CustomerId, recommendations: &[Recommendation]) {
    println!("\n=== Recommendations for {customer} ===");
    println!("{:<10} {:<40} {:>10}", "StockCode", "Description", "Score");
    for rec in recommendations {
        println!(
            "{:<10} {:<40} {:>10.4}",
            rec.stock_code.as_str(),
            truncate(&rec.description, 40),
            rec.estimated_score
        );
    }
}

fn print_popular(items: &[PopularItem], rank_by: RankBy) {
    println!("\n=== Popular Items (by {rank_by}) ===");
    println!("{:<10} {:<40} {:>12}", "StockCode", "Description", "Score");
    for item in items {
        println!(
            "{:<10} {:<40} {:>12.2}",
            item.stock_code.as_str(),
            truncate(item.description.as_deref().unwrap_or("N/A"), 40),
            item.score
        );
    }
}

fn print_similar(query: &str, products: &[SimilarProduct]) {
    println!("\n=== Products similar to '{query}' ===");
    println!("{:<10} {:<40} {:>10}", "StockCode", "Description", "Similarity");
    for product in products {
        println!(
            "{:<10} {:<40} {:>10.4}",
            product.stock_code.as_str(),
            truncate(&product.description, 40),
            product.similarity
        );
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width.saturating_sub(3)).collect();
        cut.push_str("...");
        cut
    }
}
