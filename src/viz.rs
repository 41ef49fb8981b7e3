//! Churn visualizations using Plotters

use plotters::prelude::*;
use std::path::Path;

use crate::error::{Error, Result};
use crate::features::{ChurnTable, RiskLevel};

fn risk_color(level: RiskLevel) -> RGBColor {
    match level {
        RiskLevel::High => RED,
        RiskLevel::Medium => RGBColor(255, 165, 0),
        RiskLevel::Low => GREEN,
    }
}

fn plot_error<E: std::fmt::Display>(error: E) -> Error {
    Error::Plot(error.to_string())
}

/// Axis range covering `values` with 5% padding on each side
pub fn padded_range(values: impl IntoIterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values
        .into_iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((max - min) * 0.05).max(1.0);
    (min - pad, max + pad)
}

/// Path of the bar chart written next to the scatter plot
pub fn distribution_path(scatter_path: &Path) -> std::path::PathBuf {
    let stem = scatter_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "churn".to_string());
    scatter_path.with_file_name(format!("{stem}_risk.png"))
}

/// Scatter plot of recency vs monetary value, coloured by risk level
pub fn create_risk_scatter(churn: &ChurnTable, output_path: &Path) -> Result<()> {
    let (x_min, x_max) = padded_range(churn.customers.iter().map(|c| c.days_since_last_purchase as f64));
    let (y_min, y_max) = padded_range(churn.customers.iter().map(|c| c.monetary));

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Churn Risk: Recency vs Monetary", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .x_desc("Days since last purchase")
        .y_desc("Monetary")
        .axis_desc_style(("sans-serif", 15))
        .draw()
        .map_err(plot_error)?;

    for level in RiskLevel::ALL {
        let color = risk_color(level);
        chart
            .draw_series(
                churn
                    .customers
                    .iter()
                    .filter(|c| c.risk_level == level)
                    .map(|c| {
                        Circle::new(
                            (c.days_since_last_purchase as f64, c.monetary),
                            3,
                            color.filled(),
                        )
                    }),
            )
            .map_err(plot_error)?
            .label(level.to_string())
            .legend(move |(x, y)| Circle::new((x + 5, y), 4, color.filled()));
    }

    // Threshold guides
    chart
        .draw_series(LineSeries::new(
            [
                (churn.latency_threshold, y_min),
                (churn.latency_threshold, y_max),
            ],
            BLACK.stroke_width(1),
        ))
        .map_err(plot_error)?;
    chart
        .draw_series(LineSeries::new(
            [
                (x_min, churn.monetary_threshold),
                (x_max, churn.monetary_threshold),
            ],
            BLACK.stroke_width(1),
        ))
        .map_err(plot_error)?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(plot_error)?;

    root.present().map_err(plot_error)?;
    Ok(())
}

/// Bar chart of customers per risk level
pub fn create_risk_distribution_chart(churn: &ChurnTable, output_path: &Path) -> Result<()> {
    let counts = churn.risk_counts();
    let max_count = counts.iter().map(|(_, n)| *n).max().unwrap_or(1).max(1) as f64;

    let root = BitMapBackend::new(output_path, (600, 400)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Customers per Risk Level", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..(counts.len() as f64), 0f64..(max_count * 1.1))
        .map_err(plot_error)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(counts.len())
        .x_label_formatter(&|x: &f64| {
            RiskLevel::ALL
                .get(x.floor() as usize)
                .map(|level| level.to_string())
                .unwrap_or_default()
        })
        .y_desc("Number of Customers")
        .axis_desc_style(("sans-serif", 15))
        .draw()
        .map_err(plot_error)?;

    for (i, (level, count)) in counts.iter().enumerate() {
        let color = risk_color(*level);
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(i as f64 + 0.1, 0.0), (i as f64 + 0.9, *count as f64)],
                color.filled(),
            )))
            .map_err(plot_error)?;
    }

    root.present().map_err(plot_error)?;
    Ok(())
}

/// Print the population summary to the console
pub fn print_churn_summary(churn: &ChurnTable) {
    println!("\n=== Churn Risk Summary ===");
    println!("Reference date: {}", churn.reference_date);
    println!("Total customers: {}", churn.len());
    println!(
        "Thresholds: recency > {:.1} days, monetary < {:.2}",
        churn.latency_threshold, churn.monetary_threshold
    );

    for (level, count) in churn.risk_counts() {
        let percentage = if churn.is_empty() {
            0.0
        } else {
            count as f64 / churn.len() as f64 * 100.0
        };
        println!("  {:<12} {:>6} customers ({:.1}%)", level.to_string(), count, percentage);
    }
}

/// Write the scatter plot and the distribution chart next to it
pub fn generate_churn_report(churn: &ChurnTable, scatter_path: &Path) -> Result<std::path::PathBuf> {
    create_risk_scatter(churn, scatter_path)?;
    let bars = distribution_path(scatter_path);
    create_risk_distribution_chart(churn, &bars)?;
    Ok(bars)
}
