//! Inline SVG charts for the backtest report.

use crate::domain::metrics::EquityPoint;

const WIDTH: f64 = 500.0;
const HEIGHT: f64 = 200.0;
const PADDING: f64 = 40.0;

fn bounds(values: &[f64]) -> (f64, f64) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (min, max)
}

/// Polyline points scaled into the plot area.
fn scaled_points(values: &[f64]) -> Vec<(f64, f64)> {
    let (min, max) = bounds(values);
    let plot_width = WIDTH - 2.0 * PADDING;
    let plot_height = HEIGHT - 2.0 * PADDING;
    let range = max - min;
    let scale_y = if range > 0.0 { plot_height / range } else { 0.0 };
    let scale_x = if values.len() > 1 {
        plot_width / (values.len() - 1) as f64
    } else {
        0.0
    };
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let x = PADDING + i as f64 * scale_x;
            let y = if range > 0.0 {
                HEIGHT - PADDING - (v - min) * scale_y
            } else {
                HEIGHT / 2.0
            };
            (x, y)
        })
        .collect()
}

fn join(points: &[(f64, f64)]) -> String {
    points
        .iter()
        .map(|(x, y)| format!("{x:.1},{y:.1}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn frame(body: &str, curve: &[EquityPoint], label_min: &str, label_max: &str) -> String {
    let first = curve.first().map(|p| p.date.to_string()).unwrap_or_default();
    let last = curve.last().map(|p| p.date.to_string()).unwrap_or_default();
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w:.0}" height="{h:.0}" viewBox="0 0 {w:.0} {h:.0}">
  <rect width="{w:.0}" height="{h:.0}" fill="white"/>
  <line x1="{p:.0}" y1="{p:.0}" x2="{p:.0}" y2="{b:.0}" stroke="#9ca3af"/>
  <line x1="{p:.0}" y1="{b:.0}" x2="{r:.0}" y2="{b:.0}" stroke="#9ca3af"/>
  <text x="{p:.0}" y="{lt:.0}" font-size="10" fill="#4b5563">{first}</text>
  <text x="{r:.0}" y="{lt:.0}" font-size="10" fill="#4b5563" text-anchor="end">{last}</text>
  <text x="4" y="{p:.0}" font-size="10" fill="#4b5563">{label_max}</text>
  <text x="4" y="{b:.0}" font-size="10" fill="#4b5563">{label_min}</text>
  {body}
</svg>"##,
        w = WIDTH,
        h = HEIGHT,
        p = PADDING,
        b = HEIGHT - PADDING,
        r = WIDTH - PADDING,
        lt = HEIGHT - PADDING / 3.0,
    )
}

/// Portfolio value over time as a blue line.
pub fn portfolio_value_svg(curve: &[EquityPoint]) -> String {
    if curve.is_empty() {
        return "<p>No portfolio data available.</p>".to_string();
    }
    let values: Vec<f64> = curve.iter().map(|p| p.value).collect();
    let (min, max) = bounds(&values);
    let line = format!(
        r##"<polyline fill="none" stroke="#2563eb" stroke-width="1.5" points="{}"/>"##,
        join(&scaled_points(&values))
    );
    frame(&line, curve, &format!("{min:.0}"), &format!("{max:.0}"))
}

/// Percent below the running peak, shaded red.
pub fn drawdown_svg(curve: &[EquityPoint]) -> String {
    if curve.is_empty() {
        return "<p>No portfolio data available.</p>".to_string();
    }
    let mut peak = f64::NEG_INFINITY;
    let drawdowns: Vec<f64> = curve
        .iter()
        .map(|p| {
            peak = peak.max(p.value);
            if peak > 0.0 {
                (p.value - peak) / peak * 100.0
            } else {
                0.0
            }
        })
        .collect();
    let mut values = drawdowns.clone();
    values.push(0.0);
    let mut points = scaled_points(&values);
    let baseline = points.pop().map(|(_, y)| y).unwrap_or(PADDING);
    let (first_x, last_x) = match (points.first(), points.last()) {
        (Some(f), Some(l)) => (f.0, l.0),
        _ => (PADDING, PADDING),
    };
    let area = format!(
        r#"<polygon fill="rgba(239,68,68,0.3)" stroke="none" points="{first_x:.1},{baseline:.1} {} {last_x:.1},{baseline:.1}"/>"#,
        join(&points)
    );
    let (min, _) = bounds(&drawdowns);
    frame(&area, curve, &format!("{min:.1}%"), "0%")
}
