/// Visualization module: stacked bar chart faceted by sample type.
///
/// Produces a self-contained SVG string:
/// - One panel per sample type, side by side, sharing the y scale
/// - One bar per location, stacked by chemical short name
/// - A legend mapping short names to colors
///
/// Colors come from a fixed palette assigned to short names in sorted order,
/// so the same table always renders to the same bytes.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write as FmtWrite};

use polars::prelude::*;

use crate::config::{PfasConfig, DEFAULT_PALETTE};
use crate::error::ScreenError;
use crate::schema::{pfas, sample};

// ── Config ──────────────────────────────────────────────────────────────────

/// Configuration for the stacked bar chart.
pub struct ChartConfig {
    pub title: String,
    /// Colors cycled over the sorted short names
    pub palette: Vec<String>,
    /// Plot area of one facet panel
    pub panel_width_px: u32,
    pub panel_height_px: u32,
}

impl From<&PfasConfig> for ChartConfig {
    fn from(cfg: &PfasConfig) -> Self {
        Self {
            title: cfg.title.clone(),
            palette: cfg.palette.clone(),
            panel_width_px: cfg.panel_width_px,
            panel_height_px: cfg.panel_height_px,
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self::from(&PfasConfig::default())
    }
}

const MARGIN_LEFT: f64 = 70.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 90.0;
const PANEL_GAP: f64 = 30.0;
const LEGEND_WIDTH: f64 = 170.0;
const LEGEND_ROW: f64 = 18.0;
const Y_TICKS: usize = 5;

// ── Intermediate data structures ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub location_id: String,
    /// (short_name, total) in short-name order
    pub segments: Vec<(String, f64)>,
}

impl Bar {
    fn total(&self) -> f64 {
        self.segments.iter().map(|(_, v)| v).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Facet {
    pub sample_type: String,
    pub bars: Vec<Bar>,
}

// ── Data extraction ─────────────────────────────────────────────────────────

/// Group the aggregated chart table into facets and bars, sorted by sample
/// type, location and short name. Null totals are skipped.
pub fn extract_facets(table: &DataFrame) -> Result<Vec<Facet>, ScreenError> {
    let types = table.column(sample::SAMPLE_TYPE)?.str()?;
    let locations = table.column(sample::LOCATION_ID)?.str()?;
    let names = table.column(pfas::SHORT_NAME)?.str()?;
    let totals = table.column(pfas::TOTAL_RESULT)?.f64()?;

    let mut grouped: BTreeMap<String, BTreeMap<String, BTreeMap<String, f64>>> = BTreeMap::new();
    for i in 0..table.height() {
        let Some(total) = totals.get(i) else {
            continue;
        };
        let sample_type = types.get(i).unwrap_or("").to_string();
        let location = locations.get(i).unwrap_or("").to_string();
        let name = names.get(i).unwrap_or("").to_string();
        *grouped
            .entry(sample_type)
            .or_default()
            .entry(location)
            .or_default()
            .entry(name)
            .or_insert(0.0) += total;
    }

    Ok(grouped
        .into_iter()
        .map(|(sample_type, bars)| Facet {
            sample_type,
            bars: bars
                .into_iter()
                .map(|(location_id, segments)| Bar {
                    location_id,
                    segments: segments.into_iter().collect(),
                })
                .collect(),
        })
        .collect())
}

/// Map each short name to a palette color, cycling when names outnumber
/// colors.
pub fn assign_colors(facets: &[Facet], palette: &[String]) -> BTreeMap<String, String> {
    let names: BTreeSet<&str> = facets
        .iter()
        .flat_map(|f| f.bars.iter())
        .flat_map(|b| b.segments.iter().map(|(n, _)| n.as_str()))
        .collect();

    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let color = if palette.is_empty() {
                DEFAULT_PALETTE[i % DEFAULT_PALETTE.len()].to_string()
            } else {
                palette[i % palette.len()].clone()
            };
            (name.to_string(), color)
        })
        .collect()
}

/// Round the axis maximum up to 1, 2 or 5 times a power of ten.
fn nice_max(value: f64) -> f64 {
    if value <= 0.0 || !value.is_finite() {
        return 1.0;
    }
    let magnitude = 10f64.powf(value.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .into_iter()
        .find(|s| s * magnitude >= value)
        .unwrap_or(10.0);
    step * magnitude
}

// ── SVG generation ──────────────────────────────────────────────────────────

/// Main entry point: render the aggregated chart table to an SVG string.
pub fn generate_stacked_bar_svg(
    table: &DataFrame,
    config: &ChartConfig,
) -> Result<String, ScreenError> {
    let facets = extract_facets(table)?;
    render_svg(&facets, config).map_err(|e| ScreenError::General(format!("svg render: {e}")))
}

fn render_svg(facets: &[Facet], config: &ChartConfig) -> Result<String, fmt::Error> {
    let panel_w = config.panel_width_px as f64;
    let panel_h = config.panel_height_px as f64;
    let colors = assign_colors(facets, &config.palette);

    let n_panels = facets.len().max(1) as f64;
    let width = MARGIN_LEFT + n_panels * (panel_w + PANEL_GAP) + LEGEND_WIDTH;
    let height = MARGIN_TOP
        + panel_h.max(colors.len() as f64 * LEGEND_ROW)
        + MARGIN_BOTTOM;

    let mut s = String::new();
    writeln!(
        s,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width:.0}" height="{height:.0}" viewBox="0 0 {width:.0} {height:.0}" font-family="sans-serif">"#
    )?;
    writeln!(
        s,
        r##"<rect x="0" y="0" width="{width:.0}" height="{height:.0}" fill="#ffffff"/>"##
    )?;
    writeln!(
        s,
        r##"<text x="{x:.1}" y="24" font-size="16" font-weight="600" fill="#212529">{title}</text>"##,
        x = MARGIN_LEFT,
        title = escape_xml(&config.title),
    )?;

    if facets.is_empty() {
        writeln!(
            s,
            r##"<text x="{x:.1}" y="{y:.1}" font-size="12" fill="#868e96">No detected results to plot.</text>"##,
            x = MARGIN_LEFT,
            y = MARGIN_TOP + 20.0,
        )?;
        s.push_str("</svg>\n");
        return Ok(s);
    }

    let y_max = nice_max(
        facets
            .iter()
            .flat_map(|f| f.bars.iter())
            .map(Bar::total)
            .fold(0.0, f64::max),
    );
    let scale = panel_h / y_max;

    for (p, facet) in facets.iter().enumerate() {
        let x0 = MARGIN_LEFT + p as f64 * (panel_w + PANEL_GAP);
        write_panel(&mut s, facet, x0, panel_w, panel_h, y_max, scale, &colors)?;
    }

    write_legend(&mut s, &colors, width - LEGEND_WIDTH + 10.0)?;
    s.push_str("</svg>\n");
    Ok(s)
}

#[allow(clippy::too_many_arguments)]
fn write_panel(
    s: &mut String,
    facet: &Facet,
    x0: f64,
    panel_w: f64,
    panel_h: f64,
    y_max: f64,
    scale: f64,
    colors: &BTreeMap<String, String>,
) -> fmt::Result {
    let y_base = MARGIN_TOP + panel_h;

    writeln!(s, r#"<g class="facet">"#)?;
    writeln!(
        s,
        r##"<text x="{x:.1}" y="{y:.1}" font-size="13" text-anchor="middle" fill="#495057">{label}</text>"##,
        x = x0 + panel_w / 2.0,
        y = MARGIN_TOP - 8.0,
        label = escape_xml(&facet.sample_type),
    )?;
    writeln!(
        s,
        r##"<rect x="{x0:.1}" y="{MARGIN_TOP:.1}" width="{panel_w:.1}" height="{panel_h:.1}" fill="none" stroke="#dee2e6"/>"##
    )?;

    for t in 0..=Y_TICKS {
        let value = y_max * t as f64 / Y_TICKS as f64;
        let y = y_base - value * scale;
        writeln!(
            s,
            r##"<line x1="{x1:.1}" y1="{y:.1}" x2="{x0:.1}" y2="{y:.1}" stroke="#868e96"/><text x="{xt:.1}" y="{yt:.1}" font-size="10" text-anchor="end" fill="#868e96">{value}</text>"##,
            x1 = x0 - 4.0,
            xt = x0 - 6.0,
            yt = y + 3.0,
            value = format_tick(value),
        )?;
    }

    let slot = panel_w / facet.bars.len().max(1) as f64;
    let bar_w = slot * 0.7;
    for (i, bar) in facet.bars.iter().enumerate() {
        let x = x0 + i as f64 * slot + (slot - bar_w) / 2.0;
        let mut top = y_base;
        for (name, value) in &bar.segments {
            let h = value.max(0.0) * scale;
            top -= h;
            let fill = colors.get(name).map(String::as_str).unwrap_or("#adb5bd");
            writeln!(
                s,
                r#"<rect x="{x:.1}" y="{top:.1}" width="{bar_w:.1}" height="{h:.1}" fill="{fill}"><title>{loc} {name}: {value}</title></rect>"#,
                loc = escape_xml(&bar.location_id),
                name = escape_xml(name),
            )?;
        }
        let cx = x + bar_w / 2.0;
        let ly = y_base + 12.0;
        writeln!(
            s,
            r##"<text x="{cx:.1}" y="{ly:.1}" font-size="10" text-anchor="end" fill="#495057" transform="rotate(-45 {cx:.1} {ly:.1})">{loc}</text>"##,
            loc = escape_xml(&bar.location_id),
        )?;
    }
    writeln!(s, "</g>")
}

fn write_legend(s: &mut String, colors: &BTreeMap<String, String>, x: f64) -> fmt::Result {
    writeln!(s, r#"<g class="legend">"#)?;
    for (i, (name, color)) in colors.iter().enumerate() {
        let y = MARGIN_TOP + i as f64 * LEGEND_ROW;
        writeln!(
            s,
            r##"<rect x="{x:.1}" y="{y:.1}" width="12" height="12" fill="{color}"/><text x="{tx:.1}" y="{ty:.1}" font-size="11" fill="#212529">{name}</text>"##,
            tx = x + 18.0,
            ty = y + 10.0,
            name = escape_xml(name),
        )?;
    }
    writeln!(s, "</g>")
}

fn format_tick(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
