//! Report rendering for census results.
//!
//! Renderers take the final, already ranked and truncated list and never
//! filter or reorder it.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

use crate::residency::CacheStatus;

/// Number of buckets in a histogram line.
pub const HISTOGRAM_BUCKETS: usize = 60;

const HISTOGRAM_LEVELS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Output format options for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Unicode,
    Plain,
    Terse,
    Json,
    Histogram,
}

impl OutputFormat {
    /// Whether this format needs the per-page bitmap.
    pub fn needs_per_page(self) -> bool {
        matches!(self, Self::Histogram)
    }
}

/// Rendering switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    pub format: OutputFormat,
    /// Omit headers in text, plain and terse output.
    pub no_header: bool,
    /// Include per-page status in JSON output.
    pub per_page_status: bool,
}

/// Box drawing characters for one table style.
struct BoxStyle {
    top: [char; 3],
    middle: [char; 3],
    bottom: [char; 3],
    horizontal: char,
    vertical: char,
}

const ASCII_BOX: BoxStyle = BoxStyle {
    top: ['+', '+', '+'],
    middle: ['|', '+', '|'],
    bottom: ['+', '+', '+'],
    horizontal: '-',
    vertical: '|',
};

const UNICODE_BOX: BoxStyle = BoxStyle {
    top: ['┌', '┬', '┐'],
    middle: ['├', '┼', '┤'],
    bottom: ['└', '┴', '┘'],
    horizontal: '─',
    vertical: '│',
};

const HEADERS: [&str; 5] = ["Name", "Size (bytes)", "Pages", "Cached", "Percent"];

/// Writes `stats` to `out` in the requested format.
pub fn render<W: Write>(out: &mut W, stats: &[CacheStatus], opts: &ReportOptions) -> io::Result<()> {
    match opts.format {
        OutputFormat::Text => render_table(out, stats, &ASCII_BOX, opts.no_header),
        OutputFormat::Unicode => render_table(out, stats, &UNICODE_BOX, opts.no_header),
        OutputFormat::Plain => render_plain(out, stats, opts.no_header),
        OutputFormat::Terse => render_terse(out, stats, opts.no_header),
        OutputFormat::Json => render_json(out, stats, opts.per_page_status),
        OutputFormat::Histogram => render_histogram(out, stats),
    }
}

fn row(status: &CacheStatus) -> [String; 5] {
    [
        status.name.clone(),
        status.size_bytes.to_string(),
        status.total_pages.to_string(),
        status.resident_pages.to_string(),
        format!("{:.3}", status.percent_cached),
    ]
}

fn column_widths(rows: &[[String; 5]]) -> [usize; 5] {
    let mut widths = HEADERS.map(|h| h.chars().count());
    for r in rows {
        for (w, cell) in widths.iter_mut().zip(r.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }
    widths
}

fn render_table<W: Write>(
    out: &mut W,
    stats: &[CacheStatus],
    style: &BoxStyle,
    no_header: bool,
) -> io::Result<()> {
    let rows: Vec<[String; 5]> = stats.iter().map(row).collect();
    let widths = column_widths(&rows);

    let rule = |edges: [char; 3]| -> String {
        let segments: Vec<String> = widths
            .iter()
            .map(|w| style.horizontal.to_string().repeat(w + 2))
            .collect();
        format!(
            "{}{}{}",
            edges[0],
            segments.join(edges[1].to_string().as_str()),
            edges[2]
        )
    };
    let line = |cells: &[String]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths.iter())
            .enumerate()
            .map(|(i, (c, w))| {
                if i == 0 {
                    format!(" {:<w$} ", c, w = *w)
                } else {
                    format!(" {:>w$} ", c, w = *w)
                }
            })
            .collect();
        let v = style.vertical.to_string();
        format!("{}{}{}", v, padded.join(v.as_str()), v)
    };

    writeln!(out, "{}", rule(style.top))?;
    if !no_header {
        let headers: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
        writeln!(out, "{}", line(headers.as_slice()))?;
        writeln!(out, "{}", rule(style.middle))?;
    }
    for r in &rows {
        writeln!(out, "{}", line(r.as_slice()))?;
    }
    writeln!(out, "{}", rule(style.bottom))?;
    Ok(())
}

fn render_plain<W: Write>(out: &mut W, stats: &[CacheStatus], no_header: bool) -> io::Result<()> {
    let rows: Vec<[String; 5]> = stats.iter().map(row).collect();
    let widths = column_widths(&rows);

    let mut write_row = |cells: &[String]| -> io::Result<()> {
        let mut parts = Vec::with_capacity(cells.len());
        for (i, (c, w)) in cells.iter().zip(widths.iter()).enumerate() {
            if i == 0 {
                parts.push(format!("{:<w$}", c, w = *w));
            } else {
                parts.push(format!("{:>w$}", c, w = *w));
            }
        }
        writeln!(out, "{}", parts.join("  ").trim_end())
    };

    if !no_header {
        let headers: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
        write_row(headers.as_slice())?;
    }
    for r in &rows {
        write_row(r.as_slice())?;
    }
    Ok(())
}

fn render_terse<W: Write>(out: &mut W, stats: &[CacheStatus], no_header: bool) -> io::Result<()> {
    if !no_header {
        writeln!(out, "name,size,timestamp,mtime,pages,cached,percent")?;
    }
    for s in stats {
        writeln!(
            out,
            "{},{},{},{},{},{},{:.3}",
            s.name,
            s.size_bytes,
            s.timestamp.timestamp(),
            s.mtime.timestamp(),
            s.total_pages,
            s.resident_pages,
            s.percent_cached
        )?;
    }
    Ok(())
}

fn render_json<W: Write>(out: &mut W, stats: &[CacheStatus], per_page: bool) -> io::Result<()> {
    let body = if per_page {
        serde_json::to_string(stats)
    } else {
        let stripped: Vec<CacheStatus> = stats
            .iter()
            .cloned()
            .map(|mut s| {
                s.per_page_resident = None;
                s
            })
            .collect();
        serde_json::to_string(&stripped)
    }
    .map_err(io::Error::other)?;
    writeln!(out, "{}", body)
}

fn render_histogram<W: Write>(out: &mut W, stats: &[CacheStatus]) -> io::Result<()> {
    let name_width = stats
        .iter()
        .map(|s| s.name.chars().count())
        .max()
        .unwrap_or(0);

    for s in stats {
        let bar: String = match &s.per_page_resident {
            Some(pages) => histogram_buckets(pages, HISTOGRAM_BUCKETS)
                .into_iter()
                .map(level_char)
                .collect(),
            None => {
                // No bitmap: draw the overall share as a solid bar.
                let filled = ((s.percent_cached / 100.0) * HISTOGRAM_BUCKETS as f64).round() as usize;
                let filled = filled.min(HISTOGRAM_BUCKETS);
                format!(
                    "{}{}",
                    "█".repeat(filled),
                    " ".repeat(HISTOGRAM_BUCKETS - filled)
                )
            }
        };
        writeln!(
            out,
            "{:<w$} |{}| {:>7.3}%",
            s.name,
            bar,
            s.percent_cached,
            w = name_width
        )?;
    }
    Ok(())
}

/// Splits `pages` into at most `buckets` consecutive groups and returns the
/// resident fraction of each group.
pub fn histogram_buckets(pages: &[bool], buckets: usize) -> Vec<f64> {
    if pages.is_empty() || buckets == 0 {
        return Vec::new();
    }
    let buckets = buckets.min(pages.len());
    (0..buckets)
        .map(|i| {
            let start = i * pages.len() / buckets;
            let end = (i + 1) * pages.len() / buckets;
            let chunk = &pages[start..end];
            chunk.iter().filter(|p| **p).count() as f64 / chunk.len() as f64
        })
        .collect()
}

fn level_char(fraction: f64) -> char {
    let idx = (fraction.clamp(0.0, 1.0) * (HISTOGRAM_LEVELS.len() - 1) as f64).round() as usize;
    HISTOGRAM_LEVELS[idx]
}
