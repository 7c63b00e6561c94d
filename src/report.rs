//! Rendering of trust reports: plain text, table, or JSON.

use clap::ValueEnum;
use prettytable::{Table, row};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::error::{Result, TrustError};
use crate::pipeline::TrustReport;
use crate::scoring::ScoredMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Sender headings with one line per message
    #[default]
    Text,
    Table,
    Json,
}

/// Consumer of a finished report
pub trait ReportSink {
    fn emit(&mut self, report: &TrustReport) -> Result<()>;
}

pub struct WriterSink<W: Write> {
    writer: W,
    format: ReportFormat,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W, format: ReportFormat) -> Self {
        Self { writer, format }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for WriterSink<W> {
    fn emit(&mut self, report: &TrustReport) -> Result<()> {
        match self.format {
            ReportFormat::Text => render_text(&mut self.writer, report),
            ReportFormat::Table => render_table(&mut self.writer, report),
            ReportFormat::Json => render_json(&mut self.writer, report),
        }
    }
}

fn render_text<W: Write>(w: &mut W, report: &TrustReport) -> Result<()> {
    if report.senders.is_empty() {
        writeln!(w, "No messages scored.")?;
    }
    for group in &report.senders {
        writeln!(w, "{}", group.sender)?;
        writeln!(w, "Average Trust Score: {}", group.average)?;
        for m in &group.messages {
            writeln!(
                w,
                "- {} \u{2192} {} (Score: {})",
                m.subject, m.sentiment_label, m.score
            )?;
        }
        writeln!(w, "---")?;
    }
    render_footer(w, report)
}

fn render_table<W: Write>(w: &mut W, report: &TrustReport) -> Result<()> {
    let mut table = Table::new();
    table.add_row(row!["Sender", "Average", "Subject", "Sentiment", "Score", "Keywords"]);
    for group in &report.senders {
        for (i, m) in group.messages.iter().enumerate() {
            let (sender, average) = if i == 0 {
                (group.sender.clone(), group.average.to_string())
            } else {
                (String::new(), String::new())
            };
            let keywords = m
                .breakdown
                .keyword_hits
                .iter()
                .map(|h| format!("{}({:+})x{}", h.word, h.weight, h.count))
                .collect::<Vec<_>>()
                .join(" ");
            table.add_row(row![
                sender,
                average,
                m.subject,
                m.sentiment_label,
                m.score,
                keywords
            ]);
        }
    }
    table.print(w)?;
    render_footer(w, report)
}

fn render_json<W: Write>(w: &mut W, report: &TrustReport) -> Result<()> {
    serde_json::to_writer_pretty(&mut *w, report).map_err(|e| TrustError::Serialization {
        message: e.to_string(),
    })?;
    writeln!(w)?;
    Ok(())
}

fn render_footer<W: Write>(w: &mut W, report: &TrustReport) -> Result<()> {
    writeln!(
        w,
        "{} of {} messages scored from {} ({} classifier, {} tokens)",
        report.scored, report.fetched, report.source, report.classifier, report.truncator
    )?;
    for s in &report.skipped {
        writeln!(w, "  skipped #{} {} / {}: {}", s.index, s.sender, s.subject, s.reason)?;
    }
    Ok(())
}

/// Component view of a single scored text
pub fn render_breakdown<W: Write>(w: &mut W, scored: &ScoredMessage) -> Result<()> {
    let b = &scored.breakdown;
    writeln!(w, "Trust score:     {}", scored.score)?;
    writeln!(
        w,
        "Sentiment:       {} (confidence {:.4}) -> {:.4}",
        scored.sentiment_label, b.confidence, b.sentiment_score
    )?;
    writeln!(w, "Keyword score:   {:.4}", b.keyword_score)?;
    for hit in &b.keyword_hits {
        writeln!(w, "  {:<12} {:+} x{}", hit.word, hit.weight, hit.count)?;
    }
    writeln!(w, "Response score:  {:.4}", b.response_score)?;
    writeln!(
        w,
        "Tokens kept:     {}{}",
        b.tokens_kept,
        if b.truncated { " (truncated)" } else { "" }
    )?;
    Ok(())
}
