//! Output formatters for evaluation reports

use crate::config::OutputFormat;
use crate::documents::DocumentVerdict;
use crate::error::{Alert, Result};
use crate::output::report::{EvaluationReport, ReportBody};
use crate::pipeline::{CandidateRecord, StageDetail, StageOutcome, StageState};
use crate::processing::scoring::ScoreBreakdown;
use colored::{Color, Colorize};
use std::path::Path;

/// Trait for formatting evaluation reports
pub trait OutputFormatter {
    fn format_report(&self, report: &EvaluationReport) -> Result<String>;
    fn supports_format(&self) -> OutputFormat;
}

/// Console formatter with colors and score badges
pub struct ConsoleFormatter {
    use_colors: bool,
    detailed: bool,
}

/// JSON formatter for downstream tooling
pub struct JsonFormatter {
    pretty: bool,
}

/// Markdown formatter for sharing reports
pub struct MarkdownFormatter {
    include_metadata: bool,
}

/// Report generator that dispatches to the configured formatter
pub struct ReportGenerator {
    console_formatter: ConsoleFormatter,
    json_formatter: JsonFormatter,
    markdown_formatter: MarkdownFormatter,
}

fn stage_title(state: StageState) -> &'static str {
    match state {
        StageState::Submitted => "CV match",
        StageState::CvMatched => "Written interview",
        StageState::WrittenPassed => "Video interview",
        StageState::VideoPassed => "Document verification",
        StageState::DocumentsVerified => "Final decision",
        StageState::Advanced | StageState::Rejected => "Closed",
    }
}

/// Pair each outcome with the state its stage started from
fn outcome_stages<'a>(
    record: &CandidateRecord,
    outcomes: &'a [StageOutcome],
) -> Vec<(StageState, &'a StageOutcome)> {
    let mut from = StageState::Submitted;
    let mut stages = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        let started = if outcome.rejected() {
            record.rejected_from.unwrap_or(from)
        } else {
            from
        };
        stages.push((started, outcome));
        from = outcome.state;
    }
    stages
}

fn percent(value: f32) -> f64 {
    (value as f64 * 100.0).round()
}

impl ConsoleFormatter {
    pub fn new(use_colors: bool, detailed: bool) -> Self {
        Self { use_colors, detailed }
    }

    fn colorize(&self, text: &str, color: Color) -> String {
        if self.use_colors {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    fn format_header(&self, title: &str, level: u8) -> String {
        let prefix = match level {
            1 => "█",
            2 => "▓",
            3 => "▒",
            _ => "░",
        };

        let color = match level {
            1 => Color::Blue,
            2 => Color::Green,
            3 => Color::Yellow,
            _ => Color::White,
        };

        if self.use_colors {
            format!("\n{} {}\n", prefix.color(color).bold(), title.color(color).bold())
        } else {
            format!("\n{} {}\n", prefix, title)
        }
    }

    fn format_score_badge(&self, score: f64) -> String {
        let (badge, color) = match score.round() as u8 {
            90..=100 => ("EXCELLENT", Color::Green),
            80..=89 => ("VERY GOOD", Color::BrightGreen),
            70..=79 => ("GOOD", Color::Yellow),
            60..=69 => ("FAIR", Color::BrightYellow),
            50..=59 => ("BELOW AVG", Color::Red),
            _ => ("POOR", Color::BrightRed),
        };

        if self.use_colors {
            format!("[{}]", badge.color(color).bold())
        } else {
            format!("[{}]", badge)
        }
    }

    fn format_pass_icon(&self, passed: bool) -> &'static str {
        match (passed, self.use_colors) {
            (true, true) => "✅",
            (false, true) => "❌",
            (true, false) => "[PASS]",
            (false, false) => "[FAIL]",
        }
    }

    fn format_alerts(&self, alerts: &[Alert]) -> String {
        let mut output = String::new();
        if alerts.is_empty() {
            return output;
        }
        output.push_str(&self.format_header("⚠️  Alerts", 3));
        for alert in alerts {
            output.push_str(&format!(
                "  • {} {}\n",
                self.colorize(&format!("[{}]", alert.kind), Color::Yellow),
                alert.message
            ));
        }
        output
    }

    fn format_breakdown(&self, breakdown: &ScoreBreakdown, questions: &[String]) -> String {
        let mut output = String::new();

        output.push_str(&self.format_header("Similarity Signals", 3));
        for (name, score) in breakdown.similarity_scores.iter() {
            output.push_str(&format!("  🔍 {}: {:.0}%\n", name.replace('_', " "), percent(score)));
        }

        if !breakdown.skill_matches.is_empty() {
            output.push_str(&self.format_header("Skill Coverage", 3));
            for (category, ratio) in &breakdown.skill_matches {
                output.push_str(&format!("  🎯 {}: {:.0}%\n", category.label(), percent(*ratio)));
            }
            output.push_str(&format!("  Average: {:.0}%\n", percent(breakdown.skill_average)));
        }

        let missing: Vec<String> = breakdown.missing_skills.values().flatten().cloned().collect();
        if !missing.is_empty() {
            output.push_str(&self.format_header("Missing Skills", 3));
            output.push_str(&format!("  {}\n", self.colorize(&missing.join(", "), Color::Red)));
        }

        if self.detailed {
            output.push_str(&self.format_header("CV Quality", 3));
            output.push_str(&format!("  Completeness: {:.0}%\n", percent(breakdown.quality.completeness)));
            output.push_str(&format!("  Technical depth: {:.0}%\n", percent(breakdown.quality.technical_depth)));
            output.push_str(&format!(
                "  Experience clarity: {:.0}%\n",
                percent(breakdown.quality.experience_clarity)
            ));
        }

        if !breakdown.recommendations.is_empty() {
            output.push_str(&self.format_header("📋 Recommendations", 3));
            for (i, rec) in breakdown.recommendations.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, rec));
            }
        }

        if !questions.is_empty() {
            output.push_str(&self.format_header("❓ Interview Questions", 3));
            for (i, question) in questions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, question));
            }
        }
        output
    }

    fn format_verdicts(&self, verdicts: &[DocumentVerdict]) -> String {
        let mut output = String::new();
        for verdict in verdicts {
            let name = verdict.label.as_deref().unwrap_or("document");
            output.push_str(&format!(
                "  {} {} ({}) confidence {:.1}%\n",
                self.format_pass_icon(verdict.result.is_authentic),
                name,
                verdict.result.document_type,
                verdict.score()
            ));
            if let Some(best) = &verdict.result.best_match_id {
                output.push_str(&format!("     best reference: {}\n", best));
            }
            if self.detailed {
                for (reference, similarity) in &verdict.result.similarities {
                    output.push_str(&format!(
                        "     {}: text {:.2} layout {:.2} visual {:.2} global {:.2}\n",
                        reference, similarity.text, similarity.layout, similarity.visual, similarity.global
                    ));
                }
            }
        }
        output
    }

    fn format_outcome_detail(&self, detail: &StageDetail) -> String {
        match detail {
            StageDetail::CvMatch { breakdown, questions } => match breakdown {
                Some(breakdown) if self.detailed => self.format_breakdown(breakdown, questions),
                _ => String::new(),
            },
            StageDetail::Written(transcript) if self.detailed => {
                let mut output = String::new();
                for qa in &transcript.questions {
                    output.push_str(&format!("     Q: {}\n     score {:.2}\n", qa.question, qa.score));
                }
                output
            }
            StageDetail::Video(summary) => match summary.dominant_emotion {
                Some(emotion) => format!(
                    "     dominant emotion: {} over {} frames\n",
                    emotion, summary.total_frames
                ),
                None => "     no frames analyzed\n".to_string(),
            },
            StageDetail::Documents(verdicts) => self.format_verdicts(verdicts),
            _ => String::new(),
        }
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format_report(&self, report: &EvaluationReport) -> Result<String> {
        let mut output = String::new();

        output.push_str(&self.format_header("📊 CANDIDATE EVALUATION", 1));
        output.push_str(&format!(
            "Generated: {} | Processing time: {}ms\n",
            report.metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            report.metadata.processing_time_ms
        ));

        output.push_str(&self.format_header("Summary", 2));
        if let Some(score) = report.headline_score() {
            output.push_str(&format!("Score: {:.2} {}\n", score, self.format_score_badge(score)));
        }
        output.push_str(&format!("Verdict: {}\n", self.colorize(&report.verdict(), Color::Cyan)));

        match &report.body {
            ReportBody::Pipeline { record, outcomes } => {
                output.push_str(&format!("Candidate: {} | Job: {}\n", record.candidate_id, record.job_id));
                output.push_str(&self.format_header("Stages", 2));
                for (stage, outcome) in outcome_stages(record, outcomes) {
                    output.push_str(&format!(
                        "{} {}: {:.2}\n",
                        self.format_pass_icon(!outcome.rejected()),
                        stage_title(stage),
                        outcome.score
                    ));
                    output.push_str(&self.format_outcome_detail(&outcome.detail));
                }
            }
            ReportBody::CvMatch { breakdown, questions } => {
                output.push_str(&self.format_breakdown(breakdown, questions));
            }
            ReportBody::Documents { verdicts } => {
                output.push_str(&self.format_header("Documents", 2));
                output.push_str(&self.format_verdicts(verdicts));
            }
        }

        output.push_str(&self.format_alerts(&report.all_alerts()));
        Ok(output)
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Console
    }
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_report(&self, report: &EvaluationReport) -> Result<String> {
        if self.pretty {
            Ok(serde_json::to_string_pretty(report)?)
        } else {
            Ok(serde_json::to_string(report)?)
        }
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Json
    }
}

impl MarkdownFormatter {
    pub fn new(include_metadata: bool) -> Self {
        Self { include_metadata }
    }

    fn markdown_score_badge(score: f64) -> &'static str {
        match score.round() as u8 {
            90..=100 => "🟢 **EXCELLENT**",
            80..=89 => "🟢 **VERY GOOD**",
            70..=79 => "🟡 **GOOD**",
            60..=69 => "🟡 **FAIR**",
            50..=59 => "🟠 **BELOW AVERAGE**",
            _ => "🔴 **POOR**",
        }
    }

    fn breakdown_section(breakdown: &ScoreBreakdown, questions: &[String]) -> String {
        let mut output = String::new();
        output.push_str("### Similarity Signals\n\n| Signal | Score |\n|--------|-------|\n");
        for (name, score) in breakdown.similarity_scores.iter() {
            output.push_str(&format!("| {} | {:.0}% |\n", name.replace('_', " "), percent(score)));
        }
        output.push('\n');

        if !breakdown.skill_matches.is_empty() {
            output.push_str("### Skill Coverage\n\n| Category | Matched | Missing |\n|----------|---------|---------|\n");
            for (category, ratio) in &breakdown.skill_matches {
                let missing = breakdown
                    .missing_skills
                    .get(category)
                    .map(|skills| skills.join(", "))
                    .unwrap_or_default();
                output.push_str(&format!("| {} | {:.0}% | {} |\n", category.label(), percent(*ratio), missing));
            }
            output.push('\n');
        }

        if !breakdown.recommendations.is_empty() {
            output.push_str("### Recommendations\n\n");
            for rec in &breakdown.recommendations {
                output.push_str(&format!("- {}\n", rec));
            }
            output.push('\n');
        }

        if !questions.is_empty() {
            output.push_str("### Interview Questions\n\n");
            for (i, question) in questions.iter().enumerate() {
                output.push_str(&format!("{}. {}\n", i + 1, question));
            }
            output.push('\n');
        }
        output
    }

    fn verdict_table(verdicts: &[DocumentVerdict]) -> String {
        let mut output = String::from("| Document | Type | Authentic | Confidence | Best reference |\n");
        output.push_str("|----------|------|-----------|------------|----------------|\n");
        for verdict in verdicts {
            output.push_str(&format!(
                "| {} | {} | {} | {:.1}% | {} |\n",
                verdict.label.as_deref().unwrap_or("document"),
                verdict.result.document_type,
                if verdict.result.is_authentic { "yes" } else { "no" },
                verdict.score(),
                verdict.result.best_match_id.as_deref().unwrap_or("-")
            ));
        }
        output.push('\n');
        output
    }
}

impl OutputFormatter for MarkdownFormatter {
    fn format_report(&self, report: &EvaluationReport) -> Result<String> {
        let mut output = String::new();

        output.push_str("# 📊 Candidate Evaluation Report\n\n");

        if self.include_metadata {
            output.push_str(&format!(
                "**Generated:** {} | **Processing Time:** {}ms | **Version:** {}\n\n",
                report.metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
                report.metadata.processing_time_ms,
                report.metadata.tool_version
            ));
            if !report.metadata.sources.is_empty() {
                let sources: Vec<String> = report
                    .metadata
                    .sources
                    .iter()
                    .map(|s| format!("`{}`", s))
                    .collect();
                output.push_str(&format!("**Sources:** {}\n\n", sources.join(", ")));
            }
        }

        output.push_str("## Summary\n\n");
        if let Some(score) = report.headline_score() {
            output.push_str(&format!("**Score:** {:.2} {}\n\n", score, Self::markdown_score_badge(score)));
        }
        output.push_str(&format!("**Verdict:** {}\n\n", report.verdict()));

        match &report.body {
            ReportBody::Pipeline { record, outcomes } => {
                output.push_str(&format!(
                    "**Candidate:** `{}` | **Job:** `{}`\n\n",
                    record.candidate_id, record.job_id
                ));
                output.push_str("## Stages\n\n| Stage | Score | Result |\n|-------|-------|--------|\n");
                for (stage, outcome) in outcome_stages(record, outcomes) {
                    output.push_str(&format!(
                        "| {} | {:.2} | {} |\n",
                        stage_title(stage),
                        outcome.score,
                        if outcome.rejected() { "❌ rejected" } else { "✅ passed" }
                    ));
                }
                output.push('\n');

                if let Some(breakdown) = &record.cv_breakdown {
                    output.push_str("## CV Match\n\n");
                    output.push_str(&Self::breakdown_section(breakdown, &record.questions));
                }
                if !record.documents.is_empty() {
                    output.push_str("## Documents\n\n");
                    output.push_str(&Self::verdict_table(&record.documents));
                }
            }
            ReportBody::CvMatch { breakdown, questions } => {
                output.push_str(&Self::breakdown_section(breakdown, questions));
            }
            ReportBody::Documents { verdicts } => {
                output.push_str("## Documents\n\n");
                output.push_str(&Self::verdict_table(verdicts));
            }
        }

        let alerts = report.all_alerts();
        if !alerts.is_empty() {
            output.push_str("## Alerts\n\n");
            for alert in &alerts {
                output.push_str(&format!("- **{}**: {}\n", alert.kind, alert.message));
            }
            output.push('\n');
        }

        output.push_str("---\n*Generated by ats-gate*\n");
        Ok(output)
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Markdown
    }
}

impl ReportGenerator {
    pub fn new() -> Self {
        Self {
            console_formatter: ConsoleFormatter::new(true, false),
            json_formatter: JsonFormatter::new(true),
            markdown_formatter: MarkdownFormatter::new(true),
        }
    }

    pub fn with_options(use_colors: bool, detailed: bool, pretty_json: bool, include_metadata: bool) -> Self {
        Self {
            console_formatter: ConsoleFormatter::new(use_colors, detailed),
            json_formatter: JsonFormatter::new(pretty_json),
            markdown_formatter: MarkdownFormatter::new(include_metadata),
        }
    }

    pub fn generate_report(&self, report: &EvaluationReport, format: &OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Console => self.console_formatter.format_report(report),
            OutputFormat::Json => self.json_formatter.format_report(report),
            OutputFormat::Markdown => self.markdown_formatter.format_report(report),
        }
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn save_report_to_file(content: &str, file_path: &Path) -> Result<()> {
    use std::fs;
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(file_path, content)?;
    Ok(())
}

pub fn suggest_filename(format: &OutputFormat, subject: &str, timestamp: bool) -> String {
    let base_name = Path::new(subject)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "candidate".to_string());

    let timestamp_suffix = if timestamp {
        format!("_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S"))
    } else {
        String::new()
    };

    match format {
        OutputFormat::Console => format!("{}_evaluation{}.txt", base_name, timestamp_suffix),
        OutputFormat::Json => format!("{}_evaluation{}.json", base_name, timestamp_suffix),
        OutputFormat::Markdown => format!("{}_evaluation{}.md", base_name, timestamp_suffix),
    }
}
