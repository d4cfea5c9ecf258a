//! Enrichment stage identifiers and their results.
//!
//! Inside the crate a stage result is always a [`StageOutput`]. Only when a
//! result is written into a paper record does a failure become a marker
//! string, and only when a record is read back is that string classified
//! again through [`FieldStatus`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// One enrichment step, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Relevance filter; a paper judged irrelevant gets no further stages
    Relevance,
    Summary,
    Translation,
    Trace,
    Insights,
    Evaluation,
}

impl StageKind {
    /// All stages in the order they run for one paper.
    pub const ALL: [StageKind; 6] = [
        StageKind::Relevance,
        StageKind::Summary,
        StageKind::Translation,
        StageKind::Trace,
        StageKind::Insights,
        StageKind::Evaluation,
    ];

    /// Stages run when none are selected explicitly.
    pub const DEFAULT: [StageKind; 3] =
        [StageKind::Summary, StageKind::Translation, StageKind::Trace];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Relevance => "relevance",
            StageKind::Summary => "summary",
            StageKind::Translation => "translation",
            StageKind::Trace => "trace",
            StageKind::Insights => "insights",
            StageKind::Evaluation => "evaluation",
        }
    }

    /// Name of the derived field in the ledger record.
    pub fn field(&self) -> &'static str {
        match self {
            StageKind::Relevance => "filter_reason",
            StageKind::Summary => "summary2",
            StageKind::Translation => "summary_translation",
            StageKind::Trace => "inspiration_trace",
            StageKind::Insights => "research_insights",
            StageKind::Evaluation => "critical_evaluation",
        }
    }

    /// Prefix written in front of the reason when a stage fails.
    fn failure_prefix(&self) -> &'static str {
        match self {
            StageKind::Relevance => "Relevance check failed",
            StageKind::Summary => "Summary generation failed",
            StageKind::Translation => "Translation failed",
            StageKind::Trace => "Inspiration trace generation failed",
            StageKind::Insights => "Research insights generation failed",
            StageKind::Evaluation => "Critical evaluation generation failed",
        }
    }

    /// Substrings that mark a stored value as failed. Includes markers
    /// written by older tooling into existing ledgers.
    fn markers(&self) -> &'static [&'static str] {
        match self {
            StageKind::Relevance => &["Relevance check failed", "API调用错误", "未知错误", "处理错误"],
            StageKind::Summary => &["Summary generation failed", "总结生成失败"],
            StageKind::Translation => &["Translation failed", "翻译失败"],
            StageKind::Trace => &[
                "Inspiration trace generation failed",
                "生成灵感溯源时发生错误",
                "灵感溯源分析生成失败",
            ],
            StageKind::Insights => &["Research insights generation failed", "研究洞察分析生成失败"],
            StageKind::Evaluation => &["Critical evaluation generation failed", "批判性评估生成失败"],
        }
    }

    /// Parse a comma-separated list such as `summary,trace`.
    ///
    /// The result is deduplicated and sorted into pipeline order.
    pub fn parse_list(s: &str) -> Result<Vec<StageKind>> {
        let mut kinds = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(StageKind::from_str)
            .collect::<Result<Vec<_>>>()?;
        if kinds.is_empty() {
            return Err(AppError::validation("no stages selected"));
        }
        kinds.sort();
        kinds.dedup();
        Ok(kinds)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "summary" | "summary2" => Ok(StageKind::Summary),
            "translation" | "translate" => Ok(StageKind::Translation),
            "trace" | "inspiration" | "inspiration_trace" => Ok(StageKind::Trace),
            "relevance" | "filter" | "filter_reason" => Ok(StageKind::Relevance),
            "insights" | "research_insights" => Ok(StageKind::Insights),
            "evaluation" | "critical_evaluation" => Ok(StageKind::Evaluation),
            other => Err(AppError::validation(format!("unknown stage '{other}'"))),
        }
    }
}

/// Result of running one stage for one paper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutput {
    Completed(String),
    /// Relevance verdict; the reason is what gets stored
    Judged { relevant: bool, reason: String },
    Failed(String),
}

impl StageOutput {
    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutput::Failed(_))
    }

    /// Serialize into the string stored in the ledger field.
    pub fn into_field(self, kind: StageKind) -> String {
        match self {
            StageOutput::Completed(text) => text,
            StageOutput::Judged { reason, .. } => reason,
            StageOutput::Failed(reason) => format!("{}: {}", kind.failure_prefix(), reason),
        }
    }
}

/// How a stored derived field reads back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStatus<'a> {
    /// Absent or empty
    Missing,
    /// Contains a failure marker
    Failed,
    /// Usable output
    Done(&'a str),
}

impl<'a> FieldStatus<'a> {
    /// Classify a stored value for a stage.
    ///
    /// Empty and failed values both mean "not done"; an empty result is
    /// re-attempted on every run.
    pub fn of(kind: StageKind, value: Option<&'a str>) -> Self {
        match value {
            None => FieldStatus::Missing,
            Some(v) if v.trim().is_empty() => FieldStatus::Missing,
            Some(v) if kind.markers().iter().any(|m| v.contains(m)) => FieldStatus::Failed,
            Some(v) => FieldStatus::Done(v),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, FieldStatus::Done(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_orders_and_dedups() {
        let kinds = StageKind::parse_list("trace, summary,trace").unwrap();
        assert_eq!(kinds, vec![StageKind::Summary, StageKind::Trace]);
    }

    #[test]
    fn test_parse_list_rejects_unknown() {
        assert!(StageKind::parse_list("summary,critique").is_err());
        assert!(StageKind::parse_list(" , ").is_err());
    }

    #[test]
    fn test_failed_output_reads_back_as_failed() {
        let field = StageOutput::Failed("timeout".into()).into_field(StageKind::Translation);
        assert_eq!(field, "Translation failed: timeout");
        assert_eq!(
            FieldStatus::of(StageKind::Translation, Some(&field)),
            FieldStatus::Failed
        );
    }

    #[test]
    fn test_every_stage_has_a_distinct_field() {
        let mut fields: Vec<_> = StageKind::ALL.iter().map(StageKind::field).collect();
        fields.sort();
        fields.dedup();
        assert_eq!(fields.len(), StageKind::ALL.len());
        for kind in StageKind::ALL {
            assert_eq!(kind.as_str().parse::<StageKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_extra_stage_markers() {
        assert_eq!(
            FieldStatus::of(StageKind::Insights, Some("研究洞察分析生成失败")),
            FieldStatus::Failed
        );
        assert_eq!(
            FieldStatus::of(StageKind::Evaluation, Some("批判性评估生成失败")),
            FieldStatus::Failed
        );
        assert_eq!(
            FieldStatus::of(StageKind::Relevance, Some("API调用错误: timeout")),
            FieldStatus::Failed
        );
        let field = StageOutput::Failed("refused".into()).into_field(StageKind::Evaluation);
        assert_eq!(
            FieldStatus::of(StageKind::Evaluation, Some(&field)),
            FieldStatus::Failed
        );
    }

    #[test]
    fn test_verdict_stores_reason() {
        let output = StageOutput::Judged {
            relevant: false,
            reason: "Applies an existing agent to chemistry".into(),
        };
        assert_eq!(
            output.into_field(StageKind::Relevance),
            "Applies an existing agent to chemistry"
        );
    }

    #[test]
    fn test_legacy_markers() {
        assert_eq!(
            FieldStatus::of(StageKind::Summary, Some("总结生成失败")),
            FieldStatus::Failed
        );
        assert_eq!(
            FieldStatus::of(StageKind::Trace, Some("生成灵感溯源时发生错误: boom")),
            FieldStatus::Failed
        );
    }

    #[test]
    fn test_markers_are_per_field() {
        // A translation marker inside a summary is just text.
        let status = FieldStatus::of(StageKind::Summary, Some("Translation failed to converge"));
        assert!(status.is_done());
    }

    #[test]
    fn test_empty_is_missing() {
        assert_eq!(FieldStatus::of(StageKind::Trace, None), FieldStatus::Missing);
        assert_eq!(
            FieldStatus::of(StageKind::Trace, Some("  ")),
            FieldStatus::Missing
        );
    }
}
