//! Paper record stored in a ledger.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::stage::{FieldStatus, StageKind, StageOutput};

/// A paper and everything derived from it so far.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Paper {
    /// Stable identifier (arXiv id for crawled papers). Empty when the
    /// input record had none; the ledger then derives it from the link.
    #[serde(rename = "arxiv_id", alias = "id", default)]
    pub id: String,

    #[serde(default)]
    pub title: String,

    /// Link to the paper page or PDF
    #[serde(default)]
    pub link: String,

    /// Original abstract
    #[serde(default)]
    pub summary: String,

    /// Generated summary of the full text
    #[serde(rename = "summary2", default, skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,

    /// Translated abstract
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_translation: Option<String>,

    /// Inspiration trace analysis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspiration_trace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_insights: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_evaluation: Option<String>,

    /// Why the relevance filter kept or dropped the paper
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_reason: Option<String>,

    /// Relevance verdict; `Some(false)` excludes the paper from later stages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_result: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_generated_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_model: Option<String>,

    /// Any other fields (authors, category, filter reasons, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Paper {
    pub fn new(id: impl Into<String>, title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            link: link.into(),
            summary: String::new(),
            ai_summary: None,
            summary_translation: None,
            inspiration_trace: None,
            research_insights: None,
            critical_evaluation: None,
            filter_reason: None,
            filter_result: None,
            summary_generated_time: None,
            summary_model: None,
            extra: Map::new(),
        }
    }

    /// Stored value of a stage's derived field.
    pub fn derived(&self, kind: StageKind) -> Option<&str> {
        match kind {
            StageKind::Relevance => self.filter_reason.as_deref(),
            StageKind::Summary => self.ai_summary.as_deref(),
            StageKind::Translation => self.summary_translation.as_deref(),
            StageKind::Trace => self.inspiration_trace.as_deref(),
            StageKind::Insights => self.research_insights.as_deref(),
            StageKind::Evaluation => self.critical_evaluation.as_deref(),
        }
    }

    pub fn set_derived(&mut self, kind: StageKind, value: String) {
        let slot = match kind {
            StageKind::Relevance => &mut self.filter_reason,
            StageKind::Summary => &mut self.ai_summary,
            StageKind::Translation => &mut self.summary_translation,
            StageKind::Trace => &mut self.inspiration_trace,
            StageKind::Insights => &mut self.research_insights,
            StageKind::Evaluation => &mut self.critical_evaluation,
        };
        *slot = Some(value);
    }

    /// Store a stage result. A relevance verdict also sets `filter_result`.
    pub fn record(&mut self, kind: StageKind, output: StageOutput) {
        if let StageOutput::Judged { relevant, .. } = &output {
            self.filter_result = Some(*relevant);
        }
        self.set_derived(kind, output.into_field(kind));
    }

    /// Judged irrelevant by the relevance filter.
    pub fn is_excluded(&self) -> bool {
        self.filter_result == Some(false)
    }

    pub fn status(&self, kind: StageKind) -> FieldStatus<'_> {
        FieldStatus::of(kind, self.derived(kind))
    }

    /// Whether `kind` still has work to do for this paper. Excluded papers
    /// only ever need the relevance check.
    pub fn needs(&self, kind: StageKind) -> bool {
        if kind != StageKind::Relevance && self.is_excluded() {
            return false;
        }
        !self.status(kind).is_done()
    }

    /// Whether no stage of `plan` has work left.
    pub fn is_satisfied(&self, plan: &[StageKind]) -> bool {
        !plan.iter().any(|kind| self.needs(*kind))
    }

    /// Link to fetch the full text from. Falls back to the id, which
    /// resolves as a bare arXiv identifier.
    pub fn source_link(&self) -> &str {
        if self.link.trim().is_empty() {
            &self.id
        } else {
            &self.link
        }
    }

    /// Title shortened for log lines.
    pub fn short_title(&self, max_chars: usize) -> String {
        crate::utils::text::truncate_chars(&self.title, max_chars)
    }
}
