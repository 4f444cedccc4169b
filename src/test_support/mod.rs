//! Test utilities for wrapsync unit tests.
//!
//! [`FakeExtractor`] stands in for header analysis: it returns scripted
//! reports and can be told to fail or panic for selected headers, which is
//! what the orchestration tests need.

pub mod fixtures;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::document::Document;
use crate::core::signature::SignatureReport;
use crate::extract::{ExtractError, ExtractRequest, Extractor, HeaderSignature};

pub use fixtures::*;

/// Scripted extractor keyed by header name.
#[derive(Debug, Default)]
pub struct FakeExtractor {
    reports: HashMap<String, SignatureReport>,
    failures: HashSet<String>,
    panics: HashSet<String>,
    calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report returned for header `name` (empty if unset).
    pub fn with_report(mut self, name: &str, report: SignatureReport) -> Self {
        self.reports.insert(name.to_string(), report);
        self
    }

    /// Same as [`with_report`](Self::with_report), with the report written
    /// in descriptor vocabulary.
    pub fn with_yaml(self, name: &str, yaml: &str) -> Self {
        self.with_report(name, report_from_yaml(yaml))
    }

    /// Fail extraction of header `name`.
    pub fn failing(mut self, name: &str) -> Self {
        self.failures.insert(name.to_string());
        self
    }

    /// Panic while extracting header `name`.
    pub fn panicking(mut self, name: &str) -> Self {
        self.panics.insert(name.to_string());
        self
    }

    /// Number of extractions attempted so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Extractor for FakeExtractor {
    fn name(&self) -> &str {
        "fake"
    }

    fn extract(&self, request: &ExtractRequest<'_>) -> Result<HeaderSignature, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = &request.action.name;

        if self.panics.contains(name) {
            panic!("extractor crashed on {}", name);
        }
        if self.failures.contains(name) {
            return Err(ExtractError::Parse {
                header: request.action.header.display().to_string(),
                message: format!("scripted failure for {}", name),
            });
        }

        let report = self.reports.get(name).cloned().unwrap_or_default();
        Ok(HeaderSignature::new(report, request.descriptor))
    }
}

/// Parse a report written in descriptor vocabulary.
pub fn report_from_yaml(yaml: &str) -> SignatureReport {
    let doc = Document::parse("report.yml", yaml).expect("report yaml parses");
    SignatureReport::from_document(&doc).expect("report uses descriptor vocabulary")
}
