//! Itemized validation diagnostics.
//!
//! Content mismatches never abort a validation run; every instance is
//! collected here so one run can report all divergences between a container
//! and its module.

use crate::fourcc::FourCC;
use core::fmt;

/// One content-validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A field decoded from the container differs from the module-derived
    /// value. Reported per field, never as a bare pass/fail.
    Mismatch {
        /// Part the field belongs to.
        part: FourCC,
        /// Field path (e.g. `"SigInputElement[1].semantic_name"`).
        field: String,
        /// Value recomputed from the live module.
        expected: String,
        /// Value found in the container.
        actual: String,
    },
    /// An entry in a shared table (string pool, semantic index pool) is not
    /// referenced by any consumer in the part. An unused entry is strong
    /// evidence the container and module were built from different states.
    UnusedTableEntry {
        /// Part owning the table.
        part: FourCC,
        /// Table name (`"StringTable"` or `"SemanticIndexTable"`).
        table: &'static str,
        /// Byte or element offset of the unused entry.
        offset: u32,
        /// Rendering of the unused entry.
        value: String,
    },
    /// A mandatory part for this profile is absent. Reported once per
    /// missing part.
    MissingPart {
        /// The absent part code.
        part: FourCC,
    },
    /// An opaque part's bytes differ from the module-derived bytes.
    BlobMismatch {
        /// The differing part.
        part: FourCC,
        /// Byte offset of the first difference.
        first_difference: usize,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch {
                part,
                field,
                expected,
                actual,
            } => write!(
                f,
                "{part} mismatch: {field}: container has {actual}, module produces {expected}"
            ),
            Self::UnusedTableEntry {
                part,
                table,
                offset,
                value,
            } => write!(f, "{part}: unused item in {table} at offset {offset}: {value}"),
            Self::MissingPart { part } => write!(f, "missing mandatory part {part}"),
            Self::BlobMismatch {
                part,
                first_difference,
            } => write!(
                f,
                "{part} part bytes differ from module (first difference at byte {first_difference})"
            ),
        }
    }
}

/// Collects diagnostics for one validation run.
///
/// Each run owns its own sink; there is no process-wide diagnostic state.
#[derive(Debug, Default)]
pub struct DiagnosticsSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticsSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one diagnostic.
    pub fn report(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    pub(crate) fn mismatch(
        &mut self,
        part: FourCC,
        field: impl Into<String>,
        expected: impl fmt::Display,
        actual: impl fmt::Display,
    ) {
        self.report(Diagnostic::Mismatch {
            part,
            field: field.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }

    /// True if nothing has been reported.
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Number of diagnostics reported so far.
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// All diagnostics reported so far, in report order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Consumes the sink, yielding its diagnostics.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
