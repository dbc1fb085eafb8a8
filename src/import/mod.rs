//! CSV import engine.
//!
//! Three layouts share one flow: parse the text, check the header, then take every data
//! line through field validation, a duplicate check, the balance guard and the write.
//! Problems with a single line are counted in the returned [`ImportOutcome`]; only an
//! unreadable file, a file without data lines, a header that matches no supported layout
//! or a store failure outside any line end the call with an [`ImportError`].

mod combined;
mod csv_line;
mod fields;
mod inventory;
mod outcome;
mod sales;

pub use combined::COMBINED_HEADER;
pub use csv_line::{header_matches, split_line};
pub use fields::normalize_date;
pub use inventory::INVENTORY_HEADER;
pub use outcome::ImportOutcome;
pub use sales::{DASHBOARD_SALES_HEADER, DIALOG_SALES_HEADER};

use std::fmt;
use std::path::{Path, PathBuf};

use crate::executor::StoreError;
use crate::metrics::METRICS;
use crate::repository::Repository;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Failed to read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV file must contain at least a header row and one data row")]
    TooFewLines,

    #[error("{0}")]
    HeaderMismatch(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Which layout an import call expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Inventory,
    Sales,
    Combined,
}

impl ImportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportKind::Inventory => "inventory",
            ImportKind::Sales => "sales",
            ImportKind::Combined => "combined",
        }
    }
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Import CSV text of the given layout.
///
/// # Errors
///
/// See [`ImportError`]; nothing is written when the header check fails.
pub fn import_text(repo: &Repository<'_>, kind: ImportKind, text: &str) -> Result<ImportOutcome, ImportError> {
    let import_id = uuid::Uuid::new_v4();
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::import_span(kind.as_str(), &import_id).entered();

    let outcome = match kind {
        ImportKind::Inventory => inventory::run(repo, text)?,
        ImportKind::Sales => sales::run(repo, text)?,
        ImportKind::Combined => combined::run(repo, text)?,
    };

    METRICS.record_rows_imported(u64::try_from(outcome.succeeded).unwrap_or(u64::MAX));
    log::info!("Import {import_id} ({kind}): {outcome}");
    Ok(outcome)
}

/// Read `path` as UTF-8 and import it
pub fn import_file(
    repo: &Repository<'_>,
    kind: ImportKind,
    path: impl AsRef<Path>,
) -> Result<ImportOutcome, ImportError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ImportError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    import_text(repo, kind, &text)
}

/// Inventory layout (11 columns), one lot per line
pub fn import_inventory(repo: &Repository<'_>, text: &str) -> Result<ImportOutcome, ImportError> {
    import_text(repo, ImportKind::Inventory, text)
}

/// Either sales layout (12 columns), one sale per line
pub fn import_sales(repo: &Repository<'_>, text: &str) -> Result<ImportOutcome, ImportError> {
    import_text(repo, ImportKind::Sales, text)
}

/// Combined layout (16 columns), lots with their sales
pub fn import_combined(repo: &Repository<'_>, text: &str) -> Result<ImportOutcome, ImportError> {
    import_text(repo, ImportKind::Combined, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::RecordCrypto;
    use crate::repository::tests::store;

    #[test]
    fn test_missing_file_is_unreadable() {
        let (exec, cipher) = store();
        let repo = Repository::new(&exec, RecordCrypto::new(&cipher, true));
        let dir = tempfile::tempdir().unwrap();
        let err = import_file(&repo, ImportKind::Inventory, dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, ImportError::Unreadable { .. }));
    }

    #[test]
    fn test_header_only_is_too_few_lines() {
        let (exec, cipher) = store();
        let repo = Repository::new(&exec, RecordCrypto::new(&cipher, true));
        let err = import_sales(&repo, "Sale Date,Entry Number\n").unwrap_err();
        assert_eq!(err.to_string(), "CSV file must contain at least a header row and one data row");
    }

    #[test]
    fn test_file_import_reads_utf8() {
        let (exec, cipher) = store();
        let repo = Repository::new(&exec, RecordCrypto::new(&cipher, true));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.csv");
        std::fs::write(
            &path,
            "Entry Date,S.No,Type,Dimensions,Weight,Coating,Specifications,Item Form,LOT,Quality,Balance\n\
             01/06/2024,100,E,1.50×120,500,ZincA,Grade1,Coil,LOT-X,Soft,500\n",
        )
        .unwrap();
        let outcome = import_file(&repo, ImportKind::Inventory, &path).unwrap();
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.lots_created, 1);
    }
}
