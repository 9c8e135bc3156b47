//! Read-side holders: workbook and sheet scopes.

use log::debug;

use super::options::ReadOptions;
use super::scope::{ReadOverrides, ReadScopeConfig, derive_registry};
use crate::converter::{ConverterRegistry, ConversionContext};
use crate::model::ExcelHeadProperty;
use crate::producer::SheetInfo;

/// Workbook scope of a read session.
#[derive(Debug, Clone)]
pub struct ReadWorkbookHolder {
    pub config: ReadScopeConfig,
    pub converters: ConverterRegistry,
}

impl ReadWorkbookHolder {
    pub fn new(options: &ReadOptions, detected_1904: bool, converters: ConverterRegistry) -> Self {
        Self {
            config: ReadScopeConfig::workbook(options, detected_1904),
            converters,
        }
    }
}

/// Sheet scope of a read session.
///
/// Built when the sheet is entered; holds a snapshot of the workbook's
/// converters with the sheet's own registrations layered on top.
#[derive(Debug, Clone)]
pub struct ReadSheetHolder {
    pub sheet: SheetInfo,
    pub config: ReadScopeConfig,
    pub converters: ConverterRegistry,
    pub head: ExcelHeadProperty,
    /// Number of workbook-level listeners dispatched before the sheet's own
    pub inherited_listeners: usize,
}

impl ReadSheetHolder {
    pub fn new(
        parent: &ReadWorkbookHolder,
        sheet: SheetInfo,
        overrides: &ReadOverrides,
        head: ExcelHeadProperty,
        inherited_listeners: usize,
    ) -> Self {
        let config = parent.config.child(overrides);
        let head = overrides.head.as_ref().map_or(head, |source| source.build());
        debug!(
            "entering sheet {} '{}' with {} header row(s)",
            sheet.index, sheet.name, config.head_row_number
        );
        Self {
            sheet,
            config,
            converters: derive_registry(&parent.converters, &overrides.converters),
            head,
            inherited_listeners,
        }
    }

    pub fn conversion_context(&self) -> ConversionContext<'static> {
        self.config.conversion_context()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::NativeType;
    use crate::holder::HeadSource;
    use crate::model::CellDataType;

    #[test]
    fn test_sheet_snapshot_is_isolated() {
        let options = ReadOptions::default().with_head_row_number(2);
        let mut workbook = ReadWorkbookHolder::new(&options, true, ConverterRegistry::new());
        let overrides = ReadOverrides {
            head_row_number: Some(0),
            head: Some(HeadSource::labels(["A", "B"])),
            ..Default::default()
        };
        let sheet = ReadSheetHolder::new(
            &workbook,
            SheetInfo::new(0, "Data"),
            &overrides,
            ExcelHeadProperty::empty(),
            1,
        );
        assert_eq!(sheet.config.head_row_number, 0);
        assert!(sheet.config.use_1904_windowing);
        assert_eq!(sheet.head.heads().len(), 2);

        // Later workbook registrations do not reach an existing sheet scope
        workbook.converters = ConverterRegistry::with_defaults();
        assert!(sheet
            .converters
            .resolve_for_read(NativeType::String, CellDataType::String)
            .is_err());
    }

    #[test]
    fn test_explicit_1904_wins_over_detection() {
        let options = ReadOptions::default().with_1904_windowing(false);
        let workbook = ReadWorkbookHolder::new(&options, true, ConverterRegistry::new());
        assert!(!workbook.config.use_1904_windowing);
    }
}
