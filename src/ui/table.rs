use eframe::egui::{ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};

use crate::data::aggregate::FilteredRow;
use crate::data::export::{EXPORT_COLUMNS, row_cells};
use crate::data::model::BaseTable;

// ---------------------------------------------------------------------------
// Filtered-row preview
// ---------------------------------------------------------------------------

/// Render the preview rows with the same columns as the CSV download.
pub fn filtered_table(ui: &mut Ui, table: &BaseTable, rows: &[FilteredRow]) {
    if rows.is_empty() {
        ui.label("No rows match the current filters.");
        return;
    }

    ScrollArea::horizontal().show(ui, |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .resizable(true)
            .max_scroll_height(320.0)
            .columns(Column::auto().at_least(48.0), EXPORT_COLUMNS.len())
            .header(20.0, |mut header| {
                for name in EXPORT_COLUMNS {
                    header.col(|ui: &mut Ui| {
                        ui.strong(name);
                    });
                }
            })
            .body(|mut body| {
                for row in rows {
                    let cells = row_cells(&table.records[row.index], row.selected_delay);
                    body.row(18.0, |mut table_row| {
                        for cell in &cells {
                            table_row.col(|ui: &mut Ui| {
                                ui.label(cell.as_str());
                            });
                        }
                    });
                }
            });
    });
}
