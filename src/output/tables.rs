use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::providers::azure::types::BuildResult;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn result_color(result: BuildResult) -> TableColor {
    match result {
        BuildResult::Succeeded => TableColor::Green,
        BuildResult::SucceededWithIssues | BuildResult::PartiallySucceeded => TableColor::Yellow,
        BuildResult::Failed => TableColor::Red,
        BuildResult::None
        | BuildResult::Canceled
        | BuildResult::Skipped
        | BuildResult::Abandoned => TableColor::DarkGrey,
    }
}

pub fn color_coded_result_cell(result: BuildResult) -> Cell {
    Cell::new(format!("{result:?}")).fg(result_color(result))
}

/// Counts of -1 are unreported and shown as "-".
pub fn color_coded_count_cell(count: i64, color: TableColor) -> Cell {
    match count {
        n if n < 0 => Cell::new("-").fg(TableColor::DarkGrey),
        0 => Cell::new(0).fg(TableColor::Green),
        n => Cell::new(n).fg(color),
    }
}
