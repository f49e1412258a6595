use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use mdconv_cli::pipeline::RunResult;
use mdconv_model::Diagnostic;

pub fn print_summary(result: &RunResult, silent: bool) {
    println!("Format: {}", result.format);
    for path in &result.outputs {
        println!("Output: {}", path.display());
    }

    let mut table = Table::new();
    table.set_header(vec![header_cell("Conversion table"), header_cell("Directives")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    let mut total = 0usize;
    for (name, count) in &result.directive_counts {
        total += count;
        table.add_row(vec![Cell::new(name), Cell::new(count)]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(total).add_attribute(Attribute::Bold),
    ]);
    println!("{table}");
    println!(
        "Records: {}  Warnings: {}",
        result.record_count,
        result.diagnostics.len()
    );

    if !silent && !result.diagnostics.is_empty() {
        print_diagnostics(&result.diagnostics);
    }
    if !result.schema_violations.is_empty() {
        eprintln!("Output schema violations:");
        for violation in &result.schema_violations {
            eprintln!("- {violation}");
        }
    }
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Conversion"),
        header_cell("Record"),
        header_cell("Message"),
    ]);
    apply_table_style(&mut table);
    for diagnostic in diagnostics {
        let conversion = match (&diagnostic.conversion_table, &diagnostic.directive) {
            (Some(table), Some(name)) => format!("{table}.{name}"),
            _ => "-".to_string(),
        };
        let record = match (&diagnostic.source_table, &diagnostic.record) {
            (Some(table), Some(id)) => format!("{table}:{id}"),
            _ => "-".to_string(),
        };
        table.add_row(vec![
            Cell::new(conversion),
            Cell::new(record),
            Cell::new(&diagnostic.message).fg(Color::Yellow),
        ]);
    }
    println!();
    println!("Warnings:");
    println!("{table}");
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label).add_attribute(Attribute::Bold)
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}
