//! Table rendering for list output

use tabled::builder::Builder;
use tabled::settings::object::Rows;
use tabled::settings::{Alignment, Style};

/// Render a header and rows as a plain table
pub fn render(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut builder = Builder::default();
    builder.push_record(headers.iter().map(|h| h.to_string()));
    for row in rows {
        builder.push_record(row.iter().cloned());
    }

    let mut table = builder.build();
    table.with(Style::psql());
    table.modify(Rows::first(), Alignment::center());
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_cells() {
        let out = render(
            &["ID", "NAME"],
            &[vec!["MAT@1".to_string(), "Flour".to_string()]],
        );
        assert!(out.contains("ID"));
        assert!(out.contains("MAT@1"));
        assert!(out.contains("Flour"));
        assert_eq!(out.lines().count(), 3);
    }
}
