//! LaTeX (booktabs) table rendering

/// Escape characters that LaTeX treats specially inside a table cell
pub fn escape(cell: &str) -> String {
    let mut out = String::with_capacity(cell.len());
    for c in cell.chars() {
        match c {
            '&' | '%' | '_' | '#' | '$' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Render `rows` as a booktabs `tabular` with one left-aligned column per header
pub fn render_latex(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut tex = String::new();

    tex.push_str(&format!("\\begin{{tabular}}{{{}}}\n", "l".repeat(headers.len())));
    tex.push_str("\\toprule\n");
    tex.push_str(&render_row(headers.iter().copied()));
    tex.push_str("\\midrule\n");
    for row in rows {
        tex.push_str(&render_row(row.iter().map(String::as_str)));
    }
    tex.push_str("\\bottomrule\n");
    tex.push_str("\\end{tabular}\n");

    tex
}

fn render_row<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    let cells: Vec<String> = cells.map(escape).collect();
    format!("{} \\\\\n", cells.join(" & "))
}
