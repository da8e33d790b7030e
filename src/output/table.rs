#![forbid(unsafe_code)]

use std::io;

/// Column-aligned plain text table, also printable as CSV.
#[derive(Debug, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    max_width: Option<usize>,
}

impl Table {
    pub fn new(headers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            max_width: None,
        }
    }

    /// Truncates cells wider than `width` with an ellipsis. CSV output is
    /// never truncated.
    #[must_use]
    pub fn max_width(mut self, width: usize) -> Self {
        self.max_width = Some(width.max(2));
        self
    }

    pub fn row(&mut self, cols: impl IntoIterator<Item = impl Into<String>>) {
        self.rows.push(cols.into_iter().map(Into::into).collect());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn print(&self) -> io::Result<()> {
        self.write_to(io::stdout().lock())
    }

    pub fn write_csv(&self) -> io::Result<()> {
        self.write_csv_to(io::stdout().lock())
    }

    pub fn write_csv_to(&self, out: impl io::Write) -> io::Result<()> {
        let mut wtr = csv::Writer::from_writer(out);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_to(&self, mut out: impl io::Write) -> io::Result<()> {
        let cell = |s: &str| match self.max_width {
            Some(max) => truncate(s, max),
            None => s.to_owned(),
        };
        let headers: Vec<String> = self.headers.iter().map(|h| cell(h)).collect();
        let rows: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| r.iter().map(|c| cell(c)).collect())
            .collect();

        let mut widths = vec![0usize; headers.len()];
        for row in std::iter::once(&headers).chain(&rows) {
            for (i, c) in row.iter().enumerate() {
                if i >= widths.len() {
                    widths.push(0);
                }
                widths[i] = widths[i].max(visible_width(c));
            }
        }

        writeln!(&mut out, "{}", format_row(&headers, &widths))?;
        for row in &rows {
            writeln!(&mut out, "{}", format_row(row, &widths))?;
        }
        Ok(())
    }
}

fn visible_width(s: &str) -> usize {
    // One column per char; wide glyphs are rare in board titles.
    s.chars().count()
}

fn truncate(s: &str, max: usize) -> String {
    if visible_width(s) <= max {
        return s.to_owned();
    }
    let mut out: String = s.chars().take(max - 1).collect();
    out.push('…');
    out
}

fn format_row(row: &[String], widths: &[usize]) -> String {
    let mut out = String::new();
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            out.push_str("  ");
        }
        out.push_str(cell);
        // No trailing padding on the last column.
        if i + 1 < row.len() {
            let w = widths.get(i).copied().unwrap_or(0);
            out.push_str(&" ".repeat(w.saturating_sub(visible_width(cell))));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(t: &Table) -> String {
        let mut buf = Vec::new();
        t.write_to(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn aligns_columns() {
        let mut t = Table::new(["COLUMN", "TITLE"]);
        t.row(["final", "Write report"]);
        t.row(["grandchild", "Proofread"]);
        assert_eq!(
            render(&t),
            "COLUMN      TITLE\nfinal       Write report\ngrandchild  Proofread\n"
        );
    }

    #[test]
    fn truncates_long_cells() {
        let mut t = Table::new(["TITLE", "X"]).max_width(6);
        t.row(["研究室の掃除をする", "1"]);
        assert_eq!(render(&t), "TITLE   X\n研究室の掃…  1\n");
    }

    #[test]
    fn csv_keeps_full_cells() {
        let mut t = Table::new(["TITLE", "TAGS"]).max_width(3);
        t.row(["Report, final", "a"]);
        let mut buf = Vec::new();
        t.write_csv_to(&mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "TITLE,TAGS\n\"Report, final\",a\n"
        );
    }
}
