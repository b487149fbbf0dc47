use std::fmt::{self, Write};

/// One line of a [`Table`].
pub(crate) struct Row {
    cells: Vec<String>,
}

impl Row {
    /// Header cells must stay single words so the output can be split with awk.
    fn is_awk_safe(&self) -> bool {
        !self
            .cells
            .iter()
            .any(|cell| cell.is_empty() || cell.contains(char::is_whitespace))
    }
}

impl From<Vec<String>> for Row {
    fn from(cells: Vec<String>) -> Self {
        Row { cells }
    }
}

impl<const N: usize> From<[&str; N]> for Row {
    fn from(cells: [&str; N]) -> Self {
        Row {
            cells: cells.iter().map(|cell| cell.to_string()).collect(),
        }
    }
}

/// A plain-text table with space-padded columns.
pub(crate) struct Table {
    header: Row,
    body: Vec<Row>,
    print_header: bool,
}

impl Table {
    pub(crate) fn new<R: Into<Row>>(header: R) -> Table {
        let header = header.into();

        assert!(header.is_awk_safe(), "table header must not contain whitespace");

        Table {
            header,
            body: Vec::new(),
            print_header: true,
        }
    }

    pub(crate) fn print_header(&mut self, print_header: bool) {
        self.print_header = print_header;
    }

    pub(crate) fn add_row<R: Into<Row>>(&mut self, row: R) {
        let row = row.into();

        assert_eq!(
            row.cells.len(),
            self.header.cells.len(),
            "row width does not match the header"
        );

        self.body.push(row);
    }

    fn visible_rows(&self) -> impl Iterator<Item = &Row> {
        let header = if self.print_header {
            Some(&self.header)
        } else {
            None
        };

        header.into_iter().chain(self.body.iter())
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths = vec![0; self.header.cells.len()];

        for row in self.visible_rows() {
            for (width, cell) in widths.iter_mut().zip(&row.cells) {
                *width = (*width).max(cell.chars().count());
            }
        }

        widths
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.column_widths();

        for row in self.visible_rows() {
            let last = row.cells.len().saturating_sub(1);

            for (i, (cell, width)) in row.cells.iter().zip(&widths).enumerate() {
                if i == last {
                    f.write_str(cell)?;
                } else {
                    write!(f, "{:<width$}  ", cell, width = width)?;
                }
            }

            f.write_char('\n')?;
        }

        Ok(())
    }
}

pub(crate) trait IntoTable: Into<Table> + Sized {
    fn into_table(self) -> Table {
        self.into()
    }
}

impl<T> IntoTable for T where T: Into<Table> + Sized {}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        let mut table = Table::new(["MODEL", "ACTIVE"]);

        table.add_row(["gemini-2.5-flash-lite", "*"]);
        table.add_row(["gemini-2.0-flash", "-"]);

        table
    }

    #[test]
    fn columns_are_padded_to_the_widest_cell() {
        assert_eq!(
            table().to_string(),
            "MODEL                  ACTIVE\n\
             gemini-2.5-flash-lite  *\n\
             gemini-2.0-flash       -\n"
        );
    }

    #[test]
    fn header_can_be_hidden() {
        let mut table = table();

        table.print_header(false);

        assert_eq!(
            table.to_string(),
            "gemini-2.5-flash-lite  *\ngemini-2.0-flash       -\n"
        );
    }

    #[test]
    #[should_panic(expected = "row width")]
    fn ragged_rows_are_rejected() {
        table().add_row(["only-one"]);
    }
}
