/// A region of source text. Lines and columns are 1-based; columns count
/// characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl Span {
    pub fn new(start_line: usize, start_column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    pub fn point(line: usize, column: usize) -> Self {
        Self::new(line, column, line, column)
    }
}

impl std::ops::Add<Span> for Span {
    type Output = Span;

    fn add(self, other: Span) -> Span {
        let start = if (self.start_line, self.start_column) <= (other.start_line, other.start_column)
        {
            &self
        } else {
            &other
        };
        let end = if (self.end_line, self.end_column) >= (other.end_line, other.end_column) {
            &self
        } else {
            &other
        };

        Span {
            start_line: start.start_line,
            start_column: start.start_column,
            end_line: end.end_line,
            end_column: end.end_column,
        }
    }
}
