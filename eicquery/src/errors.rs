#[derive(Debug)]
pub enum EicQueryError {
    ExpectedSlicesSameLength {
        expected: usize,
        other: usize,
        context: String,
    },
    ExpectedSortedData {
        context: String,
    },
}

impl std::fmt::Display for EicQueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for EicQueryError {}
