/// Splitting a byte stream into lines.
pub(crate) mod lines;
