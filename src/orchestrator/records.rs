use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecordError {
    #[error("column {column} is not a number: {token:?}")]
    Number { column: usize, token: String },

    #[error("expected {expected} features, found {found}")]
    Width { expected: usize, found: usize },
}

/// Parses one input line into features. Values may be separated by whitespace, commas or both.
/// Blank lines parse to `None`.
pub fn parse_record(line: &str, n_features: Option<usize>) -> Result<Option<Vec<f64>>, RecordError> {
    let features = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .enumerate()
        .map(|(column, token)| {
            token.parse::<f64>().map_err(|_| RecordError::Number {
                column,
                token: token.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if features.is_empty() {
        return Ok(None);
    }
    match n_features {
        Some(expected) if expected != features.len() => Err(RecordError::Width {
            expected,
            found: features.len(),
        }),
        _ => Ok(Some(features)),
    }
}

/// Renders scores the way both logs expect them: single spaces, `NaN` for anything not ready.
pub fn format_scores<I>(scores: I) -> String
where
    I: IntoIterator<Item = Option<f64>>,
{
    scores
        .into_iter()
        .map(|score| score.unwrap_or(f64::NAN).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
