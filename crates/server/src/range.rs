/// Inclusive byte interval, always inside `0..size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    Full,
    Partial(ByteRange),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    /// Not of the form `bytes=<start>-<end>?`, or `end < start`.
    Invalid,
    /// Well formed, but `start` lies past the end of the file.
    Unsatisfiable,
}

impl std::fmt::Display for RangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeError::Invalid => write!(f, "malformed range"),
            RangeError::Unsatisfiable => write!(f, "range not satisfiable"),
        }
    }
}

pub fn parse_range(value: Option<&str>, size: u64) -> Result<RangeRequest, RangeError> {
    match value {
        None => Ok(RangeRequest::Full),
        Some(value) => parse_range_header(value, size).map(RangeRequest::Partial),
    }
}

pub fn parse_range_header(value: &str, size: u64) -> Result<ByteRange, RangeError> {
    let range = value
        .trim()
        .strip_prefix("bytes=")
        .ok_or(RangeError::Invalid)?
        .trim();
    if range.contains(',') {
        return Err(RangeError::Invalid);
    }

    let (start_str, end_str) = range.split_once('-').ok_or(RangeError::Invalid)?;
    let start = parse_offset(start_str)?;
    let end = match end_str.trim() {
        "" => None,
        text => Some(parse_offset(text)?),
    };

    if let Some(end) = end {
        if end < start {
            return Err(RangeError::Invalid);
        }
    }
    if start >= size {
        return Err(RangeError::Unsatisfiable);
    }

    let last = size - 1;
    let end = end.map_or(last, |end| end.min(last));
    Ok(ByteRange { start, end })
}

fn parse_offset(text: &str) -> Result<u64, RangeError> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::Invalid);
    }
    text.parse().map_err(|_| RangeError::Invalid)
}
