//! ACE member ID sequencing.
//!
//! An ACE ID is a fixed prefix followed by a zero-padded counter, e.g.
//! `25ACEC001`. The next ID is always derived from the numeric suffix of
//! the most recently inserted one.

/// Why the next ACE ID could not be derived.
#[derive(Debug, thiserror::Error)]
pub enum AceIdError {
    #[error("ACE ID '{0}' has no numeric suffix")]
    NoCounter(String),

    #[error("ACE ID counter overflow after '{0}'")]
    Overflow(String),
}

/// Prefix used when `ACE_ID_PREFIX` is not configured.
pub const DEFAULT_PREFIX: &str = "25ACEC";

/// Minimum number of counter digits when `ACE_ID_WIDTH` is not configured.
pub const DEFAULT_WIDTH: usize = 3;

/// Prefix and padding rules for ACE IDs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AceIdFormat {
    pub prefix: String,
    /// Minimum counter width. Counters wider than this are not truncated.
    pub width: usize,
}

impl Default for AceIdFormat {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX, DEFAULT_WIDTH)
    }
}

impl AceIdFormat {
    pub fn new(prefix: impl Into<String>, width: usize) -> Self {
        Self {
            prefix: prefix.into(),
            width,
        }
    }

    /// Format a counter value as an ACE ID.
    ///
    /// ```
    /// use ace_core::ace_id::AceIdFormat;
    ///
    /// let format = AceIdFormat::default();
    /// assert_eq!(format.format(7), "25ACEC007");
    /// assert_eq!(format.format(1234), "25ACEC1234");
    /// ```
    pub fn format(&self, counter: u64) -> String {
        format!("{}{:0width$}", self.prefix, counter, width = self.width)
    }

    /// The ID handed out when no registration exists yet.
    pub fn first(&self) -> String {
        self.format(1)
    }

    /// Compute the ID that follows `last`, or the first ID when `last` is `None`.
    pub fn next_after(&self, last: Option<&str>) -> Result<String, AceIdError> {
        let Some(last) = last else {
            return Ok(self.first());
        };

        let counter = self
            .counter_of(last)
            .ok_or_else(|| AceIdError::NoCounter(last.to_string()))?;
        let next = counter
            .checked_add(1)
            .ok_or_else(|| AceIdError::Overflow(last.to_string()))?;

        Ok(self.format(next))
    }

    /// Extract the counter from an ID.
    ///
    /// IDs carrying this format's prefix are parsed after the prefix, so a
    /// prefix ending in digits does not leak into the counter. IDs minted
    /// under a different prefix fall back to their trailing digits.
    pub fn counter_of(&self, id: &str) -> Option<u64> {
        if let Some(rest) = id.strip_prefix(self.prefix.as_str()) {
            if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
                return rest.parse().ok();
            }
        }
        trailing_number(id)
    }
}

/// Parse the run of ASCII digits at the end of `id`.
fn trailing_number(id: &str) -> Option<u64> {
    let start = id.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    let digits = &id[start..];
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}
