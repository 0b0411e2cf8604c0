//! Error helpers shared by all the crates
//!
//! Log lines want the whole `source()` chain on one line, which neither
//! `Display` nor `Debug` of a typical error gives.

use std::{error, fmt};

pub type BoxedError = Box<dyn error::Error + Send + Sync + 'static>;
pub type BoxedErrorResult<T> = std::result::Result<T, BoxedError>;

/// Displays an error and all its sources as `outer: inner: root`
pub struct FmtCompactError<'e>(&'e dyn error::Error);

impl fmt::Display for FmtCompactError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut next = Some(self.0);
        let mut first = true;

        while let Some(err) = next {
            if !first {
                f.write_str(": ")?;
            }
            first = false;
            fmt::Display::fmt(err, f)?;
            next = err.source();
        }

        Ok(())
    }
}

pub trait FmtCompact {
    fn fmt_compact(&self) -> FmtCompactError<'_>;
}

impl<E> FmtCompact for E
where
    E: error::Error,
{
    fn fmt_compact(&self) -> FmtCompactError<'_> {
        FmtCompactError(self)
    }
}
