//! Tagged per-field extraction results

/// Outcome of extracting one listing field.
///
/// A field is either found or missing with a reason; there is no silent null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    Found(T),
    Missing(String),
}

impl<T> Field<T> {
    pub fn missing(reason: impl Into<String>) -> Self {
        Self::Missing(reason.into())
    }

    pub fn from_option(value: Option<T>, reason: &str) -> Self {
        value.map_or_else(|| Self::missing(reason), Self::Found)
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::Missing(_) => None,
        }
    }

    pub fn missing_reason(&self) -> Option<&str> {
        match self {
            Self::Found(_) => None,
            Self::Missing(reason) => Some(reason),
        }
    }
}
