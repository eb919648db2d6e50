use std::{fmt, str::FromStr};
use thiserror::Error;

const CONTAINER_NAME_MIN_LEN: usize = 3;
const CONTAINER_NAME_MAX_LEN: usize = 63;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContainerNameError {
    #[error(
        "container name must be between {CONTAINER_NAME_MIN_LEN} and {CONTAINER_NAME_MAX_LEN} characters"
    )]
    Length,

    #[error("container name may only contain lowercase letters, digits and hyphens")]
    Character,

    #[error("container name must start and end with a letter or digit")]
    Boundary,

    #[error("container name must not contain consecutive hyphens")]
    ConsecutiveHyphens,
}

/// A validated storage container name.
///
/// Container names follow the usual object-store rules: 3-63 characters,
/// lowercase ASCII letters, digits and single hyphens, with a letter or
/// digit at both ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerName(String);

impl ContainerName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ContainerName {
    type Err = ContainerNameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if !(CONTAINER_NAME_MIN_LEN..=CONTAINER_NAME_MAX_LEN).contains(&value.len()) {
            return Err(ContainerNameError::Length);
        }
        if !value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(ContainerNameError::Character);
        }
        // Length check above guarantees first/last exist.
        if value.starts_with('-') || value.ends_with('-') {
            return Err(ContainerNameError::Boundary);
        }
        if value.contains("--") {
            return Err(ContainerNameError::ConsecutiveHyphens);
        }
        Ok(Self(value.to_owned()))
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
