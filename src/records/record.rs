use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::net::IpAddr;

use crate::dns::constants::{MAX_LABEL_LENGTH, MAX_NAME_LENGTH};

/// A single name to address mapping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    pub ip: IpAddr,
}

impl Record {
    pub fn new(name: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            name: name.into(),
            ip,
        }
    }

    /// True when this record's name denotes the same key as `name`.
    pub fn matches(&self, name: &str) -> bool {
        fqdn(&self.name) == fqdn(name)
    }
}

/// Absolute form of a name: `host` and `host.` both become `host.`.
///
/// Comparison stays case-sensitive.
pub fn fqdn(name: &str) -> Cow<'_, str> {
    if name.ends_with('.') {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("{}.", name))
    }
}

/// Checks that `name` can be asked for on the wire: dot-separated labels
/// of 1 to 63 printable, non-space characters, at most 255 bytes encoded.
pub fn validate_name(name: &str) -> Result<(), String> {
    let relative = name.strip_suffix('.').unwrap_or(name);
    if relative.is_empty() {
        return Err(format!("invalid name: {:?}", name));
    }

    let mut wire_len = 1;
    for label in relative.split('.') {
        if label.is_empty() {
            return Err(format!("invalid name {:?}: empty label", name));
        }
        if label.len() > MAX_LABEL_LENGTH {
            return Err(format!(
                "invalid name {:?}: label longer than {} bytes",
                name, MAX_LABEL_LENGTH
            ));
        }
        if label.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(format!("invalid name {:?}: whitespace or control character", name));
        }
        wire_len += label.len() + 1;
    }

    if wire_len > MAX_NAME_LENGTH {
        return Err(format!(
            "invalid name {:?}: longer than {} bytes",
            name, MAX_NAME_LENGTH
        ));
    }
    Ok(())
}
