use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

/// Short identifier assigned to a task at admission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::TaskId;

    #[test]
    fn serializes_as_plain_string() {
        let id = TaskId::from("aB3dE6gH");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""aB3dE6gH""#);
        assert_eq!(id.to_string(), "aB3dE6gH");
    }
}
