use std::{collections::HashMap, fmt};

/// Request secrets. Never printed.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secrets(HashMap<String, String>);

impl Secrets {
  #[inline]
  pub fn get(&self, key: &str) -> Option<&str> {
    self.0.get(key).map(String::as_str)
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl From<HashMap<String, String>> for Secrets {
  #[inline]
  fn from(value: HashMap<String, String>) -> Self {
    Secrets(value)
  }
}

impl From<Secrets> for HashMap<String, String> {
  #[inline]
  fn from(value: Secrets) -> Self {
    value.0
  }
}

impl AsRef<HashMap<String, String>> for Secrets {
  #[inline]
  fn as_ref(&self) -> &HashMap<String, String> {
    &self.0
  }
}

impl fmt::Debug for Secrets {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut keys: Vec<&str> = self.0.keys().map(String::as_str).collect();
    keys.sort_unstable();
    f.debug_struct("Secrets")
      .field("keys", &keys)
      .field("values", &"REDACTED")
      .finish()
  }
}
