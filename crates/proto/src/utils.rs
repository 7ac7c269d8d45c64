use std::fmt;
use tracing::{field, Span};

/// Records a value on the current span and hands it back, so it can sit in
/// the middle of a conversion chain.
pub(crate) trait Record: Sized {
  fn record_field(self, field: &'static str) -> Self;

  #[inline]
  fn record_request(self) -> Self {
    self.record_field("request")
  }

  #[inline]
  fn record_response(self) -> Self {
    self.record_field("response")
  }
}

impl<T: fmt::Debug> Record for T {
  #[inline]
  fn record_field(self, field: &'static str) -> Self {
    Span::current().record(field, &field::debug(&self));
    self
  }
}

#[inline]
pub(crate) fn record_request<T: fmt::Debug>(request: T) -> T {
  request.record_request()
}

/// Rejects empty strings for required request fields.
pub(crate) fn required(value: String, field: &'static str) -> Result<String, tonic::Status> {
  if value.is_empty() {
    Err(tonic::Status::invalid_argument(format!("{} is empty", field)))
  } else {
    Ok(value)
  }
}

/// Parses a required path field, which the CO must send as an absolute path.
pub(crate) fn absolute_path(
  value: String,
  field: &'static str,
) -> Result<std::path::PathBuf, tonic::Status> {
  let path = std::path::PathBuf::from(required(value, field)?);
  if path.is_absolute() {
    Ok(path)
  } else {
    Err(tonic::Status::invalid_argument(format!(
      "{} is not absolute",
      field
    )))
  }
}
