//! Converter trait shared by the output strategies

use bson::Bson;

/// Renders a BSON answer for one output format
pub trait BsonConverter {
    /// Rendered form of a value
    type Output;

    /// Convert a BSON value to the output type
    fn convert(&self, value: &Bson) -> Self::Output;

    /// Convert a field that may be absent from the entry
    ///
    /// An entry only carries the answers its collector filled in; absent
    /// fields render as the output's default (empty text, JSON `null`).
    fn convert_optional(&self, value: Option<&Bson>) -> Self::Output
    where
        Self::Output: Default,
    {
        value.map(|v| self.convert(v)).unwrap_or_default()
    }
}
