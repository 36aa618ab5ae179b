//! CSV row types.

/// A single named column value.
///
/// Values are kept as raw bytes because delivered CSV files are not
/// guaranteed to be valid UTF-8. Column names come from the header and are
/// always text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    /// Column name from the file header (empty for fields past the header).
    pub name: String,
    /// Raw cell value.
    pub value: Vec<u8>,
}

impl Field {
    /// Creates a new field.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An ordered sequence of named fields.
///
/// Column order is the order of the source file and is significant for
/// canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Row {
    fields: Vec<Field>,
}

impl Row {
    /// Creates a row from fields.
    #[must_use]
    pub const fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Builds a row from `(name, value)` pairs.
    ///
    /// # Example
    ///
    /// ```rust
    /// use logdedup::Row;
    ///
    /// let row = Row::from_pairs([("event", "login"), ("user", "alice")]);
    /// assert_eq!(row.len(), 2);
    /// ```
    #[must_use]
    pub fn from_pairs<N, V, I>(pairs: I) -> Self
    where
        N: Into<String>,
        V: Into<Vec<u8>>,
        I: IntoIterator<Item = (N, V)>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(name, value)| Field::new(name, value))
                .collect(),
        }
    }

    /// Returns the fields in column order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Looks up a value by exact column name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_slice())
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the row has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over raw values in column order.
    pub fn values(&self) -> impl Iterator<Item = &[u8]> {
        self.fields.iter().map(|f| f.value.as_slice())
    }
}

impl FromIterator<Field> for Row {
    fn from_iter<T: IntoIterator<Item = Field>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
