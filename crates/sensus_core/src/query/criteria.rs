//! Filter and sort criteria.
//!
//! # Responsibility
//! - Collect conjunctive predicates and sort directives in insertion order.
//! - Offer both a mutating accumulator API and a fluent per-call builder.
//!
//! # Invariants
//! - Setters with an absent/empty argument leave the criteria unchanged.
//! - Rendering never mutates or clears the criteria.

use rusqlite::types::Value;

/// Conversion into a bound SQL value.
///
/// Covers everything `Value` converts from, plus `&str`, `&String` and `&[u8]`.
pub trait BindValue {
    fn into_value(self) -> Value;
}

macro_rules! bind_via_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl BindValue for $ty {
                fn into_value(self) -> Value {
                    Value::from(self)
                }
            }
        )*
    };
}

bind_via_from!(Value, bool, i8, i16, i32, i64, isize, u8, u16, u32, f32, f64, String, Vec<u8>);

impl BindValue for &str {
    fn into_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl BindValue for &String {
    fn into_value(self) -> Value {
        Value::Text(self.clone())
    }
}

impl BindValue for &[u8] {
    fn into_value(self) -> Value {
        Value::Blob(self.to_vec())
    }
}

impl<T: BindValue> BindValue for Option<T> {
    fn into_value(self) -> Value {
        self.map_or(Value::Null, BindValue::into_value)
    }
}

/// Where a like-pattern must match inside the column text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Whole value.
    Exact,
    /// Prefix.
    Start,
    /// Suffix.
    End,
    /// Any substring.
    #[default]
    Anywhere,
}

impl MatchMode {
    /// Builds a `LIKE` pattern matching `text` literally in this position.
    ///
    /// `%`, `_` and `\` in `text` are escaped with `\`.
    pub fn to_like_pattern(self, text: &str) -> String {
        let mut escaped = String::with_capacity(text.len() + 2);
        for ch in text.chars() {
            if matches!(ch, '%' | '_' | '\\') {
                escaped.push('\\');
            }
            escaped.push(ch);
        }
        match self {
            Self::Exact => escaped,
            Self::Start => format!("{escaped}%"),
            Self::End => format!("%{escaped}"),
            Self::Anywhere => format!("%{escaped}%"),
        }
    }
}

/// One filter condition on an entity field.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals {
        field: String,
        value: Value,
    },
    /// Case-insensitive pattern match.
    Like {
        field: String,
        pattern: String,
        mode: MatchMode,
    },
    /// Inclusive range.
    Between {
        field: String,
        lower: Value,
        upper: Value,
    },
}

impl Predicate {
    pub fn field(&self) -> &str {
        match self {
            Self::Equals { field, .. } | Self::Like { field, .. } | Self::Between { field, .. } => {
                field
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// One ordering directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

/// Ordered, conjunctive predicates plus ordered sort directives.
///
/// ```
/// use sensus_core::{Criteria, MatchMode};
///
/// let criteria = Criteria::new()
///     .like("name", "smith", MatchMode::Start)
///     .between("age", 18, 65)
///     .sort_descending("age");
/// assert_eq!(criteria.predicates().len(), 2);
/// assert_eq!(criteria.sorts().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    predicates: Vec<Predicate>,
    sorts: Vec<Sort>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Criteria holding `predicates` and no sorts.
    pub fn from_predicates(predicates: &[Predicate]) -> Self {
        Self {
            predicates: predicates.to_vec(),
            sorts: Vec::new(),
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn sorts(&self) -> &[Sort] {
        &self.sorts
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty() && self.sorts.is_empty()
    }

    pub fn clear(&mut self) {
        self.predicates.clear();
        self.sorts.clear();
    }

    /// Copy of these criteria with `predicates` replacing the accumulated ones.
    ///
    /// Sorts are kept.
    pub fn with_predicates(&self, predicates: &[Predicate]) -> Self {
        Self {
            predicates: predicates.to_vec(),
            sorts: self.sorts.clone(),
        }
    }

    /// Adds `field = value`. Ignored when `field` is empty or `value` is NULL.
    pub fn add_equals(&mut self, field: impl Into<String>, value: impl BindValue) -> &mut Self {
        let field = field.into();
        let value = value.into_value();
        if present(&field) && value != Value::Null {
            self.predicates.push(Predicate::Equals { field, value });
        }
        self
    }

    /// Adds a case-insensitive match of `pattern`. Ignored when either is empty.
    pub fn add_like(
        &mut self,
        field: impl Into<String>,
        pattern: impl Into<String>,
        mode: MatchMode,
    ) -> &mut Self {
        let field = field.into();
        let pattern = pattern.into();
        if present(&field) && !pattern.is_empty() {
            self.predicates.push(Predicate::Like {
                field,
                pattern,
                mode,
            });
        }
        self
    }

    /// [`Criteria::add_like`] with [`MatchMode::Anywhere`].
    pub fn add_like_anywhere(
        &mut self,
        field: impl Into<String>,
        pattern: impl Into<String>,
    ) -> &mut Self {
        self.add_like(field, pattern, MatchMode::Anywhere)
    }

    /// Adds `lower <= field <= upper`. Ignored when any argument is absent.
    pub fn add_between(
        &mut self,
        field: impl Into<String>,
        lower: impl BindValue,
        upper: impl BindValue,
    ) -> &mut Self {
        let field = field.into();
        let lower = lower.into_value();
        let upper = upper.into_value();
        if present(&field) && lower != Value::Null && upper != Value::Null {
            self.predicates.push(Predicate::Between {
                field,
                lower,
                upper,
            });
        }
        self
    }

    pub fn add_sort_ascending(&mut self, field: impl Into<String>) -> &mut Self {
        self.add_sort(field.into(), SortDirection::Ascending)
    }

    pub fn add_sort_descending(&mut self, field: impl Into<String>) -> &mut Self {
        self.add_sort(field.into(), SortDirection::Descending)
    }

    fn add_sort(&mut self, field: String, direction: SortDirection) -> &mut Self {
        if present(&field) {
            self.sorts.push(Sort { field, direction });
        }
        self
    }

    pub fn equals(mut self, field: impl Into<String>, value: impl BindValue) -> Self {
        self.add_equals(field, value);
        self
    }

    pub fn like(
        mut self,
        field: impl Into<String>,
        pattern: impl Into<String>,
        mode: MatchMode,
    ) -> Self {
        self.add_like(field, pattern, mode);
        self
    }

    pub fn like_anywhere(mut self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.add_like_anywhere(field, pattern);
        self
    }

    pub fn between(
        mut self,
        field: impl Into<String>,
        lower: impl BindValue,
        upper: impl BindValue,
    ) -> Self {
        self.add_between(field, lower, upper);
        self
    }

    pub fn sort_ascending(mut self, field: impl Into<String>) -> Self {
        self.add_sort_ascending(field);
        self
    }

    pub fn sort_descending(mut self, field: impl Into<String>) -> Self {
        self.add_sort_descending(field);
        self
    }
}

fn present(field: &str) -> bool {
    !field.trim().is_empty()
}
