//! OData query options for list calls.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sort direction of an `$orderby` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

/// An `$orderby` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        };
        write!(f, "{} {}", self.field, direction)
    }
}

/// Query options for [`DirectoryClient::list`](crate::DirectoryClient::list).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub filter: Option<String>,
    pub order_by: Option<OrderBy>,
}

impl Query {
    /// Query matching objects whose `field` equals `value`.
    pub fn eq(field: &str, value: &str) -> Self {
        Self {
            filter: Some(format!("{field} eq '{}'", escape_single_quote(value))),
            order_by: None,
        }
    }

    /// Adds `field eq 'value'` to the filter, joined with `and`.
    #[must_use]
    pub fn and_eq(mut self, field: &str, value: &str) -> Self {
        let clause = format!("{field} eq '{}'", escape_single_quote(value));
        self.filter = Some(match self.filter.take() {
            Some(existing) => format!("{existing} and {clause}"),
            None => clause,
        });
        self
    }

    /// Query with a raw filter expression.
    pub fn filter(expression: impl Into<String>) -> Self {
        Self {
            filter: Some(expression.into()),
            order_by: None,
        }
    }

    /// Adds an `$orderby` clause.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Returns the `$`-prefixed query string pairs.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(filter) = &self.filter {
            pairs.push(("$filter", filter.clone()));
        }
        if let Some(order_by) = &self.order_by {
            pairs.push(("$orderby", order_by.to_string()));
        }
        pairs
    }
}

/// Escapes a string literal for use inside single quotes in an OData filter.
#[must_use]
pub fn escape_single_quote(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_escapes_quotes() {
        let query = Query::eq("userPrincipalName", "o'brien@contoso.com");
        assert_eq!(
            query.filter.as_deref(),
            Some("userPrincipalName eq 'o''brien@contoso.com'")
        );
    }

    #[test]
    fn pairs_include_order_by() {
        let query = Query::filter("groupId eq 'g'").order_by("createdDateTime", Direction::Descending);
        assert_eq!(
            query.to_pairs(),
            vec![
                ("$filter", "groupId eq 'g'".to_string()),
                ("$orderby", "createdDateTime desc".to_string()),
            ]
        );
    }

    #[test]
    fn and_eq_joins_clauses() {
        let query = Query::eq("groupId", "g").and_eq("principalId", "o'p");
        assert_eq!(
            query.filter.as_deref(),
            Some("groupId eq 'g' and principalId eq 'o''p'")
        );
        assert_eq!(Query::default().and_eq("a", "b"), Query::eq("a", "b"));
    }

    #[test]
    fn empty_query_has_no_pairs() {
        assert!(Query::default().to_pairs().is_empty());
    }
}
