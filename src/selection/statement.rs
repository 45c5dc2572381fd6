//! Select statement construction
//!
//! ```text
//! SELECT <attr-list> FROM <domain> WHERE <filter> [ORDER BY <field> ASC|DESC] [LIMIT <n>]
//! ```
//!
//! The attribute list always includes the metadata attributes. When an order
//! field is given, `<field> IS NOT NULL` joins the filter, since the store
//! only sorts on attributes constrained by the predicate.

use crate::condition::Condition;
use crate::record::META_ATTRS;
use crate::where_expr::{compile, quote_name, CompileResult};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Returns the dialect keyword
    pub fn keyword(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Sort specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// A compiled selection, ready to be paged through
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSelection {
    pub domain: String,
    pub filter_text: String,
    /// Requested attributes; empty selects all of them
    pub projected_attrs: Vec<String>,
    pub order: Option<SortSpec>,
    pub limit: Option<usize>,
    pub offset: usize,
    /// Conditions left for local evaluation
    pub residual: Condition,
}

impl CompiledSelection {
    /// Compiles a selection.
    ///
    /// `projection` empty means every attribute; otherwise the metadata
    /// attributes are appended to it.
    pub fn compile(
        domain: &str,
        conditions: Condition,
        projection: &[String],
        order: Option<&SortSpec>,
        limit: Option<usize>,
        offset: usize,
    ) -> CompileResult<Self> {
        let conditions = match order {
            Some(sort) => conditions.and_with(Condition::not_null(sort.field.clone())),
            None => conditions,
        };
        let compiled = compile(&conditions)?;

        let mut projected_attrs = Vec::new();
        if !projection.is_empty() {
            let names = projection
                .iter()
                .map(String::as_str)
                .chain(META_ATTRS.iter().copied());
            for name in names {
                if !projected_attrs.iter().any(|a: &String| a == name) {
                    projected_attrs.push(name.to_string());
                }
            }
        }

        Ok(Self {
            domain: domain.to_string(),
            filter_text: compiled.text,
            projected_attrs,
            order: order.cloned(),
            limit,
            offset,
            residual: compiled.residual,
        })
    }

    /// Renders the statement for one page
    pub fn statement(&self, page_limit: Option<usize>) -> String {
        let attrs = if self.projected_attrs.is_empty() {
            "*".to_string()
        } else {
            self.projected_attrs
                .iter()
                .map(|a| quote_name(a))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut statement = format!("SELECT {} FROM {}", attrs, quote_name(&self.domain));
        self.push_where(&mut statement);
        if let Some(sort) = &self.order {
            statement.push_str(&format!(
                " ORDER BY {} {}",
                quote_name(&sort.field),
                sort.direction.keyword()
            ));
        }
        if let Some(limit) = page_limit {
            statement.push_str(&format!(" LIMIT {}", limit));
        }
        statement
    }

    /// Renders the count statement
    pub fn count_statement(&self) -> String {
        let mut statement = format!("SELECT count(*) FROM {}", quote_name(&self.domain));
        self.push_where(&mut statement);
        statement
    }

    fn push_where(&self, statement: &mut String) {
        if !self.filter_text.is_empty() {
            statement.push_str(" WHERE ");
            statement.push_str(&self.filter_text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Pattern;

    #[test]
    fn test_statement_shape() {
        let selection = CompiledSelection::compile(
            "posts",
            Condition::eq("title", "FOO"),
            &["title".to_string()],
            Some(&SortSpec::desc("created")),
            Some(10),
            0,
        )
        .unwrap();

        assert_eq!(
            selection.statement(Some(10)),
            "SELECT title, __dm_metadata, simpledb_type FROM posts \
             WHERE created IS NOT NULL AND title = \"FOO\" ORDER BY created DESC LIMIT 10"
        );
    }

    #[test]
    fn test_all_attributes_and_no_filter() {
        let selection =
            CompiledSelection::compile("posts", Condition::always(), &[], None, None, 0).unwrap();
        assert_eq!(selection.statement(None), "SELECT * FROM posts");
        assert_eq!(selection.count_statement(), "SELECT count(*) FROM posts");
    }

    #[test]
    fn test_projection_deduplicated() {
        let selection = CompiledSelection::compile(
            "posts",
            Condition::always(),
            &["__dm_metadata".to_string(), "title".to_string()],
            None,
            None,
            0,
        )
        .unwrap();
        assert_eq!(
            selection.projected_attrs,
            vec!["__dm_metadata", "title", "simpledb_type"]
        );
    }

    #[test]
    fn test_quoted_domain() {
        let selection =
            CompiledSelection::compile("my-posts", Condition::always(), &[], None, None, 0).unwrap();
        assert_eq!(selection.statement(Some(5)), "SELECT * FROM `my-posts` LIMIT 5");
    }

    #[test]
    fn test_residual_carried() {
        let regexp = Condition::regexp("title", Pattern::new("^F").unwrap());
        let selection = CompiledSelection::compile(
            "posts",
            Condition::and(vec![Condition::eq("kind", "a"), regexp.clone()]),
            &[],
            None,
            None,
            0,
        )
        .unwrap();
        assert_eq!(selection.filter_text, "kind = \"a\"");
        assert_eq!(selection.residual, Condition::and(vec![regexp]));
    }
}
