//! Query options and the filter composer
//!
//! Every read and mutation takes its soft-delete visibility, category scope,
//! hard-delete override, caller filter and pagination as one immutable
//! [`QueryOptions`] value. Nothing is stored on the model handle, so two calls
//! can never observe each other's settings.

use crate::config::ModelConfig;
use crate::domain::{Filter, Value};

/// Which rows of a soft-delete model are visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Only rows whose soft-delete flag is false
    #[default]
    Live,
    /// Deleted and live rows
    WithDeleted,
    /// Only rows whose soft-delete flag is true
    OnlyDeleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Rows per page; 0 disables pagination
    pub page_size: usize,
    /// 1-based
    pub current_page: usize,
}

/// Per-call query options
///
/// # Examples
///
/// ```rust
/// use record_model::api::{QueryOptions, Visibility};
///
/// let options = QueryOptions::new().with_deleted().category(3);
/// assert_eq!(options.visibility(), Visibility::WithDeleted);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    visibility: Visibility,
    category: Option<Value>,
    hard_delete: bool,
    filter: Filter,
    pagination: Option<Pagination>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include soft-deleted rows (ignored once [`only_deleted`](Self::only_deleted) is set)
    pub fn with_deleted(mut self) -> Self {
        if self.visibility != Visibility::OnlyDeleted {
            self.visibility = Visibility::WithDeleted;
        }
        self
    }

    /// Restrict to soft-deleted rows
    pub fn only_deleted(mut self) -> Self {
        self.visibility = Visibility::OnlyDeleted;
        self
    }

    /// Restrict to one category; `Value::Null` clears the restriction
    pub fn category(mut self, category: impl Into<Value>) -> Self {
        let category = category.into();
        self.category = (!category.is_null()).then_some(category);
        self
    }

    /// Physically remove rows on delete even when soft delete is configured
    pub fn hard_delete(mut self, hard_delete: bool) -> Self {
        self.hard_delete = hard_delete;
        self
    }

    /// AND an extra predicate onto the caller filter
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = std::mem::take(&mut self.filter).and(filter);
        self
    }

    pub fn paginate(mut self, page_size: usize, current_page: usize) -> Self {
        self.pagination = Some(Pagination {
            page_size,
            current_page,
        });
        self
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_hard_delete(&self) -> bool {
        self.hard_delete
    }

    pub fn pagination(&self) -> Option<Pagination> {
        self.pagination
    }

    /// Options as applied by delete: a hard delete also reaches rows that
    /// are already soft-deleted
    pub fn for_delete(&self) -> Self {
        let mut options = self.clone();
        if options.hard_delete && options.visibility == Visibility::Live {
            options.visibility = Visibility::WithDeleted;
        }
        options
    }

    /// Options as applied by undelete: only flagged rows can be restored
    pub fn for_undelete(&self) -> Self {
        let mut options = self.clone();
        if options.visibility == Visibility::Live {
            options.visibility = Visibility::OnlyDeleted;
        }
        options
    }
}

/// Combined predicate for `options` on `config`'s table
///
/// Soft-delete visibility applies only when a soft-delete column is
/// configured; the category only when a category column is configured.
pub fn compose_filter(config: &ModelConfig, options: &QueryOptions) -> Filter {
    let mut filter = Filter::All;

    if let Some(column) = &config.soft_delete_column {
        filter = match options.visibility {
            Visibility::Live => filter.and(Filter::eq(column, false)),
            Visibility::OnlyDeleted => filter.and(Filter::eq(column, true)),
            Visibility::WithDeleted => filter,
        };
    }

    if let (Some(column), Some(category)) = (&config.category_column, &options.category) {
        filter = filter.and(Filter::eq(column, category.clone()));
    }

    filter.and(options.filter.clone())
}
