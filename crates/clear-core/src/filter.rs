use clear_shared::{
  STATUS_DONE,
  STATUS_IN_PROGRESS
};
use serde::{
  Deserialize,
  Serialize
};

use crate::config::DEFAULT_PAGE_SIZE;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
  InProgress,
  Completed
}

impl StatusFilter {
  pub fn code(self) -> i64 {
    match self {
      | StatusFilter::InProgress => {
        STATUS_IN_PROGRESS
      }
      | StatusFilter::Completed => {
        STATUS_DONE
      }
    }
  }

  /// Whether a task with this completion
  /// flag belongs to the filtered set.
  pub fn admits(
    self,
    completed: bool
  ) -> bool {
    match self {
      | StatusFilter::InProgress => {
        !completed
      }
      | StatusFilter::Completed => {
        completed
      }
    }
  }
}

#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct Filters {
  pub category_id: Option<String>,
  pub status:      Option<StatusFilter>,
  pub start_date:  Option<String>,
  pub end_date:    Option<String>,
  pub keyword:     Option<String>
}

impl Filters {
  pub fn is_empty(&self) -> bool {
    *self == Self::default()
  }

  /// True when setting a task's
  /// completion flag to `completed` takes
  /// it out of the filtered view.
  pub fn evicts_on_completion(
    &self,
    completed: bool
  ) -> bool {
    self
      .status
      .is_some_and(|s| !s.admits(completed))
  }
}

/// What a paginated view currently
/// shows.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct Cursor {
  pub current_page:   u64,
  pub total_pages:    u64,
  pub items_per_page: usize,
  #[serde(default)]
  pub filters:        Filters
}

impl Default for Cursor {
  fn default() -> Self {
    Self::new(DEFAULT_PAGE_SIZE)
  }
}

impl Cursor {
  pub fn new(
    items_per_page: usize
  ) -> Self {
    Self {
      current_page: 1,
      total_pages: 1,
      items_per_page: items_per_page
        .max(1),
      filters: Filters::default()
    }
  }

  pub fn has_next(&self) -> bool {
    self.current_page < self.total_pages
  }

  pub fn has_prev(&self) -> bool {
    self.current_page > 1
  }

  pub fn query(&self) -> TaskQuery {
    TaskQuery {
      page:      self.current_page,
      page_size: self.items_per_page,
      filters:   self.filters.clone()
    }
  }
}

/// One listing request.
#[derive(
  Debug, Clone, PartialEq, Eq,
)]
pub struct TaskQuery {
  pub page:      u64,
  pub page_size: usize,
  pub filters:   Filters
}

impl TaskQuery {
  /// Query parameters in the order the
  /// backend documents them; unset
  /// filters are omitted.
  pub fn params(
    &self
  ) -> Vec<(&'static str, String)> {
    let mut params = vec![
      ("page", self.page.to_string()),
      (
        "pageSize",
        self.page_size.to_string()
      ),
    ];
    let f = &self.filters;
    if let Some(category) = f
      .category_id
      .as_ref()
      .filter(|c| !c.is_empty())
    {
      params.push((
        "categoryId",
        category.clone()
      ));
    }
    if let Some(status) = f.status {
      params.push((
        "status",
        status.code().to_string()
      ));
    }
    if let Some(start) = f
      .start_date
      .as_ref()
      .filter(|d| !d.is_empty())
    {
      params
        .push(("startDate", start.clone()));
    }
    if let Some(end) = f
      .end_date
      .as_ref()
      .filter(|d| !d.is_empty())
    {
      params.push(("endDate", end.clone()));
    }
    if let Some(keyword) = f
      .keyword
      .as_ref()
      .filter(|k| !k.is_empty())
    {
      params
        .push(("keyword", keyword.clone()));
    }
    params
  }
}

#[must_use]
pub fn total_pages(
  total: u64,
  page_size: usize
) -> u64 {
  let size = page_size.max(1) as u64;
  total.div_ceil(size)
}
