use serde::{Deserialize, Serialize};

use crate::utils::error::{AppError, AppResult};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// Page selection as received from the caller; validated into a [`Page`].
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl TryFrom<PageParams> for Page {
    type Error = AppError;

    fn try_from(params: PageParams) -> AppResult<Self> {
        let page = params.page.unwrap_or(DEFAULT_PAGE);
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT);

        if page < 1 {
            return Err(AppError::ValidationError(
                "page must be greater than or equal to 1".to_string(),
            ));
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::ValidationError(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }

        Ok(Self { page, limit })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, page: Page) -> Self {
        let limit = i64::from(page.limit);
        let total_pages = (total + limit - 1) / limit;
        Self {
            data,
            meta: PageMeta {
                page: page.page,
                limit: page.limit,
                total,
                total_pages,
            },
        }
    }
}
