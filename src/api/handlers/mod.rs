pub mod files;
pub mod folders;
pub mod health;
pub mod organize;
pub mod search;
pub mod suggestions;

use serde::Deserialize;

use crate::api::error::AppError;

pub const DEFAULT_LIMIT: u64 = 50;
pub const MAX_LIMIT: u64 = 500;

/// Raw paging parameters. Signed so that negative values are reported as
/// bad requests instead of deserialization noise.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageParams {
    pub fn resolve(&self) -> Result<(u64, u64), AppError> {
        let limit = match self.limit {
            None => DEFAULT_LIMIT,
            Some(l) if (1..=MAX_LIMIT as i64).contains(&l) => l as u64,
            Some(l) => {
                return Err(AppError::BadRequest(format!(
                    "limit must be between 1 and {}, got {}",
                    MAX_LIMIT, l
                )));
            }
        };
        let offset = match self.offset {
            None => 0,
            Some(o) if o >= 0 => o as u64,
            Some(o) => {
                return Err(AppError::BadRequest(format!(
                    "offset must not be negative, got {}",
                    o
                )));
            }
        };
        Ok((limit, offset))
    }
}
