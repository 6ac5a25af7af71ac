//! Domain types shared between services

pub mod file;
pub mod pagination;
pub mod user;

pub use file::{AuthorRef, FileRecord, FileSummary, FileType, FileWithAuthor, FILE_COLUMNS};
pub use pagination::{PageParams, PageRequest, Pagination, DEFAULT_PAGE_SIZE};
pub use user::{Role, User, UserPublic};

use uuid::Uuid;

// Core identifier types
pub type UserId = Uuid;
pub type FileId = Uuid;
pub type TopicId = Uuid;

/// Split a comma separated form value into trimmed, non-empty entries.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list_trims_and_drops_empties() {
        assert_eq!(
            split_list(" magisk, root ,, collection ,"),
            vec!["magisk", "root", "collection"]
        );
        assert!(split_list("").is_empty());
        assert!(split_list(" , ").is_empty());
    }
}
