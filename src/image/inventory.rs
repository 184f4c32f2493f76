//! Parsing of the local image tool's `images` table

use std::collections::BTreeMap;

/// Local repository name → tags present on disk
pub type LocalInventory = BTreeMap<String, Vec<String>>;

/// Parse `docker images` output.
///
/// The first line is the column header. Every following row must carry at least a repository,
/// a tag and one more column; shorter rows are skipped.
pub fn parse_image_table(table: &str) -> LocalInventory {
    let mut inventory = LocalInventory::new();

    for row in table.lines().skip(1) {
        let mut columns = row.split_whitespace();
        let (Some(repository), Some(tag), Some(_)) = (columns.next(), columns.next(), columns.next())
        else {
            continue;
        };
        inventory
            .entry(repository.to_string())
            .or_default()
            .push(tag.to_string());
    }

    inventory
}

/// Whether `repository:tag` is present in the inventory
pub fn contains(inventory: &LocalInventory, repository: &str, tag: &str) -> bool {
    inventory
        .get(repository)
        .is_some_and(|tags| tags.iter().any(|t| t == tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
REPOSITORY                                   TAG       IMAGE ID       CREATED        SIZE
ubuntu                                       latest    2dc39ba059dc   2 weeks ago    77.8MB
ubuntu                                       14.04     13b66b487594   3 years ago    197MB
index.tenxcloud.com/docker_library/alpine    3.9       78a2ce922f86   4 years ago    5.55MB

garbage
";

    #[test]
    fn test_parse_image_table() {
        let inventory = parse_image_table(TABLE);
        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory["ubuntu"], vec!["latest", "14.04"]);
        assert_eq!(
            inventory["index.tenxcloud.com/docker_library/alpine"],
            vec!["3.9"]
        );
    }

    #[test]
    fn test_contains() {
        let inventory = parse_image_table(TABLE);
        assert!(contains(&inventory, "ubuntu", "14.04"));
        assert!(!contains(&inventory, "ubuntu", "16.04"));
        assert!(!contains(&inventory, "debian", "latest"));
    }

    #[test]
    fn test_header_only() {
        assert!(parse_image_table("REPOSITORY TAG IMAGE ID CREATED SIZE\n").is_empty());
        assert!(parse_image_table("").is_empty());
    }
}
