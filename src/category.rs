/// 固定的文章分类集合
pub const CATEGORIES: &[&str] = &[
    "sports",
    "politics",
    "space",
    "technology",
    "entertainment",
    "others",
];

/// 分类是否合法
pub fn is_valid(category: &str) -> bool {
    CATEGORIES.contains(&category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_categories_accepted() {
        for c in CATEGORIES {
            assert!(is_valid(c));
        }
    }

    #[test]
    fn unknown_category_rejected() {
        assert!(!is_valid("cooking"));
        assert!(!is_valid(""));
        assert!(!is_valid("Sports"));
    }
}
