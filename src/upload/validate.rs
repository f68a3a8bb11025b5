//! Content-type allow-list

use std::collections::HashSet;

/// Decides whether a sniffed MIME type may be stored
pub trait TypeValidator: Send + Sync {
    fn is_allowed(&self, mime: &str) -> bool;
}

impl<F> TypeValidator for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_allowed(&self, mime: &str) -> bool {
        self(mime)
    }
}

/// Fixed set of accepted MIME essences (`type/subtype`, no parameters)
#[derive(Debug, Clone)]
pub struct AllowList {
    types: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            types: types.into_iter().map(|t| essence(t.as_ref())).collect(),
        }
    }
}

impl TypeValidator for AllowList {
    fn is_allowed(&self, mime: &str) -> bool {
        self.types.contains(&essence(mime))
    }
}

/// `"Text/Plain; charset=utf-8"` -> `"text/plain"`
fn essence(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list_ignores_parameters_and_case() {
        let list = AllowList::new(["image/jpeg", "Text/Plain"]);
        assert!(list.is_allowed("image/jpeg"));
        assert!(list.is_allowed("text/plain; charset=utf-8"));
        assert!(list.is_allowed("IMAGE/JPEG"));
    }

    #[test]
    fn test_allow_list_rejects_unknown() {
        let list = AllowList::new(["image/jpeg"]);
        assert!(!list.is_allowed("application/x-msdownload"));
        assert!(!list.is_allowed("application/vnd.microsoft.portable-executable"));
        assert!(!list.is_allowed(""));
    }

    #[test]
    fn test_closure_validator() {
        let only_images = |mime: &str| mime.starts_with("image/");
        assert!(only_images.is_allowed("image/png"));
        assert!(!only_images.is_allowed("video/mp4"));
    }
}
