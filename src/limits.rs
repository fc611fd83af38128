/// Resource limits applied while extracting.
///
/// The first four limits are enforced per archive by the [`Driver`](crate::Driver)
/// and are off by default, so ordinary large archives extract in full. Set
/// them to guard against zip bombs. `max_nesting_depth` is enforced by the
/// [`Engine`](crate::Engine) across a whole run and defaults to 100.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Maximum bytes written for one archive.
    pub max_total_bytes: u64,
    /// Maximum number of files written for one archive.
    pub max_file_count: usize,
    /// Maximum size of a single extracted file.
    pub max_single_file: u64,
    /// Maximum number of directory levels in an entry name.
    pub max_path_depth: usize,
    /// Maximum archive nesting depth. Top-level archives have depth 1.
    pub max_nesting_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_total_bytes: u64::MAX,
            max_file_count: usize::MAX,
            max_single_file: u64::MAX,
            max_path_depth: usize::MAX,
            max_nesting_depth: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_nesting_is_limited_by_default() {
        let limits = Limits::default();
        assert_eq!(limits.max_single_file, u64::MAX);
        assert_eq!(limits.max_total_bytes, u64::MAX);
        assert_eq!(limits.max_file_count, usize::MAX);
        assert_eq!(limits.max_path_depth, usize::MAX);
        assert_eq!(limits.max_nesting_depth, 100);
    }
}
