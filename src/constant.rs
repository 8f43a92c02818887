/// Application name and metadata constants
pub const APP_QUALIFIER: &str = "com";
pub const APP_ORGANIZATION: &str = "RetricSu";
pub const APP_NAME: &str = "Version Diff";

/// A timeline needs at least two entries to compare anything
pub const MIN_TIMELINE_LEN: usize = 2;

/// Initial selection: right shows the newest entry, left the one before it
pub const INITIAL_RIGHT_INDEX: usize = 0;
pub const INITIAL_LEFT_INDEX: usize = 1;

pub const DISK_STATE_LABEL: &str = "State on disk";
pub const SHORT_HASH_LEN: usize = 7;
pub const DEFAULT_CONTEXT_LINES: usize = 3;
