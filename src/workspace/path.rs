// ABOUTME: Dotted task path addressing tasks through nested workspaces
// ABOUTME: Supports head/tail decomposition used by recursive resolution

use std::fmt;

/// A dotted name addressing a task through nested workspaces, e.g.
/// `"group.sub.taskname"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskPath {
    segments: Vec<String>,
}

impl TaskPath {
    pub fn new(path: &str) -> Self {
        Self {
            segments: path.split('.').map(str::to_string).collect(),
        }
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            // A path always has at least one segment.
            return Self::new("");
        }
        Self { segments }
    }

    /// True iff the path is a single segment.
    pub fn is_leaf(&self) -> bool {
        self.segments.len() == 1
    }

    /// The first segment, naming a direct child workspace for non-leaf paths.
    pub fn head(&self) -> &str {
        &self.segments[0]
    }

    /// The path with the head segment removed. Only meaningful when
    /// `!is_leaf()`.
    pub fn sub_path(&self) -> TaskPath {
        TaskPath::from_segments(self.segments[1..].iter().cloned())
    }

    /// The final segment: the task's local name.
    pub fn name(&self) -> &str {
        self.segments.last().expect("path has at least one segment")
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for TaskPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl From<&str> for TaskPath {
    fn from(path: &str) -> Self {
        TaskPath::new(path)
    }
}

impl From<String> for TaskPath {
    fn from(path: String) -> Self {
        TaskPath::new(&path)
    }
}
