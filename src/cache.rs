use crate::version::Side;

/// Text currently displayed on each side.
///
/// A side is `None` while its fetch is outstanding, so a pending side is
/// never mistaken for an empty document.
#[derive(Debug, Clone, Default)]
pub struct ContentCache {
    left: Option<String>,
    right: Option<String>,
}

impl ContentCache {
    pub fn get(&self, side: Side) -> Option<&str> {
        match side {
            Side::Left => self.left.as_deref(),
            Side::Right => self.right.as_deref(),
        }
    }

    pub fn set(&mut self, side: Side, text: String) {
        *self.slot(side) = Some(text);
    }

    /// Forget a side's text until its next fetch resolves
    pub fn invalidate(&mut self, side: Side) {
        *self.slot(side) = None;
    }

    /// Both sides' text, once both are resolved
    pub fn diff_input(&self) -> Option<(&str, &str)> {
        Some((self.left.as_deref()?, self.right.as_deref()?))
    }

    fn slot(&mut self, side: Side) -> &mut Option<String> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}
