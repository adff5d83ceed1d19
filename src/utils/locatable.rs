use text_size::TextRange;

use super::{LineIndex, Span};

/// Something with a position in the source text.
pub trait Locatable {
    fn range(&self) -> TextRange;

    /// The line and column span of [`Locatable::range`].
    fn span(&self, index: &LineIndex<'_>) -> Span {
        index.span(self.range())
    }
}

impl Locatable for TextRange {
    fn range(&self) -> TextRange {
        *self
    }
}

impl<T: Locatable + ?Sized> Locatable for &T {
    fn range(&self) -> TextRange {
        (**self).range()
    }
}
