use std::fmt::{Display, Write};

/// Joins the displayed items of an iterator with a separator.
pub trait Join<Item: Display>: Iterator<Item = Item> {
    fn join(&mut self, sep: &str) -> String {
        let mut result = String::new();
        if let Some(first) = self.next() {
            let _ = write!(&mut result, "{first}");
            self.for_each(|i| {
                result.push_str(sep);
                let _ = write!(&mut result, "{i}");
            });
        }
        result
    }
}

impl<T: ?Sized, Item: Display> Join<Item> for T where T: Iterator<Item = Item> {}
