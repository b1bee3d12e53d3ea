use std::fmt;

/// A titled, numbered list for multiline log records.
///
/// Long lists (a spiral has dozens of shells) are easier to scan with an
/// index on every row. `{}` formats entries with Display and `{:?}` with
/// Debug.
pub struct PrettyList<'data, T> {
    title: &'data str,
    entries: &'data [T],
}

impl<'data, T> PrettyList<'data, T> {
    pub fn titled(title: &'data str, entries: &'data [T]) -> Self {
        Self { title, entries }
    }

    fn write_entries<F>(&self, f: &mut fmt::Formatter<'_>, mut entry: F) -> fmt::Result
    where
        F: FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
    {
        writeln!(f, "{} ({}):", self.title, self.entries.len())?;
        let width = self.entries.len().max(1).to_string().len();
        for (index, item) in self.entries.iter().enumerate() {
            write!(f, "{:>width$}. ", index, width = width)?;
            entry(f, item)?;
            f.write_str("\n")?;
        }
        Ok(())
    }
}

impl<'data, T> fmt::Debug for PrettyList<'data, T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_entries(f, |f, item| write!(f, "{:?}", item))
    }
}

impl<'data, T> fmt::Display for PrettyList<'data, T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_entries(f, |f, item| write!(f, "{}", item))
    }
}

#[cfg(test)]
mod test {
    use {super::*, pretty_assertions::assert_eq};

    #[test]
    fn entries_are_numbered_under_the_title() {
        let layers = ["first", "second"];
        assert_eq!(
            PrettyList::titled("layers", &layers).to_string(),
            "layers (2):\n0. first\n1. second\n"
        );
    }

    #[test]
    fn indices_are_right_aligned() {
        let values: Vec<u32> = (0..11).collect();
        let formatted = format!("{:?}", PrettyList::titled("values", &values));
        let lines: Vec<&str> = formatted.lines().collect();
        assert_eq!(lines[1], " 0. 0");
        assert_eq!(lines[11], "10. 10");
    }

    #[test]
    fn empty_lists_only_have_a_title() {
        let empty: [u8; 0] = [];
        assert_eq!(
            PrettyList::titled("nothing", &empty).to_string(),
            "nothing (0):\n"
        );
    }
}
