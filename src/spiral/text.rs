/// Map text to glyph atlas indices.
///
/// The text is reversed and every character becomes its codepoint minus 65,
/// so `'@'..='Z'` land on `-1..=25`. Anything else produces an index outside
/// of the atlas which renders as nothing.
pub fn glyph_indices(text: &str) -> Vec<i32> {
    text.chars().rev().map(|c| c as i32 - 65).collect()
}

#[cfg(test)]
mod test {
    use {super::*, pretty_assertions::assert_eq};

    #[test]
    fn text_is_reversed() {
        assert_eq!(glyph_indices("AB"), vec![1, 0]);
    }

    #[test]
    fn the_default_text_keeps_its_trailing_spaces() {
        assert_eq!(glyph_indices("JEZE   "), vec![-33, -33, -33, 4, 25, 4, 9]);
    }

    #[test]
    fn at_sign_is_the_first_atlas_cell() {
        assert_eq!(glyph_indices("@"), vec![-1]);
    }

    #[test]
    fn lowercase_letters_fall_outside_the_atlas() {
        assert!(glyph_indices("a").iter().all(|index| *index > 25));
    }

    #[test]
    fn empty_text_has_no_glyphs() {
        assert!(glyph_indices("").is_empty());
    }
}
