// src/utils/html.rs

/// Strips unsafe markup from user-authored text (quiz titles, descriptions,
/// question text, group names) before it is stored.
///
/// Text without any markup is returned unchanged, so `2 < 3 & 4` is not
/// entity-escaped. Text with markup goes through ammonia's whitelist:
/// harmless tags such as `<b>` survive, `<script>` is removed together with
/// its content and event-handler attributes are dropped.
pub fn clean_html(input: &str) -> String {
    if !ammonia::is_html(input) {
        return input.to_string();
    }
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_scripts_keeps_text() {
        assert_eq!(clean_html("Cells<script>alert(1)</script>"), "Cells");
        assert_eq!(clean_html("<b>Mitosis</b>"), "<b>Mitosis</b>");
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(clean_html("Is 2 < 3 & 4?"), "Is 2 < 3 & 4?");
        assert_eq!(clean_html(&"&".repeat(200)), "&".repeat(200));
    }

    #[test]
    fn markup_is_escaped_consistently() {
        assert_eq!(clean_html("<i>R&D</i>"), "<i>R&amp;D</i>");
    }
}
